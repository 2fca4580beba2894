//! Device discovery, selection, and endpoint plumbing.
//!
//! Candidate devices are USB serial bridges filtered against a small
//! allow-list of vendor/product ids known to ship on the target hardware
//! family; an unfiltered listing stays available for everything else. The
//! selection prompt itself belongs to the host shell, modelled here as the
//! [`DeviceChooser`] seam.

use crate::error::{BridgeError, BridgeResult};
use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Short read timeout so a blocked read doubles as a cancellation point.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// USB vendor/product identifier pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

/// USB-serial bridges known to ship on the target hardware family.
pub const KNOWN_ADAPTERS: &[UsbId] = &[
    // Espressif USB-JTAG/serial
    UsbId {
        vid: 0x303a,
        pid: 0x1001,
    },
    // Silicon Labs CP210x
    UsbId {
        vid: 0x10c4,
        pid: 0xea60,
    },
    // FTDI FT232R
    UsbId {
        vid: 0x0403,
        pid: 0x6001,
    },
    // WCH CH340
    UsbId {
        vid: 0x1a86,
        pid: 0x7523,
    },
];

/// Whether enumeration is restricted to the allow-list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PortFilter {
    /// Only adapters from [`KNOWN_ADAPTERS`].
    #[default]
    Known,
    /// Every enumerable port.
    All,
}

/// Information about a candidate serial device.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo {
    pub port_name: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl DeviceInfo {
    /// True when the device matches the hardware-family allow-list.
    pub fn is_known_adapter(&self) -> bool {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => KNOWN_ADAPTERS.contains(&UsbId { vid, pid }),
            _ => false,
        }
    }
}

/// Capability query: does this host expose a usable serial transport?
///
/// Evaluated once at bridge construction rather than checked ad hoc on every
/// operation.
pub fn transport_available() -> bool {
    serialport::available_ports().is_ok()
}

/// Enumerates candidate devices, honoring `filter`.
pub fn list_devices(filter: PortFilter) -> BridgeResult<Vec<DeviceInfo>> {
    let ports =
        serialport::available_ports().map_err(|_| BridgeError::TransportUnavailable)?;

    let mut devices = Vec::new();
    for port in ports {
        // On macOS only the /dev/cu.* call-out devices are usable here;
        // /dev/tty.* blocks on open waiting for carrier detect.
        #[cfg(target_os = "macos")]
        if port.port_name.starts_with("/dev/tty.") {
            continue;
        }

        let info = match port.port_type {
            SerialPortType::UsbPort(usb) => DeviceInfo {
                port_name: port.port_name,
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
            },
            _ => DeviceInfo {
                port_name: port.port_name,
                manufacturer: None,
                product: None,
                serial_number: None,
                vid: None,
                pid: None,
            },
        };

        if matches!(filter, PortFilter::All) || info.is_known_adapter() {
            devices.push(info);
        }
    }
    Ok(devices)
}

/// Host-shell seam for picking one device out of the candidates.
///
/// Returning `None` models the user declining the prompt; the bridge treats
/// that as a non-error "no connection" result.
pub trait DeviceChooser {
    fn choose(&self, candidates: &[DeviceInfo]) -> Option<DeviceInfo>;
}

/// Chooser that takes the first candidate; for headless hosts and tests.
pub struct FirstAvailable;

impl DeviceChooser for FirstAvailable {
    fn choose(&self, candidates: &[DeviceInfo]) -> Option<DeviceInfo> {
        candidates.first().cloned()
    }
}

/// One endpoint of an opened device, as the pump loops consume it.
///
/// Reads follow the serial-port contract: `Ok(0)` is end of stream
/// (device-initiated disconnection) and `ErrorKind::TimedOut` is an ordinary
/// pause. Dropping the endpoint releases it.
pub trait DevicePort: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

impl DevicePort for Box<dyn serialport::SerialPort> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(self, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// Opens `port_name` at the fixed line configuration (8N1, no flow control)
/// and splits it into exclusive reader and writer endpoints.
pub fn open_device(
    port_name: &str,
    baud: u32,
) -> BridgeResult<(Box<dyn serialport::SerialPort>, Box<dyn serialport::SerialPort>)> {
    let writer = serialport::new(port_name, baud)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()?;
    let reader = writer.try_clone()?;
    Ok((reader, writer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(vid: Option<u16>, pid: Option<u16>) -> DeviceInfo {
        DeviceInfo {
            port_name: "/dev/ttyUSB0".to_string(),
            manufacturer: None,
            product: None,
            serial_number: None,
            vid,
            pid,
        }
    }

    #[test]
    fn allow_list_matches_exact_pairs_only() {
        assert!(device(Some(0x10c4), Some(0xea60)).is_known_adapter());
        assert!(!device(Some(0x10c4), Some(0x6001)).is_known_adapter());
        assert!(!device(Some(0x10c4), None).is_known_adapter());
        assert!(!device(None, None).is_known_adapter());
    }

    #[test]
    fn filter_defaults_to_known_adapters() {
        assert_eq!(PortFilter::default(), PortFilter::Known);
    }
}
