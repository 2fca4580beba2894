//! Device side of the tether transport.
//!
//! Connects a physical serial device to a bound channel set and keeps bytes
//! moving both ways:
//! * [`SerialBridge`] – connection state machine plus the read/write pump loops.
//! * [`DeviceChooser`] / [`DeviceInfo`] – device discovery and the host's
//!   selection prompt seam, with the hardware-family allow-list.
//! * [`CommandPort`] – command lines and keystrokes into the stdin channel.
//! * [`LinkEvent`] – lifecycle notifications, including device-initiated
//!   disconnections and loop faults.
//!
//! Channel byte content is opaque end to end; this crate never inspects it.

mod bridge;
mod device;
mod error;
mod input;

pub use bridge::{
    DownReason, LinkConfig, LinkEvent, LinkState, SerialBridge, TxDoorbell,
};
pub use device::{
    list_devices, open_device, transport_available, DeviceChooser, DeviceInfo, DevicePort,
    FirstAvailable, PortFilter, UsbId, KNOWN_ADAPTERS,
};
pub use error::{BridgeError, BridgeResult};
