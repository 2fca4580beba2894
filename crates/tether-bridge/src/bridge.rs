//! Connection lifecycle and the two pump loops.
//!
//! The bridge owns the physical device for the lifetime of a connection and
//! runs two independent blocking loops: the read loop copies device chunks
//! into the RX ring, the write loop drains the TX ring back to the device.
//! Both loops observe a shared run flag and release their endpoint on every
//! exit path; `disconnect` is the single cancellation entry point and is safe
//! to call at any time.
//!
//! State machine: `Disconnected → Connecting → Connected → Disconnecting →
//! Disconnected`, with `Faulted` reachable from any state on unrecoverable
//! failure and left only through explicit teardown.

use crate::device::{list_devices, open_device, transport_available, DeviceChooser, DevicePort, PortFilter};
use crate::error::{BridgeError, BridgeResult};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_channel::{ByteRing, ChannelSet};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Connection state of the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Faulted,
}

/// Why the link went down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownReason {
    /// Explicit `disconnect` by the caller.
    Stopped,
    /// The device ended the stream (cable unplug, port closed).
    DeviceClosed,
    /// A pump loop hit an unrecoverable I/O error.
    Fault(String),
}

/// Lifecycle notifications delivered on the event stream.
///
/// Device-initiated disconnections and loop faults arrive here as well; they
/// are reported, never retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Up { port: String },
    Down { reason: DownReason },
}

/// Line and pump configuration. The defaults match the target hardware:
/// 115200 baud, 8N1, no flow control.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub baud: u32,
    pub filter: PortFilter,
    /// Scratch buffer size for both loops.
    pub chunk_bytes: usize,
    /// Write-loop fallback poll interval when TX is empty and nobody rings
    /// the doorbell.
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud: 115_200,
            filter: PortFilter::default(),
            chunk_bytes: 256,
            poll_interval: Duration::from_millis(5),
        }
    }
}

/// Wake-up handle for the write loop.
///
/// The module side may ring it after producing TX bytes to cut drain latency;
/// the loop falls back to its poll interval otherwise, so ringing is an
/// optimisation, never a requirement.
#[derive(Clone, Default)]
pub struct TxDoorbell {
    inner: Arc<DoorbellInner>,
}

#[derive(Default)]
struct DoorbellInner {
    rung: Mutex<bool>,
    cv: Condvar,
}

impl TxDoorbell {
    /// Wakes the write loop if it is waiting.
    pub fn ring(&self) {
        let mut rung = self.inner.rung.lock();
        *rung = true;
        self.inner.cv.notify_one();
    }

    fn wait_timeout(&self, timeout: Duration) {
        let mut rung = self.inner.rung.lock();
        if !*rung {
            self.inner.cv.wait_for(&mut rung, timeout);
        }
        *rung = false;
    }
}

/// State shared between the bridge and its pump loops.
struct LoopCtx {
    run: AtomicBool,
    state: Mutex<LinkState>,
    events: UnboundedSender<LinkEvent>,
    doorbell: TxDoorbell,
}

impl LoopCtx {
    /// Terminal transition initiated from inside a loop: stop both loops,
    /// record the final state, report once.
    fn shut_down(&self, state: LinkState, reason: DownReason) {
        self.run.store(false, Ordering::Relaxed);
        self.doorbell.ring();
        *self.state.lock() = state;
        let _ = self.events.send(LinkEvent::Down { reason });
    }
}

/// Bridges one physical serial device to a bound channel set.
pub struct SerialBridge {
    channels: ChannelSet,
    config: LinkConfig,
    available: bool,
    ctx: Arc<LoopCtx>,
    read_task: Option<JoinHandle<()>>,
    write_task: Option<JoinHandle<()>>,
}

impl SerialBridge {
    /// Creates a bridge over `channels` and returns the link event stream.
    ///
    /// The serial capability of the host is probed here, once.
    pub fn new(channels: ChannelSet, config: LinkConfig) -> (Self, UnboundedReceiver<LinkEvent>) {
        let (events, event_rx) = unbounded_channel();
        let bridge = Self {
            channels,
            config,
            available: transport_available(),
            ctx: Arc::new(LoopCtx {
                run: AtomicBool::new(false),
                state: Mutex::new(LinkState::Disconnected),
                events,
                doorbell: TxDoorbell::default(),
            }),
            read_task: None,
            write_task: None,
        };
        (bridge, event_rx)
    }

    /// Current connection state.
    pub fn state(&self) -> LinkState {
        *self.ctx.state.lock()
    }

    /// Result of the one-time serial capability probe.
    pub fn available(&self) -> bool {
        self.available
    }

    /// Wake-up handle for the write loop; hand this to whatever integrates
    /// the module side so TX drains promptly.
    pub fn doorbell(&self) -> TxDoorbell {
        self.ctx.doorbell.clone()
    }

    /// Selects and opens a device, then starts both pump loops.
    ///
    /// Returns `Ok(false)` when the chooser declines (not an error), and
    /// leaves the link `Disconnected` on any failure. No timeout is applied
    /// beyond what the chooser itself enforces.
    pub fn connect(&mut self, chooser: &dyn DeviceChooser) -> BridgeResult<bool> {
        if !self.available {
            return Err(BridgeError::TransportUnavailable);
        }
        self.begin_connecting()?;

        let candidates = match list_devices(self.config.filter) {
            Ok(candidates) => candidates,
            Err(err) => {
                *self.ctx.state.lock() = LinkState::Disconnected;
                return Err(err);
            }
        };

        let Some(choice) = chooser.choose(&candidates) else {
            *self.ctx.state.lock() = LinkState::Disconnected;
            tracing::info!("device selection cancelled");
            return Ok(false);
        };

        match open_device(&choice.port_name, self.config.baud) {
            Ok((reader, writer)) => {
                self.spawn_loops(reader, writer, choice.port_name);
                Ok(true)
            }
            Err(err) => {
                *self.ctx.state.lock() = LinkState::Disconnected;
                Err(err)
            }
        }
    }

    /// Starts the pump loops over endpoints the caller already opened.
    ///
    /// Lets hosts with their own device prompt (and tests) reuse the same
    /// loops and teardown; the capability probe does not apply here.
    pub fn attach<R, W>(&mut self, reader: R, writer: W, label: impl Into<String>) -> BridgeResult<()>
    where
        R: DevicePort + 'static,
        W: DevicePort + 'static,
    {
        self.begin_connecting()?;
        self.spawn_loops(reader, writer, label.into());
        Ok(())
    }

    /// Tears the connection down: stops both loops, unblocks an in-flight
    /// read, releases both endpoints and the device.
    ///
    /// Every release step runs regardless of earlier failures, and calling
    /// this on a link that never started is a no-op.
    pub async fn disconnect(&mut self) {
        let was_live = {
            let mut state = self.ctx.state.lock();
            if *state == LinkState::Disconnected
                && self.read_task.is_none()
                && self.write_task.is_none()
            {
                return;
            }
            let live = matches!(*state, LinkState::Connecting | LinkState::Connected);
            *state = LinkState::Disconnecting;
            live
        };

        self.ctx.run.store(false, Ordering::Relaxed);
        self.ctx.doorbell.ring();

        // Join errors are absorbed: the loops release their endpoints
        // themselves, on every exit path.
        if let Some(task) = self.read_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.write_task.take() {
            let _ = task.await;
        }

        *self.ctx.state.lock() = LinkState::Disconnected;
        if was_live {
            let _ = self
                .ctx
                .events
                .send(LinkEvent::Down {
                    reason: DownReason::Stopped,
                });
        }
        tracing::info!("serial link down");
    }

    fn begin_connecting(&self) -> BridgeResult<()> {
        let mut state = self.ctx.state.lock();
        match *state {
            LinkState::Disconnected => {
                *state = LinkState::Connecting;
                Ok(())
            }
            other => Err(BridgeError::LinkBusy { state: other }),
        }
    }

    fn spawn_loops<R, W>(&mut self, reader: R, writer: W, port: String)
    where
        R: DevicePort + 'static,
        W: DevicePort + 'static,
    {
        self.ctx.run.store(true, Ordering::Relaxed);
        *self.ctx.state.lock() = LinkState::Connected;
        tracing::info!(port = %port, baud = self.config.baud, "serial link up");
        let _ = self.ctx.events.send(LinkEvent::Up { port });

        let rx = self.channels.rx().clone();
        let ctx = Arc::clone(&self.ctx);
        let chunk = self.config.chunk_bytes;
        self.read_task = Some(tokio::task::spawn_blocking(move || {
            read_loop(reader, rx, ctx, chunk)
        }));

        let tx = self.channels.tx().clone();
        let ctx = Arc::clone(&self.ctx);
        let poll = self.config.poll_interval;
        self.write_task = Some(tokio::task::spawn_blocking(move || {
            write_loop(writer, tx, ctx, poll, chunk)
        }));
    }
}

/// Copies device input into the RX ring until stopped, end of stream, or an
/// I/O fault. Owns the reader endpoint; dropping it on return is the
/// guaranteed release.
fn read_loop<R: DevicePort>(mut port: R, rx: ByteRing, ctx: Arc<LoopCtx>, chunk: usize) {
    let mut buf = vec![0u8; chunk];
    while ctx.run.load(Ordering::Relaxed) {
        match port.read(&mut buf) {
            Ok(0) => {
                tracing::info!("device closed the stream");
                ctx.shut_down(LinkState::Disconnected, DownReason::DeviceClosed);
                break;
            }
            Ok(n) => {
                // lossy by contract; the ring counts anything it drops
                rx.try_push(&buf[..n]);
            }
            Err(err)
                if err.kind() == io::ErrorKind::TimedOut
                    || err.kind() == io::ErrorKind::Interrupted =>
            {
                // timeout doubles as the cancellation point
            }
            Err(err) => {
                tracing::error!(error = %err, "read loop fault");
                ctx.shut_down(LinkState::Faulted, DownReason::Fault(err.to_string()));
                break;
            }
        }
    }
}

/// Drains the TX ring to the device until stopped or an I/O fault. Waits on
/// the doorbell (bounded by the poll interval) instead of spinning when TX is
/// empty. Owns the writer endpoint; dropping it on return is the guaranteed
/// release.
fn write_loop<W: DevicePort>(
    mut port: W,
    tx: ByteRing,
    ctx: Arc<LoopCtx>,
    poll: Duration,
    chunk: usize,
) {
    let mut scratch = vec![0u8; chunk];
    while ctx.run.load(Ordering::Relaxed) {
        let n = tx.try_pop(&mut scratch);
        if n == 0 {
            ctx.doorbell.wait_timeout(poll);
            continue;
        }
        if let Err(err) = port.write_all(&scratch[..n]).and_then(|()| port.flush()) {
            tracing::error!(error = %err, "write loop fault");
            ctx.shut_down(LinkState::Faulted, DownReason::Fault(err.to_string()));
            break;
        }
    }
}
