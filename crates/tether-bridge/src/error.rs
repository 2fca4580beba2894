//! Error surface for the device bridge.
//!
//! Only lifecycle operations return errors; data-path faults inside the pump
//! loops are absorbed, reported through the link event stream, and followed by
//! the same release path as a normal stop.

use crate::bridge::LinkState;
use thiserror::Error;

/// Convenience result alias for fallible bridge operations.
pub type BridgeResult<T, E = BridgeError> = Result<T, E>;

/// Errors surfaced by connection lifecycle operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host platform has no usable serial transport.
    #[error("host platform has no usable serial transport")]
    TransportUnavailable,
    /// A connection attempt while the link is not fully torn down.
    #[error("link is {state:?}; connecting requires a disconnected link")]
    LinkBusy { state: LinkState },
    /// Opening or configuring the device failed.
    #[error("failed to open or configure the device: {0}")]
    ConnectionFailure(#[from] serialport::Error),
}
