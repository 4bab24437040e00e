//! Byte-stream transport capability.
//!
//! Serial, TCP and GATT links implement [`Transport`]; the connection only
//! ever sees whole writes going out and arbitrary chunks coming in.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::TransportError;

/// Chunks of bytes arriving from the device. The channel closing means the
/// link went away.
pub type ByteChunks = mpsc::Receiver<Vec<u8>>;

/// A duplex byte stream to a companion device.
pub trait Transport: Send + Sync + 'static {
    /// Open the link and hand over its incoming byte stream.
    fn open(&self) -> impl Future<Output = Result<ByteChunks, TransportError>> + Send;

    /// Write bytes to the device.
    fn write(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the link.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
