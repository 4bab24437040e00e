//! Turns incoming bytes into published events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::bus::EventBus;
use crate::error::ProtocolError;
use crate::frame::{Frame, FrameDecoder};
use crate::responses::Event;
use crate::transport::ByteChunks;

/// Decodes frame payloads and publishes them on a bus.
#[derive(Debug)]
pub struct Dispatcher {
    bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Dispatcher { bus }
    }

    /// Decode one frame payload and publish the result.
    ///
    /// Unknown codes are dropped. A known code that fails to decode is
    /// published as [`Event::Malformed`]; nothing here is fatal.
    pub fn dispatch(&self, frame: &Frame) {
        let Some(&code) = frame.payload.first() else {
            return;
        };

        let event = match Event::decode(&frame.payload) {
            Ok(event) => event,
            Err(ProtocolError::UnknownResponse(code)) => {
                debug!(code, len = frame.payload.len(), "ignoring unknown code");
                return;
            }
            Err(error) => {
                warn!(code, %error, "malformed frame");
                Event::Malformed { code, error }
            }
        };

        let delivered = self.bus.publish(&event);
        trace!(code, delivered, "event published");
    }
}

/// Read chunks until the stream ends, publishing every complete frame.
pub(crate) async fn read_loop(
    mut chunks: ByteChunks,
    dispatcher: Dispatcher,
    connected: Arc<AtomicBool>,
) {
    let mut decoder = FrameDecoder::new();
    while let Some(chunk) = chunks.recv().await {
        trace!(len = chunk.len(), "bytes received");
        for frame in decoder.decode(&chunk) {
            dispatcher.dispatch(&frame);
        }
    }
    connected.store(false, Ordering::Release);
    debug!(
        buffered = decoder.buffered_len(),
        dropped = decoder.dropped_bytes(),
        "transport stream ended"
    );
}
