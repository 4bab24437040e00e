//! A single in-flight operation: its bus subscription and its deadline.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};
use tracing::trace;

use crate::bus::Subscription;
use crate::error::{Error, Result};
use crate::responses::Event;

/// Events awaited by one operation, with an optional deadline.
///
/// The subscription is released when the operation is dropped, whichever
/// way it finishes.
#[derive(Debug)]
pub struct PendingOperation {
    subscription: Subscription,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl PendingOperation {
    pub fn new(subscription: Subscription) -> Self {
        PendingOperation {
            subscription,
            deadline: None,
        }
    }

    /// Start (or restart) the deadline, counted from now.
    pub fn arm(&mut self, timeout: Duration) {
        trace!(?timeout, "deadline armed");
        self.deadline = Some(Box::pin(sleep(timeout)));
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the next awaited event.
    ///
    /// Fails with [`Error::Timeout`] when an armed deadline passes, which
    /// also disarms it, and with [`Error::Closed`] when the bus is gone.
    pub async fn next(&mut self) -> Result<Event> {
        let PendingOperation {
            subscription,
            deadline,
        } = self;

        let received = match deadline.as_mut() {
            Some(timer) => {
                tokio::select! {
                    event = subscription.recv() => Some(event),
                    _ = timer.as_mut() => None,
                }
            }
            None => Some(subscription.recv().await),
        };

        match received {
            Some(Some(event)) => Ok(event),
            Some(None) => Err(Error::Closed),
            None => {
                *deadline = None;
                Err(Error::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::constants::*;

    #[tokio::test(start_paused = true)]
    async fn test_next_returns_published_event() {
        let bus = EventBus::new();
        let mut op = PendingOperation::new(bus.subscribe(&[RESP_CODE_OK]));
        op.arm(Duration::from_secs(1));
        bus.publish(&Event::Ok);
        assert_eq!(op.next().await, Ok(Event::Ok));
        assert!(op.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out() {
        let bus = EventBus::new();
        let mut op = PendingOperation::new(bus.subscribe(&[RESP_CODE_OK]));
        op.arm(Duration::from_millis(250));
        assert_eq!(op.next().await, Err(Error::Timeout));
        assert!(!op.is_armed());

        drop(op);
        assert_eq!(bus.subscriber_count(RESP_CODE_OK), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_disarms() {
        let bus = EventBus::new();
        let mut op = PendingOperation::new(bus.subscribe(&[RESP_CODE_OK]));
        op.arm(Duration::from_millis(1));
        op.clear();

        let publisher = {
            let bus = bus.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                bus.publish(&Event::Ok);
            }
        };
        let (result, _) = tokio::join!(op.next(), publisher);
        assert_eq!(result, Ok(Event::Ok));
    }
}
