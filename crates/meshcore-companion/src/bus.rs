//! Per-connection event bus.
//!
//! Every decoded [`Event`] is offered to each live subscription whose filter
//! accepts its code, in subscription order. A [`Subscription`] removes itself
//! from the bus when dropped, so a waiter that returns early (error, timeout,
//! cancelled future) never leaves a listener behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::responses::Event;

#[derive(Debug, Clone)]
enum Filter {
    Codes(Vec<u8>),
    All,
}

impl Filter {
    fn accepts(&self, code: u8) -> bool {
        match self {
            Filter::Codes(codes) => codes.contains(&code),
            Filter::All => true,
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    filter: Filter,
    sender: mpsc::UnboundedSender<Event>,
}

/// Dispatch table of live subscriptions.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(EventBus::default())
    }

    /// Listen for events with any of the given codes.
    pub fn subscribe(self: &Arc<Self>, codes: &[u8]) -> Subscription {
        self.add(Filter::Codes(codes.to_vec()))
    }

    /// Listen for every event.
    pub fn subscribe_all(self: &Arc<Self>) -> Subscription {
        self.add(Filter::All)
    }

    fn add(self: &Arc<Self>, filter: Filter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        trace!(id, ?filter, "subscribe");
        self.subscribers.lock().push(Subscriber { id, filter, sender });
        Subscription {
            id,
            bus: Arc::downgrade(self),
            receiver,
        }
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|s| s.id != id);
        trace!(id, "unsubscribe");
    }

    /// Deliver an event. Returns how many subscriptions received it.
    pub fn publish(&self, event: &Event) -> usize {
        let code = event.code();
        let subscribers = self.subscribers.lock();
        subscribers
            .iter()
            .filter(|s| s.filter.accepts(code))
            .filter(|s| s.sender.send(event.clone()).is_ok())
            .count()
    }

    /// Number of live subscriptions that would receive `code`.
    pub fn subscriber_count(&self, code: u8) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| s.filter.accepts(code))
            .count()
    }

    /// Number of live subscriptions of any kind.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving end of a bus subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<EventBus>,
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    /// Wait for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Take an already delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn test_publish_filters_by_code() {
        let bus = EventBus::new();
        let mut ok = bus.subscribe(&[RESP_CODE_OK, RESP_CODE_ERR]);
        let mut all = bus.subscribe_all();

        assert_eq!(bus.publish(&Event::Ok), 2);
        assert_eq!(bus.publish(&Event::MsgWaiting), 1);

        assert_eq!(ok.try_recv(), Some(Event::Ok));
        assert_eq!(ok.try_recv(), None);
        assert_eq!(all.try_recv(), Some(Event::Ok));
        assert_eq!(all.try_recv(), Some(Event::MsgWaiting));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let first = bus.subscribe(&[PUSH_CODE_SEND_CONFIRMED]);
        let _second = bus.subscribe(&[PUSH_CODE_SEND_CONFIRMED]);
        assert_eq!(bus.subscriber_count(PUSH_CODE_SEND_CONFIRMED), 2);

        drop(first);
        assert_eq!(bus.subscriber_count(PUSH_CODE_SEND_CONFIRMED), 1);
        assert_eq!(bus.subscriber_count(RESP_CODE_OK), 0);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_all();
        bus.publish(&Event::NoMoreMessages);
        drop(bus);

        assert_eq!(sub.try_recv(), Some(Event::NoMoreMessages));
        drop(sub);
    }

    #[tokio::test]
    async fn test_recv_after_bus_dropped() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&[RESP_CODE_OK]);
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
