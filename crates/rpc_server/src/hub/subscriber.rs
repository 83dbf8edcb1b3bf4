//! One subscriber per WebSocket connection (spec §3 "Subscriber"). Owns a
//! bounded outbound queue and a fixed-capacity feed-slot array; the hub
//! never holds a reference back into a subscriber's private state beyond
//! this handle (Design Notes §9 "Event fan-out without cycles").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{RpcError, RpcException};
use crate::hub::filter::{EventFilter, EventKind};

pub const OUTBOUND_CAPACITY: usize = 1024;
pub const MAX_FEEDS: usize = 16;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

pub struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Arc<str>>,
    feeds: parking_lot::Mutex<[Option<(EventKind, Option<EventFilter>)>; MAX_FEEDS]>,
    overflow: AtomicBool,
}

impl Subscriber {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_CAPACITY);
        let subscriber = Arc::new(Self {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            sender,
            feeds: parking_lot::Mutex::new([None, None, None, None, None, None, None, None, None, None, None, None, None, None, None, None]),
            overflow: AtomicBool::new(false),
        });
        (subscriber, receiver)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_overflowing(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }

    pub fn set_overflow(&self, value: bool) {
        self.overflow.store(value, Ordering::Release);
    }

    /// Non-blocking enqueue; `Err` means the outbound queue is full (the
    /// caller sets the overflow flag and schedules a MissedEvent notice).
    pub fn try_enqueue(&self, message: Arc<str>) -> Result<(), ()> {
        self.sender.try_send(message).map_err(|_| ())
    }

    /// Blocking send used only for the one-shot MissedEvent reconciling
    /// task (spec §4.E event loop pseudocode).
    pub async fn send_blocking(&self, message: Arc<str>) -> Result<(), ()> {
        self.sender.send(message).await.map_err(|_| ())
    }

    /// Assigns the lowest free feed slot. Returns `InternalServerError`
    /// when all 16 slots are occupied (spec §4.E `subscribe`).
    pub fn assign_feed(&self, kind: EventKind, filter: Option<EventFilter>) -> Result<usize, RpcException> {
        let mut feeds = self.feeds.lock();
        for (index, slot) in feeds.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some((kind, filter));
                return Ok(index);
            }
        }
        Err(RpcError::internal_server_error()
            .with_data("subscriber feed table full")
            .into())
    }

    /// Frees a feed slot, returning the kind that was occupying it so the
    /// hub can decrement its per-kind reference counter.
    pub fn free_feed(&self, index: usize) -> Result<EventKind, RpcException> {
        let mut feeds = self.feeds.lock();
        let slot = feeds
            .get_mut(index)
            .ok_or_else(|| RpcError::invalid_params().with_data("invalid subscription slot"))?;
        match slot.take() {
            Some((kind, _)) => Ok(kind),
            None => Err(RpcError::invalid_params().with_data("slot not active").into()),
        }
    }

    /// Active feeds that a given event kind should be matched against.
    pub fn feeds_for(&self, kind: EventKind) -> Vec<Option<EventFilter>> {
        self.feeds
            .lock()
            .iter()
            .filter_map(|slot| slot.as_ref())
            .filter(|(feed_kind, _)| *feed_kind == kind)
            .map(|(_, filter)| filter.clone())
            .collect()
    }

    /// All occupied slots, used to decrement every per-kind counter on
    /// disconnect (spec §3 "Subscriber" lifecycle).
    pub fn active_kinds(&self) -> Vec<EventKind> {
        self.feeds
            .lock()
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(kind, _)| *kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Testable property: unsubscribing frees a slot so a later subscribe
    // can reuse it, and the freed slot reports the kind it held.
    #[test]
    fn subscribe_unsubscribe_round_trip_reuses_slot() {
        let (subscriber, _rx) = Subscriber::new();
        let index = subscriber.assign_feed(EventKind::Block, None).expect("first slot");
        assert_eq!(index, 0);
        assert_eq!(subscriber.active_kinds(), vec![EventKind::Block]);

        let freed_kind = subscriber.free_feed(index).expect("free slot");
        assert_eq!(freed_kind, EventKind::Block);
        assert!(subscriber.active_kinds().is_empty());

        let reused = subscriber
            .assign_feed(EventKind::Transaction, None)
            .expect("slot should be free again");
        assert_eq!(reused, index);
    }

    #[test]
    fn free_feed_on_empty_slot_is_an_error() {
        let (subscriber, _rx) = Subscriber::new();
        let index = subscriber.assign_feed(EventKind::Block, None).unwrap();
        subscriber.free_feed(index).unwrap();
        assert!(subscriber.free_feed(index).is_err());
    }

    #[test]
    fn free_feed_out_of_range_is_invalid_params() {
        let (subscriber, _rx) = Subscriber::new();
        let err = subscriber.free_feed(MAX_FEEDS).unwrap_err();
        assert_eq!(err.error().kind(), RpcError::invalid_params().kind());
    }

    #[test]
    fn assign_feed_fails_once_all_sixteen_slots_are_taken() {
        let (subscriber, _rx) = Subscriber::new();
        for _ in 0..MAX_FEEDS {
            subscriber.assign_feed(EventKind::NotaryRequest, None).expect("free slot");
        }
        let err = subscriber.assign_feed(EventKind::NotaryRequest, None).unwrap_err();
        assert_eq!(err.error().kind(), RpcError::internal_server_error().kind());
    }

    // Overflow property: once the bounded outbound queue is full, the
    // (C+1)th non-blocking enqueue fails instead of blocking.
    #[test]
    fn try_enqueue_fails_once_outbound_queue_is_full() {
        let (subscriber, _rx) = Subscriber::new();
        for _ in 0..OUTBOUND_CAPACITY {
            subscriber
                .try_enqueue(Arc::from("event"))
                .expect("queue should still have room");
        }
        assert!(subscriber.try_enqueue(Arc::from("one too many")).is_err());
        assert!(!subscriber.is_overflowing());
        subscriber.set_overflow(true);
        assert!(subscriber.is_overflowing());
    }

    #[test]
    fn feeds_for_only_returns_matching_kind() {
        let (subscriber, _rx) = Subscriber::new();
        subscriber.assign_feed(EventKind::Block, None).unwrap();
        subscriber.assign_feed(EventKind::Transaction, None).unwrap();
        assert_eq!(subscriber.feeds_for(EventKind::Block).len(), 1);
        assert_eq!(subscriber.feeds_for(EventKind::Execution).len(), 0);
    }
}
