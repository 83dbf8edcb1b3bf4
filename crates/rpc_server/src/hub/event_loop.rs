//! Hub event loop (spec §4.E "Event loop"): a single task reads chain
//! event streams and demultiplexes to matched subscribers, honoring
//! reference counting, overflow, and ordering.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::chain::Chain;
use crate::hub::filter::{matches, ChainEvent, EventFilter, EventKind};
use crate::hub::subscriber::Subscriber;
use crate::metrics::MetricsSink;
use crate::p2p::P2PServer;

/// The subscriber set and per-kind reference counts share one lock (spec
/// §5 "Shared resource policy").
#[derive(Default)]
struct HubState {
    subscribers: HashMap<u64, Arc<Subscriber>>,
    refcounts: HashMap<EventKind, u32>,
}

pub struct SubscriptionHub {
    state: RwLock<HubState>,
    chain: Arc<dyn Chain>,
    p2p: Arc<dyn P2PServer>,
    metrics: Arc<dyn MetricsSink>,
    shutdown: tokio::sync::Notify,
    receivers: parking_lot::Mutex<HubReceivers>,
}

#[derive(Default)]
struct HubReceivers {
    blocks: Option<mpsc::Receiver<crate::types::BlockEvent>>,
    transactions: Option<mpsc::Receiver<crate::types::TransactionEvent>>,
    notifications: Option<mpsc::Receiver<crate::types::NotificationEvent>>,
    executions: Option<mpsc::Receiver<crate::types::ExecutionEvent>>,
    notary_requests: Option<mpsc::Receiver<crate::types::NotaryRequestEvent>>,
}

impl SubscriptionHub {
    pub fn new(chain: Arc<dyn Chain>, p2p: Arc<dyn P2PServer>, metrics: Arc<dyn MetricsSink>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(HubState::default()),
            chain,
            p2p,
            metrics,
            shutdown: tokio::sync::Notify::new(),
            receivers: parking_lot::Mutex::new(HubReceivers::default()),
        })
    }

    /// Current admitted subscriber count, used by the WebSocket upgrade
    /// path's admission check (spec §4.E "Upgrade path").
    pub fn subscriber_count(&self) -> usize {
        self.state.read().subscribers.len()
    }

    pub fn register(&self, subscriber: Arc<Subscriber>) {
        self.state.write().subscribers.insert(subscriber.id(), subscriber);
        self.metrics.gauge_subscribers(self.state.read().subscribers.len());
    }

    /// Called on connection teardown (spec §3 "Subscriber" lifecycle):
    /// decrements every feed's per-kind counter, unsubscribing from the
    /// chain on transition to zero.
    pub fn unregister(&self, subscriber: &Subscriber) {
        let active_kinds = subscriber.active_kinds();
        {
            let mut state = self.state.write();
            state.subscribers.remove(&subscriber.id());
            for kind in active_kinds {
                self.decrement_locked(&mut state, kind);
            }
        }
        self.metrics.gauge_subscribers(self.state.read().subscribers.len());
    }

    pub fn subscribe(
        &self,
        subscriber: &Subscriber,
        kind: EventKind,
        filter: Option<EventFilter>,
    ) -> Result<usize, crate::error::RpcException> {
        let slot = subscriber.assign_feed(kind, filter)?;
        let mut state = self.state.write();
        self.increment_locked(&mut state, kind);
        Ok(slot)
    }

    pub fn unsubscribe(&self, subscriber: &Subscriber, slot: usize) -> Result<(), crate::error::RpcException> {
        let kind = subscriber.free_feed(slot)?;
        let mut state = self.state.write();
        self.decrement_locked(&mut state, kind);
        Ok(())
    }

    fn increment_locked(&self, state: &mut HubState, kind: EventKind) {
        let count = state.refcounts.entry(kind).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.start_feed(kind);
        }
    }

    fn decrement_locked(&self, state: &mut HubState, kind: EventKind) {
        if let Some(count) = state.refcounts.get_mut(&kind) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.refcounts.remove(&kind);
                self.stop_feed(kind);
            }
        }
    }

    fn start_feed(&self, kind: EventKind) {
        debug!(?kind, "hub subscribing to chain stream");
        let mut receivers = self.receivers.lock();
        match kind {
            EventKind::Block => receivers.blocks = Some(self.chain.subscribe_blocks()),
            EventKind::Transaction => receivers.transactions = Some(self.chain.subscribe_transactions()),
            EventKind::Notification => receivers.notifications = Some(self.chain.subscribe_notifications()),
            EventKind::Execution => receivers.executions = Some(self.chain.subscribe_executions()),
            EventKind::NotaryRequest => receivers.notary_requests = Some(self.p2p.subscribe_notary_requests()),
        }
    }

    fn stop_feed(&self, kind: EventKind) {
        debug!(?kind, "hub unsubscribing from chain stream");
        let mut receivers = self.receivers.lock();
        match kind {
            EventKind::Block => {
                receivers.blocks = None;
                self.chain.unsubscribe_blocks();
            }
            EventKind::Transaction => {
                receivers.transactions = None;
                self.chain.unsubscribe_transactions();
            }
            EventKind::Notification => {
                receivers.notifications = None;
                self.chain.unsubscribe_notifications();
            }
            EventKind::Execution => {
                receivers.executions = None;
                self.chain.unsubscribe_executions();
            }
            EventKind::NotaryRequest => {
                receivers.notary_requests = None;
                self.p2p.unsubscribe_notary_requests();
            }
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// The hub's single event-loop task (spec §4.E pseudocode).
    pub async fn run(self: Arc<Self>) {
        loop {
            let event = {
                let mut receivers = self.receivers.lock();
                // Each branch below only fires once a feed is active for
                // that kind (`start_feed` populates the slot); a `None`
                // receiver degenerates to `pending()` so `select!` skips it.
                tokio::select! {
                    biased;
                    _ = self.shutdown.notified() => None,
                    Some(event) = recv_or_pending(&mut receivers.blocks) => Some(ChainEvent::Block(event)),
                    Some(event) = recv_or_pending(&mut receivers.transactions) => Some(ChainEvent::Transaction(event)),
                    Some(event) = recv_or_pending(&mut receivers.notifications) => Some(ChainEvent::Notification(event)),
                    Some(event) = recv_or_pending(&mut receivers.executions) => Some(ChainEvent::Execution(event)),
                    Some(event) = recv_or_pending(&mut receivers.notary_requests) => Some(ChainEvent::NotaryRequest(event)),
                }
            };

            let event = match event {
                Some(event) => event,
                None => break,
            };

            self.fan_out(event).await;
        }

        self.drain_on_shutdown();
    }

    async fn fan_out(&self, event: ChainEvent) {
        let kind = event.kind();
        let mut prepared: Option<Arc<str>> = None;

        let subscribers: Vec<Arc<Subscriber>> = self.state.read().subscribers.values().cloned().collect();
        for subscriber in subscribers {
            if subscriber.is_overflowing() {
                continue;
            }
            let feeds = subscriber.feeds_for(kind);
            let matched = feeds.iter().any(|filter| matches(filter.as_ref(), &event));
            if !matched {
                continue;
            }

            if prepared.is_none() {
                prepared = Some(prepare_message(&event));
            }
            let message = prepared.clone().unwrap();

            if subscriber.try_enqueue(message).is_err() {
                subscriber.set_overflow(true);
                let subscriber = subscriber.clone();
                tokio::spawn(async move {
                    let notice: Arc<str> = Arc::from(missed_event_notice());
                    let _ = subscriber.send_blocking(notice).await;
                    subscriber.set_overflow(false);
                });
            }
        }
    }

    fn drain_on_shutdown(&self) {
        trace!("hub draining residual state on shutdown");
        let mut state = self.state.write();
        let kinds: Vec<EventKind> = state.refcounts.keys().copied().collect();
        for kind in kinds {
            self.stop_feed(kind);
        }
        state.refcounts.clear();
    }
}

/// Polls a per-kind receiver slot, or never resolves when the slot is
/// `None` (no active subscribers for that kind) — lets `tokio::select!`
/// skip inactive branches cleanly.
async fn recv_or_pending<T>(slot: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match slot {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

fn prepare_message(event: &ChainEvent) -> Arc<str> {
    let (method, payload) = match event {
        ChainEvent::Block(e) => ("block_added", json!([e.block.header.hash.to_string()])),
        ChainEvent::Transaction(e) => ("transaction_added", json!([e.transaction.hash.to_string()])),
        ChainEvent::Notification(e) => (
            "notification_from_execution",
            json!([{
                "contract": e.script_hash.to_string(),
                "eventname": e.event_name,
            }]),
        ),
        ChainEvent::Execution(e) => (
            "transaction_executed",
            json!([{
                "container": e.container.to_string(),
                "vmstate": if e.state == crate::types::ExecutionState::Halt { "HALT" } else { "FAULT" },
                "gasconsumed": e.gas_consumed.to_string(),
            }]),
        ),
        ChainEvent::NotaryRequest(e) => (
            "notary_request_event",
            json!([e.request.main_transaction.hash.to_string()]),
        ),
    };

    let envelope: Value = json!({
        "jsonrpc": "2.0",
        "method": "notification",
        "params": { "event": method, "payload": payload }
    });
    Arc::from(envelope.to_string())
}

fn missed_event_notice() -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "notification",
        "params": { "event": "missed_event", "payload": Value::Array(vec![]) }
    })
    .to_string()
}
