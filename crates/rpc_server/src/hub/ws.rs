//! WebSocket upgrade and per-connection reader/writer tasks (spec §4.E).
//! Grounded on `warp::ws`, which the reference node's `rpc_server.rs` already
//! pulls in transitively through `warp` — no extra dependency needed.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::debug;
use warp::ws::{Message, WebSocket};

use crate::codec::{decode_request, error_response, success_response, WireRequest};
use crate::config::RpcServerConfig;
use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::hub::event_loop::SubscriptionHub;
use crate::hub::subscriber::Subscriber;

const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);
const PING_PERIOD: Duration = Duration::from_secs(30);

/// Admission check (spec §4.E "Upgrade path"): advisory, a small race is
/// tolerated — excess connections close quickly on first overflow.
pub fn admit(hub_subscriber_count: usize, max_subscribers: usize) -> bool {
    hub_subscriber_count < max_subscribers
}

pub struct WsDeps {
    pub hub: Arc<SubscriptionHub>,
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<RpcServerConfig>,
    pub chain: Arc<dyn crate::chain::Chain>,
    pub p2p: Arc<dyn crate::p2p::P2PServer>,
    pub oracle: Arc<dyn crate::oracle::Oracle>,
    pub state_module: Arc<dyn crate::state_module::StateModule>,
}

pub async fn handle_connection(socket: WebSocket, deps: Arc<WsDeps>) {
    let (subscriber, mut outbound_rx) = Subscriber::new();
    deps.hub.register(subscriber.clone());

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (response_tx, mut response_rx) = tokio::sync::mpsc::channel::<Value>(64);

    let writer = tokio::spawn(async move {
        let mut ping_ticker = interval(PING_PERIOD);
        ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                Some(response) = response_rx.recv() => {
                    if write_with_deadline(&mut ws_tx, Message::text(response.to_string())).await.is_err() {
                        break;
                    }
                }
                Some(message) = outbound_rx.recv() => {
                    if write_with_deadline(&mut ws_tx, Message::text(message.to_string())).await.is_err() {
                        break;
                    }
                }
                _ = ping_ticker.tick() => {
                    if write_with_deadline(&mut ws_tx, Message::ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }

        // Drain the subscription channel so upstream producers (the hub's
        // fan-out task) never block on a dead writer (spec §4.E "Writer").
        while outbound_rx.try_recv().is_ok() {}
        let _ = ws_tx.close().await;
    });

    loop {
        let next = timeout(READ_IDLE_TIMEOUT, ws_rx.next()).await;
        let message = match next {
            Ok(Some(Ok(message))) => message,
            _ => break,
        };

        if message.is_ping() || message.is_pong() {
            continue;
        }
        if message.is_close() {
            break;
        }
        if !message.is_text() && !message.is_binary() {
            continue;
        }

        let body = message.as_bytes();
        let response = dispatch_ws_body(body, &deps, &subscriber);
        if response_tx.send(response).await.is_err() {
            break;
        }
    }

    deps.hub.unregister(&subscriber);
    drop(response_tx);
    let _ = writer.await;
    debug!(subscriber = subscriber.id(), "websocket connection closed");
}

async fn write_with_deadline(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
) -> Result<(), ()> {
    match timeout(WRITE_TIMEOUT, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcServerConfig;

    // Scenario (spec §8): with the default cap of 64 WebSocket clients, the
    // 65th connection attempt is refused admission.
    #[test]
    fn sixty_fifth_client_is_refused_admission_at_the_default_cap() {
        let max = RpcServerConfig::default().max_subscribers;
        assert_eq!(max, 64);
        for already_connected in 0..max {
            assert!(admit(already_connected, max), "client {already_connected} should be admitted");
        }
        assert!(!admit(max, max), "the 65th client must be refused");
    }
}

fn dispatch_ws_body(body: &[u8], deps: &WsDeps, subscriber: &Arc<Subscriber>) -> Value {
    let ctx = HandlerContext {
        chain: deps.chain.as_ref(),
        p2p: deps.p2p.as_ref(),
        oracle: deps.oracle.as_ref(),
        state_module: deps.state_module.as_ref(),
        config: deps.config.as_ref(),
        subscriber: Some(subscriber.as_ref()),
        hub: Some(deps.hub.as_ref()),
    };

    match decode_request(body) {
        Ok(WireRequest::Single(invocation)) => {
            match deps.dispatcher.dispatch(&invocation.method, &invocation.params, &ctx, true) {
                Ok(result) => success_response(invocation.id, result),
                Err(error) => error_response(invocation.id, &error),
            }
        }
        Ok(WireRequest::Batch(entries)) => {
            let responses: Vec<Value> = entries
                .into_iter()
                .map(|entry| match entry {
                    Ok(invocation) => {
                        match deps.dispatcher.dispatch(&invocation.method, &invocation.params, &ctx, true) {
                            Ok(result) => success_response(invocation.id, result),
                            Err(error) => error_response(invocation.id, &error),
                        }
                    }
                    Err((id, error)) => error_response(id, &error),
                })
                .collect();
            Value::Array(responses)
        }
        Err(error) => error_response(None, &error),
    }
}
