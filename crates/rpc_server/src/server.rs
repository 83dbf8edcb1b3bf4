//! Top-level server lifecycle (spec §4.A "Transport", §6 Configuration):
//! ties the collaborator set, dispatcher, subscription hub, and HTTP/WS
//! transport together behind `start`/`stop`. Grounded on the reference node's
//! `RpcServer::start_rpc_server` / `stop_rpc_server` / `register_handlers`
//! in `rpc_server.rs`, simplified to a single bound address: this core
//! targets one Neo N3 network per process, so the reference node's per-network
//! `SERVERS`/`PENDING_HANDLERS` static registry (keyed by network magic,
//! for hosting several `RpcServer` instances inside one node process) has
//! no counterpart here — see DESIGN.md.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chain::Chain;
use crate::config::RpcServerConfig;
use crate::dispatcher::Dispatcher;
use crate::handlers;
use crate::hub::event_loop::SubscriptionHub;
use crate::metrics::MetricsSink;
use crate::oracle::Oracle;
use crate::p2p::P2PServer;
use crate::state_module::StateModule;
use crate::transport::{build_routes, RpcTransport};

/// Bundles the four collaborator traits a running server needs (spec §6's
/// "Required chain capability set" plus the P2P/Oracle/StateModule
/// collaborators spec.md's Handler Set depends on).
pub struct Collaborators {
    pub chain: Arc<dyn Chain>,
    pub p2p: Arc<dyn P2PServer>,
    pub oracle: Arc<dyn Oracle>,
    pub state_module: Arc<dyn StateModule>,
}

pub struct RpcServer {
    config: Arc<RpcServerConfig>,
    collaborators: Collaborators,
    metrics: Arc<dyn MetricsSink>,
    hub: Arc<SubscriptionHub>,
    dispatcher: Arc<Dispatcher>,
    server_task: Option<JoinHandle<()>>,
    hub_task: Option<JoinHandle<()>>,
    shutdown_signal: Option<oneshot::Sender<()>>,
    started: bool,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, collaborators: Collaborators, metrics: Arc<dyn MetricsSink>) -> Self {
        let hub = SubscriptionHub::new(collaborators.chain.clone(), collaborators.p2p.clone(), metrics.clone());
        let mut dispatcher = Dispatcher::new(metrics.clone());
        handlers::register_all(&mut dispatcher);

        Self {
            config: Arc::new(config),
            collaborators,
            metrics,
            hub,
            dispatcher: Arc::new(dispatcher),
            server_task: None,
            hub_task: None,
            shutdown_signal: None,
            started: false,
        }
    }

    pub fn config(&self) -> &RpcServerConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Binds the HTTP/WebSocket listener and starts the hub's event loop
    /// task (spec §4.E "Event loop"). A no-op if already started, mirroring
    /// the reference node's idempotent `start_rpc_server`.
    pub fn start(&mut self) {
        if self.started {
            return;
        }

        if !self.config.enabled {
            info!("RPC server disabled by configuration, not starting");
            return;
        }

        if self.config.tls_config.enabled {
            warn!("RPC TLS certificates are not supported yet; continuing without TLS binding");
        }

        let transport = RpcTransport::new(
            self.dispatcher.clone(),
            self.config.clone(),
            self.collaborators.chain.clone(),
            self.collaborators.p2p.clone(),
            self.collaborators.oracle.clone(),
            self.collaborators.state_module.clone(),
            self.hub.clone(),
        );
        let routes = build_routes(transport);

        let address = SocketAddr::new(self.config.address, self.config.port);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (bound_addr, server) = warp::serve(routes).bind_with_graceful_shutdown(address, async move {
            let _ = shutdown_rx.await;
        });

        info!(address = %bound_addr, "RPC server bound");
        let server_task = tokio::spawn(server);
        let hub_task = tokio::spawn(self.hub.clone().run());

        self.shutdown_signal = Some(shutdown_tx);
        self.server_task = Some(server_task);
        self.hub_task = Some(hub_task);
        self.started = true;
    }

    /// Requests a graceful shutdown of both the HTTP listener and the hub's
    /// event loop. Does not block; spawns a task to await both join handles
    /// the way the reference node's `stop_rpc_server` avoids blocking its caller.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }

        if let Some(tx) = self.shutdown_signal.take() {
            let _ = tx.send(());
        }
        self.hub.request_shutdown();

        if let Some(server_task) = self.server_task.take() {
            tokio::spawn(async move {
                if let Err(err) = server_task.await {
                    log_join_error(err);
                }
            });
        }
        if let Some(hub_task) = self.hub_task.take() {
            tokio::spawn(async move {
                if let Err(err) = hub_task.await {
                    log_join_error(err);
                }
            });
        }

        info!("RPC server stopping");
        self.started = false;
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_join_error(err: tokio::task::JoinError) {
    if err.is_panic() {
        warn!("rpc server task panicked: {err}");
    } else {
        warn!("rpc server task cancelled: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::TestMetrics;
    use crate::test_support::{NullChain, NullOracle, NullP2P, NullStateModule};

    fn collaborators() -> Collaborators {
        Collaborators {
            chain: Arc::new(NullChain),
            p2p: Arc::new(NullP2P),
            oracle: Arc::new(NullOracle),
            state_module: Arc::new(NullStateModule),
        }
    }

    // `start` on a disabled server must not bind a listener or spawn the
    // hub's event loop, mirroring the reference node's config-gated startup.
    #[test]
    fn start_on_a_disabled_config_is_a_no_op() {
        let mut config = RpcServerConfig::default();
        config.enabled = false;
        let metrics: Arc<dyn MetricsSink> = Arc::new(TestMetrics::new());
        let mut server = RpcServer::new(config, collaborators(), metrics);

        assert!(!server.is_started());
        server.start();
        assert!(!server.is_started());
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let config = RpcServerConfig::default();
        let metrics: Arc<dyn MetricsSink> = Arc::new(TestMetrics::new());
        let mut server = RpcServer::new(config, collaborators(), metrics);
        server.stop();
        assert!(!server.is_started());
    }
}
