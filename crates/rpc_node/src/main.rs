//! Demo Neo N3 node daemon: wires in-memory `Chain`/`P2PServer`/`Oracle`/
//! `StateModule` collaborators into `neo-rpc-server` and runs until
//! Ctrl+C, producing one synthetic block every few seconds so
//! `getblockcount`, `block_added` subscriptions, and friends have
//! something to observe. A real deployment replaces these collaborators
//! with ledger/P2P/oracle/state-service implementations; the server and
//! its dispatcher never change.
//!
//! Usage:
//!   neo-rpc-node

mod chain;
mod oracle;
mod p2p;
mod state;

use std::sync::Arc;
use std::time::Duration;

use neo_rpc_server::metrics::PrometheusMetrics;
use neo_rpc_server::{Collaborators, RpcServer, RpcServerConfig};
use tokio::signal;
use tokio::time::interval;
use tracing::info;
use tracing_subscriber::EnvFilter;

const BLOCK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    init_tracing();

    let mut config = RpcServerConfig::default();
    config.port = std::env::var("NEO_RPC_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(config.port);

    let chain = chain::InMemoryChain::new();
    let p2p = p2p::InMemoryP2P::new(config.port + 1);
    let oracle = oracle::InMemoryOracle::new();
    let state_module = state::InMemoryStateModule::new();

    let collaborators = Collaborators {
        chain: chain.clone(),
        p2p,
        oracle,
        state_module: state_module.clone(),
    };

    let metrics = Arc::new(PrometheusMetrics);
    let mut server = RpcServer::new(config, collaborators, metrics);
    server.start();

    info!(address = %server.config().address, port = server.config().port, "neo-rpc-node started; press Ctrl+C to stop");

    let producer = tokio::spawn({
        let chain = chain.clone();
        let state_module = state_module.clone();
        async move {
            let mut ticker = interval(BLOCK_INTERVAL);
            loop {
                ticker.tick().await;
                chain.produce_block();
                state_module.advance(chain.current_block_height());
            }
        }
    });

    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to wait for shutdown signal");
    } else {
        info!("shutdown signal received (Ctrl+C)");
    }

    producer.abort();
    server.stop();
    info!("neo-rpc-node stopped");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}
