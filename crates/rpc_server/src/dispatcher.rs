//! Dispatcher (spec §4.B): method tables, parameter extraction handoff,
//! per-method counters, log-safe method name escaping. Mirrors the
//! teacher's `RpcServer::register_method` / `process_object` /
//! `handler_lookup` machinery in `rpc_server.rs`, generalized to route
//! through an injected `MetricsSink` instead of the `Lazy<Counter>`
//! statics (Design Notes §9).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::chain::Chain;
use crate::config::RpcServerConfig;
use crate::error::{RpcError, RpcException};
use crate::hub::event_loop::SubscriptionHub;
use crate::hub::subscriber::Subscriber;
use crate::metrics::MetricsSink;
use crate::oracle::Oracle;
use crate::p2p::P2PServer;
use crate::params::Params;
use crate::state_module::StateModule;

/// Everything a handler needs beyond its own parameters: the collaborator
/// set, the active config, and (only for `subscribe`/`unsubscribe`, which
/// are WebSocket-only) the calling connection's subscriber handle and the
/// hub it belongs to.
pub struct HandlerContext<'a> {
    pub chain: &'a dyn Chain,
    pub p2p: &'a dyn P2PServer,
    pub oracle: &'a dyn Oracle,
    pub state_module: &'a dyn StateModule,
    pub config: &'a RpcServerConfig,
    pub subscriber: Option<&'a Subscriber>,
    pub hub: Option<&'a SubscriptionHub>,
}

pub type RpcHandler = Arc<dyn Fn(&Params, &HandlerContext) -> Result<Value, RpcException> + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    http_methods: HashMap<String, RpcHandler>,
    ws_only_methods: HashMap<String, RpcHandler>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl Dispatcher {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            http_methods: HashMap::new(),
            ws_only_methods: HashMap::new(),
            metrics: Some(metrics),
        }
    }

    /// Mirrors `RpcServer::register_method`: lower-cased key, last
    /// registration wins.
    pub fn register(&mut self, name: &str, handler: RpcHandler) {
        self.http_methods.insert(name.to_ascii_lowercase(), handler);
    }

    pub fn register_ws_only(&mut self, name: &str, handler: RpcHandler) {
        self.ws_only_methods.insert(name.to_ascii_lowercase(), handler);
    }

    /// Dispatches one decoded invocation. `allow_ws_only` is set only for
    /// connections that completed the `/ws` upgrade (spec §4.B: the
    /// subscribe/unsubscribe table is "available only over WebSocket").
    pub fn dispatch(
        &self,
        method: &str,
        params: &[Value],
        ctx: &HandlerContext<'_>,
        allow_ws_only: bool,
    ) -> Result<Value, RpcError> {
        let key = method.to_ascii_lowercase();

        if ctx.config.disabled_methods.iter().any(|m| m.eq_ignore_ascii_case(&key)) {
            return Err(self.record_error(&key, RpcError::invalid_request().with_data("method disabled")));
        }

        let handler = self
            .http_methods
            .get(&key)
            .or_else(|| allow_ws_only.then(|| self.ws_only_methods.get(&key)).flatten());

        let handler = match handler {
            Some(handler) => handler,
            None => return Err(self.record_error(&key, RpcError::method_not_found())),
        };

        if let Some(metrics) = &self.metrics {
            metrics.inc_request(&key);
        }

        let typed_params = Params::new(params, &key);
        match handler(&typed_params, ctx) {
            Ok(value) => Ok(value),
            Err(exception) => Err(self.record_error(&key, exception.into_error())),
        }
    }

    fn record_error(&self, method: &str, error: RpcError) -> RpcError {
        let safe_method = sanitize_method_name(method);
        if let Some(metrics) = &self.metrics {
            metrics.inc_error(&safe_method, error.kind().to_string().as_str());
        }
        if error.kind().is_error_level() {
            error!(method = %safe_method, error = %error, "rpc handler failed");
        } else {
            info!(method = %safe_method, error = %error, "rpc handler rejected request");
        }
        error
    }
}

/// Filters a method name to printable graphic code points before it ever
/// reaches a log line (spec §4.B "log-safe method name escaping"),
/// preventing terminal/log injection via control characters.
pub fn sanitize_method_name(method: &str) -> String {
    method
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(128)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_control_characters() {
        let raw = "getblockcount\n\r\x1b[31minjected";
        let safe = sanitize_method_name(raw);
        assert!(!safe.contains('\n'));
        assert!(!safe.contains('\x1b'));
    }

    #[test]
    fn unknown_method_yields_method_not_found() {
        let dispatcher = Dispatcher::new(Arc::new(crate::metrics::TestMetrics::new()));
        // No collaborators needed: dispatch short-circuits before calling a handler.
        let chain = crate::test_support::NullChain;
        let p2p = crate::test_support::NullP2P;
        let oracle = crate::test_support::NullOracle;
        let state_module = crate::test_support::NullStateModule;
        let config = RpcServerConfig::default();
        let ctx = HandlerContext {
            chain: &chain,
            p2p: &p2p,
            oracle: &oracle,
            state_module: &state_module,
            config: &config,
            subscriber: None,
            hub: None,
        };
        let err = dispatcher.dispatch("nope", &[], &ctx, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::RpcErrorKind::MethodNotFound);
    }
}
