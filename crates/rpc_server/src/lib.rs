//! Neo N3 JSON-RPC 2.0 server with integrated WebSocket publish/subscribe
//! (SPEC_FULL.md). Mirrors the reference node's `crates/plugins/src/rpc_server`
//! module layout: one file per concern, a `handlers/` directory holding
//! one submodule per method group, and a `hub/` directory for the
//! subscription machinery.

pub mod chain;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod hash_types;
pub mod hub;
pub mod json_shapes;
pub mod metrics;
pub mod oracle;
pub mod p2p;
pub mod params;
pub mod server;
pub mod state_module;
pub mod transport;
pub mod tree;
pub mod tree_node;
pub mod types;
pub mod vm;
pub mod vm_invoker;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::RpcServerConfig;
pub use dispatcher::{Dispatcher, HandlerContext};
pub use error::{RpcError, RpcErrorKind, RpcException};
pub use server::{Collaborators, RpcServer};
