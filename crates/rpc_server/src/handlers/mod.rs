//! Handler Set (spec §4.C): one module per collaborator area, each
//! exposing a `register_handlers(&mut Dispatcher)` that mirrors the
//! teacher's `RpcServerBlockchain::register_handlers()` /
//! `RpcServerNode::register_handlers()` pattern.

pub mod blockchain;
pub mod invoke;
pub mod node;
pub mod state;
pub mod subscribe;
pub mod tokens;
pub mod utilities;

use crate::dispatcher::Dispatcher;

pub fn register_all(dispatcher: &mut Dispatcher) {
    blockchain::register_handlers(dispatcher);
    node::register_handlers(dispatcher);
    state::register_handlers(dispatcher);
    invoke::register_handlers(dispatcher);
    tokens::register_handlers(dispatcher);
    utilities::register_handlers(dispatcher);
    subscribe::register_handlers(dispatcher);
}
