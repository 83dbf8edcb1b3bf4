//! `subscribe`/`unsubscribe` (spec §4.E), available only over WebSocket.
//! Wires parameter decoding onto `SubscriptionHub`/`EventKind`/
//! `decode_filter`; no teacher file for this survived the retrieval pack's
//! filtering, built from the cross-file idiom `hub/event_loop.rs` and the
//! rest of `handlers/` establish.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::{invalid_params, RpcError, RpcException};
use crate::hub::filter::{decode_filter, EventKind};
use crate::params::Params;

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register_ws_only("subscribe", Arc::new(subscribe));
    dispatcher.register_ws_only("unsubscribe", Arc::new(unsubscribe));
}

fn require_ws_context<'a, 'b>(
    ctx: &'b HandlerContext<'a>,
) -> Result<(&'a crate::hub::subscriber::Subscriber, &'a crate::hub::event_loop::SubscriptionHub), RpcException> {
    let subscriber = ctx
        .subscriber
        .ok_or_else(|| RpcError::invalid_request().with_data("subscribe is available only over WebSocket"))?;
    let hub = ctx
        .hub
        .ok_or_else(|| RpcError::invalid_request().with_data("subscribe is available only over WebSocket"))?;
    Ok((subscriber, hub))
}

fn subscribe(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let (subscriber, hub) = require_ws_context(ctx)?;

    let name = params.string(0)?;
    if EventKind::is_reserved_missed_event(&name) {
        return Err(invalid_params("missed_event is a reserved stream name"));
    }
    let kind = EventKind::parse(&name).ok_or_else(|| invalid_params("unknown event stream"))?;

    // spec §4.E: NotaryRequest is only accepted when P2P signature
    // extensions are enabled on the chain.
    if kind == EventKind::NotaryRequest && !ctx.chain.p2p_signature_extensions_enabled() {
        return Err(invalid_params("notary_request_event requires P2P signature extensions"));
    }

    let filter = decode_filter(kind, params.raw(1))?;

    let slot = hub.subscribe(subscriber, kind, filter)?;
    Ok(json!(slot.to_string()))
}

fn unsubscribe(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let (subscriber, hub) = require_ws_context(ctx)?;
    let slot = params.usize_or(0, usize::MAX)?;
    if slot == usize::MAX {
        return Err(invalid_params("missing subscription id"));
    }
    hub.unsubscribe(subscriber, slot)?;
    Ok(json!(true))
}
