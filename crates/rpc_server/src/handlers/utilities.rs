//! Miscellaneous utility methods (spec §4.C "Utilities"). No teacher file
//! for this single-method module survived the retrieval pack's filtering;
//! built from the cross-file idiom the rest of `handlers/` establishes.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::RpcException;
use crate::params::Params;

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register("validateaddress", Arc::new(validate_address));
}

fn validate_address(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let address = params.string(0)?;
    let is_valid = ctx.chain.validate_address(&address);
    Ok(json!({ "address": address, "isvalid": is_valid }))
}
