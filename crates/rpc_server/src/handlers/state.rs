//! State-root queries (spec §4.C "State queries"), ported from the
//! teacher's `rpc_server_state.rs`.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::{invalid_params, RpcError, RpcException};
use crate::params::Params;

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register("getstateheight", Arc::new(get_state_height));
    dispatcher.register("getstateroot", Arc::new(get_state_root));
    dispatcher.register("getproof", Arc::new(get_proof));
    dispatcher.register("verifyproof", Arc::new(verify_proof));
    dispatcher.register("getstate", Arc::new(get_state));
    dispatcher.register("findstates", Arc::new(find_states));
}

fn get_state_height(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let (local, validated) = ctx.state_module.state_height();
    Ok(json!({ "localrootindex": local, "validatedrootindex": validated }))
}

fn get_state_root(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let index = params.u32(0)?;
    let root = ctx
        .state_module
        .state_root(index)
        .ok_or_else(RpcError::unknown_state_root)?;
    Ok(json!({
        "version": root.version,
        "index": root.index,
        "roothash": root.root_hash.to_string(),
        "witnesses": root.witness.map(|w| crate::json_shapes::witness_json(&w)).into_iter().collect::<Vec<_>>(),
    }))
}

/// Spec §4.C "fail with InvalidRequest when the node is configured to
/// keep only latest state and the requested root is not current".
fn assert_root_reachable(ctx: &HandlerContext<'_>, root: &crate::hash_types::UInt256) -> Result<(), RpcException> {
    if !ctx.state_module.keep_only_latest_state() {
        return Ok(());
    }
    let (local, _) = ctx.state_module.state_height();
    let current = ctx
        .state_module
        .state_root(local)
        .ok_or_else(RpcError::unknown_state_root)?;
    if &current.root_hash != root {
        return Err(RpcError::invalid_request()
            .with_data("node is configured to keep only the latest state")
            .into());
    }
    Ok(())
}

fn get_proof(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let root = params.uint256(0)?;
    assert_root_reachable(ctx, &root)?;
    let ident = params.contract_identifier(1)?;
    let contract = ctx.chain.contract_state(ident).ok_or_else(RpcError::unknown_contract)?;
    let key = params.base64_bytes(2)?;
    let proof = ctx
        .state_module
        .get_proof(&root, contract.id, &key)
        .ok_or_else(RpcError::unknown_storage_item)?;
    Ok(json!(BASE64_STANDARD.encode(proof)))
}

fn verify_proof(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let root = params.uint256(0)?;
    let proof = params.base64_bytes(1)?;
    let value = ctx
        .state_module
        .verify_proof(&root, &proof)
        .ok_or_else(|| invalid_params("proof does not verify against the given root"))?;
    Ok(json!(BASE64_STANDARD.encode(value)))
}

fn get_state(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let root = params.uint256(0)?;
    assert_root_reachable(ctx, &root)?;
    let ident = params.contract_identifier(1)?;
    let contract = ctx.chain.contract_state(ident).ok_or_else(RpcError::unknown_contract)?;
    let key = params.base64_bytes(2)?;
    let value = ctx
        .state_module
        .get_state(&root, contract.id, &key)
        .ok_or_else(RpcError::unknown_storage_item)?;
    Ok(json!(BASE64_STANDARD.encode(value)))
}

/// Spec §4.C "findstates composes a storage key from the contract id
/// (little-endian 32-bit prefix) ... signaling truncation when the
/// underlying store returned count+1 items."
fn find_states(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let root = params.uint256(0)?;
    assert_root_reachable(ctx, &root)?;
    let ident = params.contract_identifier(1)?;
    let contract = ctx.chain.contract_state(ident).ok_or_else(RpcError::unknown_contract)?;
    let prefix = params.base64_bytes(2)?;
    let from = params.base64_bytes_opt(3)?;
    let count = params.usize_or(4, ctx.config.max_find_result_items)?.min(ctx.config.max_find_result_items);

    let page = ctx
        .state_module
        .find_states(&root, contract.id, &prefix, from.as_deref(), count + 1);

    let truncated = page.entries.len() > count;
    let entries: Vec<Value> = page
        .entries
        .iter()
        .take(count)
        .map(|(key, value)| json!({ "key": BASE64_STANDARD.encode(key), "value": BASE64_STANDARD.encode(value) }))
        .collect();

    Ok(json!({
        "firstproof": page.first_proof.map(|p| BASE64_STANDARD.encode(p)),
        "lastproof": page.last_proof.map(|p| BASE64_STANDARD.encode(p)),
        "truncated": truncated || page.truncated,
        "results": entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcServerConfig;
    use crate::hash_types::UInt256;
    use crate::test_support::{NullChain, NullOracle, NullP2P, NullStateModule};

    fn context<'a>(
        chain: &'a NullChain,
        p2p: &'a NullP2P,
        oracle: &'a NullOracle,
        state_module: &'a NullStateModule,
        config: &'a RpcServerConfig,
    ) -> HandlerContext<'a> {
        HandlerContext { chain, p2p, oracle, state_module, config, subscriber: None, hub: None }
    }

    #[test]
    fn get_state_height_reports_local_and_validated_root_index() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[], "getstateheight");
        let result = get_state_height(&params, &ctx).unwrap();
        assert_eq!(result["localrootindex"], json!(0));
        assert_eq!(result["validatedrootindex"], json!(0));
    }

    #[test]
    fn get_state_root_is_unknown_when_module_has_no_root() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(0u32)], "getstateroot");
        let err = get_state_root(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::UnknownStateRoot);
    }

    // Scenario: a node with KeepOnlyLatestState enabled (as `NullStateModule`
    // always is) rejects `getstate` against any root before it ever looks at
    // the contract, once it cannot even resolve its own current root.
    #[test]
    fn get_state_rejects_when_current_root_cannot_be_resolved() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt256::zero().to_string()), json!("1"), json!("")], "getstate");
        let err = get_state(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::UnknownStateRoot);
    }

    #[test]
    fn verify_proof_rejects_a_proof_the_module_cannot_verify() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt256::zero().to_string()), json!("")], "verifyproof");
        let err = verify_proof(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InvalidParams);
    }
}
