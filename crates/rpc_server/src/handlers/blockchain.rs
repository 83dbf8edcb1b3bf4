//! Block/header/contract/mempool queries (spec §4.C), ported from the
//! teacher's `rpc_server_blockchain.rs`.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::{invalid_params, RpcError, RpcException};
use crate::json_shapes::{base64_block, base64_header, block_json, contract_state_json, header_json, transaction_json};
use crate::params::{BlockHashOrIndex, Params};
use crate::types::BlockHeaderData;

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register("getbestblockhash", Arc::new(get_best_block_hash));
    dispatcher.register("getblockcount", Arc::new(get_block_count));
    dispatcher.register("getblockheadercount", Arc::new(get_block_header_count));
    dispatcher.register("getblockhash", Arc::new(get_block_hash));
    dispatcher.register("getblock", Arc::new(get_block));
    dispatcher.register("getblockheader", Arc::new(get_block_header));
    dispatcher.register("getblocksysfee", Arc::new(get_block_sys_fee));
    dispatcher.register("getrawmempool", Arc::new(get_raw_mempool));
    dispatcher.register("getrawtransaction", Arc::new(get_raw_transaction));
    dispatcher.register("gettransactionheight", Arc::new(get_transaction_height));
    dispatcher.register("getcontractstate", Arc::new(get_contract_state));
    dispatcher.register("getnativecontracts", Arc::new(get_native_contracts));
    dispatcher.register("getstorage", Arc::new(get_storage));
    dispatcher.register("getcommittee", Arc::new(get_committee));
    dispatcher.register("getnextblockvalidators", Arc::new(get_next_block_validators));
    dispatcher.register("getapplicationlog", Arc::new(get_application_log));
}

/// Resolves a `BlockHashOrIndex` to a concrete header, bounds-checking an
/// index against `[0, currentHeight]` (spec §4.C "Block/header lookup").
fn resolve_header(ident: BlockHashOrIndex, ctx: &HandlerContext<'_>) -> Result<BlockHeaderData, RpcException> {
    let header = match ident {
        BlockHashOrIndex::Hash(hash) => ctx.chain.header_by_hash(&hash),
        BlockHashOrIndex::Index(index) => {
            if index > ctx.chain.current_header_height() {
                return Err(invalid_params("invalid block height"));
            }
            ctx.chain.header_by_index(index)
        }
    };
    header.ok_or_else(|| RpcError::unknown_block().into())
}

fn get_best_block_hash(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(json!(ctx.chain.best_block_hash().to_string()))
}

fn get_block_count(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(json!(ctx.chain.current_block_height() + 1))
}

fn get_block_header_count(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(json!(ctx.chain.current_header_height() + 1))
}

fn get_block_hash(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let index = params.u32(0)?;
    // Open Question #1 resolution (SPEC_FULL §9): index == currentHeight is valid and inclusive.
    if index > ctx.chain.current_header_height() {
        return Err(invalid_params("invalid block height"));
    }
    let hash = ctx
        .chain
        .block_hash_by_index(index)
        .ok_or_else(RpcError::unknown_block)?;
    Ok(json!(hash.to_string()))
}

fn get_block(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let ident = params.block_hash_or_index(0)?;
    let verbose = params.bool_or_default(1)?;

    let hash = match ident {
        BlockHashOrIndex::Hash(hash) => hash,
        BlockHashOrIndex::Index(index) => {
            if index > ctx.chain.current_header_height() {
                return Err(invalid_params("invalid block height"));
            }
            ctx.chain.block_hash_by_index(index).ok_or_else(RpcError::unknown_block)?
        }
    };
    let block = ctx.chain.block_by_hash(&hash).ok_or_else(RpcError::unknown_block)?;

    if verbose {
        Ok(block_json(&block))
    } else {
        Ok(json!(base64_block(&block)))
    }
}

fn get_block_header(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let ident = params.block_hash_or_index(0)?;
    let verbose = params.bool_or_default(1)?;
    let header = resolve_header(ident, ctx)?;
    if verbose {
        Ok(header_json(&header))
    } else {
        Ok(json!(base64_header(&header)))
    }
}

fn get_block_sys_fee(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let ident = params.block_hash_or_index(0)?;
    let hash = match ident {
        BlockHashOrIndex::Hash(hash) => hash,
        BlockHashOrIndex::Index(index) => {
            if index > ctx.chain.current_header_height() {
                return Err(invalid_params("invalid block height"));
            }
            ctx.chain.block_hash_by_index(index).ok_or_else(RpcError::unknown_block)?
        }
    };
    let block = ctx.chain.block_by_hash(&hash).ok_or_else(RpcError::unknown_block)?;
    let total: i64 = block.transactions.iter().map(|tx| tx.sys_fee).sum();
    Ok(json!(total.to_string()))
}

/// Spec §4.C "getrawmempool": verified-tx hashes; in verbose form also
/// returns the current height and an empty (never null) unverified list.
fn get_raw_mempool(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let verbose = params.bool_or_default(0)?;
    let snapshot = ctx.chain.mempool_snapshot();
    if verbose {
        Ok(json!({
            "height": snapshot.height,
            "verified": snapshot.verified.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
            "unverified": snapshot.unverified.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
        }))
    } else {
        Ok(json!(snapshot.verified.iter().map(|h| h.to_string()).collect::<Vec<_>>()))
    }
}

fn get_raw_transaction(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let hash = params.uint256(0)?;
    let verbose = params.bool_or_default(1)?;
    let tx = ctx.chain.transaction(&hash).ok_or_else(RpcError::unknown_transaction)?;
    if verbose {
        Ok(transaction_json(&tx))
    } else {
        use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
        use base64::Engine as _;
        Ok(json!(BASE64_STANDARD.encode(&tx.script)))
    }
}

/// Open Question #2 resolution (SPEC_FULL §9): mempool-resident (not yet
/// confirmed) transactions return `UnknownTransaction`.
fn get_transaction_height(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let hash = params.uint256(0)?;
    let tx = ctx.chain.transaction(&hash).ok_or_else(RpcError::unknown_transaction)?;
    match tx.block_hash {
        Some(block_hash) => {
            let header = ctx.chain.header_by_hash(&block_hash).ok_or_else(RpcError::unknown_block)?;
            Ok(json!(header.index))
        }
        None => Err(RpcError::unknown_transaction().into()),
    }
}

fn get_contract_state(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let ident = params.contract_identifier(0)?;
    let contract = ctx
        .chain
        .contract_state(ident)
        .ok_or_else(RpcError::unknown_contract)?;
    Ok(contract_state_json(&contract))
}

fn get_native_contracts(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(Value::Array(
        ctx.chain.native_contracts().iter().map(contract_state_json).collect(),
    ))
}

/// Open Question #3 resolution (SPEC_FULL §9): `UnknownContract` when the
/// contract identifier cannot be resolved; an `UnknownStorageItem`-shaped
/// `InternalServerError` when the contract resolves but the key is absent.
/// No variant returns a bare JSON `null`.
fn get_storage(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let ident = params.contract_identifier(0)?;
    let key = params.base64_bytes(1)?;

    let contract = ctx
        .chain
        .contract_state(ident)
        .ok_or_else(RpcError::unknown_contract)?;
    let value = ctx
        .chain
        .storage_item(contract.id, &key)
        .ok_or_else(RpcError::unknown_storage_item)?;

    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine as _;
    Ok(json!(BASE64_STANDARD.encode(value)))
}

fn get_committee(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(json!(ctx.chain.committee()))
}

fn get_next_block_validators(_params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    Ok(json!(ctx.chain.next_block_validators()))
}

fn get_application_log(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let hash = params.uint256(0)?;
    let tx = ctx.chain.transaction(&hash).ok_or_else(RpcError::unknown_transaction)?;
    Ok(json!({
        "txid": hash.to_string(),
        "executions": [{
            "trigger": "Application",
            "vmstate": tx.vm_state.clone().unwrap_or_else(|| "HALT".to_string()),
            "notifications": Value::Array(vec![]),
        }]
    }))
}
