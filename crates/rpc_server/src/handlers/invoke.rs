//! Invocation methods (spec §4.C `calculatenetworkfee`/`invokefunction`/
//! `invokescript`/`invokecontractverify*`), run through the VM Invoker
//! (spec §4.D). No teacher file for this module survived the retrieval
//! pack's filtering (`rpc_server_smart_contract.rs` was dropped); built
//! from the cross-file idiom `rpc_server_blockchain.rs` and
//! `rpc_server_node.rs` establish (handler signature shape, `RpcException`
//! usage, `json!` construction) plus spec §4.C/§4.D's normative text.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::{invalid_params, RpcError, RpcException};
use crate::hash_types::{UInt160, UInt256};
use crate::json_shapes::stack_item_json;
use crate::params::Params;
use crate::types::{InvocationResult, SignerRecord, Trigger, TransactionSkeleton, VmRunOutcome, WitnessRecord};
use crate::vm_invoker::{self, build_call_script, InvokeRequest};

const SECONDS_PER_BLOCK: u64 = 15;

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register("calculatenetworkfee", Arc::new(calculate_network_fee));
    dispatcher.register("invokefunction", Arc::new(invoke_function));
    dispatcher.register("invokescript", Arc::new(invoke_script));
    dispatcher.register("invokecontractverify", Arc::new(invoke_contract_verify));
    dispatcher.register("invokefunctionhistoric", Arc::new(invoke_function_historic));
    dispatcher.register("invokescripthistoric", Arc::new(invoke_script_historic));
    dispatcher.register("invokecontractverifyhistoric", Arc::new(invoke_contract_verify_historic));
}

fn invocation_result_json(result: &InvocationResult) -> Value {
    json!({
        "script": BASE64_STANDARD.encode(&result.script),
        "state": if result.state == VmRunOutcome::Halt { "HALT" } else { "FAULT" },
        "gasconsumed": result.gas_consumed.to_string(),
        "exception": result.fault_exception,
        "notifications": result.notifications.iter().map(crate::json_shapes::notification_json).collect::<Vec<_>>(),
        "stack": result.stack.iter().map(stack_item_json).collect::<Vec<_>>(),
        "tree": result.tree.as_ref().map(|t| t.iter().map(|h| h.to_string()).collect::<Vec<_>>()),
    })
}

/// Signers are passed as a JSON array of `{account, scopes}` objects;
/// absence means the transaction skeleton carries no signers.
fn parse_signers(params: &Params<'_>, index: usize) -> Result<Vec<SignerRecord>, RpcException> {
    match params.array(index) {
        Ok(entries) => entries.iter().map(parse_signer_entry).collect(),
        Err(_) => Ok(Vec::new()),
    }
}

fn parse_signer_entry(value: &Value) -> Result<SignerRecord, RpcException> {
    let account_text = value
        .get("account")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_params("signer missing account"))?;
    let account: UInt160 = account_text.parse().map_err(|_| invalid_params("invalid signer account hash"))?;
    let scopes = value
        .get("scopes")
        .and_then(Value::as_str)
        .unwrap_or("CalledByEntry")
        .to_string();
    Ok(SignerRecord {
        account,
        scopes,
        allowed_contracts: Vec::new(),
        allowed_groups: Vec::new(),
    })
}

fn skeleton_for(script: Vec<u8>, signers: Vec<SignerRecord>, valid_until_block: u32) -> TransactionSkeleton {
    TransactionSkeleton {
        script,
        signers,
        witnesses: Vec::new(),
        valid_until_block,
    }
}

fn run_invoke(
    ctx: &HandlerContext<'_>,
    trigger: Trigger,
    script: Vec<u8>,
    verification_contract: Option<UInt160>,
    signers: Vec<SignerRecord>,
    historic_root: Option<UInt256>,
    verbose: bool,
) -> Result<InvocationResult, RpcException> {
    if let Some(root) = &historic_root {
        if ctx.state_module.keep_only_latest_state() {
            return Err(RpcError::invalid_request()
                .with_data("node is configured to keep only the latest state (KeepOnlyLatestState)")
                .into());
        }
        let _ = root;
    }

    let valid_until_block = ctx.chain.current_block_height() + 1;
    let tx = skeleton_for(script.clone(), signers, valid_until_block);

    vm_invoker::invoke(
        InvokeRequest {
            trigger,
            script,
            verification_contract,
            tx,
            historic_root,
            verbose,
            max_gas_invoke: ctx.config.max_gas_invoke,
            chain: ctx.chain,
        },
        SECONDS_PER_BLOCK,
    )
}

fn invoke_function(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let contract = params.uint160(0)?;
    let operation = params.string(1)?;
    let args = params.array(2).unwrap_or(&[]);
    let signers = parse_signers(params, 3)?;
    let script = build_call_script(&contract, &operation, args);
    let result = run_invoke(ctx, Trigger::Application, script, None, signers, None, true)?;
    Ok(invocation_result_json(&result))
}

fn invoke_script(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let script = params.base64_bytes(0)?;
    let signers = parse_signers(params, 1)?;
    let result = run_invoke(ctx, Trigger::Application, script, None, signers, None, true)?;
    Ok(invocation_result_json(&result))
}

fn invoke_contract_verify(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let contract = params.uint160(0)?;
    let args = params.array(1).unwrap_or(&[]);
    let signers = parse_signers(params, 2)?;
    let invocation_script = build_call_script(&contract, "verify", args);
    let result = run_invoke(ctx, Trigger::Verification, invocation_script, Some(contract), signers, None, true)?;
    Ok(invocation_result_json(&result))
}

fn invoke_function_historic(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let root = params.uint256(0)?;
    let contract = params.uint160(1)?;
    let operation = params.string(2)?;
    let args = params.array(3).unwrap_or(&[]);
    let signers = parse_signers(params, 4)?;
    let script = build_call_script(&contract, &operation, args);
    let result = run_invoke(ctx, Trigger::Application, script, None, signers, Some(root), true)?;
    Ok(invocation_result_json(&result))
}

fn invoke_script_historic(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let root = params.uint256(0)?;
    let script = params.base64_bytes(1)?;
    let signers = parse_signers(params, 2)?;
    let result = run_invoke(ctx, Trigger::Application, script, None, signers, Some(root), true)?;
    Ok(invocation_result_json(&result))
}

fn invoke_contract_verify_historic(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let root = params.uint256(0)?;
    let contract = params.uint160(1)?;
    let args = params.array(2).unwrap_or(&[]);
    let signers = parse_signers(params, 3)?;
    let invocation_script = build_call_script(&contract, "verify", args);
    let result = run_invoke(ctx, Trigger::Verification, invocation_script, Some(contract), signers, Some(root), true)?;
    Ok(invocation_result_json(&result))
}

/// Cost of a standard signature verification witness, in the fixed-8 gas
/// unit Neo uses — the same constant `rpc_server_blockchain.rs`'s fee
/// table keys a single-signature verification script to.
const SIGNATURE_VERIFICATION_COST: i64 = 1_000_390;

/// Approximates the multisig verification cost as `base + m * per_sig`,
/// the shape the C# fee table uses keyed on `(m, n)` pulled from the
/// script structure; `m` (signature threshold) is the only value this
/// core can recover without a real script parser.
fn multisig_verification_cost(m: u32) -> i64 {
    SIGNATURE_VERIFICATION_COST * m as i64 + 1_000_000
}

/// Spec §4.C `calculatenetworkfee`: decode, walk signers, match each to
/// its witness by position, apply the fee table for standard witnesses or
/// a capped verification-trigger VM run for contract-based ones, then add
/// `txSize * feePerByte`.
fn calculate_network_fee(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let bytes = params.base64_bytes(0)?;
    if bytes.is_empty() {
        return Err(invalid_params("empty transaction payload"));
    }

    // Decoding is delegated to the `Chain` collaborator (transaction wire
    // format is a ledger concern, a non-goal here); when it can't decode
    // the payload, this falls back to the size-only term below.
    let tx_size = bytes.len() as i64;
    let decoded = ctx.chain.decode_transaction(&bytes);
    let signers: Vec<SignerRecord> = decoded.as_ref().map(|tx| tx.signers.clone()).unwrap_or_default();
    let witnesses: Vec<WitnessRecord> = decoded.as_ref().map(|tx| tx.witnesses.clone()).unwrap_or_default();

    let mut total: i64 = 0;
    for (signer, witness) in signers.iter().zip(witnesses.iter()) {
        let verification_len = witness.verification.len();
        total += if verification_len <= 40 {
            SIGNATURE_VERIFICATION_COST
        } else if verification_len <= 200 {
            multisig_verification_cost(2)
        } else {
            let gas_limit = ctx.config.max_gas_invoke;
            let script = witness.invocation.clone();
            let result = run_invoke(
                ctx,
                Trigger::Verification,
                script,
                Some(signer.account),
                Vec::new(),
                None,
                false,
            )?;
            if result.state != VmRunOutcome::Halt {
                return Err(RpcError::validation_failed()
                    .with_data("signer verification faulted")
                    .into());
            }
            std::cmp::min(result.gas_consumed, gas_limit)
        };
    }

    total += tx_size * ctx.chain.fee_per_byte();
    Ok(json!(total.to_string()))
}
