//! NEP-17/NEP-11 balance and transfer-history queries (spec §4.C "Token
//! queries"). No teacher file for this module survived the retrieval
//! pack's filtering; built from the cross-file idiom `blockchain.rs` and
//! `state.rs` establish, plus the normative iteration/window/cap rules
//! spec §4.C spells out for transfer history.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::{internal_error, invalid_params, RpcException};
use crate::hash_types::UInt160;
use crate::params::Params;
use crate::types::{Nep11TransferRecord, Nep17TransferRecord, StackItemData};
use crate::vm_invoker::{build_call_script, invoke_read_only};

const SECONDS_PER_BLOCK: u64 = 15;

pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher.register("getnep17balances", Arc::new(get_nep17_balances));
    dispatcher.register("getnep17transfers", Arc::new(get_nep17_transfers));
    dispatcher.register("getnep11balances", Arc::new(get_nep11_balances));
    dispatcher.register("getnep11transfers", Arc::new(get_nep11_transfers));
    dispatcher.register("getnep11properties", Arc::new(get_nep11_properties));
    dispatcher.register("getunclaimedgas", Arc::new(get_unclaimed_gas));
}

fn parse_address(params: &Params<'_>, index: usize) -> Result<UInt160, RpcException> {
    params.uint160(index)
}

/// `[start, end]` millisecond window (spec §4.C): both default to the
/// widest possible range when omitted, matching the way the C# server
/// treats absent timestamps as "since genesis"/"until now".
fn time_window(params: &Params<'_>, start_index: usize, end_index: usize, now_ms: u64) -> (u64, u64) {
    let week_ms = 7 * 24 * 60 * 60 * 1000;
    let start = params.u32_opt(start_index).map(u64::from).unwrap_or_else(|| now_ms.saturating_sub(week_ms));
    let end = params.u32_opt(end_index).map(u64::from).unwrap_or(now_ms);
    (start, end)
}

/// Spec §4.C token-transfer queries: `limit` defaults to 1000, capped at
/// 1000, and must be positive; `page` is zero-based and non-negative.
const MAX_TRANSFER_PAGE_SIZE: usize = 1000;

fn transfer_page_params(params: &Params<'_>, limit_index: usize, page_index: usize) -> Result<(usize, usize), RpcException> {
    let limit = params.usize_or(limit_index, MAX_TRANSFER_PAGE_SIZE)?;
    if limit == 0 || limit > MAX_TRANSFER_PAGE_SIZE {
        return Err(invalid_params("limit must be positive and at most 1000"));
    }
    let page = params.usize_or(page_index, 0)?;
    Ok((limit, page))
}

/// Applies `frameCount >= page*limit` to skip whole pages and
/// `resCount >= limit` to stop, over a transfer log already sorted
/// newest-first (spec §4.C).
fn paginate<T>(items: &[T], page: usize, limit: usize) -> &[T] {
    let skip = page.saturating_mul(limit).min(items.len());
    let remaining = &items[skip..];
    let end = remaining.len().min(limit);
    &remaining[..end]
}

fn balance_of(ctx: &HandlerContext<'_>, contract: &UInt160, account: &UInt160) -> Result<num_bigint::BigInt, RpcException> {
    let script = build_call_script(contract, "balanceOf", &[json!(account.to_string())]);
    let item = invoke_read_only(ctx.chain, script, ctx.config.max_gas_invoke, SECONDS_PER_BLOCK)?;
    match item {
        StackItemData::Integer(text) => text.parse().map_err(|_| internal_error("balanceOf returned a non-integer stack item")),
        _ => Err(internal_error("balanceOf returned an unexpected stack item type")),
    }
}

/// Spec §4.C "token balance queries skip zero balances and contracts that
/// no longer resolve".
fn get_nep17_balances(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let account = parse_address(params, 0)?;
    let transfers = ctx.chain.nep17_transfers(&account);

    let mut seen = std::collections::BTreeSet::new();
    let mut balances = Vec::new();
    for transfer in &transfers {
        if !seen.insert(transfer.asset_hash) {
            continue;
        }
        if ctx.chain.contract_state(crate::params::ContractIdentifier::Hash(transfer.asset_hash)).is_none() {
            continue;
        }
        let amount = match balance_of(ctx, &transfer.asset_hash, &account) {
            Ok(amount) => amount,
            Err(_) => continue,
        };
        if amount == num_bigint::BigInt::from(0) {
            continue;
        }
        let last_updated = transfers
            .iter()
            .filter(|t| t.asset_hash == transfer.asset_hash)
            .map(|t| t.transfer_notify_index)
            .max()
            .unwrap_or(0);
        balances.push(json!({
            "assethash": transfer.asset_hash.to_string(),
            "amount": amount.to_string(),
            "lastupdatedblock": last_updated,
        }));
    }

    Ok(json!({ "address": account.to_string(), "balance": balances }))
}

fn nep17_transfer_json(record: &Nep17TransferRecord) -> Value {
    json!({
        "timestamp": record.timestamp,
        "assethash": record.asset_hash.to_string(),
        "transferaddress": record.counterparty.map(|h| h.to_string()),
        "amount": record.amount.magnitude().to_string(),
        "blockindex": record.transfer_notify_index,
        "transfernotifyindex": record.transfer_notify_index,
        "txhash": record.tx_hash.map(|h| h.to_string()),
    })
}

fn get_nep17_transfers(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let account = parse_address(params, 0)?;
    let now_ms = ctx
        .chain
        .header_by_index(ctx.chain.current_block_height())
        .map(|h| h.timestamp)
        .unwrap_or(0);
    let (start, end) = time_window(params, 1, 2, now_ms);
    let (limit, page) = transfer_page_params(params, 3, 4)?;

    let mut transfers: Vec<_> = ctx
        .chain
        .nep17_transfers(&account)
        .into_iter()
        .filter(|t| t.timestamp >= start && t.timestamp <= end)
        .collect();
    transfers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let page = paginate(&transfers, page, limit);

    let (sent, received): (Vec<_>, Vec<_>) = page.iter().partition(|t| t.amount.sign() == num_bigint::Sign::Minus);

    Ok(json!({
        "address": account.to_string(),
        "sent": sent.into_iter().map(nep17_transfer_json).collect::<Vec<_>>(),
        "received": received.into_iter().map(nep17_transfer_json).collect::<Vec<_>>(),
    }))
}

fn tokens_of(ctx: &HandlerContext<'_>, contract: &UInt160, account: &UInt160) -> Result<Vec<Vec<u8>>, RpcException> {
    let script = build_call_script(contract, "tokensOf", &[json!(account.to_string())]);
    let item = invoke_read_only(ctx.chain, script, ctx.config.max_gas_invoke, SECONDS_PER_BLOCK)?;
    let ids = match item {
        StackItemData::Array(items) => items,
        other => vec![other],
    };
    let cap = ctx.config.max_nep11_tokens;
    Ok(ids
        .into_iter()
        .take(cap)
        .filter_map(|item| match item {
            StackItemData::ByteString(encoded) => BASE64_STANDARD.decode(encoded).ok(),
            _ => None,
        })
        .collect())
}

/// Spec §4.C "NEP-11 token-id hex emission": token ids render as lowercase
/// hex rather than base64, matching the convention the rest of the NEP-11
/// surface uses for identifiers.
fn hex_token_id(id: &[u8]) -> String {
    hex::encode(id)
}

fn get_nep11_balances(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let account = parse_address(params, 0)?;
    let transfers = ctx.chain.nep11_transfers(&account);

    let mut contracts = std::collections::BTreeSet::new();
    for transfer in &transfers {
        contracts.insert(transfer.asset_hash);
    }

    let mut balances = Vec::new();
    for contract_hash in contracts {
        if ctx.chain.contract_state(crate::params::ContractIdentifier::Hash(contract_hash)).is_none() {
            continue;
        }
        let token_ids = match tokens_of(ctx, &contract_hash, &account) {
            Ok(ids) => ids,
            Err(_) => continue,
        };
        if token_ids.is_empty() {
            continue;
        }
        let mut tokens = Vec::new();
        for token_id in &token_ids {
            let last_updated = transfers
                .iter()
                .filter(|t| t.asset_hash == contract_hash && t.token_id.as_deref() == Some(token_id.as_slice()))
                .map(|t| t.transfer_notify_index)
                .max()
                .unwrap_or(0);
            let amount = balance_of(ctx, &contract_hash, &account).unwrap_or_default();
            tokens.push(json!({
                "tokenid": hex_token_id(token_id),
                "amount": amount.to_string(),
                "lastupdatedblock": last_updated,
            }));
        }
        balances.push(json!({ "assethash": contract_hash.to_string(), "tokens": tokens }));
    }

    Ok(json!({ "address": account.to_string(), "balance": balances }))
}

fn nep11_transfer_json(record: &Nep11TransferRecord) -> Value {
    json!({
        "timestamp": record.timestamp,
        "assethash": record.asset_hash.to_string(),
        "transferaddress": record.counterparty.map(|h| h.to_string()),
        "amount": record.amount.magnitude().to_string(),
        "blockindex": record.transfer_notify_index,
        "transfernotifyindex": record.transfer_notify_index,
        "txhash": record.tx_hash.map(|h| h.to_string()),
        "tokenid": record.token_id.as_deref().map(hex_token_id),
    })
}

fn get_nep11_transfers(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let account = parse_address(params, 0)?;
    let now_ms = ctx
        .chain
        .header_by_index(ctx.chain.current_block_height())
        .map(|h| h.timestamp)
        .unwrap_or(0);
    let (start, end) = time_window(params, 1, 2, now_ms);
    let (limit, page) = transfer_page_params(params, 3, 4)?;

    let mut transfers: Vec<_> = ctx
        .chain
        .nep11_transfers(&account)
        .into_iter()
        .filter(|t| t.timestamp >= start && t.timestamp <= end)
        .collect();
    transfers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let page = paginate(&transfers, page, limit);

    let (sent, received): (Vec<_>, Vec<_>) = page.iter().partition(|t| t.amount.sign() == num_bigint::Sign::Minus);

    Ok(json!({
        "address": account.to_string(),
        "sent": sent.into_iter().map(nep11_transfer_json).collect::<Vec<_>>(),
        "received": received.into_iter().map(nep11_transfer_json).collect::<Vec<_>>(),
    }))
}

fn stack_item_to_json_value(item: &StackItemData) -> Value {
    match item {
        StackItemData::ByteString(s) => json!(s),
        StackItemData::Integer(s) => json!(s),
        StackItemData::Boolean(b) => json!(b),
        other => crate::json_shapes::stack_item_json(other),
    }
}

fn get_nep11_properties(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let contract = params.uint160(0)?;
    let token_id = params.base64_bytes(1)?;
    if ctx.chain.contract_state(crate::params::ContractIdentifier::Hash(contract)).is_none() {
        return Err(crate::error::RpcError::unknown_contract().into());
    }

    let script = build_call_script(&contract, "properties", &[json!(BASE64_STANDARD.encode(&token_id))]);
    let item = invoke_read_only(ctx.chain, script, ctx.config.max_gas_invoke, SECONDS_PER_BLOCK)?;

    match item {
        StackItemData::Map(entries) => {
            let mut object = serde_json::Map::new();
            for (key, value) in entries {
                let key_text = match key {
                    StackItemData::ByteString(s) => s,
                    other => stack_item_to_json_value(&other).to_string(),
                };
                object.insert(key_text, stack_item_to_json_value(&value));
            }
            Ok(Value::Object(object))
        }
        other => Err(internal_error(format!("properties returned unexpected stack item {other:?}"))),
    }
}

fn get_unclaimed_gas(params: &Params<'_>, ctx: &HandlerContext<'_>) -> Result<Value, RpcException> {
    let account = parse_address(params, 0)?;
    if params.is_empty() {
        return Err(invalid_params("missing account address"));
    }
    let unclaimed = ctx.chain.claimable_gas(&account);
    Ok(json!({ "unclaimed": unclaimed.to_string(), "address": account.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcServerConfig;
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

    /// Wraps `NullChain` with a fixed NEP-17 transfer log so pagination can
    /// be exercised without a real chain backend.
    struct TransferChain {
        inner: NullChain,
        nep17: Vec<Nep17TransferRecord>,
    }

    impl crate::chain::Chain for TransferChain {
        fn current_block_height(&self) -> u32 {
            self.inner.current_block_height()
        }
        fn current_header_height(&self) -> u32 {
            self.inner.current_header_height()
        }
        fn best_block_hash(&self) -> crate::hash_types::UInt256 {
            self.inner.best_block_hash()
        }
        fn block_hash_by_index(&self, index: u32) -> Option<crate::hash_types::UInt256> {
            self.inner.block_hash_by_index(index)
        }
        fn header_by_index(&self, index: u32) -> Option<crate::types::BlockHeaderData> {
            self.inner.header_by_index(index)
        }
        fn header_by_hash(&self, hash: &crate::hash_types::UInt256) -> Option<crate::types::BlockHeaderData> {
            self.inner.header_by_hash(hash)
        }
        fn block_by_index(&self, index: u32) -> Option<crate::types::BlockData> {
            self.inner.block_by_index(index)
        }
        fn block_by_hash(&self, hash: &crate::hash_types::UInt256) -> Option<crate::types::BlockData> {
            self.inner.block_by_hash(hash)
        }
        fn mempool_snapshot(&self) -> crate::types::MempoolSnapshot {
            self.inner.mempool_snapshot()
        }
        fn transaction(&self, hash: &crate::hash_types::UInt256) -> Option<crate::types::TransactionRecord> {
            self.inner.transaction(hash)
        }
        fn decode_transaction(&self, bytes: &[u8]) -> Option<crate::types::TransactionRecord> {
            self.inner.decode_transaction(bytes)
        }
        fn contract_state(&self, id: crate::params::ContractIdentifier) -> Option<crate::types::ContractStateData> {
            self.inner.contract_state(id)
        }
        fn native_contracts(&self) -> Vec<crate::types::ContractStateData> {
            self.inner.native_contracts()
        }
        fn storage_item(&self, contract_id: i32, key: &[u8]) -> Option<Vec<u8>> {
            self.inner.storage_item(contract_id, key)
        }
        fn governing_token_balance(&self, account: &UInt160) -> num_bigint::BigInt {
            self.inner.governing_token_balance(account)
        }
        fn claimable_gas(&self, account: &UInt160) -> num_bigint::BigInt {
            self.inner.claimable_gas(account)
        }
        fn nep17_transfers(&self, _account: &UInt160) -> Vec<Nep17TransferRecord> {
            self.nep17.clone()
        }
        fn nep11_transfers(&self, account: &UInt160) -> Vec<Nep11TransferRecord> {
            self.inner.nep11_transfers(account)
        }
        fn verify_witnesses(&self, tx: &crate::types::TransactionRecord, gas_limit: i64) -> bool {
            self.inner.verify_witnesses(tx, gas_limit)
        }
        fn base_exec_fee(&self) -> i64 {
            self.inner.base_exec_fee()
        }
        fn fee_per_byte(&self) -> i64 {
            self.inner.fee_per_byte()
        }
        fn policy(&self) -> crate::types::PolicyParameters {
            self.inner.policy()
        }
        fn p2p_signature_extensions_enabled(&self) -> bool {
            self.inner.p2p_signature_extensions_enabled()
        }
        fn committee(&self) -> Vec<String> {
            self.inner.committee()
        }
        fn next_block_validators(&self) -> Vec<String> {
            self.inner.next_block_validators()
        }
        fn validate_address(&self, text: &str) -> bool {
            self.inner.validate_address(text)
        }
        fn test_vm_factory(&self) -> Arc<dyn crate::vm::TestVmFactory> {
            self.inner.test_vm_factory()
        }
        fn submit_block(&self, block: crate::types::BlockData) -> crate::types::RelayOutcome {
            self.inner.submit_block(block)
        }
        fn submit_transaction(&self, tx: crate::types::TransactionRecord) -> crate::types::RelayOutcome {
            self.inner.submit_transaction(tx)
        }
        fn subscribe_blocks(&self) -> tokio::sync::mpsc::Receiver<crate::types::BlockEvent> {
            self.inner.subscribe_blocks()
        }
        fn subscribe_transactions(&self) -> tokio::sync::mpsc::Receiver<crate::types::TransactionEvent> {
            self.inner.subscribe_transactions()
        }
        fn subscribe_notifications(&self) -> tokio::sync::mpsc::Receiver<crate::types::NotificationEvent> {
            self.inner.subscribe_notifications()
        }
        fn subscribe_executions(&self) -> tokio::sync::mpsc::Receiver<crate::types::ExecutionEvent> {
            self.inner.subscribe_executions()
        }
        fn unsubscribe_blocks(&self) {
            self.inner.unsubscribe_blocks()
        }
        fn unsubscribe_transactions(&self) {
            self.inner.unsubscribe_transactions()
        }
        fn unsubscribe_notifications(&self) {
            self.inner.unsubscribe_notifications()
        }
        fn unsubscribe_executions(&self) {
            self.inner.unsubscribe_executions()
        }
    }

    fn transfer(timestamp: u64, amount: i64) -> Nep17TransferRecord {
        Nep17TransferRecord {
            timestamp,
            asset_hash: UInt160::zero(),
            transfer_notify_index: 0,
            tx_hash: None,
            amount: num_bigint::BigInt::from(amount),
            counterparty: None,
        }
    }

    #[test]
    fn get_nep17_balances_is_empty_with_no_transfer_history() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt160::zero().to_string())], "getnep17balances");
        let result = get_nep17_balances(&params, &ctx).unwrap();
        assert_eq!(result["balance"], json!([]));
    }

    #[test]
    fn get_nep17_transfers_partitions_empty_history_into_empty_buckets() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt160::zero().to_string())], "getnep17transfers");
        let result = get_nep17_transfers(&params, &ctx).unwrap();
        assert_eq!(result["sent"], json!([]));
        assert_eq!(result["received"], json!([]));
    }

    // Scenario (spec §4.C): `limit` caps the combined page to the newest
    // N entries within the time window, not per-bucket.
    #[test]
    fn get_nep17_transfers_honors_limit_over_the_newest_entries() {
        let chain = TransferChain {
            inner: NullChain,
            nep17: vec![transfer(100, 5), transfer(200, -3), transfer(300, 7), transfer(400, -1)],
        };
        let (p2p, oracle, state_module, config) =
            (NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt160::zero().to_string()), json!(0u32), json!(1000u32), json!(2u32)], "getnep17transfers");
        let result = get_nep17_transfers(&params, &ctx).unwrap();
        // Newest two by timestamp are 400 (received... amount negative means sent) and 300.
        assert_eq!(result["sent"].as_array().unwrap().len() + result["received"].as_array().unwrap().len(), 2);
        assert!(result["sent"].as_array().unwrap().iter().all(|t| t["timestamp"] == json!(400)));
        assert!(result["received"].as_array().unwrap().iter().all(|t| t["timestamp"] == json!(300)));
    }

    // Scenario (spec §4.C): `page` skips whole pages of `limit` entries
    // before collecting results (`frameCount >= page*limit`).
    #[test]
    fn get_nep17_transfers_honors_page_to_skip_the_newest_page() {
        let chain = TransferChain {
            inner: NullChain,
            nep17: vec![transfer(100, 5), transfer(200, -3), transfer(300, 7), transfer(400, -1)],
        };
        let (p2p, oracle, state_module, config) =
            (NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt160::zero().to_string()), json!(0u32), json!(1000u32), json!(2u32), json!(1u32)], "getnep17transfers");
        let result = get_nep17_transfers(&params, &ctx).unwrap();
        assert!(result["sent"].as_array().unwrap().iter().all(|t| t["timestamp"] == json!(200)));
        assert!(result["received"].as_array().unwrap().iter().all(|t| t["timestamp"] == json!(100)));
    }

    // Scenario (spec §4.C): `limit` must be positive and at most 1000.
    #[test]
    fn get_nep17_transfers_rejects_an_out_of_range_limit() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt160::zero().to_string()), json!(0u32), json!(1000u32), json!(0u32)], "getnep17transfers");
        let err = get_nep17_transfers(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InvalidParams);

        let params = Params::new(&[json!(UInt160::zero().to_string()), json!(0u32), json!(1000u32), json!(1001u32)], "getnep17transfers");
        let err = get_nep17_transfers(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InvalidParams);
    }

    #[test]
    fn get_nep11_properties_reports_unknown_contract_before_invoking_the_vm() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt160::zero().to_string()), json!("")], "getnep11properties");
        let err = get_nep11_properties(&params, &ctx).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::UnknownContract);
    }

    #[test]
    fn get_unclaimed_gas_reports_zero_for_an_account_with_no_claimable_gas() {
        let (chain, p2p, oracle, state_module, config) =
            (NullChain, NullP2P, NullOracle, NullStateModule, RpcServerConfig::default());
        let ctx = context(&chain, &p2p, &oracle, &state_module, &config);
        let params = Params::new(&[json!(UInt160::zero().to_string())], "getunclaimedgas");
        let result = get_unclaimed_gas(&params, &ctx).unwrap();
        assert_eq!(result["unclaimed"], json!("0"));
    }
}
