//! JSON rendering for the collaborator data shapes (`types.rs`), shared
//! across handler modules. Field names follow the Neo N3 RPC convention
//! the reference node's `rpc_server_blockchain.rs` renders (`previousblockhash`,
//! `nextconsensus`, `vmstate`, ...).

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::types::{
    BlockData, BlockHeaderData, ContractStateData, NotificationEvent, SignerRecord, StackItemData,
    TransactionRecord, WitnessRecord,
};

pub fn witness_json(witness: &WitnessRecord) -> Value {
    json!({
        "invocation": BASE64_STANDARD.encode(&witness.invocation),
        "verification": BASE64_STANDARD.encode(&witness.verification),
    })
}

pub fn signer_json(signer: &SignerRecord) -> Value {
    json!({
        "account": signer.account.to_string(),
        "scopes": signer.scopes,
        "allowedcontracts": signer.allowed_contracts.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
        "allowedgroups": signer.allowed_groups.iter().map(|g| BASE64_STANDARD.encode(g)).collect::<Vec<_>>(),
    })
}

pub fn header_json(header: &BlockHeaderData) -> Value {
    json!({
        "hash": header.hash.to_string(),
        "version": header.version,
        "previousblockhash": header.previous_hash.to_string(),
        "merkleroot": header.merkle_root.to_string(),
        "time": header.timestamp,
        "nonce": format!("{:016X}", header.nonce),
        "index": header.index,
        "primary": header.primary_validator,
        "nextconsensus": header.next_consensus.to_string(),
        "witnesses": [witness_json(&WitnessRecord {
            invocation: header.witness_invocation.clone(),
            verification: header.witness_verification.clone(),
        })],
        "confirmations": header.confirmations,
        "nextblockhash": header.next_block_hash.map(|h| h.to_string()),
    })
}

pub fn block_json(block: &BlockData) -> Value {
    let mut value = header_json(&block.header);
    value["size"] = json!(block.size);
    value["tx"] = Value::Array(block.transactions.iter().map(transaction_json).collect());
    value
}

pub fn transaction_json(tx: &TransactionRecord) -> Value {
    json!({
        "hash": tx.hash.to_string(),
        "size": tx.size,
        "version": tx.version,
        "nonce": tx.nonce,
        "sender": tx.sender.to_string(),
        "sysfee": tx.sys_fee.to_string(),
        "netfee": tx.net_fee.to_string(),
        "validuntilblock": tx.valid_until_block,
        "signers": tx.signers.iter().map(signer_json).collect::<Vec<_>>(),
        "attributes": tx.attributes,
        "script": BASE64_STANDARD.encode(&tx.script),
        "witnesses": tx.witnesses.iter().map(witness_json).collect::<Vec<_>>(),
        "blockhash": tx.block_hash.map(|h| h.to_string()),
        "confirmations": tx.confirmations,
        "blocktime": tx.block_time,
        "vmstate": tx.vm_state,
    })
}

pub fn contract_state_json(contract: &ContractStateData) -> Value {
    json!({
        "id": contract.id,
        "updatecounter": contract.update_counter,
        "hash": contract.hash.to_string(),
        "nef": BASE64_STANDARD.encode(&contract.nef),
        "manifest": contract.manifest,
    })
}

pub fn stack_item_json(item: &StackItemData) -> Value {
    match item {
        StackItemData::Any => json!({ "type": "Any" }),
        StackItemData::Boolean(b) => json!({ "type": "Boolean", "value": b }),
        StackItemData::Integer(v) => json!({ "type": "Integer", "value": v }),
        StackItemData::ByteString(v) => json!({ "type": "ByteString", "value": v }),
        StackItemData::Buffer(v) => json!({ "type": "Buffer", "value": v }),
        StackItemData::Array(items) => json!({
            "type": "Array",
            "value": items.iter().map(stack_item_json).collect::<Vec<_>>(),
        }),
        StackItemData::Map(entries) => json!({
            "type": "Map",
            "value": entries.iter().map(|(k, v)| json!({ "key": stack_item_json(k), "value": stack_item_json(v) })).collect::<Vec<_>>(),
        }),
        StackItemData::InteropInterface(name) => json!({ "type": "InteropInterface", "interface": name }),
        StackItemData::Pointer(p) => json!({ "type": "Pointer", "value": p }),
    }
}

/// Non-verbose `getblockheader`/`getblock` return a base64 blob. The real
/// Neo binary block/header serializer lives in the ledger (an explicit
/// non-goal); this renders a stable, self-consistent encoding of the
/// fields the core actually carries rather than byte-matching the C#
/// wire format.
pub fn base64_header(header: &BlockHeaderData) -> String {
    BASE64_STANDARD.encode(header_json(header).to_string())
}

pub fn base64_block(block: &BlockData) -> String {
    BASE64_STANDARD.encode(block_json(block).to_string())
}

pub fn notification_json(notification: &NotificationEvent) -> Value {
    json!({
        "contract": notification.script_hash.to_string(),
        "eventname": notification.event_name,
        "state": {
            "type": "Array",
            "value": notification.state.iter().map(stack_item_json).collect::<Vec<_>>(),
        }
    })
}
