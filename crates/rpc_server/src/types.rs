//! Shared data shapes crossing the collaborator boundary (spec §3 "Data
//! model", §6 "External interfaces"). These stand in for the concrete Neo
//! ledger/VM/P2P types the reference node's `neo_core` crate provides; the core
//! only ever sees them through the `Chain`/`P2PServer`/`Oracle`/
//! `StateModule` traits in `chain.rs`/`p2p.rs`/`oracle.rs`/`state_module.rs`.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::hash_types::{UInt160, UInt256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Application,
    Verification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFlags {
    None,
    All,
}

#[derive(Debug, Clone)]
pub struct BlockHeaderData {
    pub hash: UInt256,
    pub version: u8,
    pub index: u32,
    pub previous_hash: UInt256,
    pub merkle_root: UInt256,
    pub timestamp: u64,
    pub nonce: u64,
    pub next_consensus: UInt160,
    pub primary_validator: u8,
    pub witness_invocation: Vec<u8>,
    pub witness_verification: Vec<u8>,
    pub confirmations: u32,
    pub next_block_hash: Option<UInt256>,
}

#[derive(Debug, Clone)]
pub struct BlockData {
    pub header: BlockHeaderData,
    pub transactions: Vec<TransactionRecord>,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct WitnessRecord {
    pub invocation: Vec<u8>,
    pub verification: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SignerRecord {
    pub account: UInt160,
    pub scopes: String,
    pub allowed_contracts: Vec<UInt160>,
    pub allowed_groups: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub hash: UInt256,
    pub version: u8,
    pub nonce: u32,
    pub sender: UInt160,
    pub sys_fee: i64,
    pub net_fee: i64,
    pub valid_until_block: u32,
    pub signers: Vec<SignerRecord>,
    pub attributes: Vec<serde_json::Value>,
    pub script: Vec<u8>,
    pub witnesses: Vec<WitnessRecord>,
    pub size: usize,
    /// Present only when the transaction is confirmed in a block.
    pub block_hash: Option<UInt256>,
    pub block_time: Option<u64>,
    pub confirmations: Option<u32>,
    pub vm_state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MempoolSnapshot {
    pub verified: Vec<UInt256>,
    pub unverified: Vec<UInt256>,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ContractStateData {
    pub id: i32,
    pub update_counter: u16,
    pub hash: UInt160,
    pub nef: Vec<u8>,
    pub manifest: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Nep17TransferRecord {
    pub timestamp: u64,
    pub asset_hash: UInt160,
    pub transfer_notify_index: u32,
    pub tx_hash: Option<UInt256>,
    pub amount: BigInt,
    /// Positive for incoming, negative for outgoing, relative to the
    /// queried account.
    pub counterparty: Option<UInt160>,
}

#[derive(Debug, Clone)]
pub struct Nep11TransferRecord {
    pub timestamp: u64,
    pub asset_hash: UInt160,
    pub transfer_notify_index: u32,
    pub tx_hash: Option<UInt256>,
    pub amount: BigInt,
    pub counterparty: Option<UInt160>,
    /// `None` for non-divisible tokens.
    pub token_id: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyParameters {
    pub max_valid_until_block_increment: u32,
    pub max_transactions_per_block: u32,
    pub max_block_size: u32,
    pub max_block_system_fee: i64,
    pub fee_per_byte: i64,
    pub exec_fee_factor: u32,
    pub storage_price: u32,
}

/// Translation of the relay/accept engine's result sentinel (spec §4.C
/// submitblock/sendrawtransaction/submitnotaryrequest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Succeed,
    AlreadyExists,
    OutOfMemory,
    PolicyFail,
    InvalidSignature,
    InvalidScript,
    InvalidAttribute,
    Expired,
    InsufficientFunds,
    Unknown,
}

impl RelayOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, RelayOutcome::Succeed)
    }
}

#[derive(Debug, Clone)]
pub struct StateRootData {
    pub version: u8,
    pub index: u32,
    pub root_hash: UInt256,
    pub witness: Option<WitnessRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct FindStatesPage {
    pub first_proof: Option<Vec<u8>>,
    pub last_proof: Option<Vec<u8>>,
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct PeerAddress {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct NotaryRequestRecord {
    pub main_transaction: TransactionRecord,
    pub fallback_transaction: TransactionRecord,
    pub witness: WitnessRecord,
}

#[derive(Debug, Clone)]
pub struct OracleResponse {
    pub request_id: u64,
    pub tx_signature: Vec<u8>,
}

/// Transaction shape the VM Invoker builds a verification/application
/// context against: either a real mempool/relay transaction or the
/// synthetic skeleton `invokefunction`/`invokescript` construct on the fly
/// (spec §4.D).
#[derive(Debug, Clone)]
pub struct TransactionSkeleton {
    pub script: Vec<u8>,
    pub signers: Vec<SignerRecord>,
    pub witnesses: Vec<WitnessRecord>,
    pub valid_until_block: u32,
}

/// Synthetic "current persisting block" anchor (spec §4.D step 1).
#[derive(Debug, Clone)]
pub struct BlockAnchor {
    pub index: u32,
    pub timestamp: u64,
    pub primary_validator: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmRunOutcome {
    Halt,
    Fault,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum StackItemData {
    Any,
    Boolean(bool),
    Integer(String),
    ByteString(String),
    Buffer(String),
    Array(Vec<StackItemData>),
    Map(Vec<(StackItemData, StackItemData)>),
    InteropInterface(String),
    Pointer(i64),
}

/// One emitted `Notify` syscall, shared by the application log, the VM
/// Invoker's result, and chain-event fan-out (spec §3 "Feed").
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub container: UInt256,
    pub script_hash: UInt160,
    pub event_name: String,
    pub state: Vec<StackItemData>,
}

#[derive(Debug, Clone)]
pub struct BlockEvent {
    pub block: BlockData,
}

#[derive(Debug, Clone)]
pub struct TransactionEvent {
    pub transaction: TransactionRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Halt,
    Fault,
}

#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub container: UInt256,
    pub trigger: Trigger,
    pub state: ExecutionState,
    pub gas_consumed: i64,
    pub stack: Vec<StackItemData>,
    pub notifications: Vec<NotificationEvent>,
    pub fault_exception: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotaryRequestEvent {
    pub request: NotaryRequestRecord,
}

/// `{state, gasConsumed, script, stack, faultException?, notifications,
/// tree?}` (spec §3 "Invocation Result").
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub state: VmRunOutcome,
    pub gas_consumed: i64,
    pub script: Vec<u8>,
    pub stack: Vec<StackItemData>,
    pub fault_exception: Option<String>,
    pub notifications: Vec<NotificationEvent>,
    /// Only present when the invocation was run with `verbose` set (spec
    /// §4.D step 6).
    pub tree: Option<Vec<UInt160>>,
}
