//! The `Chain` capability (spec §6 "Required chain capability set").
//!
//! Plays the role `neo_core::ledger::Blockchain` plays in the reference node's
//! concrete node: everything the handler set and VM Invoker need from
//! storage/consensus, collapsed to a trait object since the storage engine
//! itself is an explicit non-goal.

use std::sync::Arc;

use num_bigint::BigInt;
use tokio::sync::mpsc;

use crate::hash_types::{UInt160, UInt256};
use crate::params::ContractIdentifier;
use crate::types::{
    BlockData, BlockEvent, BlockHeaderData, ContractStateData,
    ExecutionEvent, MempoolSnapshot, Nep11TransferRecord, Nep17TransferRecord, NotificationEvent,
    PolicyParameters, RelayOutcome, TransactionEvent, TransactionRecord,
};
use crate::vm::TestVmFactory;

/// Abstract read/relay surface over the blockchain, mempool, and consensus
/// engine. A concrete implementation (see `crates/rpc_node`) owns actual
/// storage; this core never does.
pub trait Chain: Send + Sync {
    fn current_block_height(&self) -> u32;
    fn current_header_height(&self) -> u32;
    fn best_block_hash(&self) -> UInt256;

    fn block_hash_by_index(&self, index: u32) -> Option<UInt256>;
    fn header_by_index(&self, index: u32) -> Option<BlockHeaderData>;
    fn header_by_hash(&self, hash: &UInt256) -> Option<BlockHeaderData>;
    fn block_by_index(&self, index: u32) -> Option<BlockData>;
    fn block_by_hash(&self, hash: &UInt256) -> Option<BlockData>;

    fn mempool_snapshot(&self) -> MempoolSnapshot;
    fn transaction(&self, hash: &UInt256) -> Option<TransactionRecord>;

    /// Decodes a raw transaction payload (`sendrawtransaction`,
    /// `calculatenetworkfee`) into its signers/witnesses. The concrete Neo
    /// wire format is a ledger concern this core doesn't own (an explicit
    /// non-goal); `None` means the collaborator couldn't make sense of the
    /// bytes, which callers treat as InvalidParams.
    fn decode_transaction(&self, bytes: &[u8]) -> Option<TransactionRecord>;

    fn contract_state(&self, id: ContractIdentifier) -> Option<ContractStateData>;
    fn native_contracts(&self) -> Vec<ContractStateData>;
    fn storage_item(&self, contract_id: i32, key: &[u8]) -> Option<Vec<u8>>;

    fn governing_token_balance(&self, account: &UInt160) -> BigInt;
    fn claimable_gas(&self, account: &UInt160) -> BigInt;
    fn nep17_transfers(&self, account: &UInt160) -> Vec<Nep17TransferRecord>;
    fn nep11_transfers(&self, account: &UInt160) -> Vec<Nep11TransferRecord>;

    fn verify_witnesses(&self, tx: &TransactionRecord, gas_limit: i64) -> bool;

    fn base_exec_fee(&self) -> i64;
    fn fee_per_byte(&self) -> i64;
    fn policy(&self) -> PolicyParameters;
    fn p2p_signature_extensions_enabled(&self) -> bool;

    fn committee(&self) -> Vec<String>;
    fn next_block_validators(&self) -> Vec<String>;
    fn validate_address(&self, text: &str) -> bool;

    fn test_vm_factory(&self) -> Arc<dyn TestVmFactory>;

    fn submit_block(&self, block: BlockData) -> RelayOutcome;
    fn submit_transaction(&self, tx: TransactionRecord) -> RelayOutcome;

    fn subscribe_blocks(&self) -> mpsc::Receiver<BlockEvent>;
    fn subscribe_transactions(&self) -> mpsc::Receiver<TransactionEvent>;
    fn subscribe_notifications(&self) -> mpsc::Receiver<NotificationEvent>;
    fn subscribe_executions(&self) -> mpsc::Receiver<ExecutionEvent>;
    fn unsubscribe_blocks(&self);
    fn unsubscribe_transactions(&self);
    fn unsubscribe_notifications(&self);
    fn unsubscribe_executions(&self);
}
