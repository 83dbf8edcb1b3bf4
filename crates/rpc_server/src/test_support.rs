//! No-op collaborator mocks used only by unit tests throughout the crate
//! (spec.md explicitly treats `Chain`/`P2PServer`/`Oracle`/`StateModule` as
//! externally-supplied collaborators; a real implementation lives in
//! `crates/rpc_node`). These stand in wherever a test needs *a* value of
//! the right trait but never exercises it.

use std::sync::Arc;

use num_bigint::BigInt;
use tokio::sync::mpsc;

use crate::chain::Chain;
use crate::hash_types::{UInt160, UInt256};
use crate::oracle::Oracle;
use crate::p2p::P2PServer;
use crate::params::ContractIdentifier;
use crate::state_module::StateModule;
use crate::types::{
    BlockData, BlockEvent, BlockHeaderData, ContractStateData, ExecutionEvent, FindStatesPage,
    MempoolSnapshot, Nep11TransferRecord, Nep17TransferRecord, NotaryRequestEvent,
    NotaryRequestRecord, NotificationEvent, OracleResponse, PeerAddress, PolicyParameters,
    RelayOutcome, StateRootData, TransactionEvent, TransactionRecord,
};
use crate::vm::TestVmFactory;

fn closed_receiver<T>() -> mpsc::Receiver<T> {
    let (_tx, rx) = mpsc::channel(1);
    rx
}

pub struct NullChain;

impl Chain for NullChain {
    fn current_block_height(&self) -> u32 {
        0
    }

    fn current_header_height(&self) -> u32 {
        0
    }

    fn best_block_hash(&self) -> UInt256 {
        UInt256::zero()
    }

    fn block_hash_by_index(&self, _index: u32) -> Option<UInt256> {
        None
    }

    fn header_by_index(&self, _index: u32) -> Option<BlockHeaderData> {
        None
    }

    fn header_by_hash(&self, _hash: &UInt256) -> Option<BlockHeaderData> {
        None
    }

    fn block_by_index(&self, _index: u32) -> Option<BlockData> {
        None
    }

    fn block_by_hash(&self, _hash: &UInt256) -> Option<BlockData> {
        None
    }

    fn mempool_snapshot(&self) -> MempoolSnapshot {
        MempoolSnapshot::default()
    }

    fn transaction(&self, _hash: &UInt256) -> Option<TransactionRecord> {
        None
    }

    fn decode_transaction(&self, _bytes: &[u8]) -> Option<TransactionRecord> {
        None
    }

    fn contract_state(&self, _id: ContractIdentifier) -> Option<ContractStateData> {
        None
    }

    fn native_contracts(&self) -> Vec<ContractStateData> {
        Vec::new()
    }

    fn storage_item(&self, _contract_id: i32, _key: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn governing_token_balance(&self, _account: &UInt160) -> BigInt {
        BigInt::from(0)
    }

    fn claimable_gas(&self, _account: &UInt160) -> BigInt {
        BigInt::from(0)
    }

    fn nep17_transfers(&self, _account: &UInt160) -> Vec<Nep17TransferRecord> {
        Vec::new()
    }

    fn nep11_transfers(&self, _account: &UInt160) -> Vec<Nep11TransferRecord> {
        Vec::new()
    }

    fn verify_witnesses(&self, _tx: &TransactionRecord, _gas_limit: i64) -> bool {
        false
    }

    fn base_exec_fee(&self) -> i64 {
        30
    }

    fn fee_per_byte(&self) -> i64 {
        1000
    }

    fn policy(&self) -> PolicyParameters {
        PolicyParameters::default()
    }

    fn p2p_signature_extensions_enabled(&self) -> bool {
        false
    }

    fn committee(&self) -> Vec<String> {
        Vec::new()
    }

    fn next_block_validators(&self) -> Vec<String> {
        Vec::new()
    }

    fn validate_address(&self, _text: &str) -> bool {
        false
    }

    fn test_vm_factory(&self) -> Arc<dyn TestVmFactory> {
        Arc::new(NullTestVmFactory)
    }

    fn submit_block(&self, _block: BlockData) -> RelayOutcome {
        RelayOutcome::Unknown
    }

    fn submit_transaction(&self, _tx: TransactionRecord) -> RelayOutcome {
        RelayOutcome::Unknown
    }

    fn subscribe_blocks(&self) -> mpsc::Receiver<BlockEvent> {
        closed_receiver()
    }

    fn subscribe_transactions(&self) -> mpsc::Receiver<TransactionEvent> {
        closed_receiver()
    }

    fn subscribe_notifications(&self) -> mpsc::Receiver<NotificationEvent> {
        closed_receiver()
    }

    fn subscribe_executions(&self) -> mpsc::Receiver<ExecutionEvent> {
        closed_receiver()
    }

    fn unsubscribe_blocks(&self) {}
    fn unsubscribe_transactions(&self) {}
    fn unsubscribe_notifications(&self) {}
    fn unsubscribe_executions(&self) {}
}

struct NullTestVmFactory;

impl TestVmFactory for NullTestVmFactory {
    fn open(
        &self,
        _trigger: crate::types::Trigger,
        _tx: &crate::types::TransactionSkeleton,
        _anchor: &crate::types::BlockAnchor,
        _historic_root: Option<&UInt256>,
    ) -> anyhow::Result<Box<dyn crate::vm::TestVmContext>> {
        anyhow::bail!("NullChain has no contract VM")
    }

    fn max_verification_gas(&self) -> i64 {
        0
    }
}

pub struct NullP2P;

impl P2PServer for NullP2P {
    fn connected_count(&self) -> usize {
        0
    }

    fn unconnected_count(&self) -> usize {
        0
    }

    fn bad_count(&self) -> usize {
        0
    }

    fn tcp_port(&self) -> u16 {
        0
    }

    fn nonce(&self) -> u32 {
        0
    }

    fn user_agent(&self) -> String {
        String::new()
    }

    fn connected_peers(&self) -> Vec<PeerAddress> {
        Vec::new()
    }

    fn unconnected_peers(&self) -> Vec<PeerAddress> {
        Vec::new()
    }

    fn bad_peers(&self) -> Vec<PeerAddress> {
        Vec::new()
    }

    fn relay_transaction(&self, _tx: TransactionRecord) -> RelayOutcome {
        RelayOutcome::Unknown
    }

    fn relay_notary_request(&self, _request: NotaryRequestRecord) -> RelayOutcome {
        RelayOutcome::Unknown
    }

    fn subscribe_notary_requests(&self) -> mpsc::Receiver<NotaryRequestEvent> {
        closed_receiver()
    }

    fn unsubscribe_notary_requests(&self) {}
}

pub struct NullOracle;

impl Oracle for NullOracle {
    fn is_enabled(&self) -> bool {
        false
    }

    fn set_broadcaster(&self, _broadcaster: Arc<dyn Fn(OracleResponse) + Send + Sync>) {}

    fn add_response(&self, _pub_key: &[u8], _request_id: u64, _tx_signature: &[u8]) -> anyhow::Result<()> {
        anyhow::bail!("oracle service disabled")
    }
}

pub struct NullStateModule;

impl StateModule for NullStateModule {
    fn keep_only_latest_state(&self) -> bool {
        true
    }

    fn state_height(&self) -> (u32, u32) {
        (0, 0)
    }

    fn state_root(&self, _index: u32) -> Option<StateRootData> {
        None
    }

    fn get_proof(&self, _root: &UInt256, _contract_id: i32, _key: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn verify_proof(&self, _root: &UInt256, _proof: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn get_state(&self, _root: &UInt256, _contract_id: i32, _key: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn find_states(
        &self,
        _root: &UInt256,
        _contract_id: i32,
        _prefix: &[u8],
        _from: Option<&[u8]>,
        _count: usize,
    ) -> FindStatesPage {
        FindStatesPage::default()
    }
}
