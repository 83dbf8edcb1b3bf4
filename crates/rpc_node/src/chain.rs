//! In-memory `Chain` collaborator used to demo-run `neo-rpc-server` without
//! a real ledger or consensus engine. Reduced to the handful of fields the
//! RPC surface actually reads, the way the reference node's
//! `persistence/providers/memory_store.rs` stands in for a disk-backed
//! store behind the same trait.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use neo_rpc_server::chain::Chain;
use neo_rpc_server::hash_types::{UInt160, UInt256};
use neo_rpc_server::params::ContractIdentifier;
use neo_rpc_server::types::{
    BlockAnchor, BlockData, BlockEvent, BlockHeaderData, CallFlags, ContractStateData,
    ExecutionEvent, ExecutionState, MempoolSnapshot, Nep11TransferRecord, Nep17TransferRecord,
    NotificationEvent, PolicyParameters, RelayOutcome, SignerRecord, StackItemData,
    TransactionEvent, TransactionRecord, TransactionSkeleton, Trigger, VmRunOutcome, WitnessRecord,
};
use neo_rpc_server::vm::{TestVmContext, TestVmFactory};
use num_bigint::BigInt;
use parking_lot::Mutex;
use tokio::sync::mpsc;

const GAS_TOKEN_ID: i32 = -6;

fn block_hash_for(index: u32) -> UInt256 {
    let mut bytes = [0u8; 32];
    bytes[0..4].copy_from_slice(&index.to_le_bytes());
    UInt256::from_bytes(&bytes).expect("32 bytes")
}

fn transaction_hash_for(index: u32) -> UInt256 {
    let mut bytes = [0u8; 32];
    bytes[4..8].copy_from_slice(&index.to_le_bytes());
    bytes[0] = 0xfa;
    UInt256::from_bytes(&bytes).expect("32 bytes")
}

fn current_unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn gas_token_contract() -> ContractStateData {
    ContractStateData {
        id: GAS_TOKEN_ID,
        update_counter: 0,
        hash: UInt160::zero(),
        nef: Vec::new(),
        manifest: serde_json::json!({ "name": "GasToken" }),
    }
}

fn genesis_block() -> BlockData {
    let header = BlockHeaderData {
        hash: block_hash_for(0),
        version: 0,
        index: 0,
        previous_hash: UInt256::zero(),
        merkle_root: UInt256::zero(),
        timestamp: current_unix_time(),
        nonce: 0,
        next_consensus: UInt160::zero(),
        primary_validator: 0,
        witness_invocation: Vec::new(),
        witness_verification: Vec::new(),
        confirmations: 0,
        next_block_hash: None,
    };
    BlockData { header, transactions: Vec::new(), size: 0 }
}

fn synthetic_transaction(index: u32) -> TransactionRecord {
    TransactionRecord {
        hash: transaction_hash_for(index),
        version: 0,
        nonce: index,
        sender: UInt160::zero(),
        sys_fee: 0,
        net_fee: 0,
        valid_until_block: index + 5760,
        signers: vec![SignerRecord {
            account: UInt160::zero(),
            scopes: "CalledByEntry".to_string(),
            allowed_contracts: Vec::new(),
            allowed_groups: Vec::new(),
        }],
        attributes: Vec::new(),
        script: Vec::new(),
        witnesses: Vec::new(),
        size: 0,
        block_hash: Some(block_hash_for(index)),
        block_time: Some(current_unix_time()),
        confirmations: Some(1),
        vm_state: Some("HALT".to_string()),
    }
}

/// Parses the JSON envelope `decode_transaction` accepts in place of a real
/// binary transaction: `{"signers": [{"account", "scopes"?}], "witnesses"?:
/// [{"invocation"?, "verification"?}] (base64)}`. Missing/malformed fields
/// fall back to empty rather than failing the whole decode, except a
/// missing or empty `signers` array, which is always invalid.
fn decode_demo_transaction(bytes: &[u8]) -> Option<TransactionRecord> {
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine as _;

    let envelope: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let signer_entries = envelope.get("signers")?.as_array()?;
    if signer_entries.is_empty() {
        return None;
    }

    let mut signers = Vec::with_capacity(signer_entries.len());
    for entry in signer_entries {
        let account: UInt160 = entry.get("account")?.as_str()?.parse().ok()?;
        let scopes = entry.get("scopes").and_then(|v| v.as_str()).unwrap_or("CalledByEntry").to_string();
        signers.push(SignerRecord { account, scopes, allowed_contracts: Vec::new(), allowed_groups: Vec::new() });
    }

    let witnesses = envelope
        .get("witnesses")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .map(|entry| {
                    let decode_field = |key: &str| {
                        entry
                            .get(key)
                            .and_then(|v| v.as_str())
                            .and_then(|text| BASE64_STANDARD.decode(text).ok())
                            .unwrap_or_default()
                    };
                    WitnessRecord { invocation: decode_field("invocation"), verification: decode_field("verification") }
                })
                .collect()
        })
        .unwrap_or_default();

    Some(TransactionRecord {
        hash: UInt256::zero(),
        version: 0,
        nonce: 0,
        sender: signers[0].account,
        sys_fee: 0,
        net_fee: 0,
        valid_until_block: 0,
        signers,
        attributes: Vec::new(),
        script: bytes.to_vec(),
        witnesses,
        size: bytes.len(),
        block_hash: None,
        block_time: None,
        confirmations: None,
        vm_state: None,
    })
}

struct ChainState {
    blocks: Vec<BlockData>,
    contracts: Vec<ContractStateData>,
    block_feed: Option<mpsc::Sender<BlockEvent>>,
    transaction_feed: Option<mpsc::Sender<TransactionEvent>>,
    notification_feed: Option<mpsc::Sender<NotificationEvent>>,
    execution_feed: Option<mpsc::Sender<ExecutionEvent>>,
}

/// Minimal standing-in for `neo_core::ledger::Blockchain`: an append-only
/// vector of blocks grown by a background producer task (see `main.rs`),
/// with single-slot broadcast channels per event kind matching the hub's
/// one-active-feed-per-kind contract.
pub struct InMemoryChain {
    state: Mutex<ChainState>,
}

impl InMemoryChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                blocks: vec![genesis_block()],
                contracts: vec![gas_token_contract()],
                block_feed: None,
                transaction_feed: None,
                notification_feed: None,
                execution_feed: None,
            }),
        })
    }

    /// Appends one synthetic block and fans it out to whichever feeds the
    /// hub currently has active. Called by the periodic producer task.
    pub fn produce_block(&self) {
        let mut state = self.state.lock();
        let index = state.blocks.len() as u32;
        let tx = synthetic_transaction(index);
        let header = BlockHeaderData {
            hash: block_hash_for(index),
            version: 0,
            index,
            previous_hash: state.blocks.last().map(|b| b.header.hash).unwrap_or_else(UInt256::zero),
            merkle_root: UInt256::zero(),
            timestamp: current_unix_time(),
            nonce: index as u64,
            next_consensus: UInt160::zero(),
            primary_validator: 0,
            witness_invocation: Vec::new(),
            witness_verification: Vec::new(),
            confirmations: 0,
            next_block_hash: None,
        };
        let block = BlockData { header, transactions: vec![tx.clone()], size: 256 };
        state.blocks.push(block.clone());

        if let Some(sender) = &state.block_feed {
            let _ = sender.try_send(BlockEvent { block });
        }
        if let Some(sender) = &state.transaction_feed {
            let _ = sender.try_send(TransactionEvent { transaction: tx.clone() });
        }
        if let Some(sender) = &state.notification_feed {
            let _ = sender.try_send(NotificationEvent {
                container: tx.hash,
                script_hash: UInt160::zero(),
                event_name: "Transfer".to_string(),
                state: Vec::new(),
            });
        }
        if let Some(sender) = &state.execution_feed {
            let _ = sender.try_send(ExecutionEvent {
                container: tx.hash,
                trigger: Trigger::Application,
                state: ExecutionState::Halt,
                gas_consumed: 0,
                stack: Vec::new(),
                notifications: Vec::new(),
                fault_exception: None,
            });
        }
    }
}

impl Chain for InMemoryChain {
    fn current_block_height(&self) -> u32 {
        self.state.lock().blocks.len() as u32 - 1
    }

    fn current_header_height(&self) -> u32 {
        self.current_block_height()
    }

    fn best_block_hash(&self) -> UInt256 {
        self.state.lock().blocks.last().expect("genesis always present").header.hash
    }

    fn block_hash_by_index(&self, index: u32) -> Option<UInt256> {
        self.state.lock().blocks.get(index as usize).map(|b| b.header.hash)
    }

    fn header_by_index(&self, index: u32) -> Option<BlockHeaderData> {
        self.state.lock().blocks.get(index as usize).map(|b| b.header.clone())
    }

    fn header_by_hash(&self, hash: &UInt256) -> Option<BlockHeaderData> {
        self.state.lock().blocks.iter().find(|b| &b.header.hash == hash).map(|b| b.header.clone())
    }

    fn block_by_index(&self, index: u32) -> Option<BlockData> {
        self.state.lock().blocks.get(index as usize).cloned()
    }

    fn block_by_hash(&self, hash: &UInt256) -> Option<BlockData> {
        self.state.lock().blocks.iter().find(|b| &b.header.hash == hash).cloned()
    }

    fn mempool_snapshot(&self) -> MempoolSnapshot {
        MempoolSnapshot { verified: Vec::new(), unverified: Vec::new(), height: self.current_block_height() }
    }

    fn transaction(&self, hash: &UInt256) -> Option<TransactionRecord> {
        self.state
            .lock()
            .blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .find(|tx| &tx.hash == hash)
            .cloned()
    }

    /// Stands in for real Neo transaction-wire decoding (a non-goal): reads
    /// a JSON envelope of `{signers, witnesses}` rather than a binary
    /// transaction, so demo callers can still exercise
    /// `calculatenetworkfee`'s per-signer fee table and
    /// `sendrawtransaction`'s relay path end to end.
    fn decode_transaction(&self, bytes: &[u8]) -> Option<TransactionRecord> {
        decode_demo_transaction(bytes)
    }

    fn contract_state(&self, id: ContractIdentifier) -> Option<ContractStateData> {
        let state = self.state.lock();
        match id {
            ContractIdentifier::Id(wanted) => state.contracts.iter().find(|c| c.id == wanted).cloned(),
            ContractIdentifier::Hash(wanted) => state.contracts.iter().find(|c| c.hash == wanted).cloned(),
            ContractIdentifier::Name(name) => {
                state.contracts.iter().find(|c| c.manifest["name"] == name.as_str()).cloned()
            }
        }
    }

    fn native_contracts(&self) -> Vec<ContractStateData> {
        self.state.lock().contracts.clone()
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
        true
    }

    fn base_exec_fee(&self) -> i64 {
        30
    }

    fn fee_per_byte(&self) -> i64 {
        1000
    }

    fn policy(&self) -> PolicyParameters {
        PolicyParameters {
            max_valid_until_block_increment: 5760,
            max_transactions_per_block: 512,
            max_block_size: 2 * 1024 * 1024,
            max_block_system_fee: 150_000_000_00,
            fee_per_byte: 1000,
            exec_fee_factor: 30,
            storage_price: 100_000,
        }
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

    fn validate_address(&self, text: &str) -> bool {
        text.parse::<UInt160>().is_ok()
    }

    fn test_vm_factory(&self) -> Arc<dyn TestVmFactory> {
        Arc::new(DemoVmFactory)
    }

    fn submit_block(&self, _block: BlockData) -> RelayOutcome {
        self.produce_block();
        RelayOutcome::Succeed
    }

    fn submit_transaction(&self, _tx: TransactionRecord) -> RelayOutcome {
        self.produce_block();
        RelayOutcome::Succeed
    }

    fn subscribe_blocks(&self) -> mpsc::Receiver<BlockEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().block_feed = Some(tx);
        rx
    }

    fn subscribe_transactions(&self) -> mpsc::Receiver<TransactionEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().transaction_feed = Some(tx);
        rx
    }

    fn subscribe_notifications(&self) -> mpsc::Receiver<NotificationEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().notification_feed = Some(tx);
        rx
    }

    fn subscribe_executions(&self) -> mpsc::Receiver<ExecutionEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().execution_feed = Some(tx);
        rx
    }

    fn unsubscribe_blocks(&self) {
        self.state.lock().block_feed = None;
    }

    fn unsubscribe_transactions(&self) {
        self.state.lock().transaction_feed = None;
    }

    fn unsubscribe_notifications(&self) {
        self.state.lock().notification_feed = None;
    }

    fn unsubscribe_executions(&self) {
        self.state.lock().execution_feed = None;
    }
}

/// Demo-only contract VM: always halts immediately with an empty result
/// stack. Stands in for `neo_core::smart_contract::ApplicationEngine`,
/// which a real node wires in here instead.
struct DemoVmFactory;

impl TestVmFactory for DemoVmFactory {
    fn open(
        &self,
        _trigger: Trigger,
        _tx: &TransactionSkeleton,
        _anchor: &BlockAnchor,
        _historic_root: Option<&UInt256>,
    ) -> anyhow::Result<Box<dyn TestVmContext>> {
        Ok(Box::new(DemoVmContext::default()))
    }

    fn max_verification_gas(&self) -> i64 {
        20_000_000_00
    }
}

#[derive(Default)]
struct DemoVmContext {
    gas_consumed: i64,
}

impl TestVmContext for DemoVmContext {
    fn load_script(&mut self, _script: &[u8], _call_flags: CallFlags) {}

    fn init_verification_context(&mut self, _contract_hash: &UInt160, _invocation_script: &[u8]) {}

    fn set_gas_limit(&mut self, _gas: i64) {}

    fn run(&mut self) -> VmRunOutcome {
        self.gas_consumed = 30;
        VmRunOutcome::Halt
    }

    fn gas_consumed(&self) -> i64 {
        self.gas_consumed
    }

    fn result_stack(&self) -> Vec<StackItemData> {
        vec![StackItemData::Boolean(true)]
    }

    fn notifications(&self) -> Vec<NotificationEvent> {
        Vec::new()
    }

    fn fault_exception(&self) -> Option<String> {
        None
    }

    fn finalize(&mut self) {}
}
