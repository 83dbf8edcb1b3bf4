//! In-memory `StateModule` collaborator: tracks a state root per block
//! height without a real Merkle-Patricia trie. Stands in for
//! `neo_core::smart_contract::native::StateService`.

use std::sync::Arc;

use neo_rpc_server::hash_types::UInt256;
use neo_rpc_server::types::{FindStatesPage, StateRootData};
use parking_lot::Mutex;

fn root_hash_for(index: u32) -> UInt256 {
    let mut bytes = [0u8; 32];
    bytes[28..32].copy_from_slice(&index.to_le_bytes());
    bytes[31] = 0x5a;
    UInt256::from_bytes(&bytes).expect("32 bytes")
}

pub struct InMemoryStateModule {
    height: Mutex<u32>,
}

impl InMemoryStateModule {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { height: Mutex::new(0) })
    }

    /// Advances the tracked state height; called alongside block
    /// production so `getstateheight` follows the chain tip.
    pub fn advance(&self, index: u32) {
        *self.height.lock() = index;
    }
}

impl neo_rpc_server::state_module::StateModule for InMemoryStateModule {
    fn keep_only_latest_state(&self) -> bool {
        false
    }

    fn state_height(&self) -> (u32, u32) {
        let height = *self.height.lock();
        (height, height)
    }

    fn state_root(&self, index: u32) -> Option<StateRootData> {
        if index > *self.height.lock() {
            return None;
        }
        Some(StateRootData { version: 0, index, root_hash: root_hash_for(index), witness: None })
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
