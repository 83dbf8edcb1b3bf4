//! The `StateModule` capability (spec §6 "state-root module"), backing
//! `getstateheight`/`getstateroot`/`getproof`/`verifyproof`/`getstate`/
//! `findstates`. Stands in for `neo_core::smart_contract::native::
//! StateService` / the `StatePlugin` companion in the reference node.

use crate::hash_types::UInt256;
use crate::types::{FindStatesPage, StateRootData};

pub trait StateModule: Send + Sync {
    /// When true, state queries against any root but the current one fail
    /// with InvalidRequest (spec §4.C).
    fn keep_only_latest_state(&self) -> bool;

    /// `(local_root_index, validated_root_index)`.
    fn state_height(&self) -> (u32, u32);
    fn state_root(&self, index: u32) -> Option<StateRootData>;

    fn get_proof(&self, root: &UInt256, contract_id: i32, key: &[u8]) -> Option<Vec<u8>>;
    fn verify_proof(&self, root: &UInt256, proof: &[u8]) -> Option<Vec<u8>>;
    fn get_state(&self, root: &UInt256, contract_id: i32, key: &[u8]) -> Option<Vec<u8>>;

    fn find_states(
        &self,
        root: &UInt256,
        contract_id: i32,
        prefix: &[u8],
        from: Option<&[u8]>,
        count: usize,
    ) -> FindStatesPage;
}
