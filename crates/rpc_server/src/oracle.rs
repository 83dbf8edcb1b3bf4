//! The optional `Oracle` collaborator (spec §6 "Optional Oracle
//! collaborator"). Stands in for `neo_core::smart_contract::native::
//! OracleContract` plus the reference node's oracle plugin.

use std::sync::Arc;

use crate::types::OracleResponse;

pub trait Oracle: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn set_broadcaster(&self, broadcaster: Arc<dyn Fn(OracleResponse) + Send + Sync>);

    /// Admits a signed oracle response. `pub_key`/`tx_signature` are raw
    /// bytes; the signature covers `pubKey ‖ requestID ‖ txSignature`
    /// (spec §4.C `submitoracleresponse`) and is verified by the caller
    /// (`handlers::node::submit_oracle_response`) before this is invoked.
    fn add_response(&self, pub_key: &[u8], request_id: u64, tx_signature: &[u8]) -> anyhow::Result<()>;
}
