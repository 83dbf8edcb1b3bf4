//! In-memory `Oracle` collaborator: accepts any response once enabled and
//! forwards it to whichever broadcaster the caller registered. Stands in
//! for `neo_core::smart_contract::native::OracleContract`.

use std::sync::Arc;

use neo_rpc_server::oracle::Oracle;
use neo_rpc_server::types::OracleResponse;
use parking_lot::Mutex;

#[derive(Default)]
pub struct InMemoryOracle {
    broadcaster: Mutex<Option<Arc<dyn Fn(OracleResponse) + Send + Sync>>>,
}

impl InMemoryOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Oracle for InMemoryOracle {
    fn is_enabled(&self) -> bool {
        true
    }

    fn set_broadcaster(&self, broadcaster: Arc<dyn Fn(OracleResponse) + Send + Sync>) {
        *self.broadcaster.lock() = Some(broadcaster);
    }

    fn add_response(&self, _pub_key: &[u8], request_id: u64, tx_signature: &[u8]) -> anyhow::Result<()> {
        if let Some(broadcaster) = self.broadcaster.lock().as_ref() {
            broadcaster(OracleResponse { request_id, tx_signature: tx_signature.to_vec() });
        }
        Ok(())
    }
}
