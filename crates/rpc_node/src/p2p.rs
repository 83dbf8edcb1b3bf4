//! In-memory `P2PServer` collaborator: reports a single synthetic peer and
//! always accepts relayed notary requests. Stands in for
//! `neo_core::network::p2p::local_node::LocalNode`.

use std::sync::Arc;

use neo_rpc_server::p2p::P2PServer;
use neo_rpc_server::types::{NotaryRequestEvent, NotaryRequestRecord, PeerAddress, RelayOutcome, TransactionRecord};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub struct InMemoryP2P {
    nonce: u32,
    tcp_port: u16,
    notary_feed: Mutex<Option<mpsc::Sender<NotaryRequestEvent>>>,
}

impl InMemoryP2P {
    pub fn new(tcp_port: u16) -> Arc<Self> {
        Arc::new(Self { nonce: tcp_port as u32 ^ 0x4e45_4f00, tcp_port, notary_feed: Mutex::new(None) })
    }
}

impl P2PServer for InMemoryP2P {
    fn connected_count(&self) -> usize {
        1
    }

    fn unconnected_count(&self) -> usize {
        0
    }

    fn bad_count(&self) -> usize {
        0
    }

    fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    fn nonce(&self) -> u32 {
        self.nonce
    }

    fn user_agent(&self) -> String {
        "/neo-rpc-node:0.1.0/".to_string()
    }

    fn connected_peers(&self) -> Vec<PeerAddress> {
        vec![PeerAddress { address: "127.0.0.1".to_string(), port: self.tcp_port }]
    }

    fn unconnected_peers(&self) -> Vec<PeerAddress> {
        Vec::new()
    }

    fn bad_peers(&self) -> Vec<PeerAddress> {
        Vec::new()
    }

    fn relay_transaction(&self, _tx: TransactionRecord) -> RelayOutcome {
        RelayOutcome::Succeed
    }

    fn relay_notary_request(&self, request: NotaryRequestRecord) -> RelayOutcome {
        if let Some(sender) = self.notary_feed.lock().as_ref() {
            let _ = sender.try_send(NotaryRequestEvent { request });
        }
        RelayOutcome::Succeed
    }

    fn subscribe_notary_requests(&self) -> mpsc::Receiver<NotaryRequestEvent> {
        let (tx, rx) = mpsc::channel(64);
        *self.notary_feed.lock() = Some(tx);
        rx
    }

    fn unsubscribe_notary_requests(&self) {
        *self.notary_feed.lock() = None;
    }
}
