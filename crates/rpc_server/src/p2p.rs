//! The `P2PServer` capability (spec §6 "Required P2P capability set").
//!
//! Stands in for `neo_core::network::p2p::local_node::LocalNode` in the
//! teacher's concrete node.

use tokio::sync::mpsc;

use crate::types::{NotaryRequestEvent, NotaryRequestRecord, PeerAddress, RelayOutcome, TransactionRecord};

pub trait P2PServer: Send + Sync {
    fn connected_count(&self) -> usize;
    fn unconnected_count(&self) -> usize;
    fn bad_count(&self) -> usize;
    fn tcp_port(&self) -> u16;
    fn nonce(&self) -> u32;
    fn user_agent(&self) -> String;

    fn connected_peers(&self) -> Vec<PeerAddress>;
    fn unconnected_peers(&self) -> Vec<PeerAddress>;
    fn bad_peers(&self) -> Vec<PeerAddress>;

    fn relay_transaction(&self, tx: TransactionRecord) -> RelayOutcome;
    fn relay_notary_request(&self, request: NotaryRequestRecord) -> RelayOutcome;

    fn subscribe_notary_requests(&self) -> mpsc::Receiver<NotaryRequestEvent>;
    fn unsubscribe_notary_requests(&self);
}
