//! Feed kinds and filter shapes (spec §3 "Feed", §4.E "Filter semantics").

use serde::Deserialize;
use serde_json::Value;

use crate::error::{invalid_params, RpcException};
use crate::hash_types::UInt160;
use crate::types::{BlockEvent, ExecutionEvent, ExecutionState, NotaryRequestEvent, NotificationEvent, TransactionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Block,
    Transaction,
    Notification,
    Execution,
    NotaryRequest,
}

impl EventKind {
    /// Mirrors the reference node's stream names (spec scenario 3: `block_added`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "block_added" => Some(Self::Block),
            "transaction_added" => Some(Self::Transaction),
            "notification_from_execution" => Some(Self::Notification),
            "transaction_executed" => Some(Self::Execution),
            "notary_request_event" => Some(Self::NotaryRequest),
            _ => None,
        }
    }

    pub fn is_reserved_missed_event(name: &str) -> bool {
        name.eq_ignore_ascii_case("missed_event")
    }
}

#[derive(Debug, Clone)]
pub enum EventFilter {
    Block {
        primary_validator: Option<u8>,
        since: Option<u32>,
        until: Option<u32>,
    },
    Transaction {
        sender: Option<UInt160>,
        signer: Option<UInt160>,
    },
    Notification {
        contract: Option<UInt160>,
        event_name: Option<String>,
    },
    Execution {
        state: ExecutionState,
    },
    NotaryRequest {
        sender: Option<UInt160>,
        signer: Option<UInt160>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBlockFilter {
    primary: Option<u8>,
    since: Option<u32>,
    until: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransactionFilter {
    sender: Option<String>,
    signer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNotificationFilter {
    contract: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExecutionFilter {
    state: String,
}

/// Decodes a feed's optional filter object, strict on unknown fields (spec
/// §4.E "Filter decoding disallows unknown fields").
pub fn decode_filter(kind: EventKind, raw: Option<&Value>) -> Result<Option<EventFilter>, RpcException> {
    let raw = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    let bad = || invalid_params("unknown or malformed filter field");

    match kind {
        EventKind::Block => {
            let parsed: RawBlockFilter = serde_json::from_value(raw.clone()).map_err(|_| bad())?;
            Ok(Some(EventFilter::Block {
                primary_validator: parsed.primary,
                since: parsed.since,
                until: parsed.until,
            }))
        }
        EventKind::Transaction | EventKind::NotaryRequest => {
            let parsed: RawTransactionFilter = serde_json::from_value(raw.clone()).map_err(|_| bad())?;
            let sender = parsed.sender.as_deref().map(str::parse).transpose().map_err(|_| bad())?;
            let signer = parsed.signer.as_deref().map(str::parse).transpose().map_err(|_| bad())?;
            if kind == EventKind::Transaction {
                Ok(Some(EventFilter::Transaction { sender, signer }))
            } else {
                Ok(Some(EventFilter::NotaryRequest { sender, signer }))
            }
        }
        EventKind::Notification => {
            let parsed: RawNotificationFilter = serde_json::from_value(raw.clone()).map_err(|_| bad())?;
            let contract = parsed.contract.as_deref().map(str::parse).transpose().map_err(|_| bad())?;
            Ok(Some(EventFilter::Notification {
                contract,
                event_name: parsed.name,
            }))
        }
        EventKind::Execution => {
            // Spec: "ExecutionFilter must have state ∈ {HALT, FAULT}" — the
            // field is mandatory once an execution filter object is given.
            let parsed: RawExecutionFilter = serde_json::from_value(raw.clone()).map_err(|_| bad())?;
            let state = match parsed.state.as_str() {
                "HALT" => ExecutionState::Halt,
                "FAULT" => ExecutionState::Fault,
                _ => return Err(bad()),
            };
            Ok(Some(EventFilter::Execution { state }))
        }
    }
}

pub enum ChainEvent {
    Block(BlockEvent),
    Transaction(TransactionEvent),
    Notification(NotificationEvent),
    Execution(ExecutionEvent),
    NotaryRequest(NotaryRequestEvent),
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChainEvent::Block(_) => EventKind::Block,
            ChainEvent::Transaction(_) => EventKind::Transaction,
            ChainEvent::Notification(_) => EventKind::Notification,
            ChainEvent::Execution(_) => EventKind::Execution,
            ChainEvent::NotaryRequest(_) => EventKind::NotaryRequest,
        }
    }
}

/// Absent fields in a filter act as wildcards (spec §4.E).
pub fn matches(filter: Option<&EventFilter>, event: &ChainEvent) -> bool {
    let filter = match filter {
        None => return true,
        Some(f) => f,
    };

    match (filter, event) {
        (EventFilter::Block { primary_validator, since, until }, ChainEvent::Block(e)) => {
            primary_validator.map_or(true, |p| p == e.block.header.primary_validator)
                && since.map_or(true, |s| e.block.header.index >= s)
                && until.map_or(true, |u| e.block.header.index <= u)
        }
        (EventFilter::Transaction { sender, signer }, ChainEvent::Transaction(e)) => {
            sender.map_or(true, |s| s == e.transaction.sender)
                && signer.map_or(true, |s| e.transaction.signers.iter().any(|sig| sig.account == s))
        }
        (EventFilter::Notification { contract, event_name }, ChainEvent::Notification(e)) => {
            contract.map_or(true, |c| c == e.script_hash)
                && event_name.as_deref().map_or(true, |n| n == e.event_name)
        }
        (EventFilter::Execution { state }, ChainEvent::Execution(e)) => *state == e.state,
        (EventFilter::NotaryRequest { sender, signer }, ChainEvent::NotaryRequest(e)) => {
            sender.map_or(true, |s| s == e.request.main_transaction.sender)
                && signer.map_or(true, |s| {
                    e.request
                        .main_transaction
                        .signers
                        .iter()
                        .any(|sig| sig.account == s)
                })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_types::UInt256;
    use crate::types::Trigger;

    fn execution_event(state: ExecutionState) -> ChainEvent {
        ChainEvent::Execution(ExecutionEvent {
            container: UInt256::zero(),
            trigger: Trigger::Application,
            state,
            gas_consumed: 0,
            stack: Vec::new(),
            notifications: Vec::new(),
            fault_exception: None,
        })
    }

    // Scenario: a subscriber filtering on state=HALT never sees a FAULT
    // execution, even though both ride the same `transaction_executed` feed.
    #[test]
    fn execution_filter_misses_on_mismatched_state() {
        let halt_only = EventFilter::Execution { state: ExecutionState::Halt };
        assert!(matches(Some(&halt_only), &execution_event(ExecutionState::Halt)));
        assert!(!matches(Some(&halt_only), &execution_event(ExecutionState::Fault)));
    }

    #[test]
    fn absent_filter_matches_everything() {
        assert!(matches(None, &execution_event(ExecutionState::Fault)));
    }

    #[test]
    fn decode_filter_rejects_unknown_fields() {
        let raw = serde_json::json!({"state": "HALT", "bogus": 1});
        let err = decode_filter(EventKind::Execution, Some(&raw)).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InvalidParams);
    }

    #[test]
    fn decode_filter_rejects_unknown_execution_state() {
        let raw = serde_json::json!({"state": "RUNNING"});
        assert!(decode_filter(EventKind::Execution, Some(&raw)).is_err());
    }

    #[test]
    fn decode_filter_absent_is_wildcard() {
        let decoded = decode_filter(EventKind::Block, None).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn block_filter_enforces_since_until_range() {
        let filter = EventFilter::Block { primary_validator: None, since: Some(10), until: Some(20) };
        let make = |index: u32| {
            ChainEvent::Block(BlockEvent {
                block: crate::types::BlockData {
                    header: crate::types::BlockHeaderData {
                        hash: UInt256::zero(),
                        version: 0,
                        index,
                        previous_hash: UInt256::zero(),
                        merkle_root: UInt256::zero(),
                        timestamp: 0,
                        nonce: 0,
                        next_consensus: crate::hash_types::UInt160::zero(),
                        primary_validator: 0,
                        witness_invocation: Vec::new(),
                        witness_verification: Vec::new(),
                        confirmations: 0,
                        next_block_hash: None,
                    },
                    transactions: Vec::new(),
                    size: 0,
                },
            })
        };
        assert!(!matches(Some(&filter), &make(9)));
        assert!(matches(Some(&filter), &make(10)));
        assert!(matches(Some(&filter), &make(20)));
        assert!(!matches(Some(&filter), &make(21)));
    }

    #[test]
    fn event_kind_parses_reserved_stream_names() {
        assert_eq!(EventKind::parse("block_added"), Some(EventKind::Block));
        assert_eq!(EventKind::parse("transaction_executed"), Some(EventKind::Execution));
        assert_eq!(EventKind::parse("not_a_real_stream"), None);
        assert!(EventKind::is_reserved_missed_event("MISSED_EVENT"));
    }
}
