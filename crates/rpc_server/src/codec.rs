//! Wire Codec (spec §4.A): decodes JSON-RPC requests (single or batch),
//! encodes responses, and derives HTTP status from the error taxonomy.
//!
//! Raw parameters are kept as a deferred-decoded `serde_json::Value` blob
//! until a handler extracts typed values (see `params.rs`), so parameter
//! parse errors are attributed to the specific method rather than to the
//! codec itself.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// A single decoded invocation. `id` and `method` are kept around even when
/// parameter extraction later fails, so the response can still echo them.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: Option<Value>,
    pub method: String,
    pub params: Vec<Value>,
}

pub type BatchEntry = Result<Invocation, (Option<Value>, RpcError)>;

#[derive(Debug)]
pub enum WireRequest {
    Single(Invocation),
    Batch(Vec<BatchEntry>),
}

/// Parses an octet stream per spec §4.A: `[` (after skipping whitespace)
/// means batch, otherwise single invocation.
pub fn decode_request(body: &[u8]) -> Result<WireRequest, RpcError> {
    let value: Value = serde_json::from_slice(strip_bom(body))
        .map_err(|_| RpcError::parse_error())?;

    match value {
        Value::Array(entries) => {
            if entries.is_empty() {
                return Err(RpcError::invalid_request().with_data("empty batch"));
            }
            let decoded = entries.into_iter().map(decode_object).collect();
            Ok(WireRequest::Batch(decoded))
        }
        Value::Object(_) => {
            let invocation = decode_object(value).map_err(|(_, err)| err)?;
            Ok(WireRequest::Single(invocation))
        }
        _ => Err(RpcError::invalid_request()),
    }
}

fn decode_object(value: Value) -> Result<Invocation, (Option<Value>, RpcError)> {
    let mut obj = match value {
        Value::Object(obj) => obj,
        _ => return Err((None, RpcError::invalid_request())),
    };

    let id = obj.remove("id");

    let version = obj.remove("jsonrpc");
    match version {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        _ => {
            return Err((
                id,
                RpcError::invalid_params().with_data("unsupported or missing jsonrpc version"),
            ))
        }
    }

    let method = match obj.remove("method") {
        Some(Value::String(name)) => name,
        _ => return Err((id, RpcError::invalid_request().with_data("missing method"))),
    };

    let params = match obj.remove("params") {
        None => Vec::new(),
        Some(Value::Array(values)) => values,
        Some(_) => {
            return Err((
                id,
                RpcError::invalid_request().with_data("params must be an array"),
            ))
        }
    };

    Ok(Invocation { id, method, params })
}

fn strip_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(body)
}

/// Mirrors the reference node's `RpcQueryParams` GET convenience path
/// (`rpc_server.rs::handle_get_request`): `method`/`id` as plain strings,
/// `params` as either a base64-encoded or raw JSON array.
#[derive(Debug, Default, Deserialize)]
pub struct RpcQueryParams {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<String>,
}

pub fn decode_get_query(query: &RpcQueryParams) -> Result<Invocation, RpcError> {
    let method = query
        .method
        .clone()
        .ok_or_else(RpcError::invalid_request)?;
    let id = query.id.clone().map(Value::String);
    let params_raw = query
        .params
        .clone()
        .ok_or_else(RpcError::invalid_request)?;
    let params = parse_query_params(&params_raw).ok_or_else(RpcError::invalid_request)?;
    Ok(Invocation { id, method, params })
}

fn parse_query_params(input: &str) -> Option<Vec<Value>> {
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine as _;

    let decoded = BASE64_STANDARD
        .decode(input)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .or_else(|| serde_json::from_str::<Value>(input).ok())?;

    match decoded {
        Value::Array(values) => Some(values),
        _ => None,
    }
}

pub fn success_response(id: Option<Value>, result: Value) -> Value {
    let mut response = Map::new();
    response.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    response.insert("result".to_string(), result);
    response.insert("id".to_string(), id.unwrap_or(Value::Null));
    Value::Object(response)
}

pub fn error_response(id: Option<Value>, error: &RpcError) -> Value {
    let mut response = Map::new();
    response.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    response.insert("id".to_string(), id.unwrap_or(Value::Null));

    let mut error_obj = Map::new();
    error_obj.insert("code".to_string(), Value::from(error.code()));
    error_obj.insert("message".to_string(), Value::String(error.error_message()));
    if let Some(data) = error.data() {
        error_obj.insert("data".to_string(), Value::String(data.to_string()));
    }
    response.insert("error".to_string(), Value::Object(error_obj));
    Value::Object(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_invocation() {
        let body = br#"{"jsonrpc":"2.0","method":"getblockcount","params":[],"id":1}"#;
        match decode_request(body).unwrap() {
            WireRequest::Single(inv) => {
                assert_eq!(inv.method, "getblockcount");
                assert_eq!(inv.id, Some(Value::from(1)));
                assert!(inv.params.is_empty());
            }
            WireRequest::Batch(_) => panic!("expected single invocation"),
        }
    }

    #[test]
    fn decodes_batch_preserving_length_and_ids() {
        let body = br#"[
            {"jsonrpc":"2.0","method":"getblockcount","id":1},
            {"jsonrpc":"2.0","method":"nope","id":2},
            {"jsonrpc":"2.0","method":"getblockhash","params":[-1],"id":3}
        ]"#;
        match decode_request(body).unwrap() {
            WireRequest::Batch(entries) => {
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0].as_ref().unwrap().id, Some(Value::from(1)));
                assert_eq!(entries[1].as_ref().unwrap().method, "nope");
                assert_eq!(entries[2].as_ref().unwrap().id, Some(Value::from(3)));
            }
            WireRequest::Single(_) => panic!("expected batch"),
        }
    }

    #[test]
    fn rejects_empty_batch() {
        assert!(decode_request(b"[]").is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            decode_request(b"not json"),
            Err(e) if e.kind() == crate::error::RpcErrorKind::ParseError
        ));
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let body = br#"{"jsonrpc":"1.0","method":"getblockcount","id":1}"#;
        let err = decode_request(body).unwrap_err();
        assert_eq!(err.kind(), crate::error::RpcErrorKind::InvalidParams);
    }

    #[test]
    fn non_string_id_is_echoed_verbatim() {
        let body = br#"{"jsonrpc":"2.0","method":"getblockcount","id":"abc-123"}"#;
        match decode_request(body).unwrap() {
            WireRequest::Single(inv) => {
                assert_eq!(inv.id, Some(Value::String("abc-123".to_string())));
            }
            _ => panic!("expected single"),
        }
    }

    #[test]
    fn success_and_error_responses_carry_id() {
        let success = success_response(Some(Value::from(7)), Value::from(42));
        assert_eq!(success["id"], Value::from(7));
        assert_eq!(success["result"], Value::from(42));

        let error = error_response(Some(Value::from(7)), &RpcError::invalid_params());
        assert_eq!(error["id"], Value::from(7));
        assert_eq!(error["error"]["code"], Value::from(-32602));
    }
}
