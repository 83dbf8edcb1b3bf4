//! Parameter extraction (spec §4.B "Parameter extraction policy", Design
//! Notes §9 "Dynamic parameter typing").
//!
//! The C# source keeps a union-typed `JToken` container with runtime type
//! tags; here that's a plain `&[serde_json::Value]` slice (kept as the
//! deferred-decoded blob the Wire Codec hands off) plus a set of total
//! getter functions, each returning `Result<T, RpcException>`. A handler
//! pulling index *i* from a shorter list gets a nil marker (`Value::Null`
//! via `.get(i)` returning `None`) that every typed getter converts to
//! `InvalidParams`.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::error::{invalid_params, RpcException};
use crate::hash_types::{UInt160, UInt256};

pub struct Params<'a> {
    values: &'a [Value],
    method: &'a str,
}

impl<'a> Params<'a> {
    pub fn new(values: &'a [Value], method: &'a str) -> Self {
        Self { values, method }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    fn fail(&self, index: usize, expected: &str) -> RpcException {
        invalid_params(format!(
            "{} expects {} at parameter index {}",
            self.method, expected, index
        ))
    }

    pub fn string(&self, index: usize) -> Result<String, RpcException> {
        self.get(index)
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| self.fail(index, "a string"))
    }

    pub fn string_opt(&self, index: usize) -> Option<String> {
        self.get(index).as_str().map(|s| s.to_string())
    }

    /// Booleans default to `false` on absence (spec §4.B).
    pub fn bool_or_default(&self, index: usize) -> Result<bool, RpcException> {
        match self.get(index) {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => match n.as_u64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(self.fail(index, "a boolean")),
            },
            _ => Err(self.fail(index, "a boolean")),
        }
    }

    pub fn u32(&self, index: usize) -> Result<u32, RpcException> {
        self.get(index)
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| self.fail(index, "a non-negative 32-bit integer"))
    }

    pub fn u32_opt(&self, index: usize) -> Option<u32> {
        self.get(index)
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn i64(&self, index: usize) -> Result<i64, RpcException> {
        self.get(index)
            .as_i64()
            .ok_or_else(|| self.fail(index, "an integer"))
    }

    pub fn usize_or(&self, index: usize, default: usize) -> Result<usize, RpcException> {
        match self.get(index) {
            Value::Null => Ok(default),
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| self.fail(index, "a non-negative integer")),
            _ => Err(self.fail(index, "a non-negative integer")),
        }
    }

    pub fn base64_bytes(&self, index: usize) -> Result<Vec<u8>, RpcException> {
        let text = self.string(index)?;
        BASE64_STANDARD
            .decode(text.trim())
            .map_err(|_| self.fail(index, "base64-encoded bytes"))
    }

    pub fn base64_bytes_opt(&self, index: usize) -> Result<Option<Vec<u8>>, RpcException> {
        match self.get(index) {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => BASE64_STANDARD
                .decode(s.trim())
                .map(Some)
                .map_err(|_| self.fail(index, "base64-encoded bytes")),
            _ => Err(self.fail(index, "base64-encoded bytes")),
        }
    }

    pub fn uint256(&self, index: usize) -> Result<UInt256, RpcException> {
        let text = self.string(index)?;
        text.parse()
            .map_err(|_| self.fail(index, "a UInt256 hash"))
    }

    pub fn uint160(&self, index: usize) -> Result<UInt160, RpcException> {
        let text = self.string(index)?;
        text.parse()
            .map_err(|_| self.fail(index, "a UInt160 hash"))
    }

    /// Raw access to an optional structured parameter (e.g. a subscription
    /// filter object) that has no single typed shape of its own; `None` when
    /// the caller omitted the parameter or passed an explicit `null`.
    pub fn raw(&self, index: usize) -> Option<&'a Value> {
        match self.values.get(index) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    pub fn array(&self, index: usize) -> Result<&'a [Value], RpcException> {
        self.get(index)
            .as_array()
            .map(|v| v.as_slice())
            .ok_or_else(|| self.fail(index, "an array"))
    }
}

/// Block/header lookup accepts either a hash string or a non-negative
/// height (spec §4.C).
#[derive(Debug, Clone, Copy)]
pub enum BlockHashOrIndex {
    Hash(UInt256),
    Index(u32),
}

impl BlockHashOrIndex {
    pub fn try_parse(text: &str) -> Option<Self> {
        if let Ok(hash) = text.parse::<UInt256>() {
            return Some(Self::Hash(hash));
        }
        text.parse::<u32>().ok().map(Self::Index)
    }
}

impl<'a> Params<'a> {
    pub fn block_hash_or_index(&self, index: usize) -> Result<BlockHashOrIndex, RpcException> {
        match self.get(index) {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(BlockHashOrIndex::Index)
                .ok_or_else(|| self.fail(index, "a block height")),
            Value::String(text) => BlockHashOrIndex::try_parse(text)
                .ok_or_else(|| self.fail(index, "a block hash or height")),
            _ => Err(self.fail(index, "a block hash or height")),
        }
    }
}

/// Contract lookup accepts a name, a `UInt160` script hash, or a native
/// contract id (spec §4.C contract/state queries).
#[derive(Debug, Clone)]
pub enum ContractIdentifier {
    Hash(UInt160),
    Id(i32),
    Name(String),
}

impl ContractIdentifier {
    pub fn try_parse(text: &str) -> Option<Self> {
        if let Ok(hash) = text.parse::<UInt160>() {
            return Some(Self::Hash(hash));
        }
        if let Ok(id) = text.parse::<i32>() {
            return Some(Self::Id(id));
        }
        if !text.is_empty() {
            return Some(Self::Name(text.to_string()));
        }
        None
    }
}

impl<'a> Params<'a> {
    pub fn contract_identifier(&self, index: usize) -> Result<ContractIdentifier, RpcException> {
        let text = self.string(index)?;
        ContractIdentifier::try_parse(&text)
            .ok_or_else(|| self.fail(index, "a contract name, hash, or id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_param_yields_invalid_params_not_panic() {
        let values: Vec<Value> = vec![];
        let params = Params::new(&values, "getblockhash");
        let err = params.u32(0).unwrap_err();
        assert_eq!(err.error().kind(), crate::error::RpcErrorKind::InvalidParams);
    }

    #[test]
    fn bool_defaults_false_on_absence() {
        let values: Vec<Value> = vec![];
        let params = Params::new(&values, "getrawmempool");
        assert_eq!(params.bool_or_default(0).unwrap(), false);
    }

    #[test]
    fn block_hash_or_index_accepts_both_shapes() {
        let values = vec![Value::from(42)];
        let params = Params::new(&values, "getblock");
        assert!(matches!(
            params.block_hash_or_index(0).unwrap(),
            BlockHashOrIndex::Index(42)
        ));

        let hash_values = vec![Value::String(
            "0x0000000000000000000000000000000000000000000000000000000000000a"[..66]
                .to_string(),
        )];
        let params2 = Params::new(&hash_values, "getblock");
        assert!(matches!(
            params2.block_hash_or_index(0).unwrap(),
            BlockHashOrIndex::Hash(_)
        ));
    }

    #[test]
    fn contract_identifier_distinguishes_hash_id_and_name() {
        let values = vec![Value::from(5)];
        let params = Params::new(&values, "getcontractstate");
        assert!(matches!(
            params.contract_identifier(0).unwrap(),
            ContractIdentifier::Id(5)
        ));

        let values = vec![Value::String("NeoToken".to_string())];
        let params = Params::new(&values, "getcontractstate");
        assert!(matches!(
            params.contract_identifier(0).unwrap(),
            ContractIdentifier::Name(_)
        ));
    }
}
