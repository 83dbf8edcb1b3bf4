//! JSON-RPC error taxonomy (spec §3, §7).
//!
//! Rust port of `Neo.Plugins.RpcServer.RpcError` / `RpcException`: a fixed
//! set of error kinds, each with a JSON-RPC error code, a fixed message, and
//! an optional free-form `data` string attached at the call site.

use std::fmt;

use warp::http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RpcErrorKind {
    #[error("parse error")]
    ParseError,
    #[error("invalid request")]
    InvalidRequest,
    #[error("method not found")]
    MethodNotFound,
    #[error("invalid params")]
    InvalidParams,
    #[error("internal server error")]
    InternalServerError,
    #[error("unknown block")]
    UnknownBlock,
    #[error("unknown transaction")]
    UnknownTransaction,
    #[error("unknown header")]
    UnknownHeader,
    #[error("unknown contract")]
    UnknownContract,
    #[error("unknown state root")]
    UnknownStateRoot,
    #[error("unknown storage item")]
    UnknownStorageItem,
    #[error("unknown script container")]
    UnknownScriptContainer,
    #[error("already exists")]
    AlreadyExists,
    #[error("out of memory")]
    OutOfMemory,
    #[error("policy failed")]
    PolicyFail,
    #[error("validation failed")]
    ValidationFailed,
    #[error("access denied")]
    AccessDenied,
}

impl RpcErrorKind {
    /// JSON-RPC `error.code`. Negative codes below -32000 mirror the
    /// C#/neo-go convention of one fixed code per domain error, offset from
    /// the standard JSON-RPC reserved range.
    pub fn code(self) -> i64 {
        use RpcErrorKind::*;
        match self {
            ParseError => -32700,
            InvalidRequest => -32600,
            MethodNotFound => -32601,
            InvalidParams => -32602,
            InternalServerError => -32603,
            UnknownBlock => -101,
            UnknownTransaction => -102,
            UnknownHeader => -103,
            UnknownContract => -104,
            UnknownStateRoot => -105,
            UnknownStorageItem => -106,
            UnknownScriptContainer => -107,
            AlreadyExists => -501,
            OutOfMemory => -502,
            PolicyFail => -503,
            ValidationFailed => -504,
            AccessDenied => -505,
        }
    }

    /// HTTP status derived from the error kind, per spec §7's mapping table.
    pub fn http_status(self) -> StatusCode {
        use RpcErrorKind::*;
        match self {
            ParseError | InvalidRequest => StatusCode::BAD_REQUEST,
            InvalidParams => StatusCode::UNPROCESSABLE_ENTITY,
            MethodNotFound => StatusCode::NOT_FOUND,
            AccessDenied => StatusCode::UNAUTHORIZED,
            InternalServerError
            | UnknownBlock
            | UnknownTransaction
            | UnknownHeader
            | UnknownContract
            | UnknownStateRoot
            | UnknownStorageItem
            | UnknownScriptContainer
            | AlreadyExists
            | OutOfMemory
            | PolicyFail
            | ValidationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a handler failure of this kind should be logged at ERROR
    /// (rather than INFO) per spec §7's propagation rule.
    pub fn is_error_level(self) -> bool {
        matches!(self, RpcErrorKind::InternalServerError)
    }
}

#[derive(Debug, Clone)]
pub struct RpcError {
    kind: RpcErrorKind,
    data: Option<String>,
}

impl RpcError {
    pub fn new(kind: RpcErrorKind) -> Self {
        Self { kind, data: None }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn kind(&self) -> RpcErrorKind {
        self.kind
    }

    pub fn code(&self) -> i64 {
        self.kind.code()
    }

    pub fn error_message(&self) -> String {
        self.kind.to_string()
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn http_status(&self) -> StatusCode {
        self.kind.http_status()
    }

    pub fn parse_error() -> Self {
        Self::new(RpcErrorKind::ParseError)
    }

    pub fn invalid_request() -> Self {
        Self::new(RpcErrorKind::InvalidRequest)
    }

    pub fn method_not_found() -> Self {
        Self::new(RpcErrorKind::MethodNotFound)
    }

    pub fn invalid_params() -> Self {
        Self::new(RpcErrorKind::InvalidParams)
    }

    pub fn internal_server_error() -> Self {
        Self::new(RpcErrorKind::InternalServerError)
    }

    pub fn unknown_block() -> Self {
        Self::new(RpcErrorKind::UnknownBlock)
    }

    pub fn unknown_transaction() -> Self {
        Self::new(RpcErrorKind::UnknownTransaction)
    }

    pub fn unknown_header() -> Self {
        Self::new(RpcErrorKind::UnknownHeader)
    }

    pub fn unknown_contract() -> Self {
        Self::new(RpcErrorKind::UnknownContract)
    }

    pub fn unknown_state_root() -> Self {
        Self::new(RpcErrorKind::UnknownStateRoot)
    }

    pub fn unknown_storage_item() -> Self {
        Self::new(RpcErrorKind::UnknownStorageItem)
    }

    pub fn unknown_script_container() -> Self {
        Self::new(RpcErrorKind::UnknownScriptContainer)
    }

    pub fn already_exists() -> Self {
        Self::new(RpcErrorKind::AlreadyExists)
    }

    pub fn out_of_memory() -> Self {
        Self::new(RpcErrorKind::OutOfMemory)
    }

    pub fn policy_fail() -> Self {
        Self::new(RpcErrorKind::PolicyFail)
    }

    pub fn validation_failed() -> Self {
        Self::new(RpcErrorKind::ValidationFailed)
    }

    pub fn access_denied() -> Self {
        Self::new(RpcErrorKind::AccessDenied)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{} ({})", self.kind, data),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// The error type threaded through every handler's `Result`.
#[derive(Debug, Clone)]
pub struct RpcException {
    error: RpcError,
}

impl RpcException {
    pub fn new(error: RpcError) -> Self {
        Self { error }
    }

    pub fn error(&self) -> &RpcError {
        &self.error
    }

    pub fn into_error(self) -> RpcError {
        self.error
    }
}

impl fmt::Display for RpcException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RpcException {}

impl From<RpcError> for RpcException {
    fn from(error: RpcError) -> Self {
        Self::new(error)
    }
}

/// Convenience for collaborator calls that fail with an opaque `anyhow`
/// error: always surfaces as `InternalServerError`, matching handlers such
/// as `rpc_server_blockchain.rs::internal_error`.
pub fn internal_error(err: impl fmt::Display) -> RpcException {
    RpcException::new(RpcError::internal_server_error().with_data(err.to_string()))
}

pub fn invalid_params(message: impl Into<String>) -> RpcException {
    RpcException::new(RpcError::invalid_params().with_data(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_spec_table() {
        assert_eq!(
            RpcError::parse_error().http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RpcError::method_not_found().http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RpcError::invalid_params().http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            RpcError::already_exists().http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn display_includes_data_when_present() {
        let err = RpcError::invalid_params().with_data("bad height");
        assert_eq!(err.to_string(), "invalid params (bad height)");
    }
}
