//! Error taxonomy surfaced on the wire as JSON-RPC error codes, or logged
//! when no request is outstanding (notifications, background tasks).

use tower_lsp::jsonrpc::{Error as RpcError, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("request cancelled")]
    RequestCancelled,

    #[error("unknown document: {0}")]
    UnknownDocument(String),

    #[error("document already open: {0}")]
    AlreadyOpen(String),
}

impl From<ServerError> for RpcError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidParams(msg) => RpcError {
                code: ErrorCode::InvalidParams,
                message: msg.into(),
                data: None,
            },
            ServerError::MethodNotFound(msg) => RpcError {
                code: ErrorCode::MethodNotFound,
                message: msg.into(),
                data: None,
            },
            ServerError::InvariantViolation(msg) => RpcError {
                code: ErrorCode::InvalidRequest,
                message: msg.into(),
                data: None,
            },
            ServerError::InternalError(msg) => RpcError {
                code: ErrorCode::InternalError,
                message: msg.into(),
                data: None,
            },
            ServerError::ParseError(msg) => RpcError {
                code: ErrorCode::ParseError,
                message: msg.into(),
                data: None,
            },
            ServerError::RequestCancelled => RpcError {
                // -32800 is the LSP-defined `RequestCancelled` code; tower-lsp's
                // `ErrorCode` only enumerates the base JSON-RPC codes, so we reach
                // for its escape hatch.
                code: ErrorCode::ServerError(-32800),
                message: "request cancelled".into(),
                data: None,
            },
            ServerError::UnknownDocument(uri) => RpcError {
                code: ErrorCode::InvalidRequest,
                message: format!("unknown document: {uri}").into(),
                data: None,
            },
            ServerError::AlreadyOpen(uri) => RpcError {
                code: ErrorCode::InvalidRequest,
                message: format!("document already open: {uri}").into(),
                data: None,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
