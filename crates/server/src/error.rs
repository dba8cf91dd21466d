//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Server result type
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Registration barrier not released yet")]
    NotReady,

    #[error("Unknown client id: {0}")]
    UnknownClient(u32),

    #[error("Protocol violation: {0}")]
    Violation(String),

    #[error(transparent)]
    Protocol(#[from] mixbox_protocol::ProtocolError),

    #[error(transparent)]
    Crypto(#[from] mixbox_crypto::CryptoError),

    #[error(transparent)]
    Pir(#[from] mixbox_pir::PirError),

    #[error("RPC to server {peer} failed: {detail}")]
    Rpc { peer: usize, detail: String },

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY"),
            ServerError::UnknownClient(_) => (StatusCode::NOT_FOUND, "UNKNOWN_CLIENT"),
            ServerError::Violation(_) => (StatusCode::BAD_REQUEST, "PROTOCOL_VIOLATION"),
            ServerError::Protocol(_) => (StatusCode::BAD_REQUEST, "BAD_MESSAGE"),
            ServerError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CRYPTO_FAILURE"),
            ServerError::Pir(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PIR_FAILURE"),
            ServerError::Rpc { .. } => (StatusCode::BAD_GATEWAY, "PEER_RPC_FAILED"),
            ServerError::ChannelClosed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CHANNEL_CLOSED"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
