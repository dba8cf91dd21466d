//! RPC routes
//!
//! One handler per contract operation. Request and reply bodies are
//! bincode payloads carried as `application/octet-stream`.

pub mod download;
pub mod exchange;
pub mod health;
pub mod register;
pub mod request;
pub mod upload;

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use mixbox_protocol::routes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;
use crate::state::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and readiness
        .route(routes::HEALTH, get(health::health))
        .route(routes::READY, get(health::ready))
        // Bootstrap and registration
        .route(routes::GET_PK, get(register::pk))
        .route(routes::REGISTER, post(register::register))
        .route(routes::REGISTER_FANIN, post(register::register_fanin))
        .route(routes::REGISTER_DONE, post(register::register_done))
        .route(routes::NUM_CLIENTS, get(register::num_clients))
        // Mask and secret exchange
        .route(routes::SHARE_MASK, post(exchange::share_mask))
        .route(routes::SHARE_SECRET, post(exchange::share_secret))
        // Request pipeline
        .route(routes::REQUEST_BLOCK, post(request::request_block))
        .route(routes::SHARE_REQUEST, post(request::share_request))
        .route(routes::REQ_HASHES, post(request::req_hashes))
        // Upload pipeline
        .route(routes::UPLOAD_BLOCK, post(upload::upload_block))
        .route(routes::UPLOAD_INTAKE, post(upload::upload_intake))
        .route(routes::SHUFFLE_BLOCKS, post(upload::shuffle_blocks))
        .route(routes::PUT_UPLOADED_BLOCKS, post(upload::put_uploaded_blocks))
        // Download pipeline
        .route(routes::PUT_CLIENT_BLOCK, post(download::put_client_block))
        .route(routes::UP_HASHES, post(download::up_hashes))
        .route(routes::GET_RESPONSE, post(download::get_response))
        // Add state
        .with_state(state)
}

/// Decode a bincode request body.
pub(crate) fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    Ok(mixbox_protocol::decode(body)?)
}

/// Encode a bincode reply body.
pub(crate) fn octet_reply<T: Serialize>(msg: &T) -> Result<Response> {
    let bytes = mixbox_protocol::encode(msg)?;
    Ok((
        StatusCode::OK,
        [("content-type", "application/octet-stream")],
        bytes,
    )
        .into_response())
}
