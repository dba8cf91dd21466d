//! Bootstrap and registration endpoints

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mixbox_protocol::{ClientRegistration, RegisterDone, RegisterReply};

use crate::error::Result;
use crate::registry;
use crate::routes::{decode_body, octet_reply};
use crate::state::AppState;

/// GET /v1/pk - this server's long-term public key, raw compressed bytes
pub async fn pk(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [("content-type", "application/octet-stream")],
        state.server.crypto().pk_bytes().to_vec(),
    )
        .into_response()
}

/// POST /v1/register - host entry; assigns the client id and fans out
pub async fn register(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let reg: ClientRegistration = decode_body(&body)?;
    let client_id = registry::register(&state.server, reg).await?;
    octet_reply(&RegisterReply { client_id })
}

/// POST /v1/register/fanin - broadcast fan-in of one registration record
pub async fn register_fanin(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let reg: ClientRegistration = decode_body(&body)?;
    registry::register2(&state.server, reg);
    Ok(StatusCode::OK)
}

/// POST /v1/register/done - barrier release
pub async fn register_done(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let done: RegisterDone = decode_body(&body)?;
    registry::register_done2(&state.server, done.total_clients);
    Ok(StatusCode::OK)
}

/// GET /v1/register/count - registrations known to this server
pub async fn num_clients(State(state): State<AppState>) -> Result<impl IntoResponse> {
    octet_reply(&(state.server.registry().len() as u32))
}
