//! Protocol constants and the shared route table

/// Default payload block length in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 16;

/// Default length of the pre-exchange mask/secret slots in bytes.
pub const DEFAULT_SECRET_SIZE: usize = 16;

/// Route table shared by the server router, the peer mesh, and clients.
pub mod routes {
    pub const HEALTH: &str = "/health";
    pub const READY: &str = "/ready";

    pub const GET_PK: &str = "/v1/pk";
    pub const REGISTER: &str = "/v1/register";
    pub const REGISTER_FANIN: &str = "/v1/register/fanin";
    pub const REGISTER_DONE: &str = "/v1/register/done";
    pub const NUM_CLIENTS: &str = "/v1/register/count";

    pub const SHARE_MASK: &str = "/v1/exchange/mask";
    pub const SHARE_SECRET: &str = "/v1/exchange/secret";

    pub const REQUEST_BLOCK: &str = "/v1/request/block";
    pub const SHARE_REQUEST: &str = "/v1/request/share";
    pub const REQ_HASHES: &str = "/v1/request/hashes";

    pub const UPLOAD_BLOCK: &str = "/v1/upload/block";
    pub const UPLOAD_INTAKE: &str = "/v1/upload/intake";
    pub const SHUFFLE_BLOCKS: &str = "/v1/upload/shuffle";
    pub const PUT_UPLOADED_BLOCKS: &str = "/v1/upload/published";

    pub const PUT_CLIENT_BLOCK: &str = "/v1/download/share";
    pub const UP_HASHES: &str = "/v1/download/hashes";
    pub const GET_RESPONSE: &str = "/v1/download/response";
}
