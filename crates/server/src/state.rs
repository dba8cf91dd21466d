//! Server state
//!
//! `ServerState` lives for the process lifetime. Everything a round needs
//! — the per-client mailboxes, mask/secret slots, and round artifacts — is
//! allocated once when the registration barrier releases and lives in
//! `RoundState`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use mixbox_crypto::{CryptoContext, RistrettoPoint, ShuffleProof};
use mixbox_protocol::{Block, UpBlock};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::mailbox::Mailbox;
use crate::peers::PeerMesh;
use crate::registry::Registry;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<ServerState>,
}

pub struct ServerState {
    config: ServerConfig,
    crypto: CryptoContext,

    /// Outbound RPC mesh and the cluster's public keys, populated by
    /// `connect_peers` before any round begins.
    peers: OnceCell<PeerMesh>,
    pks: OnceCell<Vec<RistrettoPoint>>,
    next_pk: OnceCell<RistrettoPoint>,

    registry: Registry,
    reg_done: AtomicBool,
    round: OnceCell<Arc<RoundState>>,

    /// Upload rounds published so far (maintained by the last hop).
    rounds_published: AtomicU64,

    fatal_tx: mpsc::Sender<ServerError>,

    // Upload pipeline mailboxes; these exist for the process lifetime.
    pub ublock: Mailbox<UpBlock>,
    pub ublock2: Mailbox<UpBlock>,
    pub shuffle: Mailbox<Vec<UpBlock>>,
    pub dblocks: Mailbox<Vec<Block>>,
}

/// Per-client round state, allocated when `RegisterDone` lands.
pub struct RoundState {
    pub num_clients: usize,

    /// One request share per client per round.
    pub requests: Vec<Mailbox<Vec<Vec<u8>>>>,

    /// Incoming PIR shares, indexed `[server][client]`.
    pub xors: Vec<Vec<Mailbox<Block>>>,

    /// DH-derived PIR mask per client (zeros until `ShareMask`).
    pub masks: RwLock<Vec<Vec<u8>>>,

    /// Response secrets per client; the live build keeps these zeroed.
    pub secrets: RwLock<Vec<Vec<u8>>>,

    /// XOR-combined request shares of the current round.
    pub req_hashes: RwLock<Vec<Vec<u8>>>,

    /// Digests of the last published plaintexts.
    pub up_hashes: RwLock<Vec<Vec<u8>>>,

    /// Last round's published plaintexts, retained until replaced.
    pub all_blocks: RwLock<Vec<Block>>,

    /// Shuffle proofs from this server's most recent hop.
    pub proofs: RwLock<Vec<ShuffleProof>>,

    // Per-client readiness barriers.
    pub blocks_rdy: Vec<Mailbox<()>>,
    pub up_hashes_rdy: Vec<Mailbox<()>>,
    pub req_hashes_rdy: Vec<Mailbox<()>>,
}

impl RoundState {
    pub fn new(num_clients: usize, num_servers: usize, secret_size: usize) -> Self {
        Self {
            num_clients,
            requests: (0..num_clients).map(|_| Mailbox::new()).collect(),
            xors: (0..num_servers)
                .map(|_| (0..num_clients).map(|_| Mailbox::new()).collect())
                .collect(),
            masks: RwLock::new(vec![vec![0u8; secret_size]; num_clients]),
            secrets: RwLock::new(vec![vec![0u8; secret_size]; num_clients]),
            req_hashes: RwLock::new(Vec::new()),
            up_hashes: RwLock::new(Vec::new()),
            all_blocks: RwLock::new(Vec::new()),
            proofs: RwLock::new(Vec::new()),
            blocks_rdy: (0..num_clients).map(|_| Mailbox::new()).collect(),
            up_hashes_rdy: (0..num_clients).map(|_| Mailbox::new()).collect(),
            req_hashes_rdy: (0..num_clients).map(|_| Mailbox::new()).collect(),
        }
    }
}

impl ServerState {
    pub fn new(config: ServerConfig, fatal_tx: mpsc::Sender<ServerError>) -> Arc<Self> {
        Arc::new(Self {
            config,
            crypto: CryptoContext::new(),
            peers: OnceCell::new(),
            pks: OnceCell::new(),
            next_pk: OnceCell::new(),
            registry: Registry::new(),
            reg_done: AtomicBool::new(false),
            round: OnceCell::new(),
            rounds_published: AtomicU64::new(0),
            fatal_tx,
            ublock: Mailbox::new(),
            ublock2: Mailbox::new(),
            shuffle: Mailbox::new(),
            dblocks: Mailbox::new(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn crypto(&self) -> &CryptoContext {
        &self.crypto
    }

    pub fn id(&self) -> usize {
        self.config.id
    }

    pub fn num_servers(&self) -> usize {
        self.config.num_servers()
    }

    pub fn is_last_hop(&self) -> bool {
        self.config.is_last_hop()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn install_peers(
        &self,
        mesh: PeerMesh,
        pks: Vec<RistrettoPoint>,
        next_pk: RistrettoPoint,
    ) {
        let _ = self.pks.set(pks);
        let _ = self.next_pk.set(next_pk);
        let _ = self.peers.set(mesh);
    }

    pub fn peers(&self) -> Result<&PeerMesh> {
        self.peers
            .get()
            .ok_or_else(|| ServerError::Internal("peer mesh not connected".into()))
    }

    pub fn connected(&self) -> bool {
        self.peers.get().is_some()
    }

    /// All servers' public keys, cascade order.
    pub fn pks(&self) -> Result<&[RistrettoPoint]> {
        self.pks
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| ServerError::Internal("server public keys not fetched".into()))
    }

    /// Sum of the public keys of servers at or beyond this hop: the key
    /// this hop re-encrypts under.
    pub fn next_pk(&self) -> Result<RistrettoPoint> {
        self.next_pk
            .get()
            .copied()
            .ok_or_else(|| ServerError::Internal("cascade key not derived".into()))
    }

    pub fn install_round(&self, round: Arc<RoundState>) -> bool {
        self.round.set(round).is_ok()
    }

    /// The per-client round state; gate for every pipeline handler.
    pub fn round(&self) -> Result<&Arc<RoundState>> {
        if !self.reg_done.load(Ordering::Acquire) {
            return Err(ServerError::NotReady);
        }
        self.round
            .get()
            .ok_or_else(|| ServerError::Internal("round state missing after barrier".into()))
    }

    pub fn reg_done(&self) -> bool {
        self.reg_done.load(Ordering::Acquire)
    }

    pub fn set_reg_done(&self) {
        self.reg_done.store(true, Ordering::Release);
    }

    /// Host server of a registered client.
    pub fn host_of(&self, client_id: u32) -> Result<u32> {
        self.registry
            .host_of(client_id)
            .ok_or(ServerError::UnknownClient(client_id))
    }

    /// Locally hosted client ids, ascending.
    pub fn hosted_clients(&self) -> Vec<u32> {
        self.registry.hosted_by(self.id() as u32)
    }

    pub fn next_round_number(&self) -> u64 {
        self.rounds_published.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Report a fatal pipeline failure. The cluster cannot recover from a
    /// lost message, so the binary terminates on receipt.
    pub fn report_fatal(&self, stage: &'static str, err: ServerError) {
        tracing::error!(stage, error = %err, "fatal pipeline failure");
        let _ = self.fatal_tx.try_send(err);
    }

    // Accessors used by the cluster harness to check cross-server
    // invariants.

    pub fn masks(&self) -> Vec<Vec<u8>> {
        self.round()
            .map(|r| r.masks.read().clone())
            .unwrap_or_default()
    }

    pub fn secrets(&self) -> Vec<Vec<u8>> {
        self.round()
            .map(|r| r.secrets.read().clone())
            .unwrap_or_default()
    }
}
