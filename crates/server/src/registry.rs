//! Registration coordinator
//!
//! Two-phase barrier. Phase 1: the host assigns the next client id and
//! fans the record out to every server. Phase 2: once the known roster
//! reaches the configured total, the triggering host broadcasts the final
//! count; every receiver allocates its per-client round state and opens
//! the pipelines.
//!
//! Duplicate registrations are not detected; concurrent registrations
//! through different hosts are unserialized and their id assignment is
//! undefined.

use std::collections::HashMap;
use std::sync::Arc;

use mixbox_protocol::ClientRegistration;
use parking_lot::Mutex;

use crate::error::{Result, ServerError};
use crate::pipeline;
use crate::state::{RoundState, ServerState};

#[derive(Default)]
struct Roster {
    clients: Vec<ClientRegistration>,
    client_map: HashMap<u32, u32>,
}

/// Process-lifetime registration state. Two locks, as the two phases
/// mutate disjoint data: `assign` serializes local id assignment, `roster`
/// guards the fan-in list and host map.
pub struct Registry {
    assign: Mutex<u32>,
    roster: Mutex<Roster>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            assign: Mutex::new(0),
            roster: Mutex::new(Roster::default()),
        }
    }

    /// Assign the next client id. The watermark starts from the known
    /// roster so ids stay monotone across hosts when registrations arrive
    /// one at a time.
    pub fn assign_id(&self) -> u32 {
        let mut next = self.assign.lock();
        let id = (*next).max(self.roster.lock().clients.len() as u32);
        *next = id + 1;
        id
    }

    /// Record one fanned-in registration.
    pub fn insert(&self, reg: ClientRegistration) {
        let mut roster = self.roster.lock();
        roster.client_map.insert(reg.id, reg.server_id);
        roster.clients.push(reg);
    }

    /// Number of registrations known cluster-wide.
    pub fn len(&self) -> usize {
        self.roster.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn host_of(&self, client_id: u32) -> Option<u32> {
        self.roster.lock().client_map.get(&client_id).copied()
    }

    /// Client ids hosted by `server_id`, ascending.
    pub fn hosted_by(&self, server_id: u32) -> Vec<u32> {
        let roster = self.roster.lock();
        let mut ids: Vec<u32> = roster
            .client_map
            .iter()
            .filter(|(_, host)| **host == server_id)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Snapshot of the host map, for invariant checks.
    pub fn client_map(&self) -> HashMap<u32, u32> {
        self.roster.lock().client_map.clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Phase 1 host entry: assign an id, fan the record out, and release the
/// barrier if this registration completes the roster.
pub async fn register(state: &Arc<ServerState>, mut reg: ClientRegistration) -> Result<u32> {
    let id = state.registry().assign_id();
    reg.id = id;
    tracing::info!(client = id, host = reg.server_id, addr = %reg.addr, "registering client");

    let peers = state.peers()?;
    for peer in 0..state.num_servers() {
        if let Err(err) = peers.register2(peer, &reg).await {
            // A partial registration is unrecoverable.
            state.report_fatal("register", err);
            return Err(ServerError::Internal("registration fan-out failed".into()));
        }
    }

    if state.registry().len() == state.config().num_clients {
        register_done(state).await?;
    }
    Ok(id)
}

/// Phase 1 fan-in: record the registration.
pub fn register2(state: &Arc<ServerState>, reg: ClientRegistration) {
    state.registry().insert(reg);
}

/// Phase 2 initiation: broadcast the agreed total.
pub async fn register_done(state: &Arc<ServerState>) -> Result<()> {
    let total = state.registry().len() as u32;
    let peers = state.peers()?;
    for peer in 0..state.num_servers() {
        if let Err(err) = peers.register_done2(peer, total).await {
            state.report_fatal("register", err);
            return Err(ServerError::Internal("barrier release fan-out failed".into()));
        }
    }
    Ok(())
}

/// Phase 2 receipt: allocate per-client round state, release the gate, and
/// start the round pipelines. Idempotent against a double barrier release.
pub fn register_done2(state: &Arc<ServerState>, total_clients: u32) {
    let round = Arc::new(RoundState::new(
        total_clients as usize,
        state.num_servers(),
        state.config().secret_size,
    ));
    if state.install_round(round) {
        state.set_reg_done();
        pipeline::spawn(state);
        tracing::info!(num_clients = total_clients, "registration barrier released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, server_id: u32) -> ClientRegistration {
        ClientRegistration {
            id,
            addr: format!("127.0.0.1:{}", 9000 + id),
            server_id,
        }
    }

    #[test]
    fn ids_are_monotone_within_a_host() {
        let registry = Registry::new();
        assert_eq!(registry.assign_id(), 0);
        assert_eq!(registry.assign_id(), 1);
        assert_eq!(registry.assign_id(), 2);
    }

    #[test]
    fn assignment_accounts_for_remote_registrations() {
        let registry = Registry::new();
        // Two registrations fanned in from another host.
        registry.insert(record(0, 1));
        registry.insert(record(1, 1));
        assert_eq!(registry.assign_id(), 2);
    }

    #[test]
    fn host_map_lookup() {
        let registry = Registry::new();
        registry.insert(record(0, 0));
        registry.insert(record(1, 1));
        assert_eq!(registry.host_of(0), Some(0));
        assert_eq!(registry.host_of(1), Some(1));
        assert_eq!(registry.host_of(2), None);
        assert_eq!(registry.hosted_by(1), vec![1]);
    }
}
