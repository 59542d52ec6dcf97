//! Connection registry for the avatar relay
//!
//! This module owns every live connection record:
//! - Identifier allocation and release through [`IdAllocator`]
//! - The latest avatar state received from each connection
//! - Liveness bookkeeping consumed by the heartbeat monitor
//! - Capacity enforcement and registration-order iteration
//!
//! Iteration follows registration order so snapshot and catch-up output is
//! deterministic.

use crate::id_allocator::IdAllocator;
use crate::liveness::Liveness;
use crate::transport::Transport;
use log::info;
use shared::AvatarUpdate;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One live connection and everything the server knows about it
pub struct Client {
    /// Server-assigned identifier, also the id stamped on relayed state
    pub id: u16,
    /// Serial of the socket this record belongs to, used to discard events
    /// from a previous holder of the same identifier
    pub session: u64,
    /// Outbound half of the connection
    pub transport: Box<dyn Transport>,
    /// Most recent state received from this connection
    pub update: AvatarUpdate,
    /// When the connection was registered
    pub connected_at: Instant,
    /// Most recent proof of life, starting at connect time
    pub last_alive_at: Instant,
    pub liveness: Liveness,
    /// Count of undecodable binary frames received so far
    pub violations: u32,
}

impl Client {
    /// Creates a record in the zero pose, idle, and alive as of `now`
    pub fn new(id: u16, session: u64, transport: Box<dyn Transport>, now: Instant) -> Self {
        Self {
            id,
            session,
            transport,
            update: AvatarUpdate::idle(id),
            connected_at: now,
            last_alive_at: now,
            liveness: Liveness::AwaitingFirstProof,
            violations: 0,
        }
    }

    /// Stores a freshly decoded update, stamping it with this connection's id
    pub fn store_update(&mut self, mut update: AvatarUpdate) {
        update.id = self.id;
        self.update = update;
    }

    /// Records a proof of life received at `now`
    pub fn mark_alive(&mut self, now: Instant) {
        self.last_alive_at = now;
        self.liveness = Liveness::Alive;
    }

    /// True if no proof of life arrived within `timeout` before `now`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_alive_at) > timeout
    }
}

/// Registry of live connections keyed by identifier
pub struct ClientManager {
    clients: HashMap<u16, Client>,
    /// Identifiers in registration order
    order: Vec<u16>,
    ids: IdAllocator,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            order: Vec::new(),
            ids: IdAllocator::new(),
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns the allocated identifier, or `None` when the server is at
    /// capacity or the identifier space is exhausted.
    pub fn add_client(
        &mut self,
        session: u64,
        transport: Box<dyn Transport>,
        now: Instant,
    ) -> Option<u16> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = self.ids.allocate()?;
        self.clients
            .insert(id, Client::new(id, session, transport, now));
        self.order.push(id);

        info!("Client {} registered ({} live)", id, self.clients.len());
        Some(id)
    }

    /// Removes a connection and makes its identifier reclaimable
    pub fn remove_client(&mut self, id: u16) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        self.order.retain(|live| *live != id);
        self.ids.release(id);
        Some(client)
    }

    pub fn get(&self, id: u16) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    /// True if `id` is live and owned by the socket with serial `session`
    pub fn is_current(&self, id: u16, session: u64) -> bool {
        self.clients
            .get(&id)
            .is_some_and(|client| client.session == session)
    }

    /// Live connections in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Client> + '_ {
        self.order.iter().filter_map(|id| self.clients.get(id))
    }

    /// Live identifiers in registration order
    pub fn ids(&self) -> Vec<u16> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}
