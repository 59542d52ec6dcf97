//! Heartbeat-based liveness detection
//!
//! WebSocket close events are not reliable enough on their own: a client that
//! loses its network silently can leave a half-open socket behind for minutes.
//! The monitor pings every connection on a fixed interval and, on a separate
//! sweep interval, reports every connection whose last proof of life is older
//! than the liveness window. A connection that never answers is measured from
//! its connect time, so it is evicted just like one that stopped answering.

use crate::client_manager::ClientManager;
use crate::transport::send_if_open;
use log::{debug, error};
use shared::ControlMessage;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;

/// Per-connection heartbeat state
///
/// Eviction is terminal and removes the record from the registry, so it has
/// no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Connected, no pong received yet
    AwaitingFirstProof,
    /// At least one pong received
    Alive,
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    ping_interval: Duration,
    sweep_interval: Duration,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(ping_interval: Duration, sweep_interval: Duration, timeout: Duration) -> Self {
        Self {
            ping_interval,
            sweep_interval,
            timeout,
        }
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `{"type":"ping"}` to every open connection
    ///
    /// Returns how many pings were queued.
    pub fn ping_clients(&self, clients: &ClientManager) -> usize {
        let ping = match ControlMessage::ping().to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode ping: {}", e);
                return 0;
            }
        };

        let mut sent = 0;
        for client in clients.iter() {
            if send_if_open(client.transport.as_ref(), Message::Text(ping.clone())) {
                sent += 1;
            }
        }
        sent
    }

    /// Credits a pong received from `client_id` at `now`
    ///
    /// The sending connection is credited even if the pong claims another
    /// identifier; the mismatch is only logged. Returns false if the
    /// connection is no longer registered.
    pub fn record_pong(
        &self,
        clients: &mut ClientManager,
        client_id: u16,
        claimed_id: u16,
        now: Instant,
    ) -> bool {
        let Some(client) = clients.get_mut(client_id) else {
            return false;
        };

        if claimed_id != client_id {
            debug!(
                "Client {} answered ping claiming id {}",
                client_id, claimed_id
            );
        }

        client.mark_alive(now);
        true
    }

    /// Identifiers whose liveness window has elapsed as of `now`, in
    /// registration order
    pub fn expired(&self, clients: &ClientManager, now: Instant) -> Vec<u16> {
        clients
            .iter()
            .filter(|client| client.is_timed_out(now, self.timeout))
            .map(|client| client.id)
            .collect()
    }
}
