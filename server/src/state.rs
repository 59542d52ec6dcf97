//! Connection lifecycle and message dispatch
//!
//! [`ServerState`] is the composition root of the relay: it owns the registry
//! and the liveness monitor, binds new transports, routes inbound frames and
//! tears connections down. It is plain synchronous code driven by the event
//! loop in [`crate::network`], which keeps every registry mutation on a
//! single task and lets the whole lifecycle be tested without sockets.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::liveness::LivenessMonitor;
use crate::relay;
use crate::transport::Transport;
use log::{debug, error, info, warn};
use shared::{ControlMessage, ControlMessageError, Heartbeat};
use std::fmt;
use std::time::Instant;
use tokio_tungstenite::tungstenite::Message;

/// Why a connection left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The transport reported a close or an I/O error
    Closed,
    /// No proof of life within the liveness window
    TimedOut,
    /// Too many undecodable binary frames
    ProtocolViolation,
    /// The outbound queue filled up faster than the socket drained it
    Overflowed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DisconnectReason::Closed => "connection closed",
            DisconnectReason::TimedOut => "liveness timeout",
            DisconnectReason::ProtocolViolation => "protocol violation",
            DisconnectReason::Overflowed => "outbound queue overflow",
        };
        f.write_str(reason)
    }
}

pub struct ServerState {
    clients: ClientManager,
    monitor: LivenessMonitor,
    max_protocol_violations: u32,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            clients: ClientManager::new(config.max_clients),
            monitor: LivenessMonitor::new(
                config.ping_interval,
                config.sweep_interval,
                config.liveness_timeout,
            ),
            max_protocol_violations: config.max_protocol_violations,
        }
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.monitor
    }

    /// Binds a new transport and brings it up to date
    ///
    /// The newcomer first receives its own connect announcement, then every
    /// existing client is told about it, then the newcomer gets one frame per
    /// existing client's latest state. Returns `None` when the server cannot
    /// take another client; the transport is dropped without being registered.
    pub fn connect(
        &mut self,
        session: u64,
        transport: Box<dyn Transport>,
        now: Instant,
    ) -> Option<u16> {
        let Some(id) = self.clients.add_client(session, transport, now) else {
            warn!(
                "Rejecting connection: server full ({} clients)",
                self.clients.len()
            );
            return None;
        };

        match ControlMessage::connected(id).to_json() {
            Ok(announcement) => {
                relay::send_text(&self.clients, id, &announcement);
                relay::broadcast_text(&self.clients, &announcement, Some(id));
            }
            Err(e) => error!("Failed to encode connect announcement: {}", e),
        }

        let burst = relay::send_catch_up(&self.clients, id);
        debug!("Sent client {} a catch-up burst of {} frames", id, burst);

        Some(id)
    }

    /// Routes one inbound WebSocket message from `client_id`
    pub fn handle_message(&mut self, client_id: u16, message: Message, now: Instant) {
        match message {
            Message::Binary(frame) => self.handle_frame(client_id, &frame),
            Message::Text(text) => self.handle_text(client_id, &text, now),
            // Protocol-level ping/pong and close frames are handled by the socket task.
            _ => {}
        }
    }

    fn handle_frame(&mut self, client_id: u16, frame: &[u8]) {
        let error = match relay::relay_update(&mut self.clients, client_id, frame) {
            Ok(_) => return,
            Err(e) => e,
        };

        let Some(client) = self.clients.get_mut(client_id) else {
            return;
        };
        client.violations += 1;
        warn!(
            "Dropped frame from client {}: {} ({} of {} allowed)",
            client_id, error, client.violations, self.max_protocol_violations
        );

        if client.violations >= self.max_protocol_violations {
            self.disconnect(client_id, DisconnectReason::ProtocolViolation);
        }
    }

    fn handle_text(&mut self, client_id: u16, text: &str, now: Instant) {
        let result = ControlMessage::from_json(text).and_then(|message| match message {
            ControlMessage::Heartbeat(Heartbeat::Pong { id }) => Ok(id),
            other => Err(ControlMessageError::Unexpected(format!("{:?}", other))),
        });

        match result {
            Ok(claimed_id) => {
                self.monitor
                    .record_pong(&mut self.clients, client_id, claimed_id, now);
            }
            Err(e) => warn!("Ignoring text frame from client {}: {}", client_id, e),
        }
    }

    /// Removes a client, closes its transport and tells everyone else
    ///
    /// Returns false if the client was already gone.
    pub fn disconnect(&mut self, client_id: u16, reason: DisconnectReason) -> bool {
        let Some(client) = self.clients.remove_client(client_id) else {
            return false;
        };

        client.transport.close();
        info!(
            "Client {} disconnected: {} ({} live)",
            client_id,
            reason,
            self.clients.len()
        );

        match ControlMessage::disconnected(client_id).to_json() {
            Ok(announcement) => {
                relay::broadcast_text(&self.clients, &announcement, None);
            }
            Err(e) => error!("Failed to encode disconnect announcement: {}", e),
        }

        true
    }

    /// Pings every open client
    pub fn ping(&self) -> usize {
        self.monitor.ping_clients(&self.clients)
    }

    /// Evicts every client whose liveness window elapsed as of `now`
    ///
    /// Clients whose outbound queue overflowed are dropped as well, but only
    /// the timed-out ids are returned.
    pub fn sweep(&mut self, now: Instant) -> Vec<u16> {
        self.evict_overflowed();

        let expired = self.monitor.expired(&self.clients, now);
        for id in &expired {
            self.disconnect(*id, DisconnectReason::TimedOut);
        }
        expired
    }

    /// Sends every client's latest state to every client
    ///
    /// Clients that could not keep up with the broadcast are disconnected.
    pub fn broadcast_snapshot(&mut self) -> usize {
        let sent = relay::broadcast_snapshot(&self.clients);
        self.evict_overflowed();
        sent
    }

    /// Disconnects every client whose outbound queue overflowed
    ///
    /// A departure announcement can overflow another slow peer, so this repeats
    /// until no overflowed client is left.
    fn evict_overflowed(&mut self) {
        loop {
            let overflowed: Vec<u16> = self
                .clients
                .iter()
                .filter(|client| client.transport.is_overflowed())
                .map(|client| client.id)
                .collect();
            if overflowed.is_empty() {
                return;
            }

            for id in overflowed {
                self.disconnect(id, DisconnectReason::Overflowed);
            }
        }
    }

    /// Closes every connection and empties the registry
    pub fn shutdown(&mut self) {
        for id in self.clients.ids() {
            if let Some(client) = self.clients.remove_client(id) {
                client.transport.close();
            }
        }
    }
}
