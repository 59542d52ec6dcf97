//! JSON control messages carried in text frames
//!
//! Connect and disconnect announcements flow from the server to every client,
//! `ping` flows from the server and each client answers with a `pong` carrying
//! its assigned identifier.

use serde::{Deserialize, Serialize};

use crate::error::ControlMessageError;

/// Liveness handshake, tagged by its `type` field
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Heartbeat {
    Ping,
    Pong { id: u16 },
}

/// `{ "id": n, "connected": true }`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAnnouncement {
    pub id: u16,
    pub connected: bool,
}

/// `{ "id": n, "disconnect": true }`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectAnnouncement {
    pub id: u16,
    pub disconnect: bool,
}

/// Every text-frame message either side may send
///
/// The variants are distinguished by their keys, so the enum is untagged and
/// each variant serializes to exactly the object shown on its payload type.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum ControlMessage {
    Heartbeat(Heartbeat),
    Connected(ConnectAnnouncement),
    Disconnected(DisconnectAnnouncement),
}

impl ControlMessage {
    pub fn connected(id: u16) -> Self {
        ControlMessage::Connected(ConnectAnnouncement {
            id,
            connected: true,
        })
    }

    pub fn disconnected(id: u16) -> Self {
        ControlMessage::Disconnected(DisconnectAnnouncement {
            id,
            disconnect: true,
        })
    }

    pub fn ping() -> Self {
        ControlMessage::Heartbeat(Heartbeat::Ping)
    }

    pub fn pong(id: u16) -> Self {
        ControlMessage::Heartbeat(Heartbeat::Pong { id })
    }

    pub fn to_json(&self) -> Result<String, ControlMessageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ControlMessageError> {
        Ok(serde_json::from_str(text)?)
    }
}
