//! Wire protocol shared by the avatar relay server and its clients
//!
//! Binary frames carry one [`AvatarUpdate`] each and are produced by the
//! fixed-layout codec in [`codec`]. Text frames carry the JSON control
//! messages in [`control`].

pub mod codec;
pub mod control;
pub mod error;

pub use codec::{AnimationState, AvatarUpdate, Location, Rotation, FRAME_SIZE};
pub use control::{ConnectAnnouncement, ControlMessage, DisconnectAnnouncement, Heartbeat};
pub use error::{ControlMessageError, ProtocolError};

/// Request path the relay serves its WebSocket endpoint on
pub const NETWORK_PATH: &str = "/network";
