//! Error types for the avatar wire protocol

use thiserror::Error;

/// A binary frame that cannot be decoded into an [`AvatarUpdate`](crate::AvatarUpdate)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid frame length: expected 19 bytes, got {0}")]
    InvalidFrameLength(usize),

    #[error("unknown animation state byte: {0}")]
    UnknownAnimationState(u8),
}

/// A text frame that is not a control message the receiver understands
#[derive(Error, Debug)]
pub enum ControlMessageError {
    #[error("malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected control message: {0}")]
    Unexpected(String),
}
