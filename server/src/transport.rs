//! Outbound side of a client connection
//!
//! The relay only needs three capabilities from a connection: ask whether it is
//! still open, queue a frame and close it. Socket I/O happens elsewhere; the
//! WebSocket implementation here just feeds a per-connection writer task
//! through a bounded channel. Sends never wait: a connection whose queue is
//! full is marked overflowed and stops accepting frames until it is removed.

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("outbound queue is full")]
    Full,
}

pub trait Transport: Send {
    fn is_open(&self) -> bool;

    fn send(&self, message: Message) -> Result<(), TransportError>;

    fn close(&self);

    /// True once a send found the outbound queue full
    fn is_overflowed(&self) -> bool;
}

/// Sends `message` if the transport is open, silently skipping it otherwise
///
/// Returns whether the message was queued.
pub fn send_if_open(transport: &dyn Transport, message: Message) -> bool {
    if !transport.is_open() {
        return false;
    }

    match transport.send(message) {
        Ok(()) => true,
        Err(e) => {
            debug!("Dropped outbound frame: {}", e);
            false
        }
    }
}

/// Shared open/closed flag for one connection
///
/// Both the reader task and the server loop may observe the connection going
/// away first, so whichever does flips the flag for everyone.
#[derive(Debug, Clone)]
pub struct ConnectionFlag(Arc<AtomicBool>);

impl ConnectionFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn mark_closed(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for ConnectionFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport backed by the bounded outbound queue of a WebSocket writer task
#[derive(Debug)]
pub struct ChannelTransport {
    sender: mpsc::Sender<Message>,
    flag: ConnectionFlag,
    overflowed: AtomicBool,
}

impl ChannelTransport {
    /// Creates the transport together with the receiving end the writer drains
    ///
    /// `capacity` is the number of frames that may wait for the socket.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let transport = Self {
            sender,
            flag: ConnectionFlag::new(),
            overflowed: AtomicBool::new(false),
        };
        (transport, receiver)
    }

    pub fn flag(&self) -> ConnectionFlag {
        self.flag.clone()
    }
}

impl Transport for ChannelTransport {
    fn is_open(&self) -> bool {
        self.flag.is_open() && !self.sender.is_closed()
    }

    fn send(&self, message: Message) -> Result<(), TransportError> {
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                if !self.overflowed.swap(true, Ordering::AcqRel) {
                    warn!(
                        "Outbound queue full ({} frames), dropping connection",
                        self.sender.max_capacity()
                    );
                }
                self.flag.mark_closed();
                Err(TransportError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        if self.flag.is_open() {
            // The writer forwards the close frame and then stops draining.
            let _ = self.sender.try_send(Message::Close(None));
        }
        self.flag.mark_closed();
    }

    fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }
}
