//! # Avatar Relay Server Library
//!
//! WebSocket relay that keeps every connected client's view of the other
//! avatars in sync. The server never simulates anything: it stores the most
//! recent 19-byte update each client sent and redistributes it.
//!
//! ## Data Flow
//!
//! ### Immediate Relay
//! A binary frame is decoded, stored as the sender's latest update and then
//! forwarded byte-for-byte to every other open connection.
//!
//! ### Snapshot Broadcast
//! Every snapshot tick (33 ms by default) the stored update of each client is
//! re-encoded and sent to all clients, including the owner. Clients that
//! missed an immediate relay converge on the next tick.
//!
//! ### Control Messages
//! Connect and disconnect announcements plus the ping/pong heartbeat travel as
//! small JSON text frames. A newcomer first learns its own id, then receives
//! one catch-up frame for each client already present.
//!
//! ## Module Organization
//!
//! ### ID Allocator (`id_allocator`)
//! Issues 16-bit client ids starting at 1 and hands released ids back out,
//! smallest first.
//!
//! ### Client Manager (`client_manager`)
//! Registry of live connections in registration order, each with its
//! transport, last update and liveness bookkeeping.
//!
//! ### Liveness (`liveness`)
//! Pings every client on an interval and evicts connections that stayed silent
//! past the timeout, including ones that never answered a single ping.
//!
//! ### Relay (`relay`)
//! Fan-out primitives shared by the event handlers.
//!
//! ### State (`state`)
//! Event handlers tying the pieces together: connect, message, disconnect,
//! ping, sweep, snapshot and shutdown.
//!
//! ### Network (`network`)
//! Accept loop, per-socket reader/writer tasks and the single event loop that
//! owns the state.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::new(ServerConfig::with_addr("127.0.0.1:8080")).await?;
//!     let handle = server.handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.shutdown();
//!     });
//!
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod id_allocator;
pub mod liveness;
pub mod network;
pub mod relay;
pub mod state;
pub mod transport;
