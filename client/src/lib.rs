//! # Headless Avatar Client
//!
//! Reference client for the avatar relay. It joins a session over WebSocket,
//! keeps a table of the other avatars and drives its own avatar with a simple
//! wandering motion so the relay can be exercised without a renderer.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Connection handling: learns the client id from the first connect
//! announcement, answers pings, applies inbound frames and sends the local
//! avatar at a fixed rate.
//!
//! ### World Module (`world`)
//! Latest known update of every remote avatar.
//!
//! ### Motion Module (`motion`)
//! Random walk inside a circle, yaw-only rotation and animation state derived
//! from speed.
//!
//! ### Debug Module (`debug`)
//! Text table of the remote avatars for periodic logging.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut client = Client::new(ClientConfig::default());
//!     client.run().await
//! }
//! ```

pub mod debug;
pub mod motion;
pub mod network;
pub mod world;
