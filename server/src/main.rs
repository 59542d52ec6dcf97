use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

/// Avatar state relay server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Request path the WebSocket endpoint is served on
    #[arg(long, default_value = shared::NETWORK_PATH)]
    path: String,

    /// Snapshot broadcast interval in milliseconds
    #[arg(long, default_value = "33")]
    snapshot_ms: u64,

    /// Heartbeat ping interval in milliseconds
    #[arg(long, default_value = "5000")]
    ping_ms: u64,

    /// Liveness sweep interval in milliseconds
    #[arg(long, default_value = "10000")]
    sweep_ms: u64,

    /// Silence tolerated before a client is evicted, in milliseconds
    #[arg(short, long, default_value = "10000")]
    timeout_ms: u64,

    /// Maximum number of simultaneously connected clients
    #[arg(short, long, default_value = "256")]
    max_clients: usize,

    /// Undecodable frames tolerated before a client is disconnected
    #[arg(long, default_value = "10")]
    max_violations: u32,

    /// Frames queued for a slow client before it is disconnected
    #[arg(long, default_value = "4096")]
    queue_capacity: usize,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            path: self.path,
            snapshot_interval: Duration::from_millis(self.snapshot_ms),
            ping_interval: Duration::from_millis(self.ping_ms),
            sweep_interval: Duration::from_millis(self.sweep_ms),
            liveness_timeout: Duration::from_millis(self.timeout_ms),
            max_clients: self.max_clients,
            max_protocol_violations: self.max_violations,
            outbound_queue_capacity: self.queue_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();

    info!("Starting server...");
    info!(
        "Snapshot every {:?}, ping every {:?}, evict after {:?} of silence",
        config.snapshot_interval, config.ping_interval, config.liveness_timeout
    );

    let server = Server::new(config).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                handle.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;

    info!("Server stopped");
    Ok(())
}
