use clap::Parser;
use client::network::{Client, ClientConfig};
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the relay
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/network")]
    server: String,

    /// Updates sent per second
    #[arg(short = 'r', long, default_value = "30")]
    rate: u32,

    /// Radius of the area the avatar wanders in
    #[arg(long, default_value = "10.0")]
    radius: f32,

    /// Average movement speed in units per second
    #[arg(long, default_value = "2.0")]
    speed: f32,

    /// Log the remote avatar table every N milliseconds (0 disables it)
    #[arg(short = 'd', long, default_value = "0")]
    debug_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ClientConfig {
        server_url: args.server,
        send_interval: Duration::from_secs_f64(1.0 / f64::from(args.rate.max(1))),
        wander_radius: args.radius,
        speed: args.speed,
        debug_interval: (args.debug_ms > 0).then(|| Duration::from_millis(args.debug_ms)),
    };

    info!("Starting client...");
    info!("Sending {} updates per second", args.rate.max(1));

    let mut client = Client::new(config);

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, disconnecting...");
        }
    }

    Ok(())
}
