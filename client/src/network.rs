//! Headless client connection: joins the relay, streams its avatar and tracks peers

use crate::debug::format_table;
use crate::motion::Wanderer;
use crate::world::RemoteAvatars;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{AvatarUpdate, ControlMessage, Heartbeat};
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full WebSocket URL, e.g. `ws://127.0.0.1:8080/network`
    pub server_url: String,
    pub send_interval: Duration,
    pub wander_radius: f32,
    pub speed: f32,
    /// How often the remote avatar table is logged; `None` disables it
    pub debug_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: format!("ws://127.0.0.1:8080{}", shared::NETWORK_PATH),
            send_interval: Duration::from_millis(33),
            wander_radius: 10.0,
            speed: 2.0,
            debug_interval: None,
        }
    }
}

/// Headless client that mirrors the session and drives one avatar
pub struct Client {
    config: ClientConfig,
    world: RemoteAvatars,
    wanderer: Wanderer,
    frames_received: u64,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let wanderer = Wanderer::new(config.wander_radius, config.speed);
        Self::with_wanderer(config, wanderer)
    }

    pub fn with_wanderer(config: ClientConfig, wanderer: Wanderer) -> Self {
        Client {
            config,
            world: RemoteAvatars::new(),
            wanderer,
            frames_received: 0,
        }
    }

    pub fn world(&self) -> &RemoteAvatars {
        &self.world
    }

    pub fn client_id(&self) -> Option<u16> {
        self.world.local_id()
    }

    /// Applies one inbound message and returns the reply to send, if any
    pub fn handle_message(&mut self, message: Message) -> Option<Message> {
        match message {
            Message::Binary(frame) => {
                match AvatarUpdate::decode(&frame) {
                    Ok(update) => {
                        self.frames_received += 1;
                        self.world.apply_update(update);
                    }
                    Err(e) => warn!("Ignoring malformed frame from server: {}", e),
                }
                None
            }
            Message::Text(text) => self.handle_text(&text),
            _ => None,
        }
    }

    fn handle_text(&mut self, text: &str) -> Option<Message> {
        let control = match ControlMessage::from_json(text) {
            Ok(control) => control,
            Err(e) => {
                warn!("Ignoring unreadable control message {:?}: {}", text, e);
                return None;
            }
        };

        match control {
            ControlMessage::Connected(announcement) => {
                if self.world.apply_connect(announcement.id) {
                    info!("Connected! Client ID: {}", announcement.id);
                } else {
                    info!("Client {} joined", announcement.id);
                }
                None
            }
            ControlMessage::Disconnected(announcement) => {
                if self.world.apply_disconnect(announcement.id) {
                    info!("Client {} left", announcement.id);
                }
                None
            }
            ControlMessage::Heartbeat(Heartbeat::Ping) => {
                let id = self.world.local_id()?;
                match ControlMessage::pong(id).to_json() {
                    Ok(json) => Some(Message::Text(json)),
                    Err(e) => {
                        error!("Failed to encode pong: {}", e);
                        None
                    }
                }
            }
            ControlMessage::Heartbeat(Heartbeat::Pong { .. }) => {
                debug!("Unexpected pong from server");
                None
            }
        }
    }

    /// Advances the local avatar and returns its encoded frame
    ///
    /// Nothing is sent until the server has told the client its id.
    pub fn next_frame(&mut self) -> Option<Message> {
        let id = self.world.local_id()?;
        let dt = self.config.send_interval.as_secs_f32();
        let pose = self.wanderer.step(dt);
        let update = AvatarUpdate::new(id, pose.location, pose.rotation, pose.state);
        Some(Message::Binary(update.encode().to_vec()))
    }

    pub async fn run(&mut self) -> ClientResult<()> {
        info!("Connecting to {}...", self.config.server_url);
        let (ws_stream, _) = connect_async(self.config.server_url.as_str()).await?;
        let (mut sink, mut incoming) = ws_stream.split();

        let mut send_interval = interval(self.config.send_interval);
        send_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut debug_interval = self.config.debug_interval.map(|period| {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer
        });

        loop {
            tokio::select! {
                frame = incoming.next() => {
                    match frame {
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Server closed the connection");
                            break;
                        }
                        Some(Ok(message)) => {
                            if let Some(reply) = self.handle_message(message) {
                                sink.send(reply).await?;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error receiving from server: {}", e);
                            return Err(e.into());
                        }
                    }
                },

                _ = send_interval.tick() => {
                    if let Some(frame) = self.next_frame() {
                        sink.send(frame).await?;
                    }
                },

                _ = tick_if_enabled(&mut debug_interval) => {
                    info!(
                        "{} remote avatars, {} frames received\n{}",
                        self.world.len(),
                        self.frames_received,
                        format_table(&self.world)
                    );
                },
            }
        }

        Ok(())
    }
}

/// Waits for the next tick, or forever when the timer is disabled
async fn tick_if_enabled(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
