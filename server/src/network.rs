//! Server network layer handling WebSocket connections and the relay event loop
//!
//! One task accepts TCP connections and spawns a task per socket. Socket tasks
//! never touch the registry: they forward connect, frame and close events to
//! the event loop over a channel and drain an outbound queue. The event loop
//! owns [`ServerState`] and the three recurring timers (snapshot, ping and
//! sweep), so all registry access is serialized on one task.

use crate::config::ServerConfig;
use crate::state::{DisconnectReason, ServerState};
use crate::transport::ChannelTransport;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Events sent from socket tasks to the event loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected {
        session: u64,
        transport: ChannelTransport,
        reply: oneshot::Sender<Option<u16>>,
    },
    FrameReceived {
        client_id: u16,
        session: u64,
        message: Message,
    },
    ClientClosed {
        client_id: u16,
        session: u64,
    },
    Shutdown,
}

/// Stops a running [`Server`] from outside its event loop
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    /// Stops accepting, closes every connection and ends [`Server::run`]
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Shutdown requested but the server has already stopped");
        }
    }
}

/// WebSocket relay server
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    state: ServerState,

    // Communication channel from socket tasks
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!(
            "Server listening on ws://{}{}",
            listener.local_addr()?,
            config.path
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            state: ServerState::new(&config),
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns the task that accepts TCP connections
    fn spawn_acceptor(
        listener: TcpListener,
        path: Arc<str>,
        queue_capacity: usize,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut next_session: u64 = 0;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        next_session += 1;
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            next_session,
                            Arc::clone(&path),
                            queue_capacity,
                            server_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Runs the event loop until [`ServerHandle::shutdown`] is called
    pub async fn run(self) -> ServerResult<()> {
        let Server {
            listener,
            config,
            mut state,
            server_tx,
            mut server_rx,
        } = self;

        let acceptor = Self::spawn_acceptor(
            listener,
            Arc::from(config.path.as_str()),
            config.outbound_queue_capacity,
            server_tx,
        );

        // Every timer first fires one full period after start.
        let start = tokio::time::Instant::now();
        let mut snapshot_interval =
            interval_at(start + config.snapshot_interval, config.snapshot_interval);
        snapshot_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ping_interval = interval_at(start + config.ping_interval, config.ping_interval);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_interval = interval_at(start + config.sweep_interval, config.sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut snapshot_ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle socket events
                message = server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ClientConnected { session, transport, reply }) => {
                            let client_id = state.connect(session, Box::new(transport), Instant::now());
                            if reply.send(client_id).is_err() {
                                // The socket task went away during the handshake.
                                if let Some(id) = client_id {
                                    state.disconnect(id, DisconnectReason::Closed);
                                }
                            }
                        },
                        Some(ServerMessage::FrameReceived { client_id, session, message }) => {
                            if state.clients().is_current(client_id, session) {
                                state.handle_message(client_id, message, Instant::now());
                            }
                        },
                        Some(ServerMessage::ClientClosed { client_id, session }) => {
                            if state.clients().is_current(client_id, session) {
                                state.disconnect(client_id, DisconnectReason::Closed);
                            }
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = snapshot_interval.tick() => {
                    let frames = state.broadcast_snapshot();
                    snapshot_ticks += 1;

                    // Periodic load report, roughly every ten seconds at 30 Hz
                    if snapshot_ticks % 300 == 0 && !state.clients().is_empty() {
                        debug!(
                            "Snapshot {}: {} clients, {} frames queued",
                            snapshot_ticks,
                            state.clients().len(),
                            frames
                        );
                    }
                },

                _ = ping_interval.tick() => {
                    let pinged = state.ping();
                    debug!("Pinged {} clients", pinged);
                },

                _ = sweep_interval.tick() => {
                    let evicted = state.sweep(Instant::now());
                    if !evicted.is_empty() {
                        info!("Evicted {} unresponsive clients: {:?}", evicted.len(), evicted);
                    }
                },
            }
        }

        acceptor.abort();
        state.shutdown();
        Ok(())
    }
}

/// Performs the WebSocket handshake and pumps frames for one socket
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    session: u64,
    path: Arc<str>,
    queue_capacity: usize,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let check_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if request.uri().path() == &*path {
            return Ok(response);
        }

        warn!(
            "Rejected WebSocket request from {} for {}",
            addr,
            request.uri().path()
        );
        let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            debug!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut sink, mut incoming) = ws_stream.split();
    let (transport, mut outbound) = ChannelTransport::new(queue_capacity);
    let flag = transport.flag();

    let (reply_tx, reply_rx) = oneshot::channel();
    let connected = ServerMessage::ClientConnected {
        session,
        transport,
        reply: reply_tx,
    };
    if server_tx.send(connected).is_err() {
        error!("Server loop is gone, dropping connection from {}", addr);
        return;
    }

    let client_id = match reply_rx.await {
        Ok(Some(client_id)) => client_id,
        _ => {
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };
    info!("Client {} connected from {}", client_id, addr);

    // Writer: drains the outbound queue until the server closes the connection
    // or drops the transport.
    let writer_flag = flag.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                debug!("Failed to write to client {}: {}", client_id, e);
                break;
            }
            if closing {
                break;
            }
        }
        writer_flag.mark_closed();
    });

    loop {
        tokio::select! {
            frame = incoming.next() => {
                match frame {
                    Some(Ok(message @ (Message::Binary(_) | Message::Text(_)))) => {
                        let received = ServerMessage::FrameReceived { client_id, session, message };
                        if server_tx.send(received).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong frames are answered by tungstenite itself.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Error reading from client {}: {}", client_id, e);
                        break;
                    }
                }
            },
            _ = &mut writer => break,
        }
    }

    flag.mark_closed();
    let _ = server_tx.send(ServerMessage::ClientClosed { client_id, session });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use tokio_test::assert_ok;

    #[test]
    fn test_frame_received_message() {
        let msg = ServerMessage::FrameReceived {
            client_id: 4,
            session: 9,
            message: Message::Binary(vec![0; 19]),
        };

        match msg {
            ServerMessage::FrameReceived {
                client_id,
                session,
                message,
            } => {
                assert_eq!(client_id, 4);
                assert_eq!(session, 9);
                assert_eq!(message, Message::Binary(vec![0; 19]));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let (transport, _outbound) = ChannelTransport::new(4);
        let (reply_tx, mut reply_rx) = oneshot::channel();

        assert!(tx
            .send(ServerMessage::ClientConnected {
                session: 1,
                transport,
                reply: reply_tx,
            })
            .is_ok());

        match rx.try_recv().unwrap() {
            ServerMessage::ClientConnected {
                session,
                transport,
                reply,
            } => {
                assert_eq!(session, 1);
                assert!(transport.is_open());
                reply.send(Some(1)).unwrap();
            }
            _ => panic!("Unexpected message type"),
        }

        assert_eq!(reply_rx.try_recv().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            snapshot_interval: Duration::ZERO,
            ..ServerConfig::default()
        };

        assert!(Server::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_handle_stops_run() {
        let server = Server::new(ServerConfig::with_addr("127.0.0.1:0"))
            .await
            .unwrap();
        let handle = server.handle();
        let running = tokio::spawn(server.run());

        handle.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert_ok!(result);

        // A second request after shutdown is harmless.
        handle.shutdown();
    }
}
