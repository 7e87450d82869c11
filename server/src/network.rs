//! UDP request/response front end for the game engine.
//!
//! The transport is deliberately thin: every datagram is one bincode
//! [`Packet`], every operation maps onto a session-registry check plus an
//! engine call, and responses go back to the requester's address. The
//! engine neither knows nor cares that this adapter speaks UDP.

use crate::engine::GameEngine;
use crate::session::SessionManager;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from background tasks to the dispatch loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    SessionsExpired {
        player_ids: Vec<u32>,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Responses queued for the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// UDP server mapping remote operations onto the engine.
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionManager>>,
    engine: Arc<GameEngine>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_players: usize,
        engine: Arc<GameEngine>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionManager::new(max_players))),
            engine,
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    /// Address actually bound, for callers who asked for port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that continuously listens for incoming datagrams
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 65_536];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to forward packet to dispatch loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing response queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(OutboundMessage::SendPacket { packet, addr }) = out_rx.recv().await {
                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("Failed to send response to {}: {}", addr, e);
                        }
                    }
                    Err(e) => error!("Failed to serialize response: {}", e),
                }
            }
        });
    }

    /// Spawns the liveness sweep that expires silent sessions
    async fn spawn_timeout_checker(&self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let expired = {
                    let mut sessions_guard = sessions.write().await;
                    sessions_guard.sweep_expired()
                };

                if !expired.is_empty() {
                    if let Err(e) = server_tx.send(ServerMessage::SessionsExpired {
                        player_ids: expired,
                    }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    fn respond(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundMessage::SendPacket { packet, addr }) {
            error!("Failed to queue response for {}: {}", addr, e);
        }
    }

    /// Maps one request onto the session registry and the engine.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::RequestSession { player } => {
                let granted = {
                    let mut sessions = self.sessions.write().await;
                    sessions.register()
                };

                match granted {
                    Ok(player_id) => {
                        self.engine.handle_new_user_input(player_id, player);
                        info!("Granted session to {} as player {}", addr, player_id);
                        self.respond(Packet::SessionGranted { player_id }, addr);
                    }
                    Err(error) => {
                        warn!("Refused session for {}: {}", addr, error);
                        self.respond(Packet::RequestError { error }, addr);
                    }
                }
            }

            Packet::UpdatePlayerData { player_id, player } => {
                let known = {
                    let mut sessions = self.sessions.write().await;
                    sessions.touch(player_id)
                };

                match known {
                    Ok(()) => self.engine.handle_new_user_input(player_id, player),
                    Err(error) => {
                        warn!("Update from {} rejected: {}", addr, error);
                        self.respond(Packet::RequestError { error }, addr);
                    }
                }
            }

            Packet::GetGameData => {
                let data = self.engine.get_copy_of_game_data();
                self.respond(Packet::Snapshot { data }, addr);
            }

            Packet::CloseSession { player_id } => {
                let existed = {
                    let mut sessions = self.sessions.write().await;
                    sessions.close(player_id)
                };
                if existed {
                    self.engine.remove_user(player_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main dispatch loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::SessionsExpired { player_ids }) => {
                    for player_id in player_ids {
                        self.engine.remove_user(player_id);
                    }
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
