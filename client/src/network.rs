//! Connection management: registration, the per-frame exchange and
//! degradation on failure.
//!
//! The client is poll-driven. Each frame it samples the device, submits
//! the input frame, then asks for a snapshot. Registration retries with a
//! fixed delay for as long as it takes; once registered, a single failed
//! or rejected exchange degrades the player back to unregistered (ID 0)
//! and the next frame re-registers instead of terminating.

use crate::game::ClientGameState;
use crate::input::{self, DeviceSampler};
use bincode::{deserialize, serialize};
use log::{info, warn};
use shared::{GameData, Packet, PlayerData};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, timeout};

/// Delay between registration attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);
/// A request without a response inside this window counts as failed.
const RPC_TIMEOUT: Duration = Duration::from_millis(500);
/// Input/snapshot exchange rate, frames per second.
const FRAME_RATE: u64 = 90;

pub struct Client<S: DeviceSampler> {
    socket: UdpSocket,
    server_addr: SocketAddr,
    /// 0 while unregistered.
    player_id: u32,
    sampler: S,
    /// Last player record the server acknowledged for us; the base every
    /// outgoing frame is built on.
    acknowledged: PlayerData,
    state: Option<ClientGameState>,
}

impl<S: DeviceSampler> Client<S> {
    pub async fn new(server_addr: &str, sampler: S) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Client {
            socket,
            server_addr: server_addr.parse()?,
            player_id: 0,
            sampler,
            acknowledged: PlayerData::default(),
            state: None,
        })
    }

    /// Register with the server, retrying on a fixed delay until granted.
    async fn register(&mut self) {
        loop {
            match self
                .call(Packet::RequestSession {
                    player: self.acknowledged.clone(),
                })
                .await
            {
                Ok(Packet::SessionGranted { player_id }) => {
                    info!("Registered as player {}", player_id);
                    self.player_id = player_id;
                    self.state = Some(ClientGameState::new(player_id));
                    return;
                }
                Ok(Packet::RequestError { error }) => {
                    warn!("Server refused session ({}); retrying...", error);
                }
                Ok(_) => warn!("Unexpected response to session request"),
                Err(e) => warn!("No response from server ({}); retrying...", e),
            }
            sleep(RETRY_DELAY).await;
        }
    }

    /// One request/response round trip.
    async fn call(&mut self, request: Packet) -> Result<Packet, Box<dyn std::error::Error>> {
        let data = serialize(&request)?;
        self.socket.send_to(&data, self.server_addr).await?;

        let mut buffer = [0u8; 65_536];
        let (len, _addr) = timeout(RPC_TIMEOUT, self.socket.recv_from(&mut buffer)).await??;
        Ok(deserialize(&buffer[..len])?)
    }

    /// Fire-and-forget request; errors come back, successes stay silent.
    async fn send(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn degrade(&mut self) {
        if self.player_id != 0 {
            info!("Session degraded; will re-register");
        }
        self.player_id = 0;
        self.state = None;
    }

    fn apply_snapshot(&mut self, data: GameData) {
        if let Some(me) = data.players.get(&self.player_id) {
            self.acknowledged = me.clone();
        }
        if let Some(state) = &mut self.state {
            let events = state.apply_snapshot(data);
            // Audio playback is the embedder's job; log the edges.
            if events.arrow_stretched {
                info!("cue: bowstring stretched");
            }
            if events.arrow_fired {
                info!("cue: arrow loosed");
            }
            if events.enemy_died {
                info!("cue: castle crasher down");
            }
        }
    }

    /// Main frame loop: sample, submit, poll, surface cues.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut frame_interval = interval(Duration::from_millis(1000 / FRAME_RATE));

        loop {
            frame_interval.tick().await;

            if self.player_id == 0 {
                self.register().await;
                continue;
            }

            let device_frame = self.sampler.sample();
            let player = input::build_frame(&self.acknowledged, &device_frame);
            if let Err(e) = self
                .send(&Packet::UpdatePlayerData {
                    player_id: self.player_id,
                    player,
                })
                .await
            {
                warn!("Failed to submit input: {}", e);
                self.degrade();
                continue;
            }

            match self.call(Packet::GetGameData).await {
                Ok(Packet::Snapshot { data }) => self.apply_snapshot(data),
                Ok(Packet::RequestError { error }) => {
                    // Most likely our update bounced with INVALID_USER
                    // after a server-side timeout.
                    warn!("Server rejected us ({})", error);
                    self.degrade();
                }
                Ok(_) => warn!("Unexpected response to snapshot poll"),
                Err(e) => {
                    warn!("Snapshot poll failed: {}", e);
                    self.degrade();
                }
            }
        }
    }

    /// Tell the server we are leaving. Best effort; the liveness sweep
    /// cleans up after us if the datagram is lost.
    pub async fn close(&mut self) {
        if self.player_id != 0 {
            let _ = self
                .send(&Packet::CloseSession {
                    player_id: self.player_id,
                })
                .await;
            self.player_id = 0;
        }
    }
}
