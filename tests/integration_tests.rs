//! Integration tests for the tower defender protocol and server
//!
//! These tests validate cross-component interactions and real network
//! behavior: bincode wire round-trips, and the four remote operations
//! exercised over UDP against a live server with a running engine.

use bincode::{deserialize, serialize};
use glam::Vec3;
use server::engine::{EngineConfig, GameEngine};
use server::network::Server;
use shared::{ArrowData, GameData, Packet, PlayerData, SessionError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for every protocol message
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::RequestSession {
                player: PlayerData::default(),
            },
            Packet::UpdatePlayerData {
                player_id: 42,
                player: PlayerData::default(),
            },
            Packet::GetGameData,
            Packet::CloseSession { player_id: 42 },
            Packet::SessionGranted { player_id: 1 },
            Packet::RequestError {
                error: SessionError::MaxUsersExceeded,
            },
            Packet::Snapshot {
                data: GameData::default(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();
            assert_eq!(deserialized, packet);
        }
    }

    /// A populated snapshot survives the wire without loss
    #[tokio::test]
    async fn snapshot_roundtrip_preserves_state() {
        let mut data = GameData::default();
        data.players.insert(1, PlayerData::default());
        data.players.insert(2, PlayerData::default());
        data.game_state.started = true;
        data.game_state.score = 340;
        data.game_state.score_multiplier = 4;
        data.game_state.castle_health = 55.0;
        data.game_state.flying_arrows.push(ArrowData {
            init_position: Vec3::new(0.0, 1.5, 0.0),
            init_velocity: Vec3::new(0.0, 4.0, 10.0),
            launch_time_ms: 123_456,
            position: Vec3::new(0.0, 2.0, 3.0),
            ..ArrowData::default()
        });

        let serialized = serialize(&Packet::Snapshot { data: data.clone() }).unwrap();
        match deserialize(&serialized).unwrap() {
            Packet::Snapshot { data: restored } => assert_eq!(restored, data),
            other => panic!("Wrong packet type after round-trip: {:?}", other),
        }
    }
}

/// LIVE SERVER TESTS
mod server_tests {
    use super::*;

    /// Starts an engine plus UDP server on an ephemeral port.
    async fn start_server(max_players: usize) -> (SocketAddr, Arc<GameEngine>) {
        let engine = GameEngine::start(EngineConfig {
            tick_rate: 200,
            seed: Some(7),
        })
        .unwrap();

        let mut server = Server::new("127.0.0.1:0", max_players, Arc::clone(&engine))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        (addr, engine)
    }

    async fn call(socket: &UdpSocket, addr: SocketAddr, packet: &Packet) -> Packet {
        let data = serialize(packet).unwrap();
        socket.send_to(&data, addr).await.unwrap();

        let mut buffer = [0u8; 65_536];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("server did not respond in time")
            .unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    async fn register(socket: &UdpSocket, addr: SocketAddr) -> u32 {
        let response = call(
            socket,
            addr,
            &Packet::RequestSession {
                player: PlayerData::default(),
            },
        )
        .await;
        match response {
            Packet::SessionGranted { player_id } => player_id,
            other => panic!("Expected a session grant, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn sessions_grant_until_capacity_then_refuse() {
        let (addr, engine) = start_server(2).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let first = register(&socket, addr).await;
        let second = register(&socket, addr).await;
        assert_ne!(first, 0);
        assert_ne!(second, 0);
        assert_ne!(first, second);

        let refused = call(
            &socket,
            addr,
            &Packet::RequestSession {
                player: PlayerData::default(),
            },
        )
        .await;
        match refused {
            Packet::RequestError { error } => {
                assert_eq!(error, SessionError::MaxUsersExceeded);
            }
            other => panic!("Expected a capacity refusal, got {:?}", other),
        }

        // The refusal must not have touched the roster.
        sleep(Duration::from_millis(50)).await;
        let snapshot = engine.get_copy_of_game_data();
        assert_eq!(snapshot.players.len(), 2);
        engine.shutdown();
    }

    #[tokio::test]
    async fn update_with_unknown_id_is_rejected() {
        let (addr, engine) = start_server(2).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let response = call(
            &socket,
            addr,
            &Packet::UpdatePlayerData {
                player_id: 12345,
                player: PlayerData::default(),
            },
        )
        .await;
        match response {
            Packet::RequestError { error } => assert_eq!(error, SessionError::InvalidUser),
            other => panic!("Expected an invalid-user error, got {:?}", other),
        }
        engine.shutdown();
    }

    #[tokio::test]
    async fn snapshot_reflects_registered_player_after_a_tick() {
        let (addr, engine) = start_server(2).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let player_id = register(&socket, addr).await;
        sleep(Duration::from_millis(100)).await;

        let response = call(&socket, addr, &Packet::GetGameData).await;
        match response {
            Packet::Snapshot { data } => {
                assert!(data.players.contains_key(&player_id));
                assert!(!data.game_state.started);
            }
            other => panic!("Expected a snapshot, got {:?}", other),
        }
        engine.shutdown();
    }

    #[tokio::test]
    async fn closed_session_disappears_from_snapshots() {
        let (addr, engine) = start_server(2).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let player_id = register(&socket, addr).await;
        sleep(Duration::from_millis(100)).await;

        let data = serialize(&Packet::CloseSession { player_id }).unwrap();
        socket.send_to(&data, addr).await.unwrap();
        sleep(Duration::from_millis(100)).await;

        let response = call(&socket, addr, &Packet::GetGameData).await;
        match response {
            Packet::Snapshot { data } => {
                assert!(!data.players.contains_key(&player_id));
            }
            other => panic!("Expected a snapshot, got {:?}", other),
        }
        engine.shutdown();
    }

    #[tokio::test]
    async fn update_keeps_player_state_current() {
        let (addr, engine) = start_server(2).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let player_id = register(&socket, addr).await;

        let mut player = PlayerData::default();
        player.hands[shared::Hand::Right.index()].hand_trigger = 0.9;
        let data = serialize(&Packet::UpdatePlayerData {
            player_id,
            player,
        })
        .unwrap();
        socket.send_to(&data, addr).await.unwrap();
        sleep(Duration::from_millis(100)).await;

        let response = call(&socket, addr, &Packet::GetGameData).await;
        match response {
            Packet::Snapshot { data } => {
                let me = &data.players[&player_id];
                assert_eq!(
                    me.hands[shared::Hand::Right.index()].hand_trigger,
                    0.9
                );
            }
            other => panic!("Expected a snapshot, got {:?}", other),
        }
        engine.shutdown();
    }
}
