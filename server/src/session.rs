//! Player session registry: capacity, identity and liveness.
//!
//! The registry decides who is allowed to talk to the engine. Every
//! accepted request refreshes the player's liveness timestamp; a periodic
//! sweep closes sessions that have gone quiet.

use log::info;
use shared::SessionError;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A player drops after this long without a request.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Session {
    last_seen: Instant,
}

/// Tracks connected players and enforces the capacity limit.
pub struct SessionManager {
    sessions: HashMap<u32, Session>,
    next_player_id: u32,
    max_players: usize,
}

impl SessionManager {
    /// Player IDs start from 1; 0 means "unregistered" on the client side.
    pub fn new(max_players: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    /// Admit a new player and hand out a fresh nonzero ID.
    pub fn register(&mut self) -> Result<u32, SessionError> {
        if self.sessions.len() >= self.max_players {
            return Err(SessionError::MaxUsersExceeded);
        }

        let player_id = self.next_player_id;
        self.next_player_id = self.next_player_id.wrapping_add(1).max(1);
        self.sessions.insert(
            player_id,
            Session {
                last_seen: Instant::now(),
            },
        );
        info!("Player {} registered", player_id);
        Ok(player_id)
    }

    /// Refresh liveness for a known player.
    pub fn touch(&mut self, player_id: u32) -> Result<(), SessionError> {
        match self.sessions.get_mut(&player_id) {
            Some(session) => {
                session.last_seen = Instant::now();
                Ok(())
            }
            None => Err(SessionError::InvalidUser),
        }
    }

    /// Close a session; returns whether it existed.
    pub fn close(&mut self, player_id: u32) -> bool {
        if self.sessions.remove(&player_id).is_some() {
            info!("Player {} session closed", player_id);
            true
        } else {
            false
        }
    }

    /// Drop sessions silent for longer than the timeout, returning them.
    pub fn sweep_expired(&mut self) -> Vec<u32> {
        let expired: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.last_seen.elapsed() > SESSION_TIMEOUT)
            .map(|(player_id, _)| *player_id)
            .collect();

        for player_id in &expired {
            self.sessions.remove(player_id);
            info!("Player {} timed out", player_id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
