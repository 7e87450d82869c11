//! Wire schema shared between the tower defender server and its clients.
//!
//! Every structure here serializes with bincode, which writes fields in
//! declared order without names, the same ordered-array discipline the
//! protocol requires. There is no version tag on the wire, so changing
//! field order or arity breaks every peer: append, never reorder.

pub mod ballistics;
pub mod pose;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use pose::Mat4Wire;

/// Right-hand "A" button bit; selects the right hand as dominant.
pub const BUTTON_A: u32 = 0x0000_0001;
/// Left-hand "X" button bit; selects the left hand as dominant.
pub const BUTTON_X: u32 = 0x0000_0100;

/// Castle health at the start of a round; health is clamped to [0, this].
pub const CASTLE_MAX_HEALTH: f32 = 100.0;

/// Where an arrow rests when nobody holds it and nothing is in flight:
/// well off the field and below the ground plane, i.e. already "landed".
pub const ARROW_REST_POSITION: Vec3 = Vec3::new(-1.0, -1.0, -1.0);

/// Which tracked hand a value refers to. Also indexes `PlayerData::hands`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Hand {
    Left,
    #[default]
    Right,
}

impl Hand {
    pub fn other(self) -> Hand {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }
}

/// State of one tracked hand controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandData {
    pub pose: Mat4Wire,
    pub thumbstick: [f32; 2],
    pub buttons: u32,
    pub index_trigger: f32,
    pub hand_trigger: f32,
}

impl Default for HandData {
    fn default() -> Self {
        Self {
            pose: pose::IDENTITY,
            thumbstick: [0.0, 0.0],
            buttons: 0,
            index_trigger: 0.0,
            hand_trigger: 0.0,
        }
    }
}

/// State of the tracked headset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadData {
    pub pose: Mat4Wire,
}

impl Default for HeadData {
    fn default() -> Self {
        Self {
            pose: pose::IDENTITY,
        }
    }
}

/// One arrow's ballistic record.
///
/// While a player holds the arrow its pose tracks the hand. Once released,
/// pose and position are pure functions of the launch triple via
/// [`ballistics`], and an arrow with `position.y <= 0` has landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowData {
    pub pose: Mat4Wire,
    pub launch_time_ms: u64,
    pub init_velocity: Vec3,
    pub init_position: Vec3,
    pub position: Vec3,
}

impl Default for ArrowData {
    fn default() -> Self {
        Self {
            pose: pose::translation(ARROW_REST_POSITION),
            launch_time_ms: 0,
            init_velocity: Vec3::ZERO,
            init_position: ARROW_REST_POSITION,
            position: ARROW_REST_POSITION,
        }
    }
}

/// Everything synchronized for one connected player.
///
/// The head/hand fields mirror the newest device frame the client sent.
/// The arrow state, dominant hand and cue counters are server-owned; the
/// cue counters only ever increment so clients detect edges by inequality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub head: HeadData,
    pub hands: [HandData; 2],
    pub arrow: ArrowData,
    pub dominant_hand: Hand,
    pub arrow_firing_cue: u32,
    pub arrow_stretching_cue: u32,
    pub arrow_released: bool,
    pub arrow_readying: bool,
}

/// One castle crasher.
///
/// Health floors at zero; the tick that zeroes it also flips `alive` and
/// removes the crasher from the roster, so dead enemies never persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastleCrasherData {
    pub id: u8,
    pub alive: bool,
    pub health: f32,
    /// Walk animation phase, degrees in [0, 360).
    pub walk_cycle: f32,
    pub direction: Vec3,
    pub position: Vec3,
    pub destination: Vec3,
    pub last_attack_ms: u64,
}

/// Transient score-multiplier popup shown where a crasher fell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierPopup {
    pub pose: Mat4Wire,
    pub opacity: f32,
    pub multiplier: u32,
}

/// Global round state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub started: bool,
    pub score: u32,
    pub castle_health: f32,
    pub left_tower_ready: bool,
    pub right_tower_ready: bool,
    /// Monotonic kill counter, for client-side death cues.
    pub enemy_died_cue: u32,
    pub score_multiplier: u32,
    pub crashers: Vec<CastleCrasherData>,
    pub flying_arrows: Vec<ArrowData>,
    pub multiplier_popups: Vec<MultiplierPopup>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            started: false,
            score: 0,
            castle_health: CASTLE_MAX_HEALTH,
            left_tower_ready: false,
            right_tower_ready: false,
            enemy_died_cue: 0,
            score_multiplier: 1,
            crashers: Vec::new(),
            flying_arrows: Vec::new(),
            multiplier_popups: Vec::new(),
        }
    }
}

/// Full snapshot of the game: the unit of synchronization sent to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub players: HashMap<u32, PlayerData>,
    pub game_state: GameState,
}

/// Session failures surfaced to the caller as explicit error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum SessionError {
    #[error("unknown player id")]
    InvalidUser,
    #[error("player capacity reached")]
    MaxUsersExceeded,
}

/// Protocol messages, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Client -> server
    RequestSession { player: PlayerData },
    UpdatePlayerData { player_id: u32, player: PlayerData },
    GetGameData,
    CloseSession { player_id: u32 },

    // Server -> client
    SessionGranted { player_id: u32 },
    RequestError { error: SessionError },
    Snapshot { data: GameData },
}
