//! Simulation core: canonical state ownership and the fixed-rate tick loop.
//!
//! Two independent critical sections, never nested:
//!
//! - the pending-input map, written by transport workers and read once per
//!   tick by the merge stage;
//! - the canonical [`GameData`], copied out at the top of each tick,
//!   rebuilt functionally stage by stage, and published back under lock.
//!
//! Locks are only ever held for the duration of a copy. All physics and
//! AI run on private copies, so `get_copy_of_game_data` always returns a
//! complete snapshot from a single tick boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use glam::Vec3;
use log::{info, warn};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shared::{GameData, PlayerData};

use crate::{archery, crashers, rounds, utils};

/// Engine tuning supplied at startup.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Simulation refresh rate, ticks per second.
    pub tick_rate: u32,
    /// Seed for the simulation RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 400,
            seed: None,
        }
    }
}

/// Per-tick simulation state that never leaves the tick thread.
///
/// Holds the RNG and the bookkeeping that is meaningful to the server but
/// not to clients: spawn pacing, combo timing, idle-behavior throttling
/// and the arrow landings observed this tick.
pub struct Simulation {
    pub(crate) rng: ChaCha8Rng,
    pub(crate) last_tick_ms: u64,
    pub(crate) round_started_ms: u64,
    pub(crate) last_spawn_ms: u64,
    pub(crate) spawn_cooldown_ms: u64,
    pub(crate) last_kill_ms: u64,
    pub(crate) idle_throttle_ms: u64,
    /// Where flying arrows hit the ground this tick, for ready-up checks.
    pub(crate) landings: Vec<Vec3>,
    pub(crate) next_crasher_id: u8,
}

impl Simulation {
    pub fn new(config: &EngineConfig, now_ms: u64) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            rng,
            last_tick_ms: now_ms,
            round_started_ms: 0,
            last_spawn_ms: 0,
            spawn_cooldown_ms: 0,
            last_kill_ms: 0,
            idle_throttle_ms: 0,
            landings: Vec::new(),
            next_crasher_id: 0,
        }
    }

    /// Run one full update pass.
    ///
    /// Consumes the previous snapshot and the staged input map, returns
    /// the next snapshot. Stages run in a fixed order and each sees only
    /// its predecessor's output; nothing aliases the canonical state.
    pub fn advance(
        &mut self,
        game: GameData,
        pending: &HashMap<u32, PlayerData>,
        now_ms: u64,
    ) -> GameData {
        let dt = now_ms.saturating_sub(self.last_tick_ms) as f32 / 1000.0;
        self.last_tick_ms = now_ms;

        let game = archery::merge_player_input(game, pending, now_ms);
        let game = archery::update_flying_arrows(self, game, now_ms);
        let game = rounds::age_multiplier_popups(game, dt);
        let game = crashers::update(self, game, now_ms, dt);
        let game = rounds::update_round_state(self, game, now_ms);
        rounds::update_idle_wanderers(self, game, now_ms, dt)
    }
}

/// Handle to the running simulation.
///
/// One instance per server process; the transport adapter holds it behind
/// an `Arc` and calls the public operations from any worker thread.
pub struct GameEngine {
    game: Arc<Mutex<GameData>>,
    pending: Arc<Mutex<HashMap<u32, PlayerData>>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GameEngine {
    /// Spawn the simulation thread and return the engine handle.
    pub fn start(config: EngineConfig) -> std::io::Result<Arc<Self>> {
        let engine = Arc::new(Self {
            game: Arc::new(Mutex::new(GameData::default())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(true)),
            worker: Mutex::new(None),
        });

        let game = Arc::clone(&engine.game);
        let pending = Arc::clone(&engine.pending);
        let running = Arc::clone(&engine.running);
        let handle = thread::Builder::new()
            .name("game-engine".into())
            .spawn(move || run_tick_loop(config, game, pending, running))?;
        *engine.worker.lock() = Some(handle);

        info!("Game engine service started ({} Hz)", config.tick_rate);
        Ok(engine)
    }

    /// Stage the latest input frame for a player. Overwrites any frame
    /// not yet consumed by the tick loop: last writer wins.
    pub fn handle_new_user_input(&self, player_id: u32, player: PlayerData) {
        self.pending.lock().insert(player_id, player);
    }

    /// Forget a player; the next tick drops them from the canonical roster.
    pub fn remove_user(&self, player_id: u32) {
        self.pending.lock().remove(&player_id);
    }

    /// Full copy of the canonical state from the latest committed tick.
    pub fn get_copy_of_game_data(&self) -> GameData {
        self.game.lock().clone()
    }

    /// Stop the tick loop after its current pass and wait for it to exit.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("Simulation thread exited with a panic");
            }
        }
    }
}

fn run_tick_loop(
    config: EngineConfig,
    game: Arc<Mutex<GameData>>,
    pending: Arc<Mutex<HashMap<u32, PlayerData>>>,
    running: Arc<AtomicBool>,
) {
    let period = std::time::Duration::from_secs(1) / config.tick_rate.max(1);
    let mut sim = Simulation::new(&config, utils::unix_millis());

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        let inputs = pending.lock().clone();
        let current = game.lock().clone();
        let next = sim.advance(current, &inputs, utils::unix_millis());
        *game.lock() = next;

        // Sleep off whatever the update pass left of the period. An
        // overrun proceeds immediately: late ticks are dropped, never
        // queued for catch-up.
        if let Some(remaining) = period.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
    info!("Game engine service stopped");
}
