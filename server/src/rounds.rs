//! Round lifecycle, combo bookkeeping and between-round idle behavior.
//!
//! A round is armed by landing an arrow at each tower's ready marker,
//! runs until the castle health hits zero, then drops back to waiting.
//! The score multiplier expires here too, so an idle player loses the
//! streak without having to take another shot.

use glam::Vec3;
use log::info;
use rand::Rng;
use shared::{pose, CastleCrasherData, GameData, CASTLE_MAX_HEALTH};

use crate::crashers::{self, CRASHER_MAX_HEALTH};
use crate::engine::Simulation;

/// Two kills closer together than this keep the streak alive.
pub(crate) const COMBO_WINDOW_MS: u64 = 5_000;
pub(crate) const MAX_MULTIPLIER: u32 = 8;
pub(crate) const BASE_POINTS_PER_HIT: u32 = 10;

/// An arrow landing this close to a tower marker readies that tower.
const READY_UP_RADIUS: f32 = 1.0;
/// Ready markers at the foot of the left and right towers.
const TOWER_MARKERS: [Vec3; 2] = [Vec3::new(-8.0, 0.0, 1.5), Vec3::new(8.0, 0.0, 1.5)];

/// Popup rise rate, metres per second.
const POPUP_RISE_RATE: f32 = 0.4;
/// Popup fade rate, opacity per second.
const POPUP_FADE_RATE: f32 = 0.8;

/// Size of the strolling troupe shown while waiting for a round.
const IDLE_WANDERERS: usize = 3;
/// Idle re-aim throttle, milliseconds.
const IDLE_RETARGET_MS: u64 = 1_000;
/// Field the troupe wanders, metres.
const IDLE_X_RANGE: std::ops::RangeInclusive<f32> = -10.0..=10.0;
const IDLE_Z_RANGE: std::ops::RangeInclusive<f32> = 4.0..=20.0;
/// A wanderer this close to its goal picks a new one.
const IDLE_ARRIVE_RADIUS: f32 = 0.5;

/// Stage 3: drift the kill popups upward and fade them out.
pub fn age_multiplier_popups(mut game: GameData, dt: f32) -> GameData {
    game.game_state.multiplier_popups.retain_mut(|popup| {
        let mut origin = pose::origin(&popup.pose);
        origin.y += POPUP_RISE_RATE * dt;
        popup.pose = pose::translation(origin);
        popup.opacity -= POPUP_FADE_RATE * dt;
        popup.opacity > 0.0
    });
    game
}

/// Stage 5: ready-up detection, round start/end and streak expiry.
pub fn update_round_state(sim: &mut Simulation, mut game: GameData, now_ms: u64) -> GameData {
    let state = &mut game.game_state;

    if !state.started {
        for landing in &sim.landings {
            if landing.distance(TOWER_MARKERS[0]) < READY_UP_RADIUS {
                state.left_tower_ready = true;
            }
            if landing.distance(TOWER_MARKERS[1]) < READY_UP_RADIUS {
                state.right_tower_ready = true;
            }
        }

        if state.left_tower_ready && state.right_tower_ready {
            info!("Both towers ready, round starting");
            state.started = true;
            state.score = 0;
            state.castle_health = CASTLE_MAX_HEALTH;
            state.enemy_died_cue = 0;
            state.score_multiplier = 1;
            // The idle troupe clears out for the real wave.
            state.crashers.clear();
            state.multiplier_popups.clear();

            sim.round_started_ms = now_ms;
            sim.last_spawn_ms = now_ms;
            sim.spawn_cooldown_ms = 0;
            sim.last_kill_ms = 0;
        }
    } else if state.castle_health == 0.0 {
        info!("The castle fell; final score {}", state.score);
        state.started = false;
        state.left_tower_ready = false;
        state.right_tower_ready = false;
        state.crashers.clear();
    }

    // Streaks expire on the clock, independent of combat resolution.
    if state.score_multiplier > 1 && now_ms.saturating_sub(sim.last_kill_ms) > COMBO_WINDOW_MS {
        state.score_multiplier = 1;
    }

    game
}

/// Stage 6: cosmetic idle behavior while no round is active.
///
/// A small troupe of crashers strolls the field between rounds so the
/// place never looks dead. They are gameplay-inert: spawning, scoring
/// and castle damage are all gated on an active round, and the troupe is
/// cleared the moment one starts. Re-aiming is throttled to once per
/// second.
pub fn update_idle_wanderers(
    sim: &mut Simulation,
    mut game: GameData,
    now_ms: u64,
    dt: f32,
) -> GameData {
    if game.game_state.started {
        return game;
    }
    let state = &mut game.game_state;

    if now_ms.saturating_sub(sim.idle_throttle_ms) >= IDLE_RETARGET_MS {
        sim.idle_throttle_ms = now_ms;

        while state.crashers.len() < IDLE_WANDERERS {
            let id = sim.next_crasher_id;
            sim.next_crasher_id = sim.next_crasher_id.wrapping_add(1);
            let position = Vec3::new(
                sim.rng.gen_range(IDLE_X_RANGE),
                0.0,
                sim.rng.gen_range(IDLE_Z_RANGE),
            );
            state.crashers.push(CastleCrasherData {
                id,
                alive: true,
                health: CRASHER_MAX_HEALTH,
                walk_cycle: 0.0,
                direction: Vec3::Z,
                position,
                destination: position,
                last_attack_ms: 0,
            });
        }

        for crasher in &mut state.crashers {
            if crasher.position.distance(crasher.destination) < IDLE_ARRIVE_RADIUS {
                crasher.destination = Vec3::new(
                    sim.rng.gen_range(IDLE_X_RANGE),
                    0.0,
                    sim.rng.gen_range(IDLE_Z_RANGE),
                );
            }
        }
    }

    for crasher in &mut state.crashers {
        if crasher.position.distance(crasher.destination) >= IDLE_ARRIVE_RADIUS {
            crashers::walk(crasher, dt);
        }
    }

    game
}
