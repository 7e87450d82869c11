//! Castle crasher combat resolution, spawning and locomotion.
//!
//! Stage 4 of the tick pipeline. Arrows in flight are tested against the
//! roster in order; the first living crasher inside the hit radius
//! absorbs the arrow. Kills pay out through the combo multiplier, the
//! wave pressure ramps with round time, and crashers that reach the
//! castle front switch from walking to hammering on it.

use glam::Vec3;
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use shared::{pose, CastleCrasherData, GameData, GameState, MultiplierPopup};

use crate::engine::Simulation;
use crate::rounds::{BASE_POINTS_PER_HIT, COMBO_WINDOW_MS, MAX_MULTIPLIER};

/// Arrow impact radius around a crasher, metres.
const HIT_RADIUS: f32 = 1.5;
const ARROW_DAMAGE: f32 = 20.0;
pub(crate) const CRASHER_MAX_HEALTH: f32 = 100.0;

/// Population cap once the difficulty ramp saturates.
const MAX_CRASHERS: usize = 20;
/// Seconds for the wave pressure to ramp from zero to full.
const MAX_DIFFICULTY_SECS: f32 = 120.0;
/// Base window for the randomized spawn cooldown, milliseconds. The
/// actual cooldown is a random fraction of this divided by the ramp, so
/// arrivals get burstier as the round wears on.
const SPAWN_WINDOW_MS: f32 = 5_000.0;

/// Ground speed, metres per second.
const WALK_SPEED: f32 = 1.2;
/// Walk-cycle phase advance, degrees per second.
const WALK_CYCLE_RATE: f32 = 360.0;
/// Max vertical easing toward terrain height, metres per second.
const VERTICAL_EASE_RATE: f32 = 2.0;

/// Castle front plane; crashers attack once their z falls to it.
pub(crate) const CASTLE_FRONT_Z: f32 = 0.0;
const CASTLE_FRONT_HALF_WIDTH: f32 = 6.0;

/// Spawn band, metres: across the field and out from the castle.
const SPAWN_X_MIN: f32 = -12.0;
const SPAWN_X_MAX: f32 = 12.0;
const SPAWN_Z_MIN: f32 = 25.0;
const SPAWN_Z_MAX: f32 = 30.0;

const ATTACK_COOLDOWN_MS: u64 = 1_000;
const ATTACK_DAMAGE: f32 = 5.0;

struct TerrainBump {
    center_x: f32,
    center_z: f32,
    radius: f32,
    height: f32,
}

/// Raised ground the crashers climb over on their way in.
const TERRAIN_BUMPS: [TerrainBump; 3] = [
    TerrainBump {
        center_x: -5.0,
        center_z: 14.0,
        radius: 4.0,
        height: 0.8,
    },
    TerrainBump {
        center_x: 6.0,
        center_z: 9.0,
        radius: 3.0,
        height: 0.6,
    },
    TerrainBump {
        center_x: 0.0,
        center_z: 20.0,
        radius: 5.0,
        height: 1.0,
    },
];

pub fn update(sim: &mut Simulation, mut game: GameData, now_ms: u64, dt: f32) -> GameData {
    let started = game.game_state.started;
    let state = &mut game.game_state;

    resolve_arrow_hits(sim, state, now_ms);
    if started {
        spawn_wave(sim, state, now_ms);
        advance_crashers(state, now_ms, dt);
    }
    game
}

/// Test every flying arrow against the roster in order; the first living
/// crasher within the hit radius takes the damage and consumes the arrow.
/// No nearest-neighbor tie-break: roster order decides.
fn resolve_arrow_hits(sim: &mut Simulation, state: &mut GameState, now_ms: u64) {
    let mut surviving = Vec::with_capacity(state.flying_arrows.len());
    for arrow in state.flying_arrows.drain(..) {
        let target = state
            .crashers
            .iter_mut()
            .find(|crasher| crasher.alive && crasher.position.distance(arrow.position) < HIT_RADIUS);

        match target {
            Some(crasher) => {
                crasher.health = (crasher.health - ARROW_DAMAGE).max(0.0);
                if crasher.health == 0.0 {
                    crasher.alive = false;
                }
            }
            None => surviving.push(arrow),
        }
    }
    state.flying_arrows = surviving;

    // The tick that kills a crasher also removes it; dead crashers never
    // persist in the published roster.
    let mut kill_sites = Vec::new();
    state.crashers.retain(|crasher| {
        if crasher.alive {
            true
        } else {
            kill_sites.push(crasher.position);
            false
        }
    });
    for position in kill_sites {
        award_kill(sim, state, position, now_ms);
    }
}

fn award_kill(sim: &mut Simulation, state: &mut GameState, position: Vec3, now_ms: u64) {
    let streak_alive =
        sim.last_kill_ms != 0 && now_ms.saturating_sub(sim.last_kill_ms) <= COMBO_WINDOW_MS;
    state.score_multiplier = if streak_alive {
        (state.score_multiplier * 2).min(MAX_MULTIPLIER)
    } else {
        1
    };
    sim.last_kill_ms = now_ms;

    state.score += state.score_multiplier * BASE_POINTS_PER_HIT;
    state.enemy_died_cue = state.enemy_died_cue.wrapping_add(1);
    state.multiplier_popups.push(MultiplierPopup {
        pose: pose::translation(position),
        opacity: 1.0,
        multiplier: state.score_multiplier,
    });
    debug!(
        "Crasher down at {:?}, x{} -> score {}",
        position, state.score_multiplier, state.score
    );
}

/// Keep the live population tracking the difficulty ramp.
///
/// Target population climbs linearly over the round; whenever the roster
/// runs below it and the randomized cooldown has lapsed, one crasher
/// spawns somewhere in the band and marches for the castle front.
fn spawn_wave(sim: &mut Simulation, state: &mut GameState, now_ms: u64) {
    let elapsed_secs = now_ms.saturating_sub(sim.round_started_ms) as f32 / 1000.0;
    let ramp = (elapsed_secs / MAX_DIFFICULTY_SECS).min(1.0);
    let target_population = MAX_CRASHERS as f32 * ramp;

    if (state.crashers.len() as f32) < target_population
        && now_ms.saturating_sub(sim.last_spawn_ms) >= sim.spawn_cooldown_ms
    {
        let id = sim.next_crasher_id;
        sim.next_crasher_id = sim.next_crasher_id.wrapping_add(1);
        state.crashers.push(spawn_one(&mut sim.rng, id));

        sim.last_spawn_ms = now_ms;
        sim.spawn_cooldown_ms = (sim.rng.gen::<f32>() * SPAWN_WINDOW_MS / ramp.max(0.05)) as u64;
    }
}

fn spawn_one(rng: &mut ChaCha8Rng, id: u8) -> CastleCrasherData {
    let position = Vec3::new(
        rng.gen_range(SPAWN_X_MIN..=SPAWN_X_MAX),
        0.0,
        rng.gen_range(SPAWN_Z_MIN..=SPAWN_Z_MAX),
    );
    let destination = Vec3::new(
        rng.gen_range(-CASTLE_FRONT_HALF_WIDTH..=CASTLE_FRONT_HALF_WIDTH),
        0.0,
        CASTLE_FRONT_Z,
    );
    let direction = (destination - position).normalize_or_zero();
    CastleCrasherData {
        id,
        alive: true,
        health: CRASHER_MAX_HEALTH,
        walk_cycle: 0.0,
        direction,
        position,
        destination,
        last_attack_ms: 0,
    }
}

/// March every crasher toward its destination, or let it pound on the
/// castle once it is past the front plane.
fn advance_crashers(state: &mut GameState, now_ms: u64, dt: f32) {
    let mut castle_health = state.castle_health;
    for crasher in &mut state.crashers {
        if crasher.position.z > CASTLE_FRONT_Z {
            walk(crasher, dt);
        } else if now_ms.saturating_sub(crasher.last_attack_ms) >= ATTACK_COOLDOWN_MS {
            crasher.last_attack_ms = now_ms;
            castle_health = (castle_health - ATTACK_DAMAGE).max(0.0);
        }
    }
    state.castle_health = castle_health;
}

/// One walking step: heading, stride, walk-cycle phase and the smoothed
/// vertical ride over the terrain bumps.
pub(crate) fn walk(crasher: &mut CastleCrasherData, dt: f32) {
    let toward = crasher.destination - crasher.position;
    let flat = Vec3::new(toward.x, 0.0, toward.z);
    if flat.length_squared() > f32::EPSILON {
        crasher.direction = flat.normalize();
    }

    crasher.position += crasher.direction * WALK_SPEED * dt;
    crasher.walk_cycle = (crasher.walk_cycle + WALK_CYCLE_RATE * dt).rem_euclid(360.0);

    // Ease toward the terrain height instead of snapping over bumps.
    let target_height = terrain_height(crasher.position);
    let max_step = VERTICAL_EASE_RATE * dt;
    crasher.position.y += (target_height - crasher.position.y).clamp(-max_step, max_step);
}

/// Ground height: bumps raise it linearly with proximity to their center.
fn terrain_height(position: Vec3) -> f32 {
    TERRAIN_BUMPS
        .iter()
        .map(|bump| {
            let dx = position.x - bump.center_x;
            let dz = position.z - bump.center_z;
            let distance = (dx * dx + dz * dz).sqrt();
            if distance < bump.radius {
                bump.height * (1.0 - distance / bump.radius)
            } else {
                0.0
            }
        })
        .fold(0.0, f32::max)
}
