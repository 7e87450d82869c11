//! Closed-form arrow flight.
//!
//! Position and velocity are pure functions of the launch triple
//! (initial position, initial velocity, launch time) and the query time.
//! Nothing integrates per tick, so a trajectory can always be reproduced
//! exactly from what is on the wire and never drifts.

use glam::Vec3;

use crate::pose::{self, Mat4Wire};

/// Gravitational acceleration along y, metres per second squared.
pub const GRAVITY: f32 = -9.81;

/// Look-ahead used to derive flight orientation, milliseconds (1/200 s).
const ORIENTATION_SAMPLE_MS: u64 = 5;

fn elapsed_secs(launch_time_ms: u64, now_ms: u64) -> f32 {
    now_ms.saturating_sub(launch_time_ms) as f32 / 1000.0
}

pub fn position_at(
    init_position: Vec3,
    init_velocity: Vec3,
    launch_time_ms: u64,
    now_ms: u64,
) -> Vec3 {
    let dt = elapsed_secs(launch_time_ms, now_ms);
    init_position + init_velocity * dt + Vec3::new(0.0, 0.5 * GRAVITY * dt * dt, 0.0)
}

pub fn velocity_at(init_velocity: Vec3, launch_time_ms: u64, now_ms: u64) -> Vec3 {
    let dt = elapsed_secs(launch_time_ms, now_ms);
    init_velocity + Vec3::new(0.0, GRAVITY * dt, 0.0)
}

/// Pose of an arrow in flight: at the current trajectory point, oriented
/// along it. Orientation comes from sampling the path a short step ahead
/// and looking along the difference, which keeps the arrow tangent to its
/// true arc without a separate closed-form orientation.
pub fn flight_pose(
    init_position: Vec3,
    init_velocity: Vec3,
    launch_time_ms: u64,
    now_ms: u64,
) -> Mat4Wire {
    let here = position_at(init_position, init_velocity, launch_time_ms, now_ms);
    let ahead = position_at(
        init_position,
        init_velocity,
        launch_time_ms,
        now_ms + ORIENTATION_SAMPLE_MS,
    );
    pose::looking_along(here, ahead - here)
}
