//! Samples tracked-device state into per-frame player input.

use glam::Vec3;
use shared::{pose, Hand, HandData, PlayerData};

/// One sampled frame of tracked-device state.
#[derive(Debug, Clone)]
pub struct DeviceFrame {
    pub head_position: Vec3,
    pub left_hand: HandSample,
    pub right_hand: HandSample,
}

#[derive(Debug, Clone)]
pub struct HandSample {
    pub position: Vec3,
    pub thumbstick: [f32; 2],
    pub buttons: u32,
    pub index_trigger: f32,
    pub hand_trigger: f32,
}

impl HandSample {
    pub fn idle(position: Vec3) -> Self {
        Self {
            position,
            thumbstick: [0.0, 0.0],
            buttons: 0,
            index_trigger: 0.0,
            hand_trigger: 0.0,
        }
    }
}

/// Seam over the tracking hardware so the client logic can run headless.
pub trait DeviceSampler {
    fn sample(&mut self) -> DeviceFrame;
}

/// Scripted stand-in for a VR rig: the head bobs gently while both hands
/// idle at waist height. Enough to keep a session alive end to end.
pub struct SyntheticDevice {
    frame: u64,
}

impl SyntheticDevice {
    pub fn new() -> Self {
        Self { frame: 0 }
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSampler for SyntheticDevice {
    fn sample(&mut self) -> DeviceFrame {
        self.frame += 1;
        let bob = (self.frame as f32 / 90.0).sin() * 0.02;
        DeviceFrame {
            head_position: Vec3::new(0.0, 1.70 + bob, 0.0),
            left_hand: HandSample::idle(Vec3::new(-0.20, 1.10, 0.20)),
            right_hand: HandSample::idle(Vec3::new(0.20, 1.10, 0.20)),
        }
    }
}

/// Fold a device frame into the last server-acknowledged player record.
///
/// Only the tracked poses and controller state are ours to set; arrow
/// state, dominant hand and cue counters belong to the server and ride
/// through untouched.
pub fn build_frame(acknowledged: &PlayerData, frame: &DeviceFrame) -> PlayerData {
    let mut player = acknowledged.clone();
    player.head.pose = pose::translation(frame.head_position);
    player.hands[Hand::Left.index()] = hand_data(&frame.left_hand);
    player.hands[Hand::Right.index()] = hand_data(&frame.right_hand);
    player
}

fn hand_data(sample: &HandSample) -> HandData {
    HandData {
        pose: pose::translation(sample.position),
        thumbstick: sample.thumbstick,
        buttons: sample.buttons,
        index_trigger: sample.index_trigger,
        hand_trigger: sample.hand_trigger,
    }
}
