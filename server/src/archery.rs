//! Player input merge and the arrow state machine.
//!
//! Stage 1 of the tick pipeline reconciles the staged input map with the
//! canonical roster and steps each player's arrow through its states:
//!
//! - released: the arrow is on the ground (or gone); a player reaching
//!   into the reload zone with a fresh grip picks up a new one
//! - held: the arrow rides the dominant hand
//! - drawing: the bowstring is pulled; letting the index trigger go fires
//!
//! Edge conditions compare the staged frame against the previous
//! canonical frame, so a held trigger never re-fires a transition.

use std::collections::HashMap;

use glam::Vec3;
use log::{debug, warn};
use shared::{
    ballistics, pose, ArrowData, GameData, GameState, Hand, Mat4Wire, PlayerData, BUTTON_A,
    BUTTON_X,
};

use crate::engine::Simulation;

/// Trigger travel at or above this counts as pressed.
const TRIGGER_PRESSED: f32 = 0.5;

/// Reload anchor: this far forward of the head pose, metres.
const RELOAD_ZONE_OFFSET: f32 = 0.30;
const RELOAD_ZONE_RADIUS: f32 = 0.15;

/// Draw anchor: this far forward of the off hand, metres.
const READY_ZONE_OFFSET: f32 = 0.30;
const READY_ZONE_RADIUS: f32 = 0.15;

/// Scale from hand separation to launch speed.
const VELOCITY_SCALE: f32 = 2.0;

/// Merge the staged input map into the canonical roster.
///
/// Players staged but not yet known join with default state; players no
/// longer staged have disconnected and are dropped. Running the same
/// staged map twice is a no-op the second time: all transitions are edge
/// conditions against the previous canonical frame.
pub fn merge_player_input(
    game: GameData,
    pending: &HashMap<u32, PlayerData>,
    now_ms: u64,
) -> GameData {
    let GameData {
        players: previous,
        mut game_state,
    } = game;

    let mut players = HashMap::with_capacity(pending.len());
    for (&player_id, input) in pending {
        if !input_is_sane(input) {
            // Tolerate a bad frame: hold the player's last good state
            // for this tick instead of evicting or crashing.
            warn!("Skipping malformed input frame from player {}", player_id);
            players.insert(
                player_id,
                previous.get(&player_id).cloned().unwrap_or_default(),
            );
            continue;
        }

        let prev = previous.get(&player_id).cloned().unwrap_or_else(|| {
            debug!("Player {} joined the roster", player_id);
            PlayerData::default()
        });
        players.insert(player_id, merge_one(&prev, input, now_ms, &mut game_state));
    }

    GameData {
        players,
        game_state,
    }
}

/// Step one player: dominant-hand selection, then the arrow state machine.
fn merge_one(
    prev: &PlayerData,
    input: &PlayerData,
    now_ms: u64,
    state: &mut GameState,
) -> PlayerData {
    let mut player = prev.clone();

    // Level-triggered hand selection; when both bits are down this frame,
    // the right hand wins as the last writer.
    if input.hands[Hand::Left.index()].buttons & BUTTON_X != 0 {
        player.dominant_hand = Hand::Left;
    }
    if input.hands[Hand::Right.index()].buttons & BUTTON_A != 0 {
        player.dominant_hand = Hand::Right;
    }

    let dominant = player.dominant_hand;
    let off_hand = dominant.other();
    let dominant_pos = pose::origin(&input.hands[dominant.index()].pose);
    let off_hand_pos = pose::origin(&input.hands[off_hand.index()].pose);
    let reload_anchor = pose::forward_point(&input.head.pose, RELOAD_ZONE_OFFSET);
    let ready_anchor = pose::forward_point(&input.hands[off_hand.index()].pose, READY_ZONE_OFFSET);

    let hand_trigger = input.hands[dominant.index()].hand_trigger;
    let index_trigger = input.hands[dominant.index()].index_trigger;
    let prev_hand_trigger = prev.hands[dominant.index()].hand_trigger;
    let prev_index_trigger = prev.hands[dominant.index()].index_trigger;

    if player.arrow_released {
        // A new arrow can only be nocked once the previous one is down.
        let previous_landed = player.arrow.position.y <= 0.0;
        let grip_closed =
            prev_hand_trigger < TRIGGER_PRESSED && hand_trigger >= TRIGGER_PRESSED;
        if previous_landed
            && grip_closed
            && reload_anchor.distance(dominant_pos) < RELOAD_ZONE_RADIUS
        {
            player.arrow_released = false;
            player.arrow_readying = false;
        }
    } else if hand_trigger < TRIGGER_PRESSED {
        // Grip opened while holding: the arrow is dropped out of play.
        player.arrow = ArrowData::default();
        player.arrow_released = true;
        player.arrow_readying = false;
    } else if player.arrow_readying {
        if index_trigger < TRIGGER_PRESSED {
            fire_arrow(&mut player, dominant_pos, off_hand_pos, now_ms, state);
        } else {
            // Drawn: ride the dominant hand, aimed along the draw axis.
            player.arrow.pose = pose::looking_along(dominant_pos, off_hand_pos - dominant_pos);
            player.arrow.position = dominant_pos;
        }
    } else {
        // Held at rest: rigid attachment to the dominant hand.
        player.arrow.pose = input.hands[dominant.index()].pose;
        player.arrow.position = dominant_pos;

        let index_pulled =
            prev_index_trigger < TRIGGER_PRESSED && index_trigger >= TRIGGER_PRESSED;
        if index_pulled && ready_anchor.distance(dominant_pos) < READY_ZONE_RADIUS {
            player.arrow_readying = true;
            player.arrow_stretching_cue = player.arrow_stretching_cue.wrapping_add(1);
        }
    }

    // Raw device state always mirrors the newest frame.
    player.head = input.head.clone();
    player.hands = input.hands.clone();
    player
}

/// Loose the drawn arrow: it becomes an engine-owned flying arrow while
/// the player's hand arrow resets to its off-field rest.
fn fire_arrow(
    player: &mut PlayerData,
    dominant_pos: Vec3,
    off_hand_pos: Vec3,
    now_ms: u64,
    state: &mut GameState,
) {
    let launch_position = pose::origin(&player.arrow.pose);
    let launch_velocity = (off_hand_pos - dominant_pos) * VELOCITY_SCALE;

    state.flying_arrows.push(ArrowData {
        pose: player.arrow.pose,
        launch_time_ms: now_ms,
        init_velocity: launch_velocity,
        init_position: launch_position,
        position: launch_position,
    });

    player.arrow = ArrowData::default();
    player.arrow_released = true;
    player.arrow_readying = false;
    player.arrow_firing_cue = player.arrow_firing_cue.wrapping_add(1);
}

/// Stage 2: reposition everything in flight from its launch triple.
///
/// Flying arrows whose new height is at or below the ground are removed;
/// their impact points are kept for this tick's ready-up check.
pub fn update_flying_arrows(sim: &mut Simulation, mut game: GameData, now_ms: u64) -> GameData {
    sim.landings.clear();

    for player in game.players.values_mut() {
        // A client may still be reporting an airborne released arrow;
        // converge it to the ballistic truth rather than freezing it.
        if player.arrow_released && player.arrow.position.y > 0.0 {
            reposition(&mut player.arrow, now_ms);
        }
    }

    let landings = &mut sim.landings;
    game.game_state.flying_arrows.retain_mut(|arrow| {
        reposition(arrow, now_ms);
        if arrow.position.y <= 0.0 {
            landings.push(arrow.position);
            false
        } else {
            true
        }
    });

    game
}

fn reposition(arrow: &mut ArrowData, now_ms: u64) {
    arrow.position = ballistics::position_at(
        arrow.init_position,
        arrow.init_velocity,
        arrow.launch_time_ms,
        now_ms,
    );
    arrow.pose = ballistics::flight_pose(
        arrow.init_position,
        arrow.init_velocity,
        arrow.launch_time_ms,
        now_ms,
    );
}

fn input_is_sane(input: &PlayerData) -> bool {
    let finite_pose = |wire: &Mat4Wire| wire.iter().flatten().all(|value| value.is_finite());
    finite_pose(&input.head.pose)
        && input.hands.iter().all(|hand| {
            finite_pose(&hand.pose)
                && hand.index_trigger.is_finite()
                && hand.hand_trigger.is_finite()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, Simulation};
    use shared::HandData;

    const NOW: u64 = 10_000;

    fn hand_at(position: Vec3, hand_trigger: f32, index_trigger: f32) -> HandData {
        HandData {
            pose: pose::translation(position),
            hand_trigger,
            index_trigger,
            ..HandData::default()
        }
    }

    /// Input frame with the head at the origin and the right (default
    /// dominant) hand wherever the test needs it.
    fn frame(right: HandData, left: HandData) -> PlayerData {
        PlayerData {
            hands: [left, right],
            ..PlayerData::default()
        }
    }

    fn reload_anchor() -> Vec3 {
        // Head pose is identity, so the anchor sits straight ahead of it.
        Vec3::new(0.0, 0.0, RELOAD_ZONE_OFFSET)
    }

    fn test_sim() -> Simulation {
        Simulation::new(
            &EngineConfig {
                tick_rate: 400,
                seed: Some(1),
            },
            NOW,
        )
    }

    fn merge_single(
        prev_roster: GameData,
        input: PlayerData,
        now_ms: u64,
    ) -> GameData {
        let mut pending = HashMap::new();
        pending.insert(1, input);
        merge_player_input(prev_roster, &pending, now_ms)
    }

    #[test]
    fn test_staged_players_join_and_leave_roster() {
        let mut pending = HashMap::new();
        pending.insert(1, PlayerData::default());
        pending.insert(2, PlayerData::default());

        let game = merge_player_input(GameData::default(), &pending, NOW);
        assert_eq!(game.players.len(), 2);

        pending.remove(&2);
        let game = merge_player_input(game, &pending, NOW + 10);
        assert!(game.players.contains_key(&1));
        assert!(!game.players.contains_key(&2));
    }

    #[test]
    fn test_merge_is_idempotent_for_identical_input() {
        let input = frame(
            hand_at(reload_anchor(), 1.0, 0.0),
            hand_at(Vec3::new(-0.2, 1.0, 0.0), 0.0, 0.0),
        );
        let mut pending = HashMap::new();
        pending.insert(1, input);

        let once = merge_player_input(GameData::default(), &pending, NOW);
        let twice = merge_player_input(once.clone(), &pending, NOW + 10);

        assert_eq!(once.players.len(), twice.players.len());
        let a = &once.players[&1];
        let b = &twice.players[&1];
        assert_eq!(a.arrow_released, b.arrow_released);
        assert_eq!(a.arrow_firing_cue, b.arrow_firing_cue);
        assert_eq!(a.arrow_stretching_cue, b.arrow_stretching_cue);
    }

    #[test]
    fn test_dominant_hand_switches_on_button_bits() {
        let mut input = PlayerData::default();
        input.hands[Hand::Left.index()].buttons = BUTTON_X;
        let game = merge_single(GameData::default(), input.clone(), NOW);
        assert_eq!(game.players[&1].dominant_hand, Hand::Left);

        // Both bits down: right wins as the last writer.
        input.hands[Hand::Right.index()].buttons = BUTTON_A;
        let game = merge_single(game, input, NOW + 10);
        assert_eq!(game.players[&1].dominant_hand, Hand::Right);
    }

    #[test]
    fn test_pickup_requires_grip_edge_in_reload_zone() {
        // Hand already in the zone with the grip held from the start:
        // no edge, no pickup.
        let held = frame(
            hand_at(reload_anchor(), 1.0, 0.0),
            HandData::default(),
        );
        let mut pending = HashMap::new();
        pending.insert(1, held.clone());
        let game = merge_player_input(GameData::default(), &pending, NOW);
        // First frame: previous trigger was 0 (default), so this IS an edge.
        assert!(!game.players[&1].arrow_released);

        // From a held-open grip, closing it outside the zone does nothing.
        let open = frame(
            hand_at(Vec3::new(2.0, 0.0, 0.0), 0.0, 0.0),
            HandData::default(),
        );
        let game = merge_single(GameData::default(), open, NOW);
        let closed_far = frame(
            hand_at(Vec3::new(2.0, 0.0, 0.0), 1.0, 0.0),
            HandData::default(),
        );
        let game = merge_single(game, closed_far, NOW + 10);
        assert!(game.players[&1].arrow_released);
    }

    #[test]
    fn test_pickup_blocked_while_previous_arrow_flies() {
        let open = frame(hand_at(reload_anchor(), 0.0, 0.0), HandData::default());
        let mut game = merge_single(GameData::default(), open, NOW);
        // Pretend the player's released arrow is still airborne.
        game.players.get_mut(&1).unwrap().arrow.position = Vec3::new(0.0, 4.0, 10.0);

        let grab = frame(hand_at(reload_anchor(), 1.0, 0.0), HandData::default());
        let game = merge_single(game, grab, NOW + 10);
        assert!(game.players[&1].arrow_released);
    }

    #[test]
    fn test_held_arrow_tracks_dominant_hand() {
        let grab = frame(hand_at(reload_anchor(), 1.0, 0.0), HandData::default());
        let game = merge_single(GameData::default(), grab, NOW);
        assert!(!game.players[&1].arrow_released);

        let moved = frame(
            hand_at(Vec3::new(0.4, 1.2, 0.1), 1.0, 0.0),
            HandData::default(),
        );
        let game = merge_single(game, moved, NOW + 10);
        let player = &game.players[&1];
        assert_eq!(player.arrow.position, Vec3::new(0.4, 1.2, 0.1));
        assert_eq!(pose::origin(&player.arrow.pose), Vec3::new(0.4, 1.2, 0.1));
    }

    #[test]
    fn test_draw_requires_ready_zone_and_index_edge() {
        let off_hand_pos = Vec3::new(-0.3, 1.2, 0.2);
        // Anchor sits straight ahead of the (translation-only) off hand.
        let draw_pos = off_hand_pos + Vec3::new(0.0, 0.0, READY_ZONE_OFFSET);

        let grab = frame(hand_at(reload_anchor(), 1.0, 0.0), HandData::default());
        let game = merge_single(GameData::default(), grab, NOW);

        // In the draw sphere but the index trigger stays up: no draw.
        let poised = frame(
            hand_at(draw_pos, 1.0, 0.0),
            hand_at(off_hand_pos, 0.0, 0.0),
        );
        let game = merge_single(game, poised, NOW + 10);
        assert!(!game.players[&1].arrow_readying);

        // Index trigger closes inside the sphere: drawn, with a cue.
        let drawn = frame(
            hand_at(draw_pos, 1.0, 1.0),
            hand_at(off_hand_pos, 0.0, 0.0),
        );
        let game = merge_single(game, drawn, NOW + 20);
        let player = &game.players[&1];
        assert!(player.arrow_readying);
        assert_eq!(player.arrow_stretching_cue, 1);
    }

    #[test]
    fn test_release_fires_arrow_into_flight_list() {
        let off_hand_pos = Vec3::new(-0.3, 1.2, 0.2);
        let draw_pos = off_hand_pos + Vec3::new(0.0, 0.0, READY_ZONE_OFFSET);

        let grab = frame(hand_at(reload_anchor(), 1.0, 0.0), HandData::default());
        let game = merge_single(GameData::default(), grab, NOW);
        let drawn = frame(
            hand_at(draw_pos, 1.0, 1.0),
            hand_at(off_hand_pos, 0.0, 0.0),
        );
        let game = merge_single(game, drawn, NOW + 10);

        let released = frame(
            hand_at(draw_pos, 1.0, 0.0),
            hand_at(off_hand_pos, 0.0, 0.0),
        );
        let game = merge_single(game, released, NOW + 20);

        let player = &game.players[&1];
        assert!(player.arrow_released);
        assert!(!player.arrow_readying);
        assert_eq!(player.arrow_firing_cue, 1);
        assert_eq!(player.arrow.position, shared::ARROW_REST_POSITION);

        assert_eq!(game.game_state.flying_arrows.len(), 1);
        let arrow = &game.game_state.flying_arrows[0];
        assert_eq!(arrow.launch_time_ms, NOW + 20);
        let expected_velocity = (off_hand_pos - draw_pos) * VELOCITY_SCALE;
        assert!(arrow.init_velocity.distance(expected_velocity) < 1e-5);
    }

    #[test]
    fn test_opening_grip_drops_the_arrow() {
        let grab = frame(hand_at(reload_anchor(), 1.0, 0.0), HandData::default());
        let game = merge_single(GameData::default(), grab, NOW);
        assert!(!game.players[&1].arrow_released);

        let dropped = frame(hand_at(reload_anchor(), 0.2, 0.0), HandData::default());
        let game = merge_single(game, dropped, NOW + 10);
        let player = &game.players[&1];
        assert!(player.arrow_released);
        assert_eq!(player.arrow.position, shared::ARROW_REST_POSITION);
        assert_eq!(player.arrow_firing_cue, 0);
    }

    #[test]
    fn test_malformed_input_keeps_last_good_state() {
        let grab = frame(hand_at(reload_anchor(), 1.0, 0.0), HandData::default());
        let game = merge_single(GameData::default(), grab, NOW);

        let mut garbage = PlayerData::default();
        garbage.hands[Hand::Right.index()].hand_trigger = f32::NAN;
        let game = merge_single(game, garbage, NOW + 10);

        // Player survives the bad frame with the held arrow intact.
        let player = &game.players[&1];
        assert!(!player.arrow_released);
    }

    #[test]
    fn test_flying_arrows_land_and_record_impacts() {
        let mut sim = test_sim();
        let mut game = GameData::default();
        game.game_state.flying_arrows.push(ArrowData {
            init_position: Vec3::new(0.0, 2.0, 0.0),
            init_velocity: Vec3::new(0.0, 1.0, 5.0),
            launch_time_ms: NOW,
            position: Vec3::new(0.0, 2.0, 0.0),
            ..ArrowData::default()
        });

        // Shortly after launch the arrow is still up.
        let game = update_flying_arrows(&mut sim, game, NOW + 100);
        assert_eq!(game.game_state.flying_arrows.len(), 1);
        assert!(sim.landings.is_empty());

        // Ten seconds on it is long down.
        let game = update_flying_arrows(&mut sim, game, NOW + 10_000);
        assert!(game.game_state.flying_arrows.is_empty());
        assert_eq!(sim.landings.len(), 1);
        assert!(sim.landings[0].y <= 0.0);
    }
}
