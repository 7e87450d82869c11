//! Client-side snapshot tracking and audio-cue edge detection.

use shared::{GameData, PlayerData};

/// Sound triggers decoded from the monotonic cue counters. The server
/// only ever moves these forward, so any inequality between consecutive
/// snapshots is an edge worth playing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CueEvents {
    pub arrow_fired: bool,
    pub arrow_stretched: bool,
    pub enemy_died: bool,
}

impl CueEvents {
    pub fn any(&self) -> bool {
        self.arrow_fired || self.arrow_stretched || self.enemy_died
    }
}

/// The latest authoritative snapshot plus the cue counters last seen.
pub struct ClientGameState {
    pub latest: GameData,
    player_id: u32,
    last_firing_cue: u32,
    last_stretching_cue: u32,
    last_enemy_died_cue: u32,
}

impl ClientGameState {
    pub fn new(player_id: u32) -> Self {
        Self {
            latest: GameData::default(),
            player_id,
            last_firing_cue: 0,
            last_stretching_cue: 0,
            last_enemy_died_cue: 0,
        }
    }

    /// Install a fresh snapshot, returning the cue edges it carries.
    pub fn apply_snapshot(&mut self, data: GameData) -> CueEvents {
        let mut events = CueEvents::default();

        if let Some(me) = data.players.get(&self.player_id) {
            events.arrow_fired = me.arrow_firing_cue != self.last_firing_cue;
            events.arrow_stretched = me.arrow_stretching_cue != self.last_stretching_cue;
            self.last_firing_cue = me.arrow_firing_cue;
            self.last_stretching_cue = me.arrow_stretching_cue;
        }

        events.enemy_died = data.game_state.enemy_died_cue != self.last_enemy_died_cue;
        self.last_enemy_died_cue = data.game_state.enemy_died_cue;

        self.latest = data;
        events
    }

    /// The local player's authoritative record, if the server knows us.
    pub fn local_player(&self) -> Option<&PlayerData> {
        self.latest.players.get(&self.player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_cues(player_id: u32, firing: u32, stretching: u32, died: u32) -> GameData {
        let mut data = GameData::default();
        let mut player = PlayerData::default();
        player.arrow_firing_cue = firing;
        player.arrow_stretching_cue = stretching;
        data.players.insert(player_id, player);
        data.game_state.enemy_died_cue = died;
        data
    }

    #[test]
    fn test_first_snapshot_with_zero_cues_is_silent() {
        let mut state = ClientGameState::new(1);
        let events = state.apply_snapshot(snapshot_with_cues(1, 0, 0, 0));
        assert!(!events.any());
    }

    #[test]
    fn test_cue_increments_fire_once() {
        let mut state = ClientGameState::new(1);
        state.apply_snapshot(snapshot_with_cues(1, 0, 0, 0));

        let events = state.apply_snapshot(snapshot_with_cues(1, 1, 0, 2));
        assert!(events.arrow_fired);
        assert!(!events.arrow_stretched);
        assert!(events.enemy_died);

        // Unchanged counters on the next snapshot stay silent.
        let events = state.apply_snapshot(snapshot_with_cues(1, 1, 0, 2));
        assert!(!events.any());
    }

    #[test]
    fn test_other_players_cues_are_ignored() {
        let mut state = ClientGameState::new(1);
        state.apply_snapshot(snapshot_with_cues(1, 0, 0, 0));

        // Only player 2 is in this snapshot; our counters must not move.
        let events = state.apply_snapshot(snapshot_with_cues(2, 5, 5, 0));
        assert!(!events.arrow_fired);
        assert!(!events.arrow_stretched);
    }

    #[test]
    fn test_local_player_lookup() {
        let mut state = ClientGameState::new(1);
        assert!(state.local_player().is_none());
        state.apply_snapshot(snapshot_with_cues(1, 0, 0, 0));
        assert!(state.local_player().is_some());
    }
}
