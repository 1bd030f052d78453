//! Client-side view of the session, rebuilt from authoritative server messages

use std::collections::HashMap;

use crate::ws::protocol::{GameSnapshot, Phase, PlayerView, ScoreEntry, ServerMsg};

/// Everything a client knows about the session. `apply` is idempotent: feeding the same
/// message twice leaves the same state.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Our participant id, once the server has accepted the join
    pub local_id: Option<String>,
    pub phase: Phase,
    pub host_id: Option<String>,
    pub arena_radius: f32,
    pub players: HashMap<String, PlayerView>,
    pub player_count: usize,
    pub max_players: usize,
    pub countdown: Option<u32>,
    pub is_warning: bool,
    pub warning_progress: f32,
    pub scores: Vec<ScoreEntry>,
    pub winner: Option<PlayerView>,
    pub konami_by: Option<String>,
    pub join_error: Option<String>,
    /// Timestamp of the newest applied position data
    pub last_position_at: u64,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::PlayerCount { count, max } => {
                self.player_count = *count;
                self.max_players = *max;
            }
            ServerMsg::JoinError { message } => {
                self.join_error = Some(message.clone());
            }
            ServerMsg::Joined { id, snapshot } => {
                self.local_id = Some(id.clone());
                self.join_error = None;
                self.apply_snapshot(snapshot);
            }
            ServerMsg::PlayerJoined { player, host_id } => {
                self.players.insert(player.id.clone(), player.clone());
                self.host_id = host_id.clone();
            }
            ServerMsg::PlayerLeft { id, host_id } => {
                self.players.remove(id);
                self.host_id = host_id.clone();
            }
            ServerMsg::PositionUpdate { players, timestamp } => {
                if *timestamp < self.last_position_at {
                    return;
                }
                self.last_position_at = *timestamp;
                for (id, k) in players {
                    if let Some(p) = self.players.get_mut(id) {
                        if !p.is_eliminated {
                            p.position = k.position;
                            p.velocity = k.velocity;
                        }
                    }
                }
            }
            ServerMsg::Countdown { count } => {
                self.phase = Phase::Countdown;
                self.countdown = Some(*count);
            }
            ServerMsg::GameStart { snapshot } => {
                self.apply_snapshot(snapshot);
                self.countdown = None;
                self.clear_round_outcome();
            }
            ServerMsg::PlayerEliminated {
                id, eliminated_by, ..
            } => {
                let newly_eliminated = match self.players.get_mut(id) {
                    Some(p) if !p.is_eliminated => {
                        p.is_eliminated = true;
                        true
                    }
                    _ => false,
                };
                if newly_eliminated {
                    if let Some(hitter) = eliminated_by.as_ref().and_then(|a| self.players.get_mut(&a.id)) {
                        hitter.eliminations += 1;
                    }
                }
            }
            ServerMsg::PlatformWarning {
                is_warning,
                progress,
            } => {
                self.is_warning = *is_warning;
                self.warning_progress = *progress;
            }
            ServerMsg::PlatformShrink { radius } => {
                self.arena_radius = *radius;
            }
            ServerMsg::KonamiActivated { id, .. } => {
                self.konami_by = Some(id.clone());
            }
            ServerMsg::GameEnd { winner, scores } => {
                self.phase = Phase::Ended;
                self.winner = winner.clone();
                self.apply_scores(scores);
            }
            ServerMsg::GameReset { snapshot } => {
                self.apply_snapshot(snapshot);
                self.countdown = None;
                self.scores.clear();
                self.clear_round_outcome();
            }
            ServerMsg::PlayerReady { id, ready } => {
                if let Some(p) = self.players.get_mut(id) {
                    p.is_ready = *ready;
                }
            }
            ServerMsg::ScoreUpdate { scores } => self.apply_scores(scores),
        }
    }

    /// Replace the session wholesale
    fn apply_snapshot(&mut self, snapshot: &GameSnapshot) {
        self.phase = snapshot.phase;
        self.host_id = snapshot.host_id.clone();
        self.arena_radius = snapshot.arena_radius;
        self.players = snapshot
            .players
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        self.last_position_at = snapshot.timestamp;
    }

    fn apply_scores(&mut self, scores: &[ScoreEntry]) {
        for entry in scores {
            if let Some(p) = self.players.get_mut(&entry.id) {
                p.score = entry.score;
                p.eliminations = entry.eliminations;
                p.survival_time = entry.survival_time;
                p.out_of_bounds_time = entry.out_of_bounds_time;
                p.is_eliminated = entry.is_eliminated;
            }
        }
        self.scores = scores.to_vec();
    }

    fn clear_round_outcome(&mut self) {
        self.winner = None;
        self.konami_by = None;
        self.is_warning = false;
        self.warning_progress = 0.0;
    }

    pub fn local_player(&self) -> Option<&PlayerView> {
        self.local_id.as_ref().and_then(|id| self.players.get(id))
    }

    pub fn is_host(&self) -> bool {
        self.local_id.is_some() && self.local_id == self.host_id
    }

    /// True while our own participant is in a running match and still standing
    pub fn is_local_alive_in_play(&self) -> bool {
        self.phase == Phase::Playing && self.local_player().is_some_and(|p| !p.is_eliminated)
    }

    /// Alive participants other than ourselves
    pub fn remote_players(&self) -> impl Iterator<Item = &PlayerView> {
        let local = self.local_id.as_deref();
        self.players
            .values()
            .filter(move |p| Some(p.id.as_str()) != local && !p.is_eliminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{Attribution, EliminationReason, Kinematics, Vec3};

    fn player(id: &str) -> PlayerView {
        PlayerView {
            id: id.to_string(),
            name: id.to_lowercase(),
            color: "#ff4d4d".into(),
            position: Vec3::new(2.0, 1.0, 0.0),
            velocity: Vec3::ZERO,
            is_eliminated: false,
            is_ready: false,
            is_out_of_bounds: false,
            score: 0,
            eliminations: 0,
            survival_time: 0.0,
            out_of_bounds_time: 0.0,
        }
    }

    fn snapshot(phase: Phase, ids: &[&str], timestamp: u64) -> GameSnapshot {
        GameSnapshot {
            phase,
            host_id: ids.first().map(|s| s.to_string()),
            arena_radius: 10.0,
            players: ids.iter().map(|id| player(id)).collect(),
            timestamp,
        }
    }

    fn positions(timestamp: u64, entries: &[(&str, Vec3)]) -> ServerMsg {
        ServerMsg::PositionUpdate {
            players: entries
                .iter()
                .map(|(id, pos)| {
                    (
                        id.to_string(),
                        Kinematics {
                            position: *pos,
                            velocity: Vec3::ZERO,
                        },
                    )
                })
                .collect(),
            timestamp,
        }
    }

    fn joined_view(ids: &[&str]) -> ViewState {
        let mut view = ViewState::new();
        view.apply(&ServerMsg::Joined {
            id: ids[0].to_string(),
            snapshot: snapshot(Phase::Playing, ids, 100),
        });
        view
    }

    #[test]
    fn snapshots_are_idempotent() {
        let msg = ServerMsg::Joined {
            id: "A".into(),
            snapshot: snapshot(Phase::Lobby, &["A", "B"], 100),
        };
        let mut once = ViewState::new();
        once.apply(&msg);
        let mut twice = ViewState::new();
        twice.apply(&msg);
        twice.apply(&msg);

        assert_eq!(once.players, twice.players);
        assert_eq!(twice.local_id.as_deref(), Some("A"));
        assert!(twice.is_host());
        assert_eq!(twice.players.len(), 2);
    }

    #[test]
    fn stale_position_updates_are_ignored() {
        let mut view = joined_view(&["A", "B"]);
        view.apply(&positions(200, &[("B", Vec3::new(5.0, 1.0, 0.0))]));
        view.apply(&positions(150, &[("B", Vec3::new(-5.0, 1.0, 0.0))]));
        assert_eq!(view.players["B"].position, Vec3::new(5.0, 1.0, 0.0));
        assert_eq!(view.last_position_at, 200);
    }

    #[test]
    fn eliminated_and_unknown_ids_do_not_move() {
        let mut view = joined_view(&["A", "B"]);
        view.apply(&ServerMsg::PlayerEliminated {
            id: "B".into(),
            name: "b".into(),
            reason: EliminationReason::Boundary,
            eliminated_by: None,
        });
        view.apply(&positions(
            200,
            &[("B", Vec3::new(9.0, 1.0, 0.0)), ("ghost", Vec3::ZERO)],
        ));
        assert_eq!(view.players["B"].position, Vec3::new(2.0, 1.0, 0.0));
        assert!(!view.players.contains_key("ghost"));
    }

    #[test]
    fn repeated_elimination_credits_once() {
        let mut view = joined_view(&["A", "B"]);
        let msg = ServerMsg::PlayerEliminated {
            id: "B".into(),
            name: "b".into(),
            reason: EliminationReason::Pushed,
            eliminated_by: Some(Attribution {
                id: "A".into(),
                name: "a".into(),
            }),
        };
        view.apply(&msg);
        view.apply(&msg);
        assert_eq!(view.players["A"].eliminations, 1);
        assert_eq!(view.remote_players().count(), 0);
        assert!(view.is_local_alive_in_play());
    }

    #[test]
    fn roster_changes_track_host() {
        let mut view = joined_view(&["A", "B"]);
        view.apply(&ServerMsg::PlayerJoined {
            player: player("C"),
            host_id: Some("A".into()),
        });
        view.apply(&ServerMsg::PlayerLeft {
            id: "A".into(),
            host_id: Some("B".into()),
        });
        assert_eq!(view.host_id.as_deref(), Some("B"));
        assert!(!view.is_host());
        assert!(view.local_player().is_none());
        assert_eq!(view.players.len(), 2);
    }

    #[test]
    fn game_end_then_reset_clears_outcome() {
        let mut view = joined_view(&["A", "B"]);
        view.apply(&ServerMsg::KonamiActivated {
            id: "A".into(),
            name: "a".into(),
            color: "#ff4d4d".into(),
        });
        view.apply(&ServerMsg::GameEnd {
            winner: Some(player("A")),
            scores: vec![],
        });
        assert_eq!(view.phase, Phase::Ended);
        assert!(!view.is_local_alive_in_play());
        assert_eq!(view.konami_by.as_deref(), Some("A"));

        view.apply(&ServerMsg::GameReset {
            snapshot: snapshot(Phase::Lobby, &["A", "B"], 300),
        });
        assert_eq!(view.phase, Phase::Lobby);
        assert!(view.winner.is_none());
        assert!(view.konami_by.is_none());
        assert_eq!(view.last_position_at, 300);
    }

    #[test]
    fn score_updates_refresh_player_records() {
        let mut view = joined_view(&["A", "B"]);
        let entry = ScoreEntry {
            id: "B".into(),
            name: "b".into(),
            color: "#4da6ff".into(),
            score: 215,
            eliminations: 2,
            survival_time: 45.3,
            out_of_bounds_time: 3.0,
            is_eliminated: false,
        };
        view.apply(&ServerMsg::ScoreUpdate {
            scores: vec![entry.clone()],
        });
        assert_eq!(view.players["B"].score, 215);
        assert_eq!(view.players["B"].eliminations, 2);
        assert_eq!(view.scores, vec![entry]);
    }
}
