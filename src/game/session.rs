//! Session store - the single source of truth for participants and match state
//!
//! Pure state and queries, no I/O. Owned by the match scheduler task; every mutation
//! takes the caller's notion of `now` (Unix millis) so behavior is reproducible in tests.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::GameConfig;
use crate::ws::protocol::{GameSnapshot, Kinematics, Phase, PlayerView, ScoreEntry, Vec3};

use super::participant::{Participant, PALETTE};
use super::scoring::{self, ScoreBreakdown};

pub struct SessionStore {
    config: GameConfig,
    participants: HashMap<String, Participant>,
    phase: Phase,
    host_id: Option<String>,
    arena_radius: f32,
    match_started_at: Option<u64>,
    last_shrink_at: Option<u64>,
    next_join_seq: u64,
    rng: ChaCha8Rng,
}

impl SessionStore {
    pub fn new(config: GameConfig, seed: u64) -> Self {
        let arena_radius = config.initial_arena_radius;
        Self {
            config,
            participants: HashMap::new(),
            phase: Phase::Lobby,
            host_id: None,
            arena_radius,
            match_started_at: None,
            last_shrink_at: None,
            next_join_seq: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a participant. Capacity is enforced by the caller.
    pub fn add_participant(&mut self, id: &str, name: &str, now: u64) -> &Participant {
        let color_index = self.participants.len() % PALETTE.len();
        let spawn = self.spawn_point();
        let join_seq = self.next_join_seq;
        self.next_join_seq += 1;

        let participant = Participant::new(
            id.to_string(),
            name.to_string(),
            color_index,
            spawn,
            now,
            join_seq,
        );
        self.participants.insert(id.to_string(), participant);

        if self.host_id.is_none() {
            self.host_id = Some(id.to_string());
            info!(participant_id = %id, "Host assigned");
        }

        &self.participants[id]
    }

    /// Remove a participant, handing host to the earliest-joined survivor if needed
    pub fn remove_participant(&mut self, id: &str) -> Option<Participant> {
        let removed = self.participants.remove(id)?;

        if self.host_id.as_deref() == Some(id) {
            self.host_id = self
                .participants
                .values()
                .min_by_key(|p| p.join_key())
                .map(|p| p.id.clone());
            info!(
                departed = %id,
                new_host = ?self.host_id,
                "Host reassigned"
            );
        }

        Some(removed)
    }

    pub fn set_phase(&mut self, phase: Phase, now: u64) {
        if phase == Phase::Playing {
            self.match_started_at = Some(now);
            self.last_shrink_at = Some(now);
        }
        info!(from = ?self.phase, to = ?phase, "Phase change");
        self.phase = phase;
    }

    /// Overwrite a participant's kinematics. Returns false (and changes nothing) when the
    /// participant is unknown or eliminated.
    pub fn update_kinematics(&mut self, id: &str, position: Vec3, velocity: Vec3, now: u64) -> bool {
        match self.participants.get_mut(id) {
            Some(p) if !p.is_eliminated => {
                p.position = position;
                p.velocity = velocity;
                p.last_update = now;
                true
            }
            _ => false,
        }
    }

    /// Shrink the arena, never below the configured minimum. Returns the applied radius.
    pub fn shrink_arena(&mut self, new_radius: f32, now: u64) -> f32 {
        self.arena_radius = new_radius.max(self.config.min_arena_radius);
        self.last_shrink_at = Some(now);
        self.arena_radius
    }

    pub fn set_ready(&mut self, id: &str, ready: bool) -> bool {
        match self.participants.get_mut(id) {
            Some(p) => {
                p.is_ready = ready;
                true
            }
            None => false,
        }
    }

    /// Back to the lobby with every participant kept, respawned and zeroed
    pub fn reset_for_new_round(&mut self, now: u64) {
        self.phase = Phase::Lobby;
        self.arena_radius = self.config.initial_arena_radius;
        self.match_started_at = None;
        self.last_shrink_at = None;

        let ids: Vec<String> = self.participants.keys().cloned().collect();
        for id in ids {
            let spawn = self.spawn_point();
            if let Some(p) = self.participants.get_mut(&id) {
                p.reset_for_round(spawn, now);
            }
        }
        info!(participants = self.participants.len(), "Round reset");
    }

    pub fn participant_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.get_mut(id)
    }

    /// Mutable access to two distinct participants at once
    pub fn pair_mut(&mut self, a: &str, b: &str) -> Option<(&mut Participant, &mut Participant)> {
        if a == b {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (id, p) in self.participants.iter_mut() {
            if id == a {
                first = Some(p);
            } else if id == b {
                second = Some(p);
            }
        }
        Some((first?, second?))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host_id.as_deref() == Some(id)
    }

    pub fn arena_radius(&self) -> f32 {
        self.arena_radius
    }

    pub fn match_started_at(&self) -> Option<u64> {
        self.match_started_at
    }

    pub fn last_shrink_at(&self) -> Option<u64> {
        self.last_shrink_at
    }

    /// Match start, only while the match is being played
    pub fn running_since(&self) -> Option<u64> {
        match self.phase {
            Phase::Playing => self.match_started_at,
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.config.max_players
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Alive participant ids in join order
    pub fn alive_ids(&self) -> Vec<String> {
        let mut alive: Vec<&Participant> = self
            .participants
            .values()
            .filter(|p| !p.is_eliminated)
            .collect();
        alive.sort_by_key(|p| p.join_key());
        alive.into_iter().map(|p| p.id.clone()).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.participants.values().filter(|p| !p.is_eliminated).count()
    }

    pub fn breakdown(&self, p: &Participant, now: u64) -> ScoreBreakdown {
        scoring::breakdown(p, now, self.running_since(), &self.config)
    }

    pub fn view(&self, id: &str, now: u64) -> Option<PlayerView> {
        self.participants
            .get(id)
            .map(|p| p.view(&self.breakdown(p, now)))
    }

    /// Everything a client needs to rebuild its view, roster in join order
    pub fn snapshot(&self, now: u64) -> GameSnapshot {
        let mut ordered: Vec<&Participant> = self.participants.values().collect();
        ordered.sort_by_key(|p| p.join_key());

        GameSnapshot {
            phase: self.phase,
            host_id: self.host_id.clone(),
            arena_radius: self.arena_radius,
            players: ordered
                .into_iter()
                .map(|p| p.view(&self.breakdown(p, now)))
                .collect(),
            timestamp: now,
        }
    }

    /// Positions and velocities of alive participants only
    pub fn position_snapshot(&self) -> HashMap<String, Kinematics> {
        self.participants
            .values()
            .filter(|p| !p.is_eliminated)
            .map(|p| {
                (
                    p.id.clone(),
                    Kinematics {
                        position: p.position,
                        velocity: p.velocity,
                    },
                )
            })
            .collect()
    }

    /// Scores recomputed as of `now`, highest first
    pub fn score_snapshot(&self, now: u64) -> Vec<ScoreEntry> {
        let mut scored: Vec<(f64, ScoreEntry)> = self
            .participants
            .values()
            .map(|p| {
                let b = self.breakdown(p, now);
                (b.score, p.score_entry(&b))
            })
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Random point on the spawn ring around the arena center
    fn spawn_point(&mut self) -> Vec3 {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self
            .rng
            .gen_range(self.config.spawn_ring_min..=self.config.spawn_ring_max);
        Vec3::new(
            angle.cos() * distance,
            self.config.spawn_height,
            angle.sin() * distance,
        )
    }
}
