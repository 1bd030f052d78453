//! Participant record (authoritative)

use crate::ws::protocol::{PlayerView, ScoreEntry, Vec3};

use super::scoring::ScoreBreakdown;

/// Colors handed out round-robin as participants join
pub const PALETTE: [&str; 12] = [
    "#ff4d4d", "#4da6ff", "#5cd65c", "#ffcc33", "#b366ff", "#ff8c1a", "#33cccc", "#ff66b3",
    "#99e600", "#8080ff", "#e6e6e6", "#cc9966",
];

pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// The most recent contact that could earn someone credit for an elimination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRecord {
    pub hitter_id: String,
    pub hitter_name: String,
    /// Unix millis of the contact
    pub at: u64,
}

/// One connected player. Reused across rounds; only destroyed on disconnect.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub color_index: usize,

    // Kinematics, as last reported by the owning client
    pub position: Vec3,
    pub velocity: Vec3,
    pub last_update: u64,

    // Lifecycle
    pub is_eliminated: bool,
    pub is_ready: bool,
    pub eliminated_at: Option<u64>,

    // Scoring
    pub eliminations: u32,
    /// Seconds in bounds since match start, refreshed every tick
    pub survival_time: f64,
    /// Seconds across completed out-of-bounds excursions
    pub out_of_bounds_time: f64,
    pub is_out_of_bounds: bool,
    /// Start of the excursion in progress
    pub out_of_bounds_since: Option<u64>,
    pub last_hit_by: Option<HitRecord>,
    /// Set exactly once, at elimination
    pub final_score: Option<f64>,

    // Join metadata, ordered by (joined_at, join_seq) for host succession
    pub joined_at: u64,
    pub join_seq: u64,
}

impl Participant {
    pub fn new(
        id: String,
        name: String,
        color_index: usize,
        spawn: Vec3,
        joined_at: u64,
        join_seq: u64,
    ) -> Self {
        Self {
            id,
            name,
            color_index,
            position: spawn,
            velocity: Vec3::ZERO,
            last_update: joined_at,
            is_eliminated: false,
            is_ready: false,
            eliminated_at: None,
            eliminations: 0,
            survival_time: 0.0,
            out_of_bounds_time: 0.0,
            is_out_of_bounds: false,
            out_of_bounds_since: None,
            last_hit_by: None,
            final_score: None,
            joined_at,
            join_seq,
        }
    }

    /// Clear every per-round field in place and move to a fresh spawn point
    pub fn reset_for_round(&mut self, spawn: Vec3, now: u64) {
        self.position = spawn;
        self.velocity = Vec3::ZERO;
        self.last_update = now;
        self.is_eliminated = false;
        self.is_ready = false;
        self.eliminated_at = None;
        self.eliminations = 0;
        self.survival_time = 0.0;
        self.out_of_bounds_time = 0.0;
        self.is_out_of_bounds = false;
        self.out_of_bounds_since = None;
        self.last_hit_by = None;
        self.final_score = None;
    }

    pub fn color(&self) -> &'static str {
        palette_color(self.color_index)
    }

    /// Sort key for "earliest joined"
    pub fn join_key(&self) -> (u64, u64) {
        (self.joined_at, self.join_seq)
    }

    pub fn view(&self, breakdown: &ScoreBreakdown) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color().to_string(),
            position: self.position,
            velocity: self.velocity,
            is_eliminated: self.is_eliminated,
            is_ready: self.is_ready,
            is_out_of_bounds: self.is_out_of_bounds,
            score: breakdown.display_score(),
            eliminations: self.eliminations,
            survival_time: breakdown.survival_secs,
            out_of_bounds_time: breakdown.out_of_bounds_secs,
        }
    }

    pub fn score_entry(&self, breakdown: &ScoreBreakdown) -> ScoreEntry {
        ScoreEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color().to_string(),
            score: breakdown.display_score(),
            eliminations: self.eliminations,
            survival_time: breakdown.survival_secs,
            out_of_bounds_time: breakdown.out_of_bounds_secs,
            is_eliminated: self.is_eliminated,
        }
    }
}

/// Trim, strip control characters and cap a requested display name
pub fn sanitize_name(raw: &str, fallback_index: usize) -> String {
    const MAX_NAME_CHARS: usize = 16;

    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();

    if cleaned.is_empty() {
        format!("Player {}", fallback_index)
    } else {
        cleaned
    }
}
