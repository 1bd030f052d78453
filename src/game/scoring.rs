//! Score formula and live time accounting

use crate::config::GameConfig;
use crate::util::time::secs_between;

use super::participant::Participant;

/// Score inputs and result for one participant at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub survival_secs: f64,
    pub out_of_bounds_secs: f64,
    pub score: f64,
}

impl ScoreBreakdown {
    pub fn display_score(&self) -> u32 {
        self.score.round() as u32
    }
}

/// `max(0, eliminations*100 + survival - out_of_bounds*10)` with the configured weights
pub fn compute_score(
    eliminations: u32,
    survival_secs: f64,
    out_of_bounds_secs: f64,
    config: &GameConfig,
) -> f64 {
    let raw = f64::from(eliminations) * config.score_per_elimination
        + survival_secs * config.score_per_survival_sec
        - out_of_bounds_secs * config.penalty_per_out_of_bounds_sec;
    raw.max(0.0)
}

/// Survival seconds including the in-progress interval.
///
/// `running_since` is the match start while the match is being played, `None` otherwise.
/// Survival only advances for participants that are alive and currently in bounds.
pub fn live_survival_secs(p: &Participant, now: u64, running_since: Option<u64>) -> f64 {
    match running_since {
        Some(started) if !p.is_eliminated && !p.is_out_of_bounds => secs_between(started, now),
        _ => p.survival_time,
    }
}

/// Out-of-bounds seconds including the excursion in progress
pub fn live_out_of_bounds_secs(p: &Participant, now: u64) -> f64 {
    let current = p
        .out_of_bounds_since
        .map(|since| secs_between(since, now))
        .unwrap_or(0.0);
    p.out_of_bounds_time + current
}

/// Fold live intervals into the stored totals and freeze the score.
/// Call before the participant is flagged eliminated and before the phase leaves `Playing`.
pub fn finalize(p: &mut Participant, now: u64, running_since: Option<u64>, config: &GameConfig) {
    p.survival_time = live_survival_secs(p, now, running_since);
    p.out_of_bounds_time = live_out_of_bounds_secs(p, now);
    p.out_of_bounds_since = None;
    p.is_out_of_bounds = false;
    p.final_score = Some(compute_score(
        p.eliminations,
        p.survival_time,
        p.out_of_bounds_time,
        config,
    ));
}

/// Score a participant as of `now`. Eliminated participants report their finalized score.
pub fn breakdown(
    p: &Participant,
    now: u64,
    running_since: Option<u64>,
    config: &GameConfig,
) -> ScoreBreakdown {
    if let Some(score) = p.final_score {
        return ScoreBreakdown {
            survival_secs: p.survival_time,
            out_of_bounds_secs: p.out_of_bounds_time,
            score,
        };
    }

    let survival_secs = live_survival_secs(p, now, running_since);
    let out_of_bounds_secs = live_out_of_bounds_secs(p, now);
    ScoreBreakdown {
        survival_secs,
        out_of_bounds_secs,
        score: compute_score(p.eliminations, survival_secs, out_of_bounds_secs, config),
    }
}
