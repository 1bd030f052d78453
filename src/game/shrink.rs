//! Arena shrink schedule and warning change detection

use crate::config::GameConfig;

/// Whether a shrink is imminent and how far into the warning window we are (0..=1)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WarningState {
    pub is_warning: bool,
    pub progress: f32,
}

/// True once a full interval has passed since the last shrink and there is room to shrink
pub fn should_shrink(now: u64, last_shrink_at: u64, radius: f32, config: &GameConfig) -> bool {
    radius > config.min_arena_radius
        && now.saturating_sub(last_shrink_at) >= config.shrink_interval_ms
}

/// Radius after one shrink step
pub fn next_radius(radius: f32, config: &GameConfig) -> f32 {
    (radius - config.shrink_step).max(config.min_arena_radius)
}

pub fn warning_state(now: u64, last_shrink_at: u64, radius: f32, config: &GameConfig) -> WarningState {
    if radius <= config.min_arena_radius || config.shrink_warning_ms == 0 {
        return WarningState::default();
    }

    let elapsed = now.saturating_sub(last_shrink_at);
    let until_shrink = config.shrink_interval_ms.saturating_sub(elapsed);
    if until_shrink > config.shrink_warning_ms {
        return WarningState::default();
    }

    let progress = 1.0 - until_shrink as f32 / config.shrink_warning_ms as f32;
    WarningState {
        is_warning: true,
        progress: progress.clamp(0.0, 1.0),
    }
}

/// Remembers the last broadcast warning so only meaningful changes go out
#[derive(Debug, Default)]
pub struct WarningTracker {
    last_sent: WarningState,
}

impl WarningTracker {
    /// Returns the state to broadcast, if it differs enough from the last one sent
    pub fn update(&mut self, next: WarningState, threshold: f32) -> Option<WarningState> {
        let flipped = next.is_warning != self.last_sent.is_warning;
        let moved = (next.progress - self.last_sent.progress).abs() > threshold;
        if flipped || (next.is_warning && moved) {
            self.last_sent = next;
            Some(next)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.last_sent = WarningState::default();
    }
}
