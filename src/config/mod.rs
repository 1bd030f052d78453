//! Configuration module - environment variable parsing and gameplay constants

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Directory holding the built client bundle, served as a fallback route
    pub static_dir: Option<PathBuf>,
    /// Allowed client origins for CORS (comma-separated); permissive when unset
    pub client_origin: Option<String>,
    /// Gameplay tuning
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let mut game = GameConfig::default();
        if let Ok(raw) = env::var("MAX_PLAYERS") {
            game.max_players = raw
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("MAX_PLAYERS"))?;
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            static_dir: env::var("STATIC_DIR").ok().map(PathBuf::from),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            game,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

/// Gameplay constants. Durations are milliseconds, distances are world units.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Match scheduler rate
    pub tick_rate_hz: u32,
    /// Score broadcast rate
    pub score_rate_hz: u32,
    /// Participant cap enforced at join
    pub max_players: usize,
    /// Countdown length before play starts
    pub countdown_secs: u32,

    pub initial_arena_radius: f32,
    pub min_arena_radius: f32,
    pub shrink_interval_ms: u64,
    pub shrink_step: f32,
    /// Warning lead time before each shrink
    pub shrink_warning_ms: u64,
    /// Minimum progress delta that re-broadcasts an active warning
    pub warning_progress_threshold: f32,

    /// Cumulative out-of-bounds time that eliminates
    pub out_of_bounds_limit_ms: u64,
    /// Planar slack beyond the arena radius before a participant counts as out of bounds
    pub boundary_margin: f32,
    /// Vertical position below which a participant counts as out of bounds
    pub boundary_floor_y: f32,
    /// Vertical position below which a participant is eliminated immediately
    pub fall_threshold_y: f32,
    /// A recorded hit credits the hitter only if the elimination lands within this window
    pub attribution_window_ms: u64,

    pub spawn_ring_min: f32,
    pub spawn_ring_max: f32,
    pub spawn_height: f32,

    pub score_per_elimination: f64,
    pub score_per_survival_sec: f64,
    pub penalty_per_out_of_bounds_sec: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            score_rate_hz: 1,
            max_players: 40,
            countdown_secs: 3,
            initial_arena_radius: 10.0,
            min_arena_radius: 4.0,
            shrink_interval_ms: 30_000,
            shrink_step: 2.0,
            shrink_warning_ms: 5_000,
            warning_progress_threshold: 0.1,
            out_of_bounds_limit_ms: 10_000,
            boundary_margin: 1.0,
            boundary_floor_y: -1.0,
            fall_threshold_y: -5.0,
            attribution_window_ms: 3_000,
            spawn_ring_min: 2.0,
            spawn_ring_max: 5.0,
            spawn_height: 1.0,
            score_per_elimination: 100.0,
            score_per_survival_sec: 1.0,
            penalty_per_out_of_bounds_sec: 10.0,
        }
    }
}

impl GameConfig {
    pub fn tick_period(&self) -> Duration {
        crate::util::time::period_for_rate(self.tick_rate_hz)
    }

    pub fn score_period(&self) -> Duration {
        crate::util::time::period_for_rate(self.score_rate_hz)
    }
}
