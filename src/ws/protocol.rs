//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A point or direction in world space. `y` is the vertical axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance from the vertical axis through the arena center
    pub fn planar_length(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Coarse match state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Waiting for the host to start
    #[default]
    Lobby,
    /// Counting down to play
    Countdown,
    /// Match in progress
    Playing,
    /// Match over, waiting for the host to play again
    Ended,
}

/// Why a participant left play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EliminationReason {
    /// Spent too long outside the arena
    Boundary,
    /// Fell off the platform
    Pushed,
    /// Removed by another participant's cheat code
    Konami,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Request a seat in the session
    Join {
        #[serde(default)]
        name: String,
    },

    /// Self-reported kinematic sample from the local physics simulator
    Input { position: Vec3, velocity: Vec3 },

    /// The sender was hit by another participant
    Collision { other_id: String },

    /// Host asks to begin the countdown
    StartGame,

    /// Toggle the lobby ready flag
    Ready { ready: bool },

    KonamiCode,

    /// Host asks to reset after a match has ended
    PlayAgain,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Current roster size and capacity
    PlayerCount { count: usize, max: usize },

    /// Join refused (sent to the requester only)
    JoinError { message: String },

    /// Join accepted (sent to the requester only)
    Joined { id: String, snapshot: GameSnapshot },

    PlayerJoined {
        player: PlayerView,
        host_id: Option<String>,
    },

    PlayerLeft {
        id: String,
        host_id: Option<String>,
    },

    /// Alive participants only, sent every tick while playing
    PositionUpdate {
        players: HashMap<String, Kinematics>,
        timestamp: u64,
    },

    Countdown { count: u32 },

    GameStart { snapshot: GameSnapshot },

    PlayerEliminated {
        id: String,
        name: String,
        reason: EliminationReason,
        eliminated_by: Option<Attribution>,
    },

    /// Only sent when the warning state changes
    PlatformWarning { is_warning: bool, progress: f32 },

    PlatformShrink { radius: f32 },

    KonamiActivated {
        id: String,
        name: String,
        color: String,
    },

    GameEnd {
        winner: Option<PlayerView>,
        scores: Vec<ScoreEntry>,
    },

    GameReset { snapshot: GameSnapshot },

    PlayerReady { id: String, ready: bool },

    /// Sorted by score, highest first
    ScoreUpdate { scores: Vec<ScoreEntry> },
}

/// Full point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub phase: Phase,
    pub host_id: Option<String>,
    pub arena_radius: f32,
    pub players: Vec<PlayerView>,
    pub timestamp: u64,
}

/// Participant as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    /// Hex color from the shared palette
    pub color: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub is_eliminated: bool,
    pub is_ready: bool,
    pub is_out_of_bounds: bool,
    pub score: u32,
    pub eliminations: u32,
    /// Seconds
    pub survival_time: f64,
    /// Seconds
    pub out_of_bounds_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Who gets credit for an elimination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Rounded for display
    pub score: u32,
    pub eliminations: u32,
    pub survival_time: f64,
    pub out_of_bounds_time: f64,
    pub is_eliminated: bool,
}
