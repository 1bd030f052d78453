//! Remote entity smoothing
//!
//! Server position updates arrive at 20 Hz while rendering runs much faster. Each remote
//! participant keeps a displayed position that decays toward a velocity-extrapolated target
//! with `1 - e^(-k*dt)`, so convergence speed does not depend on frame rate.

use std::collections::HashMap;

use crate::ws::protocol::Vec3;

use super::view::ViewState;

#[derive(Debug, Clone, Copy)]
pub struct InterpolationConfig {
    /// Decay rate `k` per second
    pub smoothing: f32,
    /// Seconds of velocity to lead the target by
    pub prediction_factor: f32,
    /// Error beyond which the entity jumps straight to its target
    pub snap_distance: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            smoothing: 12.0,
            prediction_factor: 0.05,
            snap_distance: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteEntity {
    /// What gets drawn
    pub position: Vec3,
    target: Vec3,
    velocity: Vec3,
}

impl RemoteEntity {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            target: position,
            velocity,
        }
    }

    pub fn set_target(&mut self, target: Vec3, velocity: Vec3, config: &InterpolationConfig) {
        self.target = target;
        self.velocity = velocity;
        if (target - self.position).length() > config.snap_distance {
            self.position = target;
        }
    }

    /// Move toward the extrapolated target by one frame of `dt` seconds
    pub fn advance(&mut self, dt: f32, config: &InterpolationConfig) -> Vec3 {
        if dt <= 0.0 {
            return self.position;
        }
        let goal = self.target + self.velocity * config.prediction_factor;
        let alpha = 1.0 - (-config.smoothing * dt).exp();
        self.position += (goal - self.position) * alpha;
        self.position
    }
}

/// One `RemoteEntity` per remote participant still in play
#[derive(Debug, Default)]
pub struct Interpolators {
    config: InterpolationConfig,
    entities: HashMap<String, RemoteEntity>,
}

impl Interpolators {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            entities: HashMap::new(),
        }
    }

    /// Pull fresh targets from the view. New participants appear at their reported
    /// position; departed or eliminated ones are dropped.
    pub fn sync(&mut self, view: &ViewState) {
        let config = self.config;
        let mut seen = Vec::new();
        for p in view.remote_players() {
            self.entities
                .entry(p.id.clone())
                .and_modify(|e| e.set_target(p.position, p.velocity, &config))
                .or_insert_with(|| RemoteEntity::new(p.position, p.velocity));
            seen.push(p.id.as_str());
        }
        self.entities.retain(|id, _| seen.contains(&id.as_str()));
    }

    pub fn advance(&mut self, dt: f32) {
        let config = self.config;
        for entity in self.entities.values_mut() {
            entity.advance(dt, &config);
        }
    }

    pub fn position(&self, id: &str) -> Option<Vec3> {
        self.entities.get(id).map(|e| e.position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec3)> {
        self.entities.iter().map(|(id, e)| (id.as_str(), e.position))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
