//! Mobility models driving the simulated devices.
//!
//! - [`RandomWaypoint`]: nodes travel between uniformly drawn waypoints
//! - [`FixedPositions`]: nodes never move (edge-case scenarios)
//!
//! One call to `step` is one second of simulated time.

use crate::error::{Result, SimError};
use agglo_env::MobilityModel;
use nalgebra::Vector2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};

/// Seconds advanced by one step.
pub const STEP_SECS: f64 = 1.0;

/// State of one waypoint node.
#[derive(Debug, Clone)]
struct WaypointNode {
    position: Vector2<f64>,
    target: Vector2<f64>,
    speed: f64,
    pause_left: f64,
}

/// Random waypoint mobility over a `width x height` area.
///
/// Each node picks a uniform waypoint and a uniform speed in
/// `velocity = (min, max)`, travels there in a straight line, then pauses
/// for a uniform time in `[0, max_pause]` before picking the next one.
pub struct RandomWaypoint {
    nodes: Vec<WaypointNode>,
    dimensions: (f64, f64),
    x_dist: Uniform<f64>,
    y_dist: Uniform<f64>,
    speed_dist: Uniform<f64>,
    pause_dist: Uniform<f64>,
    rng: ChaCha8Rng,
}

impl RandomWaypoint {
    /// Creates the model with every node at a uniform start position.
    pub fn new(
        node_count: usize,
        dimensions: (f64, f64),
        velocity: (f64, f64),
        max_pause: f64,
        seed: u64,
    ) -> Result<Self> {
        let (width, height) = dimensions;
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(SimError::config(format!(
                "mobility area must be positive, got {} x {}",
                width, height
            )));
        }
        let (v_min, v_max) = velocity;
        if !(v_min.is_finite() && v_max.is_finite()) || v_min <= 0.0 || v_min > v_max {
            return Err(SimError::config(format!(
                "velocity range must satisfy 0 < min <= max, got ({}, {})",
                v_min, v_max
            )));
        }
        if !max_pause.is_finite() || max_pause < 0.0 {
            return Err(SimError::config(format!("invalid max pause {}", max_pause)));
        }

        let mut model = Self {
            nodes: Vec::with_capacity(node_count),
            dimensions,
            x_dist: Uniform::new(0.0, width),
            y_dist: Uniform::new(0.0, height),
            speed_dist: Uniform::new_inclusive(v_min, v_max),
            pause_dist: Uniform::new_inclusive(0.0, max_pause),
            rng: ChaCha8Rng::seed_from_u64(seed),
        };

        for _ in 0..node_count {
            let position = model.random_point();
            let target = model.random_point();
            let speed = model.speed_dist.sample(&mut model.rng);
            model.nodes.push(WaypointNode {
                position,
                target,
                speed,
                pause_left: 0.0,
            });
        }

        Ok(model)
    }

    fn random_point(&mut self) -> Vector2<f64> {
        Vector2::new(self.x_dist.sample(&mut self.rng), self.y_dist.sample(&mut self.rng))
    }

    fn advance(&mut self, index: usize, dt: f64) {
        let mut time_left = dt;

        while time_left > 0.0 {
            let node = &mut self.nodes[index];

            if node.pause_left > 0.0 {
                let paused = node.pause_left.min(time_left);
                node.pause_left -= paused;
                time_left -= paused;
                continue;
            }

            let offset = node.target - node.position;
            let distance = offset.norm();
            let reach = node.speed * time_left;

            if reach < distance {
                node.position += offset * (reach / distance);
                return;
            }

            // Arrived: pause, then head for a fresh waypoint
            node.position = node.target;
            time_left -= distance / node.speed;
            node.pause_left = self.pause_dist.sample(&mut self.rng);

            let target = self.random_point();
            let speed = self.speed_dist.sample(&mut self.rng);
            let node = &mut self.nodes[index];
            node.target = target;
            node.speed = speed;

            // Zero-length legs with no pause would never consume time
            if node.pause_left == 0.0 && target == node.position {
                return;
            }
        }
    }
}

impl MobilityModel for RandomWaypoint {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn dimensions(&self) -> (f64, f64) {
        self.dimensions
    }

    fn step(&mut self) -> Vec<[f64; 2]> {
        for index in 0..self.nodes.len() {
            self.advance(index, STEP_SECS);
        }
        self.nodes
            .iter()
            .map(|n| [n.position.x, n.position.y])
            .collect()
    }
}

/// Nodes pinned to fixed positions.
#[derive(Debug, Clone)]
pub struct FixedPositions {
    positions: Vec<[f64; 2]>,
    dimensions: (f64, f64),
}

impl FixedPositions {
    pub fn new(positions: Vec<[f64; 2]>, dimensions: (f64, f64)) -> Self {
        Self {
            positions,
            dimensions,
        }
    }
}

impl MobilityModel for FixedPositions {
    fn node_count(&self) -> usize {
        self.positions.len()
    }

    fn dimensions(&self) -> (f64, f64) {
        self.dimensions
    }

    fn step(&mut self) -> Vec<[f64; 2]> {
        self.positions.clone()
    }
}
