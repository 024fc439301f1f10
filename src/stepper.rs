//! Fixed-timestep driver.
//!
//! Accumulates wall-clock time and advances the world in fixed increments,
//! so simulation behavior is independent of frame rate. When a frame arrives
//! late enough that the backlog exceeds the catch-up cap, the excess time is
//! dropped: the simulation slows down rather than spiraling.

use tracing::warn;

use crate::world::World;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the fixed-timestep driver.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepperConfig {
    /// Fixed timestep in seconds.
    pub dt: f64,
    /// Maximum steps run per call to `advance`.
    pub max_catch_up_steps: u32,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            max_catch_up_steps: 5,
        }
    }
}

/// Accumulator-based fixed-timestep driver.
#[derive(Debug, Clone)]
pub struct Stepper {
    config: StepperConfig,
    accumulator: f64,
}

impl Stepper {
    /// Create a stepper with the given configuration.
    #[must_use]
    pub const fn new(config: StepperConfig) -> Self {
        Self {
            config,
            accumulator: 0.0,
        }
    }

    /// The fixed timestep.
    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.config.dt
    }

    /// Feed elapsed wall-clock time and run as many fixed steps as it covers,
    /// up to the catch-up cap. Returns the number of steps run. Backlog
    /// beyond the cap is discarded.
    pub fn advance(&mut self, world: &mut World, elapsed: f64) -> u32 {
        self.accumulator += elapsed.max(0.0);

        let mut steps = 0;
        while self.accumulator >= self.config.dt && steps < self.config.max_catch_up_steps {
            world.step(self.config.dt);
            self.accumulator -= self.config.dt;
            steps += 1;
        }

        if self.accumulator >= self.config.dt {
            warn!(
                backlog = self.accumulator,
                steps, "dropping simulation backlog"
            );
            self.accumulator = 0.0;
        }

        steps
    }

    /// Discard any accumulated time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new(StepperConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::lattice::Lattice;
    use nalgebra::Point2;

    fn world() -> World {
        let lattice = Lattice::ring(Point2::origin(), 6, 10.0, 1.0, false).unwrap();
        World::new(lattice, SimConfig::default()).unwrap()
    }

    #[test]
    fn test_sub_dt_elapsed_runs_nothing() {
        let mut stepper = Stepper::default();
        let mut w = world();

        assert_eq!(stepper.advance(&mut w, 0.001), 0);
        assert_eq!(w.tick(), 0);
    }

    #[test]
    fn test_accumulates_across_calls() {
        let mut stepper = Stepper::default();
        let mut w = world();

        let half = 1.0 / 120.0;
        assert_eq!(stepper.advance(&mut w, half), 0);
        assert_eq!(stepper.advance(&mut w, half), 1);
        assert_eq!(w.tick(), 1);
    }

    #[test]
    fn test_multiple_steps_per_frame() {
        let mut stepper = Stepper::default();
        let mut w = world();

        let steps = stepper.advance(&mut w, 3.5 / 60.0);
        assert_eq!(steps, 3);
        assert_eq!(w.tick(), 3);
    }

    #[test]
    fn test_catch_up_capped_and_backlog_dropped() {
        let mut stepper = Stepper::default();
        let mut w = world();

        // A full second of backlog is far past the cap
        let steps = stepper.advance(&mut w, 1.0);
        assert_eq!(steps, 5);
        assert_eq!(w.tick(), 5);

        // Dropped backlog must not replay on the next frame
        let steps = stepper.advance(&mut w, 0.0);
        assert_eq!(steps, 0);
    }

    #[test]
    fn test_negative_elapsed_ignored() {
        let mut stepper = Stepper::default();
        let mut w = world();

        assert_eq!(stepper.advance(&mut w, -1.0), 0);
        assert_eq!(w.tick(), 0);
    }
}
