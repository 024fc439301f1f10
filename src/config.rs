//! Top-level simulation configuration.

use nalgebra::Vector2;

use crate::error::{Result, SimError};
use crate::integrator::Boundary;
use crate::mutation::MutationConfig;
use crate::ripple::RippleConfig;
use crate::solver::SolverConfig;
use crate::tear::TearConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the whole simulation.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimConfig {
    /// Gravity acceleration.
    pub gravity: Vector2<f64>,
    /// Velocity damping factor per tick, in `(0, 1]`.
    pub damping: f64,
    /// Maximum distance a particle may travel in one step.
    pub max_step_distance: f64,
    /// Simulation boundary.
    pub boundary: Boundary,
    /// Constraint solver settings.
    pub solver: SolverConfig,
    /// Tear detector settings.
    pub tear: TearConfig,
    /// Ripple field settings.
    pub ripple: RippleConfig,
    /// Mutation system settings.
    pub mutation: MutationConfig,
    /// Per-tick decay factor for particle stress, in `(0, 1)`.
    pub stress_decay: f64,
    /// Per-tick decay factor for stress injected into springs, in `(0, 1)`.
    pub injected_stress_decay: f64,
    /// Smoothing rate for the glow value trailing particle stress.
    pub glow_rate: f64,
    /// Radius of effect for strikes.
    pub strike_radius: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity: Vector2::zeros(),
            damping: 0.98,
            max_step_distance: 30.0,
            boundary: Boundary::None,
            solver: SolverConfig::default(),
            tear: TearConfig::default(),
            ripple: RippleConfig::default(),
            mutation: MutationConfig::default(),
            stress_decay: 0.95,
            injected_stress_decay: 0.9,
            glow_rate: 0.15,
            strike_radius: 60.0,
        }
    }
}

impl SimConfig {
    /// Preset tuned for real-time stepping: fewer solver iterations and a
    /// heavier damping.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            damping: 0.96,
            solver: SolverConfig::realtime(),
            ..Self::default()
        }
    }

    /// Preset tuned for accuracy: more solver iterations, light damping.
    #[must_use]
    pub fn accurate() -> Self {
        Self {
            damping: 0.995,
            solver: SolverConfig::accurate(),
            ..Self::default()
        }
    }

    /// Preset for a soft, stretchy body: heavy damping, few iterations, and
    /// tear thresholds raised so the body deforms long before it ruptures.
    #[must_use]
    pub fn soft() -> Self {
        let mut config = Self {
            damping: 0.9,
            solver: SolverConfig::realtime(),
            ..Self::default()
        };
        config.tear.stress_ratio_threshold = 1.5;
        config.tear.force_per_length_threshold *= 2.0;
        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(SimError::invalid_config(format!(
                "damping must be in (0, 1], got {}",
                self.damping
            )));
        }
        if self.max_step_distance <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "max step distance must be positive, got {}",
                self.max_step_distance
            )));
        }
        if self.solver.iterations == 0 {
            return Err(SimError::invalid_config(
                "solver iterations must be at least 1",
            ));
        }
        if !(self.stress_decay > 0.0 && self.stress_decay < 1.0) {
            return Err(SimError::invalid_config(format!(
                "stress decay must be in (0, 1), got {}",
                self.stress_decay
            )));
        }
        if !(self.injected_stress_decay > 0.0 && self.injected_stress_decay < 1.0) {
            return Err(SimError::invalid_config(format!(
                "injected stress decay must be in (0, 1), got {}",
                self.injected_stress_decay
            )));
        }
        if self.strike_radius <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "strike radius must be positive, got {}",
                self.strike_radius
            )));
        }
        if self.tear.max_tears_per_frame == 0 {
            return Err(SimError::invalid_config(
                "max tears per frame must be at least 1",
            ));
        }
        if !(self.ripple.decay > 0.0 && self.ripple.decay < 1.0) {
            return Err(SimError::invalid_config(format!(
                "ripple decay must be in (0, 1), got {}",
                self.ripple.decay
            )));
        }
        if self.ripple.max_radius <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "ripple max radius must be positive, got {}",
                self.ripple.max_radius
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(SimConfig::default().validate().is_ok());
        assert!(SimConfig::realtime().validate().is_ok());
        assert!(SimConfig::accurate().validate().is_ok());
        assert!(SimConfig::soft().validate().is_ok());
    }

    #[test]
    fn test_invalid_damping_rejected() {
        let config = SimConfig {
            damping: 0.0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SimConfig {
            damping: 1.5,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_solver_iterations_rejected() {
        let mut config = SimConfig::default();
        config.solver.iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_ripple_decay_rejected() {
        let mut config = SimConfig::default();
        config.ripple.decay = 1.0;
        assert!(config.validate().is_err());
    }
}
