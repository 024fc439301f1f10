//! Damage-driven mutation of the body.
//!
//! The mutation system accumulates a scalar damage level from tears and
//! heals it linearly over time. Damage drives three effects:
//!
//! - **Spikes** (reversible): boundary particles near recent tears grow
//!   cosmetic spikes while damage is high and retract them as it heals.
//! - **Stiffness degradation** (permanent): springs near recent tears soften
//!   while damage is high, floored at a fraction of their original
//!   stiffness. Healing never restores stiffness.
//! - **Mass perturbation** (permanent): at high damage, occasional random
//!   particles have their mass nudged, making the healed body move subtly
//!   differently from the pristine one.
//!
//! Spike growth and degradation are local: the caller hands in the recent
//! tear sites, and only particles and springs within the effect radius of
//! one mutate. Retraction is global, so spikes always recede once damage
//! subsides.

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::spring::Spring;
use crate::types::Particle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the mutation system.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MutationConfig {
    /// Damage added per tear.
    pub damage_per_tear: f64,
    /// Damage healed per tick.
    pub heal_rate: f64,
    /// Damage level above which spikes grow (below it they retract).
    pub spike_threshold: f64,
    /// Distance from a recent tear within which spikes grow and springs
    /// degrade.
    pub effect_radius: f64,
    /// Spike growth per tick, scaled by damage.
    pub spike_growth_rate: f64,
    /// Spike retraction per tick.
    pub spike_retract_rate: f64,
    /// Spike oscillation phase advance per tick.
    pub spike_phase_rate: f64,
    /// Damage level above which stiffness degrades.
    pub degrade_threshold: f64,
    /// Per-tick stiffness multiplier while degrading, in `(0, 1)`.
    pub degrade_factor: f64,
    /// Floor for degraded stiffness, as a fraction of the original.
    pub stiffness_floor: f64,
    /// Damage level above which mass perturbation can occur.
    pub perturb_threshold: f64,
    /// Per-tick probability of perturbing one particle's mass.
    pub perturb_chance: f64,
    /// Maximum relative mass change per perturbation.
    pub perturb_magnitude: f64,
    /// RNG seed, for reproducible runs.
    pub seed: u64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            damage_per_tear: 0.15,
            heal_rate: 0.002,
            spike_threshold: 0.3,
            effect_radius: 150.0,
            spike_growth_rate: 0.04,
            spike_retract_rate: 0.02,
            spike_phase_rate: 0.2,
            degrade_threshold: 0.5,
            degrade_factor: 0.999,
            stiffness_floor: 0.4,
            perturb_threshold: 0.8,
            perturb_chance: 0.05,
            perturb_magnitude: 0.2,
            seed: 0xF1E5,
        }
    }
}

/// Tracks damage and mutates the body accordingly.
#[derive(Debug, Clone)]
pub struct MutationSystem {
    config: MutationConfig,
    damage: f64,
    rng: StdRng,
}

impl MutationSystem {
    /// Create a mutation system with the given configuration.
    #[must_use]
    pub fn new(config: MutationConfig) -> Self {
        Self {
            config,
            damage: 0.0,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Get the mutation configuration.
    #[must_use]
    pub const fn config(&self) -> &MutationConfig {
        &self.config
    }

    /// Current damage level in `0..=1`.
    #[must_use]
    pub const fn damage(&self) -> f64 {
        self.damage
    }

    /// Accumulate damage from tears applied this tick.
    pub fn record_tears(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.damage = (count as f64)
            .mul_add(self.config.damage_per_tear, self.damage)
            .min(1.0);
        trace!(damage = self.damage, tears = count, "damage accumulated");
    }

    /// Reset damage and the RNG to their initial state. Permanent effects
    /// already applied to particles and springs are not undone.
    pub fn reset(&mut self) {
        self.damage = 0.0;
        self.rng = StdRng::seed_from_u64(self.config.seed);
    }

    /// Advance mutation state by one tick.
    ///
    /// `tear_sites` are the positions of recent tears; spike growth and
    /// stiffness degradation only touch particles and springs within the
    /// effect radius of one of them.
    pub fn update(
        &mut self,
        particles: &mut [Particle],
        springs: &mut [Spring],
        tear_sites: &[Point2<f64>],
    ) {
        self.damage = (self.damage - self.config.heal_rate).max(0.0);

        self.update_spikes(particles, tear_sites);

        if self.damage > self.config.degrade_threshold {
            let config = self.config;
            for spring in springs.iter_mut().filter(|s| !s.torn) {
                let midpoint = spring.midpoint(particles);
                if tear_sites
                    .iter()
                    .any(|site| (midpoint - site).norm() <= config.effect_radius)
                {
                    spring.degrade_stiffness(config.degrade_factor, config.stiffness_floor);
                }
            }
        }

        if self.damage > self.config.perturb_threshold
            && self.rng.gen_bool(self.config.perturb_chance)
        {
            self.perturb_mass(particles);
        }
    }

    fn update_spikes(&mut self, particles: &mut [Particle], tear_sites: &[Point2<f64>]) {
        let damage_high = self.damage > self.config.spike_threshold;

        for p in particles.iter_mut() {
            if !p.is_boundary() || p.is_dead() {
                continue;
            }

            let growing = damage_high
                && tear_sites
                    .iter()
                    .any(|site| (p.position - site).norm() <= self.config.effect_radius);

            if growing {
                p.spike.length =
                    self.damage.mul_add(self.config.spike_growth_rate, p.spike.length).min(1.0);
                p.spike.phase += self.config.spike_phase_rate;
            } else if p.spike.length > 0.0 {
                p.spike.length = (p.spike.length - self.config.spike_retract_rate).max(0.0);
                if p.spike.length == 0.0 {
                    p.spike.phase = 0.0;
                }
            }
        }
    }

    fn perturb_mass(&mut self, particles: &mut [Particle]) {
        let live: Vec<usize> = particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active())
            .map(|(i, _)| i)
            .collect();

        if live.is_empty() {
            return;
        }

        let index = live[self.rng.gen_range(0..live.len())];
        let scale = 1.0 + self.rng.gen_range(-self.config.perturb_magnitude..=self.config.perturb_magnitude);
        let mass = particles[index].mass * scale;
        particles[index].set_mass(mass);
        trace!(particle = index, mass, "mass perturbed");
    }
}
