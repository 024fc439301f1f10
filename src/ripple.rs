//! Expanding ripple wavefronts.
//!
//! Strikes and tears spawn ripples: circular wavefronts that expand at a
//! constant speed while their amplitude decays geometrically each tick. A
//! ripple applies a radial force to particles inside a band around its
//! current radius, shaped by a windowed sine so the force fades in and out
//! across the band. Ripples die when their amplitude drops below a minimum
//! and are never reactivated.

use nalgebra::Point2;
use smallvec::SmallVec;
use tracing::trace;

use crate::types::Particle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the ripple system.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RippleConfig {
    /// Maximum number of concurrent live ripples.
    pub max_concurrent: usize,
    /// Radius growth per tick.
    pub speed: f64,
    /// Amplitude multiplier applied each tick, in `(0, 1)`.
    pub decay: f64,
    /// Width of the force band around the wavefront.
    pub band_width: f64,
    /// Amplitude below which a ripple dies.
    pub min_amplitude: f64,
    /// Default radius beyond which a ripple dies regardless of amplitude.
    /// Each ripple carries its own limit; spawns may override this.
    pub max_radius: f64,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            speed: 4.0,
            decay: 0.92,
            band_width: 12.0,
            min_amplitude: 0.05,
            max_radius: 400.0,
        }
    }
}

/// A single expanding wavefront.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ripple {
    /// Center of the wavefront.
    pub origin: Point2<f64>,
    /// Current radius.
    pub radius: f64,
    /// Current amplitude. Strictly decreasing over the ripple's life.
    pub amplitude: f64,
    /// Radius at which this ripple dies.
    pub max_radius: f64,
    /// Whether the ripple is still applying forces.
    pub alive: bool,
}

impl Ripple {
    /// Create a new ripple at the given origin with the given amplitude and
    /// radius limit.
    #[must_use]
    pub const fn new(origin: Point2<f64>, amplitude: f64, max_radius: f64) -> Self {
        Self {
            origin,
            radius: 0.0,
            amplitude,
            max_radius,
            alive: true,
        }
    }
}

/// Owns live ripples, advancing and applying them each tick.
#[derive(Debug, Clone)]
pub struct RippleField {
    config: RippleConfig,
    ripples: SmallVec<[Ripple; 8]>,
}

impl RippleField {
    /// Create an empty ripple field.
    #[must_use]
    pub fn new(config: RippleConfig) -> Self {
        Self {
            config,
            ripples: SmallVec::new(),
        }
    }

    /// Get the ripple field configuration.
    #[must_use]
    pub const fn config(&self) -> &RippleConfig {
        &self.config
    }

    /// Currently live ripples.
    pub fn iter(&self) -> impl Iterator<Item = &Ripple> {
        self.ripples.iter().filter(|r| r.alive)
    }

    /// Number of live ripples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ripples.iter().filter(|r| r.alive).count()
    }

    /// Whether any ripples are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all ripples.
    pub fn clear(&mut self) {
        self.ripples.clear();
    }

    /// Spawn a new ripple with the configured default radius limit.
    ///
    /// Dead ripples are purged first; if the field is still at capacity, the
    /// oldest live ripple is evicted to make room.
    pub fn spawn(&mut self, origin: Point2<f64>, amplitude: f64) {
        self.spawn_with_limit(origin, amplitude, self.config.max_radius);
    }

    /// Spawn a new ripple with an explicit radius limit, following the same
    /// purge and eviction rules as [`RippleField::spawn`].
    pub fn spawn_with_limit(&mut self, origin: Point2<f64>, amplitude: f64, max_radius: f64) {
        self.ripples.retain(|r| r.alive);
        if self.ripples.len() >= self.config.max_concurrent {
            self.ripples.remove(0);
        }
        trace!(x = origin.x, y = origin.y, amplitude, max_radius, "ripple spawned");
        self.ripples.push(Ripple::new(origin, amplitude, max_radius));
    }

    /// Advance all live ripples by one tick: grow the radius, decay the
    /// amplitude, and kill ripples past their radius limit or below the
    /// minimum amplitude.
    pub fn update(&mut self) {
        for ripple in self.ripples.iter_mut().filter(|r| r.alive) {
            ripple.radius += self.config.speed;
            ripple.amplitude *= self.config.decay;
            if ripple.amplitude < self.config.min_amplitude || ripple.radius > ripple.max_radius {
                ripple.alive = false;
            }
        }
    }

    /// Apply wavefront forces to particles inside each ripple's band.
    ///
    /// The force is radial, away from the origin, with magnitude
    /// `sin(π·t)·amplitude` where `t` is the particle's position across the
    /// band. Particles at the band center feel the full amplitude; particles
    /// at the edges feel nothing.
    pub fn apply(&self, particles: &mut [Particle]) {
        let half = self.config.band_width * 0.5;

        for ripple in self.ripples.iter().filter(|r| r.alive) {
            for p in particles.iter_mut().filter(|p| p.is_active()) {
                let offset = p.position - ripple.origin;
                let dist = offset.norm();

                let from_front = dist - ripple.radius;
                if from_front.abs() > half || dist < 1e-10 {
                    continue;
                }

                let t = (from_front + half) / self.config.band_width;
                let magnitude = (std::f64::consts::PI * t).sin() * ripple.amplitude;

                p.apply_force(offset * (magnitude / dist));
            }
        }
    }
}
