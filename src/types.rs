//! Core types for the particle field.
//!
//! This module provides the fundamental state carried by every point mass:
//!
//! - [`ParticleId`] - Stable identifier into the particle arena
//! - [`ParticleFlags`] - Flags for particle state (pinned, boundary, dead)
//! - [`Particle`] - A point mass with position/previous-position Verlet state
//! - [`Spike`] - Cosmetic spike state grown by the mutation system

use nalgebra::{Point2, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier for a particle in the simulation arena.
///
/// Particles are never removed from storage; they die logically via the
/// `DEAD` flag so that indices held by springs remain valid across a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleId(pub u32);

impl ParticleId {
    /// Create a new particle ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Get the arena index for this ID.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ParticleId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Particle({})", self.0)
    }
}

bitflags::bitflags! {
    /// Flags for particle state and behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct ParticleFlags: u32 {
        /// Particle is pinned (immovable, inverse mass zero).
        const PINNED = 0b0000_0001;
        /// Particle lies on the lattice boundary.
        const BOUNDARY = 0b0000_0010;
        /// Particle is dead and excluded from simulation.
        const DEAD = 0b0000_0100;
    }
}

/// Cosmetic spike state, grown on boundary particles by the mutation system.
///
/// Spikes are reversible visual state: they grow while damage is high and
/// retract once it subsides. Length is capped at 1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spike {
    /// Current spike length, in `0..=1`.
    pub length: f64,
    /// Oscillation phase in radians, advanced while the spike is grown.
    pub phase: f64,
}

impl Spike {
    /// Effective rendered length, with a slight oscillation on top of the
    /// grown length, still capped at 1.0.
    #[must_use]
    pub fn rendered_length(&self) -> f64 {
        (self.length * 0.05f64.mul_add(self.phase.sin(), 0.95)).min(1.0)
    }
}

/// A point mass in the simulation.
///
/// Position and previous position encode velocity implicitly (Verlet). The
/// accumulated force is reset exactly once per tick, by the integrator.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Particle {
    /// Stable identity.
    pub id: ParticleId,
    /// Position in world coordinates.
    pub position: Point2<f64>,
    /// Previous position (implicit velocity).
    pub prev_position: Point2<f64>,
    /// Accumulated external force for this tick.
    pub force: Vector2<f64>,
    /// Mass in kg. Retained so unpinning restores the original inverse mass.
    pub mass: f64,
    /// Inverse mass (0 for pinned particles).
    pub inv_mass: f64,
    /// Stress level in `0..=1`, decays over time.
    pub stress: f64,
    /// Smoothed glow intensity tracking stress.
    pub glow: f64,
    /// Spike visual state.
    pub spike: Spike,
    /// State flags.
    pub flags: ParticleFlags,
}

impl Particle {
    /// Create a new particle at the given position with the given mass.
    #[must_use]
    pub fn new(id: ParticleId, position: Point2<f64>, mass: f64) -> Self {
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        Self {
            id,
            position,
            prev_position: position,
            force: Vector2::zeros(),
            mass,
            inv_mass,
            stress: 0.0,
            glow: 0.0,
            spike: Spike::default(),
            flags: ParticleFlags::empty(),
        }
    }

    /// Create a pinned particle (infinite mass, immovable).
    #[must_use]
    pub fn pinned(id: ParticleId, position: Point2<f64>) -> Self {
        let mut p = Self::new(id, position, f64::INFINITY);
        p.inv_mass = 0.0;
        p.flags = ParticleFlags::PINNED;
        p
    }

    /// Implied velocity, expressed as distance moved over the last step.
    #[must_use]
    pub fn velocity(&self) -> Vector2<f64> {
        self.position - self.prev_position
    }

    /// Pin this particle (make it immovable).
    pub fn pin(&mut self) {
        self.flags.insert(ParticleFlags::PINNED);
        self.inv_mass = 0.0;
    }

    /// Unpin this particle, restoring the inverse mass from the stored mass.
    pub fn unpin(&mut self) {
        self.flags.remove(ParticleFlags::PINNED);
        if self.mass > 0.0 && self.mass.is_finite() {
            self.inv_mass = 1.0 / self.mass;
        }
    }

    /// Check if this particle is pinned.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.flags.contains(ParticleFlags::PINNED)
    }

    /// Check if this particle is dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.flags.contains(ParticleFlags::DEAD)
    }

    /// Check if this particle lies on the lattice boundary.
    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        self.flags.contains(ParticleFlags::BOUNDARY)
    }

    /// Whether the integrator and solver should move this particle.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.is_pinned() && !self.is_dead()
    }

    /// Mark this particle dead. It stays in storage so indices remain valid.
    pub fn kill(&mut self) {
        self.flags.insert(ParticleFlags::DEAD);
    }

    /// Apply an external force, accumulated until the next integration.
    pub fn apply_force(&mut self, force: Vector2<f64>) {
        self.force += force;
    }

    /// Clear the accumulated force.
    pub fn clear_force(&mut self) {
        self.force = Vector2::zeros();
    }

    /// Inject stress directly (strikes, tear propagation). Clamped to `0..=1`.
    pub fn add_stress(&mut self, amount: f64) {
        self.stress = (self.stress + amount).clamp(0.0, 1.0);
    }

    /// Set the mass, updating the inverse mass unless pinned.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        if !self.is_pinned() && mass > 0.0 && mass.is_finite() {
            self.inv_mass = 1.0 / mass;
        }
    }
}
