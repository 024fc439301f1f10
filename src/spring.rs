//! Spring constraints between particle pairs.
//!
//! Springs are XPBD distance constraints carrying a rest length, a mutable
//! stiffness, a kind tag, and a terminal `torn` flag. Each spring follows the
//! XPBD formulation:
//!
//! ```text
//! Δλ = (-C - α λ) / (w_a + w_b + α)
//! Δx = w · n · Δλ
//! ```
//!
//! Where:
//! - `C = |x_b - x_a| - rest_length` is the constraint violation
//! - `α = 1 / (stiffness · dt²)` is the time-scaled compliance
//! - `λ` is the Lagrange multiplier accumulated across iterations
//! - `w` are inverse masses
//!
//! The spring owns its stress accounting: before each solve the stress ratio
//! is refreshed from the pre-solve extension force, which the tear detector
//! reads. A torn spring is permanently excluded from solving; it never
//! transitions back.

use crate::types::Particle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Strain at which a spring's default tear-force budget is exhausted.
const DEFAULT_TEAR_STRAIN: f64 = 0.5;

/// Spring type tag, carrying default-stiffness metadata.
///
/// The tag affects the default stiffness assigned at construction; lattice
/// builders use it to distinguish perimeter, axis-aligned, diagonal, and
/// long-range springs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpringKind {
    /// Perimeter spring along the lattice boundary.
    Edge,
    /// Axis-aligned structural spring.
    Structural,
    /// Diagonal shear spring.
    Diagonal,
    /// Long-range cross spring spanning two cells.
    Cross,
}

impl SpringKind {
    /// Default stiffness for this spring kind.
    #[must_use]
    pub const fn default_stiffness(self) -> f64 {
        match self {
            Self::Edge => 1.0e6,
            Self::Structural => 8.0e5,
            Self::Diagonal => 4.0e5,
            Self::Cross => 2.0e5,
        }
    }
}

/// A distance constraint between two particles.
///
/// Holds indices into the particle arena only; the simulation root owns the
/// particles. Rest length is fixed at creation. Stiffness is mutable and can
/// only degrade (the mutation system floors it at a fraction of the
/// original).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spring {
    /// Index of the first particle.
    pub a: usize,
    /// Index of the second particle.
    pub b: usize,
    /// Rest length (target distance), fixed at creation.
    pub rest_length: f64,
    /// Current stiffness. Degrades under damage, never below the floor.
    pub stiffness: f64,
    /// Stiffness at creation, used to compute the degradation floor.
    original_stiffness: f64,
    /// Spring kind tag.
    pub kind: SpringKind,
    /// Terminal torn flag. Once set it is never cleared.
    pub torn: bool,
    /// Per-spring tear-force budget.
    pub tear_force: f64,
    /// Stress ratio derived from the pre-solve extension force.
    stress: f64,
    /// Stress injected by tear propagation, decayed once per tick.
    injected_stress: f64,
    /// Accumulated Lagrange multiplier, reset at the start of each solve.
    lambda: f64,
}

impl Spring {
    /// Create a new spring with the kind's default stiffness.
    ///
    /// The tear-force budget defaults to the force at a 50% strain.
    #[must_use]
    pub const fn new(a: usize, b: usize, rest_length: f64, kind: SpringKind) -> Self {
        let stiffness = kind.default_stiffness();
        Self {
            a,
            b,
            rest_length,
            stiffness,
            original_stiffness: stiffness,
            kind,
            torn: false,
            tear_force: stiffness * rest_length * DEFAULT_TEAR_STRAIN,
            stress: 0.0,
            injected_stress: 0.0,
            lambda: 0.0,
        }
    }

    /// Create a spring with rest length taken from current positions.
    #[must_use]
    pub fn from_positions(a: usize, b: usize, particles: &[Particle], kind: SpringKind) -> Self {
        let rest_length = (particles[b].position - particles[a].position).norm();
        Self::new(a, b, rest_length, kind)
    }

    /// Override the stiffness (also resets the original for the floor).
    #[must_use]
    pub const fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self.original_stiffness = stiffness;
        self.tear_force = stiffness * self.rest_length * DEFAULT_TEAR_STRAIN;
        self
    }

    /// Override the tear-force budget.
    #[must_use]
    pub const fn with_tear_force(mut self, tear_force: f64) -> Self {
        self.tear_force = tear_force;
        self
    }

    /// Reset the Lagrange multiplier (call at the start of a full solve).
    pub fn reset_lambda(&mut self) {
        self.lambda = 0.0;
    }

    /// Compute the constraint value `C = |x_b - x_a| - rest_length`.
    #[must_use]
    pub fn evaluate(&self, particles: &[Particle]) -> f64 {
        let diff = particles[self.b].position - particles[self.a].position;
        diff.norm() - self.rest_length
    }

    /// Current extension force (zero under compression).
    #[must_use]
    pub fn extension_force(&self) -> f64 {
        self.stress * self.tear_force
    }

    /// Combined stress ratio: solver-derived extension stress plus stress
    /// injected by tear propagation.
    #[must_use]
    pub fn stress_ratio(&self) -> f64 {
        self.stress + self.injected_stress
    }

    /// Inject propagated stress from a neighboring tear.
    pub fn inject_stress(&mut self, amount: f64) {
        self.injected_stress += amount.max(0.0);
    }

    /// Decay injected stress; called once per tick by the simulation root.
    pub fn decay_injected_stress(&mut self, factor: f64) {
        self.injected_stress *= factor;
        if self.injected_stress < 1e-6 {
            self.injected_stress = 0.0;
        }
    }

    /// Mark this spring torn. Terminal: there is no inverse operation.
    pub fn tear(&mut self) {
        self.torn = true;
    }

    /// Permanently reduce stiffness by the given factor, floored at
    /// `floor_fraction` of the original stiffness.
    pub fn degrade_stiffness(&mut self, factor: f64, floor_fraction: f64) {
        let floor = self.original_stiffness * floor_fraction;
        self.stiffness = (self.stiffness * factor).max(floor);
    }

    /// Midpoint of the spring's endpoints.
    #[must_use]
    pub fn midpoint(&self, particles: &[Particle]) -> nalgebra::Point2<f64> {
        nalgebra::Point2::from(
            (particles[self.a].position.coords + particles[self.b].position.coords) * 0.5,
        )
    }

    /// Check whether this spring references the given particle index.
    #[must_use]
    pub const fn touches(&self, particle: usize) -> bool {
        self.a == particle || self.b == particle
    }

    /// Solve this constraint using XPBD, mutating particle positions.
    ///
    /// Degenerate cases (both endpoints pinned, near-zero length) are
    /// no-ops. Returns the constraint error magnitude.
    pub fn solve(&mut self, particles: &mut [Particle], dt: f64) -> f64 {
        if self.torn {
            return 0.0;
        }

        let w_a = particles[self.a].inv_mass;
        let w_b = particles[self.b].inv_mass;
        let w_sum = w_a + w_b;

        // Both endpoints pinned
        if w_sum < 1e-10 {
            return 0.0;
        }

        if particles[self.a].is_dead() || particles[self.b].is_dead() {
            return 0.0;
        }

        let diff = particles[self.b].position - particles[self.a].position;
        let distance = diff.norm();

        // Degenerate: coincident particles
        if distance < 1e-10 {
            return 0.0;
        }

        let c = distance - self.rest_length;
        let n = diff / distance;

        // α = 1 / (stiffness · dt²)
        let alpha = 1.0 / (self.stiffness * dt * dt);

        let delta_lambda = alpha.mul_add(-self.lambda, -c) / (w_sum + alpha);

        particles[self.a].position -= n * (w_a * delta_lambda);
        particles[self.b].position += n * (w_b * delta_lambda);

        self.lambda += delta_lambda;

        c.abs()
    }

    /// Update the stress ratio from the current extension.
    ///
    /// Called before the solver relaxes positions: the pre-solve violation is
    /// the strain the body actually reached this tick, which is what the
    /// tear detector cares about. The post-solve residual is near zero for
    /// stiff springs and carries no signal.
    pub fn update_stress(&mut self, particles: &[Particle]) {
        if self.torn {
            return;
        }
        let extension = self.evaluate(particles).max(0.0);
        let force = self.stiffness * extension;
        if self.tear_force > 1e-10 {
            self.stress = force / self.tear_force;
        }
    }
}

/// Bending constraint across three roughly colinear particles.
///
/// Uses the distance-based formulation between the outer particles, which is
/// more stable than the angle-based one near straight configurations: the
/// rest distance comes from the law of cosines over the two edge lengths and
/// the rest angle at the hinge.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BendingConstraint {
    /// Outer particle.
    pub v0: usize,
    /// Hinge particle.
    pub v1: usize,
    /// Outer particle.
    pub v2: usize,
    /// Rest angle at the hinge, in radians.
    pub rest_angle: f64,
    /// Stiffness.
    pub stiffness: f64,
    /// Accumulated Lagrange multiplier.
    lambda: f64,
}

impl BendingConstraint {
    /// Create a bending constraint with an explicit rest angle.
    #[must_use]
    pub const fn new(v0: usize, v1: usize, v2: usize, rest_angle: f64, stiffness: f64) -> Self {
        Self {
            v0,
            v1,
            v2,
            rest_angle,
            stiffness,
            lambda: 0.0,
        }
    }

    /// Create a bending constraint with the rest angle taken from current
    /// positions.
    #[must_use]
    pub fn from_positions(v0: usize, v1: usize, v2: usize, particles: &[Particle], stiffness: f64) -> Self {
        let e1 = particles[v0].position - particles[v1].position;
        let e2 = particles[v2].position - particles[v1].position;
        let rest_angle = e1.angle(&e2);
        Self::new(v0, v1, v2, rest_angle, stiffness)
    }

    /// Reset the Lagrange multiplier.
    pub fn reset_lambda(&mut self) {
        self.lambda = 0.0;
    }

    /// Solve this constraint using XPBD. Degenerate geometry is a no-op.
    pub fn solve(&mut self, particles: &mut [Particle], dt: f64) -> f64 {
        let w0 = particles[self.v0].inv_mass;
        let w2 = particles[self.v2].inv_mass;
        let w_sum = w0 + w2;

        if w_sum < 1e-10 {
            return 0.0;
        }

        let p0 = particles[self.v0].position;
        let p1 = particles[self.v1].position;
        let p2 = particles[self.v2].position;

        let e1 = p0 - p1;
        let e2 = p2 - p1;
        let l1 = e1.norm();
        let l2 = e2.norm();

        if l1 < 1e-10 || l2 < 1e-10 {
            return 0.0;
        }

        // Law of cosines: c² = a² + b² - 2ab·cos(θ)
        let rest_distance = (2.0 * l1 * l2)
            .mul_add(-self.rest_angle.cos(), l1.mul_add(l1, l2 * l2))
            .sqrt();

        let diff = p2 - p0;
        let current_distance = diff.norm();

        if current_distance < 1e-10 {
            return 0.0;
        }

        let c = current_distance - rest_distance;
        if c.abs() < 1e-10 {
            return 0.0;
        }

        let n = diff / current_distance;
        let alpha = 1.0 / (self.stiffness * dt * dt);
        let delta_lambda = alpha.mul_add(-self.lambda, -c) / (w_sum + alpha);

        particles[self.v0].position -= n * (w0 * delta_lambda);
        particles[self.v2].position += n * (w2 * delta_lambda);

        self.lambda += delta_lambda;

        c.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticleId;
    use nalgebra::Point2;

    fn pair(x0: f64, x1: f64) -> Vec<Particle> {
        vec![
            Particle::new(ParticleId::new(0), Point2::new(x0, 0.0), 1.0),
            Particle::new(ParticleId::new(1), Point2::new(x1, 0.0), 1.0),
        ]
    }

    #[test]
    fn test_spring_kind_default_stiffness() {
        assert!(SpringKind::Edge.default_stiffness() > SpringKind::Structural.default_stiffness());
        assert!(SpringKind::Diagonal.default_stiffness() > SpringKind::Cross.default_stiffness());
    }

    #[test]
    fn test_spring_solve_converges() {
        let mut particles = pair(0.0, 2.0);
        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);

        let dt = 1.0 / 60.0;
        spring.reset_lambda();
        let error_before = spring.evaluate(&particles).abs();
        for _ in 0..20 {
            spring.solve(&mut particles, dt);
        }
        let error_after = spring.evaluate(&particles).abs();
        assert!(error_after < error_before);
        assert!(error_after < 0.05, "error {error_after} should be small");
    }

    #[test]
    fn test_spring_solve_pinned_endpoint() {
        let mut particles = pair(0.0, 2.0);
        particles[0].pin();

        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        spring.reset_lambda();
        for _ in 0..10 {
            spring.solve(&mut particles, 1.0 / 60.0);
        }

        assert!((particles[0].position.x - 0.0).abs() < 1e-10);
        assert!(particles[1].position.x < 2.0);
    }

    #[test]
    fn test_spring_solve_both_pinned_noop() {
        let mut particles = pair(0.0, 2.0);
        particles[0].pin();
        particles[1].pin();

        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        let error = spring.solve(&mut particles, 1.0 / 60.0);
        assert_eq!(error, 0.0);
    }

    #[test]
    fn test_spring_coincident_noop() {
        let mut particles = pair(1.0, 1.0);
        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        let error = spring.solve(&mut particles, 1.0 / 60.0);
        assert_eq!(error, 0.0);
        assert_eq!(particles[0].position.x, 1.0);
    }

    #[test]
    fn test_spring_stress_under_extension() {
        let particles = pair(0.0, 1.6);
        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        spring.update_stress(&particles);
        assert!(spring.stress_ratio() > 1.0, "60% strain exceeds the budget");
    }

    #[test]
    fn test_spring_no_stress_under_compression() {
        let particles = pair(0.0, 0.5);
        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        spring.update_stress(&particles);
        assert_eq!(spring.stress_ratio(), 0.0);
    }

    #[test]
    fn test_torn_spring_never_solves() {
        let mut particles = pair(0.0, 2.0);
        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        spring.tear();
        assert!(spring.torn);

        let error = spring.solve(&mut particles, 1.0 / 60.0);
        assert_eq!(error, 0.0);
        assert_eq!(particles[1].position.x, 2.0);
    }

    #[test]
    fn test_degrade_stiffness_floor() {
        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        let original = spring.stiffness;
        for _ in 0..100 {
            spring.degrade_stiffness(0.9, 0.4);
        }
        assert!((spring.stiffness - original * 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_injected_stress_decays() {
        let mut spring = Spring::new(0, 1, 1.0, SpringKind::Structural);
        spring.inject_stress(0.5);
        assert!((spring.stress_ratio() - 0.5).abs() < 1e-10);

        for _ in 0..200 {
            spring.decay_injected_stress(0.9);
        }
        assert_eq!(spring.stress_ratio(), 0.0);
    }

    #[test]
    fn test_bending_constraint_straightens() {
        let mut particles = vec![
            Particle::new(ParticleId::new(0), Point2::new(0.0, 0.0), 1.0),
            Particle::new(ParticleId::new(1), Point2::new(1.0, 0.0), 1.0),
            Particle::new(ParticleId::new(2), Point2::new(1.5, 1.0), 1.0),
        ];

        // Rest angle is 180 degrees (straight line)
        let mut bend = BendingConstraint::new(0, 1, 2, std::f64::consts::PI, 1.0e4);
        bend.reset_lambda();

        let before = (particles[2].position - particles[0].position).norm();
        for _ in 0..20 {
            bend.solve(&mut particles, 1.0 / 60.0);
        }
        let after = (particles[2].position - particles[0].position).norm();
        assert!(after > before, "outer particles should spread apart");
    }

    #[test]
    fn test_spring_midpoint() {
        let particles = pair(0.0, 2.0);
        let spring = Spring::new(0, 1, 1.0, SpringKind::Edge);
        let mid = spring.midpoint(&particles);
        assert!((mid.x - 1.0).abs() < 1e-10);
        assert!((mid.y - 0.0).abs() < 1e-10);
    }
}
