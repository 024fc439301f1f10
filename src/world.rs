//! The simulation root.
//!
//! [`World`] owns the particle and spring arenas plus every subsystem, and
//! advances them in a fixed order each tick:
//!
//! 1. Pending strikes land: radial forces, stress, a ripple, an event.
//! 2. Ripples advance and push on particles in their band.
//! 3. The integrator moves particles and resets forces.
//! 4. The solver relaxes springs and bending constraints.
//! 5. The tear detector ruptures overstressed springs; each tear spawns a
//!    ripple and feeds the damage level.
//! 6. Stress and glow decay; the mutation system applies damage effects.
//!
//! External state changes are reported through a drain queue of
//! [`SimEvent`]s.

use std::collections::VecDeque;

use nalgebra::{Point2, Vector2};
use smallvec::SmallVec;
use tracing::debug;

use crate::config::SimConfig;
use crate::error::Result;
use crate::events::SimEvent;
use crate::integrator::{apply_boundary, integrate};
use crate::lattice::Lattice;
use crate::mutation::MutationSystem;
use crate::ripple::{Ripple, RippleField};
use crate::solver::{SolverStats, XpbdSolver};
use crate::spring::{BendingConstraint, Spring};
use crate::tear::{TearDetector, TearEvent};
use crate::types::Particle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ripple amplitude granted to a tear at full stress budget.
const TEAR_RIPPLE_AMPLITUDE: f64 = 30.0;

/// Ticks for which a tear site still drives local mutation.
const RECENT_TEAR_WINDOW: u64 = 120;

/// Turbulent wind applied to every active particle each tick.
///
/// A steady base flow plus a deterministic gust term varying with time and
/// position, so neighboring particles feel slightly different forces.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wind {
    /// Steady flow component.
    pub base: Vector2<f64>,
    /// Peak strength of the gust term.
    pub gust_amplitude: f64,
    /// How fast gusts oscillate, in radians per tick.
    pub gust_frequency: f64,
}

impl Wind {
    /// Create a steady wind with no gusts.
    #[must_use]
    pub const fn steady(base: Vector2<f64>) -> Self {
        Self {
            base,
            gust_amplitude: 0.0,
            gust_frequency: 0.0,
        }
    }

    /// Sample the wind force at a position and tick.
    #[must_use]
    pub fn sample(&self, tick: u64, position: Point2<f64>) -> Vector2<f64> {
        if self.gust_amplitude == 0.0 {
            return self.base;
        }
        let t = tick as f64 * self.gust_frequency;
        let gust = Vector2::new(
            position.y.mul_add(0.01, t).sin(),
            position.x.mul_add(0.01, t * 0.7).cos() * 0.5,
        ) * self.gust_amplitude;
        self.base + gust
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingStrike {
    position: Point2<f64>,
    strength: f64,
}

/// Per-particle view for rendering.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleView {
    /// World position.
    pub position: Point2<f64>,
    /// Stress level in `0..=1`.
    pub stress: f64,
    /// Smoothed glow intensity.
    pub glow: f64,
    /// Rendered spike length.
    pub spike_length: f64,
    /// Whether the particle is pinned.
    pub pinned: bool,
    /// Whether the particle is dead.
    pub dead: bool,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderSnapshot {
    /// Tick the snapshot was taken on.
    pub tick: u64,
    /// Per-particle render state, indexed like the particle arena.
    pub particles: Vec<ParticleView>,
    /// Endpoint pairs of intact springs.
    pub intact_springs: Vec<(usize, usize)>,
    /// Endpoint pairs of torn springs.
    pub torn_springs: Vec<(usize, usize)>,
    /// Live ripples.
    pub ripples: Vec<Ripple>,
    /// Recent tear events, oldest first.
    pub recent_tears: Vec<TearEvent>,
    /// Mean stress ratio over intact springs.
    pub global_tension: f64,
    /// Damage level in `0..=1`.
    pub damage: f64,
}

/// Aggregate counters for one tick.
#[derive(Debug, Clone, Copy)]
pub struct WorldStats {
    /// Current tick.
    pub tick: u64,
    /// Particles that are neither pinned nor dead.
    pub live_particles: usize,
    /// Springs still intact.
    pub intact_springs: usize,
    /// Springs torn so far.
    pub torn_springs: usize,
    /// Mean stress ratio over intact springs.
    pub global_tension: f64,
    /// Damage level in `0..=1`.
    pub damage: f64,
    /// Sum of `½·m·v²` over live particles, with the Verlet per-step
    /// displacement standing in for velocity.
    pub kinetic_energy: f64,
    /// Solver statistics from the last step.
    pub solver: SolverStats,
}

/// The simulation world: arenas, subsystems, and the tick loop.
#[derive(Debug)]
pub struct World {
    config: SimConfig,
    particles: Vec<Particle>,
    springs: Vec<Spring>,
    bends: Vec<BendingConstraint>,
    initial: Lattice,
    solver: XpbdSolver,
    tears: TearDetector,
    ripples: RippleField,
    mutation: MutationSystem,
    tick: u64,
    events: VecDeque<SimEvent>,
    pending_strikes: Vec<PendingStrike>,
    wind: Option<Wind>,
}

impl World {
    /// Create a world from a built lattice and a validated configuration.
    pub fn new(lattice: Lattice, config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            particles: lattice.particles.clone(),
            springs: lattice.springs.clone(),
            bends: lattice.bends.clone(),
            initial: lattice,
            solver: XpbdSolver::new(config.solver),
            tears: TearDetector::new(config.tear),
            ripples: RippleField::new(config.ripple),
            mutation: MutationSystem::new(config.mutation),
            tick: 0,
            events: VecDeque::new(),
            pending_strikes: Vec::new(),
            wind: None,
        })
    }

    /// Advance the simulation by one fixed timestep.
    pub fn step(&mut self, dt: f64) {
        self.land_strikes();

        if let Some(wind) = self.wind {
            for p in self.particles.iter_mut().filter(|p| p.is_active()) {
                let force = wind.sample(self.tick, p.position);
                p.apply_force(force);
            }
        }

        self.ripples.update();
        self.ripples.apply(&mut self.particles);

        integrate(
            &mut self.particles,
            self.config.gravity,
            self.config.damping,
            self.config.max_step_distance,
            dt,
            &self.config.boundary,
        );

        self.solver
            .solve(&mut self.particles, &mut self.springs, &mut self.bends, dt);
        apply_boundary(&mut self.particles, &self.config.boundary);

        let torn = self
            .tears
            .detect(&mut self.particles, &mut self.springs, self.tick);
        for event in &torn {
            self.events.push_back(SimEvent::Tear(*event));
            self.spawn_ripple(
                event.position,
                TEAR_RIPPLE_AMPLITUDE * event.stress_ratio.min(2.0),
            );
        }
        self.mutation.record_tears(torn.len());

        self.decay_stress();

        // Mutation is local to where the body recently ruptured
        let recent_sites: SmallVec<[Point2<f64>; 8]> = self
            .tears
            .history()
            .iter()
            .filter(|e| self.tick.saturating_sub(e.tick) <= RECENT_TEAR_WINDOW)
            .map(|e| e.position)
            .collect();
        self.mutation
            .update(&mut self.particles, &mut self.springs, &recent_sites);

        self.tick += 1;
    }

    fn land_strikes(&mut self) {
        let strikes = std::mem::take(&mut self.pending_strikes);
        for strike in strikes {
            let radius = self.config.strike_radius;

            for p in self.particles.iter_mut().filter(|p| p.is_active()) {
                let offset = p.position - strike.position;
                let dist = offset.norm();
                if dist >= radius || dist < 1e-10 {
                    continue;
                }

                // Linear falloff from the strike center
                let falloff = 1.0 - dist / radius;
                p.apply_force(offset * (strike.strength * falloff / dist));
                p.add_stress(falloff);
            }

            debug!(
                x = strike.position.x,
                y = strike.position.y,
                strength = strike.strength,
                tick = self.tick,
                "strike landed"
            );
            self.events.push_back(SimEvent::Strike {
                position: strike.position,
                strength: strike.strength,
                tick: self.tick,
            });
            self.spawn_ripple(strike.position, strike.strength);
        }
    }

    fn spawn_ripple(&mut self, origin: Point2<f64>, amplitude: f64) {
        self.ripples.spawn(origin, amplitude);
        self.events.push_back(SimEvent::RippleSpawn {
            origin,
            amplitude,
            tick: self.tick,
        });
    }

    fn decay_stress(&mut self) {
        for spring in &mut self.springs {
            spring.decay_injected_stress(self.config.injected_stress_decay);
        }
        for p in &mut self.particles {
            p.stress *= self.config.stress_decay;
            if p.stress < 1e-6 {
                p.stress = 0.0;
            }
            p.glow += (p.stress - p.glow) * self.config.glow_rate;
        }
    }

    /// Queue a strike to land at the start of the next step.
    pub fn strike(&mut self, position: Point2<f64>, strength: f64) {
        self.pending_strikes.push(PendingStrike { position, strength });
    }

    /// Sever every intact spring whose midpoint lies within `radius` of
    /// `point`, immediately.
    ///
    /// A deliberate cut rather than a stress failure: the per-frame tear cap
    /// does not apply, but each severed spring still propagates stress,
    /// enters the history, and emits a [`SimEvent::Tear`].
    pub fn tear_at(&mut self, point: Point2<f64>, radius: f64) {
        let events = self.tears.tear_within(
            &mut self.particles,
            &mut self.springs,
            point,
            radius,
            self.tick,
        );
        for event in &events {
            self.events.push_back(SimEvent::Tear(*event));
        }
        self.mutation.record_tears(events.len());
    }

    /// Set or clear the ambient wind. Survives [`World::reset`] like the
    /// rest of the environment.
    pub fn set_wind(&mut self, wind: Option<Wind>) {
        self.wind = wind;
    }

    /// The current ambient wind, if any.
    #[must_use]
    pub const fn wind(&self) -> Option<Wind> {
        self.wind
    }

    /// Apply an immediate outward radial impulse with linear falloff.
    pub fn apply_explosion(&mut self, center: Point2<f64>, strength: f64, radius: f64) {
        for p in self.particles.iter_mut().filter(|p| p.is_active()) {
            let offset = p.position - center;
            let dist = offset.norm();
            if dist >= radius || dist < 1e-10 {
                continue;
            }
            let falloff = 1.0 - dist / radius;
            p.apply_force(offset * (strength * falloff / dist));
        }
    }

    /// Apply an immediate inward pull toward a point, with linear falloff.
    pub fn apply_attractor(&mut self, center: Point2<f64>, strength: f64, radius: f64) {
        self.apply_explosion(center, -strength, radius);
    }

    /// Index and distance of the nearest live particle within `max_dist`.
    #[must_use]
    pub fn nearest_particle(&self, point: Point2<f64>, max_dist: f64) -> Option<(usize, f64)> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_dead())
            .map(|(i, p)| (i, (p.position - point).norm()))
            .filter(|(_, d)| *d <= max_dist)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Capture everything a renderer needs for this frame.
    #[must_use]
    pub fn snapshot(&self) -> RenderSnapshot {
        let particles = self
            .particles
            .iter()
            .map(|p| ParticleView {
                position: p.position,
                stress: p.stress,
                glow: p.glow,
                spike_length: p.spike.rendered_length(),
                pinned: p.is_pinned(),
                dead: p.is_dead(),
            })
            .collect();

        let mut intact_springs = Vec::new();
        let mut torn_springs = Vec::new();
        for s in &self.springs {
            if s.torn {
                torn_springs.push((s.a, s.b));
            } else {
                intact_springs.push((s.a, s.b));
            }
        }

        RenderSnapshot {
            tick: self.tick,
            particles,
            intact_springs,
            torn_springs,
            ripples: self.ripples.iter().copied().collect(),
            recent_tears: self.tears.history().iter().copied().collect(),
            global_tension: self.global_tension(),
            damage: self.mutation.damage(),
        }
    }

    /// Aggregate counters for the current tick.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        let kinetic_energy = self
            .particles
            .iter()
            .filter(|p| p.is_active() && p.mass.is_finite())
            .map(|p| 0.5 * p.mass * p.velocity().norm_squared())
            .sum();

        WorldStats {
            tick: self.tick,
            live_particles: self.particles.iter().filter(|p| p.is_active()).count(),
            intact_springs: self.springs.iter().filter(|s| !s.torn).count(),
            torn_springs: self.springs.iter().filter(|s| s.torn).count(),
            global_tension: self.global_tension(),
            damage: self.mutation.damage(),
            kinetic_energy,
            solver: *self.solver.stats(),
        }
    }

    /// Mean stress ratio over live springs. Zero when nothing is live.
    #[must_use]
    pub fn global_tension(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for s in self.springs.iter().filter(|s| !s.torn) {
            sum += s.stress_ratio();
            count += 1;
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Drain all queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain(..).collect()
    }

    /// Restore the world to its initial lattice and reset every subsystem.
    pub fn reset(&mut self) {
        self.particles = self.initial.particles.clone();
        self.springs = self.initial.springs.clone();
        self.bends = self.initial.bends.clone();
        self.solver = XpbdSolver::new(self.config.solver);
        self.tears.reset();
        self.ripples.clear();
        self.mutation.reset();
        self.tick = 0;
        self.events.clear();
        self.pending_strikes.clear();
    }

    /// The particle arena.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access to the particle arena.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// The spring arena.
    #[must_use]
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    /// Live ripples.
    pub fn ripples(&self) -> impl Iterator<Item = &Ripple> {
        self.ripples.iter()
    }

    /// The current tick.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Current damage level in `0..=1`.
    #[must_use]
    pub const fn damage(&self) -> f64 {
        self.mutation.damage()
    }

    /// Total tears since construction or the last reset.
    #[must_use]
    pub const fn total_tears(&self) -> u64 {
        self.tears.total_tears()
    }

    /// Solver statistics from the last step.
    #[must_use]
    pub const fn solver_stats(&self) -> &SolverStats {
        self.solver.stats()
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }
}
