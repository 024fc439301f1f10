//! Tear detection and stress propagation.
//!
//! After the solver relaxes the lattice, the detector scans all live springs
//! for overstress. A spring is a tear candidate when its stress ratio exceeds
//! the ratio threshold, or when its extension force exceeds an absolute
//! budget proportional to its rest length. Candidates are ranked by force and
//! only the most stressed few tear per tick, which spreads large ruptures
//! across frames instead of shattering the body instantly.
//!
//! Each tear injects stress into the springs sharing an endpoint with the
//! torn spring, split evenly among them, so ruptures can cascade on
//! subsequent ticks. A bounded history of recent tears is kept for
//! telemetry.

use std::collections::VecDeque;

use nalgebra::Point2;
use smallvec::SmallVec;
use tracing::debug;

use crate::spring::{Spring, SpringKind};
use crate::types::Particle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the tear detector.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TearConfig {
    /// Stress ratio above which a spring becomes a tear candidate.
    pub stress_ratio_threshold: f64,
    /// Absolute force threshold per unit of rest length.
    pub force_per_length_threshold: f64,
    /// Maximum tears applied in a single detection pass.
    pub max_tears_per_frame: usize,
    /// Fraction of the torn spring's stress ratio propagated to neighbors.
    pub propagation_fraction: f64,
    /// Stress added to the torn spring's endpoint particles.
    pub particle_stress: f64,
    /// Number of tear events retained in the history ring.
    pub history_capacity: usize,
}

impl Default for TearConfig {
    fn default() -> Self {
        Self {
            stress_ratio_threshold: 0.85,
            force_per_length_threshold: 6.0e5,
            max_tears_per_frame: 3,
            propagation_fraction: 0.5,
            particle_stress: 0.6,
            history_capacity: 20,
        }
    }
}

/// Record of a single spring rupture.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TearEvent {
    /// Index of the torn spring.
    pub spring: usize,
    /// Endpoint particle indices of the torn spring.
    pub endpoints: (usize, usize),
    /// Midpoint of the spring at the moment of rupture.
    pub position: Point2<f64>,
    /// Extension force at the moment of rupture.
    pub force: f64,
    /// Stress ratio at the moment of rupture.
    pub stress_ratio: f64,
    /// Kind of the torn spring.
    pub kind: SpringKind,
    /// Simulation tick on which the tear occurred.
    pub tick: u64,
}

/// Scans springs for overstress and applies tears.
#[derive(Debug, Clone)]
pub struct TearDetector {
    config: TearConfig,
    history: VecDeque<TearEvent>,
    total_tears: u64,
}

impl TearDetector {
    /// Create a detector with the given configuration.
    #[must_use]
    pub fn new(config: TearConfig) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(config.history_capacity),
            total_tears: 0,
        }
    }

    /// Get the detector configuration.
    #[must_use]
    pub const fn config(&self) -> &TearConfig {
        &self.config
    }

    /// Recent tear events, oldest first, bounded by the history capacity.
    #[must_use]
    pub const fn history(&self) -> &VecDeque<TearEvent> {
        &self.history
    }

    /// Total tears applied since construction (or last reset).
    #[must_use]
    pub const fn total_tears(&self) -> u64 {
        self.total_tears
    }

    /// Forget all history and counters.
    pub fn reset(&mut self) {
        self.history.clear();
        self.total_tears = 0;
    }

    /// Run one detection pass, tearing at most `max_tears_per_frame` springs.
    ///
    /// Returns the tears applied this pass, most stressed first. Endpoint
    /// particles of each torn spring receive stress, and neighboring springs
    /// receive an even share of the propagated stress.
    pub fn detect(
        &mut self,
        particles: &mut [Particle],
        springs: &mut [Spring],
        tick: u64,
    ) -> SmallVec<[TearEvent; 4]> {
        let mut candidates: SmallVec<[(usize, f64); 16]> = SmallVec::new();

        for (i, spring) in springs.iter().enumerate() {
            if spring.torn {
                continue;
            }
            let ratio = spring.stress_ratio();
            let force = spring.extension_force();
            let budget = spring.rest_length * self.config.force_per_length_threshold;

            if ratio > self.config.stress_ratio_threshold || force > budget {
                candidates.push((i, force));
            }
        }

        // Most stressed tear first; ties keep scan order
        candidates.sort_by(|x, y| y.1.total_cmp(&x.1));
        candidates.truncate(self.config.max_tears_per_frame);

        let mut events: SmallVec<[TearEvent; 4]> = SmallVec::new();

        for &(index, force) in &candidates {
            let event = self.apply_tear(particles, springs, index, force, tick);
            events.push(event);
        }

        events
    }

    /// Sever every intact spring whose midpoint lies within `radius` of
    /// `point`.
    ///
    /// A deliberate cut, so the per-frame cap does not apply. Each severed
    /// spring goes through the same bookkeeping as a stress tear: endpoint
    /// stress, neighbor propagation, history, and a returned event.
    pub fn tear_within(
        &mut self,
        particles: &mut [Particle],
        springs: &mut [Spring],
        point: Point2<f64>,
        radius: f64,
        tick: u64,
    ) -> SmallVec<[TearEvent; 4]> {
        let hits: SmallVec<[usize; 16]> = springs
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.torn && (s.midpoint(particles) - point).norm() <= radius)
            .map(|(i, _)| i)
            .collect();

        let mut events: SmallVec<[TearEvent; 4]> = SmallVec::new();
        for &index in &hits {
            let force = springs[index].extension_force();
            events.push(self.apply_tear(particles, springs, index, force, tick));
        }
        events
    }

    fn apply_tear(
        &mut self,
        particles: &mut [Particle],
        springs: &mut [Spring],
        index: usize,
        force: f64,
        tick: u64,
    ) -> TearEvent {
        let (a, b, position, stress_ratio, kind) = {
            let spring = &springs[index];
            (
                spring.a,
                spring.b,
                spring.midpoint(particles),
                spring.stress_ratio(),
                spring.kind,
            )
        };

        springs[index].tear();
        particles[a].add_stress(self.config.particle_stress);
        particles[b].add_stress(self.config.particle_stress);

        // Split the propagated stress evenly across live neighbor springs
        let neighbors: SmallVec<[usize; 8]> = springs
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != index && !s.torn && (s.touches(a) || s.touches(b)))
            .map(|(i, _)| i)
            .collect();

        if !neighbors.is_empty() {
            let share = self.config.propagation_fraction * stress_ratio / neighbors.len() as f64;
            for &n in &neighbors {
                springs[n].inject_stress(share);
            }
        }

        let event = TearEvent {
            spring: index,
            endpoints: (a, b),
            position,
            force,
            stress_ratio,
            kind,
            tick,
        };

        debug!(
            spring = index,
            force,
            stress_ratio,
            neighbors = neighbors.len(),
            tick,
            "spring torn"
        );

        self.total_tears += 1;
        if self.history.len() == self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(event);

        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticleId;

    fn particles(n: usize) -> Vec<Particle> {
        (0..n)
            .map(|i| Particle::new(ParticleId::new(i as u32), Point2::new(i as f64, 0.0), 1.0))
            .collect()
    }

    fn overstressed(a: usize, b: usize) -> Spring {
        let mut s = Spring::new(a, b, 1.0, SpringKind::Structural);
        s.inject_stress(2.0);
        s
    }

    #[test]
    fn test_no_candidates_no_tears() {
        let mut ps = particles(2);
        let mut springs = vec![Spring::new(0, 1, 1.0, SpringKind::Structural)];

        let mut detector = TearDetector::new(TearConfig::default());
        let events = detector.detect(&mut ps, &mut springs, 0);
        assert!(events.is_empty());
        assert!(!springs[0].torn);
    }

    #[test]
    fn test_overstressed_spring_tears() {
        let mut ps = particles(2);
        let mut springs = vec![overstressed(0, 1)];

        let mut detector = TearDetector::new(TearConfig::default());
        let events = detector.detect(&mut ps, &mut springs, 7);

        assert_eq!(events.len(), 1);
        assert!(springs[0].torn);
        assert_eq!(events[0].tick, 7);
        assert!(ps[0].stress > 0.0);
        assert!(ps[1].stress > 0.0);
    }

    #[test]
    fn test_tear_cap_per_pass() {
        let mut ps = particles(12);
        let mut springs: Vec<Spring> = (0..6).map(|i| overstressed(2 * i, 2 * i + 1)).collect();

        let mut detector = TearDetector::new(TearConfig::default());
        let events = detector.detect(&mut ps, &mut springs, 0);

        assert_eq!(events.len(), 3);
        assert_eq!(springs.iter().filter(|s| s.torn).count(), 3);
    }

    #[test]
    fn test_torn_flag_is_terminal() {
        let mut ps = particles(2);
        let mut springs = vec![overstressed(0, 1)];

        let mut detector = TearDetector::new(TearConfig::default());
        detector.detect(&mut ps, &mut springs, 0);
        assert!(springs[0].torn);

        // A second pass never un-tears, and never re-reports
        let events = detector.detect(&mut ps, &mut springs, 1);
        assert!(events.is_empty());
        assert!(springs[0].torn);
    }

    #[test]
    fn test_stress_propagates_to_neighbors() {
        let mut ps = particles(3);
        let mut springs = vec![
            overstressed(0, 1),
            Spring::new(1, 2, 1.0, SpringKind::Structural),
        ];

        let mut detector = TearDetector::new(TearConfig::default());
        detector.detect(&mut ps, &mut springs, 0);

        assert!(springs[0].torn);
        assert!(!springs[1].torn);
        assert!(springs[1].stress_ratio() > 0.0, "neighbor receives stress");
    }

    #[test]
    fn test_propagation_split_evenly() {
        // Torn spring 0-1; neighbors 1-2 and 1-3 must get equal shares
        let mut ps = particles(4);
        let mut springs = vec![
            overstressed(0, 1),
            Spring::new(1, 2, 1.0, SpringKind::Structural),
            Spring::new(1, 3, 1.0, SpringKind::Structural),
        ];

        let mut detector = TearDetector::new(TearConfig::default());
        detector.detect(&mut ps, &mut springs, 0);

        let s1 = springs[1].stress_ratio();
        let s2 = springs[2].stress_ratio();
        assert!(s1 > 0.0);
        assert!((s1 - s2).abs() < 1e-12);
    }

    #[test]
    fn test_tear_within_radius() {
        let mut ps = particles(6);
        // Midpoints at x = 0.5, 2.5, 4.5
        let mut springs = vec![
            Spring::new(0, 1, 1.0, SpringKind::Structural),
            Spring::new(2, 3, 1.0, SpringKind::Structural),
            Spring::new(4, 5, 1.0, SpringKind::Structural),
        ];

        let mut detector = TearDetector::new(TearConfig::default());
        let events = detector.tear_within(&mut ps, &mut springs, Point2::new(0.0, 0.0), 3.0, 4);

        assert_eq!(events.len(), 2);
        assert!(springs[0].torn);
        assert!(springs[1].torn);
        assert!(!springs[2].torn, "outside the cut radius");
        assert_eq!(detector.total_tears(), 2);
        assert!(events.iter().all(|e| e.tick == 4));
    }

    #[test]
    fn test_tear_within_ignores_cap() {
        let config = TearConfig {
            max_tears_per_frame: 1,
            ..TearConfig::default()
        };
        let mut ps = particles(8);
        let mut springs: Vec<Spring> = (0..4)
            .map(|i| Spring::new(2 * i, 2 * i + 1, 1.0, SpringKind::Structural))
            .collect();

        let mut detector = TearDetector::new(config);
        let events =
            detector.tear_within(&mut ps, &mut springs, Point2::new(3.5, 0.0), 100.0, 0);
        assert_eq!(events.len(), 4, "a cut severs everything in range");
    }

    #[test]
    fn test_history_bounded() {
        let config = TearConfig {
            history_capacity: 5,
            max_tears_per_frame: 100,
            ..TearConfig::default()
        };

        let mut ps = particles(20);
        let mut springs: Vec<Spring> = (0..10).map(|i| overstressed(2 * i, 2 * i + 1)).collect();

        let mut detector = TearDetector::new(config);
        detector.detect(&mut ps, &mut springs, 0);

        assert_eq!(detector.history().len(), 5);
        assert_eq!(detector.total_tears(), 10);
    }

    #[test]
    fn test_most_stressed_tears_first() {
        let mut ps = particles(4);
        let mut weak = Spring::new(0, 1, 1.0, SpringKind::Structural);
        weak.inject_stress(0.9);
        let mut strong = Spring::new(2, 3, 1.0, SpringKind::Structural);
        strong.inject_stress(3.0);

        // Injected stress alone carries no extension force, so stretch the
        // stronger pair to give it a real force ranking
        ps[3].position.x = 5.0;
        let mut springs = vec![weak, strong];
        springs[1].update_stress(&ps);

        let config = TearConfig {
            max_tears_per_frame: 1,
            ..TearConfig::default()
        };
        let mut detector = TearDetector::new(config);
        let events = detector.detect(&mut ps, &mut springs, 0);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].spring, 1);
    }
}
