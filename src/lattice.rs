//! Lattice construction: particles plus the springs connecting them.
//!
//! Two builders are provided:
//!
//! - [`Lattice::ring`] - a closed ring of boundary particles joined by edge
//!   springs, optionally braced by cross springs through the interior.
//! - [`Lattice::grid`] - a rectangular grid with structural, diagonal, and
//!   long-range cross springs, with edge springs along the perimeter.
//!
//! Builders validate their parameters and return [`SimError::InvalidLattice`]
//! for degenerate input. Spring lists are deduplicated so no particle pair is
//! connected twice.

use hashbrown::HashSet;
use nalgebra::Point2;

use crate::error::{Result, SimError};
use crate::spring::{BendingConstraint, Spring, SpringKind};
use crate::types::{Particle, ParticleFlags, ParticleId};

/// A built particle/spring topology, ready to hand to the simulation.
#[derive(Debug, Clone, Default)]
pub struct Lattice {
    /// Particle arena. Indices are stable for the lattice's lifetime.
    pub particles: Vec<Particle>,
    /// Springs connecting particles by arena index.
    pub springs: Vec<Spring>,
    /// Bending constraints, if the builder emitted any.
    pub bends: Vec<BendingConstraint>,
}

impl Lattice {
    /// Build a closed ring of `count` particles with the given rest length
    /// between neighbors.
    ///
    /// The ring radius follows from the chord length of a regular polygon:
    /// `r = rest_length / (2·sin(π/count))`. All particles are flagged as
    /// boundary. When `braced` is set, cross springs connect each particle to
    /// the one halfway around the ring, and bending constraints resist
    /// folding at each vertex.
    pub fn ring(
        center: Point2<f64>,
        count: usize,
        rest_length: f64,
        mass: f64,
        braced: bool,
    ) -> Result<Self> {
        if count < 3 {
            return Err(SimError::invalid_lattice(format!(
                "ring needs at least 3 particles, got {count}"
            )));
        }
        if rest_length <= 0.0 {
            return Err(SimError::invalid_lattice(format!(
                "rest length must be positive, got {rest_length}"
            )));
        }
        if mass <= 0.0 {
            return Err(SimError::invalid_lattice(format!(
                "mass must be positive, got {mass}"
            )));
        }

        let radius = rest_length / (2.0 * (std::f64::consts::PI / count as f64).sin());

        let mut particles = Vec::with_capacity(count);
        for i in 0..count {
            let angle = std::f64::consts::TAU * i as f64 / count as f64;
            let position = center + nalgebra::Vector2::new(angle.cos(), angle.sin()) * radius;
            let mut p = Particle::new(ParticleId::new(i as u32), position, mass);
            p.flags.insert(ParticleFlags::BOUNDARY);
            particles.push(p);
        }

        let mut springs = Vec::with_capacity(if braced { count * 2 } else { count });
        for i in 0..count {
            springs.push(Spring::new(i, (i + 1) % count, rest_length, SpringKind::Edge));
        }

        let mut bends = Vec::new();
        if braced {
            let mut seen: HashSet<(usize, usize)> = HashSet::new();
            let half = count / 2;
            for i in 0..count {
                let j = (i + half) % count;
                let key = (i.min(j), i.max(j));
                if i != j && seen.insert(key) {
                    springs.push(Spring::from_positions(i, j, &particles, SpringKind::Cross));
                }
            }

            // Interior angle of a regular polygon
            let rest_angle = std::f64::consts::PI - std::f64::consts::TAU / count as f64;
            for i in 0..count {
                let prev = (i + count - 1) % count;
                let next = (i + 1) % count;
                bends.push(BendingConstraint::new(
                    prev,
                    i,
                    next,
                    rest_angle,
                    SpringKind::Edge.default_stiffness() * 0.01,
                ));
            }
        }

        Ok(Self {
            particles,
            springs,
            bends,
        })
    }

    /// Build a rectangular grid of `cols × rows` particles with the given
    /// spacing.
    ///
    /// Axis-aligned springs are structural (edge kind along the perimeter),
    /// both diagonals of every cell are shear springs, and cross springs span
    /// two cells along each axis. Perimeter particles are flagged as
    /// boundary.
    pub fn grid(
        origin: Point2<f64>,
        cols: usize,
        rows: usize,
        spacing: f64,
        mass: f64,
    ) -> Result<Self> {
        if cols < 2 || rows < 2 {
            return Err(SimError::invalid_lattice(format!(
                "grid needs at least 2x2 particles, got {cols}x{rows}"
            )));
        }
        if spacing <= 0.0 {
            return Err(SimError::invalid_lattice(format!(
                "spacing must be positive, got {spacing}"
            )));
        }
        if mass <= 0.0 {
            return Err(SimError::invalid_lattice(format!(
                "mass must be positive, got {mass}"
            )));
        }

        let index = |x: usize, y: usize| y * cols + x;

        let mut particles = Vec::with_capacity(cols * rows);
        for y in 0..rows {
            for x in 0..cols {
                let position =
                    origin + nalgebra::Vector2::new(x as f64, y as f64) * spacing;
                let mut p = Particle::new(ParticleId::new((y * cols + x) as u32), position, mass);
                if x == 0 || y == 0 || x + 1 == cols || y + 1 == rows {
                    p.flags.insert(ParticleFlags::BOUNDARY);
                }
                particles.push(p);
            }
        }

        let mut springs = Vec::new();
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut connect = |springs: &mut Vec<Spring>, a: usize, b: usize, kind: SpringKind| {
            let key = (a.min(b), a.max(b));
            if seen.insert(key) {
                springs.push(Spring::from_positions(a, b, &particles, kind));
            }
        };

        for y in 0..rows {
            for x in 0..cols {
                let here = index(x, y);

                // Axis-aligned neighbors; perimeter runs get the edge kind
                if x + 1 < cols {
                    let kind = if y == 0 || y + 1 == rows {
                        SpringKind::Edge
                    } else {
                        SpringKind::Structural
                    };
                    connect(&mut springs, here, index(x + 1, y), kind);
                }
                if y + 1 < rows {
                    let kind = if x == 0 || x + 1 == cols {
                        SpringKind::Edge
                    } else {
                        SpringKind::Structural
                    };
                    connect(&mut springs, here, index(x, y + 1), kind);
                }

                // Both diagonals of each cell
                if x + 1 < cols && y + 1 < rows {
                    connect(&mut springs, here, index(x + 1, y + 1), SpringKind::Diagonal);
                    connect(&mut springs, index(x + 1, y), index(x, y + 1), SpringKind::Diagonal);
                }

                // Long-range cross springs spanning two cells
                if x + 2 < cols {
                    connect(&mut springs, here, index(x + 2, y), SpringKind::Cross);
                }
                if y + 2 < rows {
                    connect(&mut springs, here, index(x, y + 2), SpringKind::Cross);
                }
            }
        }

        Ok(Self {
            particles,
            springs,
            bends: Vec::new(),
        })
    }

    /// Number of particles.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of springs.
    #[must_use]
    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    /// Pin the particle at the given index.
    pub fn pin(&mut self, index: usize) -> Result<()> {
        let p = self.particles.get_mut(index).ok_or_else(|| {
            SimError::index_out_of_bounds(format!("particle index {index}"))
        })?;
        p.pin();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_geometry() {
        let lattice = Lattice::ring(Point2::origin(), 10, 50.0, 1.0, false).unwrap();
        assert_eq!(lattice.particle_count(), 10);
        assert_eq!(lattice.spring_count(), 10);

        // Every neighbor distance equals the rest length
        for s in &lattice.springs {
            let d = (lattice.particles[s.b].position - lattice.particles[s.a].position).norm();
            assert!((d - 50.0).abs() < 1e-9, "chord {d} != rest length");
            assert_eq!(s.kind, SpringKind::Edge);
        }
    }

    #[test]
    fn test_ring_all_boundary() {
        let lattice = Lattice::ring(Point2::origin(), 8, 10.0, 1.0, false).unwrap();
        assert!(lattice.particles.iter().all(Particle::is_boundary));
    }

    #[test]
    fn test_ring_braced_adds_cross_and_bends() {
        let lattice = Lattice::ring(Point2::origin(), 10, 50.0, 1.0, true).unwrap();
        let cross = lattice
            .springs
            .iter()
            .filter(|s| s.kind == SpringKind::Cross)
            .count();
        assert_eq!(cross, 5, "each diameter counted once");
        assert_eq!(lattice.bends.len(), 10);
    }

    #[test]
    fn test_ring_rejects_degenerate() {
        assert!(Lattice::ring(Point2::origin(), 2, 50.0, 1.0, false).is_err());
        assert!(Lattice::ring(Point2::origin(), 10, 0.0, 1.0, false).is_err());
        assert!(Lattice::ring(Point2::origin(), 10, 50.0, -1.0, false).is_err());
    }

    #[test]
    fn test_grid_counts() {
        let lattice = Lattice::grid(Point2::origin(), 3, 3, 10.0, 1.0).unwrap();
        assert_eq!(lattice.particle_count(), 9);

        // 12 axis-aligned + 8 diagonal + 3 + 3 two-cell cross springs
        assert_eq!(lattice.spring_count(), 26);
    }

    #[test]
    fn test_grid_boundary_flags() {
        let lattice = Lattice::grid(Point2::origin(), 4, 4, 10.0, 1.0).unwrap();
        let boundary = lattice.particles.iter().filter(|p| p.is_boundary()).count();
        assert_eq!(boundary, 12, "perimeter of a 4x4 grid");

        // Center particles are interior
        assert!(!lattice.particles[5].is_boundary());
        assert!(!lattice.particles[10].is_boundary());
    }

    #[test]
    fn test_grid_no_duplicate_springs() {
        let lattice = Lattice::grid(Point2::origin(), 5, 4, 10.0, 1.0).unwrap();
        let mut seen = HashSet::new();
        for s in &lattice.springs {
            let key = (s.a.min(s.b), s.a.max(s.b));
            assert!(seen.insert(key), "duplicate spring {key:?}");
        }
    }

    #[test]
    fn test_grid_rejects_degenerate() {
        assert!(Lattice::grid(Point2::origin(), 1, 5, 10.0, 1.0).is_err());
        assert!(Lattice::grid(Point2::origin(), 5, 5, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_pin_out_of_bounds() {
        let mut lattice = Lattice::ring(Point2::origin(), 5, 10.0, 1.0, false).unwrap();
        assert!(lattice.pin(0).is_ok());
        assert!(lattice.particles[0].is_pinned());
        assert!(lattice.pin(99).is_err());
    }
}
