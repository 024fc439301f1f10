//! Störmer–Verlet position integration.
//!
//! Velocity is implied by the difference between current and previous
//! position; no explicit velocity is stored. The integrator also owns the
//! once-per-tick force reset and the optional reflective boundary.

use nalgebra::{Point2, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::Particle;

/// Reflective simulation boundary.
///
/// Out-of-range particles are silently clamped back inside; the velocity
/// component normal to the boundary is reflected and scaled by the
/// restitution factor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Boundary {
    /// No boundary.
    None,
    /// Axis-aligned rectangle.
    Rect {
        /// Minimum corner.
        min: Point2<f64>,
        /// Maximum corner.
        max: Point2<f64>,
        /// Restitution factor applied to the reflected velocity component.
        restitution: f64,
    },
    /// Circular region.
    Circle {
        /// Center of the region.
        center: Point2<f64>,
        /// Radius of the region.
        radius: f64,
        /// Restitution factor applied to the reflected velocity component.
        restitution: f64,
    },
}

/// Advance every active particle by one fixed timestep.
///
/// ```text
/// v  = (x - x_prev) · damping     (clamped to max_step)
/// a  = f · w + g
/// x' = x + v + a · dt²
/// ```
///
/// Accumulated forces are reset to zero for all particles afterwards; this is
/// the single force reset of the tick. Pinned and dead particles keep their
/// positions but still have their forces cleared.
pub fn integrate(
    particles: &mut [Particle],
    gravity: Vector2<f64>,
    damping: f64,
    max_step: f64,
    dt: f64,
    boundary: &Boundary,
) {
    for p in particles.iter_mut() {
        if p.is_active() {
            let mut velocity = p.velocity() * damping;

            // Clamp implied velocity to bound worst-case travel per step
            let speed = velocity.norm();
            if speed > max_step && speed > 1e-10 {
                velocity *= max_step / speed;
            }

            let accel = p.force * p.inv_mass + gravity;
            let next = p.position + velocity + accel * (dt * dt);

            p.prev_position = p.position;
            p.position = next;

            reflect(p, boundary);
        }

        p.clear_force();
    }
}

/// Re-clamp every active particle against the boundary.
///
/// The solver can push particles outside the region after integration has
/// already clamped them, so the simulation root runs this once more after
/// constraint relaxation.
pub fn apply_boundary(particles: &mut [Particle], boundary: &Boundary) {
    if matches!(boundary, Boundary::None) {
        return;
    }
    for p in particles.iter_mut().filter(|p| p.is_active()) {
        reflect(p, boundary);
    }
}

/// Clamp a particle against the boundary, reflecting the normal velocity
/// component scaled by restitution.
fn reflect(p: &mut Particle, boundary: &Boundary) {
    match *boundary {
        Boundary::None => {}
        Boundary::Rect {
            min,
            max,
            restitution,
        } => {
            let mut velocity = p.velocity();
            let mut hit = false;

            if p.position.x < min.x {
                p.position.x = min.x;
                velocity.x = -velocity.x * restitution;
                hit = true;
            } else if p.position.x > max.x {
                p.position.x = max.x;
                velocity.x = -velocity.x * restitution;
                hit = true;
            }

            if p.position.y < min.y {
                p.position.y = min.y;
                velocity.y = -velocity.y * restitution;
                hit = true;
            } else if p.position.y > max.y {
                p.position.y = max.y;
                velocity.y = -velocity.y * restitution;
                hit = true;
            }

            if hit {
                p.prev_position = p.position - velocity;
            }
        }
        Boundary::Circle {
            center,
            radius,
            restitution,
        } => {
            let offset = p.position - center;
            let dist = offset.norm();
            if dist > radius && dist > 1e-10 {
                let normal = offset / dist;
                let velocity = p.velocity();

                p.position = center + normal * radius;

                let normal_speed = velocity.dot(&normal);
                let reflected = velocity - normal * ((1.0 + restitution) * normal_speed);
                p.prev_position = p.position - reflected;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticleId;
    use approx::assert_relative_eq;

    fn free_particle(x: f64, y: f64) -> Particle {
        Particle::new(ParticleId::new(0), Point2::new(x, y), 1.0)
    }

    #[test]
    fn test_gravity_moves_particle() {
        let mut particles = vec![free_particle(0.0, 0.0)];
        let gravity = Vector2::new(0.0, 9.81);

        integrate(&mut particles, gravity, 1.0, 100.0, 1.0 / 60.0, &Boundary::None);

        assert!(particles[0].position.y > 0.0);
    }

    #[test]
    fn test_no_force_full_damping_is_stationary() {
        let mut particles = vec![free_particle(3.0, 4.0)];

        for _ in 0..100 {
            integrate(
                &mut particles,
                Vector2::zeros(),
                1.0,
                100.0,
                1.0 / 60.0,
                &Boundary::None,
            );
        }

        assert_relative_eq!(particles[0].position.x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(particles[0].position.y, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_damping_converges_to_fixed_point() {
        let mut particles = vec![free_particle(0.0, 0.0)];
        // Give it an initial velocity
        particles[0].prev_position = Point2::new(-1.0, 0.0);

        for _ in 0..500 {
            integrate(
                &mut particles,
                Vector2::zeros(),
                0.9,
                100.0,
                1.0 / 60.0,
                &Boundary::None,
            );
        }

        // Velocity decays geometrically; position converges
        assert!(particles[0].velocity().norm() < 1e-12);
    }

    #[test]
    fn test_pinned_never_moves() {
        let mut particles = vec![Particle::pinned(ParticleId::new(0), Point2::new(1.0, 2.0))];
        particles[0].apply_force(Vector2::new(1.0e9, 1.0e9));

        integrate(
            &mut particles,
            Vector2::new(0.0, 9.81),
            1.0,
            100.0,
            1.0 / 60.0,
            &Boundary::None,
        );

        assert_eq!(particles[0].position, Point2::new(1.0, 2.0));
        // Force still cleared exactly once per tick
        assert_eq!(particles[0].force.norm(), 0.0);
    }

    #[test]
    fn test_velocity_clamp() {
        let mut particles = vec![free_particle(0.0, 0.0)];
        particles[0].prev_position = Point2::new(-1000.0, 0.0);

        integrate(
            &mut particles,
            Vector2::zeros(),
            1.0,
            5.0,
            1.0 / 60.0,
            &Boundary::None,
        );

        assert!((particles[0].position.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_force_reset_after_integration() {
        let mut particles = vec![free_particle(0.0, 0.0)];
        particles[0].apply_force(Vector2::new(10.0, 0.0));

        integrate(
            &mut particles,
            Vector2::zeros(),
            1.0,
            100.0,
            1.0 / 60.0,
            &Boundary::None,
        );

        assert_eq!(particles[0].force.norm(), 0.0);
    }

    #[test]
    fn test_rect_boundary_clamps() {
        let boundary = Boundary::Rect {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(10.0, 10.0),
            restitution: 0.5,
        };

        let mut particles = vec![free_particle(9.9, 5.0)];
        particles[0].prev_position = Point2::new(8.0, 5.0); // moving +x fast

        integrate(
            &mut particles,
            Vector2::zeros(),
            1.0,
            100.0,
            1.0 / 60.0,
            &boundary,
        );

        assert!(particles[0].position.x <= 10.0);
        // Implied velocity should now point back inside
        assert!(particles[0].velocity().x < 0.0);
    }

    #[test]
    fn test_circle_boundary_clamps() {
        let boundary = Boundary::Circle {
            center: Point2::origin(),
            radius: 5.0,
            restitution: 0.8,
        };

        let mut particles = vec![free_particle(4.9, 0.0)];
        particles[0].prev_position = Point2::new(4.0, 0.0);

        integrate(
            &mut particles,
            Vector2::zeros(),
            1.0,
            100.0,
            1.0 / 60.0,
            &boundary,
        );

        let dist = particles[0].position.coords.norm();
        assert!(dist <= 5.0 + 1e-9);
    }
}
