//! 2D deformable-body simulation with tearing, ripples, and mutation.
//!
//! This crate simulates a soft body as a field of Verlet particles joined by
//! XPBD spring constraints. Overstressed springs tear permanently, tears
//! propagate stress to their neighbors, expanding ripples push on the body,
//! and accumulated damage mutates it: cosmetic spikes grow and retract,
//! while stiffness degradation and mass perturbation leave permanent scars.
//!
//! # Architecture
//!
//! - [`types`] - Particles, flags, and identifiers
//! - [`spring`] - XPBD distance and bending constraints
//! - [`integrator`] - Verlet integration with reflective boundaries
//! - [`solver`] - Iterative constraint relaxation
//! - [`tear`] - Overstress detection and stress propagation
//! - [`ripple`] - Expanding wavefronts
//! - [`mutation`] - Damage-driven spikes, softening, and mass drift
//! - [`lattice`] - Ring and grid topology builders
//! - [`world`] - The simulation root and tick loop
//! - [`stepper`] - Fixed-timestep driver
//!
//! # Example
//!
//! ```
//! use nalgebra::Point2;
//! use sim_soft2d::{Lattice, SimConfig, World};
//!
//! # fn main() -> sim_soft2d::Result<()> {
//! let lattice = Lattice::ring(Point2::origin(), 16, 40.0, 1.0, true)?;
//! let mut world = World::new(lattice, SimConfig::default())?;
//!
//! world.strike(Point2::new(20.0, 0.0), 200.0);
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0);
//! }
//!
//! for event in world.drain_events() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod error;
pub mod events;
pub mod integrator;
pub mod lattice;
pub mod mutation;
pub mod ripple;
pub mod solver;
pub mod spring;
pub mod stepper;
pub mod tear;
pub mod types;
pub mod world;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use events::SimEvent;
pub use integrator::Boundary;
pub use lattice::Lattice;
pub use mutation::{MutationConfig, MutationSystem};
pub use ripple::{Ripple, RippleConfig, RippleField};
pub use solver::{SolverConfig, SolverStats, XpbdSolver};
pub use spring::{BendingConstraint, Spring, SpringKind};
pub use stepper::{Stepper, StepperConfig};
pub use tear::{TearConfig, TearDetector, TearEvent};
pub use types::{Particle, ParticleFlags, ParticleId, Spike};
pub use world::{ParticleView, RenderSnapshot, Wind, World, WorldStats};
