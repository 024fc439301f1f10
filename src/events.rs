//! Simulation events.
//!
//! The world records an event for every externally visible state change and
//! hands them out through a drain queue: callers poll once per tick and
//! receive events in the order they occurred.

use nalgebra::Point2;

use crate::tear::TearEvent;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An event emitted by the simulation.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SimEvent {
    /// A strike was applied.
    Strike {
        /// Strike position.
        position: Point2<f64>,
        /// Strike strength.
        strength: f64,
        /// Tick on which the strike landed.
        tick: u64,
    },
    /// A spring ruptured.
    Tear(TearEvent),
    /// A ripple was spawned.
    RippleSpawn {
        /// Wavefront origin.
        origin: Point2<f64>,
        /// Initial amplitude.
        amplitude: f64,
        /// Tick on which the ripple spawned.
        tick: u64,
    },
}
