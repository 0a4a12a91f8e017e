//! Reference event-driven dynamics for hard spheres in a periodic cube.
//!
//! This is the collaborator side of the cell list: particles and their
//! ballistic streaming ([`ParticleSystem`], a [`crate::cells::Dynamics`]),
//! the event queue ([`Simulation`]'s scheduler), and the event loop that
//! fires crossings back into the cell list.

pub mod event;
pub mod particle;
pub mod sim;
pub mod system;

pub use event::{Event, EventKind};
pub use particle::Particle;
pub use sim::{EventCounts, Simulation};
pub use system::ParticleSystem;
