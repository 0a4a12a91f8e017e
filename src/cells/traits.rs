//! Seams between the cell list and the components that drive it.

use crate::core::particle::Vec3;
use crate::error::Result;

/// The face of its cell a particle is about to leave through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellFace {
    /// Axis index in `0..3`.
    pub axis: usize,
    /// `true` when leaving through the upper face.
    pub positive: bool,
}

impl CellFace {
    pub fn new(axis: usize, positive: bool) -> Self {
        Self { axis, positive }
    }

    /// Signed, one-based axis: `+1` is the upper x face, `-3` the lower z face.
    #[inline]
    pub fn signed(self) -> i32 {
        let a = self.axis as i32 + 1;
        if self.positive {
            a
        } else {
            -a
        }
    }
}

/// A predicted cell crossing, `dt` after the particle's current state.
///
/// A particle that never leaves its cell has `dt == f64::INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellEvent {
    pub dt: f64,
    pub face: CellFace,
}

/// Read access to particle state, owned by the dynamics engine.
pub trait Dynamics {
    fn num_particles(&self) -> usize;

    /// Current position of particle `p`.
    fn position(&self, p: usize) -> Vec3;

    /// Current velocity of particle `p`.
    fn velocity(&self, p: usize) -> Vec3;

    /// Whether `p` has been streamed to the current time. Only checked in
    /// debug builds.
    fn is_up_to_date(&self, _p: usize) -> bool {
        true
    }

    /// Map a position into the primary periodic image.
    fn apply_bc(&self, pos: Vec3) -> Vec3;

    /// Edge lengths of the periodic primary image.
    fn primary_cell_size(&self) -> Vec3;
}

/// The global event scheduler as seen from the cell list.
pub trait Scheduler {
    /// Queue a particle's next cell crossing.
    fn push_cell_event(&mut self, p: usize, event: CellEvent) -> Result<()>;

    /// `q` is now close enough to `p` that their interaction must be tracked.
    fn add_interaction_candidate(&mut self, p: usize, q: usize) -> Result<()>;

    /// `p` is now close enough to local geometry `local_id` to be tracked.
    fn add_local_candidate(&mut self, p: usize, local_id: usize) -> Result<()>;
}

/// A scheduler that ignores everything, for using the cell list purely as a
/// neighbour index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unscheduled;

impl Scheduler for Unscheduled {
    fn push_cell_event(&mut self, _p: usize, _event: CellEvent) -> Result<()> {
        Ok(())
    }

    fn add_interaction_candidate(&mut self, _p: usize, _q: usize) -> Result<()> {
        Ok(())
    }

    fn add_local_candidate(&mut self, _p: usize, _local_id: usize) -> Result<()> {
        Ok(())
    }
}
