use crate::cells::CellFace;
use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::Ordering;

/// Kinds of events the driver schedules.
///
/// Tie-breaking at equal times is `P2P` < `Local` < `Cell`, so real
/// collisions resolve before the bookkeeping crossing they coincide with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Particle-to-particle collision between particles `i` and `j`.
    P2P { i: u32, j: u32 },
    /// Collision of particle `i` with local geometry `local_id`.
    Local { i: u32, local_id: u32 },
    /// Particle `i` leaves its cell through `face`.
    Cell { i: u32, face: CellFace },
}

impl EventKind {
    #[inline]
    fn order_key(&self) -> (u8, u32, u32) {
        match *self {
            EventKind::P2P { i, j } => (0, i, j),
            EventKind::Local { i, local_id } => (1, i, local_id),
            EventKind::Cell { i, face } => (2, i, 2 * face.axis as u32 + u32::from(face.positive)),
        }
    }
}

/// A scheduled event in the priority queue with deterministic ordering.
///
/// - `time`: absolute event time (finite, non-NaN).
/// - `kind`: event kind and participants.
/// - `cc_i`, `cc_j`: collision-count snapshots for invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: NotNan<f64>,
    pub kind: EventKind,
    pub cc_i: u64,
    pub cc_j: Option<u64>,
}

impl Event {
    /// Create a new event, validating that time is finite and non-NaN.
    pub fn new(time: f64, kind: EventKind, cc_i: u64, cc_j: Option<u64>) -> Result<Self> {
        if !time.is_finite() {
            return Err(Error::InvalidParam(format!(
                "event time must be finite (got {time})"
            )));
        }
        let time = NotNan::new(time)
            .map_err(|_| Error::InvalidParam("event time cannot be NaN".into()))?;
        Ok(Self {
            time,
            kind,
            cc_i,
            cc_j,
        })
    }

    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }

    /// Validate against current collision counts. Single-particle events
    /// pass `None` for `cc_j_now`.
    ///
    /// A particle whose count moved on since the snapshot has a different
    /// trajectory, so the event is stale and is dropped on pop rather than
    /// cancelled up front.
    #[inline]
    pub fn is_valid(&self, cc_i_now: u64, cc_j_now: Option<u64>) -> bool {
        if self.cc_i != cc_i_now {
            return false;
        }
        match (self.cc_j, cc_j_now) {
            (Some(a), Some(b)) => a == b,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.kind.order_key().cmp(&other.kind.order_key()))
            .then_with(|| {
                (self.cc_i, self.cc_j.unwrap_or(0)).cmp(&(other.cc_i, other.cc_j.unwrap_or(0)))
            })
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
