//! Morton-ordered cell list: spatial neighbour tracking driven by
//! cell-crossing pseudo-events.

pub mod config;
pub mod grid;
pub mod ledger;
pub mod list;
pub mod morton;
pub mod signal;
pub mod traits;

pub use config::CellListConfig;
pub use grid::CellGrid;
pub use ledger::MembershipLedger;
pub use list::CellList;
pub use morton::{DilatedInteger, MortonNumber};
pub use signal::{CellSignals, Signal, SlotId};
pub use traits::{CellEvent, CellFace, Dynamics, Scheduler, Unscheduled};
