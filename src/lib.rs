//! Event-driven hard-sphere dynamics on top of a Morton-ordered cell
//! neighbour list.
//!
//! [`cells`] is the neighbour list itself and is usable on its own through the
//! [`cells::Dynamics`] and [`cells::Scheduler`] seams. [`core`] is a periodic
//! hard-sphere driver built on it, and [`locals`] holds static geometry that
//! binds to cells.

pub mod cells;
pub mod core;
pub mod error;
pub mod locals;

#[cfg(feature = "python")]
mod python;
