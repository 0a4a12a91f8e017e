//! Static local geometry that particles collide with.
//!
//! A local takes part in the cell list through [`Local::is_in_cell`], which
//! decides which cells it is bound to, and in the event loop through its
//! collision time and collision response.

pub mod cylinder;
pub mod plane;

pub use cylinder::CylinderWall;
pub use plane::PlaneWall;

use crate::core::particle::{Vec3, DIM};
use crate::core::Particle;
use crate::error::{Error, Result};
use std::fmt::Debug;

/// A piece of static geometry bound to the cells it overlaps.
pub trait Local: Debug {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// Whether the geometry touches the axis-aligned box `[origin, origin + size]`.
    ///
    /// False positives only cost extra candidate events; false negatives
    /// lose collisions.
    fn is_in_cell(&self, origin: Vec3, size: Vec3) -> bool;

    /// Time from now until `particle` hits the geometry, if it ever does.
    fn collision_time(&self, particle: &Particle) -> Option<f64>;

    /// Apply the collision response to a particle in contact.
    fn run_collision(&self, particle: &mut Particle) -> Result<()>;
}

#[inline]
pub(crate) fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Normalise `v`, rejecting zero and non-finite input.
pub(crate) fn unit(v: Vec3, what: &str) -> Result<Vec3> {
    let n = dot(&v, &v).sqrt();
    if !n.is_finite() || n <= f64::EPSILON {
        return Err(Error::InvalidParam(format!(
            "{what} must be a finite, non-zero vector"
        )));
    }
    let mut out = [0.0; DIM];
    for (o, c) in out.iter_mut().zip(v.iter()) {
        *o = c / n;
    }
    Ok(out)
}

pub(crate) fn check_elasticity(e: f64) -> Result<()> {
    if !e.is_finite() || !(0.0..=1.0).contains(&e) {
        return Err(Error::InvalidParam(format!(
            "elasticity must lie in [0, 1] (got {e})"
        )));
    }
    Ok(())
}

/// Remove `(1 + e)` times the component of `v` along unit `n`.
#[inline]
pub(crate) fn reflect(v: &mut Vec3, n: &Vec3, e: f64) {
    let vn = dot(v, n);
    for (vk, nk) in v.iter_mut().zip(n.iter()) {
        *vk -= (1.0 + e) * vn * nk;
    }
}
