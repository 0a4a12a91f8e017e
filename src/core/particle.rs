use crate::error::{Error, Result};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// A position, velocity or extent in D=3.
pub type Vec3 = [f64; DIM];

/// A hard sphere moving ballistically between events.
///
/// The particle's index in [`crate::core::ParticleSystem`] equals `id`; the
/// cell list and the event queue address particles by that index.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Stable identifier, equal to the particle's index.
    pub id: u32,
    /// Position in the primary periodic image.
    pub r: Vec3,
    /// Velocity.
    pub v: Vec3,
    /// Hard-sphere radius (> 0).
    pub radius: f64,
    /// Mass (> 0).
    pub mass: f64,
    /// Realised-event counter; a change invalidates queued events for this particle.
    pub collision_count: u64,
}

fn all_finite(x: &Vec3) -> bool {
    x.iter().all(|c| c.is_finite())
}

impl Particle {
    /// Create a new particle after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `radius` or `mass` is non-positive or any component is NaN/inf.
    pub fn new(id: u32, r: Vec3, v: Vec3, radius: f64, mass: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !all_finite(&r) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !all_finite(&v) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            id,
            r,
            v,
            radius,
            mass,
            collision_count: 0,
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.id as usize
    }

    /// Increment the collision counter, invalidating queued events.
    #[inline]
    pub fn bump_collision_count(&mut self) {
        self.collision_count = self.collision_count.saturating_add(1);
    }

    /// 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        let vsq: f64 = self.v.iter().map(|&c| c * c).sum();
        0.5 * self.mass * vsq
    }

    /// m v.
    #[inline]
    pub fn momentum(&self) -> Vec3 {
        self.v.map(|c| c * self.mass)
    }

    /// Set position (validated as finite).
    ///
    /// Moving a particle behind the cell list's back breaks its membership
    /// record; rebuild the list afterwards.
    pub fn set_position(&mut self, r: Vec3) -> Result<()> {
        if !all_finite(&r) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        self.r = r;
        Ok(())
    }

    /// Set velocity (validated as finite).
    pub fn set_velocity(&mut self, v: Vec3) -> Result<()> {
        if !all_finite(&v) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        self.v = v;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_ok() -> Result<()> {
        let p = Particle::new(3, [0.0, 1.0, 2.0], [2.0, -3.0, 0.5], 0.5, 2.0)?;
        assert_eq!(p.index(), 3);
        assert_eq!(p.r, [0.0, 1.0, 2.0]);
        assert_eq!(p.collision_count, 0);
        assert_eq!(p.momentum(), [4.0, -6.0, 1.0]);
        Ok(())
    }

    #[test]
    fn invalid_inputs_rejected() {
        let err = Particle::new(0, [0.0; 3], [0.0; 3], 0.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("radius"));
        let err = Particle::new(0, [0.0; 3], [0.0; 3], 1.0, -1.0).unwrap_err();
        assert!(err.to_string().contains("mass"));
        let err = Particle::new(0, [f64::NAN, 0.0, 0.0], [0.0; 3], 1.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("position"));
    }

    #[test]
    fn setters_reject_non_finite() -> Result<()> {
        let mut p = Particle::new(1, [0.0; 3], [0.0; 3], 1.0, 1.0)?;
        assert!(p.set_velocity([f64::INFINITY, 0.0, 0.0]).is_err());
        p.set_velocity([3.0, 4.0, 0.0])?;
        assert!((p.kinetic_energy() - 12.5).abs() < 1e-12);
        p.bump_collision_count();
        assert_eq!(p.collision_count, 1);
        Ok(())
    }
}
