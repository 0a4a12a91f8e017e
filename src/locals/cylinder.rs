use super::{check_elasticity, dot, reflect, unit, Local};
use crate::core::particle::{Vec3, DIM};
use crate::core::Particle;
use crate::error::{Error, Result};

/// Infinite cylindrical wall enclosing particles.
///
/// `radius` is the distance from the axis at which a particle centre makes
/// contact, i.e. the physical wall radius minus the particle radius.
#[derive(Debug, Clone)]
pub struct CylinderWall {
    name: String,
    origin: Vec3,
    axis: Vec3,
    radius: f64,
    elasticity: f64,
}

impl CylinderWall {
    pub fn new(
        name: impl Into<String>,
        origin: Vec3,
        axis: Vec3,
        radius: f64,
        elasticity: f64,
    ) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam(
                "cylinder radius must be finite and > 0".into(),
            ));
        }
        check_elasticity(elasticity)?;
        Ok(Self {
            name: name.into(),
            origin,
            axis: unit(axis, "cylinder axis")?,
            radius,
            elasticity,
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Component of `vec` perpendicular to the axis.
    fn perp(&self, vec: &Vec3) -> Vec3 {
        let along = dot(vec, &self.axis);
        let mut out = [0.0; DIM];
        for k in 0..DIM {
            out[k] = vec[k] - along * self.axis[k];
        }
        out
    }

    fn rel(&self, pos: &Vec3) -> Vec3 {
        let mut out = [0.0; DIM];
        for k in 0..DIM {
            out[k] = pos[k] - self.origin[k];
        }
        out
    }

    /// Distance of `pos` from the axis.
    pub fn axial_distance(&self, pos: &Vec3) -> f64 {
        let r = self.perp(&self.rel(pos));
        dot(&r, &r).sqrt()
    }
}

impl Local for CylinderWall {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_in_cell(&self, origin: Vec3, size: Vec3) -> bool {
        let mut centre = [0.0; DIM];
        for k in 0..DIM {
            centre[k] = origin[k] + 0.5 * size[k];
        }
        let half_diag = 0.5 * dot(&size, &size).sqrt();
        (self.axial_distance(&centre) - self.radius).abs() <= half_diag
    }

    fn collision_time(&self, particle: &Particle) -> Option<f64> {
        let r = self.perp(&self.rel(&particle.r));
        let v = self.perp(&particle.v);
        let a = dot(&v, &v);
        if a <= 0.0 {
            return None;
        }
        let b = dot(&r, &v);
        let c = dot(&r, &r) - self.radius * self.radius;
        let disc = b * b - a * c;
        if disc < 0.0 {
            return None;
        }
        // the later root is where an enclosed particle leaves the cylinder
        let t = (-b + disc.sqrt()) / a;
        if t < 0.0 && c <= 0.0 {
            return None;
        }
        Some(t.max(0.0))
    }

    fn run_collision(&self, particle: &mut Particle) -> Result<()> {
        let r = self.perp(&self.rel(&particle.r));
        let dist = dot(&r, &r).sqrt();
        if dist <= f64::EPSILON {
            return Err(Error::MathError(
                "particle on cylinder axis has no contact normal".into(),
            ));
        }
        let mut n = [0.0; DIM];
        for k in 0..DIM {
            n[k] = r[k] / dist;
        }
        if dot(&particle.v, &n) > 0.0 {
            let mut v = particle.v;
            reflect(&mut v, &n, self.elasticity);
            particle.set_velocity(v)?;
        }
        Ok(())
    }
}
