use super::{check_elasticity, dot, reflect, unit, Local};
use crate::core::particle::{Vec3, DIM};
use crate::core::Particle;
use crate::error::Result;

/// Infinite flat wall confining particle centres.
///
/// Particles live on the side the normal points to and are reflected when
/// their centre reaches the plane, so a wall surface at `s` for spheres of
/// radius `a` is a plane through `s + a·n`. Binding then only needs the
/// cells the plane itself crosses.
#[derive(Debug, Clone)]
pub struct PlaneWall {
    name: String,
    origin: Vec3,
    normal: Vec3,
    elasticity: f64,
}

impl PlaneWall {
    pub fn new(name: impl Into<String>, origin: Vec3, normal: Vec3, elasticity: f64) -> Result<Self> {
        check_elasticity(elasticity)?;
        Ok(Self {
            name: name.into(),
            origin,
            normal: unit(normal, "plane normal")?,
            elasticity,
        })
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Signed distance of `pos` from the plane along the normal.
    pub fn distance(&self, pos: &Vec3) -> f64 {
        let mut rel = [0.0; DIM];
        for k in 0..DIM {
            rel[k] = pos[k] - self.origin[k];
        }
        dot(&rel, &self.normal)
    }
}

impl Local for PlaneWall {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_in_cell(&self, origin: Vec3, size: Vec3) -> bool {
        let mut centre = [0.0; DIM];
        let mut reach = 0.0;
        for k in 0..DIM {
            centre[k] = origin[k] + 0.5 * size[k];
            reach += 0.5 * size[k] * self.normal[k].abs();
        }
        self.distance(&centre).abs() <= reach
    }

    fn collision_time(&self, particle: &Particle) -> Option<f64> {
        let vn = dot(&particle.v, &self.normal);
        if vn >= 0.0 {
            return None;
        }
        let gap = self.distance(&particle.r);
        if gap < 0.0 {
            // already behind the plane: not on our side
            return None;
        }
        Some((gap / -vn).max(0.0))
    }

    fn run_collision(&self, particle: &mut Particle) -> Result<()> {
        if dot(&particle.v, &self.normal) < 0.0 {
            let mut v = particle.v;
            reflect(&mut v, &self.normal, self.elasticity);
            particle.set_velocity(v)?;
        }
        Ok(())
    }
}
