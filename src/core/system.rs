use crate::cells::Dynamics;
use crate::core::particle::{Vec3, DIM};
use crate::core::Particle;
use crate::error::{Error, Result};

/// Small numeric tolerance for time and geometric checks.
pub(crate) const EPS_TIME: f64 = 1e-12;

/// Hard spheres in a periodic cube centred on the origin.
///
/// Positions are kept in the primary image `[-L/2, L/2)` on every axis.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    pub particles: Vec<Particle>,
    box_size: Vec3,
}

impl ParticleSystem {
    pub fn new(particles: Vec<Particle>, box_size: Vec3) -> Result<Self> {
        if !box_size.iter().all(|&l| l.is_finite() && l > 0.0) {
            return Err(Error::InvalidParam(
                "box_size components must be finite and > 0".into(),
            ));
        }
        for (idx, p) in particles.iter().enumerate() {
            if p.index() != idx {
                return Err(Error::InvalidParam(format!(
                    "particle at index {idx} has id {}",
                    p.id
                )));
            }
        }
        let mut sys = Self {
            particles,
            box_size,
        };
        for i in 0..sys.particles.len() {
            sys.particles[i].r = sys.wrap(sys.particles[i].r);
        }
        Ok(sys)
    }

    #[inline]
    pub fn box_size(&self) -> Vec3 {
        self.box_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Fold `pos` into the primary image.
    #[inline]
    pub fn wrap(&self, mut pos: Vec3) -> Vec3 {
        for (c, &l) in pos.iter_mut().zip(&self.box_size) {
            *c -= l * (*c / l + 0.5).floor();
        }
        pos
    }

    /// Minimum-image separation `b - a`.
    #[inline]
    pub fn separation(&self, a: &Vec3, b: &Vec3) -> Vec3 {
        let mut d = [0.0; DIM];
        for k in 0..DIM {
            let l = self.box_size[k];
            d[k] = b[k] - a[k];
            d[k] -= l * (d[k] / l).round();
        }
        d
    }

    /// Stream every particle ballistically by `dt` and re-wrap.
    pub fn drift(&mut self, dt: f64) -> Result<()> {
        if dt < -EPS_TIME {
            return Err(Error::InvalidParam("cannot drift backwards in time".into()));
        }
        if dt.abs() <= EPS_TIME {
            return Ok(());
        }
        let box_size = self.box_size;
        for p in &mut self.particles {
            for k in 0..DIM {
                let l = box_size[k];
                p.r[k] += p.v[k] * dt;
                p.r[k] -= l * (p.r[k] / l + 0.5).floor();
            }
        }
        Ok(())
    }

    /// Time from now until particles `i` and `j` touch, if they approach.
    pub fn predict_p2p(&self, i: usize, j: usize) -> Option<f64> {
        let pi = &self.particles[i];
        let pj = &self.particles[j];

        let d = self.separation(&pi.r, &pj.r);
        let mut u = [0.0_f64; DIM];
        for (k, u_k) in u.iter_mut().enumerate() {
            *u_k = pj.v[k] - pi.v[k];
        }
        let b = dot(&d, &u);
        if b >= 0.0 {
            return None; // receding
        }
        let a = dot(&u, &u);
        let r_sum = pi.radius + pj.radius;
        let c = dot(&d, &d) - r_sum * r_sum;
        if c <= 0.0 {
            // already touching and approaching
            return Some(0.0);
        }
        let disc = b * b - a * c;
        if disc <= 0.0 {
            return None;
        }
        let t = c / (-b + disc.sqrt());
        t.is_finite().then_some(t)
    }

    /// Resolve an elastic hard-sphere collision between particles `i` and `j`.
    pub fn resolve_p2p(&mut self, i: usize, j: usize) -> Result<()> {
        let mut n = self.separation(&self.particles[i].r, &self.particles[j].r);
        let dist = dot(&n, &n).sqrt();
        if dist <= EPS_TIME {
            return Err(Error::MathError(
                "degenerate contact normal in P2P collision".into(),
            ));
        }
        for nk in &mut n {
            *nk /= dist;
        }

        let (mi, mj) = (self.particles[i].mass, self.particles[j].mass);
        let mut u = [0.0_f64; DIM];
        for ((uk, &vj), &vi) in u
            .iter_mut()
            .zip(self.particles[j].v.iter())
            .zip(self.particles[i].v.iter())
        {
            *uk = vj - vi;
        }
        let u_n = dot(&u, &n);

        let fi = (2.0 * mj / (mi + mj)) * u_n;
        let fj = (2.0 * mi / (mi + mj)) * u_n;
        for (k, &nk) in n.iter().enumerate() {
            self.particles[i].v[k] += fi * nk;
            self.particles[j].v[k] -= fj * nk;
        }
        Ok(())
    }

    /// Total kinetic energy.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(Particle::kinetic_energy).sum()
    }
}

impl Dynamics for ParticleSystem {
    #[inline]
    fn num_particles(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    fn position(&self, p: usize) -> Vec3 {
        self.particles[p].r
    }

    #[inline]
    fn velocity(&self, p: usize) -> Vec3 {
        self.particles[p].v
    }

    #[inline]
    fn apply_bc(&self, pos: Vec3) -> Vec3 {
        self.wrap(pos)
    }

    #[inline]
    fn primary_cell_size(&self) -> Vec3 {
        self.box_size
    }
}

#[inline]
pub(crate) fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
