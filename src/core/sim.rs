use crate::cells::{CellEvent, CellList, CellListConfig, CellSignals, Scheduler};
use crate::core::particle::{Vec3, DIM};
use crate::core::system::{dot, EPS_TIME};
use crate::core::{Event, EventKind, Particle, ParticleSystem};
use crate::error::{Error, Result};
use crate::locals::Local;
use log::debug;
use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Events popped by [`Simulation::advance_to`], by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub p2p: u64,
    pub local: u64,
    pub cell: u64,
    /// Popped but invalidated by a later collision.
    pub stale: u64,
}

/// Hard spheres in a periodic cube, with optional static local geometry.
///
/// Collision candidates come from the cell list: each particle only
/// predicts against particles in its cell neighbourhood, and cell-crossing
/// events feed the newly exposed neighbours back into the queue.
#[derive(Debug)]
pub struct Simulation {
    time_now: f64,
    system: ParticleSystem,
    locals: Vec<Box<dyn Local>>,
    cells: CellList,
    pq: BinaryHeap<Reverse<Event>>,
    counts: EventCounts,
}

/// Borrowed view the cell list schedules through.
struct QueueCtx<'a> {
    pq: &'a mut BinaryHeap<Reverse<Event>>,
    system: &'a ParticleSystem,
    locals: &'a [Box<dyn Local>],
    now: f64,
}

impl Scheduler for QueueCtx<'_> {
    fn push_cell_event(&mut self, p: usize, event: CellEvent) -> Result<()> {
        if !event.dt.is_finite() {
            return Ok(());
        }
        let part = &self.system.particles[p];
        let ev = Event::new(
            self.now + event.dt,
            EventKind::Cell {
                i: part.id,
                face: event.face,
            },
            part.collision_count,
            None,
        )?;
        self.pq.push(Reverse(ev));
        Ok(())
    }

    fn add_interaction_candidate(&mut self, p: usize, q: usize) -> Result<()> {
        if p == q {
            return Ok(());
        }
        let (a, b) = if p < q { (p, q) } else { (q, p) };
        if let Some(dt) = self.system.predict_p2p(a, b) {
            let (pa, pb) = (&self.system.particles[a], &self.system.particles[b]);
            let ev = Event::new(
                self.now + dt,
                EventKind::P2P { i: pa.id, j: pb.id },
                pa.collision_count,
                Some(pb.collision_count),
            )?;
            self.pq.push(Reverse(ev));
        }
        Ok(())
    }

    fn add_local_candidate(&mut self, p: usize, local_id: usize) -> Result<()> {
        let local = self.locals.get(local_id).ok_or(Error::IndexOutOfRange {
            index: local_id,
            len: self.locals.len(),
        })?;
        let part = &self.system.particles[p];
        if let Some(dt) = local.collision_time(part) {
            let ev = Event::new(
                self.now + dt,
                EventKind::Local {
                    i: part.id,
                    local_id: local_id as u32,
                },
                part.collision_count,
                None,
            )?;
            self.pq.push(Reverse(ev));
        }
        Ok(())
    }
}

impl Simulation {
    /// Create a new simulation with `num_particles` hard spheres of identical
    /// `radius` and `mass` in a periodic cube with edge lengths `box_size`,
    /// centred on the origin.
    ///
    /// Particles are placed with rejection sampling against periodic overlap.
    /// Initial velocities are sampled uniformly in [-1, 1] for each component.
    pub fn new(
        num_particles: usize,
        box_size: Vec3,
        radius: f64,
        mass: f64,
        seed: Option<u64>,
        config: CellListConfig,
    ) -> Result<Self> {
        if num_particles == 0 {
            return Err(Error::InvalidParam("num_particles must be > 0".into()));
        }
        if !box_size.iter().all(|&l| l.is_finite() && l > 0.0) {
            return Err(Error::InvalidParam(
                "box_size components must be finite and > 0".into(),
            ));
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        for &l in &box_size {
            if l < 2.0 * radius {
                return Err(Error::InvalidParam(
                    "box_size must be at least 2 * radius in every dimension".into(),
                ));
            }
        }

        let mut rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };

        let empty = ParticleSystem::new(Vec::new(), box_size)?;
        let mut particles: Vec<Particle> = Vec::with_capacity(num_particles);
        let max_attempts = 1_000_000usize;
        for id in 0..(num_particles as u32) {
            let mut attempts = 0usize;
            let r = loop {
                if attempts >= max_attempts {
                    return Err(Error::InvalidParam(format!(
                        "failed to place particle {id} without overlap; try fewer particles or smaller radius"
                    )));
                }
                attempts += 1;
                let mut r = [0.0_f64; DIM];
                for (k, r_k) in r.iter_mut().enumerate() {
                    let half = 0.5 * box_size[k];
                    *r_k = rng.random_range(-half..half);
                }
                if !overlaps_existing(&empty, &particles, &r, radius) {
                    break r;
                }
            };

            let mut v = [0.0_f64; DIM];
            v.iter_mut().for_each(|x| *x = rng.random_range(-1.0..=1.0));

            particles.push(Particle::new(id, r, v, radius, mass)?);
        }

        Self::from_particles(particles, box_size, config)
    }

    /// Build a simulation from explicit particle states.
    ///
    /// Particle ids must equal their indices and no two particles may overlap.
    pub fn from_particles(
        particles: Vec<Particle>,
        box_size: Vec3,
        config: CellListConfig,
    ) -> Result<Self> {
        let system = ParticleSystem::new(particles, box_size)?;
        for i in 0..system.len() {
            let pi = &system.particles[i];
            if overlaps_existing(&system, &system.particles[..i], &pi.r, pi.radius) {
                return Err(Error::InvalidParam(format!(
                    "particle {i} overlaps an earlier particle"
                )));
            }
        }
        let mut sim = Self {
            time_now: 0.0,
            system,
            locals: Vec::new(),
            cells: CellList::new(config)?,
            pq: BinaryHeap::new(),
            counts: EventCounts::default(),
        };
        sim.rebuild_event_queue()?;
        Ok(sim)
    }

    /// Returns current simulation time.
    pub fn time(&self) -> f64 {
        self.time_now
    }

    /// Number of particles.
    pub fn num_particles(&self) -> usize {
        self.system.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.system.particles
    }

    pub fn system(&self) -> &ParticleSystem {
        &self.system
    }

    pub fn cells(&self) -> &CellList {
        &self.cells
    }

    pub fn locals(&self) -> &[Box<dyn Local>] {
        &self.locals
    }

    pub fn event_counts(&self) -> EventCounts {
        self.counts
    }

    /// Observers of the cell list.
    pub fn cell_signals_mut(&mut self) -> &mut CellSignals {
        self.cells.signals_mut()
    }

    /// Positions as a Vec of fixed-size arrays.
    pub fn positions(&self) -> Vec<Vec3> {
        self.system.particles.iter().map(|p| p.r).collect()
    }

    /// Velocities as a Vec of fixed-size arrays.
    pub fn velocities(&self) -> Vec<Vec3> {
        self.system.particles.iter().map(|p| p.v).collect()
    }

    /// Compute total kinetic energy (diagnostic).
    pub fn kinetic_energy(&self) -> f64 {
        self.system.kinetic_energy()
    }

    /// Longest pair interaction the cell list has to serve.
    pub fn interaction_range(&self) -> f64 {
        2.0 * self
            .system
            .particles
            .iter()
            .map(|p| p.radius)
            .fold(0.0, f64::max)
    }

    /// Register static geometry and return its id. Cell bindings and the
    /// event queue are rebuilt.
    pub fn add_local(&mut self, local: Box<dyn Local>) -> Result<usize> {
        debug!("adding local {:?} as id {}", local.name(), self.locals.len());
        self.locals.push(local);
        let id = self.locals.len() - 1;
        if let Err(e) = self.rebuild_event_queue() {
            self.locals.pop();
            self.rebuild_event_queue()?;
            return Err(e);
        }
        Ok(id)
    }

    /// Overwrite all velocities and reschedule.
    pub fn set_velocities(&mut self, velocities: &[Vec3]) -> Result<()> {
        if velocities.len() != self.num_particles() {
            return Err(Error::InvalidParam(format!(
                "expected {} velocities, got {}",
                self.num_particles(),
                velocities.len()
            )));
        }
        for (p, &v) in self.system.particles.iter_mut().zip(velocities) {
            p.set_velocity(v)?;
        }
        self.rebuild_event_queue()
    }

    /// Rebuild the cell list and the event queue from the current particle
    /// states.
    ///
    /// This should be called after externally modifying positions or
    /// velocities so event times are consistent.
    pub fn rebuild_event_queue(&mut self) -> Result<()> {
        self.pq.clear();
        let range = self.interaction_range();
        self.cells.reinitialise(range, &self.system, &self.locals)?;

        let n = self.system.len();
        let mut ctx = QueueCtx {
            pq: &mut self.pq,
            system: &self.system,
            locals: &self.locals,
            now: self.time_now,
        };
        let mut near = Vec::new();
        let mut bound = Vec::new();
        for i in 0..n {
            ctx.push_cell_event(i, self.cells.next_crossing(i, &self.system)?)?;

            near.clear();
            self.cells.neighbourhood(i, |q| {
                if q > i {
                    near.push(q);
                }
            })?;
            for &q in &near {
                ctx.add_interaction_candidate(i, q)?;
            }

            bound.clear();
            self.cells.local_neighbourhood(i, |lid| bound.push(lid))?;
            for &lid in &bound {
                ctx.add_local_candidate(i, lid)?;
            }
        }
        debug!("scheduled {} initial events for {n} particles", self.pq.len());
        Ok(())
    }

    /// Advance the simulation to `target_time` (must be ≥ current time).
    ///
    /// Particles are drifted to each processed event time. Stale queue
    /// entries are discarded by collision-count invalidation.
    pub fn advance_to(&mut self, target_time: f64) -> Result<()> {
        if !target_time.is_finite() {
            return Err(Error::InvalidParam("target_time must be finite".into()));
        }
        if target_time < self.time_now - EPS_TIME {
            return Err(Error::InvalidParam(
                "target_time cannot be earlier than current time".into(),
            ));
        }

        while self.time_now + EPS_TIME < target_time {
            let Some(Reverse(ev)) = self.pq.pop() else {
                self.drift_all(target_time)?;
                break;
            };

            let t_ev = ev.time_f64();
            if t_ev > target_time {
                self.drift_all(target_time)?;
                self.pq.push(Reverse(ev));
                break;
            }

            match ev.kind {
                EventKind::P2P { i, j } => {
                    let (ii, jj) = (i as usize, j as usize);
                    let (cci, ccj) = (
                        self.system.particles[ii].collision_count,
                        self.system.particles[jj].collision_count,
                    );
                    if !ev.is_valid(cci, Some(ccj)) {
                        self.counts.stale += 1;
                        continue;
                    }

                    self.drift_all(t_ev)?;
                    self.system.resolve_p2p(ii, jj)?;
                    self.counts.p2p += 1;

                    self.system.particles[ii].bump_collision_count();
                    self.system.particles[jj].bump_collision_count();

                    self.reschedule_for_particle(ii)?;
                    self.reschedule_for_particle(jj)?;
                }
                EventKind::Local { i, local_id } => {
                    let ii = i as usize;
                    let cci = self.system.particles[ii].collision_count;
                    if !ev.is_valid(cci, None) {
                        self.counts.stale += 1;
                        continue;
                    }

                    self.drift_all(t_ev)?;
                    let lid = local_id as usize;
                    let local = self.locals.get(lid).ok_or(Error::IndexOutOfRange {
                        index: lid,
                        len: self.locals.len(),
                    })?;
                    local.run_collision(&mut self.system.particles[ii])?;
                    self.counts.local += 1;

                    self.system.particles[ii].bump_collision_count();
                    self.reschedule_for_particle(ii)?;
                }
                EventKind::Cell { i, face } => {
                    let ii = i as usize;
                    let cci = self.system.particles[ii].collision_count;
                    if !ev.is_valid(cci, None) {
                        self.counts.stale += 1;
                        continue;
                    }

                    self.drift_all(t_ev)?;
                    let mut ctx = QueueCtx {
                        pq: &mut self.pq,
                        system: &self.system,
                        locals: &self.locals,
                        now: self.time_now,
                    };
                    self.cells.on_crossing(ii, face, &self.system, &mut ctx)?;
                    self.counts.cell += 1;
                }
            }
        }

        Ok(())
    }

    // ============ Internal helpers ============

    /// Queue the next crossing and every collision candidate for `i`.
    fn reschedule_for_particle(&mut self, i: usize) -> Result<()> {
        let mut ctx = QueueCtx {
            pq: &mut self.pq,
            system: &self.system,
            locals: &self.locals,
            now: self.time_now,
        };
        ctx.push_cell_event(i, self.cells.next_crossing(i, &self.system)?)?;

        let mut near = Vec::new();
        self.cells.neighbourhood(i, |q| near.push(q))?;
        for q in near {
            ctx.add_interaction_candidate(i, q)?;
        }

        let mut bound = Vec::new();
        self.cells.local_neighbourhood(i, |lid| bound.push(lid))?;
        for lid in bound {
            ctx.add_local_candidate(i, lid)?;
        }
        Ok(())
    }

    /// Drift all particles to the specified absolute time by linear motion.
    fn drift_all(&mut self, to_time: f64) -> Result<()> {
        if to_time < self.time_now - EPS_TIME {
            return Err(Error::InvalidParam("cannot drift backwards in time".into()));
        }
        self.system.drift(to_time - self.time_now)?;
        self.time_now = self.time_now.max(to_time);
        Ok(())
    }
}

fn overlaps_existing(system: &ParticleSystem, existing: &[Particle], r: &Vec3, radius: f64) -> bool {
    existing.iter().any(|p| {
        let d = system.separation(&p.r, r);
        let min = radius + p.radius;
        dot(&d, &d) < min * min
    })
}
