//! The Morton cell neighbour list.
//!
//! Particles are binned into cells at least one interaction range wide
//! (divided by the look-ahead radius). Instead of rebinning on a timer, every
//! particle carries a pseudo-event for the moment it leaves its cell's
//! interaction box. When that event fires, [`CellList::on_crossing`] moves the
//! particle to the adjacent cell and reports only the slab of cells that has
//! just come into range, so a migration costs `O(overlink^2 * occupancy)`.

use super::config::CellListConfig;
use super::grid::CellGrid;
use super::ledger::{CellMembers, MembershipLedger};
use super::morton::{MortonNumber, AXES};
use super::signal::CellSignals;
use super::traits::{CellEvent, CellFace, Dynamics, Scheduler};
use crate::core::particle::Vec3;
use crate::error::{Error, Result};
use crate::locals::Local;
use log::{info, trace};

/// Cell list over the periodic primary image.
#[derive(Debug)]
pub struct CellList {
    config: CellListConfig,
    grid: Option<CellGrid>,
    ledger: MembershipLedger,
    bindings: Vec<Vec<usize>>,
    signals: CellSignals,
}

impl CellList {
    /// An unbuilt list; call [`CellList::reinitialise`] before use.
    pub fn new(config: CellListConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            grid: None,
            ledger: MembershipLedger::default(),
            bindings: Vec::new(),
            signals: CellSignals::default(),
        })
    }

    #[inline]
    pub fn config(&self) -> &CellListConfig {
        &self.config
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.grid.is_some()
    }

    /// The current grid geometry.
    #[inline]
    pub fn grid(&self) -> Result<&CellGrid> {
        self.grid.as_ref().ok_or(Error::NotBuilt)
    }

    #[inline]
    pub fn signals(&self) -> &CellSignals {
        &self.signals
    }

    /// Register or remove observers.
    #[inline]
    pub fn signals_mut(&mut self) -> &mut CellSignals {
        &mut self.signals
    }

    /// Rebuild the grid for interactions up to `range`, re-bin every particle
    /// and re-bind all local geometry.
    ///
    /// Every event previously derived from this list is stale afterwards; the
    /// `reinitialised` signal tells observers so. On error the list is left
    /// unbuilt.
    pub fn reinitialise<D: Dynamics>(
        &mut self,
        range: f64,
        dynamics: &D,
        locals: &[Box<dyn Local>],
    ) -> Result<()> {
        self.grid = None;
        self.ledger = MembershipLedger::default();
        self.bindings.clear();

        let grid = CellGrid::build(dynamics.primary_cell_size(), range, &self.config)?;
        let n = dynamics.num_particles();
        let mut ledger = MembershipLedger::new(grid.array_len(), n);
        for p in 0..n {
            debug_assert!(dynamics.is_up_to_date(p), "particle {p} is not up to date");
            let pos = dynamics.apply_bc(dynamics.position(p));
            let id = grid.check_index(grid.cell_of_wrapped(pos).cell_id())?;
            ledger.insert(p, id);
        }
        info!(
            "Cell list rebuilt for range {range}: {:?} cells, {n} particles",
            grid.count()
        );

        self.grid = Some(grid);
        self.ledger = ledger;
        if let Err(e) = self.rebuild_bindings(locals) {
            self.grid = None;
            self.ledger = MembershipLedger::default();
            return Err(e);
        }
        self.signals.reinitialised.emit(());
        Ok(())
    }

    /// Recompute which local geometry overlaps each cell. Boxes are enlarged
    /// slightly so geometry lying exactly on a face binds to both sides.
    pub fn rebuild_bindings(&mut self, locals: &[Box<dyn Local>]) -> Result<()> {
        let grid = self.grid.as_ref().ok_or(Error::NotBuilt)?;
        let width = grid.interaction_width();
        let mut bindings = vec![Vec::new(); grid.array_len()];
        for coords in grid.cells() {
            let id = grid.check_index(coords.cell_id())?;
            let origin = grid.cell_origin(&coords);
            let mut lo = [0.0; AXES];
            let mut size = [0.0; AXES];
            for k in 0..AXES {
                lo[k] = origin[k] - 0.0001 * width[k];
                size[k] = 1.0002 * width[k];
            }
            for (lid, local) in locals.iter().enumerate() {
                if local.is_in_cell(lo, size) {
                    bindings[id].push(lid);
                }
            }
        }
        self.bindings = bindings;
        Ok(())
    }

    /// Cell id holding `pos` after the periodic wrap.
    pub fn position_to_cell<D: Dynamics>(&self, dynamics: &D, pos: Vec3) -> Result<MortonNumber> {
        let grid = self.grid()?;
        Ok(grid.cell_of_wrapped(dynamics.apply_bc(pos)))
    }

    /// Stored cell id of particle `p`.
    #[inline]
    pub fn cell_of(&self, p: usize) -> Option<usize> {
        self.ledger.cell_of(p)
    }

    /// Particles listed in `cell`.
    #[inline]
    pub fn members(&self, cell: usize) -> CellMembers<'_> {
        self.ledger.iter_cell(cell)
    }

    /// Local geometry ids bound to `cell`.
    #[inline]
    pub fn bound_locals(&self, cell: usize) -> &[usize] {
        self.bindings.get(cell).map_or(&[], Vec::as_slice)
    }

    /// Lower corner of particle `p`'s cell box, in the image nearest to it.
    pub fn cell_origin_for<D: Dynamics>(&self, p: usize, dynamics: &D) -> Result<Vec3> {
        let grid = self.grid()?;
        let cell = self.stored_cell(p)?;
        Ok(grid.cell_origin_near(&MortonNumber::from_cell_id(cell), dynamics.position(p)))
    }

    fn stored_cell(&self, p: usize) -> Result<usize> {
        self.ledger
            .cell_of(p)
            .ok_or_else(|| Error::InvalidParam(format!("particle {p} is not in any cell")))
    }

    /// When and through which face particle `p` next leaves its cell box.
    pub fn next_crossing<D: Dynamics>(&self, p: usize, dynamics: &D) -> Result<CellEvent> {
        debug_assert!(dynamics.is_up_to_date(p), "particle {p} is not up to date");
        let grid = self.grid()?;
        let origin = self.cell_origin_for(p, dynamics)?;
        let width = grid.interaction_width();
        let r = dynamics.position(p);
        let v = dynamics.velocity(p);

        let mut best = CellEvent {
            dt: f64::INFINITY,
            face: CellFace::new(0, true),
        };
        for k in 0..AXES {
            let dt = if v[k] > 0.0 {
                (origin[k] + width[k] - r[k]) / v[k]
            } else if v[k] < 0.0 {
                (origin[k] - r[k]) / v[k]
            } else {
                continue;
            };
            if dt < best.dt {
                best = CellEvent {
                    dt: dt.max(0.0),
                    face: CellFace::new(k, v[k] > 0.0),
                };
            }
        }
        Ok(best)
    }

    /// Migrate particle `p` through `face` into the adjacent cell.
    ///
    /// Every particle in the newly exposed slab is offered to the scheduler
    /// as an interaction candidate and announced on `new_neighbour`; every
    /// local bound to the destination cell is offered and announced on
    /// `new_local`. Finally `cell_changed` fires with the old cell id.
    ///
    /// The particle's next crossing is pushed as soon as it has moved, before
    /// any candidate is offered. If a later scheduler call fails the particle
    /// stays in its new cell with that crossing queued, but the remaining
    /// candidates and signals are skipped.
    pub fn on_crossing<D, S>(
        &mut self,
        p: usize,
        face: CellFace,
        dynamics: &D,
        scheduler: &mut S,
    ) -> Result<()>
    where
        D: Dynamics,
        S: Scheduler,
    {
        debug_assert!(dynamics.is_up_to_date(p), "particle {p} is not up to date");
        let grid = self.grid.as_ref().ok_or(Error::NotBuilt)?;
        if face.axis >= AXES {
            return Err(Error::DomainError(format!(
                "crossing axis {} out of range",
                face.axis
            )));
        }
        let old_cell = self
            .ledger
            .cell_of(p)
            .ok_or_else(|| Error::InvalidParam(format!("particle {p} is not in any cell")))?;

        let axis = face.axis;
        let overlink = grid.dilated_overlink();
        let max = grid.dilated_max(axis);

        let mut dest = MortonNumber::from_cell_id(old_cell);
        let mut edge = dest;
        if face.positive {
            dest[axis] = dest[axis].inc_wrapped(max);
            edge[axis] = dest[axis].add_wrapped(overlink, max);
        } else {
            dest[axis] = dest[axis].dec_wrapped(max);
            edge[axis] = dest[axis].sub_wrapped(overlink, max);
        }
        let end_cell = grid.check_index(dest.cell_id())?;

        self.ledger.remove(p);
        self.ledger.insert(p, end_cell);
        trace!(
            "particle {p} crossed {:+}: {:?} -> {:?}",
            face.signed(),
            MortonNumber::from_cell_id(old_cell).coords(),
            dest.coords()
        );
        let next = self.next_crossing(p, dynamics)?;
        scheduler.push_cell_event(p, next)?;

        // walk the (2 overlink + 1)^2 slab on the two other axes
        let d1 = (axis + 1) % AXES;
        let d2 = (axis + 2) % AXES;
        let (max1, max2) = (grid.dilated_max(d1), grid.dilated_max(d2));
        edge[d1] = edge[d1].sub_wrapped(overlink, max1);
        edge[d2] = edge[d2].sub_wrapped(overlink, max2);
        let walk = 2 * grid.overlink() + 1;
        let start1 = edge[d1];
        for _ in 0..walk {
            edge[d1] = start1;
            for _ in 0..walk {
                let cell = grid.check_index(edge.cell_id())?;
                for q in self.ledger.iter_cell(cell) {
                    scheduler.add_interaction_candidate(p, q)?;
                    self.signals.new_neighbour.emit((p, q));
                }
                edge[d1] = edge[d1].inc_wrapped(max1);
            }
            edge[d2] = edge[d2].inc_wrapped(max2);
        }

        for &lid in &self.bindings[end_cell] {
            scheduler.add_local_candidate(p, lid)?;
            self.signals.new_local.emit((p, lid));
        }

        self.signals.cell_changed.emit((p, old_cell));
        Ok(())
    }

    /// Call `f` for every particle in the `(2 overlink + 1)^3` cube of cells
    /// around `p`'s cell, except `p` itself.
    pub fn neighbourhood<F>(&self, p: usize, mut f: F) -> Result<()>
    where
        F: FnMut(usize),
    {
        let grid = self.grid()?;
        let centre = MortonNumber::from_cell_id(self.stored_cell(p)?);
        let overlink = grid.dilated_overlink();
        let walk = 2 * grid.overlink() + 1;

        let mut corner = centre;
        for k in 0..AXES {
            corner[k] = corner[k].sub_wrapped(overlink, grid.dilated_max(k));
        }

        let mut coords = corner;
        for _ in 0..walk {
            coords[1] = corner[1];
            for _ in 0..walk {
                coords[0] = corner[0];
                for _ in 0..walk {
                    let cell = grid.check_index(coords.cell_id())?;
                    for q in self.ledger.iter_cell(cell) {
                        if q != p {
                            f(q);
                        }
                    }
                    coords[0] = coords[0].inc_wrapped(grid.dilated_max(0));
                }
                coords[1] = coords[1].inc_wrapped(grid.dilated_max(1));
            }
            coords[2] = coords[2].inc_wrapped(grid.dilated_max(2));
        }
        Ok(())
    }

    /// Call `f` for every other particle sharing `p`'s cell.
    pub fn same_cell<F>(&self, p: usize, mut f: F) -> Result<()>
    where
        F: FnMut(usize),
    {
        self.grid()?;
        let cell = self.stored_cell(p)?;
        for q in self.ledger.iter_cell(cell) {
            if q != p {
                f(q);
            }
        }
        Ok(())
    }

    /// Call `f` for every local bound to `p`'s cell.
    pub fn local_neighbourhood<F>(&self, p: usize, mut f: F) -> Result<()>
    where
        F: FnMut(usize),
    {
        self.grid()?;
        let cell = self.stored_cell(p)?;
        for &lid in self.bound_locals(cell) {
            f(lid);
        }
        Ok(())
    }

    /// Longest interaction the current grid still serves.
    pub fn max_supported_interaction_length(&self) -> Result<f64> {
        Ok(self.grid()?.max_supported_interaction_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::particle::DIM;

    /// Free-streaming particles in a cube of side `l`.
    struct Gas {
        l: f64,
        r: Vec<Vec3>,
        v: Vec<Vec3>,
    }

    impl Dynamics for Gas {
        fn num_particles(&self) -> usize {
            self.r.len()
        }
        fn position(&self, p: usize) -> Vec3 {
            self.r[p]
        }
        fn velocity(&self, p: usize) -> Vec3 {
            self.v[p]
        }
        fn apply_bc(&self, mut pos: Vec3) -> Vec3 {
            for c in pos.iter_mut() {
                *c -= self.l * (*c / self.l).round();
            }
            pos
        }
        fn primary_cell_size(&self) -> Vec3 {
            [self.l; DIM]
        }
    }

    #[derive(Default)]
    struct Recorder {
        candidates: Vec<(usize, usize)>,
        locals: Vec<(usize, usize)>,
        pushed: Vec<(usize, CellEvent)>,
    }

    impl Scheduler for Recorder {
        fn push_cell_event(&mut self, p: usize, event: CellEvent) -> Result<()> {
            self.pushed.push((p, event));
            Ok(())
        }
        fn add_interaction_candidate(&mut self, p: usize, q: usize) -> Result<()> {
            self.candidates.push((p, q));
            Ok(())
        }
        fn add_local_candidate(&mut self, p: usize, local_id: usize) -> Result<()> {
            self.locals.push((p, local_id));
            Ok(())
        }
    }

    fn no_skin() -> CellListConfig {
        CellListConfig {
            lambda: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn unbuilt_list_refuses_queries() -> Result<()> {
        let list = CellList::new(CellListConfig::default())?;
        assert!(matches!(list.neighbourhood(0, |_| {}), Err(Error::NotBuilt)));
        assert!(list.max_supported_interaction_length().is_err());
        Ok(())
    }

    #[test]
    fn crossing_time_and_face() -> Result<()> {
        // 4 cells of width 1 per axis, primary image [-2, 2)
        let gas = Gas {
            l: 4.0,
            r: vec![[-1.5, -1.5, -1.5]],
            v: vec![[0.5, -0.1, 0.0]],
        };
        let mut list = CellList::new(no_skin())?;
        list.reinitialise(0.99, &gas, &[])?;
        let ev = list.next_crossing(0, &gas)?;
        // y exit after 5 time units, x exit after 1
        assert!((ev.dt - 1.0).abs() < 1e-12);
        assert_eq!(ev.face, CellFace::new(0, true));
        Ok(())
    }

    #[test]
    fn stationary_particle_never_crosses() -> Result<()> {
        let gas = Gas {
            l: 4.0,
            r: vec![[0.1, 0.2, 0.3]],
            v: vec![[0.0; 3]],
        };
        let mut list = CellList::new(CellListConfig::default())?;
        list.reinitialise(0.99, &gas, &[])?;
        assert!(list.next_crossing(0, &gas)?.dt.is_infinite());
        Ok(())
    }

    #[test]
    fn crossing_lower_face_wraps_to_last_cell() -> Result<()> {
        let mut gas = Gas {
            l: 4.0,
            r: vec![[-1.5, -1.5, -1.5]],
            v: vec![[-1.0, 0.0, 0.0]],
        };
        let mut list = CellList::new(no_skin())?;
        list.reinitialise(0.99, &gas, &[])?;
        let ev = list.next_crossing(0, &gas)?;
        assert_eq!(ev.face, CellFace::new(0, false));
        gas.r[0][0] = gas.apply_bc([gas.r[0][0] + ev.dt * gas.v[0][0], 0.0, 0.0])[0];
        let mut rec = Recorder::default();
        list.on_crossing(0, ev.face, &gas, &mut rec)?;
        let cell = list.cell_of(0).expect("particle is binned");
        assert_eq!(MortonNumber::from_cell_id(cell).coords(), [3, 0, 0]);
        assert!(rec.candidates.is_empty());
        assert!(rec.locals.is_empty());
        assert_eq!(rec.pushed.len(), 1);
        assert!((rec.pushed[0].1.dt - 1.0).abs() < 1e-12);
        Ok(())
    }

    /// Scheduler that refuses every interaction candidate.
    #[derive(Default)]
    struct Refusing {
        pushed: Vec<(usize, CellEvent)>,
    }

    impl Scheduler for Refusing {
        fn push_cell_event(&mut self, p: usize, event: CellEvent) -> Result<()> {
            self.pushed.push((p, event));
            Ok(())
        }
        fn add_interaction_candidate(&mut self, _p: usize, q: usize) -> Result<()> {
            Err(Error::InvalidParam(format!("candidate {q} refused")))
        }
        fn add_local_candidate(&mut self, _p: usize, _local_id: usize) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_fan_out_still_queues_the_next_crossing() -> Result<()> {
        let mut gas = Gas {
            l: 4.0,
            r: vec![[-1.5, -1.5, -1.5], [0.5, -1.5, -1.5]],
            v: vec![[1.0, 0.0, 0.0], [0.0; 3]],
        };
        let mut list = CellList::new(no_skin())?;
        list.reinitialise(0.99, &gas, &[])?;
        let changed = std::rc::Rc::new(std::cell::RefCell::new(0));
        {
            let changed = std::rc::Rc::clone(&changed);
            list.signals_mut()
                .cell_changed
                .connect(move |_| *changed.borrow_mut() += 1);
        }
        let ev = list.next_crossing(0, &gas)?;
        gas.r[0][0] += ev.dt * gas.v[0][0];

        let mut sched = Refusing::default();
        let err = list
            .on_crossing(0, ev.face, &gas, &mut sched)
            .expect_err("the slab holds particle 1");
        assert!(err.to_string().contains("candidate 1 refused"));

        let cell = list.cell_of(0).expect("particle is binned");
        assert_eq!(MortonNumber::from_cell_id(cell).coords(), [1, 0, 0]);
        assert_eq!(sched.pushed.len(), 1);
        assert_eq!(sched.pushed[0].0, 0);
        assert!((sched.pushed[0].1.dt - 1.0).abs() < 1e-12);
        assert_eq!(*changed.borrow(), 0);
        Ok(())
    }

    #[test]
    fn same_cell_and_neighbourhood_exclude_self() -> Result<()> {
        let gas = Gas {
            l: 5.0,
            r: vec![[0.1, 0.1, 0.1], [0.2, 0.2, 0.2], [1.2, 0.1, 0.1], [2.4, 0.1, 0.1]],
            v: vec![[0.0; 3]; 4],
        };
        let mut list = CellList::new(no_skin())?;
        list.reinitialise(0.99, &gas, &[])?;
        let mut same = Vec::new();
        list.same_cell(0, |q| same.push(q))?;
        assert_eq!(same, vec![1]);
        let mut near = Vec::new();
        list.neighbourhood(0, |q| near.push(q))?;
        near.sort_unstable();
        assert_eq!(near, vec![1, 2]);
        Ok(())
    }
}
