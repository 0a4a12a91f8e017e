//! Intrusive per-cell occupancy lists.
//!
//! One head slot per cell and one link record per particle, all indices into
//! flat arrays. Insertion and removal rewire a handful of links and never
//! allocate once the arrays are sized.

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    cell: Option<usize>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Cell membership for every particle.
#[derive(Debug, Clone, Default)]
pub struct MembershipLedger {
    heads: Vec<Option<usize>>,
    links: Vec<Link>,
}

impl MembershipLedger {
    /// Empty ledger with `num_cells` head slots and `num_particles` link slots.
    pub fn new(num_cells: usize, num_particles: usize) -> Self {
        Self {
            heads: vec![None; num_cells],
            links: vec![Link::default(); num_particles],
        }
    }

    /// Drop all membership and resize for a rebuilt grid.
    pub fn reset(&mut self, num_cells: usize, num_particles: usize) {
        self.heads.clear();
        self.heads.resize(num_cells, None);
        self.links.clear();
        self.links.resize(num_particles, Link::default());
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.heads.len()
    }

    #[inline]
    pub fn num_particles(&self) -> usize {
        self.links.len()
    }

    /// Cell currently holding `particle`, if any.
    #[inline]
    pub fn cell_of(&self, particle: usize) -> Option<usize> {
        self.links.get(particle).and_then(|l| l.cell)
    }

    /// Push `particle` onto the head of `cell`'s list.
    ///
    /// The particle must not be in any list.
    pub fn insert(&mut self, particle: usize, cell: usize) {
        debug_assert!(
            self.links[particle].cell.is_none(),
            "particle {particle} inserted while already in cell {:?}",
            self.links[particle].cell
        );
        let old_head = self.heads[cell];
        if let Some(h) = old_head {
            self.links[h].prev = Some(particle);
        }
        self.links[particle] = Link {
            cell: Some(cell),
            prev: None,
            next: old_head,
        };
        self.heads[cell] = Some(particle);
    }

    /// Unlink `particle` from its cell and return that cell.
    ///
    /// The particle must be in a list.
    pub fn remove(&mut self, particle: usize) -> Option<usize> {
        let link = self.links[particle];
        debug_assert!(
            link.cell.is_some(),
            "particle {particle} removed while not in any cell"
        );
        let cell = link.cell?;
        match link.prev {
            Some(p) => self.links[p].next = link.next,
            None => self.heads[cell] = link.next,
        }
        if let Some(n) = link.next {
            self.links[n].prev = link.prev;
        }
        self.links[particle] = Link::default();
        Some(cell)
    }

    /// Iterate the particles listed in `cell`.
    #[inline]
    pub fn iter_cell(&self, cell: usize) -> CellMembers<'_> {
        CellMembers {
            ledger: self,
            cursor: self.heads[cell],
        }
    }

    /// Whether `cell` has no occupants.
    #[inline]
    pub fn is_cell_empty(&self, cell: usize) -> bool {
        self.heads[cell].is_none()
    }
}

/// Iterator over one cell's occupancy list.
pub struct CellMembers<'a> {
    ledger: &'a MembershipLedger,
    cursor: Option<usize>,
}

impl Iterator for CellMembers<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        let current = self.cursor?;
        self.cursor = self.ledger.links[current].next;
        Some(current)
    }
}
