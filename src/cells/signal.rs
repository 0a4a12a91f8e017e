//! Synchronous multi-subscriber callback lists.

use std::fmt;

/// Handle returned by [`Signal::connect`], used to disconnect later.
pub type SlotId = usize;

/// An ordered list of callbacks, all invoked on every [`Signal::emit`].
pub struct Signal<A> {
    slots: Vec<(SlotId, Box<dyn FnMut(A)>)>,
    next_id: SlotId,
}

impl<A: Copy> Signal<A> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a callback; it runs after every previously connected one.
    pub fn connect<F>(&mut self, f: F) -> SlotId
    where
        F: FnMut(A) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.push((id, Box::new(f)));
        id
    }

    /// Remove a callback. Returns `false` if `id` was not connected.
    pub fn disconnect(&mut self, id: SlotId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(sid, _)| *sid != id);
        self.slots.len() != before
    }

    /// Invoke every callback in registration order.
    #[inline]
    pub fn emit(&mut self, args: A) {
        for (_, slot) in &mut self.slots {
            slot(args);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<A: Copy> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// The notification channels a cell list publishes.
#[derive(Debug, Default)]
pub struct CellSignals {
    /// `(particle, other)`: `other` just came within look-ahead range.
    pub new_neighbour: Signal<(usize, usize)>,
    /// `(particle, local_id)`: the particle entered a cell bound to the local.
    pub new_local: Signal<(usize, usize)>,
    /// `(particle, old_cell)`: the particle finished migrating out of `old_cell`.
    pub cell_changed: Signal<(usize, usize)>,
    /// The grid was rebuilt; every previously derived event is stale.
    pub reinitialised: Signal<()>,
}
