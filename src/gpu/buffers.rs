// gpu/buffers.rs — Dimension-keyed lazy resource slot.
//
// Device buffers for the edge kernel depend only on the frame size. The
// slot holds at most one set of resources together with the (width, height)
// they were built for, and rebuilds only when asked for a different size.
// It knows nothing about wgpu, so the reuse rule is tested without a GPU.

/// Holds a `T` built for a particular (width, height).
#[derive(Debug)]
pub struct SizedSlot<T> {
    current: Option<((usize, usize), T)>,
    allocations: usize,
}

impl<T> SizedSlot<T> {
    pub fn new() -> Self {
        SizedSlot { current: None, allocations: 0 }
    }

    /// Return the resources for `width`×`height`, calling `alloc` first if
    /// the slot is empty or sized differently.
    ///
    /// On allocation failure the slot is left empty, so the next call
    /// retries from scratch.
    pub fn ensure<E, F>(&mut self, width: usize, height: usize, alloc: F) -> Result<&mut T, E>
    where
        F: FnOnce(usize, usize) -> Result<T, E>,
    {
        let fits = matches!(&self.current, Some((dims, _)) if *dims == (width, height));
        if !fits {
            // Drop the old set before building the new one.
            self.current = None;
            let value = alloc(width, height)?;
            self.allocations += 1;
            self.current = Some(((width, height), value));
        }
        match &mut self.current {
            Some((_, value)) => Ok(value),
            None => unreachable!("slot filled above"),
        }
    }

    /// Dimensions of the held resources.
    pub fn dims(&self) -> Option<(usize, usize)> {
        self.current.as_ref().map(|(d, _)| *d)
    }

    /// How many times `alloc` has succeeded.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

impl<T> Default for SizedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
