//! # Recycle Pool
//!
//! Free-list pool for scratch objects that are acquired and released many
//! times per tick.

/// Objects that can be returned to a [`RecyclePool`].
///
/// `recycle` must leave the object indistinguishable from a fresh one
/// apart from retained capacity.
pub trait Recycle {
    /// Clears all state, keeping allocations.
    fn recycle(&mut self);
}

/// A pool of reusable objects.
///
/// Acquiring pops a previously released object or creates a new one;
/// releasing resets the object and pushes it back on the free list.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Each controller owns its pools.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: RecyclePool<StageFrame> = RecyclePool::new(64);
///
/// let frame = pool.acquire();     // O(1), allocation-free after warm-up
/// pool.release(frame);            // O(1), frame is cleared
/// ```
#[derive(Debug)]
pub struct RecyclePool<T> {
    /// Released objects ready for reuse.
    free_list: Vec<T>,
    /// Maximum number of retained objects.
    capacity: usize,
    /// Objects handed out and not yet released.
    outstanding: usize,
    /// Objects created because the free list was empty.
    created: usize,
}

impl<T: Recycle + Default> RecyclePool<T> {
    /// Creates a pool that retains at most `capacity` released objects.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            free_list: Vec::with_capacity(capacity),
            capacity,
            outstanding: 0,
            created: 0,
        }
    }

    /// Creates a pool with `count` objects ready to hand out.
    #[must_use]
    pub fn prefilled(capacity: usize, count: usize) -> Self {
        let mut pool = Self::new(capacity);
        let count = count.min(capacity);
        pool.free_list.extend((0..count).map(|_| T::default()));
        pool.created = count;
        pool
    }

    /// Takes an object out of the pool.
    #[inline]
    pub fn acquire(&mut self) -> T {
        self.outstanding += 1;
        if let Some(item) = self.free_list.pop() {
            return item;
        }
        self.created += 1;
        T::default()
    }

    /// Returns an object to the pool, resetting it first.
    ///
    /// Objects beyond the retention capacity are dropped.
    #[inline]
    pub fn release(&mut self, mut item: T) {
        self.outstanding = self.outstanding.saturating_sub(1);
        item.recycle();
        if self.free_list.len() < self.capacity {
            self.free_list.push(item);
        }
    }

    /// Number of objects waiting on the free list.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Number of objects currently handed out.
    #[inline]
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Total objects created since the pool was built.
    #[inline]
    #[must_use]
    pub const fn created(&self) -> usize {
        self.created
    }

    /// Drops every retained object.
    pub fn clear(&mut self) {
        self.free_list.clear();
    }
}

impl<T: Recycle + Default> Default for RecyclePool<T> {
    fn default() -> Self {
        Self::new(64)
    }
}
