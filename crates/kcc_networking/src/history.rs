//! # Fixed State History
//!
//! Ring of committed fixed states, one slot per tick modulo
//! [`HISTORY_SIZE`].
//!
//! ```text
//! tick:  118  119  120  ...  177  178
//! slot:   58   59    0  ...   57   58   <- 178 overwrote 118
//! ```
//!
//! A slot answers only for the tick it was written with. Asking for 118
//! after 178 was published returns `None`, never the newer state.

use kcc_core::settings::HISTORY_SIZE;
use kcc_core::MovementState;

/// Bounded history of fixed states.
#[derive(Debug)]
pub struct History {
    slots: Vec<Option<MovementState>>,
    latest_tick: Option<i32>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: (0..HISTORY_SIZE).map(|_| None).collect(),
            latest_tick: None,
        }
    }

    /// Number of ticks the ring can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        HISTORY_SIZE
    }

    /// Most recently published tick.
    #[inline]
    #[must_use]
    pub const fn latest_tick(&self) -> Option<i32> {
        self.latest_tick
    }

    #[allow(clippy::cast_sign_loss)]
    fn slot(tick: i32) -> usize {
        tick as usize % HISTORY_SIZE
    }

    /// State committed for `tick`, if it is still in the ring.
    #[must_use]
    pub fn get(&self, tick: i32) -> Option<&MovementState> {
        if tick < 0 {
            return None;
        }
        self.slots[Self::slot(tick)]
            .as_ref()
            .filter(|state| state.tick == tick)
    }

    /// Stores a copy of `state` under `state.tick`.
    ///
    /// Slot storage is allocated on first use and reused afterwards.
    pub fn publish(&mut self, state: &MovementState) {
        if state.tick < 0 {
            tracing::warn!("ignoring history publish for negative tick {}", state.tick);
            return;
        }

        match &mut self.slots[Self::slot(state.tick)] {
            Some(slot) => slot.copy_from(state),
            empty @ None => *empty = Some(state.clone()),
        }
        self.latest_tick = Some(self.latest_tick.map_or(state.tick, |latest| latest.max(state.tick)));
    }

    /// Whether a committed tick in `(after, until]` matches `predicate`.
    ///
    /// Ticks older than the ring are skipped.
    pub fn any_since(&self, after: i32, until: i32, predicate: impl Fn(&MovementState) -> bool) -> bool {
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        let span = HISTORY_SIZE as i32;
        let oldest = after.saturating_add(1).max(until.saturating_sub(span - 1));
        (oldest..=until).filter_map(|tick| self.get(tick)).any(predicate)
    }

    /// Forgets every tick, keeping slot storage.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.clear();
            // A cleared state reports tick 0, which must not match.
            slot.tick = -1;
        }
        self.latest_tick = None;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
