//! # Stage Frames
//!
//! One [`StageFrame`] per active stage. The processor list is frozen when
//! the stage starts; the cursor splits it into executed and pending
//! entries. Suppression only touches pending entries.

use std::any::TypeId;
use std::fmt;

use crate::error::KccResult;
use crate::integrator::Kcc;
use crate::memory::Recycle;
use crate::settings::CACHE_SIZE;

/// Extension points of a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Start of a predicted move, before any input is consumed.
    BeginMove,
    /// Velocities are computed from inputs.
    PrepareData,
    /// After depenetration of each CCD substep.
    AfterMoveStep,
    /// End of a predicted move.
    EndMove,
    /// Proxy state was interpolated from network data.
    Interpolate,
}

impl StageKind {
    /// Every stage in execution order.
    pub const ALL: [Self; 5] = [
        Self::BeginMove,
        Self::PrepareData,
        Self::AfterMoveStep,
        Self::EndMove,
        Self::Interpolate,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        match self {
            Self::BeginMove => 1 << 0,
            Self::PrepareData => 1 << 1,
            Self::AfterMoveStep => 1 << 2,
            Self::EndMove => 1 << 3,
            Self::Interpolate => 1 << 4,
        }
    }
}

/// Stages a processor takes part in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No stage.
    pub const NONE: Self = Self(0);

    /// A single stage.
    #[must_use]
    pub const fn only(stage: StageKind) -> Self {
        Self(stage.bit())
    }

    /// `stage` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, stage: StageKind) -> bool {
        self.0 & stage.bit() != 0
    }
}

impl std::ops::BitOr<StageKind> for Capabilities {
    type Output = Self;
    fn bitor(self, rhs: StageKind) -> Self {
        Self(self.0 | rhs.bit())
    }
}

/// Handle of a registered processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(pub(crate) u32);

impl ProcessorId {
    /// Slot index in the registry.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Callback queued by a processor, runs once every processor of the stage
/// has executed.
pub type PostProcess = Box<dyn FnOnce(&mut Kcc) -> KccResult<()> + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    id: ProcessorId,
    type_id: TypeId,
}

// ============================================================================
// STAGE FRAME
// ============================================================================

/// One activation of a stage.
pub struct StageFrame {
    kind: StageKind,
    level: usize,
    entries: Vec<Option<Entry>>,
    /// Entry being executed.
    cursor: usize,
    /// Next entry to execute.
    next: usize,
    post_processes: Vec<PostProcess>,
    update_hits: bool,
}

impl StageFrame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kind: StageKind::BeginMove,
            level: 0,
            entries: Vec::with_capacity(CACHE_SIZE),
            cursor: 0,
            next: 0,
            post_processes: Vec::new(),
            update_hits: false,
        }
    }

    pub(crate) fn begin(&mut self, kind: StageKind, level: usize) {
        self.recycle();
        self.kind = kind;
        self.level = level;
    }

    pub(crate) fn push(&mut self, id: ProcessorId, type_id: TypeId) {
        self.entries.push(Some(Entry { id, type_id }));
    }

    /// Moves the cursor to the next pending processor.
    pub(crate) fn advance(&mut self) -> Option<ProcessorId> {
        while self.next < self.entries.len() {
            let index = self.next;
            self.next += 1;
            if let Some(entry) = self.entries[index] {
                self.cursor = index;
                return Some(entry.id);
            }
        }
        self.cursor = self.entries.len();
        None
    }

    pub(crate) fn pop_post_process(&mut self) -> Option<PostProcess> {
        if self.post_processes.is_empty() {
            None
        } else {
            Some(self.post_processes.remove(0))
        }
    }

    pub(crate) fn take_update_hits(&mut self) -> bool {
        std::mem::take(&mut self.update_hits)
    }

    /// Stage being executed.
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        self.kind
    }

    /// Nesting level, zero for a top-level stage.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Number of processors captured at stage entry, suppressed included.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.entries.len()
    }

    fn pending(&self) -> impl Iterator<Item = &Entry> {
        self.entries[self.next.min(self.entries.len())..]
            .iter()
            .flatten()
    }

    fn executed(&self) -> impl Iterator<Item = &Entry> {
        self.entries[..self.cursor.min(self.entries.len())]
            .iter()
            .flatten()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// `id` is scheduled later in this stage.
    #[must_use]
    pub fn has_pending_processor(&self, id: ProcessorId) -> bool {
        self.pending().any(|e| e.id == id)
    }

    /// A processor of type `T` is scheduled later in this stage.
    #[must_use]
    pub fn has_pending_processor_of<T: 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.pending().any(|e| e.type_id == type_id)
    }

    /// `id` already ran in this stage.
    #[must_use]
    pub fn has_executed_processor(&self, id: ProcessorId) -> bool {
        self.executed().any(|e| e.id == id)
    }

    /// A processor of type `T` already ran in this stage.
    #[must_use]
    pub fn has_executed_processor_of<T: 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.executed().any(|e| e.type_id == type_id)
    }

    // ========================================================================
    // SUPPRESSION
    // ========================================================================

    /// Removes `id` from the pending processors.
    pub fn suppress_processor(&mut self, id: ProcessorId) -> bool {
        self.suppress_pending(|e| e.id == id)
    }

    /// Removes every pending processor of type `T`.
    pub fn suppress_processors_of<T: 'static>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();
        self.suppress_pending(|e| e.type_id == type_id)
    }

    /// Removes every pending processor except `id`.
    pub fn suppress_processors_except(&mut self, id: ProcessorId) -> bool {
        self.suppress_pending(|e| e.id != id)
    }

    /// Removes every pending processor that is not of type `T`.
    pub fn suppress_processors_except_of<T: 'static>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();
        self.suppress_pending(|e| e.type_id != type_id)
    }

    /// Removes every pending processor.
    pub fn suppress_all_processors(&mut self) -> bool {
        self.suppress_pending(|_| true)
    }

    fn suppress_pending(&mut self, mut matches: impl FnMut(&Entry) -> bool) -> bool {
        let start = self.next.min(self.entries.len());
        let mut suppressed = false;
        for slot in &mut self.entries[start..] {
            if slot.as_ref().is_some_and(&mut matches) {
                *slot = None;
                suppressed = true;
            }
        }
        suppressed
    }

    // ========================================================================
    // DEFERRED WORK
    // ========================================================================

    /// Queues `callback` to run after every processor of this stage.
    pub fn enqueue_post_process(
        &mut self,
        callback: impl FnOnce(&mut Kcc) -> KccResult<()> + Send + 'static,
    ) {
        self.post_processes.push(Box::new(callback));
    }

    /// Number of queued post-processes.
    #[must_use]
    pub fn post_process_count(&self) -> usize {
        self.post_processes.len()
    }

    /// Refreshes tracked hits with a new overlap query once the stage ends.
    pub fn request_update_hits(&mut self) {
        self.update_hits = true;
    }
}

impl Default for StageFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl Recycle for StageFrame {
    fn recycle(&mut self) {
        self.kind = StageKind::BeginMove;
        self.level = 0;
        self.entries.clear();
        self.cursor = 0;
        self.next = 0;
        self.post_processes.clear();
        self.update_hits = false;
    }
}

impl fmt::Debug for StageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageFrame")
            .field("kind", &self.kind)
            .field("level", &self.level)
            .field("entries", &self.entries)
            .field("cursor", &self.cursor)
            .field("post_processes", &self.post_processes.len())
            .field("update_hits", &self.update_hits)
            .finish()
    }
}
