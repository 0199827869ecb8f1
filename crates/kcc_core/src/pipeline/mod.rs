//! # Stage Pipeline
//!
//! Processors inject behavior at fixed points of a move.
//!
//! ## Execution Model
//!
//! ```text
//! cache_processors()            once per move, sorted by priority
//!        │
//!        ▼
//! execute_stage(kind)           snapshot of processors with `kind`
//!        │
//!        ├── processor A ──► may run execute_stage(other) (nested)
//!        ├── processor B ──► may suppress pending processors
//!        ├── post-processes     in enqueue order
//!        └── hit refresh        if requested
//! ```
//!
//! Processors live in a slab and are addressed by [`ProcessorId`]. While a
//! processor executes, its slot is empty; a nested stage simply skips it.

mod stage;

pub use stage::{Capabilities, PostProcess, ProcessorId, StageFrame, StageKind};

use std::any::TypeId;

use crate::data::{MovementState, NetworkId};
use crate::error::KccResult;
use crate::integrator::Kcc;

/// Pluggable movement behavior.
///
/// A processor declares the stages it implements through
/// [`Processor::capabilities`]; the pipeline calls [`Processor::execute`]
/// only for those.
pub trait Processor: Send + 'static {
    /// Stages this processor takes part in.
    fn capabilities(&self) -> Capabilities;

    /// Higher priority executes first. Ties keep registration order.
    fn priority(&self, _kcc: &Kcc) -> f32 {
        0.0
    }

    /// Inactive processors are left out of the move.
    fn is_active(&self, _kcc: &Kcc) -> bool {
        true
    }

    /// Runs the processor for one stage.
    ///
    /// The active movement state is available through [`Kcc::data_mut`],
    /// the current stage frame through [`Kcc::stage_frame_mut`].
    ///
    /// # Errors
    ///
    /// Errors abort the stage and propagate out of the move.
    fn execute(&mut self, stage: StageKind, kcc: &mut Kcc) -> KccResult<()>;
}

// ============================================================================
// REGISTRY
// ============================================================================

enum SlotState {
    Idle(Box<dyn Processor>),
    Running,
    Vacant,
}

struct Slot {
    state: SlotState,
    type_id: TypeId,
    provider: Option<NetworkId>,
}

/// Slab of registered processors.
///
/// Slots are never reused, so an id stays unique for the lifetime of the
/// registry.
#[derive(Default)]
pub struct ProcessorRegistry {
    slots: Vec<Slot>,
}

/// Processor selected for the current move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CachedProcessor {
    /// Registry handle.
    pub id: ProcessorId,
    /// Concrete type, used by type-based suppression.
    pub type_id: TypeId,
    /// Stages the processor takes part in.
    pub capabilities: Capabilities,
    /// Priority at caching time.
    pub priority: f32,
}

impl ProcessorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Registers a processor that takes part in every move.
    pub fn add<P: Processor>(&mut self, processor: P) -> ProcessorId {
        self.insert(Box::new(processor), TypeId::of::<P>(), None)
    }

    /// Registers a processor provided by a networked object. It only takes
    /// part in moves while `provider` is among the actor's modifiers or
    /// collisions.
    pub fn add_provided<P: Processor>(&mut self, processor: P, provider: NetworkId) -> ProcessorId {
        self.insert(Box::new(processor), TypeId::of::<P>(), Some(provider))
    }

    fn insert(
        &mut self,
        processor: Box<dyn Processor>,
        type_id: TypeId,
        provider: Option<NetworkId>,
    ) -> ProcessorId {
        #[allow(clippy::cast_possible_truncation)]
        let id = ProcessorId(self.slots.len() as u32);
        self.slots.push(Slot {
            state: SlotState::Idle(processor),
            type_id,
            provider,
        });
        id
    }

    /// Unregisters a processor. A processor removed while it executes is
    /// dropped as soon as it returns.
    pub fn remove(&mut self, id: ProcessorId) -> Option<Box<dyn Processor>> {
        let slot = self.slots.get_mut(id.index())?;
        match std::mem::replace(&mut slot.state, SlotState::Vacant) {
            SlotState::Idle(processor) => Some(processor),
            SlotState::Running | SlotState::Vacant => None,
        }
    }

    /// Unregisters every processor provided by `provider` and returns how
    /// many were registered. Running ones are dropped when they return.
    pub fn remove_provided(&mut self, provider: NetworkId) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if slot.provider != Some(provider) || matches!(slot.state, SlotState::Vacant) {
                continue;
            }
            slot.state = SlotState::Vacant;
            removed += 1;
        }
        removed
    }

    /// Drops every processor.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ProcessorId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| !matches!(slot.state, SlotState::Vacant))
    }

    /// Number of registered processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !matches!(slot.state, SlotState::Vacant))
            .count()
    }

    /// No processor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter_slots(&self) -> impl Iterator<Item = (ProcessorId, &Slot)> {
        self.slots.iter().enumerate().map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let id = ProcessorId(index as u32);
            (id, slot)
        })
    }

    /// Idle processors applicable to `data`, in registration order.
    pub(crate) fn applicable<'a>(
        &'a self,
        data: &'a MovementState,
    ) -> impl Iterator<Item = (ProcessorId, TypeId, &'a dyn Processor)> + 'a {
        self.iter_slots().filter_map(move |(id, slot)| {
            let SlotState::Idle(processor) = &slot.state else {
                return None;
            };
            let provided = slot
                .provider
                .map_or(true, |p| data.modifiers.contains(p) || data.collisions.contains(p));
            provided.then_some((id, slot.type_id, processor.as_ref()))
        })
    }

    /// Takes a processor out for execution.
    pub(crate) fn checkout(&mut self, id: ProcessorId) -> Option<Box<dyn Processor>> {
        let slot = self.slots.get_mut(id.index())?;
        match std::mem::replace(&mut slot.state, SlotState::Running) {
            SlotState::Idle(processor) => Some(processor),
            other => {
                slot.state = other;
                None
            }
        }
    }

    /// Returns a processor after execution.
    pub(crate) fn checkin(&mut self, id: ProcessorId, processor: Box<dyn Processor>) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if matches!(slot.state, SlotState::Running) {
                slot.state = SlotState::Idle(processor);
            }
        }
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("slots", &self.slots.len())
            .field("registered", &self.len())
            .finish()
    }
}
