//! Processor caching and stage execution.

use super::{HitsOverlapQuery, Kcc};
use crate::error::{KccError, KccResult};
use crate::pipeline::{CachedProcessor, StageKind};
use crate::settings::MAX_NESTED_STAGES;

impl Kcc {
    /// Selects the processors of the current move: registered processors
    /// plus those provided by current modifiers and collisions, filtered by
    /// [`Processor::is_active`](crate::pipeline::Processor::is_active) and
    /// stable-sorted by descending priority.
    pub fn cache_processors(&mut self) {
        let mut cached = std::mem::take(&mut self.cached_processors);
        cached.clear();

        let data = &self.states[self.timeline.index()];
        for (id, type_id, processor) in self.processors.applicable(data) {
            if !processor.is_active(self) {
                continue;
            }
            cached.push(CachedProcessor {
                id,
                type_id,
                capabilities: processor.capabilities(),
                priority: processor.priority(self),
            });
        }

        cached.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        self.cached_processors = cached;
    }

    /// Runs every cached processor that implements `kind`.
    ///
    /// Processors may run nested stages from within; a processor that is
    /// already executing is skipped by the nested stage. Post-processes run
    /// after the last processor, a requested hit refresh after that.
    ///
    /// # Errors
    ///
    /// [`KccError::StageOverflow`] when nesting exceeds
    /// [`MAX_NESTED_STAGES`], or the first processor error.
    pub fn execute_stage(&mut self, kind: StageKind) -> KccResult<()> {
        let depth = self.stages.len();
        if depth >= MAX_NESTED_STAGES {
            tracing::error!("stage {:?} exceeds maximum nesting depth {}", kind, MAX_NESTED_STAGES);
            return Err(KccError::StageOverflow {
                stage: kind,
                depth,
                max: MAX_NESTED_STAGES,
            });
        }

        let mut frame = self.frame_pool.acquire();
        frame.begin(kind, depth);
        for cached in &self.cached_processors {
            if cached.capabilities.contains(kind) {
                frame.push(cached.id, cached.type_id);
            }
        }

        if depth > 0 {
            tracing::debug!("nested stage {:?} at depth {}", kind, depth);
        }

        self.stages.push(frame);
        let result = self.run_top_stage(kind);

        let update_hits = match self.stages.pop() {
            Some(mut frame) => {
                let update_hits = frame.take_update_hits();
                self.frame_pool.release(frame);
                update_hits
            }
            None => false,
        };

        result?;

        if update_hits {
            self.update_hits(HitsOverlapQuery::New);
            self.update_collisions();
        }
        Ok(())
    }

    fn run_top_stage(&mut self, kind: StageKind) -> KccResult<()> {
        while let Some(id) = self.stages.last_mut().and_then(|frame| frame.advance()) {
            let Some(mut processor) = self.processors.checkout(id) else {
                continue;
            };
            let result = processor.execute(kind, self);
            self.processors.checkin(id, processor);
            result?;
        }

        while let Some(post_process) = self.stages.last_mut().and_then(|frame| frame.pop_post_process()) {
            post_process(self)?;
        }
        Ok(())
    }
}
