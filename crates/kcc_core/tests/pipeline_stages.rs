//! # Stage Pipeline Integration Test
//!
//! Custom processors driving the stage machinery of a spawned controller.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use kcc_core::{
    Capabilities, FixedStep, Kcc, KccError, KccResult, KccSettings, NetworkId, Processor, ProcessorId, StageKind,
    StaticCollider, StaticWorld, Timeline, Vec3,
};

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn spawned(world: StaticWorld) -> Kcc {
    let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
    kcc.spawn(Vec3::ZERO, 0.0, 0.0, FixedStep::default()).unwrap();
    kcc
}

fn run(kcc: &mut Kcc, stage: StageKind) -> KccResult<()> {
    kcc.cache_processors();
    kcc.execute_stage(stage)
}

// ============================================================================
// PROCESSORS
// ============================================================================

struct Recorder {
    name: &'static str,
    priority: f32,
    active: bool,
    log: Log,
}

impl Recorder {
    fn new(name: &'static str, priority: f32, log: &Log) -> Self {
        Self {
            name,
            priority,
            active: true,
            log: Arc::clone(log),
        }
    }
}

impl Processor for Recorder {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::BeginMove) | StageKind::EndMove
    }

    fn priority(&self, _kcc: &Kcc) -> f32 {
        self.priority
    }

    fn is_active(&self, _kcc: &Kcc) -> bool {
        self.active
    }

    fn execute(&mut self, stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        let level = kcc.stage_frame_mut().map_or(usize::MAX, |frame| frame.level());
        push(&self.log, format!("{}:{stage:?}:{level}", self.name));
        Ok(())
    }
}

/// Always scheduled last and only ever suppressed by type.
struct Late {
    log: Log,
}

impl Processor for Late {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::BeginMove)
    }

    fn priority(&self, _kcc: &Kcc) -> f32 {
        -100.0
    }

    fn execute(&mut self, _stage: StageKind, _kcc: &mut Kcc) -> KccResult<()> {
        push(&self.log, "late");
        Ok(())
    }
}

struct Silencer {
    log: Log,
}

impl Processor for Silencer {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::BeginMove)
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        if let Some(frame) = kcc.stage_frame_mut() {
            push(&self.log, format!("executed recorder: {}", frame.has_executed_processor_of::<Recorder>()));
            push(&self.log, format!("pending late: {}", frame.has_pending_processor_of::<Late>()));
            push(&self.log, format!("suppressed: {}", frame.suppress_processors_of::<Late>()));
        }
        Ok(())
    }
}

/// Re-enters its own stage from a post-process, one level deeper each time.
struct Recursion {
    runs: Arc<AtomicU32>,
}

impl Processor for Recursion {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::Interpolate)
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(frame) = kcc.stage_frame_mut() {
            frame.enqueue_post_process(|kcc| kcc.execute_stage(StageKind::Interpolate));
        }
        Ok(())
    }
}

struct Deferring {
    log: Log,
}

impl Processor for Deferring {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::EndMove)
    }

    fn priority(&self, _kcc: &Kcc) -> f32 {
        10.0
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        push(&self.log, "deferring");
        if let Some(frame) = kcc.stage_frame_mut() {
            for index in 1..=3 {
                let log = Arc::clone(&self.log);
                frame.enqueue_post_process(move |_kcc| {
                    push(&log, format!("post{index}"));
                    Ok(())
                });
            }
        }
        Ok(())
    }
}

struct Nesting;

impl Processor for Nesting {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::EndMove)
    }

    fn priority(&self, _kcc: &Kcc) -> f32 {
        100.0
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        kcc.execute_stage(StageKind::BeginMove)
    }
}

/// Moves the actor into a collider and asks for a hit refresh.
struct Mover {
    target: Vec3,
    refresh: bool,
}

impl Processor for Mover {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::EndMove)
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        kcc.data_mut().target_position = self.target;
        if self.refresh {
            if let Some(frame) = kcc.stage_frame_mut() {
                frame.request_update_hits();
            }
        }
        Ok(())
    }
}

struct SelfRemoving {
    id: Arc<Mutex<Option<ProcessorId>>>,
    runs: Arc<AtomicU32>,
}

impl Processor for SelfRemoving {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::BeginMove)
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let id = *self.id.lock().unwrap();
        if let Some(id) = id {
            assert!(kcc.remove_processor(id));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_nested_stages_overflow_at_limit() {
    let runs = Arc::new(AtomicU32::new(0));
    let mut kcc = spawned(StaticWorld::new());
    kcc.add_processor(Recursion {
        runs: Arc::clone(&runs),
    });
    kcc.end_fixed_update();

    let result = kcc.run_interpolate_stage();

    assert!(matches!(
        result,
        Err(KccError::StageOverflow {
            stage: StageKind::Interpolate,
            depth: 32,
            max: 32,
        })
    ));
    assert_eq!(runs.load(Ordering::SeqCst), 32);
    assert_eq!(kcc.stage_depth(), 0);
}

#[test]
fn test_priority_order_and_type_suppression() {
    let log = Log::default();
    let mut kcc = spawned(StaticWorld::new());
    kcc.add_processor(Late { log: Arc::clone(&log) });
    kcc.add_processor(Silencer { log: Arc::clone(&log) });
    kcc.add_processor(Recorder::new("low", -1.0, &log));
    kcc.add_processor(Recorder::new("high", 1.0, &log));

    run(&mut kcc, StageKind::BeginMove).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "high:BeginMove:0",
            "executed recorder: true",
            "pending late: true",
            "suppressed: true",
            "low:BeginMove:0",
        ]
    );
}

#[test]
fn test_inactive_processors_are_not_cached() {
    let log = Log::default();
    let mut kcc = spawned(StaticWorld::new());
    kcc.add_processor(Recorder {
        active: false,
        ..Recorder::new("inactive", 0.0, &log)
    });
    kcc.add_processor(Recorder::new("active", 0.0, &log));

    run(&mut kcc, StageKind::EndMove).unwrap();

    assert_eq!(kcc.cached_processors().len(), 1);
    assert_eq!(entries(&log), vec!["active:EndMove:0"]);
}

#[test]
fn test_post_processes_run_in_enqueue_order_after_processors() {
    let log = Log::default();
    let mut kcc = spawned(StaticWorld::new());
    kcc.add_processor(Deferring { log: Arc::clone(&log) });
    kcc.add_processor(Recorder::new("recorder", 0.0, &log));

    run(&mut kcc, StageKind::EndMove).unwrap();

    assert_eq!(
        entries(&log),
        vec!["deferring", "recorder:EndMove:0", "post1", "post2", "post3"]
    );
}

#[test]
fn test_nested_stage_skips_running_processor() {
    let log = Log::default();
    let mut kcc = spawned(StaticWorld::new());
    kcc.add_processor(Nesting);
    kcc.add_processor(Recorder::new("recorder", 0.0, &log));

    run(&mut kcc, StageKind::EndMove).unwrap();

    assert_eq!(entries(&log), vec!["recorder:BeginMove:1", "recorder:EndMove:0"]);
    assert_eq!(kcc.stage_depth(), 0);
}

#[test]
fn test_requested_hit_refresh_tracks_new_position() {
    let crate_id = NetworkId::object(3);
    let world = || {
        StaticWorld::new()
            .with(StaticCollider::sphere(Vec3::new(5.0, 0.5, 0.0), 0.5).networked(crate_id))
    };

    let mut without = spawned(world());
    without.add_processor(Mover {
        target: Vec3::new(5.0, 0.0, 0.0),
        refresh: false,
    });
    run(&mut without, StageKind::EndMove).unwrap();
    assert!(without.data().hits.is_empty());
    assert!(without.data().collisions.is_empty());

    let mut with = spawned(world());
    with.add_processor(Mover {
        target: Vec3::new(5.0, 0.0, 0.0),
        refresh: true,
    });
    run(&mut with, StageKind::EndMove).unwrap();
    assert_eq!(with.data().hits.len(), 1);
    assert!(with.data().collisions.contains(crate_id));
}

#[test]
fn test_processor_removed_while_running() {
    let id = Arc::new(Mutex::new(None));
    let runs = Arc::new(AtomicU32::new(0));
    let mut kcc = spawned(StaticWorld::new());
    let registered = kcc.add_processor(SelfRemoving {
        id: Arc::clone(&id),
        runs: Arc::clone(&runs),
    });
    *id.lock().unwrap() = Some(registered);

    run(&mut kcc, StageKind::BeginMove).unwrap();
    assert_eq!(kcc.processor_count(), 0);

    run(&mut kcc, StageKind::BeginMove).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_provided_processor_follows_modifiers() {
    let provider = NetworkId::object(9);
    let log = Log::default();
    let mut kcc = spawned(StaticWorld::new());
    kcc.add_provided_processor(Recorder::new("provided", 0.0, &log), provider);

    run(&mut kcc, StageKind::BeginMove).unwrap();
    assert!(entries(&log).is_empty());

    kcc.add_modifier(provider, Timeline::Fixed).unwrap();
    run(&mut kcc, StageKind::BeginMove).unwrap();
    assert_eq!(entries(&log), vec!["provided:BeginMove:0"]);

    kcc.remove_modifier(provider, Timeline::Fixed).unwrap();
    assert_eq!(kcc.remove_provided_processors(provider), 1);
    assert_eq!(kcc.processor_count(), 0);
}
