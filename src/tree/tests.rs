//! Tests for the tree executor.

use super::*;
use crate::events::{EventKind, EventStream, MemorySink};
use crate::hooks::{HookEntry, HookPipeline, HookRegistry, HookResult, InProcessRuntime};
use crate::space::{Dimension, WindowPolicy};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

type CallLog = Rc<RefCell<Vec<String>>>;

const ALL_STAGES: [&str; 6] = ["node_start", "pre", "generate", "post", "node_end", "error"];

fn block(path: &str, values: usize) -> Block {
    Block::new(path.parse().unwrap(), "{d}")
        .with_dimension(Dimension::local("d", (0..values).map(|i| format!("v{}", i))))
}

fn entry(ctx: &crate::hooks::ExecutionContext) -> String {
    let id = ctx
        .composition_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{}@{}#{}", ctx.stage, ctx.block_path, id)
}

/// Pipeline with a `trace` script on every stage, plus whatever `extra`
/// registers after it.
fn pipeline_with(
    log: &CallLog,
    extra: impl FnOnce(&mut InProcessRuntime, &mut HookRegistry),
) -> HookPipeline {
    let mut runtime = InProcessRuntime::new();
    let trace_log = Rc::clone(log);
    runtime.register("trace", move |ctx, _| {
        trace_log.borrow_mut().push(entry(ctx));
        Ok(HookResult::success())
    });
    let mut registry = HookRegistry::new();
    for stage in ALL_STAGES {
        registry.register(stage, HookEntry::new("trace", "trace"));
    }
    extra(&mut runtime, &mut registry);
    HookPipeline::new(registry, Box::new(runtime))
}

fn run_with(
    pipeline: &HookPipeline,
    roots: &[Block],
    cancel: &dyn CancelSignal,
    options: RunOptions,
) -> (RunReport, MemorySink) {
    let memory = MemorySink::new();
    let mut events = EventStream::new().with_sink(memory.clone());
    let report = TreeExecutor::new("job", pipeline, &mut events, cancel, options)
        .run(roots)
        .unwrap();
    (report, memory)
}

fn run(pipeline: &HookPipeline, roots: &[Block]) -> (RunReport, MemorySink) {
    run_with(
        pipeline,
        roots,
        &NeverCancel,
        RunOptions::new(WindowPolicy::uniform(100)),
    )
}

fn composition_ids(memory: &MemorySink, block: &str) -> Vec<u64> {
    memory
        .kinds()
        .into_iter()
        .filter_map(|kind| match kind {
            EventKind::CompositionComplete { path, id } if path.to_string() == block => Some(id),
            _ => None,
        })
        .collect()
}

fn block_completions(memory: &MemorySink) -> Vec<(String, BlockState)> {
    memory
        .kinds()
        .into_iter()
        .filter_map(|kind| match kind {
            EventKind::BlockComplete { path, state } => Some((path.to_string(), state)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_own_compositions_then_children_in_order() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let roots = vec![block("0", 2).with_child(block("0.0", 2))];

    let (report, _) = run(&pipeline, &roots);

    let expected = vec![
        "node_start@0#-",
        "pre@0#0",
        "generate@0#0",
        "post@0#0",
        "pre@0#1",
        "generate@0#1",
        "post@0#1",
        "node_start@0.0#-",
        "pre@0.0#0",
        "generate@0.0#0",
        "post@0.0#0",
        "pre@0.0#1",
        "generate@0.0#1",
        "post@0.0#1",
        "node_end@0.0#-",
        "node_end@0#-",
    ];
    assert_eq!(*log.borrow(), expected);
    assert_eq!(report.block("0").unwrap().state, BlockState::Complete);
    assert_eq!(report.block("0.0").unwrap().state, BlockState::Complete);
    assert_eq!(report.stats.compositions_completed, 4);
}

#[test]
fn test_failure_is_contained_to_its_subtree() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |runtime, registry| {
        runtime.register("flaky", |ctx, _| {
            if ctx.block_path == "0.0" && ctx.composition_id == Some(1) {
                Ok(HookResult::error("quota exceeded"))
            } else {
                Ok(HookResult::success())
            }
        });
        registry.register("generate", HookEntry::new("flaky", "flaky"));
    });
    // root -> [A, B]; A has a child that must never run.
    let roots = vec![
        block("0", 1)
            .with_child(block("0.0", 2).with_child(block("0.0.0", 3)))
            .with_child(block("0.1", 2)),
    ];

    let (report, memory) = run(&pipeline, &roots);

    let a = report.block("0.0").unwrap();
    assert_eq!(a.state, BlockState::Failed);
    assert_eq!(a.completed, 1);
    assert_eq!(a.failed, 1);
    let failure = a.failure.as_ref().unwrap();
    assert_eq!(failure.composition_id, Some(1));
    assert_eq!(failure.stage, "generate");
    assert_eq!(failure.message, "quota exceeded");
    // `post` never ran for the failing composition.
    assert!(!log.borrow().contains(&"post@0.0#1".to_string()));

    let child = report.block("0.0.0").unwrap();
    assert_eq!(child.state, BlockState::Blocked);
    assert_eq!(child.blocked_by.as_ref().unwrap().to_string(), "0.0");
    assert!(log.borrow().iter().all(|e| !e.contains("@0.0.0#")));

    let b = report.block("0.1").unwrap();
    assert_eq!(b.state, BlockState::Complete);
    assert_eq!(b.completed, 2);
    assert_eq!(report.block("0").unwrap().state, BlockState::Complete);

    assert_eq!(report.stats.blocks["0.0"].failed, 1);
    assert!(report.stats.blocks["0.1"].complete);
    assert!(report.has_failures());

    // Blocked descendant completes before the failed block, which completes
    // before its sibling starts.
    let completions = block_completions(&memory);
    let order: Vec<&str> = completions.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(order, vec!["0.0.0", "0.0", "0.1", "0"]);
    assert_eq!(completions[0].1, BlockState::Blocked);
}

#[test]
fn test_cancellation_before_a_composition() {
    let log = CallLog::default();
    let flag = CancelFlag::new();
    let trip = flag.clone();
    let pipeline = pipeline_with(&log, move |runtime, registry| {
        runtime.register("trip", move |ctx, _| {
            if ctx.composition_id == Some(2) {
                trip.cancel();
            }
            Ok(HookResult::success())
        });
        registry.register("generate", HookEntry::new("trip", "trip"));
    });
    let roots = vec![block("0", 10).with_child(block("0.0", 1)), block("1", 2)];

    let (report, memory) = run_with(
        &pipeline,
        &roots,
        &flag,
        RunOptions::new(WindowPolicy::uniform(100)),
    );

    assert!(report.cancelled);
    assert_eq!(composition_ids(&memory, "0"), vec![0, 1, 2]);
    assert!(!log.borrow().contains(&"pre@0#3".to_string()));

    let root = report.block("0").unwrap();
    assert_eq!(root.state, BlockState::Cancelled);
    assert_eq!(root.completed, 3);
    assert_eq!(root.failed, 0);

    // Unvisited blocks are cancelled without node_start.
    for path in ["0.0", "1"] {
        assert_eq!(report.block(path).unwrap().state, BlockState::Cancelled);
        assert!(!log.borrow().contains(&format!("node_start@{}#-", path)));
    }
    assert_eq!(report.stats.cancelled, 3);
    assert!(!report.has_failures());
}

#[test]
fn test_cancelled_before_start() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let flag = CancelFlag::new();
    flag.cancel();
    let roots = vec![block("0", 2).with_child(block("0.0", 2))];

    let (report, memory) = run_with(
        &pipeline,
        &roots,
        &flag,
        RunOptions::new(WindowPolicy::uniform(100)),
    );

    assert!(log.borrow().is_empty());
    assert_eq!(report.stats.cancelled, 2);
    let kinds = memory.kinds();
    assert_eq!(kinds.first().unwrap().name(), "init");
    assert_eq!(kinds.last().unwrap().name(), "run_complete");
}

#[test]
fn test_node_start_fires_once_per_block() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let roots = vec![block("0", 3).with_child(block("0.0", 4))];

    run(&pipeline, &roots);

    let starts: Vec<String> = log
        .borrow()
        .iter()
        .filter(|e| e.starts_with("node_start@"))
        .cloned()
        .collect();
    assert_eq!(starts, vec!["node_start@0#-", "node_start@0.0#-"]);
}

#[test]
fn test_resolve_is_cached_per_block() {
    let pipeline = HookPipeline::new(HookRegistry::new(), Box::new(InProcessRuntime::new()));
    let mut events = EventStream::new();
    let b = block("0", 3);
    let mut executor = TreeExecutor::new(
        "job",
        &pipeline,
        &mut events,
        &NeverCancel,
        RunOptions::new(WindowPolicy::uniform(100)),
    );

    let first = executor.resolve(&b).unwrap();
    let second = executor.resolve(&b).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn test_parent_result_flows_to_children() {
    let log = CallLog::default();
    let seen: Rc<RefCell<Vec<Option<serde_json::Value>>>> = Rc::default();
    let seen_in_script = Rc::clone(&seen);
    let pipeline = pipeline_with(&log, move |runtime, registry| {
        runtime.register("gen", move |ctx, _| {
            seen_in_script
                .borrow_mut()
                .push(ctx.parent_result.as_ref().map(|p| p["outputs"]["generate"].clone()));
            Ok(HookResult::success_with(json!(format!(
                "img-{}-{}",
                ctx.block_path,
                ctx.composition_id.unwrap_or_default()
            ))))
        });
        registry.register("generate", HookEntry::new("gen", "gen"));
    });
    let roots = vec![block("0", 2).with_child(block("0.0", 1))];

    run(&pipeline, &roots);

    let seen = seen.borrow();
    assert_eq!(seen[0], None);
    assert_eq!(seen[1], None);
    // The child sees the parent's last successful composition.
    assert_eq!(seen[2], Some(json!("img-0-1")));
}

#[test]
fn test_raised_failure_fires_error_stage() {
    let log = CallLog::default();
    let payloads: Rc<RefCell<Vec<serde_json::Value>>> = Rc::default();
    let payloads_in_script = Rc::clone(&payloads);
    let pipeline = pipeline_with(&log, move |runtime, registry| {
        runtime.register("explode", |_, _| anyhow::bail!("connection reset"));
        runtime.register("on_error", move |ctx, _| {
            payloads_in_script
                .borrow_mut()
                .push(ctx.error.clone().unwrap_or_default());
            Ok(HookResult::success())
        });
        registry.register("post", HookEntry::new("explode", "explode"));
        registry.register("error", HookEntry::new("on_error", "on_error"));
    });
    let roots = vec![block("0", 3)];

    let (report, memory) = run(&pipeline, &roots);

    let payloads = payloads.borrow();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["stage"], "post");
    assert_eq!(payloads[0]["script"], "explode");
    assert!(payloads[0]["message"].as_str().unwrap().contains("connection reset"));

    let root = report.block("0").unwrap();
    assert_eq!(root.state, BlockState::Failed);
    assert_eq!(root.completed, 0);
    assert_eq!(root.failure.as_ref().unwrap().composition_id, Some(0));

    let errors: Vec<_> = memory
        .kinds()
        .into_iter()
        .filter(|k| k.name() == "error")
        .collect();
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_returned_error_and_missing_script_skip_error_stage() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, registry| {
        registry.register("pre", HookEntry::new("ghost", "scripts/missing"));
    });
    let roots = vec![block("0", 2), block("1", 1)];

    let (report, _) = run(&pipeline, &roots);

    assert!(log.borrow().iter().all(|e| !e.starts_with("error@")));
    let failure = report.block("0").unwrap().failure.clone().unwrap();
    assert_eq!(failure.stage, "pre");
    assert!(failure.message.contains("scripts/missing"));
    // Unrelated root paths still fail on their own, not because of "0".
    assert!(report.block("1").unwrap().blocked_by.is_none());
}

#[test]
fn test_skip_ends_only_the_current_stage() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |runtime, registry| {
        runtime.register("skipper", |_, _| Ok(HookResult::skip("cached")));
        registry.register("pre", HookEntry::new("skipper", "skipper"));
    });
    let roots = vec![block("0", 1)];

    let (report, _) = run(&pipeline, &roots);

    assert!(log.borrow().contains(&"generate@0#0".to_string()));
    assert_eq!(report.block("0").unwrap().state, BlockState::Complete);
}

#[test]
fn test_node_end_failure_fails_the_block() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |runtime, registry| {
        runtime.register("finalize", |_, _| Ok(HookResult::error("disk full")));
        registry.register("node_end", HookEntry::new("finalize", "finalize"));
    });
    let roots = vec![block("0", 2)];

    let (report, _) = run(&pipeline, &roots);

    let root = report.block("0").unwrap();
    assert_eq!(root.state, BlockState::Failed);
    assert_eq!(root.completed, 2);
    // No composition failed.
    assert_eq!(root.failed, 0);
    assert_eq!(report.stats.blocks["0"].failed, 0);
    let failure = root.failure.as_ref().unwrap();
    assert_eq!(failure.composition_id, None);
    assert_eq!(failure.stage, "node_end");
}

#[test]
fn test_bucket_limits_compositions() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let roots = vec![block("0", 5)];

    let options = RunOptions::new(WindowPolicy::uniform(2)).with_buckets(BucketPlan::all(2));
    let (report, memory) = run_with(&pipeline, &roots, &NeverCancel, options);

    // Windows: [v0,v1] [v2,v3] [v4]; bucket 2 holds only v4.
    assert_eq!(composition_ids(&memory, "0"), vec![4]);
    assert_eq!(report.block("0").unwrap().completed, 1);
}

#[test]
fn test_run_wide_bucket_leaves_smaller_blocks_whole() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    // Root has 3 buckets, the child only 1.
    let roots = vec![block("0", 5).with_child(block("0.0", 2))];

    let options = RunOptions::new(WindowPolicy::uniform(2)).with_buckets(BucketPlan::all(1));
    let (report, memory) = run_with(&pipeline, &roots, &NeverCancel, options);

    assert_eq!(composition_ids(&memory, "0"), vec![2, 3]);
    assert_eq!(composition_ids(&memory, "0.0"), vec![0, 1]);
    assert!(!report.has_failures());
}

#[test]
fn test_pinned_bucket_applies_to_its_block_only() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let roots = vec![block("0", 5).with_child(block("0.0", 4))];

    let plan = BucketPlan::default().with_block("0.0".parse().unwrap(), 1);
    let options = RunOptions::new(WindowPolicy::uniform(2)).with_buckets(plan);
    let (_, memory) = run_with(&pipeline, &roots, &NeverCancel, options);

    assert_eq!(composition_ids(&memory, "0"), vec![0, 1, 2, 3, 4]);
    assert_eq!(composition_ids(&memory, "0.0"), vec![2, 3]);
}

#[test]
fn test_node_start_results_reach_composition_stages() {
    let log = CallLog::default();
    let seen: Rc<RefCell<Vec<(Option<serde_json::Value>, Option<serde_json::Value>)>>> =
        Rc::default();
    let seen_in_script = Rc::clone(&seen);
    let pipeline = pipeline_with(&log, move |runtime, registry| {
        runtime.register("open_session", |_, _| {
            Ok(HookResult::success_with(json!("session-1")).with_context("seed", json!(42)))
        });
        runtime.register("gen", move |ctx, _| {
            seen_in_script.borrow_mut().push((
                ctx.outputs.get("node_start").cloned(),
                ctx.vars.get("seed").cloned(),
            ));
            Ok(HookResult::success().with_context("seed", json!(7)))
        });
        registry.register("node_start", HookEntry::new("open_session", "open_session"));
        registry.register("generate", HookEntry::new("gen", "gen"));
    });

    run(&pipeline, &[block("0", 2)]);

    // Each composition sees the block's values, not the previous composition's.
    let expected = (Some(json!("session-1")), Some(json!(42)));
    assert_eq!(*seen.borrow(), vec![expected.clone(), expected]);
}

#[test]
fn test_node_start_fires_before_block_start() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let (_, memory) = run(&pipeline, &[block("0", 1)]);

    let names: Vec<&str> = memory.kinds().iter().map(|k| k.name()).take(3).collect();
    assert_eq!(names, vec!["init", "stage", "block_start"]);
}

#[test]
fn test_node_start_failure_still_starts_and_fails_the_block() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |runtime, registry| {
        runtime.register("refuse", |_, _| Ok(HookResult::error("no session")));
        registry.register("node_start", HookEntry::new("refuse", "refuse"));
    });
    let roots = vec![block("0", 2).with_child(block("0.0", 1))];

    let (report, memory) = run(&pipeline, &roots);

    let root = report.block("0").unwrap();
    assert_eq!(root.state, BlockState::Failed);
    assert_eq!(root.completed, 0);
    assert_eq!(root.failed, 0);
    assert_eq!(root.failure.as_ref().unwrap().stage, "node_start");
    assert_eq!(report.block("0.0").unwrap().state, BlockState::Blocked);
    assert!(memory.kinds().iter().any(|k| k.name() == "block_start"));
}

#[test]
fn test_events_are_ordered_and_sequenced() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let roots = vec![block("0", 2).with_child(block("0.0", 2)), block("1", 1)];

    let (_, memory) = run(&pipeline, &roots);
    let events = memory.events();

    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    assert_eq!(events.first().unwrap().kind.name(), "init");
    match &events.last().unwrap().kind {
        EventKind::RunComplete { stats } => assert_eq!(stats.complete, 3),
        other => panic!("expected run_complete, got {:?}", other),
    }

    // block_complete for a path comes after its compositions and its
    // children's block_complete.
    let position = |pred: &dyn Fn(&EventKind) -> bool| {
        events.iter().position(|e| pred(&e.kind)).unwrap()
    };
    let root_complete = position(&|k| {
        matches!(k, EventKind::BlockComplete { path, .. } if path.to_string() == "0")
    });
    let child_complete = position(&|k| {
        matches!(k, EventKind::BlockComplete { path, .. } if path.to_string() == "0.0")
    });
    let last_root_composition = events
        .iter()
        .rposition(|e| {
            matches!(&e.kind, EventKind::CompositionComplete { path, .. } if path.to_string() == "0")
        })
        .unwrap();
    assert!(last_root_composition < child_complete);
    assert!(child_complete < root_complete);
}

#[test]
fn test_stage_events_carry_composition_ids() {
    let log = CallLog::default();
    let pipeline = pipeline_with(&log, |_, _| {});
    let (_, memory) = run(&pipeline, &[block("0", 1)]);

    let stages: Vec<(String, Option<u64>)> = memory
        .kinds()
        .into_iter()
        .filter_map(|k| match k {
            EventKind::Stage { stage, id, .. } => Some((stage, id)),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            ("node_start".to_string(), None),
            ("pre".to_string(), Some(0)),
            ("generate".to_string(), Some(0)),
            ("post".to_string(), Some(0)),
            ("node_end".to_string(), None),
        ]
    );
}
