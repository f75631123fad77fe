//! Attempt sequencing and retry

use crate::common::*;
use courier::testing::{AttemptEvent, ScriptedEngine};
use courier::{AttemptId, Error};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_failed_first_attempt_is_retried_with_fresh_context() {
    let engine = ScriptedEngine::new();
    engine.set_max_attempts(2);
    let runner = scripted_runner(&engine);

    let invocations = Arc::new(AtomicUsize::new(0));
    let ids = Arc::new(Mutex::new(Vec::<AttemptId>::new()));
    let (calls, seen) = (Arc::clone(&invocations), Arc::clone(&ids));
    let result = runner
        .run(
            move |ctx| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().push(ctx.id());
                async move {
                    if n == 0 {
                        return Err(Error::application("first attempt fails"));
                    }
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    let ids = ids.lock().clone();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert!(result.unstaging_complete);
    assert_eq!(
        engine.attempt_events().iter().filter(|e| matches!(e, AttemptEvent::Finished(_, false))).count(),
        1
    );
}

#[tokio::test]
async fn test_exhausted_attempts_report_last_error() {
    let engine = ScriptedEngine::new();
    engine.set_max_attempts(3);
    let runner = scripted_runner(&engine);

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let err = runner
        .run(
            move |_ctx| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { Err(Error::application(format!("attempt {} failed", n))) }
            },
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match err.root_cause() {
        Error::Application(inner) => assert_eq!(inner.to_string(), "attempt 2 failed"),
        other => panic!("unexpected root cause: {}", other),
    }
}

#[tokio::test]
async fn test_attempts_never_overlap() {
    let engine = ScriptedEngine::new();
    engine.set_max_attempts(3);
    let runner = scripted_runner(&engine);

    let spans = Arc::new(Mutex::new(Vec::<(Instant, Instant)>::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let (s, c) = (Arc::clone(&spans), Arc::clone(&calls));
    runner
        .run(
            move |_ctx| {
                let s = Arc::clone(&s);
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    let start = Instant::now();
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    s.lock().push((start, Instant::now()));
                    if n < 2 {
                        return Err(Error::Conflict {
                            reason: "write-write".into(),
                        });
                    }
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    let spans = spans.lock().clone();
    assert_eq!(spans.len(), 3);
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "attempt intervals overlap");
    }
    assert_eq!(engine.max_concurrent_attempts(), 1);
    assert_eq!(engine.attempts_started(), 3);
}

#[tokio::test]
async fn test_operations_carry_their_attempt() {
    let engine = ScriptedEngine::new();
    engine.set_max_attempts(2);
    let runner = scripted_runner(&engine);

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    runner
        .run(
            move |ctx| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    ctx.insert(&travel().doc(format!("doc-{}", n)), &n).await?;
                    if n == 0 {
                        return Err(Error::application("retry me"));
                    }
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    let ops = engine.operations();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].attempt.number, 0);
    assert_eq!(ops[1].attempt.number, 1);
    assert_eq!(ops[0].attempt.run, ops[1].attempt.run);
}

#[tokio::test]
async fn test_independent_runs_complete_concurrently() {
    let engine = ScriptedEngine::new();
    let runner = scripted_runner(&engine);

    let (a, b) = tokio::join!(
        runner.run(
            |ctx| async move {
                ctx.insert(&travel().doc("a"), "a").await?;
                Ok(())
            },
            None,
        ),
        runner.run(
            |ctx| async move {
                ctx.insert(&travel().doc("b"), "b").await?;
                Ok(())
            },
            None,
        ),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.transaction_id, b.transaction_id);
    assert_eq!(runner.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_attempt_logic_never_runs_on_engine_threads() {
    let engine = ScriptedEngine::new();
    engine.set_max_attempts(2);
    let runner = scripted_runner(&engine);

    let names = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let (seen, c) = (Arc::clone(&names), Arc::clone(&calls));
    runner
        .run(
            move |ctx| {
                let seen = Arc::clone(&seen);
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    let _ = ctx.get(&travel().doc("k")).await;
                    let name = std::thread::current().name().unwrap_or_default().to_string();
                    seen.lock().push(name);
                    if n == 0 {
                        return Err(Error::application("again"));
                    }
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    for name in names.lock().iter() {
        assert!(!name.starts_with("scripted-"), "logic ran on {}", name);
    }
}
