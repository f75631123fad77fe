//! Engines that break the callback contract

use crate::common::*;
use courier::testing::{Fire, Reply, ScriptedEngine};
use courier::{Error, TransactionGetResult};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

type Outcome = Arc<Mutex<Option<courier::Result<TransactionGetResult>>>>;

/// Run one transaction whose single attempt issues one `get` and records
/// what it resolved to. The attempt always succeeds.
async fn run_get(engine: &ScriptedEngine) -> Outcome {
    let runner = scripted_runner(engine);
    let outcome: Outcome = Arc::new(Mutex::new(None));
    let o = Arc::clone(&outcome);
    runner
        .run(
            move |ctx| {
                let o = Arc::clone(&o);
                async move {
                    let result = ctx.get(&travel().doc("k1")).await;
                    *o.lock() = Some(result);
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();
    outcome
}

fn take(outcome: &Outcome) -> courier::Result<TransactionGetResult> {
    outcome.lock().take().expect("get resolved")
}

#[tokio::test]
async fn test_empty_error_callback_is_unknown() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::empty_err());

    let outcome = run_get(&engine).await;
    match take(&outcome) {
        Err(Error::Unknown { operation }) => assert_eq!(operation, "get"),
        other => panic!("expected Unknown, got {:?}", other.map(|d| d.cas())),
    }
}

#[tokio::test]
async fn test_synchronous_failure_then_late_callbacks_resolve_once() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::throw_then(
        Error::fault(
            "dispatch failed",
            Error::Conflict {
                reason: "locked".into(),
            },
        ),
        vec![
            Fire::Ok(raw_doc("k1", 1, r#"{"v":1}"#)),
            Fire::Err(Some(Error::Internal {
                reason: "late".into(),
            })),
        ],
    ));

    let outcome = run_get(&engine).await;

    // The late callbacks land after the call resolved and are dropped.
    engine.release_deferred();
    engine.join_all();
    assert!(matches!(take(&outcome), Err(Error::Conflict { .. })));
}

#[tokio::test]
async fn test_duplicate_callbacks_keep_the_first() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::fires(vec![
        Fire::Ok(raw_doc("k1", 5, r#"{"v":"first"}"#)),
        Fire::Ok(raw_doc("k1", 6, r#"{"v":"second"}"#)),
        Fire::Err(Some(Error::Conflict {
            reason: "third".into(),
        })),
    ]));

    let outcome = run_get(&engine).await;
    let doc = take(&outcome).unwrap();
    assert_eq!(doc.value(), &json!({"v": "first"}));
    assert_eq!(doc.cas(), 5);
}

#[tokio::test]
async fn test_error_before_success_keeps_the_error() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::fires(vec![
        Fire::Err(Some(Error::DocumentNotFound {
            id: "travel/k1".into(),
        })),
        Fire::Ok(raw_doc("k1", 5, r#"{"v":1}"#)),
    ]));

    let outcome = run_get(&engine).await;
    assert!(matches!(take(&outcome), Err(Error::DocumentNotFound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_callbacks_resolve_exactly_once() {
    for _ in 0..25 {
        let engine = ScriptedEngine::new();
        engine.script_get(Reply::concurrent(vec![
            Fire::Ok(raw_doc("k1", 1, r#"{"v":1}"#)),
            Fire::Err(Some(Error::Conflict {
                reason: "race".into(),
            })),
            Fire::Err(None),
            Fire::Ok(raw_doc("k1", 2, r#"{"v":2}"#)),
        ]));

        let outcome = run_get(&engine).await;
        match take(&outcome) {
            Ok(doc) => assert!(doc.cas() == 1 || doc.cas() == 2),
            Err(Error::Conflict { .. }) | Err(Error::Unknown { .. }) => {}
            Err(other) => panic!("unexpected resolution: {}", other),
        }
    }
}

#[tokio::test]
async fn test_dropped_callbacks_resolve_to_internal_error() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::silent());

    let outcome = run_get(&engine).await;
    assert!(matches!(take(&outcome), Err(Error::Internal { .. })));
}

#[tokio::test]
async fn test_undecodable_payload_resolves_to_serialization_error() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::ok(raw_doc("k1", 1, "{not json")));

    let outcome = run_get(&engine).await;
    assert!(matches!(take(&outcome), Err(Error::Serialization { .. })));
}
