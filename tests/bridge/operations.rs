//! Document operations inside a run

use crate::common::*;
use courier::testing::{Reply, ScriptedEngine};
use courier::{Error, QueryMetadata, RawQueryResult, TransactionQueryOptions};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_get_delivers_decoded_content() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::ok(raw_doc("k1", 7, r#"{"v":1}"#)));
    let runner = scripted_runner(&engine);

    let seen = Arc::new(Mutex::new(None));
    let s = Arc::clone(&seen);
    runner
        .run(
            move |ctx| {
                let s = Arc::clone(&s);
                async move {
                    let doc = ctx.get(&travel().doc("k1")).await?;
                    *s.lock() = Some((doc.value().clone(), doc.cas()));
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(seen.lock().take(), Some((json!({"v": 1}), 7)));
}

#[tokio::test]
async fn test_insert_of_existing_document_fails_run() {
    let engine = ScriptedEngine::new();
    engine.script_insert(Reply::err(Error::DocumentExists {
        id: "travel/k2".into(),
    }));
    let runner = scripted_runner(&engine);

    let err = runner
        .run(
            |ctx| async move {
                ctx.insert(&travel().doc("k2"), "x").await?;
                Ok(())
            },
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionFailed { .. }));
    assert!(matches!(err.root_cause(), Error::DocumentExists { .. }));
}

#[tokio::test]
async fn test_missing_document_can_be_handled_by_logic() {
    let engine = ScriptedEngine::new();
    let runner = scripted_runner(&engine);

    runner
        .run(
            |ctx| async move {
                match ctx.get(&travel().doc("absent")).await {
                    Err(e) if e.is_not_found() => {}
                    other => panic!("expected not found, got {:?}", other.map(|d| d.cas())),
                }
                ctx.insert(&travel().doc("absent"), &json!({"created": true}))
                    .await?;
                Ok(())
            },
            None,
        )
        .await
        .unwrap();

    let ops: Vec<&str> = engine.operations().iter().map(|op| op.op).collect();
    assert_eq!(ops, vec!["get", "insert"]);
}

#[tokio::test]
async fn test_read_modify_write_chain() {
    let engine = ScriptedEngine::new();
    engine.script_get(Reply::ok(raw_doc("counter", 3, r#"{"n":41}"#)));
    let runner = scripted_runner(&engine);

    let written = Arc::new(Mutex::new(None));
    let w = Arc::clone(&written);
    runner
        .run(
            move |ctx| {
                let w = Arc::clone(&w);
                async move {
                    let doc = ctx.get(&travel().doc("counter")).await?;
                    let n = doc.value()["n"].as_i64().unwrap_or_default();
                    let updated = ctx.replace(&doc, &json!({"n": n + 1})).await?;
                    *w.lock() = Some(updated.value().clone());
                    ctx.remove(&updated).await?;
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(written.lock().take(), Some(json!({"n": 42})));
    let ops: Vec<&str> = engine.operations().iter().map(|op| op.op).collect();
    assert_eq!(ops, vec!["get", "replace", "remove"]);
}

#[tokio::test]
async fn test_query_rows_and_metadata() {
    let engine = ScriptedEngine::new();
    engine.script_query(Reply::ok(RawQueryResult {
        rows: vec![br#"{"a":1}"#.to_vec(), br#"{"a":2}"#.to_vec()],
        metadata: QueryMetadata {
            request_id: "req-1".into(),
            client_context_id: Some("ctx-9".into()),
            status: "success".into(),
            ..QueryMetadata::default()
        },
    }));
    let runner = scripted_runner(&engine);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    runner
        .run(
            move |ctx| {
                let s = Arc::clone(&s);
                async move {
                    let result = ctx
                        .query(
                            "SELECT * FROM travel",
                            TransactionQueryOptions::new().client_context_id("ctx-9"),
                        )
                        .await?;
                    assert_eq!(result.metadata().request_id, "req-1");
                    assert_eq!(result.metadata().client_context_id.as_deref(), Some("ctx-9"));
                    *s.lock() = result.into_rows();
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    let rows: Vec<Value> = seen.lock().clone();
    assert_eq!(rows, vec![json!({"a": 1}), json!({"a": 2})]);
}

#[tokio::test]
async fn test_query_error_surfaces_in_logic() {
    let engine = ScriptedEngine::new();
    engine.script_query(Reply::err(Error::Query {
        reason: "syntax error".into(),
    }));
    let runner = scripted_runner(&engine);

    let err = runner
        .run(
            |ctx| async move {
                ctx.query("SELEKT", TransactionQueryOptions::new()).await?;
                Ok(())
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Query { .. }));
}
