//! Commit visibility and rollback

use crate::common::*;
use courier::Error;
use serde_json::{json, Value};

fn stored(fx: &MemoryFixture, key: &str) -> Option<Value> {
    fx.store
        .get(&travel().doc(key))
        .map(|doc| serde_json::from_slice(&doc.content).expect("stored JSON"))
}

#[tokio::test]
async fn test_insert_commits_on_success() {
    let fx = MemoryFixture::new();
    let result = fx
        .runner
        .run(
            |ctx| async move {
                ctx.insert(&travel().doc("airline_10"), &json!({"name": "40-Mile Air"}))
                    .await?;
                Ok(())
            },
            None,
        )
        .await
        .unwrap();

    assert!(!result.transaction_id.is_empty());
    assert!(result.unstaging_complete);
    assert_eq!(stored(&fx, "airline_10"), Some(json!({"name": "40-Mile Air"})));
    assert_eq!(fx.engine.stats().committed, 1);
}

#[tokio::test]
async fn test_staged_writes_are_invisible_until_commit() {
    let fx = MemoryFixture::new();
    let store = std::sync::Arc::clone(&fx.store);
    fx.runner
        .run(
            move |ctx| {
                let store = std::sync::Arc::clone(&store);
                async move {
                    let doc = ctx.insert(&travel().doc("staged"), &1).await?;
                    assert!(store.get(&travel().doc("staged")).is_none());
                    // Read-your-writes inside the attempt
                    let again = ctx.get(&travel().doc("staged")).await?;
                    assert_eq!(again.value(), doc.value());
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(stored(&fx, "staged"), Some(json!(1)));
}

#[tokio::test]
async fn test_logic_error_discards_staged_writes() {
    let fx = MemoryFixture::new();
    fx.seed("keep", r#"{"v":1}"#);

    let err = fx
        .runner
        .run(
            |ctx| async move {
                let doc = ctx.get(&travel().doc("keep")).await?;
                ctx.replace(&doc, &json!({"v": 2})).await?;
                ctx.insert(&travel().doc("never"), &json!({})).await?;
                Err(Error::application("changed my mind"))
            },
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionFailed { .. }));
    assert!(matches!(err.root_cause(), Error::Application(_)));
    assert_eq!(stored(&fx, "keep"), Some(json!({"v": 1})));
    assert_eq!(stored(&fx, "never"), None);
    assert_eq!(fx.engine.stats().failed, 1);
}

#[tokio::test]
async fn test_insert_of_existing_document_fails_transaction() {
    let fx = MemoryFixture::new();
    fx.seed("taken", r#""x""#);

    let err = fx
        .runner
        .run(
            |ctx| async move {
                ctx.insert(&travel().doc("taken"), "y").await?;
                Ok(())
            },
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), Error::DocumentExists { .. }));
    assert_eq!(stored(&fx, "taken"), Some(json!("x")));
}

#[tokio::test]
async fn test_replace_and_remove_commit_together() {
    let fx = MemoryFixture::new();
    fx.seed("a", r#"{"n":1}"#);
    fx.seed("b", r#"{"n":2}"#);

    fx.runner
        .run(
            |ctx| async move {
                let a = ctx.get(&travel().doc("a")).await?;
                let b = ctx.get(&travel().doc("b")).await?;
                let sum = a.value()["n"].as_i64().unwrap_or(0) + b.value()["n"].as_i64().unwrap_or(0);
                ctx.replace(&a, &json!({"n": sum})).await?;
                ctx.remove(&b).await?;
                Ok(())
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(stored(&fx, "a"), Some(json!({"n": 3})));
    assert_eq!(stored(&fx, "b"), None);
}

#[tokio::test]
async fn test_get_of_removed_document_within_attempt_is_not_found() {
    let fx = MemoryFixture::new();
    fx.seed("gone", "1");

    fx.runner
        .run(
            |ctx| async move {
                let doc = ctx.get(&travel().doc("gone")).await?;
                ctx.remove(&doc).await?;
                let err = ctx.get(&travel().doc("gone")).await.err();
                assert!(matches!(err, Some(Error::DocumentNotFound { .. })));
                Ok(())
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(stored(&fx, "gone"), None);
}

#[tokio::test]
async fn test_close_destroys_memory_session() {
    let fx = MemoryFixture::new();
    fx.runner.run(|_ctx| async { Ok(()) }, None).await.unwrap();
    fx.runner.close().unwrap();

    let err = fx.runner.run(|_ctx| async { Ok(()) }, None).await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed));
}
