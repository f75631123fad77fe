//! Conflicting transactions

use crate::common::*;
use courier::TransactionOptions;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_serialized_by_retry() {
    let fx = Arc::new(MemoryFixture::new());
    fx.seed("counter", r#"{"n":0}"#);
    let invocations = Arc::new(AtomicUsize::new(0));

    const WRITERS: usize = 6;
    let mut tasks = Vec::new();
    for _ in 0..WRITERS {
        let fx = Arc::clone(&fx);
        let invocations = Arc::clone(&invocations);
        tasks.push(tokio::spawn(async move {
            fx.runner
                .run(
                    move |ctx| {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        async move {
                            let doc = ctx.get(&travel().doc("counter")).await?;
                            let n = doc.value()["n"].as_u64().unwrap_or(0);
                            tokio::time::sleep(Duration::from_millis(2)).await;
                            ctx.replace(&doc, &json!({"n": n + 1})).await?;
                            Ok(())
                        }
                    },
                    Some(TransactionOptions::new().with_timeout(Duration::from_secs(30))),
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let doc = fx.store.get(&travel().doc("counter")).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&doc.content).unwrap();
    assert_eq!(value, json!({"n": WRITERS}));
    assert!(invocations.load(Ordering::SeqCst) >= WRITERS);
    assert_eq!(fx.engine.stats().committed, WRITERS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_conflicting_commit_retries_whole_attempt() {
    let fx = Arc::new(MemoryFixture::new());
    let cas = fx.seed("hot", r#"{"owner":"nobody"}"#);
    let attempts = Arc::new(AtomicUsize::new(0));

    let (store, a) = (Arc::clone(&fx.store), Arc::clone(&attempts));
    fx.runner
        .run(
            move |ctx| {
                let store = Arc::clone(&store);
                let n = a.fetch_add(1, Ordering::SeqCst);
                async move {
                    let doc = ctx.get(&travel().doc("hot")).await?;
                    if n == 0 {
                        // Another writer commits between our read and our commit.
                        store.upsert(travel().doc("hot"), br#"{"owner":"other"}"#.to_vec());
                    }
                    ctx.insert(&travel().doc(format!("claim-{}", n)), &json!({"seen": doc.cas()}))
                        .await?;
                    Ok(())
                }
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(fx.store.get(&travel().doc("claim-0")).is_none());
    let claim = fx.store.get(&travel().doc("claim-1")).unwrap();
    let seen: serde_json::Value = serde_json::from_slice(&claim.content).unwrap();
    assert_ne!(seen["seen"], json!(cas));
}
