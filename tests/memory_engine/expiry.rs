//! Transaction deadlines

use crate::common::*;
use courier::{Error, TransactionConfig, TransactionOptions};
use std::time::Duration;

#[tokio::test]
async fn test_slow_attempt_expires_transaction() {
    let fx = MemoryFixture::new();
    let err = fx
        .runner
        .run(
            |ctx| async move {
                ctx.insert(&travel().doc("late"), &1).await?;
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(())
            },
            Some(TransactionOptions::new().with_timeout(Duration::from_millis(50))),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionExpired { .. }));
    assert!(fx.store.get(&travel().doc("late")).is_none());
}

#[tokio::test]
async fn test_operations_past_deadline_fail_the_attempt() {
    let fx = MemoryFixture::new();
    let err = fx
        .runner
        .run(
            |ctx| async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                ctx.get(&travel().doc("k")).await?;
                Ok(())
            },
            Some(TransactionOptions::new().with_timeout(Duration::from_millis(40))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransactionExpired { .. }));
}

#[tokio::test]
async fn test_session_timeout_applies_without_options() {
    let fx = MemoryFixture::with_config(TransactionConfig {
        timeout_ms: 40,
        ..TransactionConfig::default()
    });
    let err = fx
        .runner
        .run(
            |_ctx| async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok(())
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransactionExpired { .. }));
}
