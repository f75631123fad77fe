//! Shared helpers for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::Once;
use std::time::{Duration, Instant};

use courier::testing::ScriptedEngine;
use courier::{
    DocumentStore, Keyspace, MemoryEngine, RawDocument, RetryConfig, TransactionConfig,
    TransactionRunner,
};
use std::sync::Arc;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness.
///
/// Honours `RUST_LOG`; silent by default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// The keyspace every suite writes to
pub fn travel() -> Keyspace {
    Keyspace::default_collection("travel")
}

/// Raw document in `travel` as an engine would deliver it
pub fn raw_doc(key: &str, cas: u64, content: &str) -> RawDocument {
    RawDocument {
        id: travel().doc(key),
        cas,
        content: content.as_bytes().to_vec(),
    }
}

/// Runner over a scripted engine, bound to the current runtime
pub fn scripted_runner(engine: &ScriptedEngine) -> TransactionRunner<ScriptedEngine> {
    init_tracing();
    TransactionRunner::new(Arc::new(engine.clone()), TransactionConfig::default())
        .expect("runner over scripted engine")
}

/// In-memory engine over a fresh store, with fast retries
pub struct MemoryFixture {
    pub store: Arc<DocumentStore>,
    pub engine: Arc<MemoryEngine>,
    pub runner: TransactionRunner<MemoryEngine>,
}

impl MemoryFixture {
    pub fn new() -> Self {
        Self::with_config(TransactionConfig::default())
    }

    pub fn with_config(config: TransactionConfig) -> Self {
        init_tracing();
        let store = Arc::new(DocumentStore::new());
        let engine = Arc::new(
            MemoryEngine::with_workers(Arc::clone(&store), 4)
                .expect("memory engine")
                .with_retry(
                    RetryConfig::new()
                        .with_max_retries(50)
                        .with_base_delay_ms(1)
                        .with_max_delay_ms(5),
                ),
        );
        let runner = TransactionRunner::new(Arc::clone(&engine), config).expect("runner");
        Self {
            store,
            engine,
            runner,
        }
    }

    /// Seed a committed document
    pub fn seed(&self, key: &str, content: &str) -> u64 {
        self.store.upsert(travel().doc(key), content.as_bytes())
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
