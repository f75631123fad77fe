//! Courier - async transactions over callback-driven engines
//!
//! Courier lets application code written as async tasks on a tokio runtime
//! drive a transaction engine that runs on its own threads and reports every
//! completion through success/error callbacks.
//!
//! # Quick Start
//!
//! ```ignore
//! use courier::prelude::*;
//! use serde_json::json;
//!
//! let store = Arc::new(DocumentStore::new());
//! let engine = Arc::new(MemoryEngine::new(Arc::clone(&store))?);
//! let runner = TransactionRunner::new(engine, TransactionConfig::default())?;
//!
//! let airlines = Keyspace::default_collection("travel");
//! runner
//!     .run(
//!         move |ctx| {
//!             let airlines = airlines.clone();
//!             async move {
//!                 ctx.insert(&airlines.doc("cu"), &json!({"callsign": "CU"})).await?;
//!                 Ok(())
//!             }
//!         },
//!         None,
//!     )
//!     .await?;
//! runner.close()?;
//! ```
//!
//! # Architecture
//!
//! - `courier-core`: errors, identifiers, configuration, raw payloads, result
//!   adapters
//! - `courier-engine`: the `Engine` boundary, `EngineHandle` session
//!   lifecycle, the in-memory engine and a scripted engine for tests
//! - `courier-bridge`: the scheduler crossing, exactly-once pending calls,
//!   `AttemptContext` and `TransactionRunner`

pub use courier_bridge::{
    bridge, AttemptContext, PendingCall, Scheduler, Submission, TransactionRunner,
};
pub use courier_core::{
    AdaptContext, AttemptId, DocId, DocRef, DurabilityLevel, Error, JsonSerializer, JsonValue,
    Keyspace, QueryMetadata, QueryMetrics, RawDocument, RawQueryResult, RawTransactionResult,
    ResolvedOptions, Result, ResultAdapter, ScanConsistency, Serializer, TransactionConfig,
    TransactionGetResult, TransactionOptions, TransactionQueryOptions, TransactionQueryResult,
    TransactionResult,
};
pub use courier_engine::{
    AttemptFn, DocumentStore, Engine, EngineHandle, ErrorCallback, MemoryEngine, RetryConfig,
    SuccessCallback,
};

/// Engine fakes for exercising application code
pub mod testing {
    pub use courier_engine::testing::*;
}

/// Everything needed to write attempt logic
pub mod prelude {
    pub use std::sync::Arc;

    pub use courier_bridge::{AttemptContext, TransactionRunner};
    pub use courier_core::{
        DocId, DurabilityLevel, Error, Keyspace, Result, ScanConsistency, TransactionConfig,
        TransactionGetResult, TransactionOptions, TransactionQueryOptions, TransactionResult,
    };
    pub use courier_engine::{DocumentStore, MemoryEngine};
}
