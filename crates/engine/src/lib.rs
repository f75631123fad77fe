//! Engine side of courier
//!
//! This crate defines the callback-driven engine boundary the bridge consumes
//! and ships two in-process engines:
//! - Engine: the boundary trait and its callback types
//! - EngineHandle: session lifecycle (create, run, idempotent close)
//! - MemoryEngine: reference engine with staging, CAS checks, commit-time
//!   conflict detection and retry
//! - ScriptedEngine (`testing`): fake engine for exercising the bridge
//!
//! Engines complete operations on threads they own; nothing here knows about
//! the application's async runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod handle;
pub mod memory;
pub mod retry;
pub mod testing;
pub mod workers;

pub use engine::{AttemptFn, Engine, ErrorCallback, SuccessCallback};
pub use handle::EngineHandle;
pub use memory::{DocumentStore, MemoryAttempt, MemoryEngine, MemoryEngineStats, MemorySession};
pub use retry::RetryConfig;
pub use workers::{Rejected, WorkerPool, WorkerStats};
