//! Async bridge for callback-driven transaction engines
//!
//! Application code runs on one tokio runtime (the owning scheduler); the
//! engine runs on its own threads and talks only through callbacks. This
//! crate connects the two:
//! - Scheduler: the only crossing point from engine threads into the runtime
//! - bridge / PendingCall: one engine call as one exactly-once awaitable
//! - AttemptContext: get/insert/replace/remove/query within one attempt
//! - TransactionRunner: runs async attempt logic inside the engine's
//!   synchronous, per-attempt calling convention
//!
//! Cancellation is not propagated: dropping a `run` future stops nothing on
//! the engine side, and the engine's own timeout bounds the transaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attempt;
pub mod pending;
pub mod runner;
pub mod scheduler;

pub use attempt::AttemptContext;
pub use pending::{bridge, PendingCall};
pub use runner::TransactionRunner;
pub use scheduler::{Scheduler, Submission};
