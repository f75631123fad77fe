//! Testing utilities for engine consumers
//!
//! - **ScriptedEngine**: an engine whose operation outcomes are queued by the
//!   test, including contract violations (duplicate callbacks, empty errors,
//!   throwing and calling back) that a real engine should never produce
//! - **Reply / Fire**: the script vocabulary
//!
//! # Example
//!
//! ```ignore
//! use courier_engine::testing::{Fire, Reply, ScriptedEngine};
//!
//! let engine = ScriptedEngine::new();
//! engine.script_get(Reply::concurrent(vec![Fire::Ok(doc), Fire::Err(None)]));
//! engine.set_max_attempts(2);
//! ```

mod reply;
mod scripted;

pub use reply::{Fire, Reply};
pub use scripted::{AttemptEvent, OpRecord, ScriptedAttempt, ScriptedEngine, ScriptedSession};
