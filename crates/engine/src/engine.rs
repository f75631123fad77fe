//! The engine boundary
//!
//! An engine exposes transactional semantics through two calling conventions:
//!
//! - fire-and-forget operations that later invoke exactly one of two callbacks
//!   on an engine-owned thread;
//! - `run`, which calls an attempt function synchronously from an
//!   engine-owned thread, once per attempt, and finally reports the outcome
//!   through the same callback pair.
//!
//! Callbacks are shared `Fn`s rather than `FnOnce`: the contract says an engine
//! calls one of them once, but callers must not rely on it.

use std::sync::Arc;

use courier_core::{
    DocId, DocRef, RawDocument, RawQueryResult, RawTransactionResult, ResolvedOptions, Result,
    TransactionConfig, TransactionQueryOptions,
};

/// Success callback receiving the raw payload of an operation.
pub type SuccessCallback<R> = Arc<dyn Fn(R) + Send + Sync>;

/// Error callback. `None` is a protocol violation by the engine.
pub type ErrorCallback = Arc<dyn Fn(Option<courier_core::Error>) + Send + Sync>;

/// Attempt function handed to `Engine::run`.
///
/// Called synchronously from an engine thread, once per attempt, never
/// concurrently. `Ok(())` means the attempt's logic finished and the engine
/// may commit; `Err` means the attempt failed.
pub type AttemptFn<A> = Arc<dyn Fn(A) -> Result<()> + Send + Sync>;

/// A callback-driven transaction engine.
///
/// Every operation is invoked synchronously on the caller's thread. Returning
/// `Err` means the call was not issued and no callback will fire for it;
/// returning `Ok(())` means exactly one callback will eventually fire.
pub trait Engine: Send + Sync + 'static {
    /// Engine session bound to one configuration
    type Session: Send + Sync + 'static;

    /// Opaque per-attempt capability; valid only while the attempt function runs
    type Attempt: Clone + Send + Sync + 'static;

    /// Create a session
    fn create_session(&self, config: &TransactionConfig) -> Result<Self::Session>;

    /// Destroy a session; no `run` may be outstanding
    fn destroy_session(&self, session: &Self::Session) -> Result<()>;

    /// Start a transaction
    fn run(
        &self,
        session: &Self::Session,
        on_attempt: AttemptFn<Self::Attempt>,
        options: &ResolvedOptions,
        on_ok: SuccessCallback<RawTransactionResult>,
        on_err: ErrorCallback,
    ) -> Result<()>;

    /// Read a document
    fn get(
        &self,
        attempt: &Self::Attempt,
        id: DocId,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()>;

    /// Stage an insert
    fn insert(
        &self,
        attempt: &Self::Attempt,
        id: DocId,
        content: Vec<u8>,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()>;

    /// Stage a replace of a document version read in the same attempt
    fn replace(
        &self,
        attempt: &Self::Attempt,
        doc: DocRef,
        content: Vec<u8>,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()>;

    /// Stage a removal of a document version read in the same attempt
    fn remove(
        &self,
        attempt: &Self::Attempt,
        doc: DocRef,
        on_ok: SuccessCallback<()>,
        on_err: ErrorCallback,
    ) -> Result<()>;

    /// Run a query and collect the full result set
    fn query(
        &self,
        attempt: &Self::Attempt,
        statement: String,
        options: TransactionQueryOptions,
        on_ok: SuccessCallback<RawQueryResult>,
        on_err: ErrorCallback,
    ) -> Result<()>;
}
