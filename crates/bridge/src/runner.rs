//! Transaction entry point
//!
//! The engine calls its attempt function synchronously from one of its own
//! threads. `TransactionRunner` turns that into async attempt logic running on
//! the owning scheduler:
//!
//! 1. a fresh `AttemptContext` is built for the engine's attempt handle;
//! 2. the logic is submitted to the scheduler;
//! 3. the engine thread blocks until the logic finishes;
//! 4. the context is closed and the outcome handed back to the engine, which
//!    decides whether to commit, retry or give up.
//!
//! The overall outcome comes back through the same bridge as every other
//! engine call.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use courier_core::{
    AdaptContext, AttemptId, Error, JsonSerializer, RawTransactionResult, Result, ResultAdapter,
    Serializer, TransactionConfig, TransactionOptions, TransactionResult,
};
use courier_engine::{AttemptFn, Engine, EngineHandle};
use tracing::{debug, info, warn};

use crate::attempt::AttemptContext;
use crate::pending::bridge;
use crate::scheduler::{Scheduler, Submission};

/// Counts a `run` as outstanding until its future completes or is dropped.
struct OutstandingGuard<'a>(&'a AtomicUsize);

impl<'a> OutstandingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for OutstandingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs async attempt logic as engine transactions.
///
/// # Example
///
/// ```ignore
/// let runner = TransactionRunner::new(Arc::new(engine), TransactionConfig::default())?;
/// let result = runner
///     .run(
///         |ctx| async move {
///             let doc = ctx.get(&airlines.doc("cu")).await?;
///             ctx.replace(&doc, &json!({"callsign": "CU"})).await?;
///             Ok(())
///         },
///         None,
///     )
///     .await?;
/// ```
pub struct TransactionRunner<E: Engine> {
    engine: EngineHandle<E>,
    scheduler: Scheduler,
    serializer: Arc<dyn Serializer>,
    next_attempt: Arc<AtomicU64>,
    outstanding: AtomicUsize,
}

impl<E: Engine> TransactionRunner<E> {
    /// Create a session on `engine`, bound to the caller's runtime.
    pub fn new(engine: Arc<E>, config: TransactionConfig) -> Result<Self> {
        Self::with_scheduler(engine, config, Scheduler::current()?)
    }

    /// Create a session on `engine`, bound to `scheduler`.
    pub fn with_scheduler(
        engine: Arc<E>,
        config: TransactionConfig,
        scheduler: Scheduler,
    ) -> Result<Self> {
        let engine = EngineHandle::create(engine, config)?;
        Ok(Self {
            engine,
            scheduler,
            serializer: Arc::new(JsonSerializer),
            next_attempt: Arc::new(AtomicU64::new(1)),
            outstanding: AtomicUsize::new(0),
        })
    }

    /// Use `serializer` for document content
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Configuration of the underlying session
    pub fn config(&self) -> &TransactionConfig {
        self.engine.config()
    }

    /// The owning scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of `run` calls that have not completed
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Run `logic` as one transaction.
    ///
    /// The engine may call `logic` any number of times, one attempt after
    /// another, each with a fresh `AttemptContext`. Returning `Err` from
    /// `logic` fails that attempt; wrap application errors with
    /// `Error::application`.
    pub async fn run<F, Fut>(
        &self,
        logic: F,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionResult>
    where
        F: Fn(AttemptContext<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let resolved = options
            .unwrap_or_default()
            .resolve(self.engine.config())?;
        let on_attempt = self.attempt_fn(Arc::new(logic));
        let _outstanding = OutstandingGuard::new(&self.outstanding);

        debug!(
            target: "courier::txn",
            durability = ?resolved.durability,
            timeout_ms = resolved.timeout.as_millis() as u64,
            "Transaction run requested"
        );
        let ctx = AdaptContext::detached(Arc::clone(&self.serializer));
        let result = bridge(
            &self.scheduler,
            "run",
            move |raw: RawTransactionResult| TransactionResult::adapt(raw, &ctx),
            |on_ok, on_err| self.engine.run(on_attempt, &resolved, on_ok, on_err),
        )
        .await;

        match &result {
            Ok(outcome) => info!(
                target: "courier::txn",
                txn = %outcome.transaction_id,
                unstaging_complete = outcome.unstaging_complete,
                "Transaction completed"
            ),
            Err(e) => warn!(target: "courier::txn", error = %e, "Transaction failed"),
        }
        result
    }

    /// The synchronous attempt function handed to the engine.
    fn attempt_fn<F, Fut>(&self, logic: Arc<F>) -> AttemptFn<E::Attempt>
    where
        F: Fn(AttemptContext<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let engine = Arc::clone(self.engine.engine());
        let scheduler = self.scheduler.clone();
        let serializer = Arc::clone(&self.serializer);
        let next_attempt = Arc::clone(&self.next_attempt);

        Arc::new(move |handle: E::Attempt| {
            let id = AttemptId(next_attempt.fetch_add(1, Ordering::Relaxed));
            let ctx = AttemptContext::new(
                id,
                Arc::clone(&engine),
                handle,
                scheduler.clone(),
                Arc::clone(&serializer),
            );
            debug!(target: "courier::txn", attempt = %id, "Attempt started");

            let logic = Arc::clone(&logic);
            let scoped = ctx.clone();
            let outcome = scheduler
                .submit(async move { logic(scoped).await })
                .and_then(Submission::wait)
                .and_then(|logic_result| logic_result);
            ctx.close();

            match &outcome {
                Ok(()) => debug!(target: "courier::txn", attempt = %id, "Attempt finished"),
                Err(e) => debug!(target: "courier::txn", attempt = %id, error = %e, "Attempt failed"),
            }
            outcome
        })
    }

    /// Destroy the engine session.
    ///
    /// Must not be called while a `run` is outstanding; doing so fails with
    /// `InvalidOperation` and leaves the session open. Idempotent otherwise.
    pub fn close(&self) -> Result<()> {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            return Err(Error::invalid_operation(format!(
                "close called with {} transaction(s) outstanding",
                outstanding
            )));
        }
        self.engine.close()?;
        info!(target: "courier::txn", "Transaction runner closed");
        Ok(())
    }
}
