//! In-process reference engine
//!
//! `MemoryEngine` implements the full engine contract over a shared
//! `DocumentStore`:
//!
//! - each `run` gets its own driver thread that calls the attempt function
//!   once per attempt and commits after it returns `Ok`;
//! - operations are queued onto an engine `WorkerPool` and complete there;
//! - commit re-validates every version the attempt observed, so concurrent
//!   transactions touching the same documents conflict and retry;
//! - retryable failures are retried with `RetryConfig` backoff until the
//!   budget or the transaction timeout is spent.

pub mod attempt;
pub mod query;
pub mod store;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_core::{
    DocId, DocRef, Error, QueryMetadata, QueryMetrics, RawDocument, RawQueryResult,
    RawTransactionResult, ResolvedOptions, Result, TransactionConfig, TransactionQueryOptions,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{AttemptFn, Engine, ErrorCallback, SuccessCallback};
use crate::retry::RetryConfig;
use crate::workers::{WorkerPool, DEFAULT_QUEUE_DEPTH};

pub use attempt::MemoryAttempt;
pub use query::Statement;
pub use store::{DocumentStore, StagedWrite, StoredDoc};

/// Default number of engine worker threads
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Session of a `MemoryEngine`.
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    config: TransactionConfig,
    closed: AtomicBool,
    active_runs: Arc<AtomicUsize>,
}

impl MemorySession {
    /// Engine-assigned session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Transactions started on this session that have not reported an outcome
    pub fn active_runs(&self) -> usize {
        self.active_runs.load(Ordering::Acquire)
    }
}

/// Transaction counters.
///
/// Relaxed ordering: observational only.
#[derive(Debug, Default)]
struct EngineMetrics {
    started: AtomicU64,
    committed: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
}

/// Snapshot of engine counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEngineStats {
    /// Transactions started
    pub started: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions that ended in failure or expiry
    pub failed: u64,
    /// Attempt function invocations
    pub attempts: u64,
}

/// Reference engine over a `DocumentStore`.
pub struct MemoryEngine {
    store: Arc<DocumentStore>,
    workers: WorkerPool,
    retry: RetryConfig,
    next_session: AtomicU64,
    metrics: Arc<EngineMetrics>,
}

impl MemoryEngine {
    /// Engine over `store` with default workers and retry policy.
    pub fn new(store: Arc<DocumentStore>) -> Result<Self> {
        Self::with_workers(store, DEFAULT_WORKER_THREADS)
    }

    /// Engine over `store` with `threads` worker threads.
    pub fn with_workers(store: Arc<DocumentStore>, threads: usize) -> Result<Self> {
        let workers = WorkerPool::new("courier-engine", threads, DEFAULT_QUEUE_DEPTH)?;
        Ok(Self {
            store,
            workers,
            retry: RetryConfig::default(),
            next_session: AtomicU64::new(1),
            metrics: Arc::new(EngineMetrics::default()),
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The backing store
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Retry policy in effect
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Block until all queued operation completions have run
    pub fn drain(&self) {
        self.workers.drain();
    }

    /// Snapshot of transaction counters
    pub fn stats(&self) -> MemoryEngineStats {
        MemoryEngineStats {
            started: self.metrics.started.load(Ordering::Relaxed),
            committed: self.metrics.committed.load(Ordering::Relaxed),
            failed: self.metrics.failed.load(Ordering::Relaxed),
            attempts: self.metrics.attempts.load(Ordering::Relaxed),
        }
    }

    /// Run `op` on a worker and report its outcome through the callbacks.
    fn complete<R, F>(
        &self,
        attempt: &Arc<MemoryAttempt>,
        op: F,
        on_ok: SuccessCallback<R>,
        on_err: ErrorCallback,
    ) -> Result<()>
    where
        R: Send + 'static,
        F: FnOnce(&MemoryAttempt, &DocumentStore) -> Result<R> + Send + 'static,
    {
        attempt.ensure_usable()?;
        let attempt = Arc::clone(attempt);
        let store = Arc::clone(&self.store);
        self.workers.submit(move || match op(&attempt, &store) {
            Ok(value) => on_ok(value),
            Err(e) => on_err(Some(e)),
        })?;
        Ok(())
    }
}

/// Decrements the session's active run count when the driver exits.
struct ActiveRunGuard(Arc<AtomicUsize>);

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

struct Driver {
    transaction_id: String,
    store: Arc<DocumentStore>,
    retry: RetryConfig,
    metrics: Arc<EngineMetrics>,
    deadline: Instant,
    on_attempt: AttemptFn<Arc<MemoryAttempt>>,
}

impl Driver {
    /// Attempt loop. Returns the final outcome of the transaction.
    fn drive(&self) -> Result<RawTransactionResult> {
        let mut number = 0usize;
        loop {
            if Instant::now() >= self.deadline {
                return Err(Error::TransactionExpired {
                    transaction_id: self.transaction_id.clone(),
                });
            }

            self.metrics.attempts.fetch_add(1, Ordering::Relaxed);
            let attempt = Arc::new(MemoryAttempt::new(number, self.deadline));
            debug!(target: "courier::engine", txn = %self.transaction_id, attempt = number, "Attempt started");

            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (self.on_attempt)(Arc::clone(&attempt))
            }))
            .unwrap_or_else(|_| Err(Error::internal("attempt function panicked")));
            attempt.close();

            let err = match outcome.and_then(|()| attempt.commit(&self.store)) {
                Ok(writes) => {
                    info!(target: "courier::engine", txn = %self.transaction_id, attempt = number, writes, "Transaction committed");
                    return Ok(RawTransactionResult {
                        transaction_id: self.transaction_id.clone(),
                        unstaging_complete: true,
                    });
                }
                Err(e) => e,
            };

            if matches!(err, Error::AttemptExpired) {
                return Err(Error::TransactionExpired {
                    transaction_id: self.transaction_id.clone(),
                });
            }

            let delay = self.retry.calculate_delay(number);
            let retryable = err.is_retryable()
                && self.retry.should_retry(number)
                && Instant::now() + delay < self.deadline;
            if !retryable {
                return Err(Error::TransactionFailed {
                    transaction_id: self.transaction_id.clone(),
                    cause: Box::new(err),
                });
            }

            warn!(
                target: "courier::engine",
                txn = %self.transaction_id,
                attempt = number,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, retrying"
            );
            if delay > Duration::ZERO {
                std::thread::sleep(delay);
            }
            number += 1;
        }
    }
}

impl Engine for MemoryEngine {
    type Session = MemorySession;
    type Attempt = Arc<MemoryAttempt>;

    fn create_session(&self, config: &TransactionConfig) -> Result<MemorySession> {
        config.validate()?;
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(target: "courier::engine", session = id, "Memory session created");
        Ok(MemorySession {
            id,
            config: config.clone(),
            closed: AtomicBool::new(false),
            active_runs: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn destroy_session(&self, session: &MemorySession) -> Result<()> {
        let active = session.active_runs();
        if active > 0 {
            return Err(Error::invalid_operation(format!(
                "session {} still has {} transaction(s) running",
                session.id, active
            )));
        }
        session.closed.store(true, Ordering::Release);
        debug!(target: "courier::engine", session = session.id, "Memory session destroyed");
        Ok(())
    }

    fn run(
        &self,
        session: &MemorySession,
        on_attempt: AttemptFn<Arc<MemoryAttempt>>,
        options: &ResolvedOptions,
        on_ok: SuccessCallback<RawTransactionResult>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        if session.closed.load(Ordering::Acquire) {
            return Err(Error::SessionClosed);
        }

        let driver = Driver {
            transaction_id: Uuid::new_v4().to_string(),
            store: Arc::clone(&self.store),
            retry: self.retry.clone(),
            metrics: Arc::clone(&self.metrics),
            deadline: Instant::now() + options.timeout,
            on_attempt,
        };
        info!(
            target: "courier::engine",
            txn = %driver.transaction_id,
            session = session.id,
            durability = ?options.durability,
            timeout_ms = options.timeout.as_millis() as u64,
            "Transaction started"
        );

        session.active_runs.fetch_add(1, Ordering::AcqRel);
        let guard = ActiveRunGuard(Arc::clone(&session.active_runs));
        let metrics = Arc::clone(&self.metrics);

        std::thread::Builder::new()
            .name("courier-txn-driver".to_string())
            .spawn(move || {
                metrics.started.fetch_add(1, Ordering::Relaxed);
                let outcome = driver.drive();
                // Report only after the run is no longer counted as active.
                drop(guard);
                match outcome {
                    Ok(result) => {
                        metrics.committed.fetch_add(1, Ordering::Relaxed);
                        on_ok(result);
                    }
                    Err(e) => {
                        metrics.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(target: "courier::engine", txn = %driver.transaction_id, error = %e, "Transaction failed");
                        on_err(Some(e));
                    }
                }
            })
            .map_err(|e| Error::internal(format!("failed to spawn transaction driver: {}", e)))?;
        Ok(())
    }

    fn get(
        &self,
        attempt: &Arc<MemoryAttempt>,
        id: DocId,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.complete(attempt, move |a, store| a.get(store, id), on_ok, on_err)
    }

    fn insert(
        &self,
        attempt: &Arc<MemoryAttempt>,
        id: DocId,
        content: Vec<u8>,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.complete(
            attempt,
            move |a, store| a.insert(store, id, content),
            on_ok,
            on_err,
        )
    }

    fn replace(
        &self,
        attempt: &Arc<MemoryAttempt>,
        doc: DocRef,
        content: Vec<u8>,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.complete(
            attempt,
            move |a, store| a.replace(store, doc, content),
            on_ok,
            on_err,
        )
    }

    fn remove(
        &self,
        attempt: &Arc<MemoryAttempt>,
        doc: DocRef,
        on_ok: SuccessCallback<()>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.complete(attempt, move |a, store| a.remove(store, doc), on_ok, on_err)
    }

    fn query(
        &self,
        attempt: &Arc<MemoryAttempt>,
        statement: String,
        options: TransactionQueryOptions,
        on_ok: SuccessCallback<RawQueryResult>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.complete(
            attempt,
            move |a, store| {
                let started = Instant::now();
                let Statement::ScanAll(keyspace) = query::parse(&statement)?;
                let rows: Vec<Vec<u8>> = a
                    .scan(store, &keyspace)?
                    .into_iter()
                    .map(|doc| doc.content)
                    .collect();
                let metrics = options.metrics.then(|| QueryMetrics {
                    result_count: rows.len() as u64,
                    mutation_count: 0,
                    elapsed_us: started.elapsed().as_micros() as u64,
                });
                Ok(RawQueryResult {
                    rows,
                    metadata: QueryMetadata {
                        request_id: Uuid::new_v4().to_string(),
                        client_context_id: options.client_context_id,
                        status: "success".to_string(),
                        metrics,
                        warnings: Vec::new(),
                    },
                })
            },
            on_ok,
            on_err,
        )
    }
}
