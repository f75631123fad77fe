//! Engine whose answers are queued by the test

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use courier_core::{
    DocId, DocRef, Error, QueryMetadata, RawDocument, RawQueryResult, RawTransactionResult,
    ResolvedOptions, Result, TransactionConfig, TransactionQueryOptions,
};

use super::reply::{fire_all, Reply};
use crate::engine::{AttemptFn, Engine, ErrorCallback, SuccessCallback};

/// Attempt handle handed out by `ScriptedEngine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedAttempt {
    /// Run the attempt belongs to (1-based)
    pub run: u64,
    /// Zero-based attempt number within the run
    pub number: usize,
}

/// Session of a `ScriptedEngine`.
#[derive(Debug)]
pub struct ScriptedSession {
    /// Session id (1-based)
    pub id: u64,
}

/// An operation the engine received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpRecord {
    /// `get`, `insert`, `replace`, `remove` or `query`
    pub op: &'static str,
    /// Attempt it was issued in
    pub attempt: ScriptedAttempt,
    /// Document id or statement
    pub target: String,
}

/// Attempt bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    /// `on_attempt` was called
    Started(ScriptedAttempt),
    /// `on_attempt` returned; `true` when it returned `Ok`
    Finished(ScriptedAttempt, bool),
}

type Queue<R> = Mutex<VecDeque<Reply<R>>>;
type Deferred = Box<dyn FnOnce() + Send>;

struct Inner {
    gets: Queue<RawDocument>,
    inserts: Queue<RawDocument>,
    replaces: Queue<RawDocument>,
    removes: Queue<()>,
    queries: Queue<RawQueryResult>,
    runs: Queue<RawTransactionResult>,
    max_attempts: AtomicUsize,
    deferred: Mutex<Vec<Deferred>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    ops: Mutex<Vec<OpRecord>>,
    attempts: Mutex<Vec<AttemptEvent>>,
    in_attempt: AtomicUsize,
    max_concurrent_attempts: AtomicUsize,
    next_run: AtomicU64,
    next_cas: AtomicU64,
    sessions_created: AtomicUsize,
    sessions_destroyed: AtomicUsize,
}

/// Fake engine driven by queued replies.
///
/// - Operations pop the next reply queued for their kind; with nothing queued
///   they succeed (get answers not-found) with content echoed back.
/// - `run` uses a queued run reply if there is one, otherwise invokes the
///   attempt function up to `max_attempts` times, each on a fresh thread,
///   strictly one after another, until one returns `Ok`.
/// - Callbacks always fire from threads the engine spawned.
#[derive(Clone)]
pub struct ScriptedEngine {
    inner: Arc<Inner>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    /// Engine with empty scripts and a single attempt per run
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                gets: Mutex::new(VecDeque::new()),
                inserts: Mutex::new(VecDeque::new()),
                replaces: Mutex::new(VecDeque::new()),
                removes: Mutex::new(VecDeque::new()),
                queries: Mutex::new(VecDeque::new()),
                runs: Mutex::new(VecDeque::new()),
                max_attempts: AtomicUsize::new(1),
                deferred: Mutex::new(Vec::new()),
                threads: Mutex::new(Vec::new()),
                ops: Mutex::new(Vec::new()),
                attempts: Mutex::new(Vec::new()),
                in_attempt: AtomicUsize::new(0),
                max_concurrent_attempts: AtomicUsize::new(0),
                next_run: AtomicU64::new(1),
                next_cas: AtomicU64::new(1),
                sessions_created: AtomicUsize::new(0),
                sessions_destroyed: AtomicUsize::new(0),
            }),
        }
    }

    /// Attempts per run before giving up (at least one)
    pub fn set_max_attempts(&self, attempts: usize) {
        self.inner
            .max_attempts
            .store(attempts.max(1), Ordering::Relaxed);
    }

    /// Queue a reply for the next `get`
    pub fn script_get(&self, reply: Reply<RawDocument>) {
        self.inner.gets.lock().push_back(reply);
    }

    /// Queue a reply for the next `insert`
    pub fn script_insert(&self, reply: Reply<RawDocument>) {
        self.inner.inserts.lock().push_back(reply);
    }

    /// Queue a reply for the next `replace`
    pub fn script_replace(&self, reply: Reply<RawDocument>) {
        self.inner.replaces.lock().push_back(reply);
    }

    /// Queue a reply for the next `remove`
    pub fn script_remove(&self, reply: Reply<()>) {
        self.inner.removes.lock().push_back(reply);
    }

    /// Queue a reply for the next `query`
    pub fn script_query(&self, reply: Reply<RawQueryResult>) {
        self.inner.queries.lock().push_back(reply);
    }

    /// Queue an outcome for the next `run`; its attempt function is not called
    pub fn script_run(&self, reply: Reply<RawTransactionResult>) {
        self.inner.runs.lock().push_back(reply);
    }

    /// Fire callbacks held back by throwing replies, and wait for them.
    pub fn release_deferred(&self) {
        let deferred: Vec<Deferred> = std::mem::take(&mut *self.inner.deferred.lock());
        std::thread::scope(|scope| {
            for task in deferred {
                scope.spawn(task);
            }
        });
    }

    /// Wait for every thread the engine spawned so far.
    ///
    /// Must not be called while an attempt is blocked on the caller's thread.
    pub fn join_all(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.threads.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.join();
            }
        }
    }

    /// Operations received, in call order
    pub fn operations(&self) -> Vec<OpRecord> {
        self.inner.ops.lock().clone()
    }

    /// Attempt starts and ends, in order
    pub fn attempt_events(&self) -> Vec<AttemptEvent> {
        self.inner.attempts.lock().clone()
    }

    /// Number of attempt function invocations
    pub fn attempts_started(&self) -> usize {
        self.inner
            .attempts
            .lock()
            .iter()
            .filter(|e| matches!(e, AttemptEvent::Started(_)))
            .count()
    }

    /// Highest number of attempt functions observed running at once
    pub fn max_concurrent_attempts(&self) -> usize {
        self.inner.max_concurrent_attempts.load(Ordering::SeqCst)
    }

    /// Sessions created so far
    pub fn sessions_created(&self) -> usize {
        self.inner.sessions_created.load(Ordering::SeqCst)
    }

    /// Sessions destroyed so far
    pub fn sessions_destroyed(&self) -> usize {
        self.inner.sessions_destroyed.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn spawn(&self, name: String, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(task)
            .map_err(|e| Error::internal(format!("failed to spawn scripted engine thread: {}", e)))?;
        self.threads.lock().push(handle);
        Ok(())
    }

    fn record(&self, op: &'static str, attempt: &ScriptedAttempt, target: String) {
        self.ops.lock().push(OpRecord {
            op,
            attempt: attempt.clone(),
            target,
        });
    }

    fn answer<R: Send + 'static>(
        &self,
        queue: &Queue<R>,
        default: impl FnOnce() -> Reply<R>,
        on_ok: SuccessCallback<R>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        let reply = queue.lock().pop_front();
        self.dispatch(reply.unwrap_or_else(default), on_ok, on_err)
    }

    fn dispatch<R: Send + 'static>(
        &self,
        reply: Reply<R>,
        on_ok: SuccessCallback<R>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        let Reply {
            throw,
            fires,
            concurrent,
        } = reply;

        if let Some(error) = throw {
            if !fires.is_empty() {
                self.deferred
                    .lock()
                    .push(Box::new(move || fire_all(fires, concurrent, on_ok, on_err)));
            }
            return Err(error);
        }
        if fires.is_empty() {
            return Ok(());
        }
        self.spawn("scripted-engine-cb".to_string(), move || {
            fire_all(fires, concurrent, on_ok, on_err)
        })
    }

    fn echo(&self, id: DocId, content: Vec<u8>) -> Reply<RawDocument> {
        Reply::ok(RawDocument {
            id,
            cas: self.next_cas.fetch_add(1, Ordering::Relaxed),
            content,
        })
    }

    /// Invoke the attempt function until it succeeds or the budget runs out.
    fn run_attempts(self: &Arc<Self>, run: u64, on_attempt: AttemptFn<ScriptedAttempt>) -> Result<()> {
        let max_attempts = self.max_attempts.load(Ordering::Relaxed);
        let mut last_error = None;

        for number in 0..max_attempts {
            let attempt = ScriptedAttempt { run, number };
            let inner = Arc::clone(self);
            let on_attempt = Arc::clone(&on_attempt);
            let handle = std::thread::Builder::new()
                .name(format!("scripted-attempt-{}-{}", run, number))
                .spawn(move || {
                    let running = inner.in_attempt.fetch_add(1, Ordering::SeqCst) + 1;
                    inner
                        .max_concurrent_attempts
                        .fetch_max(running, Ordering::SeqCst);
                    inner
                        .attempts
                        .lock()
                        .push(AttemptEvent::Started(attempt.clone()));

                    let outcome = on_attempt(attempt.clone());

                    inner
                        .attempts
                        .lock()
                        .push(AttemptEvent::Finished(attempt, outcome.is_ok()));
                    inner.in_attempt.fetch_sub(1, Ordering::SeqCst);
                    outcome
                })
                .map_err(|e| Error::internal(format!("failed to spawn attempt thread: {}", e)))?;

            match handle.join() {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => last_error = Some(e),
                Err(_) => last_error = Some(Error::internal("attempt thread panicked")),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("no attempt was made")))
    }

    fn start_run(
        self: &Arc<Self>,
        on_attempt: AttemptFn<ScriptedAttempt>,
        on_ok: SuccessCallback<RawTransactionResult>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        let scripted = self.runs.lock().pop_front();
        if let Some(reply) = scripted {
            return self.dispatch(reply, on_ok, on_err);
        }

        let inner = Arc::clone(self);
        self.spawn(format!("scripted-txn-{}", run), move || {
            let transaction_id = format!("scripted-{}", run);
            match inner.run_attempts(run, on_attempt) {
                Ok(()) => on_ok(RawTransactionResult {
                    transaction_id,
                    unstaging_complete: true,
                }),
                Err(cause) => on_err(Some(Error::TransactionFailed {
                    transaction_id,
                    cause: Box::new(cause),
                })),
            }
        })
    }
}

impl Engine for ScriptedEngine {
    type Session = ScriptedSession;
    type Attempt = ScriptedAttempt;

    fn create_session(&self, config: &TransactionConfig) -> Result<ScriptedSession> {
        config.validate()?;
        let id = self.inner.sessions_created.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(ScriptedSession { id })
    }

    fn destroy_session(&self, _session: &ScriptedSession) -> Result<()> {
        self.inner.sessions_destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn run(
        &self,
        _session: &ScriptedSession,
        on_attempt: AttemptFn<ScriptedAttempt>,
        _options: &ResolvedOptions,
        on_ok: SuccessCallback<RawTransactionResult>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.inner.start_run(on_attempt, on_ok, on_err)
    }

    fn get(
        &self,
        attempt: &ScriptedAttempt,
        id: DocId,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.inner.record("get", attempt, id.to_string());
        let missing = id.to_string();
        self.inner.answer(
            &self.inner.gets,
            || Reply::err(Error::DocumentNotFound { id: missing }),
            on_ok,
            on_err,
        )
    }

    fn insert(
        &self,
        attempt: &ScriptedAttempt,
        id: DocId,
        content: Vec<u8>,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.inner.record("insert", attempt, id.to_string());
        self.inner.answer(&self.inner.inserts, || self.inner.echo(id, content), on_ok, on_err)
    }

    fn replace(
        &self,
        attempt: &ScriptedAttempt,
        doc: DocRef,
        content: Vec<u8>,
        on_ok: SuccessCallback<RawDocument>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.inner.record("replace", attempt, doc.id.to_string());
        self.inner.answer(&self.inner.replaces, || self.inner.echo(doc.id, content), on_ok, on_err)
    }

    fn remove(
        &self,
        attempt: &ScriptedAttempt,
        doc: DocRef,
        on_ok: SuccessCallback<()>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.inner.record("remove", attempt, doc.id.to_string());
        self.inner.answer(&self.inner.removes, || Reply::ok(()), on_ok, on_err)
    }

    fn query(
        &self,
        attempt: &ScriptedAttempt,
        statement: String,
        options: TransactionQueryOptions,
        on_ok: SuccessCallback<RawQueryResult>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        self.inner.record("query", attempt, statement);
        self.inner.answer(
            &self.inner.queries,
            || {
                Reply::ok(RawQueryResult {
                    rows: Vec::new(),
                    metadata: QueryMetadata {
                        request_id: "scripted".to_string(),
                        client_context_id: options.client_context_id,
                        status: "success".to_string(),
                        ..QueryMetadata::default()
                    },
                })
            },
            on_ok,
            on_err,
        )
    }
}
