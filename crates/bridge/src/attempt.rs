//! Transactional operations inside one attempt
//!
//! An `AttemptContext` is handed to attempt logic and is valid only while that
//! invocation runs. Once the logic returns, the runner closes the context and
//! every further operation fails with `Error::AttemptClosed` without reaching
//! the engine.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_core::serializer::encode;
use courier_core::{
    AdaptContext, AttemptId, DocId, Error, ResultAdapter, Serializer, TransactionGetResult,
    TransactionQueryOptions, TransactionQueryResult,
};
use courier_engine::Engine;

use crate::pending::{bridge, PendingCall};
use crate::scheduler::Scheduler;

struct AttemptInner<E: Engine> {
    id: AttemptId,
    engine: Arc<E>,
    // Released on close so a leaked context does not pin the engine's attempt.
    handle: Mutex<Option<E::Attempt>>,
    scheduler: Scheduler,
    serializer: Arc<dyn Serializer>,
    live: AtomicBool,
}

/// Per-attempt facade over the engine's operations.
///
/// Cheap to clone; clones share the attempt's lifetime.
pub struct AttemptContext<E: Engine> {
    inner: Arc<AttemptInner<E>>,
}

impl<E: Engine> Clone for AttemptContext<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Engine> fmt::Debug for AttemptContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptContext")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl<E: Engine> AttemptContext<E> {
    pub(crate) fn new(
        id: AttemptId,
        engine: Arc<E>,
        handle: E::Attempt,
        scheduler: Scheduler,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            inner: Arc::new(AttemptInner {
                id,
                engine,
                handle: Mutex::new(Some(handle)),
                scheduler,
                serializer,
                live: AtomicBool::new(true),
            }),
        }
    }

    /// Identity of this attempt
    pub fn id(&self) -> AttemptId {
        self.inner.id
    }

    /// Whether operations may still be issued
    pub fn is_active(&self) -> bool {
        self.inner.live.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.inner.live.store(false, Ordering::Release);
        self.inner.handle.lock().take();
    }

    /// Whether the engine's attempt handle is still held
    #[cfg(test)]
    fn holds_handle(&self) -> bool {
        self.inner.handle.lock().is_some()
    }

    fn adapt_context(&self) -> AdaptContext {
        AdaptContext::for_attempt(Arc::clone(&self.inner.serializer), self.inner.id)
    }

    /// The engine handle, while the attempt is open.
    fn active_handle(&self) -> Result<E::Attempt, Error> {
        let closed = Error::AttemptClosed {
            attempt: self.inner.id,
        };
        if !self.is_active() {
            return Err(closed);
        }
        self.inner.handle.lock().clone().ok_or(closed)
    }

    fn ensure_owned(&self, doc: &TransactionGetResult) -> Result<(), Error> {
        match doc.attempt() {
            Some(owner) if owner == self.inner.id => Ok(()),
            Some(owner) => Err(Error::ForeignAttempt {
                expected: self.inner.id,
                actual: owner,
            }),
            None => Err(Error::invalid_argument(
                "result was not produced inside an attempt",
            )),
        }
    }

    /// Bridge one engine call whose payload adapts into `T`.
    fn call<T, I>(&self, operation: &'static str, invoke: I) -> PendingCall<T>
    where
        T: ResultAdapter,
        I: FnOnce(
            &E,
            &E::Attempt,
            courier_engine::SuccessCallback<T::Raw>,
            courier_engine::ErrorCallback,
        ) -> courier_core::Result<()>,
    {
        let handle = match self.active_handle() {
            Ok(handle) => handle,
            Err(e) => return PendingCall::failed(operation, e),
        };
        let ctx = self.adapt_context();
        bridge(
            &self.inner.scheduler,
            operation,
            move |raw: T::Raw| T::adapt(raw, &ctx),
            |on_ok, on_err| invoke(self.inner.engine.as_ref(), &handle, on_ok, on_err),
        )
    }

    /// Read a document.
    ///
    /// Fails with `DocumentNotFound` when it does not exist in the
    /// attempt's visible state.
    pub fn get(&self, id: &DocId) -> PendingCall<TransactionGetResult> {
        let id = id.clone();
        self.call("get", move |engine, handle, on_ok, on_err| {
            engine.get(handle, id, on_ok, on_err)
        })
    }

    /// Stage a new document.
    pub fn insert<V: Serialize + ?Sized>(
        &self,
        id: &DocId,
        value: &V,
    ) -> PendingCall<TransactionGetResult> {
        let content = match encode(self.inner.serializer.as_ref(), value) {
            Ok(content) => content,
            Err(e) => return PendingCall::failed("insert", e),
        };
        let id = id.clone();
        self.call("insert", move |engine, handle, on_ok, on_err| {
            engine.insert(handle, id, content, on_ok, on_err)
        })
    }

    /// Stage new content for a document obtained in this attempt.
    pub fn replace<V: Serialize + ?Sized>(
        &self,
        doc: &TransactionGetResult,
        value: &V,
    ) -> PendingCall<TransactionGetResult> {
        if let Err(e) = self.ensure_owned(doc) {
            return PendingCall::failed("replace", e);
        }
        let content = match encode(self.inner.serializer.as_ref(), value) {
            Ok(content) => content,
            Err(e) => return PendingCall::failed("replace", e),
        };
        let doc_ref = doc.doc_ref().clone();
        self.call("replace", move |engine, handle, on_ok, on_err| {
            engine.replace(handle, doc_ref, content, on_ok, on_err)
        })
    }

    /// Stage removal of a document obtained in this attempt.
    pub fn remove(&self, doc: &TransactionGetResult) -> PendingCall<()> {
        if let Err(e) = self.ensure_owned(doc) {
            return PendingCall::failed("remove", e);
        }
        let doc_ref = doc.doc_ref().clone();
        self.call("remove", move |engine, handle, on_ok, on_err| {
            engine.remove(handle, doc_ref, on_ok, on_err)
        })
    }

    /// Run a query and wait for its full result set.
    pub fn query(
        &self,
        statement: impl Into<String>,
        options: TransactionQueryOptions,
    ) -> PendingCall<TransactionQueryResult> {
        let statement = statement.into();
        self.call("query", move |engine, handle, on_ok, on_err| {
            engine.query(handle, statement, options, on_ok, on_err)
        })
    }
}
