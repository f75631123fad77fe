//! One callback-style engine call as one awaitable
//!
//! `bridge` issues an engine call with a fresh success/error callback pair and
//! returns a `PendingCall` that resolves exactly once, whichever of these
//! happens first:
//!
//! - the success callback fires: the raw payload is turned into the result
//!   value (a construction failure resolves to that failure);
//! - the error callback fires: its error, or `Error::Unknown` if it is empty;
//! - the call itself fails synchronously: its causal error, immediately.
//!
//! Later arrivals are dropped with a warning. Callback deliveries are posted
//! to the scheduler; the awaiting task never sees engine threads.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use courier_core::{Error, Result};
use courier_engine::{ErrorCallback, SuccessCallback};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::scheduler::Scheduler;

/// Awaitable result of one engine operation.
#[derive(Debug)]
#[must_use = "a PendingCall does nothing unless awaited"]
pub struct PendingCall<T> {
    rx: oneshot::Receiver<Result<T>>,
    operation: &'static str,
}

impl<T> PendingCall<T> {
    /// Already resolved to `value`
    pub fn ready(operation: &'static str, value: T) -> Self {
        Self::resolved(operation, Ok(value))
    }

    /// Already resolved to `error`
    pub fn failed(operation: &'static str, error: Error) -> Self {
        Self::resolved(operation, Err(error))
    }

    fn resolved(operation: &'static str, result: Result<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx, operation }
    }

    /// Name of the operation this call belongs to
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl<T> Future for PendingCall<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let operation = self.operation;
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::internal(format!(
                "{} was dropped without a resolution",
                operation
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Single-writer slot: the first claim gets the sender, every later claim
/// gets nothing.
struct ResolutionSlot<T> {
    operation: &'static str,
    resolved: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
}

impl<T> ResolutionSlot<T> {
    fn new(operation: &'static str, sender: oneshot::Sender<Result<T>>) -> Self {
        Self {
            operation,
            resolved: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        }
    }

    fn claim(&self, path: &'static str) -> Option<oneshot::Sender<Result<T>>> {
        if self
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                target: "courier::bridge",
                operation = self.operation,
                path,
                "Engine delivered a second resolution; ignored"
            );
            return None;
        }
        self.sender.lock().take()
    }
}

/// Issue one engine call and await its single resolution.
///
/// `invoke` receives the callback pair and issues the call synchronously on
/// the current thread. `construct` builds the result value from the success
/// payload; it runs on the engine thread that delivered it.
pub fn bridge<R, T, C, I>(
    scheduler: &Scheduler,
    operation: &'static str,
    construct: C,
    invoke: I,
) -> PendingCall<T>
where
    R: Send + 'static,
    T: Send + 'static,
    C: FnOnce(R) -> Result<T> + Send + 'static,
    I: FnOnce(SuccessCallback<R>, ErrorCallback) -> Result<()>,
{
    let (tx, rx) = oneshot::channel();
    let slot = Arc::new(ResolutionSlot::new(operation, tx));

    let on_ok: SuccessCallback<R> = {
        let slot = Arc::clone(&slot);
        let scheduler = scheduler.clone();
        let construct = Mutex::new(Some(construct));
        Arc::new(move |raw: R| {
            let Some(sender) = slot.claim("success") else {
                return;
            };
            debug!(target: "courier::bridge", operation, "Success callback");
            let result = match construct.lock().take() {
                Some(construct) => construct(raw),
                None => Err(Error::internal("result constructor already consumed")),
            };
            if let Err(e) = &result {
                warn!(target: "courier::bridge", operation, error = %e, "Result construction failed");
            }
            scheduler.post(move || {
                let _ = sender.send(result);
            });
        })
    };

    let on_err: ErrorCallback = {
        let slot = Arc::clone(&slot);
        let scheduler = scheduler.clone();
        Arc::new(move |error: Option<Error>| {
            let Some(sender) = slot.claim("error") else {
                return;
            };
            let error = match error {
                Some(error) => {
                    debug!(target: "courier::bridge", operation, error = %error, "Error callback");
                    error
                }
                None => {
                    warn!(target: "courier::bridge", operation, "Error callback fired without an error");
                    Error::unknown(operation)
                }
            };
            scheduler.post(move || {
                let _ = sender.send(Err(error));
            });
        })
    };

    if let Err(e) = invoke(on_ok, on_err) {
        if let Some(sender) = slot.claim("invocation") {
            let cause = e.into_cause();
            debug!(target: "courier::bridge", operation, error = %cause, "Engine call failed synchronously");
            let _ = sender.send(Err(cause));
        }
    }

    PendingCall { rx, operation }
}
