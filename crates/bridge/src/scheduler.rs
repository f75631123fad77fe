//! The owning scheduler
//!
//! Application code runs on one tokio runtime. Engine threads reach it only
//! through `post` (fire-and-forget delivery) and `submit` + `Submission::wait`
//! (run a future there and block the engine thread until it finishes).

use std::future::Future;

use courier_core::{Error, Result};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Handle to the runtime that owns application async code.
#[derive(Debug, Clone)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    /// The runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| Error::scheduler(format!("no tokio runtime: {}", e)))
    }

    /// Wrap an explicit runtime handle
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Underlying runtime handle
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Run `f` on the scheduler. Safe to call from any thread.
    ///
    /// If the runtime has shut down, `f` is dropped without running.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) {
        self.handle.spawn(async move { f() });
    }

    /// Start `fut` on the scheduler for a foreign thread to wait on.
    ///
    /// Fails with `Error::Scheduler`, without starting `fut`, when called
    /// from inside a runtime: the caller could never block on the result.
    pub fn submit<F>(&self, fut: F) -> Result<Submission<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        ensure_foreign_thread()?;
        let (tx, rx) = oneshot::channel();
        self.handle.spawn(async move {
            let _ = tx.send(fut.await);
        });
        Ok(Submission { rx })
    }
}

/// A future running on the scheduler that a foreign thread can block on.
#[derive(Debug)]
pub struct Submission<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Submission<T> {
    /// Block the current thread until the future completes.
    ///
    /// Fails with `Error::Scheduler` when called from inside a runtime (the
    /// wait could never finish on a current-thread scheduler), or when the
    /// future panicked or was dropped by a shutting-down runtime. A refused
    /// wait leaves the future running.
    pub fn wait(self) -> Result<T> {
        ensure_foreign_thread()?;
        self.rx
            .blocking_recv()
            .map_err(|_| Error::scheduler("attempt task was dropped before completing"))
    }
}

fn ensure_foreign_thread() -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(Error::scheduler(
            "cannot block on attempt logic from inside the async runtime",
        ));
    }
    Ok(())
}
