//! Engine session lifecycle
//!
//! `EngineHandle` owns one engine session from creation to destruction.
//! `close` is idempotent and also runs on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_core::{
    Error, RawTransactionResult, ResolvedOptions, Result, TransactionConfig,
};
use tracing::{info, warn};

use crate::engine::{AttemptFn, Engine, ErrorCallback, SuccessCallback};

/// Exclusive owner of an engine session.
pub struct EngineHandle<E: Engine> {
    engine: Arc<E>,
    session: E::Session,
    config: TransactionConfig,
    closed: AtomicBool,
}

impl<E: Engine> EngineHandle<E> {
    /// Validate `config` and create a session on `engine`.
    pub fn create(engine: Arc<E>, config: TransactionConfig) -> Result<Self> {
        config.validate()?;
        let session = engine.create_session(&config)?;
        info!(target: "courier::engine", durability = ?config.durability, timeout_ms = config.timeout_ms, "Engine session created");
        Ok(Self {
            engine,
            session,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// The engine this session lives on
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Forward a transaction to the engine.
    pub fn run(
        &self,
        on_attempt: AttemptFn<E::Attempt>,
        options: &ResolvedOptions,
        on_ok: SuccessCallback<RawTransactionResult>,
        on_err: ErrorCallback,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        self.engine
            .run(&self.session, on_attempt, options, on_ok, on_err)
    }

    /// Destroy the session. Later calls are no-ops.
    ///
    /// If the engine refuses, the session stays open.
    pub fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        if let Err(e) = self.engine.destroy_session(&self.session) {
            // Still open; a later close may succeed.
            self.closed.store(false, Ordering::Release);
            return Err(e);
        }
        info!(target: "courier::engine", "Engine session destroyed");
        Ok(())
    }
}

impl<E: Engine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "courier::engine", error = %e, "Failed to destroy engine session on drop");
        }
    }
}
