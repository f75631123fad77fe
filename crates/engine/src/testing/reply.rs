//! Scripted engine replies

use std::sync::{Arc, Barrier};

use courier_core::Error;

use crate::engine::{ErrorCallback, SuccessCallback};

/// One callback invocation.
#[derive(Debug)]
pub enum Fire<R> {
    /// Call the success callback with a payload
    Ok(R),
    /// Call the error callback (`None` is the empty-error protocol violation)
    Err(Option<Error>),
}

/// How a scripted operation answers.
///
/// A reply may fail the call synchronously, fire callbacks from fresh
/// threads, or both. Callbacks of a throwing reply are deferred until
/// `ScriptedEngine::release_deferred`.
#[derive(Debug)]
pub struct Reply<R> {
    pub(crate) throw: Option<Error>,
    pub(crate) fires: Vec<Fire<R>>,
    pub(crate) concurrent: bool,
}

impl<R> Reply<R> {
    /// Success callback with `value`
    pub fn ok(value: R) -> Self {
        Self::fires(vec![Fire::Ok(value)])
    }

    /// Error callback with `error`
    pub fn err(error: Error) -> Self {
        Self::fires(vec![Fire::Err(Some(error))])
    }

    /// Error callback with no error value
    pub fn empty_err() -> Self {
        Self::fires(vec![Fire::Err(None)])
    }

    /// Synchronous failure, no callback
    pub fn throw(error: Error) -> Self {
        Self {
            throw: Some(error),
            fires: Vec::new(),
            concurrent: false,
        }
    }

    /// Synchronous failure, followed by callbacks once released
    pub fn throw_then(error: Error, fires: Vec<Fire<R>>) -> Self {
        Self {
            throw: Some(error),
            fires,
            concurrent: false,
        }
    }

    /// Callbacks fired one after another from a single thread
    pub fn fires(fires: Vec<Fire<R>>) -> Self {
        Self {
            throw: None,
            fires,
            concurrent: false,
        }
    }

    /// Callbacks fired simultaneously, one thread each
    pub fn concurrent(fires: Vec<Fire<R>>) -> Self {
        Self {
            throw: None,
            fires,
            concurrent: true,
        }
    }

    /// Nothing at all: the call is accepted and never answered
    pub fn silent() -> Self {
        Self::fires(Vec::new())
    }
}

fn fire_one<R>(fire: Fire<R>, on_ok: &SuccessCallback<R>, on_err: &ErrorCallback) {
    match fire {
        Fire::Ok(value) => on_ok(value),
        Fire::Err(error) => on_err(error),
    }
}

/// Deliver `fires` on the current thread, or on scoped threads released
/// together when `concurrent`.
pub(crate) fn fire_all<R: Send>(
    fires: Vec<Fire<R>>,
    concurrent: bool,
    on_ok: SuccessCallback<R>,
    on_err: ErrorCallback,
) {
    if !concurrent || fires.len() < 2 {
        for fire in fires {
            fire_one(fire, &on_ok, &on_err);
        }
        return;
    }

    let barrier = Arc::new(Barrier::new(fires.len()));
    std::thread::scope(|scope| {
        for fire in fires {
            let barrier = Arc::clone(&barrier);
            let on_ok = &on_ok;
            let on_err = &on_err;
            scope.spawn(move || {
                barrier.wait();
                fire_one(fire, on_ok, on_err);
            });
        }
    });
}
