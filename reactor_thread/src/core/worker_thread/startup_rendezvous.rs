// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! One-shot startup handshake between a creator and its new thread. See
//! [`StartupRendezvous`] for details.

use super::WorkerThreadError;
use crate::Semaphore;
use std::{io,
          sync::{Arc, Mutex, PoisonError}};

type StartupOutcome = Result<(), WorkerThreadError>;

/// A semaphore plus an outcome slot, shared by exactly two halves:
///
/// | Half              | Held by         | Does                                          |
/// | :---------------- | :-------------- | :-------------------------------------------- |
/// | [`StartupSignal`] | the new thread  | stores the outcome, posts once (consumes it)  |
/// | [`StartupWaiter`] | the creator     | blocks until the post, takes the outcome      |
///
/// The signal half moves into the spawned closure and the waiter half stays with the
/// creator, so the shared record lives until both are gone. A signal that is dropped
/// without being used (its thread panicked, or never ran) reports
/// [`WorkerThreadError::WorkerExitedBeforeStartup`], so the waiter never hangs.
#[derive(Debug)]
pub struct StartupRendezvous {
    semaphore: Semaphore,
    outcome: Mutex<Option<StartupOutcome>>,
}

impl StartupRendezvous {
    /// # Errors
    ///
    /// Returns an error if the semaphore can't be created.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> io::Result<(StartupSignal, StartupWaiter)> {
        let shared = Arc::new(Self {
            semaphore: Semaphore::new(0)?,
            outcome: Mutex::new(None),
        });
        Ok((
            StartupSignal {
                maybe_shared: Some(Arc::clone(&shared)),
            },
            StartupWaiter { shared },
        ))
    }

    fn post(&self, outcome: StartupOutcome) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        if let Err(err) = self.semaphore.post() {
            tracing::error!(message = "startup rendezvous: failed to post", error = ?err);
        }
    }
}

/// The new thread's half of a [`StartupRendezvous`].
#[derive(Debug)]
pub struct StartupSignal {
    maybe_shared: Option<Arc<StartupRendezvous>>,
}

impl StartupSignal {
    /// Hands `outcome` to the waiter and releases it.
    pub fn signal(mut self, outcome: StartupOutcome) {
        if let Some(shared) = self.maybe_shared.take() {
            shared.post(outcome);
        }
    }
}

impl Drop for StartupSignal {
    fn drop(&mut self) {
        if let Some(shared) = self.maybe_shared.take() {
            shared.post(Err(WorkerThreadError::WorkerExitedBeforeStartup));
        }
    }
}

/// The creator's half of a [`StartupRendezvous`].
#[derive(Debug)]
pub struct StartupWaiter {
    shared: Arc<StartupRendezvous>,
}

impl StartupWaiter {
    /// Blocks, with no timeout, until the signal half posts (or is dropped).
    ///
    /// # Errors
    ///
    /// Returns the failure the new thread reported, or
    /// [`WorkerThreadError::Rendezvous`] if waiting on the semaphore fails.
    pub fn wait(self) -> StartupOutcome {
        self.shared
            .semaphore
            .wait()
            .map_err(WorkerThreadError::Rendezvous)?;
        self.shared
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or(Err(WorkerThreadError::WorkerExitedBeforeStartup))
    }
}
