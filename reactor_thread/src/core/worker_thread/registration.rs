// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Attach and detach requests that carry reactor mutations onto the worker's own thread.
//!
//! | Request                   | Sent by                   | Caller waits? |
//! | :------------------------ | :------------------------ | :------------ |
//! | [`RegistrationRequest`]   | [`WorkerHandle::register()`]   | no       |
//! | [`UnregistrationRequest`] | [`WorkerHandle::unregister()`] | yes      |
//!
//! [`WorkerHandle::register()`]: super::WorkerHandle::register
//! [`WorkerHandle::unregister()`]: super::WorkerHandle::unregister

use super::{DEBUG_REACTOR_THREAD, WorkerHandle};
use crate::{ReactorObject, Semaphore};
use std::sync::Arc;

/// Fire-and-forget attach of `object` to `worker`'s reactor.
#[derive(Debug)]
pub(crate) struct RegistrationRequest {
    pub(crate) worker: WorkerHandle,
    pub(crate) object: Arc<ReactorObject>,
}

impl RegistrationRequest {
    /// Runs on the worker thread. Failures are logged, since nobody is waiting.
    pub(crate) fn execute(self) {
        if let Err(err) = self.worker.reactor().register(&self.object) {
            tracing::error!(
                message = "worker: register failed",
                worker = %self.worker.name(),
                fd = self.object.fd(),
                error = ?err
            );
        }
    }
}

/// Detach of `object` from `worker`'s reactor, with a semaphore the caller blocks on.
///
/// The semaphore is posted when the request is dropped: right after [`execute()`], or
/// when teardown discards the request unexecuted (the loop is gone by then, so the object
/// can't get callbacks either way).
///
/// [`execute()`]: Self::execute
#[derive(Debug)]
pub(crate) struct UnregistrationRequest {
    pub(crate) worker: WorkerHandle,
    pub(crate) object: Arc<ReactorObject>,
    pub(crate) done: Arc<Semaphore>,
}

impl UnregistrationRequest {
    /// Runs on the worker thread.
    pub(crate) fn execute(self) {
        match self.worker.reactor().unregister(&self.object) {
            Ok(()) => {
                DEBUG_REACTOR_THREAD.then(|| {
                    tracing::debug!(
                        message = "worker: unregistered object",
                        worker = %self.worker.name(),
                        fd = self.object.fd()
                    );
                });
            }
            Err(err) => tracing::warn!(
                message = "worker: unregister failed",
                worker = %self.worker.name(),
                fd = self.object.fd(),
                error = ?err
            ),
        }
        // `self` drops here, releasing the caller.
    }
}

impl Drop for UnregistrationRequest {
    fn drop(&mut self) {
        if let Err(err) = self.done.post() {
            tracing::error!(
                message = "worker: failed to release unregister caller",
                error = ?err
            );
        }
    }
}
