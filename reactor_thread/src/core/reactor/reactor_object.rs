// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Readiness sources a [`Reactor`] watches. See [`ReactorObject`] for details.
//!
//! [`Reactor`]: super::Reactor

use mio::{Interest, Token};
use std::{fmt::{Debug, Formatter},
          os::fd::RawFd,
          sync::atomic::{AtomicUsize, Ordering}};

/// Token reserved for the [`Reactor`]'s own stop [`mio::Waker`].
///
/// [`Reactor`]: super::Reactor
pub const STOP_TOKEN: Token = Token(0);

/// Source of unique tokens. Starts after [`STOP_TOKEN`] and never hands out the same
/// token twice, so a stale event for a detached object can't be mistaken for an event on
/// a newer one.
static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(STOP_TOKEN.0 + 1);

/// Callback invoked on the reactor's thread when a source becomes ready.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Which readiness a [`ReactorObject`] wants to be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorInterest {
    Read,
    Write,
    ReadWrite,
}

impl From<ReactorInterest> for Interest {
    fn from(it: ReactorInterest) -> Self {
        match it {
            ReactorInterest::Read => Interest::READABLE,
            ReactorInterest::Write => Interest::WRITABLE,
            ReactorInterest::ReadWrite => Interest::READABLE.add(Interest::WRITABLE),
        }
    }
}

/// A file descriptor, the readiness it's interested in, and what to run when it's ready.
///
/// The object does **not** own `fd`. Whoever creates the object must keep the descriptor
/// open until the object has been detached, which is what the blocking
/// [`WorkerThread::unregister()`] is for:
///
/// ```text
/// let object = Arc::new(ReactorObject::new(socket.as_raw_fd(), ReactorInterest::Read)
///     .with_read_ready(move || { /* read from socket */ }));
/// worker.register(Arc::clone(&object));
/// // ...
/// worker.unregister(&object);  // Returns after the detach ran on the worker.
/// drop(socket);                // Safe, no callback can fire any more.
/// ```
///
/// [`WorkerThread::unregister()`]: crate::WorkerHandle::unregister
pub struct ReactorObject {
    pub(super) fd: RawFd,
    pub(super) interest: ReactorInterest,
    pub(super) token: Token,
    read_ready: Option<ReadyCallback>,
    write_ready: Option<ReadyCallback>,
}

impl ReactorObject {
    /// Creates an object with no callbacks. Add them with [`with_read_ready()`] and
    /// [`with_write_ready()`].
    ///
    /// [`with_read_ready()`]: Self::with_read_ready
    /// [`with_write_ready()`]: Self::with_write_ready
    #[must_use]
    pub fn new(fd: RawFd, interest: ReactorInterest) -> Self {
        Self {
            fd,
            interest,
            token: Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)),
            read_ready: None,
            write_ready: None,
        }
    }

    #[must_use]
    pub fn with_read_ready(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.read_ready = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn with_write_ready(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.write_ready = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn fd(&self) -> RawFd { self.fd }

    #[must_use]
    pub fn interest(&self) -> ReactorInterest { self.interest }

    #[must_use]
    pub fn token(&self) -> Token { self.token }

    pub(super) fn on_read_ready(&self) {
        if matches!(
            self.interest,
            ReactorInterest::Read | ReactorInterest::ReadWrite
        ) && let Some(callback) = &self.read_ready
        {
            callback();
        }
    }

    pub(super) fn on_write_ready(&self) {
        if matches!(
            self.interest,
            ReactorInterest::Write | ReactorInterest::ReadWrite
        ) && let Some(callback) = &self.write_ready
        {
            callback();
        }
    }
}

impl Debug for ReactorObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorObject")
            .field("fd", &self.fd)
            .field("interest", &self.interest)
            .field("token", &self.token)
            .field("read_ready", &self.read_ready.is_some())
            .field("write_ready", &self.write_ready.is_some())
            .finish()
    }
}
