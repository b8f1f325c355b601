// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll EINTR reregister

//! The readiness event loop embedded in every [`WorkerThread`]. See [`Reactor`] for
//! details.
//!
//! [`WorkerThread`]: crate::WorkerThread

use super::{ReactorError, ReactorObject, STOP_TOKEN};
use crate::{Continuation, DEBUG_REACTOR_THREAD};
use mio::{Events, Poll, Registry, Token, Waker, event::Event, unix::SourceFd};
use std::{collections::HashMap,
          fmt::{Debug, Formatter},
          io::ErrorKind,
          sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError}};

/// Capacity for the [`mio::Events`] buffer.
pub const EVENTS_CAPACITY: usize = 64;

/// A single threaded, readiness driven event loop over [`mio::Poll`].
///
/// # Poll → Registry → Waker
///
/// ```text
/// mio::Poll::new()          // epoll fd, only the loop thread polls it
///       │
///       ├── registry().try_clone() → Registry  // register / reregister / deregister
///       │                                      // from any thread
///       └── Waker::new(registry, STOP_TOKEN)   // stop() from any thread
/// ```
///
/// # Level Triggered Dispatch
///
/// [`mio`] is edge triggered. The reactor re-arms every object right after dispatching
/// its callbacks (via [`Registry::reregister()`]), and the kernel reports the descriptor
/// again on the next poll if it is still ready. The effect is level triggered delivery:
/// a [`BoundedQueue`] holding 5 items gets 5 read callbacks, one per poll iteration,
/// interleaved fairly with every other ready source.
///
/// # Detach Guarantee
///
/// Each ready event looks its token up in the object map right before invoking the
/// callback. Once [`unregister()`] has returned **on the loop thread**, later events in
/// the same poll batch (and all future ones) are skipped.
///
/// [`BoundedQueue`]: crate::BoundedQueue
/// [`Registry::reregister()`]: mio::Registry::reregister
/// [`unregister()`]: Self::unregister
pub struct Reactor {
    poll: Mutex<Poll>,
    registry: Registry,
    stop_waker: Waker,
    objects: Mutex<HashMap<Token, Arc<ReactorObject>>>,
}

impl Reactor {
    /// Creates the [`mio::Poll`], a registry handle for other threads, and the stop
    /// waker.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three OS resources can't be created.
    pub fn new() -> Result<Self, ReactorError> {
        let poll = Poll::new().map_err(ReactorError::PollCreation)?;
        let registry = poll
            .registry()
            .try_clone()
            .map_err(ReactorError::RegistryClone)?;
        let stop_waker =
            Waker::new(poll.registry(), STOP_TOKEN).map_err(ReactorError::WakerCreation)?;

        Ok(Self {
            poll: Mutex::new(poll),
            registry,
            stop_waker,
            objects: Mutex::new(HashMap::new()),
        })
    }

    /// Starts watching `object`. Safe to call from any thread, but a [`WorkerThread`]
    /// only ever calls it on its own thread (see [`WorkerThread::register()`]).
    ///
    /// # Errors
    ///
    /// - [`ReactorError::AlreadyRegistered`] if `object` is already attached.
    /// - [`ReactorError::Registration`] if [`epoll_ctl(2)`] rejects the descriptor.
    ///
    /// [`WorkerThread::register()`]: crate::WorkerHandle::register
    /// [`WorkerThread`]: crate::WorkerThread
    /// [`epoll_ctl(2)`]: https://man7.org/linux/man-pages/man2/epoll_ctl.2.html
    pub fn register(&self, object: &Arc<ReactorObject>) -> Result<(), ReactorError> {
        let mut objects = self.lock_objects();
        if objects.contains_key(&object.token) {
            return Err(ReactorError::AlreadyRegistered {
                token: object.token.0,
            });
        }

        self.registry
            .register(
                &mut SourceFd(&object.fd),
                object.token,
                object.interest.into(),
            )
            .map_err(|source| ReactorError::Registration {
                fd: object.fd,
                source,
            })?;
        objects.insert(object.token, Arc::clone(object));

        DEBUG_REACTOR_THREAD.then(|| {
            tracing::debug!(
                message = "reactor: registered",
                fd = object.fd,
                token = ?object.token
            );
        });

        Ok(())
    }

    /// Stops watching `object`. The object leaves the dispatch map before the descriptor
    /// is removed from [`epoll`], so no callback fires after this returns on the loop
    /// thread, even if the removal itself fails.
    ///
    /// # Errors
    ///
    /// - [`ReactorError::NotRegistered`] if `object` isn't attached.
    /// - [`ReactorError::Deregistration`] if [`epoll_ctl(2)`] fails (for example, the
    ///   descriptor was closed too early).
    ///
    /// [`epoll_ctl(2)`]: https://man7.org/linux/man-pages/man2/epoll_ctl.2.html
    /// [`epoll`]: https://man7.org/linux/man-pages/man7/epoll.7.html
    pub fn unregister(&self, object: &ReactorObject) -> Result<(), ReactorError> {
        let removed = self.lock_objects().remove(&object.token);
        if removed.is_none() {
            return Err(ReactorError::NotRegistered {
                token: object.token.0,
            });
        }

        DEBUG_REACTOR_THREAD.then(|| {
            tracing::debug!(
                message = "reactor: unregistered",
                fd = object.fd,
                token = ?object.token
            );
        });

        self.registry
            .deregister(&mut SourceFd(&object.fd))
            .map_err(|source| ReactorError::Deregistration {
                fd: object.fd,
                source,
            })
    }

    #[must_use]
    pub fn is_registered(&self, object: &ReactorObject) -> bool {
        self.lock_objects().contains_key(&object.token)
    }

    #[must_use]
    pub fn registered_count(&self) -> usize { self.lock_objects().len() }

    /// Asks [`run_blocking_loop()`] to return. Non-blocking, callable from any thread,
    /// and also honored if it happens before the loop starts.
    ///
    /// [`run_blocking_loop()`]: Self::run_blocking_loop
    pub fn stop(&self) {
        if let Err(err) = self.stop_waker.wake() {
            tracing::error!(message = "reactor: failed to wake for stop", error = ?err);
        }
    }

    /// Blocks the calling thread, dispatching callbacks of registered objects as they
    /// become ready, until [`stop()`] is called.
    ///
    /// # Errors
    ///
    /// - [`ReactorError::AlreadyRunning`] if another thread is inside this loop.
    /// - [`ReactorError::Poll`] if [`epoll_wait(2)`] fails with anything but `EINTR`.
    ///
    /// [`epoll_wait(2)`]: https://man7.org/linux/man-pages/man2/epoll_wait.2.html
    /// [`stop()`]: Self::stop
    pub fn run_blocking_loop(&self) -> Result<(), ReactorError> {
        let mut poll = match self.poll.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(ReactorError::AlreadyRunning),
        };
        let mut ready_events_buffer = Events::with_capacity(EVENTS_CAPACITY);

        while self.poll_once(&mut poll, &mut ready_events_buffer)? == Continuation::Continue
        {}

        Ok(())
    }

    /// Detaches every object, dropping the reactor's references to them. Errors from
    /// [`epoll`] are ignored, since descriptors may already be closed at teardown.
    /// Returns how many objects were detached.
    ///
    /// [`epoll`]: https://man7.org/linux/man-pages/man7/epoll.7.html
    pub fn clear(&self) -> usize {
        let objects: Vec<_> = self.lock_objects().drain().map(|(_, it)| it).collect();
        for object in &objects {
            let _unused = self.registry.deregister(&mut SourceFd(&object.fd));
        }
        objects.len()
    }

    /// One blocking poll, then dispatch of everything it reported.
    fn poll_once(
        &self,
        poll: &mut Poll,
        ready_events_buffer: &mut Events,
    ) -> Result<Continuation, ReactorError> {
        // Block until a registered source or the stop waker is ready.
        if let Err(err) = poll.poll(ready_events_buffer, None) {
            // EINTR - retry (signal interrupted syscall).
            if err.kind() == ErrorKind::Interrupted {
                return Ok(Continuation::Continue);
            }
            return Err(ReactorError::Poll(err));
        }

        for event in ready_events_buffer.iter() {
            if event.token() == STOP_TOKEN {
                DEBUG_REACTOR_THREAD.then(|| {
                    tracing::debug!(message = "reactor: stop requested");
                });
                return Ok(Continuation::Stop);
            }
            self.dispatch(event);
        }

        Ok(Continuation::Continue)
    }

    fn dispatch(&self, event: &Event) {
        let token = event.token();

        if (event.is_readable() || event.is_read_closed() || event.is_error())
            && let Some(object) = self.lookup(token)
        {
            object.on_read_ready();
        }

        // The read callback may have detached the object.
        if (event.is_writable() || event.is_write_closed())
            && let Some(object) = self.lookup(token)
        {
            object.on_write_ready();
        }

        self.rearm(token);
    }

    fn rearm(&self, token: Token) {
        let Some(object) = self.lookup(token) else {
            return;
        };
        if let Err(err) = self.registry.reregister(
            &mut SourceFd(&object.fd),
            token,
            object.interest.into(),
        ) {
            tracing::warn!(
                message = "reactor: failed to re-arm object",
                fd = object.fd,
                error = ?err
            );
        }
    }

    /// Clones the object out so the lock isn't held while its callback runs (the
    /// callback may register or unregister objects).
    fn lookup(&self, token: Token) -> Option<Arc<ReactorObject>> {
        self.lock_objects().get(&token).cloned()
    }

    fn lock_objects(&self) -> MutexGuard<'_, HashMap<Token, Arc<ReactorObject>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Reactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("registered_count", &self.registered_count())
            .finish_non_exhaustive()
    }
}
