// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll eventfd gettid prctl

//! # Why use this crate
//!
//! Some subsystems need all of their callbacks to run on **one** OS thread: a protocol
//! scheduler that mutates its own state from I/O readiness callbacks and from work that
//! other threads hand it, for example. This crate provides exactly that unit, a
//! [`WorkerThread`], which combines:
//!
//! 1. A **startup rendezvous**. [`WorkerThread::new()`] only returns once the new thread
//!    is alive and has applied its OS-visible name.
//! 2. An embedded **reactor** ([`Reactor`], built on [`mio`]) that drives every readiness
//!    source attached to the thread, including the thread's own work queue.
//! 3. A **cross-thread registration protocol**. [`WorkerThread::register()`] attaches a
//!    [`ReactorObject`] asynchronously, [`WorkerThread::unregister()`] detaches it and
//!    blocks until the detach has happened on the worker, so the caller can free the
//!    object's resources right after it returns.
//!
//! ```text
//!   any thread                         worker thread (one OS thread)
//!   ──────────                         ─────────────────────────────
//!   post(f) ──► BoundedQueue (128) ──► eventfd readable ──► Reactor ──► f()
//!   register(obj) ──► queue ──────────────────────────────► reactor.register(obj)
//!   unregister(obj) ──► queue ────────────────────────────► reactor.unregister(obj)
//!        └── blocks on Semaphore ◄────────────── post ◄───────┘
//!   stop() ──► mio::Waker ──► loop exits ──► drain queue ──► thread exits
//! ```
//!
//! # Lifecycle
//!
//! | State                          | Entered when                                      |
//! | :----------------------------- | :------------------------------------------------ |
//! | [`WorkerThreadState::Starting`]   | the OS thread is spawned, rendezvous pending   |
//! | [`WorkerThreadState::Running`]    | the thread named itself and signaled           |
//! | [`WorkerThreadState::Stopping`]   | [`WorkerThread::stop()`] was called            |
//! | [`WorkerThreadState::Draining`]   | the reactor loop returned, queue is flushed    |
//! | [`WorkerThreadState::Terminated`] | the OS thread returned (or panicked)           |
//!
//! Dropping the [`WorkerThread`] stops, joins, and releases the queue (dropping any
//! items that never ran) and the reactor.
//!
//! # Example
//!
//! ```no_run
//! use reactor_thread::WorkerThread;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! # fn main() -> miette::Result<()> {
//! let worker = WorkerThread::new("my_worker")?;
//! let counter = Arc::new(AtomicUsize::new(0));
//! for _ in 0..10 {
//!     let counter = Arc::clone(&counter);
//!     worker.post(move || { counter.fetch_add(1, Ordering::SeqCst); })?;
//! }
//! drop(worker); // Stops, drains, and joins.
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//! # Ok(())
//! # }
//! ```
//!
//! # Platform
//!
//! Linux only: the queue and semaphores are [`eventfd`]s, and the thread is named with
//! [`prctl(PR_SET_NAME)`].
//!
//! [`Reactor`]: crate::Reactor
//! [`ReactorObject`]: crate::ReactorObject
//! [`WorkerThread`]: crate::WorkerThread
//! [`WorkerThread::new()`]: crate::WorkerThread::new
//! [`WorkerThread::register()`]: crate::WorkerHandle::register
//! [`WorkerThread::stop()`]: crate::WorkerHandle::stop
//! [`WorkerThread::unregister()`]: crate::WorkerHandle::unregister
//! [`WorkerThreadState::Draining`]: crate::WorkerThreadState::Draining
//! [`WorkerThreadState::Running`]: crate::WorkerThreadState::Running
//! [`WorkerThreadState::Starting`]: crate::WorkerThreadState::Starting
//! [`WorkerThreadState::Stopping`]: crate::WorkerThreadState::Stopping
//! [`WorkerThreadState::Terminated`]: crate::WorkerThreadState::Terminated
//! [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
//! [`mio`]: mio
//! [`prctl(PR_SET_NAME)`]: https://man7.org/linux/man-pages/man2/pr_set_name.2const.html

// Enforce strict error handling in production library code only. Tests are allowed to
// use .unwrap() (workspace `Cargo.toml` config allows it).
#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

// Attach modules (re-exported below to provide clean public API).
pub mod core;

// Re-export stable public API using glob imports for ergonomic, flat API surface.
pub use core::*;
