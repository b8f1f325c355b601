// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Blocking primitives shared between a [`WorkerThread`] and the threads that talk to it.
//! Both are built on Linux [`eventfd`]s so a [`Reactor`] can wait on them.
//!
//! [`Reactor`]: crate::Reactor
//! [`WorkerThread`]: crate::WorkerThread
//! [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html

pub mod bounded_queue;
pub mod semaphore;

pub use bounded_queue::*;
pub use semaphore::*;
