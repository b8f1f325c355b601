// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

/// Control flow signal for loops and threads.
///
/// Returned by one iteration of the [`Reactor`] loop to tell
/// [`Reactor::run_blocking_loop()`] whether to block again or to return to the
/// [dispatch loop] so it can drain the work queue.
///
/// [`Reactor::run_blocking_loop()`]: crate::Reactor::run_blocking_loop
/// [`Reactor`]: crate::Reactor
/// [dispatch loop]: crate::WorkerThread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Continuation {
    /// Continue to the next iteration.
    #[default]
    Continue,

    /// Stop processing and exit the loop/thread.
    Stop,
}
