// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words taskthreads

//! Constants, lifecycle state, and errors of a [`WorkerThread`].
//!
//! [`WorkerThread`]: super::WorkerThread

use crate::{QueueError, ReactorError};
use miette::Diagnostic;
use std::io;

/// Nominal capacity of a worker's work queue. A full queue blocks posters.
pub const WORK_QUEUE_CAPACITY: usize = 128;

/// Longest thread name the kernel keeps, in bytes (`TASK_COMM_LEN - 1`).
pub const THREAD_NAME_MAX: usize = 15;

/// Set to `true` to log registration, startup, and shutdown chatter at debug level.
pub const DEBUG_REACTOR_THREAD: bool = false;

/// Where a [`WorkerThread`] is in its life.
///
/// ```text
/// Created ─► Starting ─► Running ─► Stopping ─► Draining ─► Terminated
///                │                                              ▲
///                └──────── naming failure ──────────────────────┘
/// ```
///
/// [`WorkerThread`]: super::WorkerThread
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::FromRepr,
    strum_macros::EnumIter,
    strum_macros::EnumCount,
)]
#[repr(u8)]
pub enum WorkerThreadState {
    Created,
    /// The OS thread is spawned, the creator waits on the startup rendezvous.
    Starting,
    /// The reactor loop is (about to be) running.
    Running,
    /// [`stop()`] was called, the loop is exiting.
    ///
    /// [`stop()`]: super::WorkerHandle::stop
    Stopping,
    /// The loop has exited, the queue is being flushed.
    Draining,
    /// The OS thread has returned (or unwound). Safe to join.
    Terminated,
}

/// Reasons [`WorkerThread::new()`] fails. Every resource created before the failure is
/// released before the error is returned.
///
/// [`WorkerThread::new()`]: super::WorkerThread::new
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum WorkerThreadError {
    #[error("Failed to create the work queue")]
    #[diagnostic(code(reactor_thread::worker::queue_creation))]
    QueueCreation(#[source] QueueError),

    #[error("Failed to create the reactor")]
    #[diagnostic(code(reactor_thread::worker::reactor_creation))]
    ReactorCreation(#[source] ReactorError),

    /// The startup semaphore couldn't be created or waited on.
    #[error("Startup rendezvous failed")]
    #[diagnostic(
        code(reactor_thread::worker::rendezvous),
        help(
            "Check OS resource limits - \
             use `ulimit -n` for file descriptors, \
             `cat /proc/sys/fs/file-max` for system-wide limit"
        )
    )]
    Rendezvous(#[source] io::Error),

    /// [`std::thread::Builder::spawn()`] failed.
    #[error("Failed to spawn worker thread")]
    #[diagnostic(
        code(reactor_thread::worker::thread_spawn),
        help(
            "The system may have reached its thread limit - \
             check `ulimit -u` for per-user limit, \
             `cat /proc/sys/kernel/threads-max` for system-wide limit"
        )
    )]
    ThreadSpawn(#[source] io::Error),

    /// The new thread couldn't apply its OS-visible name.
    #[error("Failed to name worker thread {name:?}")]
    #[diagnostic(
        code(reactor_thread::worker::thread_naming),
        help("Thread names can't contain NUL bytes")
    )]
    ThreadNaming {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The new thread couldn't attach its work queue to the reactor.
    #[error("Failed to bind the work queue to the reactor")]
    #[diagnostic(code(reactor_thread::worker::queue_binding))]
    QueueBinding(#[source] ReactorError),

    /// The new thread went away (most likely panicked) without signaling.
    #[error("Worker thread exited before finishing startup")]
    #[diagnostic(code(reactor_thread::worker::exited_before_startup))]
    WorkerExitedBeforeStartup,
}

/// Reasons [`WorkerHandle::post()`] didn't schedule a work item. In every case the item
/// is dropped without running.
///
/// [`WorkerHandle::post()`]: super::WorkerHandle::post
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum PostError {
    /// The worker posted to its own full queue. Blocking would wait for a slot that only
    /// the blocked thread itself can free.
    #[error("Worker {name:?} posted to its own full queue")]
    #[diagnostic(
        code(reactor_thread::post::would_deadlock),
        help(
            "Don't post from a work item while the queue may be full, \
             or give the worker a larger capacity"
        )
    )]
    WouldDeadlock { name: String },

    /// The worker has exited and its queue is full. Nothing will ever free a slot.
    #[error("Worker {name:?} has terminated and its queue is full")]
    #[diagnostic(code(reactor_thread::post::terminated))]
    Terminated { name: String },

    #[error("Failed to enqueue work item")]
    #[diagnostic(code(reactor_thread::post::queue))]
    Queue(#[source] QueueError),
}
