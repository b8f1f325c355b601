// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

use miette::Diagnostic;
use std::{io, os::fd::RawFd};

/// Errors from creating or driving a [`Reactor`].
///
/// [`Reactor`]: super::Reactor
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ReactorError {
    /// [`mio::Poll::new()`] failed.
    #[error("Failed to create mio poll instance")]
    #[diagnostic(
        code(reactor_thread::reactor::poll_creation),
        help(
            "Check OS resource limits - \
             use `ulimit -n` for file descriptors, \
             `cat /proc/sys/fs/file-max` for system-wide limit"
        )
    )]
    PollCreation(#[source] io::Error),

    /// [`mio::Waker::new()`] failed.
    #[error("Failed to create mio waker")]
    #[diagnostic(
        code(reactor_thread::reactor::waker_creation),
        help("This is rare - check system resource limits for eventfd")
    )]
    WakerCreation(#[source] io::Error),

    /// [`mio::Registry::try_clone()`] failed.
    #[error("Failed to clone mio registry")]
    #[diagnostic(
        code(reactor_thread::reactor::registry_clone),
        help("The process may be out of file descriptors")
    )]
    RegistryClone(#[source] io::Error),

    #[error("Failed to register fd {fd} with epoll")]
    #[diagnostic(
        code(reactor_thread::reactor::registration),
        help("The fd may be closed, or it may not support readiness polling")
    )]
    Registration {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    #[error("Failed to deregister fd {fd} from epoll")]
    #[diagnostic(
        code(reactor_thread::reactor::deregistration),
        help("Keep the fd open until unregister returns")
    )]
    Deregistration {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    #[error("Object with token {token} is already registered")]
    #[diagnostic(code(reactor_thread::reactor::already_registered))]
    AlreadyRegistered { token: usize },

    #[error("Object with token {token} is not registered")]
    #[diagnostic(code(reactor_thread::reactor::not_registered))]
    NotRegistered { token: usize },

    /// Only one thread may run a reactor's loop at a time.
    #[error("Reactor loop is already running on another thread")]
    #[diagnostic(code(reactor_thread::reactor::already_running))]
    AlreadyRunning,

    #[error("mio poll failed")]
    #[diagnostic(code(reactor_thread::reactor::poll))]
    Poll(#[source] io::Error),
}
