// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Logging setup for binaries and tests that embed a [`WorkerThread`]. The library
//! itself only emits [`tracing`] events; nothing is printed unless a subscriber is
//! installed with [`try_initialize_logging_global()`] or
//! [`try_initialize_logging_thread_local()`].
//!
//! [`WorkerThread`]: crate::WorkerThread

pub mod log_public_api;
pub mod rolling_file_appender_impl;
pub mod tracing_config;
pub mod tracing_init;

pub use log_public_api::*;
pub use rolling_file_appender_impl::*;
pub use tracing_config::*;
pub use tracing_init::*;
