// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::TracingConfig;
use tracing::dispatcher;

/// Global default subscriber, which once set, can't be unset or changed.
///
/// Logging is **DISABLED** by **default**. If you don't call this function w/ a value
/// other than [`tracing_core::LevelFilter::OFF`], the [`tracing`] events emitted by the
/// worker threads (startup, naming failures, posting failures, shutdown drain overflow)
/// go nowhere.
///
/// # Errors
///
/// Returns an error if the file layer can't be created, or a global subscriber is
/// already installed.
pub fn try_initialize_logging_global(
    options: impl Into<TracingConfig>,
) -> miette::Result<()> {
    let it: TracingConfig = options.into();

    // Early return if the level filter is off.
    if matches!(it.get_level_filter(), tracing_core::LevelFilter::OFF) {
        return Ok(());
    }

    it.install_global()
}

/// Thread local subscriber, active for the current thread until the returned guard is
/// dropped. Events emitted on a [`WorkerThread`] are **not** captured by it, since they
/// happen on the worker's own OS thread; use [`try_initialize_logging_global()`] to see
/// those.
///
/// Returns `Ok(None)` when the level filter is [`tracing_core::LevelFilter::OFF`].
///
/// # Errors
///
/// Returns an error if the file layer can't be created.
///
/// [`WorkerThread`]: crate::WorkerThread
pub fn try_initialize_logging_thread_local(
    options: impl Into<TracingConfig>,
) -> miette::Result<Option<dispatcher::DefaultGuard>> {
    let it: TracingConfig = options.into();

    // Early return if the level filter is off.
    if matches!(it.get_level_filter(), tracing_core::LevelFilter::OFF) {
        return Ok(None);
    }

    it.install_thread_local().map(Some)
}
