// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words gettid

//! The body of every worker's OS thread, started by [`WorkerThread::new()`].
//!
//! [`WorkerThread::new()`]: super::WorkerThread::new

use super::{DEBUG_REACTOR_THREAD, StartupSignal, WorkItem, WorkerShared,
            WorkerThreadError, WorkerThreadState};
use crate::{BoundedQueue, Reactor, ReactorInterest, ReactorObject};
use std::{ffi::CString, io, sync::Arc};

/// Runs once, on the spawned OS thread, for the worker's entire life.
///
/// 1. Applies the worker's name to the OS thread. On failure, reports it through
///    `startup` and returns; the loop never starts.
/// 2. Records the OS thread id and [`std::thread::ThreadId`].
/// 3. Attaches the work queue's [`ready_fd()`] to the reactor. Each read callback takes
///    exactly one [`WorkItem`] and runs it.
/// 4. Signals `startup`, releasing [`WorkerThread::new()`].
/// 5. Runs the reactor until [`stop()`].
/// 6. Drains whatever is still queued (see [`drain_work_queue()`]).
///
/// The attach happens before the signal so that a failure to bind the queue fails
/// [`WorkerThread::new()`] instead of leaving a worker that never runs anything.
///
/// A [`TerminationGuard`] marks the worker [`Terminated`] and drops any late arrivals on
/// the way out, including when a work item panics.
///
/// [`Terminated`]: WorkerThreadState::Terminated
/// [`WorkerThread::new()`]: super::WorkerThread::new
/// [`ready_fd()`]: BoundedQueue::ready_fd
/// [`stop()`]: super::WorkerHandle::stop
pub(crate) fn run_dispatch_loop(shared: Arc<WorkerShared>, startup: StartupSignal) {
    let _guard = TerminationGuard {
        shared: Arc::clone(&shared),
    };

    if let Err(source) = apply_thread_name(&shared.name) {
        startup.signal(Err(WorkerThreadError::ThreadNaming {
            name: shared.name.to_string(),
            source,
        }));
        return;
    }

    shared.record_thread_identity();

    let queue_object = match bind_work_queue(&shared) {
        Ok(it) => it,
        Err(err) => {
            startup.signal(Err(err));
            return;
        }
    };

    shared.set_state(WorkerThreadState::Running);
    startup.signal(Ok(()));

    DEBUG_REACTOR_THREAD.then(|| {
        tracing::debug!(message = "worker: started", worker = %shared.name, tid = ?shared.tid.get());
    });

    if let Err(err) = shared.reactor.run_blocking_loop() {
        tracing::error!(message = "worker: reactor loop failed", worker = %shared.name, error = ?err);
    }

    shared.set_state(WorkerThreadState::Draining);
    detach_work_queue(&shared.reactor, &queue_object, &shared.name);
    let drained = drain_work_queue(&shared.queue, &shared.name);

    DEBUG_REACTOR_THREAD.then(|| {
        tracing::debug!(message = "worker: drained", worker = %shared.name, drained);
    });
}

/// Runs queued items until the queue is observed empty, returning how many ran.
///
/// Producers may keep posting while this runs. Once more than [`capacity()`] items have
/// been drained a warning is logged (once), but draining continues: everything queued
/// before the queue is seen empty still runs.
///
/// [`capacity()`]: BoundedQueue::capacity
pub(crate) fn drain_work_queue(queue: &BoundedQueue<WorkItem>, worker_name: &str) -> usize {
    let mut drained = 0_usize;
    loop {
        match queue.try_dequeue() {
            Ok(Some(item)) => {
                item.run();
                drained += 1;
                if drained == queue.capacity() + 1 {
                    tracing::warn!(
                        message = "worker: queue still growing at shutdown",
                        worker = %worker_name,
                        capacity = queue.capacity()
                    );
                }
            }
            Ok(None) => return drained,
            Err(err) => {
                tracing::error!(
                    message = "worker: drain failed",
                    worker = %worker_name,
                    error = ?err
                );
                return drained;
            }
        }
    }
}

/// Stops reactor callbacks for the work queue before the drain takes over.
fn detach_work_queue(reactor: &Reactor, queue_object: &ReactorObject, worker_name: &str) {
    if let Err(err) = reactor.unregister(queue_object) {
        tracing::warn!(
            message = "worker: failed to detach work queue",
            worker = %worker_name,
            error = ?err
        );
    }
}

/// Sets the calling thread's name via [`prctl(PR_SET_NAME)`]. `name` is already
/// truncated to [`THREAD_NAME_MAX`].
///
/// [`THREAD_NAME_MAX`]: super::THREAD_NAME_MAX
/// [`prctl(PR_SET_NAME)`]: https://man7.org/linux/man-pages/man2/pr_set_name.2const.html
fn apply_thread_name(name: &str) -> io::Result<()> {
    let c_name = CString::new(name)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    rustix::thread::set_name(&c_name)?;
    Ok(())
}

/// Attaches the work queue to the reactor. Every time its [`ready_fd()`] is readable the
/// callback takes one item and runs it; the reactor re-arms the descriptor so the next
/// item gets its own callback.
///
/// The callback only captures the queue, so the reactor's object map holds no reference
/// back to the worker.
///
/// [`ready_fd()`]: BoundedQueue::ready_fd
fn bind_work_queue(
    shared: &WorkerShared,
) -> Result<Arc<ReactorObject>, WorkerThreadError> {
    let queue = Arc::clone(&shared.queue);
    let worker_name = shared.name.to_string();
    let queue_object = Arc::new(
        ReactorObject::new(shared.queue.ready_fd(), ReactorInterest::Read).with_read_ready(
            move || match queue.try_dequeue() {
                Ok(Some(item)) => item.run(),
                Ok(None) => {}
                Err(err) => tracing::error!(
                    message = "worker: dequeue failed",
                    worker = %worker_name,
                    error = ?err
                ),
            },
        ),
    );

    shared
        .reactor
        .register(&queue_object)
        .map_err(WorkerThreadError::QueueBinding)?;

    Ok(queue_object)
}

/// Marks the worker [`Terminated`] when the dispatch loop returns or unwinds, then drops
/// (without running) anything posted after the drain.
///
/// [`Terminated`]: WorkerThreadState::Terminated
#[allow(missing_debug_implementations)]
pub(crate) struct TerminationGuard {
    shared: Arc<WorkerShared>,
}

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        self.shared.set_state(WorkerThreadState::Terminated);
        match self.shared.queue.clear() {
            Ok(0) => {}
            Ok(dropped) => tracing::warn!(
                message = "worker: dropped work posted after exit",
                worker = %self.shared.name,
                dropped
            ),
            Err(err) => tracing::error!(
                message = "worker: failed to clear queue on exit",
                worker = %self.shared.name,
                error = ?err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TracingConfig, WriterConfig};
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::sync::Mutex;
    use tracing_core::LevelFilter;

    /// Runs `f` with a thread local subscriber that writes `WARN` and above to a fresh
    /// log file, and returns what was written.
    fn capture_warnings(file_name: &str, f: impl FnOnce()) -> String {
        let dir = std::env::temp_dir().join(format!(
            "reactor_thread_dispatch_test_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        let _unused = std::fs::remove_file(&path);

        let config = TracingConfig {
            writer_config: WriterConfig::File(path.to_str().unwrap().to_string()),
            level_filter: LevelFilter::WARN,
        };
        {
            let _guard = config.install_thread_local().unwrap();
            f();
        }
        std::fs::read_to_string(&path).unwrap()
    }

    #[test]
    fn test_drain_runs_everything_in_order() {
        let queue = BoundedQueue::new(4).unwrap();
        let seen = Arc::new(Mutex::new(vec![]));
        for it in 0..4 {
            let seen = Arc::clone(&seen);
            queue
                .enqueue(WorkItem::new(move || seen.lock().unwrap().push(it)))
                .unwrap();
        }

        assert_eq!(drain_work_queue(&queue, "test"), 4);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    #[serial]
    fn test_drain_keeps_going_past_capacity() {
        // Each item re-posts until 10 items have run, on a queue of capacity 2.
        fn chain(queue: Arc<BoundedQueue<WorkItem>>, remaining: usize) -> WorkItem {
            WorkItem::new(move || {
                if remaining > 0 {
                    let next = chain(Arc::clone(&queue), remaining - 1);
                    queue.try_enqueue(next).unwrap();
                }
            })
        }

        let queue = Arc::new(BoundedQueue::new(2).unwrap());
        queue.enqueue(chain(Arc::clone(&queue), 9)).unwrap();

        let mut drained = 0;
        let logs = capture_warnings("drain_overflow.log", || {
            drained = drain_work_queue(&queue, "test");
        });

        assert_eq!(drained, 10);
        assert!(queue.is_empty());
        // Logged once, not once per item past capacity.
        assert_eq!(logs.matches("queue still growing at shutdown").count(), 1);
    }

    #[test]
    #[serial]
    fn test_drain_within_capacity_logs_nothing() {
        let queue = BoundedQueue::new(4).unwrap();
        for _ in 0..4 {
            queue.enqueue(WorkItem::new(|| {})).unwrap();
        }

        let logs = capture_warnings("drain_quiet.log", || {
            assert_eq!(drain_work_queue(&queue, "test"), 4);
        });

        assert!(!logs.contains("queue still growing at shutdown"));
    }

    #[test]
    #[serial]
    fn test_detach_failure_is_logged() {
        let reactor = Reactor::new().unwrap();
        let queue = BoundedQueue::<WorkItem>::new(1).unwrap();
        let queue_object = ReactorObject::new(queue.ready_fd(), ReactorInterest::Read);

        // Never attached, so the detach fails.
        let logs = capture_warnings("detach_failure.log", || {
            detach_work_queue(&reactor, &queue_object, "test");
        });

        assert_eq!(logs.matches("failed to detach work queue").count(), 1);
    }

    #[test]
    fn test_interior_nul_is_a_naming_failure() {
        let err = apply_thread_name("bad\0name").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
