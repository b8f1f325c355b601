// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words gettid

//! The worker façade. See [`WorkerThread`] for details.

use super::{DEBUG_REACTOR_THREAD, PostError, RegistrationRequest, StartupRendezvous,
            THREAD_NAME_MAX, UnregistrationRequest, WORK_QUEUE_CAPACITY, WorkItem,
            WorkerThreadError, WorkerThreadState, run_dispatch_loop};
use crate::{BoundedQueue, Reactor, ReactorObject, Semaphore, TryEnqueueError};
use smallstr::SmallString;
use std::{fmt::{Debug, Formatter},
          sync::{Arc, OnceLock,
                 atomic::{AtomicU8, Ordering}},
          thread::{JoinHandle, ThreadId}};

/// Inline storage for a thread name of up to [`THREAD_NAME_MAX`] bytes.
pub type ThreadName = SmallString<[u8; THREAD_NAME_MAX + 1]>;

/// A dedicated OS thread that owns a [`Reactor`] and a [`BoundedQueue`] of
/// [`WorkItem`]s, and runs every item and every reactor callback, one at a time.
///
/// # Create
///
/// [`new()`] only returns once the thread is alive, named, and serving its queue. On any
/// failure nothing is left behind: the thread (if spawned) is joined, and the queue and
/// reactor are released before the error is returned.
///
/// # Use
///
/// All the operations live on [`WorkerHandle`] (this type [`Deref`]s to it). A
/// [`WorkerHandle`] is a cheap clone that work items and reactor callbacks can capture to
/// reach their own worker. It can post, register, unregister, and stop, but only the
/// [`WorkerThread`] can join.
///
/// # Destroy
///
/// Dropping (or [`destroy()`]) does, in order:
/// 1. [`stop()`] the reactor loop.
/// 2. Join the OS thread. Everything posted before the loop saw the stop runs, either in
///    the loop or in the shutdown drain. A panic on the worker is logged here.
/// 3. Drop still queued items without running them, and detach every reactor object.
///
/// There is no "null" [`WorkerThread`]; an absent one is an [`Option::None`], and
/// dropping that does nothing.
///
/// [`Deref`]: std::ops::Deref
/// [`destroy()`]: Self::destroy
/// [`new()`]: Self::new
/// [`stop()`]: WorkerHandle::stop
pub struct WorkerThread {
    handle: WorkerHandle,
    maybe_join_handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Creates a worker with a queue of [`WORK_QUEUE_CAPACITY`] items. `name` is
    /// truncated to [`THREAD_NAME_MAX`] bytes (at a character boundary).
    ///
    /// # Errors
    ///
    /// See [`WorkerThreadError`].
    pub fn new(name: &str) -> Result<Self, WorkerThreadError> {
        Self::with_capacity(name, WORK_QUEUE_CAPACITY)
    }

    /// Same as [`new()`], with a custom queue capacity.
    ///
    /// # Errors
    ///
    /// See [`WorkerThreadError`].
    ///
    /// [`new()`]: Self::new
    pub fn with_capacity(name: &str, capacity: usize) -> Result<Self, WorkerThreadError> {
        let queue = Arc::new(
            BoundedQueue::new(capacity).map_err(WorkerThreadError::QueueCreation)?,
        );
        let reactor = Reactor::new().map_err(WorkerThreadError::ReactorCreation)?;
        let (startup_signal, startup_waiter) =
            StartupRendezvous::new().map_err(WorkerThreadError::Rendezvous)?;
        let shared = Arc::new(WorkerShared {
            name: ThreadName::from_str(truncate_thread_name(name)),
            reactor,
            queue,
            tid: OnceLock::new(),
            thread_id: OnceLock::new(),
            state: AtomicU8::new(WorkerThreadState::Created as u8),
        });

        shared.set_state(WorkerThreadState::Starting);
        let shared_clone = Arc::clone(&shared);
        // If spawning fails the closure is dropped, and with it the startup signal.
        let join_handle = std::thread::Builder::new()
            .spawn(move || run_dispatch_loop(shared_clone, startup_signal))
            .map_err(WorkerThreadError::ThreadSpawn)?;

        let worker = Self {
            handle: WorkerHandle { shared },
            maybe_join_handle: Some(join_handle),
        };

        // On failure `worker` drops here, which joins the thread and frees everything.
        startup_waiter.wait()?;

        DEBUG_REACTOR_THREAD.then(|| {
            tracing::debug!(message = "worker: created", worker = %worker.name());
        });

        Ok(worker)
    }

    /// A clone of this worker's [`WorkerHandle`].
    #[must_use]
    pub fn handle(&self) -> WorkerHandle { self.handle.clone() }

    /// Explicit spelling of `drop(worker)`.
    pub fn destroy(self) { drop(self); }
}

impl std::ops::Deref for WorkerThread {
    type Target = WorkerHandle;

    fn deref(&self) -> &Self::Target { &self.handle }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        let Some(join_handle) = self.maybe_join_handle.take() else {
            return;
        };
        let shared = &self.handle.shared;

        shared.stop();

        if shared.is_worker_thread() {
            // Joining itself would never return. The loop exits once this item returns.
            tracing::error!(
                message = "worker: dropped on its own thread, not joining",
                worker = %shared.name
            );
            return;
        }

        if join_handle.join().is_err() {
            tracing::error!(message = "worker: thread panicked", worker = %shared.name);
        }

        if let Err(err) = shared.queue.clear() {
            tracing::error!(message = "worker: failed to clear queue", error = ?err);
        }
        let detached = shared.reactor.clear();

        DEBUG_REACTOR_THREAD.then(|| {
            tracing::debug!(message = "worker: destroyed", worker = %shared.name, detached);
        });
    }
}

impl Debug for WorkerThread {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread")
            .field("shared", &self.handle.shared)
            .field("joined", &self.maybe_join_handle.is_none())
            .finish()
    }
}

/// Non-owning reference to a worker. See [`WorkerThread`].
///
/// The handle's methods are the only way in. The shared state and the request types it
/// posts stay inside the crate:
///
/// ```compile_fail
/// use reactor_thread::WorkerShared;
/// ```
///
/// ```compile_fail
/// use reactor_thread::UnregistrationRequest;
/// ```
///
/// ```compile_fail
/// use reactor_thread::drain_work_queue;
/// ```
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    shared: Arc<WorkerShared>,
}

impl WorkerHandle {
    /// Queues `func` to run on the worker, after everything queued before it. Blocks
    /// while the queue is full.
    ///
    /// Posting from the worker's own thread never blocks: if the queue is full the item
    /// is rejected with [`PostError::WouldDeadlock`].
    ///
    /// # Errors
    ///
    /// See [`PostError`]. In every error case `func` is dropped without running.
    pub fn post(&self, func: impl FnOnce() + Send + 'static) -> Result<(), PostError> {
        self.shared.post(WorkItem::new(func))
    }

    /// Asks the reactor loop to return. Doesn't wait, and doesn't drain; dropping the
    /// [`WorkerThread`] does both.
    pub fn stop(&self) { self.shared.stop(); }

    /// Attaches `object` to this worker's reactor, on the worker's thread. Doesn't wait
    /// for the attach to happen. An attach that fails on the worker is logged.
    ///
    /// Called on the worker itself, the attach happens right away.
    ///
    /// # Errors
    ///
    /// Returns a [`PostError`] if the request couldn't be queued.
    pub fn register(&self, object: Arc<ReactorObject>) -> Result<(), PostError> {
        let request = RegistrationRequest {
            worker: self.clone(),
            object,
        };
        if self.is_worker_thread() {
            request.execute();
            return Ok(());
        }
        self.shared.post(WorkItem::new(move || request.execute()))
    }

    /// Detaches `object` from this worker's reactor and blocks until the detach has run
    /// on the worker. Once this returns, `object`'s callbacks are never called again, so
    /// its descriptor may be closed.
    ///
    /// Called on the worker itself, or after the worker has terminated, the detach happens
    /// right away.
    ///
    /// If the worker exits while the request is queued, the request is dropped
    /// unexecuted, which also releases this call. No callback can fire once the loop is
    /// gone.
    ///
    /// If the confirmation semaphore can't be created, or the request can't be queued,
    /// the failure is logged and `object` stays attached.
    pub fn unregister(&self, object: &Arc<ReactorObject>) {
        if self.is_worker_thread() || self.state() == WorkerThreadState::Terminated {
            if let Err(err) = self.reactor().unregister(object) {
                tracing::warn!(
                    message = "worker: unregister failed",
                    worker = %self.name(),
                    fd = object.fd(),
                    error = ?err
                );
            }
            return;
        }

        let done = match Semaphore::new(0) {
            Ok(it) => Arc::new(it),
            Err(err) => {
                tracing::error!(
                    message = "worker: no semaphore for unregister, object stays attached",
                    worker = %self.name(),
                    fd = object.fd(),
                    error = ?err
                );
                return;
            }
        };

        let request = UnregistrationRequest {
            worker: self.clone(),
            object: Arc::clone(object),
            done: Arc::clone(&done),
        };
        if let Err(err) = self.shared.post(WorkItem::new(move || request.execute())) {
            tracing::error!(
                message = "worker: failed to queue unregister, object stays attached",
                worker = %self.name(),
                error = ?err
            );
            return;
        }

        // The worker may have exited between the state check above and the enqueue, after
        // its exit-time clear. Then nothing else would ever drop the request.
        self.shared.reclaim_after_exit(object);

        if let Err(err) = done.wait() {
            tracing::error!(
                message = "worker: failed waiting for unregister",
                worker = %self.name(),
                error = ?err
            );
        }
    }

    /// The (possibly truncated) name, as the OS sees it.
    #[must_use]
    pub fn name(&self) -> &str { &self.shared.name }

    #[must_use]
    pub fn reactor(&self) -> &Reactor { &self.shared.reactor }

    #[must_use]
    pub fn state(&self) -> WorkerThreadState { self.shared.state() }

    /// OS thread id ([`gettid(2)`]) of the worker, once it has started.
    ///
    /// [`gettid(2)`]: https://man7.org/linux/man-pages/man2/gettid.2.html
    #[must_use]
    pub fn tid(&self) -> Option<i32> { self.shared.tid.get().copied() }

    /// Whether the caller is running on this worker's thread.
    #[must_use]
    pub fn is_worker_thread(&self) -> bool { self.shared.is_worker_thread() }
}

/// State shared by a [`WorkerThread`], its [`WorkerHandle`]s, and the dispatch loop.
pub(crate) struct WorkerShared {
    pub(crate) name: ThreadName,
    pub(crate) reactor: Reactor,
    pub(crate) queue: Arc<BoundedQueue<WorkItem>>,
    pub(crate) tid: OnceLock<i32>,
    thread_id: OnceLock<ThreadId>,
    state: AtomicU8,
}

impl WorkerShared {
    #[must_use]
    pub(crate) fn state(&self) -> WorkerThreadState {
        WorkerThreadState::from_repr(self.state.load(Ordering::SeqCst))
            .unwrap_or(WorkerThreadState::Terminated)
    }

    pub(crate) fn set_state(&self, state: WorkerThreadState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Called on the worker's thread before it signals startup.
    pub(crate) fn record_thread_identity(&self) {
        let _unused = self
            .tid
            .set(rustix::thread::gettid().as_raw_nonzero().get());
        let _unused = self.thread_id.set(std::thread::current().id());
    }

    #[must_use]
    pub(crate) fn is_worker_thread(&self) -> bool {
        self.thread_id
            .get()
            .is_some_and(|id| *id == std::thread::current().id())
    }

    /// Moves [`Running`] to [`Stopping`] and wakes the reactor. Any other state is left
    /// alone.
    ///
    /// [`Running`]: WorkerThreadState::Running
    /// [`Stopping`]: WorkerThreadState::Stopping
    pub(crate) fn stop(&self) {
        let _unused = self.state.compare_exchange(
            WorkerThreadState::Running as u8,
            WorkerThreadState::Stopping as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.reactor.stop();
    }

    pub(crate) fn post(&self, item: WorkItem) -> Result<(), PostError> {
        let result = if self.is_worker_thread() {
            // The only consumer is this thread, so a full queue can't drain while
            // blocked.
            match self.queue.try_enqueue(item) {
                Ok(()) => Ok(()),
                Err(TryEnqueueError::Full(_item)) => Err(PostError::WouldDeadlock {
                    name: self.name.to_string(),
                }),
                Err(TryEnqueueError::Queue(err)) => Err(PostError::Queue(err)),
            }
        } else if self.state() == WorkerThreadState::Terminated {
            // Nobody will ever dequeue again.
            match self.queue.try_enqueue(item) {
                Ok(()) => Ok(()),
                Err(TryEnqueueError::Full(_item)) => Err(PostError::Terminated {
                    name: self.name.to_string(),
                }),
                Err(TryEnqueueError::Queue(err)) => Err(PostError::Queue(err)),
            }
        } else {
            self.queue.enqueue(item).map_err(PostError::Queue)
        };

        if let Err(err) = &result {
            tracing::error!(message = "worker: post failed, item dropped", error = ?err);
        }
        result
    }
    /// Once [`Terminated`], drops anything still queued (releasing blocked
    /// [`WorkerHandle::unregister()`] callers) and detaches `object` directly. Does
    /// nothing while the worker is alive.
    ///
    /// [`Terminated`]: WorkerThreadState::Terminated
    pub(crate) fn reclaim_after_exit(&self, object: &ReactorObject) {
        if self.state() != WorkerThreadState::Terminated {
            return;
        }
        if let Err(err) = self.queue.clear() {
            tracing::error!(
                message = "worker: failed to clear queue after exit",
                worker = %self.name,
                error = ?err
            );
        }
        if self.reactor.is_registered(object)
            && let Err(err) = self.reactor.unregister(object)
        {
            tracing::warn!(
                message = "worker: unregister failed",
                worker = %self.name,
                fd = object.fd(),
                error = ?err
            );
        }
    }
}

impl Debug for WorkerShared {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerShared")
            .field("name", &self.name.as_str())
            .field("state", &self.state())
            .field("tid", &self.tid.get())
            .field("queue", &self.queue)
            .field("reactor", &self.reactor)
            .finish_non_exhaustive()
    }
}

/// Longest prefix of `name` that fits in [`THREAD_NAME_MAX`] bytes without splitting a
/// character.
#[must_use]
pub fn truncate_thread_name(name: &str) -> &str {
    if name.len() <= THREAD_NAME_MAX {
        return name;
    }
    let mut end = THREAD_NAME_MAX;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactorInterest;
    use pretty_assertions::assert_eq;
    use std::{os::{fd::AsRawFd as _, unix::net::UnixStream},
              sync::{Mutex, atomic::AtomicUsize, mpsc},
              thread,
              time::{Duration, Instant}};
    use test_case::test_case;

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    /// Runs `f` on the worker and hands back its result.
    fn run_on<T: Send + 'static>(
        worker: &WorkerThread,
        f: impl FnOnce() -> T + Send + 'static,
    ) -> T {
        let (tx, rx) = mpsc::channel();
        worker
            .post(move || {
                let _unused = tx.send(f());
            })
            .unwrap();
        rx.recv().unwrap()
    }

    /// Blocks the worker until the returned sender is used (or dropped).
    fn block_worker(worker: &WorkerThread) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();
        worker
            .post(move || {
                started_tx.send(()).unwrap();
                let _unused = rx.recv();
            })
            .unwrap();
        started_rx.recv().unwrap();
        tx
    }

    #[test_case("W1", "W1" ; "short name kept")]
    #[test_case("exactly15bytes!", "exactly15bytes!" ; "fits exactly")]
    #[test_case("a_very_long_worker_name", "a_very_long_wor" ; "ascii truncated")]
    #[test_case("abcdefghijklmnö", "abcdefghijklmn" ; "multibyte not split")]
    fn test_truncate_thread_name(name: &str, expected: &str) {
        assert_eq!(truncate_thread_name(name), expected);
    }

    #[test]
    fn test_new_is_running_and_named() {
        let worker = WorkerThread::new("a_very_long_worker_name").unwrap();
        assert_eq!(worker.name(), "a_very_long_wor");
        assert_eq!(worker.state(), WorkerThreadState::Running);

        let os_name = run_on(&worker, || {
            std::fs::read_to_string("/proc/thread-self/comm").unwrap()
        });
        assert_eq!(os_name.trim_end(), worker.name());
    }

    #[test]
    fn test_tid_matches_worker_thread() {
        let worker = WorkerThread::new("tid").unwrap();
        let observed = run_on(&worker, || rustix::thread::gettid().as_raw_nonzero().get());
        assert_eq!(worker.tid(), Some(observed));
        assert!(!worker.is_worker_thread());
        let handle = worker.handle();
        assert!(run_on(&worker, move || handle.is_worker_thread()));
    }

    #[test]
    fn test_naming_failure_fails_create() {
        let result = WorkerThread::new("bad\0name");
        assert!(matches!(
            result,
            Err(WorkerThreadError::ThreadNaming { .. })
        ));
    }

    #[test]
    fn test_post_200_then_destroy_runs_all() {
        let worker = WorkerThread::new("W1").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            worker
                .post(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        worker.destroy();
        assert_eq!(counter.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn test_items_run_in_fifo_order_on_worker() {
        let worker = WorkerThread::new("fifo").unwrap();
        let seen = Arc::new(Mutex::new(vec![]));
        for it in 0..50 {
            let seen = Arc::clone(&seen);
            let handle = worker.handle();
            worker
                .post(move || {
                    assert!(handle.is_worker_thread());
                    seen.lock().unwrap().push(it);
                })
                .unwrap();
        }
        drop(worker);
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_item_posted_from_item_runs_after_it() {
        let worker = WorkerThread::new("nested").unwrap();
        let seen = Arc::new(Mutex::new(vec![]));
        {
            let seen = Arc::clone(&seen);
            let handle = worker.handle();
            worker
                .post(move || {
                    let seen_inner = Arc::clone(&seen);
                    handle
                        .post(move || seen_inner.lock().unwrap().push("inner"))
                        .unwrap();
                    seen.lock().unwrap().push("outer");
                })
                .unwrap();
        }
        drop(worker);
        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_concurrent_posters_with_backpressure_lose_nothing() {
        const POSTERS: usize = 8;
        const PER_POSTER: usize = 250;

        let worker = WorkerThread::with_capacity("bp", 4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let gate = block_worker(&worker);

        let posters: Vec<_> = (0..POSTERS)
            .map(|_| {
                let handle = worker.handle();
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..PER_POSTER {
                        let counter = Arc::clone(&counter);
                        handle
                            .post(move || {
                                counter.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        // Posters fill the queue and block.
        assert!(wait_until(|| worker.shared.queue.len() == 4));
        drop(gate);

        for poster in posters {
            poster.join().unwrap();
        }
        drop(worker);
        assert_eq!(counter.load(Ordering::SeqCst), POSTERS * PER_POSTER);
    }

    #[test]
    fn test_self_post_to_full_queue_would_deadlock() {
        let worker = WorkerThread::with_capacity("selfpost", 2).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let handle = worker.handle();
        let ran_clone = Arc::clone(&ran);

        let results = run_on(&worker, move || {
            (0..3)
                .map(|_| {
                    let ran = Arc::clone(&ran_clone);
                    handle.post(move || {
                        ran.fetch_add(1, Ordering::SeqCst);
                    })
                })
                .collect::<Vec<_>>()
        });

        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(PostError::WouldDeadlock { .. })));

        // The worker keeps serving.
        assert_eq!(run_on(&worker, || 7), 7);
        drop(worker);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    /// A socket pair whose write end is always writable, so a write-interest object on it
    /// gets a callback on every poll.
    fn counting_writable_object(
        count: &Arc<AtomicUsize>,
    ) -> (Arc<ReactorObject>, UnixStream, UnixStream) {
        let (left, right) = UnixStream::pair().unwrap();
        let count = Arc::clone(count);
        let object = Arc::new(
            ReactorObject::new(left.as_raw_fd(), ReactorInterest::Write).with_write_ready(
                move || {
                    count.fetch_add(1, Ordering::SeqCst);
                },
            ),
        );
        (object, left, right)
    }

    #[test]
    fn test_register_then_unregister_stops_callbacks() {
        let worker = WorkerThread::new("W2").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let (object, left, _right) = counting_writable_object(&count);

        worker.register(Arc::clone(&object)).unwrap();
        assert!(wait_until(|| count.load(Ordering::SeqCst) > 0));

        worker.unregister(&object);
        assert!(!worker.reactor().is_registered(&object));

        let after_unregister = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_unregister);

        // Safe to close now.
        drop(left);
        drop(worker);
    }

    #[test]
    fn test_register_immediately_followed_by_unregister() {
        let worker = WorkerThread::new("W2").unwrap();
        for _ in 0..20 {
            let count = Arc::new(AtomicUsize::new(0));
            let (object, left, _right) = counting_writable_object(&count);

            worker.register(Arc::clone(&object)).unwrap();
            worker.unregister(&object);

            let after_unregister = count.load(Ordering::SeqCst);
            drop(left);
            // Round trip through the worker, then nothing more may have fired.
            run_on(&worker, || ());
            assert_eq!(count.load(Ordering::SeqCst), after_unregister);
        }
        assert_eq!(worker.reactor().registered_count(), 1);
    }

    #[test]
    fn test_unregister_from_worker_thread_is_immediate() {
        let worker = WorkerThread::new("inline").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let (object, _left, _right) = counting_writable_object(&count);
        let handle = worker.handle();

        let still_registered = run_on(&worker, move || {
            handle.register(Arc::clone(&object)).unwrap();
            assert!(handle.reactor().is_registered(&object));
            handle.unregister(&object);
            handle.reactor().is_registered(&object)
        });

        assert!(!still_registered);
    }

    #[test]
    fn test_items_left_after_exit_are_dropped_unrun() {
        struct DropGuard(Arc<AtomicUsize>);
        impl Drop for DropGuard {
            fn drop(&mut self) { self.0.fetch_add(1, Ordering::SeqCst); }
        }

        let worker = WorkerThread::new("late").unwrap();
        worker.stop();
        assert!(wait_until(|| worker.state() == WorkerThreadState::Terminated));

        let ran = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        {
            let ran = Arc::clone(&ran);
            let guard = DropGuard(Arc::clone(&dropped));
            worker
                .post(move || {
                    let _guard = guard;
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        drop(worker);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_request_queued_after_exit_is_released() {
        let worker = WorkerThread::new("stranded").unwrap();
        worker.stop();
        // The dispatch thread holds its clones until the exit-time clear is done.
        assert!(wait_until(|| Arc::strong_count(&worker.shared) == 1));
        assert_eq!(worker.state(), WorkerThreadState::Terminated);

        let count = Arc::new(AtomicUsize::new(0));
        let (object, _left, _right) = counting_writable_object(&count);
        worker.reactor().register(&object).unwrap();

        // A request that lands in the queue after the worker has already cleared it.
        let done = Arc::new(Semaphore::new(0).unwrap());
        let request = UnregistrationRequest {
            worker: worker.handle(),
            object: Arc::clone(&object),
            done: Arc::clone(&done),
        };
        worker
            .shared
            .queue
            .enqueue(WorkItem::new(move || request.execute()))
            .unwrap();
        assert!(!done.try_wait().unwrap());

        worker.shared.reclaim_after_exit(&object);

        assert!(done.try_wait().unwrap());
        assert!(worker.shared.queue.is_empty());
        assert!(!worker.reactor().is_registered(&object));
    }

    #[test]
    fn test_reclaim_is_noop_while_running() {
        let worker = WorkerThread::new("alive").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let (object, _left, _right) = counting_writable_object(&count);
        worker.register(Arc::clone(&object)).unwrap();
        assert!(wait_until(|| worker.reactor().is_registered(&object)));

        worker.shared.reclaim_after_exit(&object);

        assert!(worker.reactor().is_registered(&object));
        worker.unregister(&object);
        assert!(!worker.reactor().is_registered(&object));
    }

    #[test]
    fn test_stop_moves_through_states() {
        let worker = WorkerThread::new("states").unwrap();
        let gate = block_worker(&worker);

        worker.stop();
        assert_eq!(worker.state(), WorkerThreadState::Stopping);

        drop(gate);
        assert!(wait_until(|| worker.state() == WorkerThreadState::Terminated));
    }

    #[test]
    fn test_drop_of_absent_worker_is_noop() {
        let maybe_worker: Option<WorkerThread> = None;
        drop(maybe_worker);
    }

    #[test]
    fn test_dropping_worker_releases_callback_captures() {
        let worker = WorkerThread::new("release").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let (object, _left, _right) = counting_writable_object(&count);
        worker.register(Arc::clone(&object)).unwrap();
        assert!(wait_until(|| worker.reactor().is_registered(&object)));

        drop(worker);
        assert_eq!(Arc::strong_count(&object), 1);
    }
}
