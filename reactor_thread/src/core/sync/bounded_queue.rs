// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words eventfd

//! Fixed capacity, thread safe FIFO with an observable "has data" descriptor. See
//! [`BoundedQueue`] for details.

use super::Semaphore;
use miette::Diagnostic;
use rustix::fd::{AsRawFd as _, RawFd};
use std::{collections::{TryReserveError, VecDeque},
          fmt::{Debug, Formatter},
          io,
          sync::{Mutex, MutexGuard, PoisonError}};

/// A fixed capacity FIFO shared between any number of producers and consumers.
///
/// Two [`Semaphore`]s track the two things callers block on:
///
/// | Semaphore     | Count                | Who waits on it                            |
/// | :------------ | :------------------- | :----------------------------------------- |
/// | `enqueue_sem` | free slots           | [`enqueue()`] (backpressure when full)     |
/// | `dequeue_sem` | queued items         | [`dequeue()`], and a [`Reactor`] via fd    |
///
/// The [`VecDeque`] itself is only touched under a short [`Mutex`] critical section;
/// nobody blocks while holding it. Storage for `capacity` items is reserved up front, so
/// the queue never allocates after [`new()`] returns.
///
/// [`Reactor`]: crate::Reactor
/// [`dequeue()`]: Self::dequeue
/// [`enqueue()`]: Self::enqueue
/// [`new()`]: Self::new
pub struct BoundedQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    enqueue_sem: Semaphore,
    dequeue_sem: Semaphore,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue that holds at most `capacity` items.
    ///
    /// # Errors
    ///
    /// - [`QueueError::ZeroCapacity`] if `capacity` is `0` (or doesn't fit a semaphore
    ///   count).
    /// - [`QueueError::Allocation`] if storage for `capacity` items can't be reserved.
    /// - [`QueueError::Semaphore`] if either [`eventfd`] can't be created.
    ///
    /// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        let initial_free_slots =
            u32::try_from(capacity).map_err(|_| QueueError::ZeroCapacity)?;
        if initial_free_slots == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        let mut items = VecDeque::new();
        items.try_reserve_exact(capacity)?;

        Ok(Self {
            capacity,
            items: Mutex::new(items),
            enqueue_sem: Semaphore::new(initial_free_slots).map_err(QueueError::Semaphore)?,
            dequeue_sem: Semaphore::new(0).map_err(QueueError::Semaphore)?,
        })
    }

    /// Appends `item`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Semaphore`] if waiting for a free slot or signaling the new
    /// item fails at the OS level. In the first case `item` is dropped, never queued.
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        self.enqueue_sem.wait().map_err(QueueError::Semaphore)?;
        self.push_and_signal(item)
    }

    /// Appends `item` only if a slot is free right now. Gives `item` back in
    /// [`TryEnqueueError::Full`] otherwise.
    ///
    /// # Errors
    ///
    /// See [`TryEnqueueError`].
    pub fn try_enqueue(&self, item: T) -> Result<(), TryEnqueueError<T>> {
        match self.enqueue_sem.try_wait() {
            Ok(true) => self.push_and_signal(item).map_err(TryEnqueueError::Queue),
            Ok(false) => Err(TryEnqueueError::Full(item)),
            Err(err) => Err(TryEnqueueError::Queue(QueueError::Semaphore(err))),
        }
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Semaphore`] if waiting for or releasing a slot fails at the
    /// OS level.
    pub fn dequeue(&self) -> Result<T, QueueError> {
        loop {
            self.dequeue_sem.wait().map_err(QueueError::Semaphore)?;
            if let Some(item) = self.pop_and_release()? {
                return Ok(item);
            }
        }
    }

    /// Removes the oldest item if there is one, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Semaphore`] if the OS level semaphore operations fail.
    pub fn try_dequeue(&self) -> Result<Option<T>, QueueError> {
        if !self.dequeue_sem.try_wait().map_err(QueueError::Semaphore)? {
            return Ok(None);
        }
        self.pop_and_release()
    }

    /// Removes and drops every queued item without handing it to a consumer. Returns how
    /// many items were dropped. Items are dropped outside the internal lock, so their
    /// [`Drop`] impls may touch this queue again.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Semaphore`] if the OS level semaphore operations fail.
    pub fn clear(&self) -> Result<usize, QueueError> {
        let mut count = 0;
        while let Some(item) = self.try_dequeue()? {
            drop(item);
            count += 1;
        }
        Ok(count)
    }

    /// The [`eventfd`] that is readable exactly while at least one item is queued.
    /// Register it with a [`Reactor`] to get a callback per queued item.
    ///
    /// [`Reactor`]: crate::Reactor
    /// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
    #[must_use]
    pub fn ready_fd(&self) -> RawFd { self.dequeue_sem.as_raw_fd() }

    #[must_use]
    pub fn capacity(&self) -> usize { self.capacity }

    #[must_use]
    pub fn len(&self) -> usize { self.lock_items().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock_items().is_empty() }

    fn push_and_signal(&self, item: T) -> Result<(), QueueError> {
        self.lock_items().push_back(item);
        self.dequeue_sem.post().map_err(QueueError::Semaphore)
    }

    fn pop_and_release(&self) -> Result<Option<T>, QueueError> {
        let maybe_item = self.lock_items().pop_front();
        if maybe_item.is_some() {
            self.enqueue_sem.post().map_err(QueueError::Semaphore)?;
        }
        Ok(maybe_item)
    }

    /// [`VecDeque::push_back()`] and [`VecDeque::pop_front()`] can't leave the deque in
    /// a broken state, so a poisoned lock is safe to keep using.
    fn lock_items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Failures of the OS level primitives behind a [`BoundedQueue`].
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum QueueError {
    #[error("Queue capacity must be between 1 and u32::MAX")]
    #[diagnostic(code(reactor_thread::queue::zero_capacity))]
    ZeroCapacity,

    #[error("Failed to reserve storage for the queue")]
    #[diagnostic(
        code(reactor_thread::queue::allocation),
        help("The process is out of memory, or the requested capacity is too large")
    )]
    Allocation(#[from] TryReserveError),

    #[error("Queue semaphore operation failed")]
    #[diagnostic(
        code(reactor_thread::queue::semaphore),
        help(
            "Check OS resource limits - \
             use `ulimit -n` for file descriptors, \
             `cat /proc/sys/fs/file-max` for system-wide limit"
        )
    )]
    Semaphore(#[source] io::Error),
}

/// Returned by [`BoundedQueue::try_enqueue()`].
pub enum TryEnqueueError<T> {
    /// No free slot. The item is handed back, untouched.
    Full(T),
    /// The OS level semaphore operations failed.
    Queue(QueueError),
}

impl<T> Debug for TryEnqueueError<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Queue(err) => f.debug_tuple("Queue").field(err).finish(),
        }
    }
}
