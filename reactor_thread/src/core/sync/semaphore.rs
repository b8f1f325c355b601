// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words eventfd EINTR EAGAIN CLOEXEC

//! Counting semaphore backed by a Linux [`eventfd`]. See [`Semaphore`] for details.
//!
//! [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html

use rustix::{event::{EventfdFlags, PollFd, PollFlags, eventfd, poll},
             fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd},
             io::Errno};
use std::io;

/// Size of the counter an [`eventfd`] reads and writes.
///
/// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
const EVENTFD_COUNTER_SIZE: usize = size_of::<u64>();

/// A counting semaphore whose count lives in the kernel.
///
/// The [`eventfd`] is opened with `EFD_SEMAPHORE`, so each successful [`read(2)`]
/// decrements the count by exactly one, and the descriptor is **readable exactly while
/// the count is greater than zero**. That last property is what lets a [`Reactor`]
/// observe the semaphore (see [`BoundedQueue::ready_fd()`]).
///
/// | Operation      | Syscall                                                   |
/// | :------------- | :-------------------------------------------------------- |
/// | [`post()`]     | [`write(2)`] of `1`                                       |
/// | [`try_wait()`] | non-blocking [`read(2)`], `EAGAIN` means count is zero    |
/// | [`wait()`]     | [`try_wait()`], then [`poll(2)`] until readable, repeat   |
///
/// The descriptor is always non-blocking. [`wait()`] never blocks inside [`read(2)`]; it
/// blocks in [`poll(2)`] and retries the read, so several threads can wait on the same
/// semaphore without one of them getting stuck after losing a race.
///
/// [`BoundedQueue::ready_fd()`]: super::BoundedQueue::ready_fd
/// [`Reactor`]: crate::Reactor
/// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
/// [`poll(2)`]: https://man7.org/linux/man-pages/man2/poll.2.html
/// [`post()`]: Self::post
/// [`read(2)`]: https://man7.org/linux/man-pages/man2/read.2.html
/// [`try_wait()`]: Self::try_wait
/// [`wait()`]: Self::wait
/// [`write(2)`]: https://man7.org/linux/man-pages/man2/write.2.html
#[derive(Debug)]
pub struct Semaphore {
    fd: OwnedFd,
}

impl Semaphore {
    /// Creates a semaphore with `initial` available permits.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS can't create another descriptor (`EMFILE`, `ENFILE`,
    /// `ENOMEM`).
    pub fn new(initial: u32) -> io::Result<Self> {
        let fd = eventfd(
            initial,
            EventfdFlags::SEMAPHORE | EventfdFlags::NONBLOCK | EventfdFlags::CLOEXEC,
        )?;
        Ok(Self { fd })
    }

    /// Blocks until a permit is available, then takes it. There is no timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if [`poll(2)`] or [`read(2)`] fail with anything other than
    /// `EINTR` or `EAGAIN`.
    ///
    /// [`poll(2)`]: https://man7.org/linux/man-pages/man2/poll.2.html
    /// [`read(2)`]: https://man7.org/linux/man-pages/man2/read.2.html
    pub fn wait(&self) -> io::Result<()> {
        loop {
            if self.try_wait()? {
                return Ok(());
            }

            let mut poll_fds = [PollFd::new(&self.fd, PollFlags::IN)];
            match poll(&mut poll_fds, None) {
                Ok(_) | Err(Errno::INTR) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Takes a permit if one is available, without blocking.
    ///
    /// Returns `Ok(false)` if the count is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if [`read(2)`] fails with anything other than `EAGAIN` or
    /// `EINTR`.
    ///
    /// [`read(2)`]: https://man7.org/linux/man-pages/man2/read.2.html
    pub fn try_wait(&self) -> io::Result<bool> {
        let mut buf = [0_u8; EVENTFD_COUNTER_SIZE];
        loop {
            match rustix::io::read(&self.fd, &mut buf) {
                Ok(_) => return Ok(true),
                Err(Errno::AGAIN) => return Ok(false),
                Err(Errno::INTR) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Releases one permit, waking one waiter.
    ///
    /// # Errors
    ///
    /// Returns an error if [`write(2)`] fails. With a non-blocking [`eventfd`] that only
    /// happens if the count would exceed `u64::MAX - 1`.
    ///
    /// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
    /// [`write(2)`]: https://man7.org/linux/man-pages/man2/write.2.html
    pub fn post(&self) -> io::Result<()> {
        let buf = 1_u64.to_ne_bytes();
        loop {
            match rustix::io::write(&self.fd, &buf) {
                Ok(_) => return Ok(()),
                Err(Errno::INTR) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl AsFd for Semaphore {
    fn as_fd(&self) -> BorrowedFd<'_> { self.fd.as_fd() }
}

impl AsRawFd for Semaphore {
    fn as_raw_fd(&self) -> RawFd { self.fd.as_raw_fd() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::{Arc,
                     atomic::{AtomicBool, Ordering}},
              thread,
              time::Duration};

    #[test]
    fn test_try_wait_respects_count() {
        let sem = Semaphore::new(2).unwrap();
        assert!(sem.try_wait().unwrap());
        assert!(sem.try_wait().unwrap());
        assert!(!sem.try_wait().unwrap());

        sem.post().unwrap();
        assert!(sem.try_wait().unwrap());
        assert!(!sem.try_wait().unwrap());
    }

    #[test]
    fn test_wait_returns_immediately_with_permit() {
        let sem = Semaphore::new(1).unwrap();
        sem.wait().unwrap();
        assert!(!sem.try_wait().unwrap());
    }

    #[test]
    fn test_wait_blocks_until_post_from_other_thread() {
        let sem = Arc::new(Semaphore::new(0).unwrap());
        let woke = Arc::new(AtomicBool::new(false));

        let waiter = {
            let sem = Arc::clone(&sem);
            let woke = Arc::clone(&woke);
            thread::spawn(move || {
                sem.wait().unwrap();
                woke.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!woke.load(Ordering::SeqCst));

        sem.post().unwrap();
        waiter.join().unwrap();
        assert!(woke.load(Ordering::SeqCst));
    }

    #[test]
    fn test_each_post_wakes_one_of_many_waiters() {
        const WAITERS: usize = 4;
        let sem = Arc::new(Semaphore::new(0).unwrap());

        let handles: Vec<_> = (0..WAITERS)
            .map(|_| {
                let sem = Arc::clone(&sem);
                thread::spawn(move || sem.wait().unwrap())
            })
            .collect();

        for _ in 0..WAITERS {
            sem.post().unwrap();
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Every permit was consumed by exactly one waiter.
        assert!(!sem.try_wait().unwrap());
    }

    #[test]
    fn test_fd_readable_only_while_count_positive() {
        let sem = Semaphore::new(0).unwrap();
        let is_readable = |sem: &Semaphore| {
            let mut poll_fds = [PollFd::new(sem, PollFlags::IN)];
            let zero = rustix::event::Timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
            poll(&mut poll_fds, Some(&zero)).unwrap() == 1
        };

        assert!(!is_readable(&sem));
        sem.post().unwrap();
        assert!(is_readable(&sem));
        sem.wait().unwrap();
        assert!(!is_readable(&sem));
    }
}
