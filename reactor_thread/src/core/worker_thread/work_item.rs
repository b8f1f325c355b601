// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::fmt::{Debug, Formatter};

/// One unit of deferred work, run exactly once on a worker's thread.
///
/// The closure owns whatever context it captured. Running the item consumes it, and an
/// item that is dropped without running (teardown after the loop exited) simply drops
/// its captures.
pub struct WorkItem {
    func: Box<dyn FnOnce() + Send + 'static>,
}

impl WorkItem {
    #[must_use]
    pub fn new(func: impl FnOnce() + Send + 'static) -> Self {
        Self {
            func: Box::new(func),
        }
    }

    pub fn run(self) { (self.func)() }
}

impl Debug for WorkItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem").finish_non_exhaustive()
    }
}
