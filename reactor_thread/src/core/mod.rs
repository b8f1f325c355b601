// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

pub mod common;
pub mod log;
pub mod reactor;
pub mod sync;
pub mod worker_thread;

pub use common::*;
pub use log::*;
pub use reactor::*;
pub use sync::*;
pub use worker_thread::*;
