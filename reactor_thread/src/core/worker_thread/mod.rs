// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
mod dispatch_loop;
mod registration;
pub mod startup_rendezvous;
pub mod work_item;
pub mod worker_thread_impl;
pub mod worker_thread_types;

// Re-export.
pub(crate) use dispatch_loop::*;
pub(crate) use registration::*;
pub use startup_rendezvous::*;
pub use work_item::*;
pub use worker_thread_impl::*;
pub use worker_thread_types::*;
