// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod reactor_error;
pub mod reactor_impl;
pub mod reactor_object;

// Re-export.
pub use reactor_error::*;
pub use reactor_impl::*;
pub use reactor_object::*;
