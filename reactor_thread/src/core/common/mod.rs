// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

pub mod common_enums;

pub use common_enums::*;
