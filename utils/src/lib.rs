//! Shared infrastructure utilities for lookalike.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + fsync + rename)

pub mod atomic_write;

pub use atomic_write::{atomic_write_with, recover_bak_file};
