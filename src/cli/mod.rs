//! CLI module
//!
//! Provides:
//! - Argument parsing (`serve`, `init`)
//! - Configuration overrides from flags
//! - Command dispatch

pub mod args;
pub mod dispatch;

// Re-exports
pub use args::{Args, Command};
pub use dispatch::{apply_overrides, init_model, run, serve};
