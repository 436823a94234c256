//! Utility Functions
//!
//! User-friendly error formatting for the binary.
//!
//! ```rust,no_run
//! use builtin_broker::utils::format_user_error;
//!
//! # fn run() -> anyhow::Result<()> { Ok(()) }
//! if let Err(e) = run() {
//!     eprintln!("{}", format_user_error(&e));
//! }
//! ```
//!
//! Error categories with context-aware help:
//! - Control socket errors → stale instances, directory permissions
//! - Config errors → syntax, value ranges
//! - UI worker errors → thread limits

pub mod errors;

pub use errors::format_user_error;
