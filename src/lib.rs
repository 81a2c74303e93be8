//! Proxy Verify - Concurrent Proxy Verifier
//!
//! Tests every proxy in a list several times against a target URL,
//! classifies each failure, and keeps only the proxies that pass every
//! trial.

pub mod config;
pub mod error;
pub mod proxy;
pub mod tui;

pub use config::{Config, Mode};
pub use error::{Error, NetworkFailure};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
