//! Proxy module for probing and verifying proxies
//!
//! This module provides functionality for:
//! - Probing a proxy once and classifying the outcome
//! - Testing a whole proxy list concurrently with repeated trials
//! - Loading and saving line-delimited proxy lists

pub mod checker;
pub mod coordinator;
pub mod models;
pub mod parser;

pub use checker::{classify, classify_message, ProbeClassifier};
pub use coordinator::{
    CoordinatorConfig, ProbeCoordinator, ProbeRun, DEFAULT_MAX_WORKERS, DEFAULT_TRIALS,
};
pub use models::{
    ProbeOutcome, ProbeResult, Proxy, ProxyVerdict, RunEvent, RunReport, RunSummary, Severity,
};
pub use parser::{LoadedList, ProxyList, DEFAULT_PROXY_FILE};
