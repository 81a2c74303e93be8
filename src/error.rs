//! Error types for proxy verification

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run or the process.
///
/// Per-trial problems never surface here; they are folded into a
/// [`ProbeOutcome`](crate::proxy::ProbeOutcome) by the classifier.
#[derive(Debug, Error)]
pub enum Error {
    /// No proxies were supplied to a run
    #[error("No proxies found.")]
    EmptyInput,

    /// A proxy string that cannot be turned into a proxy URL
    #[error("Invalid proxy format: {0}")]
    MalformedProxy(String),

    /// The target URL is not an absolute URL
    #[error("Invalid target URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    /// The persisted configuration exists but cannot be decoded
    #[error("Error parsing config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration decoded but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File system error on a named path
    #[error("Error accessing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// None of the candidate proxy files could be opened
    #[error("proxy list not found (checked {} locations)", checked.len())]
    ProxyFileNotFound { checked: Vec<PathBuf> },

    /// A worker task ended without producing a verdict
    #[error("proxy worker failed: {0}")]
    Worker(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Transport-level failure of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkFailure {
    TimedOut,
    ConnectionRefused,
    HostNotFound,
    ConnectionClosed,
    InvalidProxyResponse,
    IoTimeout,
    Unknown,
}

impl NetworkFailure {
    /// Human-readable description used in result lines
    pub fn description(&self) -> &'static str {
        match self {
            NetworkFailure::TimedOut => "Timed out",
            NetworkFailure::ConnectionRefused => "Connection refused",
            NetworkFailure::HostNotFound => "Host not found",
            NetworkFailure::ConnectionClosed => "Connection closed unexpectedly",
            NetworkFailure::InvalidProxyResponse => "Invalid response from proxy",
            NetworkFailure::IoTimeout => "Connection timed out",
            NetworkFailure::Unknown => "Unknown error",
        }
    }

    /// Whether this failure means the proxy did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkFailure::TimedOut | NetworkFailure::IoTimeout)
    }
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
