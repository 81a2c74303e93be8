//! Single-trial proxy probe and failure classification

use crate::error::NetworkFailure;
use crate::proxy::models::{ProbeOutcome, ProbeResult, Proxy};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode, Url};
use std::error::Error as StdError;
use std::io;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default timeout for a single trial in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Browser user agent sent with every probe
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Text fallback for errors without a structured signal, in priority order.
/// Indices line up with `FALLBACK_KINDS`.
static FALLBACK_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)deadline exceeded|operation timed out|request timed out",
        r"(?i)connection refused",
        r"(?i)no such host|dns error|failed to lookup address|name or service not known|nodename nor servname",
        r"(?i)\beof\b|connection closed|unexpected end|connection reset|broken pipe",
        r"(?i)malformed http|invalid http|invalid (status|header)|parse error",
        r"(?i)i/o timeout|timed out",
    ])
    .expect("Invalid fallback classification patterns")
});

const FALLBACK_KINDS: [NetworkFailure; 6] = [
    NetworkFailure::TimedOut,
    NetworkFailure::ConnectionRefused,
    NetworkFailure::HostNotFound,
    NetworkFailure::ConnectionClosed,
    NetworkFailure::InvalidProxyResponse,
    NetworkFailure::IoTimeout,
];

/// Collapses runs of whitespace in joined error chains
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Runs one request through one proxy and classifies what happened.
///
/// A fresh client is built for every trial so that trials never share a
/// pooled connection. No retries happen here.
#[derive(Debug, Clone)]
pub struct ProbeClassifier {
    timeout: Duration,
    user_agent: String,
}

impl ProbeClassifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `target` through `proxy` once
    pub async fn probe(&self, proxy: &Proxy, target: &Url, trial: u32) -> ProbeResult {
        let client = match self.create_client(proxy) {
            Ok(client) => client,
            Err(outcome) => return ProbeResult::new(proxy.clone(), trial, outcome, Duration::ZERO),
        };

        let start = Instant::now();
        let response = tokio::time::timeout(
            self.timeout,
            client
                .get(target.clone())
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .send(),
        )
        .await;
        let elapsed = start.elapsed();

        let outcome = match response {
            Ok(Ok(response)) if response.status() == StatusCode::OK => ProbeOutcome::Success,
            Ok(Ok(response)) => ProbeOutcome::UnexpectedStatus(response.status().as_u16()),
            Ok(Err(e)) => {
                debug!(proxy = %proxy, error = %error_chain(&e), "probe request failed");
                ProbeOutcome::Network(classify(&e))
            }
            Err(_) => ProbeOutcome::Network(NetworkFailure::TimedOut),
        };

        ProbeResult::new(proxy.clone(), trial, outcome, elapsed)
    }

    /// Build a client routed through the proxy
    fn create_client(&self, proxy: &Proxy) -> Result<Client, ProbeOutcome> {
        let proxy_url = proxy.url().map_err(|_| ProbeOutcome::MalformedProxy)?;
        let reqwest_proxy =
            ReqwestProxy::all(proxy_url).map_err(|_| ProbeOutcome::MalformedProxy)?;

        Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProbeOutcome::Network(classify(&e)))
    }
}

impl Default for ProbeClassifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

/// Map a transport error onto the failure taxonomy.
///
/// Structured signals win: reqwest's own timeout flag, then the
/// `io::ErrorKind` of any I/O error in the source chain. Text matching over
/// the whole chain is the last resort.
pub fn classify(err: &reqwest::Error) -> NetworkFailure {
    if err.is_timeout() {
        return NetworkFailure::TimedOut;
    }

    if let Some(kind) = io_error_kind(err) {
        match kind {
            io::ErrorKind::ConnectionRefused => return NetworkFailure::ConnectionRefused,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => return NetworkFailure::ConnectionClosed,
            io::ErrorKind::TimedOut => return NetworkFailure::IoTimeout,
            _ => {}
        }
    }

    classify_message(&error_chain(err))
}

/// Classify an error by its text alone
pub fn classify_message(message: &str) -> NetworkFailure {
    FALLBACK_PATTERNS
        .matches(message)
        .iter()
        .next()
        .map_or(NetworkFailure::Unknown, |i| FALLBACK_KINDS[i])
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = e.source();
    }
    None
}

/// All messages in the error's source chain joined with `: `
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(e) = source {
        parts.push(e.to_string());
        source = e.source();
    }
    WHITESPACE.replace_all(&parts.join(": "), " ").into_owned()
}
