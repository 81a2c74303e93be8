//! Proxy data models

use crate::error::{Error, NetworkFailure};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Proxy endpoint as read from the proxy list
///
/// The string is kept as entered (minus surrounding whitespace); it is
/// only interpreted when a URL is needed for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proxy(String);

impl Proxy {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Proxy string with an `http://` scheme added when none is present
    pub fn normalized(&self) -> String {
        if self.0.starts_with("http://") || self.0.starts_with("https://") {
            self.0.clone()
        } else {
            format!("http://{}", self.0)
        }
    }

    /// Parse the normalized proxy string as a URL
    pub fn url(&self) -> Result<Url, Error> {
        // The URL parser silently drops tabs and trailing controls
        if self.0.chars().any(|c| c.is_ascii_control()) {
            return Err(Error::MalformedProxy(format!(
                "{}: contains control characters",
                self.0.escape_debug()
            )));
        }

        let url = Url::parse(&self.normalized())
            .map_err(|e| Error::MalformedProxy(format!("{}: {}", self.0, e)))?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::MalformedProxy(format!("{}: missing host", self.0)));
        }

        Ok(url)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Proxy {
    fn from(raw: &str) -> Self {
        Proxy::new(raw)
    }
}

impl From<String> for Proxy {
    fn from(raw: String) -> Self {
        Proxy::new(raw)
    }
}

/// Category tag of a result line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Success => "Success",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a single trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The proxy relayed the request and the target answered 200
    Success,
    /// The proxy relayed something, but not a 200
    UnexpectedStatus(u16),
    /// The request failed in transport
    Network(NetworkFailure),
    /// The proxy string could not be used; no request was sent
    MalformedProxy,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success)
    }

    pub fn severity(&self) -> Severity {
        match self {
            ProbeOutcome::Success => Severity::Success,
            ProbeOutcome::UnexpectedStatus(_) => Severity::Warning,
            ProbeOutcome::Network(_) | ProbeOutcome::MalformedProxy => Severity::Error,
        }
    }
}

/// Result of one trial against one proxy
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub proxy: Proxy,
    /// 1-based trial index
    pub trial: u32,
    pub outcome: ProbeOutcome,
    pub elapsed: Duration,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn new(proxy: Proxy, trial: u32, outcome: ProbeOutcome, elapsed: Duration) -> Self {
        Self {
            proxy,
            trial,
            outcome,
            elapsed,
            checked_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn severity(&self) -> Severity {
        self.outcome.severity()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    /// Everything after the `<Severity>: ` tag
    pub fn detail(&self) -> String {
        let ms = self.elapsed_ms();
        match &self.outcome {
            ProbeOutcome::Success => format!("{} is working ({} ms)", self.proxy, ms),
            ProbeOutcome::UnexpectedStatus(code) => {
                format!("{} - Unexpected status code {} ({} ms)", self.proxy, code, ms)
            }
            ProbeOutcome::Network(failure) => format!("{} - {} ({} ms)", self.proxy, failure, ms),
            ProbeOutcome::MalformedProxy => format!("{} - Invalid proxy format", self.proxy),
        }
    }

    /// Full tagged message, e.g. `Error: 1.2.3.4:80 - Connection refused (3 ms)`
    pub fn message(&self) -> String {
        format!("{}: {}", self.severity(), self.detail())
    }
}

/// Aggregate of all trials for one proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyVerdict {
    pub proxy: Proxy,
    pub successes: u32,
    pub trials: u32,
    pub working: bool,
}

impl ProxyVerdict {
    pub fn new(proxy: Proxy, successes: u32, trials: u32, required: u32) -> Self {
        Self {
            proxy,
            successes,
            trials,
            working: successes >= required,
        }
    }
}

impl fmt::Display for ProxyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.working && self.successes == self.trials {
            write!(f, "✓ {} passed all {} tests", self.proxy, self.trials)
        } else if self.working {
            write!(
                f,
                "✓ {} passed {}/{} tests",
                self.proxy, self.successes, self.trials
            )
        } else {
            write!(
                f,
                "✗ {} failed ({}/{} successful)",
                self.proxy, self.successes, self.trials
            )
        }
    }
}

/// One line of the live result stream
#[derive(Debug, Clone)]
pub enum RunEvent {
    Trial(ProbeResult),
    Verdict(ProxyVerdict),
}

impl RunEvent {
    pub fn proxy(&self) -> &Proxy {
        match self {
            RunEvent::Trial(result) => &result.proxy,
            RunEvent::Verdict(verdict) => &verdict.proxy,
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Trial(result) => write!(f, "Test {}: {}", result.trial, result.message()),
            RunEvent::Verdict(verdict) => verdict.fmt(f),
        }
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub working: usize,
    /// Percentage of working proxies, 0.0..=100.0
    pub rate: f64,
}

impl RunSummary {
    pub fn new(total: usize, working: usize) -> Result<Self, Error> {
        if total == 0 {
            return Err(Error::EmptyInput);
        }

        Ok(Self {
            total,
            working,
            rate: working as f64 / total as f64 * 100.0,
        })
    }

    /// Labeled lines for the summary panel
    pub fn lines(&self, trials: u32) -> Vec<String> {
        vec![
            format!("Total proxies tested: {}", self.total),
            format!("Working proxies (passed all {} tests): {}", trials, self.working),
            format!("Success rate: {:.2}%", self.rate),
        ]
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Verdicts in completion order
    pub verdicts: Vec<ProxyVerdict>,
    pub working: Vec<Proxy>,
    pub summary: RunSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_trims_input() {
        let proxy = Proxy::new("  127.0.0.1:8080 \t");
        assert_eq!(proxy.as_str(), "127.0.0.1:8080");
    }

    #[test]
    fn test_proxy_normalization() {
        assert_eq!(Proxy::new("127.0.0.1:8080").normalized(), "http://127.0.0.1:8080");
        assert_eq!(Proxy::new("http://1.2.3.4:80").normalized(), "http://1.2.3.4:80");
        assert_eq!(Proxy::new("https://1.2.3.4:443").normalized(), "https://1.2.3.4:443");
    }

    #[test]
    fn test_proxy_url() {
        let url = Proxy::new("user:pass@10.0.0.1:3128").url().unwrap();
        assert_eq!(url.host_str(), Some("10.0.0.1"));
        assert_eq!(url.port(), Some(3128));
        assert_eq!(url.username(), "user");
    }

    #[test]
    fn test_malformed_proxy_url() {
        assert!(matches!(
            Proxy::new("127.0.0.1:99999").url(),
            Err(Error::MalformedProxy(_))
        ));
        assert!(matches!(Proxy::new("[::1").url(), Err(Error::MalformedProxy(_))));
        assert!(matches!(
            Proxy::new("bad host:80").url(),
            Err(Error::MalformedProxy(_))
        ));

        for raw in ["127.0.0.1:8080\u{1}", "127.0.0.1:\t8080", "127.0.\u{7f}0.1:8080"] {
            assert!(
                matches!(Proxy::new(raw).url(), Err(Error::MalformedProxy(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn test_probe_result_messages() {
        let proxy = Proxy::new("1.2.3.4:80");
        let ms = Duration::from_millis(42);

        let ok = ProbeResult::new(proxy.clone(), 1, ProbeOutcome::Success, ms);
        assert_eq!(ok.message(), "Success: 1.2.3.4:80 is working (42 ms)");

        let warn = ProbeResult::new(proxy.clone(), 2, ProbeOutcome::UnexpectedStatus(407), ms);
        assert_eq!(
            warn.message(),
            "Warning: 1.2.3.4:80 - Unexpected status code 407 (42 ms)"
        );

        let err = ProbeResult::new(
            proxy.clone(),
            3,
            ProbeOutcome::Network(NetworkFailure::ConnectionRefused),
            ms,
        );
        assert_eq!(err.message(), "Error: 1.2.3.4:80 - Connection refused (42 ms)");
        assert_eq!(
            RunEvent::Trial(err).to_string(),
            "Test 3: Error: 1.2.3.4:80 - Connection refused (42 ms)"
        );

        let bad = ProbeResult::new(proxy, 1, ProbeOutcome::MalformedProxy, Duration::ZERO);
        assert_eq!(bad.message(), "Error: 1.2.3.4:80 - Invalid proxy format");
    }

    #[test]
    fn test_verdict_lines() {
        let proxy = Proxy::new("1.2.3.4:80");

        let pass = ProxyVerdict::new(proxy.clone(), 3, 3, 3);
        assert!(pass.working);
        assert_eq!(pass.to_string(), "✓ 1.2.3.4:80 passed all 3 tests");

        let fail = ProxyVerdict::new(proxy, 2, 3, 3);
        assert!(!fail.working);
        assert_eq!(fail.to_string(), "✗ 1.2.3.4:80 failed (2/3 successful)");
    }

    #[test]
    fn test_verdict_with_lower_threshold() {
        let proxy = Proxy::new("a:1");

        let all = ProxyVerdict::new(proxy.clone(), 3, 3, 2);
        assert!(all.working);
        assert_eq!(all.to_string(), "✓ a:1 passed all 3 tests");

        let enough = ProxyVerdict::new(proxy.clone(), 2, 3, 2);
        assert!(enough.working);
        assert_eq!(enough.to_string(), "✓ a:1 passed 2/3 tests");

        let short = ProxyVerdict::new(proxy, 1, 3, 2);
        assert!(!short.working);
        assert_eq!(short.to_string(), "✗ a:1 failed (1/3 successful)");
    }

    #[test]
    fn test_run_summary() {
        let summary = RunSummary::new(4, 1).unwrap();
        assert_eq!(summary.rate, 25.0);
        assert_eq!(summary.lines(3)[2], "Success rate: 25.00%");

        let summary = RunSummary::new(3, 3).unwrap();
        assert_eq!(summary.lines(3)[2], "Success rate: 100.00%");

        assert!(matches!(RunSummary::new(0, 0), Err(Error::EmptyInput)));
    }
}
