//! Persisted application settings

use crate::error::Error;
use crate::proxy::{CoordinatorConfig, DEFAULT_MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default settings file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_URL: &str = "example.com";

/// Scheme used for target URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    #[default]
    Http,
    Https,
}

impl Mode {
    pub fn scheme(&self) -> &'static str {
        match self {
            Mode::Http => "http",
            Mode::Https => "https",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Http => write!(f, "HTTP"),
            Mode::Https => write!(f, "HTTPS"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HTTP" => Ok(Mode::Http),
            "HTTPS" => Ok(Mode::Https),
            other => Err(Error::InvalidConfig(format!(
                "mode must be 'HTTP' or 'HTTPS', got '{}'",
                other
            ))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxies tested at the same time
    pub max_workers: usize,
    /// Per-request timeout in seconds
    pub timeout: u64,
    /// Target used when the user just presses Enter
    pub default_url: String,
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            timeout: DEFAULT_TIMEOUT_SECS,
            default_url: DEFAULT_URL.to_string(),
            mode: Mode::Http,
        }
    }
}

impl Config {
    /// Load settings from `path`.
    ///
    /// A missing file is replaced by the defaults, which are written back.
    /// A file that exists but does not decode is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = Self::default();
                info!(path = %path.display(), "no config file, writing defaults");
                if let Err(e) = config.save(path) {
                    warn!(error = %e, "could not write default config");
                }
                return Ok(config);
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        let config: Config = serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Write settings to `path` as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::io(path, io::Error::from(e)))?;
        fs::write(path, content).map_err(|e| Error::io(path, e))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout == 0 {
            return Err(Error::InvalidConfig("timeout must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Coordinator settings derived from this configuration
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::new().with_max_workers(self.max_workers)
    }

    /// Turn user input into an absolute target URL for the current mode.
    ///
    /// Input already carrying the mode's scheme is kept as is. Otherwise
    /// any scheme and `www.` prefix are stripped and the URL is rebuilt as
    /// `<scheme>://www.<rest>`. IP addresses and `localhost` get no `www.`.
    pub fn format_url(&self, url: &str) -> String {
        let url = url.trim();
        let scheme = self.mode.scheme();

        if url.starts_with(&format!("{}://", scheme)) {
            return url.to_string();
        }

        let rest = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .unwrap_or(url);
        let rest = rest.strip_prefix("www.").unwrap_or(rest);

        if needs_www(rest) {
            format!("{}://www.{}", scheme, rest)
        } else {
            format!("{}://{}", scheme, rest)
        }
    }
}

/// Whether the host part of `rest` is a domain name
fn needs_www(rest: &str) -> bool {
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    // Bracketed IPv6 literal
    if authority.starts_with('[') {
        return false;
    }
    let host = authority.rsplit_once(':').map_or(authority, |(host, _)| host);

    !(host.eq_ignore_ascii_case("localhost") || host.parse::<IpAddr>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(config.timeout, 10);
        assert_eq!(config.default_url, "example.com");
        assert_eq!(config.mode, Mode::Http);
    }

    #[test]
    fn test_load_missing_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let written: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"{"max_workers": 50, "timeout": 3, "default_url": "rust-lang.org", "mode": "HTTPS"}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_workers, 50);
        assert_eq!(config.timeout_duration(), Duration::from_secs(3));
        assert_eq!(config.default_url, "rust-lang.org");
        assert_eq!(config.mode, Mode::Https);
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, r#"{"timeout": 5}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout, 5);
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.mode, Mode::Http);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let config = Config {
            max_workers: 0,
            timeout: 7,
            default_url: "rust-lang.org".to_string(),
            mode: Mode::Https,
        };

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_save_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(DEFAULT_CONFIG_FILE);

        assert!(matches!(
            Config::default().save(&path),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_load_malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(Error::ConfigParse { .. })));

        fs::write(&path, r#"{"mode": "FTP"}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_load_zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, r#"{"timeout": 0}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&Mode::Https).unwrap(), r#""HTTPS""#);
        assert_eq!("HTTP".parse::<Mode>().unwrap(), Mode::Http);
        assert!("http".parse::<Mode>().is_err());
    }

    #[test]
    fn test_format_url_http() {
        let config = Config::default();
        assert_eq!(config.format_url("example.com"), "http://www.example.com");
        assert_eq!(config.format_url("www.example.com"), "http://www.example.com");
        assert_eq!(config.format_url("http://example.com"), "http://example.com");
        assert_eq!(config.format_url("https://example.com/a"), "http://www.example.com/a");
        assert_eq!(config.format_url("127.0.0.1:8080/x"), "http://127.0.0.1:8080/x");
        assert_eq!(config.format_url("localhost:3000"), "http://localhost:3000");
    }

    #[test]
    fn test_format_url_https() {
        let config = Config {
            mode: Mode::Https,
            ..Config::default()
        };
        assert_eq!(config.format_url("example.com"), "https://www.example.com");
        assert_eq!(config.format_url("http://www.example.com"), "https://www.example.com");
        assert_eq!(config.format_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_coordinator_config_from_settings() {
        let config = Config {
            max_workers: 25,
            ..Config::default()
        };
        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.max_workers, 25);
        assert_eq!(coordinator.trials, 3);
    }
}
