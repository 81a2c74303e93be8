//! Proxy list file loading and saving

use crate::error::Error;
use crate::proxy::models::Proxy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default file name of the proxy list
pub const DEFAULT_PROXY_FILE: &str = "proxies.txt";

/// Proxies read from a file, along with where they came from
#[derive(Debug, Clone)]
pub struct LoadedList {
    pub path: PathBuf,
    pub proxies: Vec<Proxy>,
    /// Lines in the file, blank ones included
    pub line_count: usize,
}

/// Line-delimited proxy list store
pub struct ProxyList;

impl ProxyList {
    /// Parse proxies from a string, one per line; blank lines are skipped
    pub fn parse_string(content: &str) -> Vec<Proxy> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Proxy::new)
            .collect()
    }

    /// Load proxies from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadedList, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let proxies = Self::parse_string(&content);
        let line_count = content.lines().count();

        info!(path = %path.display(), proxies = proxies.len(), lines = line_count, "loaded proxy list");

        Ok(LoadedList {
            path: path.to_path_buf(),
            proxies,
            line_count,
        })
    }

    /// Overwrite `path` with the proxies, one per line
    pub fn save<P: AsRef<Path>>(proxies: &[Proxy], path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let content: String = proxies
            .iter()
            .map(|p| format!("{}\n", p))
            .collect();

        fs::write(path, content).map_err(|e| Error::io(path, e))?;
        info!(path = %path.display(), proxies = proxies.len(), "saved proxy list");
        Ok(())
    }

    /// Places where a proxy list named `file` is looked for, in order:
    /// as given, under the current directory, next to the executable
    pub fn candidate_paths<P: AsRef<Path>>(file: P) -> Vec<PathBuf> {
        let file = file.as_ref();
        let mut paths = vec![file.to_path_buf()];

        if file.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                paths.push(cwd.join(file));
            }
            if let Some(dir) = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
            {
                paths.push(dir.join(file));
            }
        }

        paths
    }

    /// Load the first candidate that opens.
    ///
    /// `on_check` is called with each path before it is tried.
    pub fn locate<P, F>(file: P, mut on_check: F) -> Result<LoadedList, Error>
    where
        P: AsRef<Path>,
        F: FnMut(&Path),
    {
        let candidates = Self::candidate_paths(file);

        for path in &candidates {
            on_check(path);
            match Self::load(path) {
                Ok(list) => return Ok(list),
                Err(e) => warn!(error = %e, "proxy list candidate unusable"),
            }
        }

        Err(Error::ProxyFileNotFound {
            checked: candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_string_skips_blank_lines() {
        let content = "\n127.0.0.1:8080\n   \n  10.0.0.1:3128  \r\nhttp://1.2.3.4:80\n\n";
        let proxies = ProxyList::parse_string(content);
        assert_eq!(
            proxies,
            vec![
                Proxy::new("127.0.0.1:8080"),
                Proxy::new("10.0.0.1:3128"),
                Proxy::new("http://1.2.3.4:80"),
            ]
        );
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(ProxyList::parse_string("").is_empty());
        assert!(ProxyList::parse_string("\n \n\t\n").is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PROXY_FILE);
        let proxies = vec![
            Proxy::new("1.1.1.1:80"),
            Proxy::new("2.2.2.2:3128"),
            Proxy::new("https://3.3.3.3:443"),
        ];

        ProxyList::save(&proxies, &path).unwrap();
        let loaded = ProxyList::load(&path).unwrap();

        let expected: HashSet<_> = proxies.into_iter().collect();
        let actual: HashSet<_> = loaded.proxies.into_iter().collect();
        assert_eq!(actual, expected);
        assert_eq!(loaded.line_count, 3);
        assert_eq!(loaded.path, path);
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PROXY_FILE);
        fs::write(&path, "a:1\nb:2\nc:3\n").unwrap();

        ProxyList::save(&[Proxy::new("b:2")], &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "b:2\n");
    }

    #[test]
    fn test_candidate_paths_for_absolute_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PROXY_FILE);
        assert_eq!(ProxyList::candidate_paths(&path), vec![path]);
    }

    #[test]
    fn test_candidate_paths_for_relative_file() {
        let paths = ProxyList::candidate_paths(DEFAULT_PROXY_FILE);
        assert_eq!(paths[0], PathBuf::from(DEFAULT_PROXY_FILE));
        assert!(paths.len() >= 2);
        assert!(paths[1].is_absolute());
    }

    #[test]
    fn test_locate_reports_every_checked_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");

        let mut checked = Vec::new();
        let err = ProxyList::locate(&missing, |p| checked.push(p.to_path_buf())).unwrap_err();

        assert_eq!(checked, vec![missing.clone()]);
        match err {
            Error::ProxyFileNotFound { checked } => assert_eq!(checked, vec![missing]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_locate_finds_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PROXY_FILE);
        fs::write(&path, "1.1.1.1:80\n").unwrap();

        let list = ProxyList::locate(&path, |_| {}).unwrap();
        assert_eq!(list.proxies, vec![Proxy::new("1.1.1.1:80")]);
    }
}
