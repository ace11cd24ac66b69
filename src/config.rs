use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Maximum allowed length for a search query (characters).
pub const MAX_SEARCH_QUERY_LENGTH: usize = 10_000;

/// Maximum request body size accepted by the HTTP surface.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Per-request timeout.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of requests served concurrently.
pub const MAX_CONCURRENT_CONNECTIONS: usize = 100;

/// Largest file the walker/watcher will read into the index.
pub const MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;

/// Debounce quiescence window for the file watcher.
pub const WATCHER_DEBOUNCE_MS: u64 = 500;

/// Hard cap on debounce latency measured from the first event in a batch.
pub const WATCHER_DEBOUNCE_CAP_MS: u64 = 2000;

/// Fixed backoff between watcher restart attempts after a failure.
pub const WATCHER_RESTART_BACKOFF_SECS: u64 = 1;

/// Basename suffixes the walker and watcher consider indexable.
pub const INCLUDE_SUFFIXES: &[&str] = &[
    ".js", ".ts", ".jsx", ".tsx", ".py", ".go", ".rs", ".java", ".cs", ".php", ".rb", ".md",
    ".json", ".yaml", ".yml",
];

/// Path segments that exclude a file or directory from indexing, wherever they occur.
pub const EXCLUDE_SEGMENTS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "coverage",
    ".next",
    ".prism",
    ".claude-plugin",
];

pub fn is_includable_name(name: &str) -> bool {
    INCLUDE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

pub fn has_excluded_segment(relative: &Path) -> bool {
    relative.components().any(|c| {
        let s = c.as_os_str().to_string_lossy();
        EXCLUDE_SEGMENTS.iter().any(|seg| *seg == s.as_ref())
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub project_root: PathBuf,
    pub port: u16,
    pub enable_watcher: bool,
    pub shutdown_timeout_ms: u64,
    pub index_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let root_input = std::env::var("PROJECT_ROOT").unwrap_or_else(|_| ".".to_string());
        let project_root = dunce::canonicalize(&root_input).map_err(|e| {
            AppError::ConfigInvalid(format!(
                "PROJECT_ROOT '{}' could not be resolved: {}",
                root_input, e
            ))
        })?;
        if !project_root.is_dir() {
            return Err(AppError::ConfigInvalid(format!(
                "PROJECT_ROOT '{}' is not a directory",
                project_root.display()
            )));
        }

        let port_input = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port_input
            .parse::<u32>()
            .ok()
            .filter(|p| (1024..=65535).contains(p))
            .map(|p| p as u16)
            .ok_or_else(|| {
                AppError::ConfigInvalid(format!(
                    "PORT '{}' must be an integer in [1024, 65535]",
                    port_input
                ))
            })?;

        let enable_watcher = std::env::var("ENABLE_WATCHER")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let shutdown_timeout_ms: u64 = std::env::var("SHUTDOWN_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        let index_dir = project_root.join(".prism");
        std::fs::create_dir_all(&index_dir).map_err(AppError::Io)?;

        Ok(Self {
            project_root,
            port,
            enable_watcher,
            shutdown_timeout_ms,
            index_dir,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.index_dir.join("index.json")
    }

    pub fn snapshot_tmp_path(&self) -> PathBuf {
        self.index_dir.join("index.json.tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includable_suffixes_are_case_sensitive() {
        assert!(is_includable_name("main.rs"));
        assert!(!is_includable_name("main.RS"));
    }

    #[test]
    fn excluded_segment_anywhere_in_path() {
        assert!(has_excluded_segment(Path::new("a/node_modules/b.js")));
        assert!(!has_excluded_segment(Path::new("a/b/c.js")));
    }
}
