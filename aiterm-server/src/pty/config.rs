//! PTY spawn configuration

use std::collections::HashMap;
use std::path::PathBuf;

/// Default terminal rows when the caller passes zero or a negative value
pub const DEFAULT_ROWS: u16 = 40;

/// Default terminal columns when the caller passes zero or a negative value
pub const DEFAULT_COLS: u16 = 120;

/// Configuration for spawning a PTY session
///
/// The environment map REPLACES the child's environment: a session opened
/// without env entries runs with an empty environment (no PATH, no TERM).
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Command and arguments; argv[0] is the executable
    pub argv: Vec<String>,
    /// Working directory (daemon cwd when None)
    pub cwd: Option<PathBuf>,
    /// Exact child environment
    pub env: HashMap<String, String>,
    /// Requested terminal rows; <= 0 selects [`DEFAULT_ROWS`]
    pub rows: i32,
    /// Requested terminal columns; <= 0 selects [`DEFAULT_COLS`]
    pub cols: i32,
}

impl PtyConfig {
    /// Create a config for the given argv
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            cwd: None,
            env: HashMap::new(),
            rows: 0,
            cols: 0,
        }
    }

    /// Set working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add one environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge environment variables from a map
    pub fn with_env_map(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set requested terminal size
    pub fn with_size(mut self, rows: i32, cols: i32) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Terminal size with defaults substituted for non-positive requests
    pub fn effective_size(&self) -> (u16, u16) {
        let rows = if self.rows <= 0 {
            DEFAULT_ROWS
        } else {
            self.rows as u16
        };
        let cols = if self.cols <= 0 {
            DEFAULT_COLS
        } else {
            self.cols as u16
        };
        (rows, cols)
    }
}
