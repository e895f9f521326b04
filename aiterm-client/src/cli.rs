//! Command-line argument parsing for the aiterm client
//!
//! Uses clap with derive macros. Commands taking a child argv expect it
//! after `--`, e.g. `aiterm pty-open -- /bin/bash -i`.

use std::collections::HashMap;

use clap::{Args, Parser, Subcommand};

use aiterm_utils::{AitermError, Result};

/// aiterm - client for the aitermd PTY session daemon
#[derive(Parser, Debug)]
#[command(name = "aiterm", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Server connection options shared by every subcommand
#[derive(Args, Debug)]
pub struct ServerOpts {
    /// aitermd server URL
    #[arg(long, env = "AITERM_SERVER", default_value = "http://127.0.0.1:8099")]
    pub server: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command without a PTY and print the captured result
    Run {
        #[command(flatten)]
        server: ServerOpts,
        /// Working directory for the child
        #[arg(long)]
        cwd: Option<String>,
        /// Wall-clock limit in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Exact child environment as KEY=VAL,... (empty when omitted)
        #[arg(long, value_name = "KEY=VAL,...")]
        env: Option<String>,
        /// Stdin payload, base64-encoded
        #[arg(long)]
        stdin_base64: Option<String>,
        /// Command and arguments, after --
        #[arg(required = true, last = true)]
        argv: Vec<String>,
    },

    /// Open a PTY session and print its id
    PtyOpen {
        #[command(flatten)]
        server: ServerOpts,
        #[arg(long, default_value_t = 24)]
        rows: i32,
        #[arg(long, default_value_t = 80)]
        cols: i32,
        /// Working directory for the child
        #[arg(long)]
        cwd: Option<String>,
        /// Exact child environment as KEY=VAL,... (TERM=dumb,PS1= when
        /// omitted)
        #[arg(long, value_name = "KEY=VAL,...")]
        env: Option<String>,
        /// Command and arguments, after --
        #[arg(required = true, last = true)]
        argv: Vec<String>,
    },

    /// Write input to a session
    PtySend {
        #[command(flatten)]
        server: ServerOpts,
        #[arg(long)]
        id: String,
        /// Data string to send (use --stdin for raw bytes)
        #[arg(long, conflicts_with = "stdin")]
        data: Option<String>,
        /// Read the payload from stdin instead
        #[arg(long)]
        stdin: bool,
    },

    /// Poll one batch of output chunks
    PtyRead {
        #[command(flatten)]
        server: ServerOpts,
        #[arg(long)]
        id: String,
        /// High-water mark: only chunks with seq greater than this
        #[arg(long, default_value_t = 0)]
        since: u64,
        #[arg(long, default_value_t = 65536)]
        max_bytes: usize,
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
    },

    /// Stream output to stdout until the session closes
    PtyFollow {
        #[command(flatten)]
        server: ServerOpts,
        #[arg(long)]
        id: String,
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
    },

    /// Set a session's terminal size
    PtyResize {
        #[command(flatten)]
        server: ServerOpts,
        #[arg(long)]
        id: String,
        #[arg(long)]
        rows: u16,
        #[arg(long)]
        cols: u16,
    },

    /// Terminate a session
    PtyClose {
        #[command(flatten)]
        server: ServerOpts,
        #[arg(long)]
        id: String,
    },

    /// List tmux bridges known to the daemon
    BridgeList {
        #[command(flatten)]
        server: ServerOpts,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
}

/// Parse a KEY=VAL,KEY2=VAL2 environment string
pub fn parse_env(spec: &str) -> Result<HashMap<String, String>> {
    let mut env = HashMap::new();
    for pair in spec.split(',') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| AitermError::invalid_argument(format!("invalid env pair: {:?}", pair)))?;
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env() {
        let env = parse_env("TERM=dumb,PS1=").unwrap();
        assert_eq!(env.get("TERM"), Some(&"dumb".to_string()));
        assert_eq!(env.get("PS1"), Some(&String::new()));
    }

    #[test]
    fn test_parse_env_rejects_bare_key() {
        assert!(parse_env("JUSTAKEY").is_err());
    }

    #[test]
    fn test_parse_env_value_may_contain_equals() {
        let env = parse_env("OPTS=a=b").unwrap();
        assert_eq!(env.get("OPTS"), Some(&"a=b".to_string()));
    }

    #[test]
    fn test_pty_open_args() {
        let cli = Cli::parse_from([
            "aiterm", "pty-open", "--rows", "40", "--cols", "120", "--", "/bin/bash", "-i",
        ]);
        match cli.command {
            Command::PtyOpen {
                rows, cols, argv, ..
            } => {
                assert_eq!(rows, 40);
                assert_eq!(cols, 120);
                assert_eq!(argv, vec!["/bin/bash", "-i"]);
            }
            other => panic!("wrong command: {:?}", other),
        }
    }

    #[test]
    fn test_pty_read_defaults() {
        let cli = Cli::parse_from(["aiterm", "pty-read", "--id", "ab12cd34"]);
        match cli.command {
            Command::PtyRead {
                id,
                since,
                max_bytes,
                timeout_ms,
                ..
            } => {
                assert_eq!(id, "ab12cd34");
                assert_eq!(since, 0);
                assert_eq!(max_bytes, 65536);
                assert_eq!(timeout_ms, 500);
            }
            other => panic!("wrong command: {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_argv() {
        assert!(Cli::try_parse_from(["aiterm", "run"]).is_err());
    }

    #[test]
    fn test_send_data_conflicts_with_stdin() {
        assert!(Cli::try_parse_from([
            "aiterm", "pty-send", "--id", "x", "--data", "hi", "--stdin"
        ])
        .is_err());
    }
}
