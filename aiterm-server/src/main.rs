//! aitermd - local PTY session daemon
//!
//! Spawns child processes on pseudo-terminals and exposes open / send /
//! read / resize / close over a local HTTP API so stateless clients can
//! drive interactive programs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;

use aiterm_utils::{init_logging_with_config, paths, LogConfig, LogOutput, Result};

mod bridge;
mod fsops;
mod http;
mod pty;
mod run;

use http::AppState;
use pty::PtyManager;

#[derive(Parser, Debug)]
#[command(name = "aitermd", version, about = "Local PTY session daemon")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8099")]
    addr: String,

    /// Directory receiving per-session output logs
    #[arg(long, value_name = "DIR")]
    session_log_dir: Option<PathBuf>,

    /// Write daemon logs to /tmp/aiterm/aitermd.log instead of stderr
    #[arg(long)]
    log_file: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut log_config = LogConfig::server();
    if args.log_file {
        log_config.output = LogOutput::File;
    }
    init_logging_with_config(log_config)?;

    let base_dir = args
        .session_log_dir
        .unwrap_or_else(paths::session_log_dir);
    let state = Arc::new(AppState {
        pty: PtyManager::with_base_dir(base_dir),
        server_url: format!("http://{}", args.addr),
    });

    let (shutdown_tx, _) = broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            let _ = signal_tx.send(());
        }
    });

    http::run_server(args.addr, Arc::clone(&state), shutdown_tx.subscribe()).await;

    // Terminate any sessions still running; their logs stay on disk
    state.pty.close_all().await;
    info!("aitermd stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["aitermd"]);
        assert_eq!(args.addr, "127.0.0.1:8099");
        assert!(args.session_log_dir.is_none());
        assert!(!args.log_file);
    }

    #[test]
    fn test_custom_args() {
        let args = Args::parse_from([
            "aitermd",
            "--addr",
            "0.0.0.0:9000",
            "--session-log-dir",
            "/var/tmp/sessions",
            "--log-file",
        ]);
        assert_eq!(args.addr, "0.0.0.0:9000");
        assert_eq!(
            args.session_log_dir,
            Some(PathBuf::from("/var/tmp/sessions"))
        );
        assert!(args.log_file);
    }
}
