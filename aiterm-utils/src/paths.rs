//! Path conventions for aiterm
//!
//! Session logs, bridge sockets and the daemon log all live under a fixed
//! runtime directory so that external tools (tmux bridges, log tailers)
//! can find them without asking the daemon.

use std::path::{Path, PathBuf};

/// Base runtime directory shared by the daemon and its collaborators
const RUNTIME_DIR: &str = "/tmp/aiterm";

/// Get the runtime directory
///
/// Location: `/tmp/aiterm`
pub fn runtime_dir() -> PathBuf {
    PathBuf::from(RUNTIME_DIR)
}

/// Get the default directory holding per-session output logs
///
/// Location: `/tmp/aiterm/sessions`
pub fn session_log_dir() -> PathBuf {
    runtime_dir().join("sessions")
}

/// Get the log path for a session under the given base directory
///
/// Location: `<base_dir>/<session_id>.log`
pub fn session_log_path(base_dir: &Path, session_id: &str) -> PathBuf {
    base_dir.join(format!("{session_id}.log"))
}

/// Get the tmux socket path for a bridged session
///
/// Location: `/tmp/aiterm/tmux-<session_id>.sock`
pub fn bridge_socket_path(session_id: &str) -> PathBuf {
    runtime_dir().join(format!("tmux-{session_id}.sock"))
}

/// Get the tmux session name for a bridged session
pub fn bridge_session_name(session_id: &str) -> String {
    format!("ai-{session_id}")
}

/// Get the daemon log file path (used when file logging is enabled)
///
/// Location: `/tmp/aiterm/aitermd.log`
pub fn daemon_log_file() -> PathBuf {
    runtime_dir().join("aitermd.log")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
