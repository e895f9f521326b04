//! tmux bridge: republish a PTY session into an attachable pane
//!
//! Each bridged session gets its own tmux server on a private socket
//! under the runtime directory. When the `aiterm-bridge` helper is on
//! PATH the pane is interactive (stdin forwarded to the session);
//! otherwise the pane read-only tails the session log.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::pty::PtyManager;
use aiterm_protocol::{BridgeCreateResponse, BridgeEntry, BridgeListResponse};
use aiterm_utils::{paths, AitermError, Result};

/// tmux options applied to every bridge session
const SESSION_OPTIONS: &[&[&str]] = &[
    &["status", "off"],
    &["mouse", "off"],
    &["history-limit", "200000"],
    &["allow-rename", "off"],
    &["set-titles", "off"],
];

/// Global tmux options applied to every bridge server
const GLOBAL_OPTIONS: &[&[&str]] = &[
    &["assume-paste-time", "0"],
    &["escape-time", "0"],
    // Disable the alternate screen so scrollback stays usable
    &["terminal-overrides", ",*:smcup@:rmcup@"],
];

/// Create a detached tmux session displaying the given PTY session
pub async fn create(
    pty: &PtyManager,
    id: &str,
    server_url: &str,
) -> Result<BridgeCreateResponse> {
    let socket = paths::bridge_socket_path(id);
    let session = paths::bridge_session_name(id);
    paths::ensure_dir(&paths::runtime_dir())?;

    // Prefer the interactive helper; fall back to tailing the log
    let interactive = lookup_path("aiterm-bridge").is_some();
    let shell_cmd = if interactive {
        format!("stty -echo; aiterm-bridge --server '{server_url}' --id '{id}'")
    } else {
        let log_path = pty
            .log_path(id)
            .ok_or_else(|| AitermError::bridge("no such session or no log"))?;
        format!("stty -echo; tail -F -n +1 -- '{}'", log_path.display())
    };

    let status = tmux(&socket)
        .args(["-f", "/dev/null", "new-session", "-d", "-s"])
        .arg(&session)
        .args(["sh", "-lc"])
        .arg(&shell_cmd)
        .status()
        .await;
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            warn!(%session, ?status, "tmux new-session failed");
            return Err(AitermError::bridge("tmux not available or failed"));
        }
        Err(e) => {
            warn!(%session, error = %e, "tmux could not be spawned");
            return Err(AitermError::bridge("tmux not available or failed"));
        }
    }

    for opt in SESSION_OPTIONS {
        let _ = tmux(&socket)
            .args(["set-option", "-t"])
            .arg(&session)
            .args(*opt)
            .status()
            .await;
    }
    for opt in GLOBAL_OPTIONS {
        let _ = tmux(&socket)
            .args(["set-option", "-g"])
            .args(*opt)
            .status()
            .await;
    }

    let mut attach_hint = format!("tmux -S '{}' attach -t '{}'", socket.display(), session);
    if !interactive {
        attach_hint.push_str(" -r");
    }
    let log_path = pty
        .log_path(id)
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    info!(session_id = %id, %session, interactive, "bridge created");
    Ok(BridgeCreateResponse {
        socket: socket.display().to_string(),
        session,
        attach_hint,
        log_path,
    })
}

/// Kill a bridge session and remove its socket
pub async fn destroy(socket: &str, session: &str) -> Result<()> {
    let _ = Command::new("tmux")
        .args(["-S", socket, "kill-session", "-t", session])
        .status()
        .await;
    let _ = std::fs::remove_file(socket);
    debug!(%session, "bridge destroyed");
    Ok(())
}

/// Discover bridge sockets under the runtime directory and probe their
/// liveness
pub async fn list() -> Result<BridgeListResponse> {
    let mut bridges = Vec::new();
    let dir = paths::runtime_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(BridgeListResponse { bridges }),
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(id) = name
            .strip_prefix("tmux-")
            .and_then(|rest| rest.strip_suffix(".sock"))
        else {
            continue;
        };
        let socket = entry.path();
        let session = paths::bridge_session_name(id);

        let alive = Command::new("tmux")
            .arg("-S")
            .arg(&socket)
            .args(["has-session", "-t"])
            .arg(&session)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);

        let log = paths::session_log_path(&paths::session_log_dir(), id);
        let log_path = if log.exists() {
            log.display().to_string()
        } else {
            String::new()
        };

        bridges.push(BridgeEntry {
            id: id.to_string(),
            socket: socket.display().to_string(),
            attach_hint: format!("tmux -S '{}' attach -t '{}'", socket.display(), session),
            session,
            log_path,
            alive,
        });
    }

    Ok(BridgeListResponse { bridges })
}

fn tmux(socket: &Path) -> Command {
    let mut cmd = Command::new("tmux");
    cmd.arg("-S").arg(socket);
    cmd
}

/// Resolve a binary on PATH, returning its full path
fn lookup_path(bin: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(bin);
        if let Ok(meta) = candidate.metadata() {
            use std::os::unix::fs::PermissionsExt;
            if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                return Some(candidate);
            }
        }
    }
    None
}
