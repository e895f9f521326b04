//! One-shot command execution without a PTY
//!
//! Captures stdout/stderr and the exit code deterministically. Shares no
//! state with the PTY core; the same empty-environment default applies.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use aiterm_utils::{AitermError, Result};

/// Exit code reported when the run hit its timeout
const TIMEOUT_RC: i32 = 124;

/// Exit code reported when the process could not be started
const SPAWN_FAILURE_RC: i32 = 127;

/// A non-PTY command execution request
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Exact child environment; `None` means empty
    pub env: Option<HashMap<String, String>>,
    /// Wall-clock limit; `None` or zero means unlimited
    pub timeout: Option<Duration>,
    pub stdin: Option<Vec<u8>>,
}

/// Structured result of a completed (or failed) run
#[derive(Debug)]
pub struct RunOutcome {
    pub rc: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
    pub cwd: String,
    /// Human-readable failure note (timeout, spawn failure); the captured
    /// output is still valid when set
    pub error: Option<String>,
}

/// Execute a process without a PTY.
///
/// Returns `Err` only for invalid requests; spawn failures and timeouts
/// are reported inside the outcome (rc 127 / 124) so callers still see
/// whatever output was captured.
pub async fn shell_run(req: RunRequest) -> Result<RunOutcome> {
    if req.argv.is_empty() || req.argv[0].is_empty() {
        return Err(AitermError::invalid_argument("argv must not be empty"));
    }

    let mut cmd = Command::new(&req.argv[0]);
    cmd.args(&req.argv[1..]);
    cmd.env_clear();
    if let Some(env) = &req.env {
        cmd.envs(env);
    }

    let cwd = match &req.cwd {
        Some(dir) => {
            cmd.current_dir(dir);
            dir.display().to_string()
        }
        None => std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_default(),
    };

    cmd.stdin(if req.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let start = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Ok(RunOutcome {
                rc: SPAWN_FAILURE_RC,
                stdout: Vec::new(),
                stderr: Vec::new(),
                duration: start.elapsed(),
                cwd,
                error: Some(format!("failed to spawn process: {}", e)),
            });
        }
    };

    if let (Some(bytes), Some(mut stdin)) = (req.stdin, child.stdin.take()) {
        // Dropping the pipe afterwards delivers EOF
        let _ = stdin.write_all(&bytes).await;
    }

    let stdout_task = child.stdout.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            buf
        })
    });
    let stderr_task = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            buf
        })
    });

    let limit = req.timeout.filter(|t| !t.is_zero());
    let (status, timeout_error) = match limit {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(waited) => (Some(waited?), None),
            Err(_) => {
                debug!(argv = ?req.argv, ?limit, "run timed out, killing child");
                let _ = child.start_kill();
                let _ = child.wait().await;
                (None, Some(format!("timeout after {}ms", limit.as_millis())))
            }
        },
        None => (Some(child.wait().await?), None),
    };

    let stdout = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    let rc = match status {
        // Signal-killed children have no code; flattened deliberately
        Some(status) => status.code().unwrap_or(-1),
        None => TIMEOUT_RC,
    };

    Ok(RunOutcome {
        rc,
        stdout,
        stderr,
        duration: start.elapsed(),
        cwd,
        error: timeout_error,
    })
}
