//! PTY session registry and operation surface
//!
//! The manager owns the id → session map and nothing else. Its mutex is
//! held only for lookup and mutation of the map, never across PTY or
//! disk I/O.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use rand::Rng;
use tracing::{info, warn};

use super::buffer::Chunk;
use super::config::PtyConfig;
use super::handle::PtyHandle;
use super::session::PtySession;
use aiterm_utils::{paths, AitermError, Result};

/// Length of generated session ids
const SESSION_ID_LEN: usize = 8;

/// Manages PTY sessions for the daemon
pub struct PtyManager {
    sessions: Mutex<HashMap<String, Arc<PtySession>>>,
    /// Directory receiving per-session output logs
    base_dir: PathBuf,
}

impl PtyManager {
    /// Create a manager logging sessions under the default base directory
    pub fn new() -> Self {
        Self::with_base_dir(paths::session_log_dir())
    }

    /// Create a manager with a custom session log directory
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            base_dir,
        }
    }

    /// Spawn a child on a fresh PTY and register the session.
    ///
    /// The environment in `config` replaces the child's environment
    /// verbatim; nothing is inherited from the daemon. Failure to open
    /// the session log is non-fatal.
    pub fn open(&self, config: PtyConfig) -> Result<String> {
        if config.argv.is_empty() || config.argv[0].is_empty() {
            return Err(AitermError::invalid_argument("argv must not be empty"));
        }

        let (rows, cols) = config.effective_size();
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| AitermError::spawn(format!("failed to open PTY: {}", e)))?;

        let mut cmd = CommandBuilder::new(&config.argv[0]);
        cmd.args(&config.argv[1..]);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        // Exact environment: clear the inherited one first
        cmd.env_clear();
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| AitermError::spawn(e.to_string()))?;
        let child_pid = child.process_id();

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| AitermError::pty(format!("failed to clone reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| AitermError::pty(format!("failed to get writer: {}", e)))?;

        let id = self.fresh_id();
        let log_path = paths::session_log_path(&self.base_dir, &id);
        let log_file = match open_session_log(&self.base_dir, &log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(session_id = %id, error = %e, "session log unavailable");
                None
            }
        };

        let handle = PtyHandle::new(pair.master, writer, child_pid);
        let session = Arc::new(PtySession::new(id.clone(), handle, log_file, log_path));
        PtySession::start(&session, reader, child);

        self.sessions.lock().insert(id.clone(), session);
        info!(session_id = %id, argv = ?config.argv, rows, cols, "PTY session opened");
        Ok(id)
    }

    /// Write raw bytes to a session's PTY. Returns the bytes written;
    /// partial writes are not retried.
    pub async fn send(&self, id: &str, data: Vec<u8>) -> Result<usize> {
        let session = self.get(id)?;
        // PTY writes block when the child's input queue is full
        tokio::task::spawn_blocking(move || session.write(&data))
            .await
            .map_err(|e| AitermError::internal(format!("send task failed: {}", e)))?
    }

    /// Long-poll chunks with `seq > since_seq`; see [`PtySession::read`]
    pub async fn read(
        &self,
        id: &str,
        since_seq: u64,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<(Vec<Chunk>, bool)> {
        let session = self.get(id)?;
        Ok(session.read(since_seq, max_bytes, timeout).await)
    }

    /// Set a session's PTY window size
    pub fn resize(&self, id: &str, rows: u16, cols: u16) -> Result<()> {
        self.get(id)?.resize(rows, cols)
    }

    /// Terminate a session and drop it from the registry.
    ///
    /// Idempotent: closing an unknown id succeeds. The session stays
    /// registered until termination has completed.
    pub async fn close(&self, id: &str) -> Result<()> {
        let session = match self.sessions.lock().get(id) {
            Some(session) => Arc::clone(session),
            None => return Ok(()),
        };
        session.close().await;
        self.sessions.lock().remove(id);
        info!(session_id = %id, "PTY session closed");
        Ok(())
    }

    /// Terminate every registered session (daemon shutdown)
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        for id in ids {
            let _ = self.close(&id).await;
        }
    }

    /// Deterministic log path for a registered session
    pub fn log_path(&self, id: &str) -> Option<PathBuf> {
        self.sessions
            .lock()
            .get(id)
            .map(|s| s.log_path().to_path_buf())
    }

    /// Number of registered sessions
    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Exit code of a registered session, if its reaper has recorded one
    pub fn exit_rc(&self, id: &str) -> Result<Option<i32>> {
        Ok(self.get(id)?.exit_rc())
    }

    fn get(&self, id: &str) -> Result<Arc<PtySession>> {
        self.sessions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| AitermError::SessionNotFound(id.to_string()))
    }

    /// Generate an id not currently in the registry
    fn fresh_id(&self) -> String {
        let sessions = self.sessions.lock();
        loop {
            let id = generate_session_id();
            if !sessions.contains_key(&id) {
                return id;
            }
        }
    }
}

impl Default for PtyManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a random 8-char lowercase alphanumeric session id
fn generate_session_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Open (create + truncate, mode 0644) the per-session log file
fn open_session_log(base_dir: &Path, log_path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::create_dir_all(base_dir)?;
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o644)
        .open(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn manager() -> (PtyManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (PtyManager::with_base_dir(dir.path().to_path_buf()), dir)
    }

    fn sh(script: &str) -> PtyConfig {
        PtyConfig::new(vec!["/bin/sh".into(), "-c".into(), script.into()])
    }

    /// Poll until the session closes, collecting every chunk exactly once
    async fn drain(manager: &PtyManager, id: &str) -> (Vec<Chunk>, Vec<u8>) {
        let mut chunks = Vec::new();
        let mut bytes = Vec::new();
        let mut since = 0u64;
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let (batch, closed) = manager
                .read(id, since, 65536, Duration::from_millis(300))
                .await
                .unwrap();
            for chunk in batch {
                since = chunk.seq;
                bytes.extend_from_slice(&chunk.data);
                chunks.push(chunk);
            }
            if closed {
                // One final poll to catch output appended after close
                let (tail, _) = manager.read(id, since, 0, Duration::ZERO).await.unwrap();
                for chunk in tail {
                    since = chunk.seq;
                    bytes.extend_from_slice(&chunk.data);
                    chunks.push(chunk);
                }
                return (chunks, bytes);
            }
            assert!(Instant::now() < deadline, "session did not close in time");
        }
    }

    #[test]
    fn test_generate_session_id_shape() {
        for _ in 0..100 {
            let id = generate_session_id();
            assert_eq!(id.len(), 8);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_open_rejects_empty_argv() {
        let (manager, _dir) = manager();
        let err = manager.open(PtyConfig::new(vec![])).unwrap_err();
        assert!(matches!(err, AitermError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_open_propagates_spawn_failure() {
        let (manager, _dir) = manager();
        let err = manager
            .open(PtyConfig::new(vec!["/nonexistent/bin/nope".into()]))
            .unwrap_err();
        assert!(matches!(err, AitermError::Spawn(_)));
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn test_sequence_monotonic_until_close() {
        let (manager, _dir) = manager();
        let id = manager
            .open(sh("for i in 1 2 3; do echo $i; done"))
            .unwrap();

        let (chunks, bytes) = drain(&manager, &id).await;
        assert!(!chunks.is_empty());
        // seq values 1..k with no gaps
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq, i as u64 + 1);
        }
        let text = String::from_utf8_lossy(&bytes);
        let one = text.find('1').unwrap();
        let two = text.find('2').unwrap();
        let three = text.find('3').unwrap();
        assert!(one < two && two < three);

        manager.close(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_echo_round_trip_and_exit_rc() {
        let (manager, _dir) = manager();
        let id = manager.open(PtyConfig::new(vec!["/bin/cat".into()])).unwrap();

        manager
            .send(&id, b"hi_from_test\n".to_vec())
            .await
            .unwrap();

        // The PTY echoes input, so cat's output contains the line twice
        let mut seen = Vec::new();
        let mut since = 0u64;
        let deadline = Instant::now() + Duration::from_secs(5);
        while !String::from_utf8_lossy(&seen).contains("hi_from_test") {
            assert!(Instant::now() < deadline, "echo never arrived");
            let (batch, _closed) = manager
                .read(&id, since, 65536, Duration::from_millis(300))
                .await
                .unwrap();
            for chunk in batch {
                since = chunk.seq;
                seen.extend_from_slice(&chunk.data);
            }
        }

        manager.close(&id).await.unwrap();
        assert!(matches!(
            manager.send(&id, b"x".to_vec()).await,
            Err(AitermError::SessionNotFound(_))
        ));
    }

    /// The reader's EOF can mark the session closed before the reaper has
    /// recorded the exit code, so give the reaper a moment.
    async fn wait_exit_rc(manager: &PtyManager, id: &str) -> Option<i32> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(rc) = manager.exit_rc(id).unwrap() {
                return Some(rc);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_shell_exit_code_zero() {
        let (manager, _dir) = manager();
        let id = manager.open(sh("exit 0")).unwrap();
        drain(&manager, &id).await;
        assert_eq!(wait_exit_rc(&manager, &id).await, Some(0));
        manager.close(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_shell_exit_code_nonzero() {
        let (manager, _dir) = manager();
        let id = manager.open(sh("exit 3")).unwrap();
        drain(&manager, &id).await;
        assert_eq!(wait_exit_rc(&manager, &id).await, Some(3));
        manager.close(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_timeout_returns_quickly_without_data() {
        let (manager, _dir) = manager();
        let id = manager.open(sh("sleep 1")).unwrap();

        let start = Instant::now();
        let (chunks, closed) = manager
            .read(&id, 0, 0, Duration::from_millis(100))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(chunks.is_empty());
        assert!(!closed);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(500));

        manager.close(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (manager, _dir) = manager();
        let id = manager.open(sh("sleep 30")).unwrap();

        manager.close(&id).await.unwrap();
        manager.close(&id).await.unwrap();
        assert_eq!(manager.count(), 0);

        // Unknown id is also fine
        manager.close("zzzzzzzz").await.unwrap();

        assert!(matches!(
            manager.read(&id, 0, 0, Duration::ZERO).await,
            Err(AitermError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.resize(&id, 50, 200),
            Err(AitermError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resize_under_load() {
        let (manager, _dir) = manager();
        let id = manager
            .open(sh("while true; do echo y; done"))
            .unwrap();

        // Let the reader produce some chunks first
        let (first, _) = manager
            .read(&id, 0, 4096, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!first.is_empty());

        manager.resize(&id, 50, 200).unwrap();

        let since = first.last().unwrap().seq;
        let (more, _) = manager
            .read(&id, since, 4096, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!more.is_empty());
        assert!(more[0].seq > since);

        manager.close(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_eviction_leaves_visible_gap() {
        let (manager, _dir) = manager();
        // Doubles a variable 21 times: 2 MiB of output through the PTY
        let id = manager
            .open(sh(
                "s=x; i=0; while [ $i -lt 21 ]; do s=$s$s; i=$((i+1)); done; printf %s \"$s\"",
            ))
            .unwrap();

        // Wait for exit without consuming the buffer
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            let (_, closed) = manager
                .read(&id, u64::MAX, 0, Duration::from_millis(300))
                .await
                .unwrap();
            if closed {
                break;
            }
            assert!(Instant::now() < deadline, "generator did not finish");
        }

        let (chunks, closed) = manager.read(&id, 0, 0, Duration::ZERO).await.unwrap();
        assert!(closed);
        assert!(!chunks.is_empty());
        // Head eviction happened: the oldest surviving seq is past 1
        assert!(chunks[0].seq > 1);
        let total: usize = chunks.iter().map(|c| c.data.len()).sum();
        assert!(total <= crate::pty::MAX_BUFFERED_BYTES + 4096);

        manager.close(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_log_mirrors_output() {
        let (manager, dir) = manager();
        let id = manager.open(sh("echo log_me")).unwrap();

        let log_path = manager.log_path(&id).unwrap();
        assert_eq!(log_path, dir.path().join(format!("{id}.log")));

        drain(&manager, &id).await;
        manager.close(&id).await.unwrap();

        let logged = std::fs::read_to_string(&log_path).unwrap();
        assert!(logged.contains("log_me"));

        // Unknown sessions have no log path
        assert!(manager.log_path("zzzzzzzz").is_none());
    }

    #[tokio::test]
    async fn test_env_replaces_child_environment() {
        let (manager, _dir) = manager();
        // No env passed: the child sees an empty environment
        let id = manager.open(sh("echo PATH=[$PATH]")).unwrap();
        let (_, bytes) = drain(&manager, &id).await;
        assert!(String::from_utf8_lossy(&bytes).contains("PATH=[]"));
        manager.close(&id).await.unwrap();

        let id = manager
            .open(sh("echo GOT=$AITERM_TEST_VAL").with_env("AITERM_TEST_VAL", "42"))
            .unwrap();
        let (_, bytes) = drain(&manager, &id).await;
        assert!(String::from_utf8_lossy(&bytes).contains("GOT=42"));
        manager.close(&id).await.unwrap();
    }
}
