//! One PTY session: child process, sequenced output buffer, waiters
//!
//! Each session runs two background tasks. The reader drains the PTY
//! master into the chunk buffer and mirrors the bytes to the session log;
//! the reaper waits for the child and records its exit code. Both close
//! the session and wake any long-polling readers.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::buffer::{Chunk, ChunkBuffer};
use super::handle::PtyHandle;
use aiterm_utils::Result;

/// Size of each PTY read
const READ_BUFFER_SIZE: usize = 4096;

/// How long close waits for the child to exit before force-killing
const CLOSE_GRACE: Duration = Duration::from_millis(300);

/// Wall-clock milliseconds since the epoch
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Mutable session state guarded by one mutex
struct SessionState {
    buffer: ChunkBuffer,
    /// Set once the child has exited or the PTY reached end-of-file;
    /// never reverts
    closed: bool,
    /// Exit code recorded by the reaper, written at most once
    exit_rc: Option<i32>,
}

/// State for one running PTY child
pub struct PtySession {
    id: String,
    handle: PtyHandle,
    state: Mutex<SessionState>,
    /// Wakes long-polling readers on new data or close
    notify: Notify,
    /// Per-session output log, append-only, best effort
    log_file: Mutex<Option<File>>,
    log_path: PathBuf,
}

impl PtySession {
    pub(crate) fn new(
        id: String,
        handle: PtyHandle,
        log_file: Option<File>,
        log_path: PathBuf,
    ) -> Self {
        Self {
            id,
            handle,
            state: Mutex::new(SessionState {
                buffer: ChunkBuffer::new(),
                closed: false,
                exit_rc: None,
            }),
            notify: Notify::new(),
            log_file: Mutex::new(log_file),
            log_path,
        }
    }

    /// Start the reader and reaper tasks for this session
    pub(crate) fn start(
        session: &Arc<PtySession>,
        reader: Box<dyn Read + Send>,
        child: Box<dyn portable_pty::Child + Send + Sync>,
    ) {
        let s = Arc::clone(session);
        tokio::task::spawn_blocking(move || s.run_reader(reader));

        let s = Arc::clone(session);
        tokio::spawn(async move { s.run_reaper(child).await });
    }

    /// On-disk log path for this session
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Whether the session has closed (child exited or PTY at EOF)
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Exit code, once the reaper has recorded it
    pub fn exit_rc(&self) -> Option<i32> {
        self.state.lock().exit_rc
    }

    /// Write raw bytes to the PTY master (child input)
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.handle.write(data)
    }

    /// Set the PTY window size
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        self.handle.resize(rows, cols)
    }

    /// Long-poll read: chunks with `seq > since_seq` plus the closed flag.
    ///
    /// Returns immediately when matching chunks exist or the session is
    /// closed; otherwise waits for a reader/reaper signal bounded by
    /// `timeout` (zero means return at once), then re-snapshots. An empty
    /// result with `closed == false` is a benign timed-out poll.
    pub async fn read(
        &self,
        since_seq: u64,
        max_bytes: usize,
        timeout: Duration,
    ) -> (Vec<Chunk>, bool) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register as a waiter before snapshotting so an append
            // between snapshot and wait cannot be missed.
            notified.as_mut().enable();

            let (chunks, closed) = self.snapshot(since_seq, max_bytes);
            if !chunks.is_empty() || closed {
                return (chunks, closed);
            }
            if tokio::time::Instant::now() >= deadline {
                return (chunks, closed);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.snapshot(since_seq, max_bytes);
            }
        }
    }

    fn snapshot(&self, since_seq: u64, max_bytes: usize) -> (Vec<Chunk>, bool) {
        let state = self.state.lock();
        (state.buffer.collect_since(since_seq, max_bytes), state.closed)
    }

    /// Terminate the session: interrupt the child, wait briefly for the
    /// reaper, force-kill if still running, then release the PTY and log.
    pub(crate) async fn close(&self) {
        self.handle.signal(libc::SIGINT);
        if !self.wait_closed(CLOSE_GRACE).await {
            debug!(session_id = %self.id, "grace expired, killing child");
            self.handle.signal(libc::SIGKILL);
        }
        self.handle.close();
        self.log_file.lock().take();
    }

    /// Wait until the session closes, bounded by `timeout`
    async fn wait_closed(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state.lock().closed {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.state.lock().closed;
            }
        }
    }

    /// Append one chunk of PTY output and wake waiters
    fn append_output(&self, data: Bytes) {
        {
            let mut state = self.state.lock();
            state.buffer.append(data, now_ms());
        }
        self.notify.notify_waiters();
    }

    /// Mark the session closed (idempotent) and wake waiters
    fn mark_closed(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    /// Reader task body: drain the PTY master until EOF or error.
    ///
    /// Runs on a blocking thread. The log write happens outside the state
    /// lock so disk stalls never block consumers, and its errors are
    /// swallowed.
    fn run_reader(self: Arc<Self>, mut reader: Box<dyn Read + Send>) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    self.append_output(data.clone());

                    let mut log = self.log_file.lock();
                    if let Some(file) = log.as_mut() {
                        let _ = file.write_all(&data);
                    }
                }
                Err(e) => {
                    // EIO is the normal Linux way of reporting a hung-up
                    // PTY; anything else still ends the stream.
                    debug!(session_id = %self.id, error = %e, "PTY read ended");
                    break;
                }
            }
        }
        self.mark_closed();
        debug!(session_id = %self.id, "reader exited");
    }

    /// Reaper task body: wait for the child, record its exit code.
    ///
    /// The reader and reaper race to close the session; both paths are
    /// idempotent.
    async fn run_reaper(self: Arc<Self>, mut child: Box<dyn portable_pty::Child + Send + Sync>) {
        let rc = match tokio::task::spawn_blocking(move || child.wait()).await {
            Ok(Ok(status)) => i32::try_from(status.exit_code()).unwrap_or(-1),
            Ok(Err(e)) => {
                warn!(session_id = %self.id, error = %e, "child wait failed");
                -1
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "reaper task failed");
                -1
            }
        };

        {
            let mut state = self.state.lock();
            if state.exit_rc.is_none() {
                state.exit_rc = Some(rc);
            }
            state.closed = true;
        }
        self.notify.notify_waiters();
        debug!(session_id = %self.id, rc, "child exited");
    }
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("id", &self.id)
            .field("log_path", &self.log_path)
            .finish_non_exhaustive()
    }
}
