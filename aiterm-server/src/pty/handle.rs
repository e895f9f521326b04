//! PTY handle wrapper for portable-pty

use std::io::Write;

use aiterm_utils::{AitermError, Result};
use parking_lot::Mutex;
use portable_pty::{MasterPty, PtySize};

/// Handle to the master side of a running PTY
///
/// Owns the master and its writer; both are released exactly once by
/// [`PtyHandle::close`]. The reader and the child are owned by the
/// session's background tasks, so the handle only keeps the child's pid
/// for signalling.
pub struct PtyHandle {
    /// The master side of the PTY (resize)
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    /// Writer for PTY input
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    /// Child process id, if the OS reported one
    child_pid: Option<u32>,
}

impl PtyHandle {
    /// Create a new PTY handle from portable-pty components
    pub(crate) fn new(
        master: Box<dyn MasterPty + Send>,
        writer: Box<dyn Write + Send>,
        child_pid: Option<u32>,
    ) -> Self {
        Self {
            master: Mutex::new(Some(master)),
            writer: Mutex::new(Some(writer)),
            child_pid,
        }
    }

    /// Write data to the PTY (sends to the child process)
    ///
    /// Partial writes are returned as-is; callers that need full delivery
    /// must loop.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut writer = self.writer.lock();
        let writer = writer
            .as_mut()
            .ok_or_else(|| AitermError::pty("PTY is closed"))?;
        let n = writer
            .write(data)
            .map_err(|e| AitermError::pty(format!("write failed: {}", e)))?;
        writer
            .flush()
            .map_err(|e| AitermError::pty(format!("flush failed: {}", e)))?;
        Ok(n)
    }

    /// Resize the PTY window
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let master = self.master.lock();
        let master = master
            .as_ref()
            .ok_or_else(|| AitermError::pty("PTY is closed"))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| AitermError::pty(format!("resize failed: {}", e)))
    }

    /// Send a signal to the child process (best effort)
    pub fn signal(&self, signal: libc::c_int) {
        if let Some(pid) = self.child_pid {
            // The pid may already be reaped; errors are not actionable.
            unsafe {
                libc::kill(pid as libc::pid_t, signal);
            }
        }
    }

    /// Release the master and writer, closing their file descriptors.
    ///
    /// Subsequent writes and resizes fail with a closed-PTY error.
    pub fn close(&self) {
        self.writer.lock().take();
        self.master.lock().take();
    }

    /// Handle with no PTY behind it, for exercising session logic alone
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            master: Mutex::new(None),
            writer: Mutex::new(Some(Box::new(std::io::sink()))),
            child_pid: None,
        }
    }
}

impl std::fmt::Debug for PtyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyHandle")
            .field("child_pid", &self.child_pid)
            .finish_non_exhaustive()
    }
}
