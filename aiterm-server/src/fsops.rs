//! Filesystem endpoints: thin wrappers over the host OS
//!
//! Bounded reads, full-file writes with an optional mode, and directory
//! listings. Paths are taken as given; there is no sandboxing.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::PathBuf;

use aiterm_protocol::{FsEntry, FsListResponse, FsReadResponse, FsWriteResponse};
use aiterm_utils::{AitermError, Result};

/// Default cap for fs/read when the request does not set one (1 MiB)
const DEFAULT_READ_MAX: usize = 1 << 20;

/// Default mode for fs/write when the request does not set one
const DEFAULT_WRITE_MODE: u32 = 0o644;

/// Read up to `max_bytes` from a file, reporting its full size and
/// whether the returned data is truncated
pub fn read_file(path: &str, max_bytes: usize) -> Result<FsReadResponse> {
    let max = if max_bytes == 0 {
        DEFAULT_READ_MAX
    } else {
        max_bytes
    };
    let file = std::fs::File::open(path).map_err(|e| AitermError::FileRead {
        path: PathBuf::from(path),
        source: e,
    })?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);

    let mut data = Vec::with_capacity(max.min(size as usize + 1));
    file.take(max as u64)
        .read_to_end(&mut data)
        .map_err(|e| AitermError::FileRead {
            path: PathBuf::from(path),
            source: e,
        })?;

    let truncated = size > data.len() as u64;
    Ok(FsReadResponse {
        data,
        size,
        truncated,
    })
}

/// Write a whole file, creating it with the given octal mode (e.g.
/// "0644"); an existing file is truncated and keeps its mode
pub fn write_file(path: &str, data: &[u8], mode: Option<&str>) -> Result<FsWriteResponse> {
    let mode = match mode {
        Some(s) if !s.is_empty() => u32::from_str_radix(s, 8)
            .map_err(|_| AitermError::invalid_argument(format!("invalid mode: {:?}", s)))?,
        _ => DEFAULT_WRITE_MODE,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(|e| AitermError::FileWrite {
            path: PathBuf::from(path),
            source: e,
        })?;
    file.write_all(data).map_err(|e| AitermError::FileWrite {
        path: PathBuf::from(path),
        source: e,
    })?;

    Ok(FsWriteResponse { bytes: data.len() })
}

/// List a directory's entries with type, permissions and size
pub fn list_dir(path: &str) -> Result<FsListResponse> {
    let entries = std::fs::read_dir(path).map_err(|e| AitermError::FileRead {
        path: PathBuf::from(path),
        source: e,
    })?;

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AitermError::FileRead {
            path: PathBuf::from(path),
            source: e,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // symlink_metadata so links report as links, not their targets
        let meta = entry.path().symlink_metadata().ok();
        let kind = match &meta {
            Some(m) if m.file_type().is_symlink() => "link",
            Some(m) if m.is_dir() => "dir",
            Some(m) if m.is_file() => "file",
            _ => "other",
        };
        let (mode, size) = meta
            .map(|m| (perm_string(m.permissions().mode()), m.len()))
            .unwrap_or_default();
        out.push(FsEntry {
            name,
            kind: kind.to_string(),
            mode,
            size,
        });
    }

    Ok(FsListResponse { entries: out })
}

/// Render the permission bits as `rwxr-xr-x`
fn perm_string(mode: u32) -> String {
    let mut s = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perm_string() {
        assert_eq!(perm_string(0o644), "rw-r--r--");
        assert_eq!(perm_string(0o755), "rwxr-xr-x");
        assert_eq!(perm_string(0o600), "rw-------");
        assert_eq!(perm_string(0o000), "---------");
    }

    #[test]
    fn test_read_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let path_str = path.to_str().unwrap();

        let written = write_file(path_str, b"hello fs", None).unwrap();
        assert_eq!(written.bytes, 8);

        let read = read_file(path_str, 0).unwrap();
        assert_eq!(read.data, b"hello fs");
        assert_eq!(read.size, 8);
        assert!(!read.truncated);
    }

    #[test]
    fn test_read_truncates_at_max_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let path_str = path.to_str().unwrap();
        write_file(path_str, &vec![b'x'; 100], None).unwrap();

        let read = read_file(path_str, 10).unwrap();
        assert_eq!(read.data.len(), 10);
        assert_eq!(read.size, 100);
        assert!(read.truncated);
    }

    #[test]
    fn test_write_applies_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        let path_str = path.to_str().unwrap();

        write_file(path_str, b"#!/bin/sh\n", Some("0755")).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_write_rejects_bad_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let err = write_file(path.to_str().unwrap(), b"x", Some("rwx")).unwrap_err();
        assert!(matches!(err, AitermError::InvalidArgument(_)));
    }

    #[test]
    fn test_read_missing_file_errors() {
        let err = read_file("/definitely/not/here", 0).unwrap_err();
        assert!(matches!(err, AitermError::FileRead { .. }));
    }

    #[test]
    fn test_list_dir_reports_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), b"data").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        std::os::unix::fs::symlink("file.txt", dir.path().join("link")).unwrap();

        let listing = list_dir(dir.path().to_str().unwrap()).unwrap();
        let kind_of = |name: &str| {
            listing
                .entries
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.kind.clone())
                .unwrap()
        };
        assert_eq!(kind_of("file.txt"), "file");
        assert_eq!(kind_of("subdir"), "dir");
        assert_eq!(kind_of("link"), "link");

        let file = listing
            .entries
            .iter()
            .find(|e| e.name == "file.txt")
            .unwrap();
        assert_eq!(file.size, 4);
        assert_eq!(file.mode.len(), 9);
    }
}
