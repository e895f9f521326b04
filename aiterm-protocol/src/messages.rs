//! Request and response bodies for the aiterm HTTP API
//!
//! Field names and omission rules match the daemon's JSON envelope: byte
//! payloads are base64 strings, optional fields are omitted when absent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::encoding::{base64_bytes, base64_opt};

// === Error envelope ===

/// Error body returned with any non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Generic acknowledgement body (`resize`, `close`, bridge destroy)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }

    pub fn closed() -> Self {
        Self { status: "closed".into() }
    }

    pub fn removed() -> Self {
        Self { status: "removed".into() }
    }
}

// === One-shot run ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellRunRequest {
    pub argv: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Exact child environment; `None` means empty (the child inherits
    /// nothing from the daemon)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(
        default,
        rename = "stdin",
        with = "base64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub stdin: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellRunResponse {
    pub rc: i32,
    #[serde(with = "base64_bytes")]
    pub stdout: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub stderr: Vec<u8>,
    pub duration_ms: i64,
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// === PTY sessions ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtyOpenRequest {
    pub argv: Vec<String>,
    /// Terminal rows; zero or negative selects the daemon default
    #[serde(default)]
    pub rows: i32,
    /// Terminal columns; zero or negative selects the daemon default
    #[serde(default)]
    pub cols: i32,
    #[serde(default)]
    pub cwd: String,
    /// Exact child environment (empty map means an empty environment)
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtyOpenResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtySendRequest {
    pub id: String,
    #[serde(rename = "data", with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtySendResponse {
    pub bytes_written: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtyReadRequest {
    pub id: String,
    #[serde(default)]
    pub since_seq: u64,
    /// Soft cap on returned bytes; 0 disables the cap
    #[serde(default)]
    pub max_bytes: usize,
    /// Long-poll timeout; 0 returns immediately
    #[serde(default)]
    pub timeout_ms: u64,
}

/// One atomic PTY output record on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChunk {
    pub seq: u64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub ts_ms: i64,
    pub stream: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtyReadResponse {
    pub chunks: Vec<WireChunk>,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtyResizeRequest {
    pub id: String,
    pub rows: u16,
    pub cols: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtyCloseRequest {
    pub id: String,
}

// === Filesystem ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsReadRequest {
    pub path: String,
    #[serde(default)]
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsReadResponse {
    #[serde(rename = "data", with = "base64_bytes")]
    pub data: Vec<u8>,
    pub size: u64,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsWriteRequest {
    pub path: String,
    #[serde(rename = "data", with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Octal permission string, e.g. "0644"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsWriteResponse {
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsListRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mode: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsListResponse {
    pub entries: Vec<FsEntry>,
}

// === tmux bridge ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeCreateRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeCreateResponse {
    pub socket: String,
    pub session: String,
    pub attach_hint: String,
    pub log_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeDestroyRequest {
    pub socket: String,
    pub session: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEntry {
    pub id: String,
    pub socket: String,
    pub session: String,
    pub attach_hint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_path: String,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeListResponse {
    pub bridges: Vec<BridgeEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_defaults() {
        let req: PtyReadRequest = serde_json::from_str(r#"{"id":"ab12cd34"}"#).unwrap();
        assert_eq!(req.id, "ab12cd34");
        assert_eq!(req.since_seq, 0);
        assert_eq!(req.max_bytes, 0);
        assert_eq!(req.timeout_ms, 0);
    }

    #[test]
    fn test_open_request_defaults_to_empty_env() {
        let req: PtyOpenRequest = serde_json::from_str(r#"{"argv":["/bin/sh"]}"#).unwrap();
        assert!(req.env.is_empty());
        assert_eq!(req.rows, 0);
        assert_eq!(req.cols, 0);
        assert!(req.cwd.is_empty());
    }

    #[test]
    fn test_chunk_data_is_base64_on_the_wire() {
        let chunk = WireChunk {
            seq: 7,
            data: b"hi\n".to_vec(),
            ts_ms: 1_700_000_000_000,
            stream: crate::STDOUT_STREAM.into(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["data"], "aGkK");
        assert_eq!(json["stream"], "stdout");

        let back: WireChunk = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, b"hi\n");
        assert_eq!(back.seq, 7);
    }

    #[test]
    fn test_send_request_rejects_bad_base64() {
        let err = serde_json::from_str::<PtySendRequest>(r#"{"id":"x","data":"%%%"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_run_request_optional_stdin() {
        let req: ShellRunRequest =
            serde_json::from_str(r#"{"argv":["/bin/echo","hi"]}"#).unwrap();
        assert!(req.stdin.is_none());
        assert!(req.env.is_none());

        let req: ShellRunRequest =
            serde_json::from_str(r#"{"argv":["/bin/cat"],"stdin":"aGkK"}"#).unwrap();
        assert_eq!(req.stdin.unwrap(), b"hi\n");
    }

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_string(&ErrorResponse {
            error: "no such session: zz".into(),
        })
        .unwrap();
        assert_eq!(body, r#"{"error":"no such session: zz"}"#);
    }
}
