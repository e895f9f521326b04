//! aiterm-protocol: Shared wire definitions for the aiterm HTTP API
//!
//! This crate defines the request and response bodies exchanged between
//! the daemon (`aitermd`) and its HTTP clients (`aiterm`, `aiterm-bridge`).
//! Binary payloads cross the wire as base64 strings; the [`encoding`]
//! module provides the serde adapters.

pub mod encoding;
pub mod messages;

// Re-export main types at crate root
pub use messages::{
    BridgeCreateRequest, BridgeCreateResponse, BridgeDestroyRequest, BridgeEntry,
    BridgeListResponse, ErrorResponse, FsEntry, FsListRequest, FsListResponse, FsReadRequest,
    FsReadResponse, FsWriteRequest, FsWriteResponse, PtyCloseRequest, PtyOpenRequest,
    PtyOpenResponse, PtyReadRequest, PtyReadResponse, PtyResizeRequest, PtySendRequest,
    PtySendResponse, ShellRunRequest, ShellRunResponse, StatusResponse, WireChunk,
};

/// Stream tag carried by every PTY chunk (the PTY merges stderr into stdout)
pub const STDOUT_STREAM: &str = "stdout";
