//! aiterm-utils: Common utilities shared across aiterm crates
//!
//! This crate provides:
//! - Unified error types ([`AitermError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - Path conventions for session logs and bridge sockets ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{AitermError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};

// Re-export commonly used path functions
pub use paths::{
    bridge_session_name, bridge_socket_path, daemon_log_file, ensure_dir, runtime_dir,
    session_log_dir, session_log_path,
};
