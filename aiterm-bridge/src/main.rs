//! aiterm-bridge - terminal-side proxy for one PTY session
//!
//! Runs inside a tmux pane created by the daemon's bridge endpoint:
//! follows the session's output to stdout while forwarding stdin to the
//! session as input. Exits when the session closes or on interrupt.

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::debug;

use aiterm_protocol::{PtyReadRequest, PtyReadResponse, PtySendRequest};
use aiterm_utils::{init_logging_with_config, LogConfig};

/// Pause before retrying after a transport hiccup
const RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "aiterm-bridge", version, about)]
struct Args {
    /// aitermd server URL
    #[arg(long, env = "AITERM_SERVER", default_value = "http://127.0.0.1:8099")]
    server: String,

    /// Session id to bridge
    #[arg(long)]
    id: String,

    /// Read poll timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    let _ = init_logging_with_config(LogConfig::client());
    let args = Args::parse();
    let base = args.server.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    // Forward stdin (keystrokes from the attached terminal) to the session
    let send_client = client.clone();
    let send_base = base.clone();
    let send_id = args.id.clone();
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 4096];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) => tokio::time::sleep(Duration::from_millis(50)).await,
                Ok(n) => {
                    let req = PtySendRequest {
                        id: send_id.clone(),
                        data: buf[..n].to_vec(),
                    };
                    let _ = send_client
                        .post(format!("{send_base}/v1/pty/send"))
                        .json(&req)
                        .send()
                        .await;
                }
                Err(e) => {
                    debug!(error = %e, "stdin closed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = follow(&client, &base, &args.id, args.timeout_ms) => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

/// Poll the session's output to stdout until it closes or disappears
async fn follow(client: &reqwest::Client, base: &str, id: &str, timeout_ms: u64) {
    let mut since = 0u64;
    let mut stdout = std::io::stdout();
    loop {
        let req = PtyReadRequest {
            id: id.to_string(),
            since_seq: since,
            max_bytes: 1 << 16,
            timeout_ms,
        };
        let response = match client
            .post(format!("{base}/v1/pty/read"))
            .json(&req)
            .send()
            .await
        {
            Ok(response) => response,
            Err(_) => {
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };
        if !response.status().is_success() {
            // Session gone (closed and deregistered)
            return;
        }
        let body: PtyReadResponse = match response.json().await {
            Ok(body) => body,
            Err(_) => {
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };
        for chunk in body.chunks {
            let _ = stdout.write_all(&chunk.data);
            since = chunk.seq;
        }
        let _ = stdout.flush();
        if body.closed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["aiterm-bridge", "--id", "ab12cd34"]);
        assert_eq!(args.server, "http://127.0.0.1:8099");
        assert_eq!(args.id, "ab12cd34");
        assert_eq!(args.timeout_ms, 500);
    }

    #[test]
    fn test_id_is_required() {
        assert!(Args::try_parse_from(["aiterm-bridge"]).is_err());
    }
}
