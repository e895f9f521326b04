//! aiterm - command-line client for the aitermd PTY daemon

use std::collections::HashMap;
use std::io::{Read, Write};

use clap::Parser;

use aiterm_protocol as proto;
use aiterm_protocol::encoding;
use aiterm_utils::{init_logging_with_config, AitermError, LogConfig, Result};

mod cli;
mod client;

use cli::{parse_env, Cli, Command};
use client::ApiClient;

#[tokio::main]
async fn main() {
    let _ = init_logging_with_config(LogConfig::client());
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            server,
            cwd,
            timeout_ms,
            env,
            stdin_base64,
            argv,
        } => {
            let stdin = match stdin_base64 {
                Some(b64) => Some(
                    encoding::decode(&b64)
                        .map_err(|_| AitermError::invalid_argument("invalid stdin base64"))?,
                ),
                None => None,
            };
            let env = env.as_deref().map(parse_env).transpose()?;
            let response = ApiClient::new(&server.server)
                .shell_run(&proto::ShellRunRequest {
                    argv,
                    cwd,
                    env,
                    timeout_ms,
                    stdin,
                })
                .await?;
            print_json(&response)
        }

        Command::PtyOpen {
            server,
            rows,
            cols,
            cwd,
            env,
            argv,
        } => {
            let env = match env.as_deref() {
                Some(spec) => parse_env(spec)?,
                // Sensible defaults for shells on the empty-env daemon
                None => HashMap::from([
                    ("TERM".to_string(), "dumb".to_string()),
                    ("PS1".to_string(), String::new()),
                ]),
            };
            let response = ApiClient::new(&server.server)
                .pty_open(&proto::PtyOpenRequest {
                    argv,
                    rows,
                    cols,
                    cwd: cwd.unwrap_or_default(),
                    env,
                })
                .await?;
            print_json(&response)
        }

        Command::PtySend {
            server,
            id,
            data,
            stdin,
        } => {
            let data = if stdin {
                let mut buf = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .map_err(AitermError::Io)?;
                buf
            } else {
                data.unwrap_or_default().into_bytes()
            };
            let response = ApiClient::new(&server.server)
                .pty_send(&proto::PtySendRequest { id, data })
                .await?;
            print_json(&response)
        }

        Command::PtyRead {
            server,
            id,
            since,
            max_bytes,
            timeout_ms,
        } => {
            let response = ApiClient::new(&server.server)
                .pty_read(&proto::PtyReadRequest {
                    id,
                    since_seq: since,
                    max_bytes,
                    timeout_ms,
                })
                .await?;
            print_json(&response)
        }

        Command::PtyFollow {
            server,
            id,
            timeout_ms,
        } => follow(&ApiClient::new(&server.server), &id, timeout_ms).await,

        Command::PtyResize {
            server,
            id,
            rows,
            cols,
        } => {
            let response = ApiClient::new(&server.server)
                .pty_resize(&proto::PtyResizeRequest { id, rows, cols })
                .await?;
            print_json(&response)
        }

        Command::PtyClose { server, id } => {
            let response = ApiClient::new(&server.server)
                .pty_close(&proto::PtyCloseRequest { id })
                .await?;
            print_json(&response)
        }

        Command::BridgeList { server, json } => {
            let response = ApiClient::new(&server.server).bridge_list().await?;
            if json {
                print_json(&response)
            } else {
                for bridge in response.bridges {
                    println!(
                        "{}\talive={}\t{}",
                        bridge.id, bridge.alive, bridge.attach_hint
                    );
                }
                Ok(())
            }
        }
    }
}

/// Poll the session's output and stream it raw to stdout until closed
async fn follow(client: &ApiClient, id: &str, timeout_ms: u64) -> Result<()> {
    let mut since = 0u64;
    let mut stdout = std::io::stdout();
    loop {
        let response = client
            .pty_read(&proto::PtyReadRequest {
                id: id.to_string(),
                since_seq: since,
                max_bytes: 1 << 16,
                timeout_ms,
            })
            .await?;
        for chunk in response.chunks {
            stdout.write_all(&chunk.data).map_err(AitermError::Io)?;
            since = chunk.seq;
        }
        stdout.flush().map_err(AitermError::Io)?;
        if response.closed {
            return Ok(());
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string(value)
        .map_err(|e| AitermError::internal(format!("failed to encode response: {}", e)))?;
    println!("{}", body);
    Ok(())
}
