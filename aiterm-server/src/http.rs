//! HTTP front for the daemon
//!
//! A lightweight hyper server routing the /v1/* endpoints onto the PTY
//! manager, the one-shot run path, the filesystem helpers and the tmux
//! bridge. JSON in, JSON out; byte payloads are base64 on the wire.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::pty::{PtyConfig, PtyManager};
use crate::{bridge, fsops, run};
use aiterm_protocol as proto;
use aiterm_utils::AitermError;

/// Upper bound on a single read long-poll (1 hour); also keeps absurd
/// client timeouts from overflowing the deadline arithmetic
const MAX_READ_TIMEOUT_MS: u64 = 3_600_000;

/// Shared daemon state handed to every request handler
pub struct AppState {
    pub pty: PtyManager,
    /// Base URL clients reach this daemon at; handed to interactive
    /// bridges so they can call back
    pub server_url: String,
}

/// Run the HTTP accept loop until a shutdown signal arrives
pub async fn run_server(
    addr: String,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let socket_addr: SocketAddr = match addr.parse() {
        Ok(a) => a,
        Err(e) => {
            error!("invalid listen address '{}': {}", addr, e);
            return;
        }
    };

    let listener = match TcpListener::bind(socket_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {}: {}", socket_addr, e);
            return;
        }
    };

    info!("aitermd listening on http://{}", socket_addr);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, remote_addr) = match accept_result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("accept error: {}", e);
                        continue;
                    }
                };

                let io = TokioIo::new(stream);
                let state = Arc::clone(&state);

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(req, state).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        // Disconnecting clients are routine
                        if !e.is_incomplete_message() {
                            warn!("connection error from {}: {}", remote_addr, e);
                        }
                    }
                });
            }

            _ = shutdown_rx.recv() => {
                info!("HTTP listener shutting down");
                break;
            }
        }
    }
}

/// Route one request
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") => text_response(StatusCode::OK, "OK"),
        (&Method::POST, "/v1/shell/run") => dispatch(req, |r| handle_shell_run(r, state)).await,
        (&Method::POST, "/v1/pty/open") => dispatch(req, |r| handle_pty_open(r, state)).await,
        (&Method::POST, "/v1/pty/send") => dispatch(req, |r| handle_pty_send(r, state)).await,
        (&Method::POST, "/v1/pty/read") => dispatch(req, |r| handle_pty_read(r, state)).await,
        (&Method::POST, "/v1/pty/resize") => dispatch(req, |r| handle_pty_resize(r, state)).await,
        (&Method::POST, "/v1/pty/close") => dispatch(req, |r| handle_pty_close(r, state)).await,
        (&Method::POST, "/v1/fs/read") => dispatch(req, |r| handle_fs_read(r)).await,
        (&Method::POST, "/v1/fs/write") => dispatch(req, |r| handle_fs_write(r)).await,
        (&Method::POST, "/v1/fs/list") => dispatch(req, |r| handle_fs_list(r)).await,
        (&Method::POST, "/v1/bridge/tmux/create") => {
            dispatch(req, |r| handle_bridge_create(r, state)).await
        }
        (&Method::POST, "/v1/bridge/tmux/destroy") => {
            dispatch(req, |r| handle_bridge_destroy(r)).await
        }
        (&Method::GET | &Method::POST, "/v1/bridge/tmux/list") => match bridge::list().await {
            Ok(resp) => json_response(StatusCode::OK, &resp),
            Err(e) => error_response(&e),
        },
        _ => not_found(),
    };

    Ok(response)
}

/// Parse the JSON body, run the handler, render errors uniformly
async fn dispatch<B, T, F, Fut>(req: Request<B>, handler: F) -> Response<Full<Bytes>>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
    T: DeserializeOwned,
    F: FnOnce(T) -> Fut,
    Fut: std::future::Future<Output = aiterm_utils::Result<Response<Full<Bytes>>>>,
{
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return error_response(&AitermError::invalid_argument(format!(
                "failed to read body: {}",
                e
            )))
        }
    };
    let parsed: T = match serde_json::from_slice(&bytes) {
        Ok(parsed) => parsed,
        Err(e) => {
            return error_response(&AitermError::invalid_argument(format!(
                "invalid request body: {}",
                e
            )))
        }
    };
    match handler(parsed).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

// === Endpoint handlers ===

async fn handle_shell_run(
    req: proto::ShellRunRequest,
    _state: Arc<AppState>,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let outcome = run::shell_run(run::RunRequest {
        argv: req.argv,
        cwd: req.cwd.map(PathBuf::from),
        env: req.env,
        timeout: req.timeout_ms.map(Duration::from_millis),
        stdin: req.stdin,
    })
    .await?;

    Ok(json_response(
        StatusCode::OK,
        &proto::ShellRunResponse {
            rc: outcome.rc,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            duration_ms: outcome.duration.as_millis() as i64,
            cwd: outcome.cwd,
            error: outcome.error,
        },
    ))
}

async fn handle_pty_open(
    req: proto::PtyOpenRequest,
    state: Arc<AppState>,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let mut config = PtyConfig::new(req.argv)
        .with_size(req.rows, req.cols)
        .with_env_map(&req.env);
    if !req.cwd.is_empty() {
        config = config.with_cwd(&req.cwd);
    }
    let id = state.pty.open(config)?;
    Ok(json_response(StatusCode::OK, &proto::PtyOpenResponse { id }))
}

async fn handle_pty_send(
    req: proto::PtySendRequest,
    state: Arc<AppState>,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let bytes_written = state.pty.send(&req.id, req.data).await?;
    Ok(json_response(
        StatusCode::OK,
        &proto::PtySendResponse { bytes_written },
    ))
}

async fn handle_pty_read(
    req: proto::PtyReadRequest,
    state: Arc<AppState>,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let (chunks, closed) = state
        .pty
        .read(
            &req.id,
            req.since_seq,
            req.max_bytes,
            Duration::from_millis(req.timeout_ms.min(MAX_READ_TIMEOUT_MS)),
        )
        .await?;

    let chunks = chunks
        .into_iter()
        .map(|c| proto::WireChunk {
            seq: c.seq,
            data: c.data.to_vec(),
            ts_ms: c.ts_ms,
            stream: proto::STDOUT_STREAM.to_string(),
        })
        .collect();

    Ok(json_response(
        StatusCode::OK,
        &proto::PtyReadResponse { chunks, closed },
    ))
}

async fn handle_pty_resize(
    req: proto::PtyResizeRequest,
    state: Arc<AppState>,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    state.pty.resize(&req.id, req.rows, req.cols)?;
    Ok(json_response(StatusCode::OK, &proto::StatusResponse::ok()))
}

async fn handle_pty_close(
    req: proto::PtyCloseRequest,
    state: Arc<AppState>,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    state.pty.close(&req.id).await?;
    Ok(json_response(
        StatusCode::OK,
        &proto::StatusResponse::closed(),
    ))
}

async fn handle_fs_read(req: proto::FsReadRequest) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let resp = fsops::read_file(&req.path, req.max_bytes)?;
    Ok(json_response(StatusCode::OK, &resp))
}

async fn handle_fs_write(
    req: proto::FsWriteRequest,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let resp = fsops::write_file(&req.path, &req.data, req.mode.as_deref())?;
    Ok(json_response(StatusCode::OK, &resp))
}

async fn handle_fs_list(req: proto::FsListRequest) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let resp = fsops::list_dir(&req.path)?;
    Ok(json_response(StatusCode::OK, &resp))
}

async fn handle_bridge_create(
    req: proto::BridgeCreateRequest,
    state: Arc<AppState>,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    let resp = bridge::create(&state.pty, &req.id, &state.server_url).await?;
    Ok(json_response(StatusCode::OK, &resp))
}

async fn handle_bridge_destroy(
    req: proto::BridgeDestroyRequest,
) -> aiterm_utils::Result<Response<Full<Bytes>>> {
    bridge::destroy(&req.socket, &req.session).await?;
    Ok(json_response(
        StatusCode::OK,
        &proto::StatusResponse::removed(),
    ))
}

// === Response helpers ===

/// Status code for an error, per the error taxonomy: caller mistakes are
/// 4xx, daemon-side failures are 5xx
fn status_for(err: &AitermError) -> StatusCode {
    match err {
        AitermError::InvalidArgument(_) | AitermError::Config(_) => StatusCode::BAD_REQUEST,
        AitermError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        // Bad paths and missing sessions behind bridge/fs requests
        AitermError::Bridge(_)
        | AitermError::FileRead { .. }
        | AitermError::FileWrite { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn error_response(err: &AitermError) -> Response<Full<Bytes>> {
    json_response(
        status_for(err),
        &proto::ErrorResponse {
            error: err.to_string(),
        },
    )
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn not_found() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &proto::ErrorResponse {
            error: "not found".into(),
        },
    )
}
