//! Thin typed wrapper over the daemon's HTTP API

use serde::de::DeserializeOwned;
use serde::Serialize;

use aiterm_protocol as proto;
use aiterm_utils::{AitermError, Result};

/// HTTP client bound to one aitermd server
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(server_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn shell_run(&self, req: &proto::ShellRunRequest) -> Result<proto::ShellRunResponse> {
        self.post("/v1/shell/run", req).await
    }

    pub async fn pty_open(&self, req: &proto::PtyOpenRequest) -> Result<proto::PtyOpenResponse> {
        self.post("/v1/pty/open", req).await
    }

    pub async fn pty_send(&self, req: &proto::PtySendRequest) -> Result<proto::PtySendResponse> {
        self.post("/v1/pty/send", req).await
    }

    pub async fn pty_read(&self, req: &proto::PtyReadRequest) -> Result<proto::PtyReadResponse> {
        self.post("/v1/pty/read", req).await
    }

    pub async fn pty_resize(&self, req: &proto::PtyResizeRequest) -> Result<proto::StatusResponse> {
        self.post("/v1/pty/resize", req).await
    }

    pub async fn pty_close(&self, req: &proto::PtyCloseRequest) -> Result<proto::StatusResponse> {
        self.post("/v1/pty/close", req).await
    }

    pub async fn bridge_list(&self) -> Result<proto::BridgeListResponse> {
        self.post("/v1/bridge/tmux/list", &serde_json::json!({})).await
    }

    /// POST a JSON body and decode the JSON response, surfacing the
    /// daemon's error envelope on non-2xx statuses
    async fn post<Req, Resp>(&self, path: &str, req: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base, path);
        let response = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(|e| AitermError::http(format!("{}: {}", url, e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AitermError::http(format!("{}: {}", url, e)))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<proto::ErrorResponse>(&bytes)
                .map(|e| e.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(AitermError::Server(message));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| AitermError::http(format!("invalid response from {}: {}", url, e)))
    }
}
