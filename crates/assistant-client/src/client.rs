//! HTTP client for the inference backend.
//!
//! One request per call, no retries, no streaming. Non-success responses are
//! turned into [`ClientError::Status`] with the backend's `detail` preserved.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use assistant_core::config::BackendConfig;
use assistant_core::{SessionId, Settings};

use crate::error::{extract_detail, ClientError, Operation};
use crate::upload::UploadFile;
use crate::wire::{
    ChatRequest, ChatResponse, HealthResponse, SearchRequest, SearchResponse,
    SessionListResponse, SessionResponse, UploadResponse,
};

/// Operations the conversation needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Upload PDFs into the backend state scoped by `session`.
    async fn upload_documents(
        &self,
        files: &[UploadFile],
        session: &SessionId,
    ) -> Result<UploadResponse, ClientError>;

    /// Ask a question grounded in the session's uploaded documents.
    async fn query_documents(
        &self,
        query: &str,
        session: &SessionId,
        settings: &Settings,
    ) -> Result<ChatResponse, ClientError>;

    /// Run a web, academic and encyclopedia search.
    async fn query_web(
        &self,
        query: &str,
        session: &SessionId,
        settings: &Settings,
    ) -> Result<SearchResponse, ClientError>;

    async fn check_health(&self) -> Result<HealthResponse, ClientError>;

    async fn list_sessions(&self) -> Result<SessionListResponse, ClientError>;

    /// Drop the session's documents and history on the backend.
    async fn clear_session(&self, session: &SessionId) -> Result<SessionResponse, ClientError>;
}

/// reqwest-backed [`Backend`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` with transport defaults.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, None)
    }

    /// Create a client from the `[backend]` config section.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ClientError> {
        Self::with_timeout(
            &config.base_url,
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ClientError::Build)?;
        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a successful JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;

        if !status.is_success() {
            let detail = extract_detail(&body);
            warn!(
                operation = %operation,
                status = status.as_u16(),
                detail = detail.as_deref().unwrap_or(""),
                "Backend returned an error"
            );
            return Err(ClientError::Status {
                operation,
                status: status.as_u16(),
                detail,
            });
        }

        debug!(operation = %operation, status = status.as_u16(), bytes = body.len(), "Backend response");
        serde_json::from_str(&body).map_err(|source| ClientError::Decode { operation, source })
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn upload_documents(
        &self,
        files: &[UploadFile],
        session: &SessionId,
    ) -> Result<UploadResponse, ClientError> {
        let operation = Operation::Upload;
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str("application/pdf")
                .map_err(|source| ClientError::Transport { operation, source })?;
            form = form.part("files", part);
        }
        form = form.text("session_id", session.to_string());

        debug!(files = files.len(), session = %session, "Uploading documents");
        let request = self.http.post(self.url("/pdf/upload")).multipart(form);
        self.send(operation, request).await
    }

    async fn query_documents(
        &self,
        query: &str,
        session: &SessionId,
        settings: &Settings,
    ) -> Result<ChatResponse, ClientError> {
        let body = ChatRequest::new(query, session, settings);
        debug!(session = %session, search_k = settings.search_k, "Sending document chat query");
        let request = self.http.post(self.url("/pdf/chat")).json(&body);
        self.send(Operation::Chat, request).await
    }

    async fn query_web(
        &self,
        query: &str,
        session: &SessionId,
        settings: &Settings,
    ) -> Result<SearchResponse, ClientError> {
        let body = SearchRequest::new(query, session, settings);
        debug!(session = %session, "Sending web search query");
        let request = self.http.post(self.url("/search")).json(&body);
        self.send(Operation::Search, request).await
    }

    async fn check_health(&self) -> Result<HealthResponse, ClientError> {
        let request = self.http.get(self.url("/health"));
        self.send(Operation::Health, request).await
    }

    async fn list_sessions(&self) -> Result<SessionListResponse, ClientError> {
        let request = self.http.get(self.url("/sessions"));
        self.send(Operation::ListSessions, request).await
    }

    async fn clear_session(&self, session: &SessionId) -> Result<SessionResponse, ClientError> {
        let request = self
            .http
            .delete(self.url(&format!("/session/{}", session.as_str())));
        self.send(Operation::ClearSession, request).await
    }
}
