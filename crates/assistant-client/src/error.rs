//! Error types for backend requests.
//!
//! Every failure keeps what the backend or transport reported, while
//! `user_message` yields the short, stable text shown in the chat log.

use std::fmt;
use std::path::PathBuf;

use assistant_core::Diagnostic;

/// Backend operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    Chat,
    Search,
    Health,
    ListSessions,
    ClearSession,
}

impl Operation {
    /// Short machine-friendly name, used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Chat => "chat",
            Operation::Search => "search",
            Operation::Health => "health",
            Operation::ListSessions => "list_sessions",
            Operation::ClearSession => "clear_session",
        }
    }

    /// Fixed user-facing failure text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Operation::Upload => "Failed to upload PDFs",
            Operation::Chat => "Failed to send chat message",
            Operation::Search => "Failed to perform search",
            Operation::Health => "Backend is not healthy",
            Operation::ListSessions => "Failed to list sessions",
            Operation::ClearSession => "Failed to clear session",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from the backend API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status {
        operation: Operation,
        status: u16,
        detail: Option<String>,
    },

    #[error("{operation} response could not be decoded: {source}")]
    Decode {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },

    #[error("not a PDF file: {}", .0.display())]
    InvalidFile(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Operation the error belongs to. Local file errors count as uploads.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ClientError::Build(_) => None,
            ClientError::Transport { operation, .. }
            | ClientError::Status { operation, .. }
            | ClientError::Decode { operation, .. } => Some(*operation),
            ClientError::InvalidFile(_) | ClientError::Io { .. } => Some(Operation::Upload),
        }
    }

    /// Short, stable text for the chat log.
    pub fn user_message(&self) -> &'static str {
        match self.operation() {
            Some(op) => op.user_message(),
            None => "Failed to reach backend",
        }
    }

    /// HTTP status, when the backend answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Backend error text or the underlying cause.
    pub fn detail(&self) -> Option<String> {
        match self {
            ClientError::Status { detail, .. } => detail.clone(),
            ClientError::Build(source) | ClientError::Transport { source, .. } => {
                Some(source.to_string())
            }
            ClientError::Decode { source, .. } => Some(source.to_string()),
            ClientError::InvalidFile(path) => Some(format!("not a PDF: {}", path.display())),
            ClientError::Io { path, source } => Some(format!("{}: {}", path.display(), source)),
        }
    }

    /// Structured form kept on the error message in the log.
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            operation: self
                .operation()
                .map(|op| op.name().to_string())
                .unwrap_or_else(|| "client".to_string()),
            status: self.status(),
            detail: self.detail(),
        }
    }
}

/// Pull the human-readable part out of a backend error body.
///
/// The backend answers `{"detail": "..."}`; validation failures put a JSON
/// array under `detail`. Anything else is returned as trimmed text.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed)
    {
        match map.get("detail") {
            Some(serde_json::Value::String(s)) => return Some(s.clone()),
            Some(other) => return Some(other.to_string()),
            None => {}
        }
    }
    Some(trimmed.to_string())
}
