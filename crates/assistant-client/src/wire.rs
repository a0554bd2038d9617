//! Request and response bodies exchanged with the inference backend.

use serde::{Deserialize, Deserializer, Serialize};

use assistant_core::{SessionId, Settings, Source};

/// Body of `POST /pdf/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub query: &'a str,
    pub session_id: &'a SessionId,
    pub temperature: f64,
    pub max_tokens: u32,
    pub search_k: u32,
}

impl<'a> ChatRequest<'a> {
    pub fn new(query: &'a str, session_id: &'a SessionId, settings: &Settings) -> Self {
        Self {
            query,
            session_id,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            search_k: settings.search_k,
        }
    }
}

/// Body of `POST /search`. Retrieval breadth is not part of this contract.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub session_id: &'a SessionId,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a str, session_id: &'a SessionId, settings: &Settings) -> Self {
        Self {
            query,
            session_id,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Response of `POST /pdf/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub processed_files: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_chunks: Option<u64>,
}

/// Response of `POST /pdf/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response of `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub response: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sources: Vec<Source>,
}

/// Response of `GET /health`. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}

/// Response of `GET /sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionListResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub active_sessions: Vec<String>,
    #[serde(default)]
    pub total: usize,
}

/// Response of `DELETE /session/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub status: String,
    pub message: String,
}

/// Treat an explicit `null` list the same as a missing one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
