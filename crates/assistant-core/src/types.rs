use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AssistantError, Result};

// =============================================================================
// Session
// =============================================================================

/// Opaque key scoping a user's uploaded documents on the backend.
///
/// Generated once per conversation and replaced on reset; never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("session_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Author of a message in the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Upper-case label used by transcript export.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Interaction mode: which backend endpoint the input box targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Chat with uploaded PDF documents.
    #[default]
    Chat,
    /// Web, academic and encyclopedia search.
    Search,
}

impl Mode {
    /// Prompt hint shown next to the input line.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Mode::Chat => "Ask about your documents...",
            Mode::Search => "Ask about anything...",
        }
    }

    /// Heading shown while the log is empty.
    pub fn heading(&self) -> &'static str {
        match self {
            Mode::Chat => "Upload PDFs to Start",
            Mode::Search => "Ask Me Anything",
        }
    }

    /// One-line description shown under the heading.
    pub fn description(&self) -> &'static str {
        match self {
            Mode::Chat => "Upload PDF documents and chat with them using AI",
            Mode::Search => "Search the web, academic papers, and Wikipedia",
        }
    }

    /// Display name of the mode.
    pub fn title(&self) -> &'static str {
        match self {
            Mode::Chat => "PDF Chat",
            Mode::Search => "Web Search",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Chat => write!(f, "chat"),
            Mode::Search => write!(f, "search"),
        }
    }
}

impl FromStr for Mode {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" | "pdf" => Ok(Mode::Chat),
            "search" | "web" => Ok(Mode::Search),
            other => Err(AssistantError::InvalidSetting {
                name: "mode",
                value: other.to_string(),
                expected: "chat or search",
            }),
        }
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Page reference of a structured source.
///
/// The backend sends either a number or a string such as `"3"` or `"N/A"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(u64),
    Label(String),
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Number(n) => write!(f, "{}", n),
            PageRef::Label(s) => f.write_str(s),
        }
    }
}

/// A citation attached to an assistant response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// Plain text citation (web search results).
    Citation(String),
    /// Structured document reference with optional page and excerpt.
    Document {
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<PageRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

impl Source {
    /// Origin of the citation: the text itself or the document name.
    pub fn origin(&self) -> &str {
        match self {
            Source::Citation(text) => text,
            Source::Document { source, .. } => source,
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Structured detail kept alongside an error message.
///
/// The rendered content stays terse; this preserves what went wrong.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Operation that failed (e.g. "upload", "chat", "search").
    pub operation: String,
    /// HTTP status, when the backend answered.
    pub status: Option<u16>,
    /// Backend error text or transport error description.
    pub detail: Option<String>,
}

/// A single entry of the conversation log. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            sent_at: Utc::now(),
            diagnostic: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            sent_at: Utc::now(),
            diagnostic: None,
        }
    }

    /// Assistant message reporting a failed request.
    pub fn assistant_error(content: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Self {
            diagnostic: Some(diagnostic),
            ..Self::assistant(content, Vec::new())
        }
    }

    pub fn is_error(&self) -> bool {
        self.diagnostic.is_some()
    }
}

// =============================================================================
// Settings
// =============================================================================

pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 1.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (100, 4096);
pub const SEARCH_K_RANGE: (u32, u32) = (1, 10);

/// User-tunable generation parameters sent with each query.
///
/// Setters validate ranges; a rejected value leaves the settings unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub temperature: f64,
    pub max_tokens: u32,
    pub search_k: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2048,
            search_k: 4,
        }
    }
}

impl Settings {
    pub fn set_temperature(&mut self, value: f64) -> Result<()> {
        let (lo, hi) = TEMPERATURE_RANGE;
        if !(lo..=hi).contains(&value) {
            return Err(AssistantError::InvalidSetting {
                name: "temperature",
                value: value.to_string(),
                expected: "0.0..=1.0",
            });
        }
        self.temperature = value;
        Ok(())
    }

    pub fn set_max_tokens(&mut self, value: u32) -> Result<()> {
        let (lo, hi) = MAX_TOKENS_RANGE;
        if !(lo..=hi).contains(&value) {
            return Err(AssistantError::InvalidSetting {
                name: "max_tokens",
                value: value.to_string(),
                expected: "100..=4096",
            });
        }
        self.max_tokens = value;
        Ok(())
    }

    pub fn set_search_k(&mut self, value: u32) -> Result<()> {
        let (lo, hi) = SEARCH_K_RANGE;
        if !(lo..=hi).contains(&value) {
            return Err(AssistantError::InvalidSetting {
                name: "search_k",
                value: value.to_string(),
                expected: "1..=10",
            });
        }
        self.search_k = value;
        Ok(())
    }

    /// Set a parameter by name from its textual value.
    ///
    /// Accepts `temperature`, `max_tokens` (or `maxTokens`, `max-tokens`)
    /// and `search_k` (or `searchK`, `search-k`, `k`).
    pub fn set_named(&mut self, name: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "temperature" | "temp" => {
                let v = value.parse::<f64>().map_err(|_| AssistantError::InvalidSetting {
                    name: "temperature",
                    value: value.to_string(),
                    expected: "a number in 0.0..=1.0",
                })?;
                self.set_temperature(v)
            }
            "max_tokens" | "maxtokens" => {
                let v = value.parse::<u32>().map_err(|_| AssistantError::InvalidSetting {
                    name: "max_tokens",
                    value: value.to_string(),
                    expected: "an integer in 100..=4096",
                })?;
                self.set_max_tokens(v)
            }
            "search_k" | "searchk" | "k" => {
                let v = value.parse::<u32>().map_err(|_| AssistantError::InvalidSetting {
                    name: "search_k",
                    value: value.to_string(),
                    expected: "an integer in 1..=10",
                })?;
                self.set_search_k(v)
            }
            other => Err(AssistantError::UnknownSetting(other.to_string())),
        }
    }

    /// Check every field against its range.
    pub fn validate(&self) -> Result<()> {
        let mut probe = Settings::default();
        probe.set_temperature(self.temperature)?;
        probe.set_max_tokens(self.max_tokens)?;
        probe.set_search_k(self.search_k)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
