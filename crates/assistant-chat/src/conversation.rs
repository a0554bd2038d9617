//! Conversation state: message log, session, uploaded files, settings, mode.
//!
//! Requests are split into `begin_*` (validate, record, go busy) and
//! [`Conversation::complete`] (merge the outcome). The ticket returned by
//! `begin_*` names the session the request was issued under; an outcome for
//! a session that has since been reset is discarded.

use tracing::{debug, info, warn};

use assistant_client::{ClientError, UploadFile, UploadResponse};
use assistant_core::{Message, Mode, SessionId, Settings, Source};

use crate::error::ChatError;
use crate::state::{RequestState, RequestTicket};

/// Prefix of an assistant message reporting a failed query.
pub const QUERY_ERROR_PREFIX: &str = "❌ Error: ";
/// Prefix of an assistant message reporting a failed upload.
pub const UPLOAD_ERROR_PREFIX: &str = "❌ Error uploading files: ";
/// Prefix of an assistant message confirming an upload.
pub const UPLOAD_OK_PREFIX: &str = "✅ ";

/// What a pending request asks the backend to do.
#[derive(Debug, Clone)]
pub enum RequestKind {
    /// Query routed by `mode`, carrying the settings at submit time.
    Query {
        mode: Mode,
        text: String,
        settings: Settings,
    },
    Upload { files: Vec<UploadFile> },
}

/// A request accepted by the conversation and not yet completed.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub ticket: RequestTicket,
    pub kind: RequestKind,
}

impl PendingRequest {
    pub fn session(&self) -> &SessionId {
        &self.ticket.session
    }
}

/// Result of running a pending request against the backend.
#[derive(Debug)]
pub enum Outcome {
    Answer {
        content: String,
        sources: Vec<Source>,
    },
    Uploaded(UploadResponse),
    Failed(ClientError),
}

/// Whether [`Conversation::complete`] merged an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The ticket no longer matches the in-flight request or session.
    Stale,
}

/// Application context for one browsing session.
#[derive(Debug)]
pub struct Conversation {
    session: SessionId,
    messages: Vec<Message>,
    uploaded_files: Vec<String>,
    settings: Settings,
    mode: Mode,
    state: RequestState,
    next_seq: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Conversation {
    /// Start a conversation with a fresh session, in chat mode.
    pub fn new(settings: Settings) -> Self {
        let session = SessionId::generate();
        info!(session = %session, "Conversation started");
        Self {
            session,
            messages: Vec::new(),
            uploaded_files: Vec::new(),
            settings,
            mode: Mode::default(),
            state: RequestState::Idle,
            next_seq: 0,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn uploaded_files(&self) -> &[String] {
        &self.uploaded_files
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Switch endpoint routing. Allowed in any state; touches nothing else.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            debug!(from = %self.mode, to = %mode, "Mode switched");
            self.mode = mode;
        }
    }

    /// Replace all settings. Applies to the next request only.
    pub fn set_settings(&mut self, settings: Settings) -> Result<(), ChatError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Change one setting by name. Applies to the next request only.
    pub fn set_setting(&mut self, name: &str, value: &str) -> Result<(), ChatError> {
        self.settings.set_named(name, value)?;
        debug!(name, value, "Setting updated");
        Ok(())
    }

    /// Accept a query: append the user message and go busy.
    pub fn begin_submit(&mut self, input: &str) -> Result<PendingRequest, ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        if self.state.is_busy() {
            return Err(ChatError::Busy);
        }

        let ticket = self.issue_ticket()?;
        self.messages.push(Message::user(input));
        Ok(PendingRequest {
            ticket,
            kind: RequestKind::Query {
                mode: self.mode,
                text: input.to_string(),
                settings: self.settings,
            },
        })
    }

    /// Accept an upload and go busy. An empty selection is rejected.
    pub fn begin_upload(&mut self, files: Vec<UploadFile>) -> Result<PendingRequest, ChatError> {
        if files.is_empty() {
            return Err(ChatError::NoFiles);
        }
        if self.state.is_busy() {
            return Err(ChatError::Busy);
        }

        let ticket = self.issue_ticket()?;
        Ok(PendingRequest {
            ticket,
            kind: RequestKind::Upload { files },
        })
    }

    /// Merge the outcome of the request identified by `ticket`.
    pub fn complete(&mut self, ticket: &RequestTicket, outcome: Outcome) -> Completion {
        if ticket.session != self.session || self.state.ticket() != Some(ticket) {
            debug!(
                seq = ticket.seq,
                session = %ticket.session,
                current = %self.session,
                "Discarding stale response"
            );
            return Completion::Stale;
        }

        let message = match outcome {
            Outcome::Answer { content, sources } => Message::assistant(content, sources),
            Outcome::Uploaded(resp) => {
                info!(
                    files = resp.processed_files.len(),
                    chunks = resp.total_chunks.unwrap_or(0),
                    "Documents uploaded"
                );
                self.uploaded_files.extend(resp.processed_files);
                Message::assistant(format!("{}{}", UPLOAD_OK_PREFIX, resp.message), Vec::new())
            }
            Outcome::Failed(err) => {
                warn!(
                    error = %err,
                    status = err.status().unwrap_or(0),
                    "Request failed"
                );
                let prefix = if err.operation() == Some(assistant_client::Operation::Upload) {
                    UPLOAD_ERROR_PREFIX
                } else {
                    QUERY_ERROR_PREFIX
                };
                Message::assistant_error(
                    format!("{}{}", prefix, err.user_message()),
                    err.diagnostic(),
                )
            }
        };
        self.messages.push(message);
        self.state = RequestState::Idle;
        debug!(seq = ticket.seq, "Request completed");
        Completion::Applied
    }

    /// Return to idle without a reply when a request died without an outcome.
    pub fn abandon(&mut self, ticket: &RequestTicket) -> Completion {
        if self.state.ticket() != Some(ticket) {
            return Completion::Stale;
        }
        warn!(seq = ticket.seq, "Request abandoned");
        self.state = RequestState::Idle;
        Completion::Applied
    }

    /// Clear the log and file list and start a new session, in any state.
    ///
    /// Returns the session that was replaced. A request still in flight for
    /// it will be discarded on completion.
    pub fn reset(&mut self) -> SessionId {
        if let Some(ticket) = self.state.ticket() {
            debug!(seq = ticket.seq, "Reset while a request is in flight");
        }
        let previous = std::mem::replace(&mut self.session, SessionId::generate());
        self.messages.clear();
        self.uploaded_files.clear();
        self.state = RequestState::Idle;
        info!(previous = %previous, session = %self.session, "Conversation reset");
        previous
    }

    fn issue_ticket(&mut self) -> Result<RequestTicket, ChatError> {
        self.next_seq += 1;
        let ticket = RequestTicket {
            seq: self.next_seq,
            session: self.session.clone(),
        };
        self.transition(RequestState::Busy(ticket.clone()))?;
        Ok(ticket)
    }

    fn transition(&mut self, target: RequestState) -> Result<(), ChatError> {
        if !self.state.can_transition_to(&target) {
            return Err(ChatError::InvalidTransition {
                from: self.state.clone(),
                to: target,
            });
        }
        debug!("Request state: {} -> {}", self.state, target);
        self.state = target;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
