//! Error types for the conversation state machine.

use assistant_core::AssistantError;

use crate::state::RequestState;

/// Rejections from the conversation. None of them change its state.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyInput,
    #[error("a request is already in flight")]
    Busy,
    #[error("no files selected")]
    NoFiles,
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: RequestState, to: RequestState },
    #[error("settings error: {0}")]
    Settings(String),
}

impl From<AssistantError> for ChatError {
    fn from(err: AssistantError) -> Self {
        ChatError::Settings(err.to_string())
    }
}
