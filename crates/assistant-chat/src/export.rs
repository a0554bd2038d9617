//! Plain-text transcript export.

use std::path::{Path, PathBuf};

use tracing::info;

use assistant_core::{AssistantError, Message, SessionId};

use crate::conversation::Conversation;

/// Render the log as `ROLE: content` blocks separated by a blank line.
///
/// An empty log renders as an empty document.
pub fn export_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// File name of the exported transcript for `session`.
pub fn export_file_name(session: &SessionId) -> String {
    format!("chat_{}.txt", session)
}

/// Write the conversation's transcript into `dir`, creating it if needed.
pub fn write_export(dir: &Path, conversation: &Conversation) -> Result<PathBuf, AssistantError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(conversation.session()));
    std::fs::write(&path, export_transcript(conversation.messages()))?;
    info!(
        path = %path.display(),
        messages = conversation.messages().len(),
        "Transcript exported"
    );
    Ok(path)
}
