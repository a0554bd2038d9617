//! Conversation state for the PDF chat and web search client.
//!
//! Holds the message log, session, uploaded files, settings and mode,
//! enforces one request in flight at a time, and exports transcripts.

pub mod controller;
pub mod conversation;
pub mod error;
pub mod export;
pub mod state;

pub use controller::{clear_remote, dispatch, ChatController};
pub use conversation::{Completion, Conversation, Outcome, PendingRequest, RequestKind};
pub use error::ChatError;
pub use export::{export_file_name, export_transcript, write_export};
pub use state::{RequestState, RequestTicket};
