//! Client for the PDF chat and web search backend.
//!
//! Formats the upload, document-chat and search requests, and maps every
//! failure to a [`ClientError`] that keeps the HTTP status and backend text.

pub mod client;
pub mod error;
pub mod upload;
pub mod wire;

pub use client::{ApiClient, Backend};
pub use error::{ClientError, Operation};
pub use upload::UploadFile;
pub use wire::{
    ChatResponse, HealthResponse, SearchResponse, SessionListResponse, SessionResponse,
    UploadResponse,
};
