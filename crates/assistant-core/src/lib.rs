pub mod config;
pub mod error;
pub mod types;

pub use config::AssistantConfig;
pub use error::{AssistantError, Result};
pub use types::*;
