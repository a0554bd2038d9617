//! CLI argument definitions for the assistant client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use assistant_core::Mode;

/// Terminal client for PDF chat and web search against an assistant backend.
#[derive(Parser, Debug)]
#[command(name = "assistant", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8000.
    #[arg(short = 'u', long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Starting mode: chat (documents) or search (web).
    #[arg(short = 'm', long = "mode", global = true)]
    pub mode: Option<Mode>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Interactive session (default).
    Chat,
    /// Send one query and print the answer.
    Ask {
        /// PDF files to upload before asking.
        #[arg(short = 'f', long = "file")]
        files: Vec<PathBuf>,
        /// The question.
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Check backend health.
    Health,
    /// List sessions known to the backend.
    Sessions,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ASSISTANT_CONFIG env var > ~/.assistant/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        pick(self.config.clone(), env_var("ASSISTANT_CONFIG").map(PathBuf::from))
            .unwrap_or_else(default_config_path)
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --base-url flag > ASSISTANT_BASE_URL env var > config file value.
    pub fn resolve_base_url(&self, config_url: &str) -> String {
        pick(self.base_url.clone(), env_var("ASSISTANT_BASE_URL"))
            .unwrap_or_else(|| config_url.to_string())
    }

    /// Resolve the log filter. `RUST_LOG` is applied separately and wins.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn pick<T>(flag: Option<T>, env: Option<T>) -> Option<T> {
    flag.or(env)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".assistant").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".assistant").join("config.toml");
    }
    PathBuf::from("config.toml")
}
