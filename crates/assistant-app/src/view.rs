//! Plain-text rendering of messages and status for the terminal.

use assistant_client::{HealthResponse, SessionListResponse};
use assistant_core::{Message, Mode, Role, Settings, Source};

const EXCERPT_CHARS: usize = 200;

pub const HELP: &str = "\
Commands:
  /upload <paths...>      upload PDF files into this session
  /mode chat|search       switch between document chat and web search
  /set <name> <value>     temperature, max_tokens or search_k
  /settings               show generation settings
  /files                  list uploaded documents
  /clear                  start a new session
  /export [dir]           write the transcript to a text file
  /health                 check the backend
  /sessions               list backend sessions
  /help                   show this help
  /quit                   exit
Quote paths with spaces: /upload \"My Paper.pdf\".
Start a line with // to send a query beginning with a slash.
Anything else is sent as a query.";

pub fn render_welcome(mode: Mode) -> String {
    format!(
        "{} · {}\n{}\n{}\nType /help for commands.",
        mode.title(),
        mode.heading(),
        mode.description(),
        mode.placeholder()
    )
}

pub fn prompt(mode: Mode, busy: bool) -> String {
    let marker = if busy { "…" } else { ">" };
    format!("[{}] {} ", mode, marker)
}

/// Render one log entry, with its sources and, optionally, the diagnostic.
pub fn render_message(message: &Message, show_diagnostics: bool) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("{}: {}", speaker, message.content);

    if !message.sources.is_empty() {
        out.push_str(&format!("\n📚 Sources ({})", message.sources.len()));
        for (i, source) in message.sources.iter().enumerate() {
            out.push_str(&format!("\n  [{}] {}", i + 1, render_source(source)));
        }
    }

    if show_diagnostics {
        if let Some(diag) = &message.diagnostic {
            out.push_str(&format!("\n  ⚠ operation={}", diag.operation));
            if let Some(status) = diag.status {
                out.push_str(&format!(" status={}", status));
            }
            if let Some(detail) = &diag.detail {
                out.push_str(&format!(" detail={}", detail));
            }
        }
    }
    out
}

fn render_source(source: &Source) -> String {
    match source {
        Source::Citation(text) => text.clone(),
        Source::Document {
            source,
            page,
            content,
        } => {
            let mut line = source.clone();
            if let Some(page) = page {
                line.push_str(&format!(" (page {})", page));
            }
            if let Some(content) = content.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                line.push_str(&format!("\n      \"{}\"", excerpt(content)));
            }
            line
        }
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

pub fn render_settings(settings: &Settings) -> String {
    format!(
        "temperature = {}\nmax_tokens  = {}\nsearch_k    = {}",
        settings.temperature, settings.max_tokens, settings.search_k
    )
}

pub fn render_files(files: &[String]) -> String {
    if files.is_empty() {
        return "No documents uploaded".to_string();
    }
    files
        .iter()
        .map(|name| format!("📄 {}", name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_health(health: &HealthResponse) -> String {
    let mut out = format!("backend: {}", health.status);
    if let Some(model) = &health.model {
        out.push_str(&format!("\nmodel: {}", model));
    }
    if let Some(ts) = &health.timestamp {
        out.push_str(&format!("\ntimestamp: {}", ts));
    }
    out
}

pub fn render_sessions(list: &SessionListResponse) -> String {
    let mut out = format!("{} active session(s)", list.total);
    for id in &list.active_sessions {
        out.push_str(&format!("\n  {}", id));
    }
    out
}
