//! Assistant binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing on stderr
//! 3. Build the HTTP client for the backend
//! 4. Run the requested command (interactive chat by default)

mod cli;
mod repl;
mod view;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use assistant_chat::{ChatController, Conversation};
use assistant_client::{ApiClient, Backend, UploadFile};
use assistant_core::config::GeneralConfig;
use assistant_core::AssistantConfig;

use cli::{CliArgs, Command};
use repl::{Repl, ReplOptions};

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print the newest message; a failed request becomes the command's error.
fn print_reply(
    conversation: &Conversation,
    show_diagnostics: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(message) = conversation.messages().last() else {
        return Ok(());
    };
    println!("{}", view::render_message(message, show_diagnostics));
    if message.is_error() {
        return Err(message.content.clone().into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing exists; problems are reported after init.
    let config_file = args.resolve_config_path();
    let loaded = config_file
        .exists()
        .then(|| AssistantConfig::load(&config_file));
    let config_level = match &loaded {
        Some(Ok(config)) => config.general.log_level.clone(),
        _ => GeneralConfig::default().log_level,
    };
    init_tracing(&args.resolve_log_level(&config_level));

    let mut config = match loaded {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Invalid configuration, using defaults"
            );
            AssistantConfig::default()
        }
        None => {
            tracing::debug!(path = %config_file.display(), "No configuration file, using defaults");
            AssistantConfig::default()
        }
    };
    config.backend.base_url = args.resolve_base_url(&config.backend.base_url);
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.backend.base_url,
        "Starting assistant"
    );

    let client = Arc::new(ApiClient::from_config(&config.backend)?);
    let mode = args.mode.unwrap_or_default();
    let show_diagnostics = config.general.show_diagnostics;

    match args.command() {
        Command::Chat => {
            let mut conversation = Conversation::new(config.generation);
            conversation.set_mode(mode);
            let options = ReplOptions {
                export_dir: PathBuf::from(&config.general.export_dir),
                show_diagnostics,
                clear_remote_on_reset: config.backend.clear_remote_on_reset,
            };
            let mut repl = Repl::new(conversation, client, options, std::io::stdout());
            repl.run(tokio::io::BufReader::new(tokio::io::stdin())).await?;
            tracing::info!(
                session = %repl.conversation().session(),
                messages = repl.conversation().messages().len(),
                "Session ended"
            );
        }
        Command::Ask { files, query } => {
            let mut controller = ChatController::new(client, config.generation);
            controller.conversation_mut().set_mode(mode);

            if !files.is_empty() {
                let mut uploads = Vec::with_capacity(files.len());
                for path in &files {
                    uploads.push(UploadFile::from_path(path).await?);
                }
                controller.upload(uploads).await?;
                print_reply(controller.conversation(), show_diagnostics)?;
            }

            controller.submit(&query.join(" ")).await?;
            print_reply(controller.conversation(), show_diagnostics)?;
        }
        Command::Health => {
            let health = client.check_health().await?;
            println!("{}", view::render_health(&health));
            if !health.is_healthy() {
                return Err(format!("backend reported status '{}'", health.status).into());
            }
        }
        Command::Sessions => {
            let sessions = client.list_sessions().await?;
            println!("{}", view::render_sessions(&sessions));
        }
    }

    Ok(())
}
