//! Interactive loop: stdin lines race the request in flight.
//!
//! Each accepted query or upload is spawned onto a [`JoinSet`]; its outcome
//! is merged when it finishes. Commands that don't need the backend stay
//! available while a request is pending.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, warn};

use assistant_chat::{
    clear_remote, dispatch, write_export, Completion, Conversation, Outcome, PendingRequest,
    RequestTicket,
};
use assistant_client::{Backend, UploadFile};
use assistant_core::{Mode, Role};

use crate::view;

// =============================================================================
// Commands
// =============================================================================

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Empty,
    Query(String),
    Upload(Vec<PathBuf>),
    Mode(Mode),
    Set { name: String, value: String },
    Settings,
    Files,
    Clear,
    Export(Option<PathBuf>),
    Health,
    Sessions,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command: /{0} (try /help, or // to send a leading slash)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    Invalid(String),
}

impl FromStr for ReplCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ReplCommand::Empty);
        }
        // `//` sends a query that starts with a literal slash.
        if let Some(literal) = line.strip_prefix("//") {
            return Ok(ReplCommand::Query(format!("/{}", literal)));
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(ReplCommand::Query(line.to_string()));
        };

        let mut words = shell_words::split(rest)
            .map_err(|e| ParseError::Invalid(e.to_string()))?
            .into_iter();
        let name = words.next().unwrap_or_default().to_lowercase();
        let args: Vec<String> = words.collect();

        match (name.as_str(), args.as_slice()) {
            ("upload", []) => Err(ParseError::Usage("/upload <file.pdf> [\"more file.pdf\" ...]")),
            ("upload", paths) => Ok(ReplCommand::Upload(
                paths.iter().map(PathBuf::from).collect(),
            )),
            ("mode", [mode]) => mode
                .parse::<Mode>()
                .map(ReplCommand::Mode)
                .map_err(|e| ParseError::Invalid(e.to_string())),
            ("mode", _) => Err(ParseError::Usage("/mode chat|search")),
            ("set", [name, value]) => Ok(ReplCommand::Set {
                name: name.clone(),
                value: value.clone(),
            }),
            ("set", _) => Err(ParseError::Usage(
                "/set temperature|max_tokens|search_k <value>",
            )),
            ("settings", []) => Ok(ReplCommand::Settings),
            ("files", []) => Ok(ReplCommand::Files),
            ("clear" | "new", []) => Ok(ReplCommand::Clear),
            ("export", []) => Ok(ReplCommand::Export(None)),
            ("export", [dir]) => Ok(ReplCommand::Export(Some(PathBuf::from(dir)))),
            ("export", _) => Err(ParseError::Usage("/export [dir]")),
            ("health", []) => Ok(ReplCommand::Health),
            ("sessions", []) => Ok(ReplCommand::Sessions),
            ("help" | "?", _) => Ok(ReplCommand::Help),
            ("quit" | "exit" | "q", _) => Ok(ReplCommand::Quit),
            ("settings" | "files" | "clear" | "new" | "health" | "sessions", _) => {
                Err(ParseError::Invalid(format!("/{} takes no arguments", name)))
            }
            _ => Err(ParseError::Unknown(name.clone())),
        }
    }
}

// =============================================================================
// Loop
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Options the loop takes from the configuration.
#[derive(Debug, Clone)]
pub struct ReplOptions {
    pub export_dir: PathBuf,
    pub show_diagnostics: bool,
    pub clear_remote_on_reset: bool,
}

pub struct Repl<B: Backend + 'static, W: Write> {
    conversation: Conversation,
    backend: Arc<B>,
    options: ReplOptions,
    tasks: JoinSet<(RequestTicket, Outcome)>,
    in_flight: HashMap<Id, RequestTicket>,
    printed: usize,
    out: W,
}

impl<B: Backend + 'static, W: Write> Repl<B, W> {
    pub fn new(conversation: Conversation, backend: Arc<B>, options: ReplOptions, out: W) -> Self {
        Self {
            conversation,
            backend,
            options,
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
            printed: 0,
            out,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run until `/quit`, or until input ends and nothing is pending.
    pub async fn run<R>(&mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;

        writeln!(self.out, "{}", view::render_welcome(self.conversation.mode()))?;
        self.write_prompt()?;

        loop {
            tokio::select! {
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.on_joined(joined)?;
                }
                line = lines.next_line(), if input_open => {
                    match line? {
                        Some(line) => {
                            if self.handle_line(&line).await? == Flow::Quit {
                                break;
                            }
                        }
                        None => {
                            debug!(pending = self.tasks.len(), "Input closed");
                            input_open = false;
                        }
                    }
                }
                else => break,
            }
            if input_open {
                self.write_prompt()?;
            }
        }
        self.out.flush()
    }

    /// Wait for the next spawned request and merge it. Returns `false` if
    /// nothing was pending.
    #[cfg(test)]
    pub async fn join_next(&mut self) -> std::io::Result<bool> {
        match self.tasks.join_next().await {
            Some(joined) => {
                self.on_joined(joined)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> std::io::Result<Flow> {
        match line.parse::<ReplCommand>() {
            Ok(cmd) => self.handle(cmd).await,
            Err(e) => {
                writeln!(self.out, "⚠ {}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    pub async fn handle(&mut self, cmd: ReplCommand) -> std::io::Result<Flow> {
        match cmd {
            ReplCommand::Empty => {}
            ReplCommand::Query(text) => match self.conversation.begin_submit(&text) {
                Ok(pending) => {
                    // The typed line is the user's message; don't echo it.
                    self.printed = self.conversation.messages().len();
                    self.spawn(pending);
                }
                Err(e) => writeln!(self.out, "⚠ {}", e)?,
            },
            ReplCommand::Upload(paths) => self.upload(paths).await?,
            ReplCommand::Mode(mode) => {
                self.conversation.set_mode(mode);
                writeln!(self.out, "{}: {}", mode.title(), mode.placeholder())?;
            }
            ReplCommand::Set { name, value } => {
                match self.conversation.set_setting(&name, &value) {
                    Ok(()) => writeln!(
                        self.out,
                        "{}",
                        view::render_settings(self.conversation.settings())
                    )?,
                    Err(e) => writeln!(self.out, "⚠ {}", e)?,
                }
            }
            ReplCommand::Settings => writeln!(
                self.out,
                "{}",
                view::render_settings(self.conversation.settings())
            )?,
            ReplCommand::Files => writeln!(
                self.out,
                "{}",
                view::render_files(self.conversation.uploaded_files())
            )?,
            ReplCommand::Clear => self.clear()?,
            ReplCommand::Export(dir) => {
                let dir = dir.unwrap_or_else(|| self.options.export_dir.clone());
                match write_export(&dir, &self.conversation) {
                    Ok(path) => writeln!(self.out, "Transcript saved to {}", path.display())?,
                    Err(e) => writeln!(self.out, "⚠ export failed: {}", e)?,
                }
            }
            ReplCommand::Health => match self.backend.check_health().await {
                Ok(health) => writeln!(self.out, "{}", view::render_health(&health))?,
                Err(e) => {
                    warn!(error = %e, "Health check failed");
                    writeln!(self.out, "⚠ {}", e.user_message())?
                }
            },
            ReplCommand::Sessions => match self.backend.list_sessions().await {
                Ok(list) => writeln!(self.out, "{}", view::render_sessions(&list))?,
                Err(e) => {
                    warn!(error = %e, "Listing sessions failed");
                    writeln!(self.out, "⚠ {}", e.user_message())?
                }
            },
            ReplCommand::Help => writeln!(self.out, "{}", view::HELP)?,
            ReplCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn upload(&mut self, paths: Vec<PathBuf>) -> std::io::Result<()> {
        if self.conversation.is_busy() {
            writeln!(self.out, "⚠ {}", assistant_chat::ChatError::Busy)?;
            return Ok(());
        }
        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            match UploadFile::from_path(path).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    writeln!(self.out, "⚠ {}", e)?;
                    return Ok(());
                }
            }
        }
        match self.conversation.begin_upload(files) {
            Ok(pending) => {
                writeln!(self.out, "Uploading {} file(s)...", paths.len())?;
                self.spawn(pending);
            }
            Err(e) => writeln!(self.out, "⚠ {}", e)?,
        }
        Ok(())
    }

    fn clear(&mut self) -> std::io::Result<()> {
        let previous = self.conversation.reset();
        if self.options.clear_remote_on_reset {
            let backend = Arc::clone(&self.backend);
            tokio::spawn(async move {
                clear_remote(backend.as_ref(), &previous).await;
            });
        }
        self.printed = 0;
        writeln!(self.out, "{}", view::render_welcome(self.conversation.mode()))
    }

    fn spawn(&mut self, pending: PendingRequest) {
        let backend = Arc::clone(&self.backend);
        let ticket = pending.ticket.clone();
        let handle = self.tasks.spawn(async move {
            let outcome = dispatch(backend.as_ref(), &pending).await;
            (pending.ticket, outcome)
        });
        self.in_flight.insert(handle.id(), ticket);
    }

    fn on_joined(
        &mut self,
        joined: Result<(RequestTicket, Outcome), JoinError>,
    ) -> std::io::Result<()> {
        match joined {
            Ok((ticket, outcome)) => {
                self.in_flight.retain(|_, t| *t != ticket);
                if self.conversation.complete(&ticket, outcome) == Completion::Applied {
                    self.flush_messages()?;
                }
            }
            Err(e) => {
                warn!(error = %e, "Request task failed");
                if let Some(ticket) = self.in_flight.remove(&e.id()) {
                    if self.conversation.abandon(&ticket) == Completion::Applied {
                        writeln!(self.out, "⚠ request failed without a response")?;
                    }
                }
            }
        }
        Ok(())
    }

    fn flush_messages(&mut self) -> std::io::Result<()> {
        let messages = self.conversation.messages();
        for message in messages.iter().skip(self.printed) {
            if message.role == Role::Assistant {
                writeln!(
                    self.out,
                    "{}",
                    view::render_message(message, self.options.show_diagnostics)
                )?;
            }
        }
        self.printed = messages.len();
        Ok(())
    }

    fn write_prompt(&mut self) -> std::io::Result<()> {
        let prompt = view::prompt(self.conversation.mode(), self.conversation.is_busy());
        write!(self.out, "{}", prompt)?;
        self.out.flush()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use assistant_client::{
        ChatResponse, ClientError, HealthResponse, Operation, SearchResponse,
        SessionListResponse, SessionResponse, UploadResponse,
    };
    use assistant_core::{SessionId, Settings};

    /// Answers after a permit is released, echoing the query.
    struct GatedBackend {
        gate: Semaphore,
        cleared: Mutex<Vec<SessionId>>,
    }

    impl GatedBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                cleared: Mutex::new(Vec::new()),
            })
        }

        async fn wait(&self) {
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
        }
    }

    #[async_trait]
    impl Backend for GatedBackend {
        async fn upload_documents(
            &self,
            files: &[UploadFile],
            _session: &SessionId,
        ) -> Result<UploadResponse, ClientError> {
            self.wait().await;
            Ok(UploadResponse {
                message: format!("Processed {} files", files.len()),
                processed_files: files.iter().map(|f| f.file_name.clone()).collect(),
                status: None,
                total_chunks: None,
            })
        }

        async fn query_documents(
            &self,
            query: &str,
            _session: &SessionId,
            _settings: &Settings,
        ) -> Result<ChatResponse, ClientError> {
            self.wait().await;
            Ok(ChatResponse {
                answer: format!("doc: {}", query),
                sources: vec![],
                session_id: None,
            })
        }

        async fn query_web(
            &self,
            _query: &str,
            _session: &SessionId,
            _settings: &Settings,
        ) -> Result<SearchResponse, ClientError> {
            self.wait().await;
            Err(ClientError::Status {
                operation: Operation::Search,
                status: 502,
                detail: Some("search provider down".to_string()),
            })
        }

        async fn check_health(&self) -> Result<HealthResponse, ClientError> {
            Ok(serde_json::from_str(r#"{"status":"healthy","model":"m"}"#).unwrap())
        }

        async fn list_sessions(&self) -> Result<SessionListResponse, ClientError> {
            Ok(SessionListResponse {
                active_sessions: vec![],
                total: 0,
            })
        }

        async fn clear_session(
            &self,
            session: &SessionId,
        ) -> Result<SessionResponse, ClientError> {
            self.cleared.lock().unwrap().push(session.clone());
            Ok(SessionResponse {
                status: "success".to_string(),
                message: "cleared".to_string(),
            })
        }
    }

    fn options(dir: PathBuf) -> ReplOptions {
        ReplOptions {
            export_dir: dir,
            show_diagnostics: true,
            clear_remote_on_reset: false,
        }
    }

    fn repl(backend: Arc<GatedBackend>) -> Repl<GatedBackend, Vec<u8>> {
        Repl::new(
            Conversation::default(),
            backend,
            options(std::env::temp_dir()),
            Vec::new(),
        )
    }

    fn output(repl: &Repl<GatedBackend, Vec<u8>>) -> String {
        String::from_utf8_lossy(&repl.out).to_string()
    }

    // ---- Parsing ----

    #[test]
    fn test_parse_queries_and_commands() {
        assert_eq!("   ".parse::<ReplCommand>().unwrap(), ReplCommand::Empty);
        assert_eq!(
            " what is this? ".parse::<ReplCommand>().unwrap(),
            ReplCommand::Query("what is this?".to_string())
        );
        assert_eq!(
            "/upload a.pdf b.pdf".parse::<ReplCommand>().unwrap(),
            ReplCommand::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")])
        );
        assert_eq!(
            "/mode search".parse::<ReplCommand>().unwrap(),
            ReplCommand::Mode(Mode::Search)
        );
        assert_eq!(
            "/set temperature 0.7".parse::<ReplCommand>().unwrap(),
            ReplCommand::Set {
                name: "temperature".to_string(),
                value: "0.7".to_string()
            }
        );
        assert_eq!("/EXPORT".parse::<ReplCommand>().unwrap(), ReplCommand::Export(None));
        assert_eq!("/quit".parse::<ReplCommand>().unwrap(), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_quoted_paths() {
        assert_eq!(
            r#"/upload "My Paper.pdf" b.pdf"#.parse::<ReplCommand>().unwrap(),
            ReplCommand::Upload(vec![PathBuf::from("My Paper.pdf"), PathBuf::from("b.pdf")])
        );
        assert_eq!(
            r"/upload My\ Paper.pdf".parse::<ReplCommand>().unwrap(),
            ReplCommand::Upload(vec![PathBuf::from("My Paper.pdf")])
        );
        assert_eq!(
            "/export 'chat logs'".parse::<ReplCommand>().unwrap(),
            ReplCommand::Export(Some(PathBuf::from("chat logs")))
        );
        assert!(matches!(
            r#"/upload "My Paper.pdf"#.parse::<ReplCommand>().unwrap_err(),
            ParseError::Invalid(_)
        ));
    }

    #[test]
    fn test_double_slash_sends_literal_query() {
        assert_eq!(
            "//usr/share/doc what lives here?".parse::<ReplCommand>().unwrap(),
            ReplCommand::Query("/usr/share/doc what lives here?".to_string())
        );
        assert!(matches!(
            "/usr/share/doc what lives here?".parse::<ReplCommand>().unwrap_err(),
            ParseError::Unknown(_)
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "/bogus".parse::<ReplCommand>().unwrap_err(),
            ParseError::Unknown("bogus".to_string())
        );
        assert!(matches!(
            "/upload".parse::<ReplCommand>().unwrap_err(),
            ParseError::Usage(_)
        ));
        assert!(matches!(
            "/mode video".parse::<ReplCommand>().unwrap_err(),
            ParseError::Invalid(_)
        ));
        assert!(matches!(
            "/set temperature".parse::<ReplCommand>().unwrap_err(),
            ParseError::Usage(_)
        ));
        assert!(matches!(
            "/files now".parse::<ReplCommand>().unwrap_err(),
            ParseError::Invalid(_)
        ));
    }

    // ---- Loop ----

    #[tokio::test]
    async fn test_query_round_trip() {
        let backend = GatedBackend::new();
        let mut repl = repl(Arc::clone(&backend));

        repl.handle_line("hello").await.unwrap();
        assert!(repl.conversation().is_busy());

        backend.gate.add_permits(1);
        assert!(repl.join_next().await.unwrap());
        assert!(!repl.conversation().is_busy());
        assert_eq!(repl.conversation().messages().len(), 2);
        assert!(output(&repl).contains("assistant: doc: hello"));
        assert!(!output(&repl).contains("you: hello"));
    }

    #[tokio::test]
    async fn test_busy_rejects_query_but_accepts_settings() {
        let backend = GatedBackend::new();
        let mut repl = repl(Arc::clone(&backend));

        repl.handle_line("first").await.unwrap();
        repl.handle_line("second").await.unwrap();
        repl.handle_line("/set search_k 6").await.unwrap();
        repl.handle_line("/mode search").await.unwrap();

        let out = output(&repl);
        assert!(out.contains("⚠ a request is already in flight"));
        assert_eq!(repl.conversation().settings().search_k, 6);
        assert_eq!(repl.conversation().mode(), Mode::Search);
        assert_eq!(repl.conversation().messages().len(), 1);

        backend.gate.add_permits(1);
        repl.join_next().await.unwrap();
        assert_eq!(repl.conversation().messages().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_while_busy_discards_late_answer() {
        let backend = GatedBackend::new();
        let mut repl = repl(Arc::clone(&backend));
        let first_session = repl.conversation().session().clone();

        repl.handle_line("hello").await.unwrap();
        repl.handle_line("/clear").await.unwrap();
        assert!(!repl.conversation().is_busy());
        assert_ne!(repl.conversation().session(), &first_session);

        backend.gate.add_permits(1);
        repl.join_next().await.unwrap();
        assert!(repl.conversation().messages().is_empty());
        assert!(!output(&repl).contains("doc: hello"));
    }

    #[tokio::test]
    async fn test_clear_remote_on_reset() {
        let backend = GatedBackend::new();
        let mut repl = Repl::new(
            Conversation::default(),
            Arc::clone(&backend),
            ReplOptions {
                clear_remote_on_reset: true,
                ..options(std::env::temp_dir())
            },
            Vec::new(),
        );
        let first_session = repl.conversation().session().clone();
        repl.handle_line("/clear").await.unwrap();

        for _ in 0..50 {
            if !backend.cleared.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(*backend.cleared.lock().unwrap(), vec![first_session]);
    }

    #[tokio::test]
    async fn test_search_failure_shows_error_and_diagnostic() {
        let backend = GatedBackend::new();
        let mut repl = repl(Arc::clone(&backend));

        repl.handle_line("/mode search").await.unwrap();
        repl.handle_line("weather").await.unwrap();
        backend.gate.add_permits(1);
        repl.join_next().await.unwrap();

        let out = output(&repl);
        assert!(out.contains("assistant: ❌ Error: Failed to perform search"));
        assert!(out.contains("status=502"));
        assert!(repl.conversation().messages()[1].is_error());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_without_going_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"text").unwrap();

        let backend = GatedBackend::new();
        let mut repl = repl(backend);
        repl.handle_line(&format!("/upload {}", path.display()))
            .await
            .unwrap();

        assert!(!repl.conversation().is_busy());
        assert!(output(&repl).contains("not a PDF file"));
    }

    #[tokio::test]
    async fn test_upload_records_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("My Paper.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let backend = GatedBackend::new();
        let mut repl = repl(Arc::clone(&backend));
        repl.handle_line(&format!("/upload \"{}\"", path.display()))
            .await
            .unwrap();
        backend.gate.add_permits(1);
        repl.join_next().await.unwrap();

        assert_eq!(repl.conversation().uploaded_files(), vec!["My Paper.pdf".to_string()]);
        assert!(output(&repl).contains("✅ Processed 1 files"));
        repl.handle_line("/files").await.unwrap();
        assert!(output(&repl).contains("📄 My Paper.pdf"));
    }

    #[tokio::test]
    async fn test_export_writes_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let backend = GatedBackend::new();
        let mut repl = Repl::new(
            Conversation::default(),
            Arc::clone(&backend),
            options(dir.path().to_path_buf()),
            Vec::new(),
        );
        repl.handle_line("hello").await.unwrap();
        backend.gate.add_permits(1);
        repl.join_next().await.unwrap();
        repl.handle_line("/export").await.unwrap();

        let file = dir
            .path()
            .join(format!("chat_{}.txt", repl.conversation().session()));
        let content = std::fs::read_to_string(file).unwrap();
        assert_eq!(content, "USER: hello\n\nASSISTANT: doc: hello");
    }

    #[tokio::test]
    async fn test_run_drains_pending_after_input_ends() {
        let backend = GatedBackend::new();
        backend.gate.add_permits(1);
        let mut repl = repl(backend);

        let input: &[u8] = b"what is new\n";
        repl.run(input).await.unwrap();

        assert_eq!(repl.conversation().messages().len(), 2);
        assert!(output(&repl).contains("assistant: doc: what is new"));
    }

    #[tokio::test]
    async fn test_run_stops_on_quit() {
        let backend = GatedBackend::new();
        let mut repl = repl(backend);

        let input: &[u8] = b"/help\n/quit\nnever sent\n";
        repl.run(input).await.unwrap();

        assert!(repl.conversation().messages().is_empty());
        assert!(output(&repl).contains("Commands:"));
    }
}
