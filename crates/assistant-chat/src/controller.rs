//! Routes pending requests to the backend and drives the conversation.

use std::sync::Arc;

use tracing::{info, warn};

use assistant_client::{Backend, UploadFile};
use assistant_core::{Mode, SessionId, Settings};

use crate::conversation::{Completion, Conversation, Outcome, PendingRequest, RequestKind};
use crate::error::ChatError;

/// Issue the single backend call a pending request describes.
///
/// Chat mode goes to the document endpoint with the full settings; search
/// mode goes to the web endpoint, which takes no retrieval breadth.
pub async fn dispatch<B: Backend + ?Sized>(backend: &B, pending: &PendingRequest) -> Outcome {
    let session = pending.session();
    let result = match &pending.kind {
        RequestKind::Query {
            mode: Mode::Chat,
            text,
            settings,
        } => backend
            .query_documents(text, session, settings)
            .await
            .map(|resp| Outcome::Answer {
                content: resp.answer,
                sources: resp.sources,
            }),
        RequestKind::Query {
            mode: Mode::Search,
            text,
            settings,
        } => backend
            .query_web(text, session, settings)
            .await
            .map(|resp| Outcome::Answer {
                content: resp.response,
                sources: resp.sources,
            }),
        RequestKind::Upload { files } => backend
            .upload_documents(files, session)
            .await
            .map(Outcome::Uploaded),
    };
    result.unwrap_or_else(Outcome::Failed)
}

/// Sequential driver pairing a [`Conversation`] with a [`Backend`].
pub struct ChatController<B: Backend + ?Sized> {
    conversation: Conversation,
    backend: Arc<B>,
    clear_remote_on_reset: bool,
}

impl<B: Backend + ?Sized> ChatController<B> {
    pub fn new(backend: Arc<B>, settings: Settings) -> Self {
        Self {
            conversation: Conversation::new(settings),
            backend,
            clear_remote_on_reset: false,
        }
    }

    /// Also drop the old session on the backend when resetting.
    pub fn with_remote_reset(mut self, enabled: bool) -> Self {
        self.clear_remote_on_reset = enabled;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Send a query in the current mode and merge the answer or error.
    pub async fn submit(&mut self, input: &str) -> Result<Completion, ChatError> {
        let pending = self.conversation.begin_submit(input)?;
        let outcome = dispatch(self.backend.as_ref(), &pending).await;
        Ok(self.conversation.complete(&pending.ticket, outcome))
    }

    /// Upload documents to the current session and merge the result.
    pub async fn upload(&mut self, files: Vec<UploadFile>) -> Result<Completion, ChatError> {
        let pending = self.conversation.begin_upload(files)?;
        let outcome = dispatch(self.backend.as_ref(), &pending).await;
        Ok(self.conversation.complete(&pending.ticket, outcome))
    }

    /// Reset the conversation; returns the replaced session.
    pub async fn reset(&mut self) -> SessionId {
        let previous = self.conversation.reset();
        if self.clear_remote_on_reset {
            clear_remote(self.backend.as_ref(), &previous).await;
        }
        previous
    }
}

/// Best-effort removal of a session's backend state.
pub async fn clear_remote<B: Backend + ?Sized>(backend: &B, session: &SessionId) {
    match backend.clear_session(session).await {
        Ok(resp) => info!(session = %session, message = %resp.message, "Remote session cleared"),
        Err(e) => warn!(session = %session, error = %e, "Failed to clear remote session"),
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

    use assistant_client::{
        ChatResponse, ClientError, HealthResponse, Operation, SearchResponse,
        SessionListResponse, SessionResponse, UploadResponse,
    };
    use assistant_core::{Role, Source};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Upload(Vec<String>, SessionId),
        Chat(String, SessionId, Settings),
        Search(String, SessionId, Settings),
        Clear(SessionId),
    }

    #[derive(Default)]
    struct MockBackend {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl MockBackend {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn error(operation: Operation) -> ClientError {
            ClientError::Status {
                operation,
                status: 500,
                detail: Some("backend exploded".to_string()),
            }
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn upload_documents(
            &self,
            files: &[UploadFile],
            session: &SessionId,
        ) -> Result<UploadResponse, ClientError> {
            let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
            self.calls
                .lock()
                .unwrap()
                .push(Call::Upload(names.clone(), session.clone()));
            if self.fail {
                return Err(Self::error(Operation::Upload));
            }
            Ok(UploadResponse {
                message: format!("Processed {} files", names.len()),
                processed_files: names,
                status: Some("success".to_string()),
                total_chunks: Some(4),
            })
        }

        async fn query_documents(
            &self,
            query: &str,
            session: &SessionId,
            settings: &Settings,
        ) -> Result<ChatResponse, ClientError> {
            self.calls.lock().unwrap().push(Call::Chat(
                query.to_string(),
                session.clone(),
                *settings,
            ));
            if self.fail {
                return Err(Self::error(Operation::Chat));
            }
            Ok(ChatResponse {
                answer: "I have no documents".to_string(),
                sources: vec![],
                session_id: Some(session.to_string()),
            })
        }

        async fn query_web(
            &self,
            query: &str,
            session: &SessionId,
            settings: &Settings,
        ) -> Result<SearchResponse, ClientError> {
            self.calls.lock().unwrap().push(Call::Search(
                query.to_string(),
                session.clone(),
                *settings,
            ));
            if self.fail {
                return Err(Self::error(Operation::Search));
            }
            Ok(SearchResponse {
                response: "Found it".to_string(),
                sources: vec![Source::Citation("Wikipedia".to_string())],
            })
        }

        async fn check_health(&self) -> Result<HealthResponse, ClientError> {
            Ok(HealthResponse {
                status: "healthy".to_string(),
                model: None,
                timestamp: None,
                extra: Default::default(),
            })
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
            self.calls.lock().unwrap().push(Call::Clear(session.clone()));
            Ok(SessionResponse {
                status: "success".to_string(),
                message: format!("Session {} cleared", session),
            })
        }
    }

    fn controller(backend: MockBackend) -> ChatController<MockBackend> {
        ChatController::new(Arc::new(backend), Settings::default())
    }

    #[tokio::test]
    async fn test_chat_mode_routes_to_documents() {
        let mut ctl = controller(MockBackend::default());
        let done = ctl.submit("What is the abstract?").await.unwrap();
        assert_eq!(done, Completion::Applied);

        let session = ctl.conversation().session().clone();
        assert_eq!(
            ctl.backend().calls(),
            vec![Call::Chat(
                "What is the abstract?".to_string(),
                session,
                Settings::default()
            )]
        );
        let msgs = ctl.conversation().messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[1].content, "I have no documents");
    }

    #[tokio::test]
    async fn test_search_mode_routes_to_web() {
        let mut ctl = controller(MockBackend::default());
        ctl.conversation_mut().set_mode(Mode::Search);
        ctl.submit("rust news").await.unwrap();

        assert!(matches!(ctl.backend().calls()[0], Call::Search(..)));
        let msgs = ctl.conversation().messages();
        assert_eq!(msgs[1].content, "Found it");
        assert_eq!(msgs[1].sources, vec![Source::Citation("Wikipedia".to_string())]);
    }

    #[tokio::test]
    async fn test_rejected_submit_issues_no_call() {
        let mut ctl = controller(MockBackend::default());
        assert!(matches!(ctl.submit("   ").await, Err(ChatError::EmptyInput)));
        assert!(matches!(ctl.upload(vec![]).await, Err(ChatError::NoFiles)));
        assert!(ctl.backend().calls().is_empty());
        assert!(ctl.conversation().messages().is_empty());
    }

    #[tokio::test]
    async fn test_settings_change_applies_to_next_request_only() {
        let backend = Arc::new(MockBackend::default());
        let mut conv = Conversation::default();

        let pending = conv.begin_submit("first").unwrap();
        conv.set_setting("temperature", "0.8").unwrap();
        let outcome = dispatch(backend.as_ref(), &pending).await;
        conv.complete(&pending.ticket, outcome);

        let pending = conv.begin_submit("second").unwrap();
        let outcome = dispatch(backend.as_ref(), &pending).await;
        conv.complete(&pending.ticket, outcome);

        let calls = backend.calls();
        match (&calls[0], &calls[1]) {
            (Call::Chat(_, _, first), Call::Chat(_, _, second)) => {
                assert_eq!(first.temperature, 0.3);
                assert_eq!(second.temperature, 0.8);
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_updates_file_list() {
        let mut ctl = controller(MockBackend::default());
        ctl.upload(vec![
            UploadFile::new("a.pdf", vec![1]),
            UploadFile::new("b.pdf", vec![2]),
        ])
        .await
        .unwrap();

        assert_eq!(ctl.conversation().uploaded_files(), ["a.pdf", "b.pdf"]);
        assert_eq!(ctl.conversation().messages()[0].content, "✅ Processed 2 files");
    }

    #[tokio::test]
    async fn test_search_failure_example() {
        let mut ctl = controller(MockBackend::failing());
        ctl.conversation_mut().set_mode(Mode::Search);
        let session = ctl.conversation().session().clone();

        ctl.submit("anything").await.unwrap();

        let msgs = ctl.conversation().messages();
        assert_eq!(msgs.len(), 2);
        assert!(msgs[1].content.starts_with("❌ Error: "));
        assert_eq!(msgs[1].content, "❌ Error: Failed to perform search");
        assert_eq!(
            msgs[1].diagnostic.as_ref().and_then(|d| d.detail.as_deref()),
            Some("backend exploded")
        );
        assert_eq!(ctl.conversation().session(), &session);
        assert_eq!(ctl.conversation().settings(), &Settings::default());
        assert!(!ctl.conversation().is_busy());
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_files_empty() {
        let mut ctl = controller(MockBackend::failing());
        ctl.upload(vec![UploadFile::new("a.pdf", vec![1])])
            .await
            .unwrap();
        assert!(ctl.conversation().uploaded_files().is_empty());
        assert_eq!(
            ctl.conversation().messages()[0].content,
            "❌ Error uploading files: Failed to upload PDFs"
        );
    }

    #[tokio::test]
    async fn test_reset_without_remote_clear() {
        let mut ctl = controller(MockBackend::default());
        ctl.submit("q").await.unwrap();
        let before = ctl.conversation().session().clone();

        let previous = ctl.reset().await;
        assert_eq!(previous, before);
        assert!(ctl.conversation().messages().is_empty());
        assert!(!ctl
            .backend()
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Clear(_))));
    }

    #[tokio::test]
    async fn test_reset_with_remote_clear() {
        let mut ctl = controller(MockBackend::default()).with_remote_reset(true);
        let before = ctl.conversation().session().clone();
        ctl.reset().await;
        assert_eq!(ctl.backend().calls(), vec![Call::Clear(before)]);
    }
}
