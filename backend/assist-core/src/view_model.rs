//! Observable conversation state for presentation layers.

use crate::error::SessionError;
use crate::repository::AssistRepository;
use crate::session::RequestId;

use models::{AssistMessage, ConnectionStatus};

use tokio::sync::watch;

/// What a conversation screen binds to.
///
/// Holds no UI state of its own, so it survives view recreation; clones
/// share one session.
#[derive(Debug, Clone)]
pub struct ConversationViewModel {
    repository: AssistRepository,
}

impl ConversationViewModel {
    pub fn new(repository: AssistRepository) -> Self {
        Self { repository }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.repository.session().status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.repository.session().watch_status()
    }

    pub fn transcript(&self) -> Vec<AssistMessage> {
        self.repository.session().transcript()
    }

    pub fn watch_transcript(&self) -> watch::Receiver<Vec<AssistMessage>> {
        self.repository.session().watch_transcript()
    }

    /// Number of unanswered requests.
    pub fn responding(&self) -> usize {
        self.repository.session().responding()
    }

    pub fn is_responding(&self) -> bool {
        self.responding() > 0
    }

    pub fn watch_responding(&self) -> watch::Receiver<usize> {
        self.repository.session().watch_responding()
    }

    pub async fn observe_connection(&self) -> Result<(), SessionError> {
        self.repository.observe_connection().await
    }

    pub async fn send_message(&self, text: impl Into<String>) -> Result<RequestId, SessionError> {
        self.repository.send_text(text, false).await
    }

    pub async fn send_voice_message(
        &self,
        text: impl Into<String>,
    ) -> Result<RequestId, SessionError> {
        self.repository.send_text(text, true).await
    }

    /// Reconnect after a failure. Does nothing while connected.
    pub async fn retry(&self) -> Result<(), SessionError> {
        self.repository.observe_connection().await
    }
}
