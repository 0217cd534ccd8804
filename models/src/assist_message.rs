//! Transcript entries.

use crate::ConversationData;

use serde::{Deserialize, Serialize};

/// One entry in the conversation transcript.
///
/// The transcript is append-only; entries are never edited after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistMessage {
    pub content: String,
    pub is_user_message: bool,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ConversationData>,
    /// Pipeline (agent) that produced an assistant entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl AssistMessage {
    /// Text typed or spoken by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user_message: true,
            is_error: false,
            data: None,
            agent: None,
        }
    }

    /// Reply produced by an assist pipeline.
    pub fn assistant(
        content: impl Into<String>,
        data: Option<ConversationData>,
        agent: Option<String>,
    ) -> Self {
        Self {
            content: content.into(),
            is_user_message: false,
            is_error: false,
            data,
            agent,
        }
    }

    /// Locally generated failure notice (timeout, lost connection, server error).
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user_message: false,
            is_error: true,
            data: None,
            agent: None,
        }
    }

    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }
}
