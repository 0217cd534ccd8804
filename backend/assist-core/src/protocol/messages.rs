//! Top-level WebSocket messages.

use crate::PIPELINE_STAGE_INTENT;
use crate::protocol::codec;
use crate::protocol::events::PipelineEvent;

use common::RedactedToken;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A frame exchanged over the realtime API.
///
/// `Serialize` writes the `type` discriminator first. `Deserialize` never
/// fails on well-formed JSON: unrecognized or malformed messages become
/// [`SocketMessage::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SocketMessage {
    #[serde(rename = "auth_required")]
    AuthRequired(AuthRequired),

    #[serde(rename = "auth")]
    Auth(Auth),

    #[serde(rename = "auth_ok")]
    AuthOk(AuthOk),

    #[serde(rename = "auth_invalid")]
    AuthInvalid(AuthInvalid),

    #[serde(rename = "assist_pipeline/run")]
    PipelineRun(PipelineRun),

    #[serde(rename = "result")]
    CommandResult(CommandResult),

    #[serde(rename = "event")]
    Event(EventMessage),

    #[serde(rename = "unknown")]
    Unknown,
}

impl SocketMessage {
    /// Handshake reply carrying the access token.
    pub fn auth(token: &RedactedToken) -> Self {
        SocketMessage::Auth(Auth {
            access_token: token.expose().to_string(),
        })
    }

    /// Text-only pipeline run: starts and ends at the intent stage.
    pub fn pipeline_run(
        id: u64,
        text: impl Into<String>,
        pipeline_id: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Self {
        SocketMessage::PipelineRun(PipelineRun {
            id,
            start_stage: PIPELINE_STAGE_INTENT.to_string(),
            end_stage: PIPELINE_STAGE_INTENT.to_string(),
            input: PipelineInput { text: text.into() },
            pipeline_id: pipeline_id.into(),
            conversation_id,
        })
    }

    /// Correlation id, for the message kinds that carry one.
    pub fn id(&self) -> Option<u64> {
        match self {
            SocketMessage::PipelineRun(run) => Some(run.id),
            SocketMessage::CommandResult(result) => Some(result.id),
            SocketMessage::Event(event) => Some(event.id),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for SocketMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(codec::decode_value(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequired {
    #[serde(rename = "ha_version")]
    pub server_version: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub access_token: String,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOk {
    #[serde(rename = "ha_version")]
    pub server_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInvalid {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInput {
    pub text: String,
}

/// `assist_pipeline/run` request.
///
/// `conversation_id` is always written, as `null` for a fresh conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: u64,
    pub start_stage: String,
    pub end_stage: String,
    pub input: PipelineInput,
    #[serde(rename = "pipeline")]
    pub pipeline_id: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

/// Server acknowledgement of a command, sent before any pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

/// Pipeline progress for the run started with the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: u64,
    pub event: PipelineEvent,
}
