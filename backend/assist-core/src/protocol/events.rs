//! Assist pipeline events nested inside `event` messages.

use crate::protocol::codec;

use models::conversation::deserialize_lenient;
use models::{ConversationData, ConversationResponseType};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    #[serde(rename = "run-start")]
    RunStart(StageEvent),

    #[serde(rename = "intent-end")]
    IntentEnd(IntentEnd),

    #[serde(rename = "run-end")]
    RunEnd(StageEvent),

    #[serde(rename = "error")]
    Error(ErrorEvent),

    #[serde(rename = "unknown")]
    Unknown,
}

impl<'de> Deserialize<'de> for PipelineEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(codec::decode_event_value(value))
    }
}

/// Stage boundary whose payload this client does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentEnd {
    pub data: IntentEndData,
    #[serde(default)]
    pub timestamp: String,
}

impl IntentEnd {
    /// The plain-text answer to show and to speak.
    pub fn speech(&self) -> &str {
        &self.data.intent_output.response.speech.plain.speech
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.data.intent_output.conversation_id.as_deref()
    }

    /// The intent ran but the server reports it could not handle it.
    pub fn is_error(&self) -> bool {
        self.data.intent_output.response.response_type == Some(ConversationResponseType::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentEndData {
    pub intent_output: IntentOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentOutput {
    pub response: IntentResponse,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResponse {
    #[serde(default)]
    pub speech: Speech,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_type: Option<ConversationResponseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ConversationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Speech {
    #[serde(default)]
    pub plain: PlainSpeech,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlainSpeech {
    #[serde(default)]
    pub speech: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub data: ErrorData,
    #[serde(default)]
    pub timestamp: String,
}
