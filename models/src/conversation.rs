//! Structured data attached to an assist pipeline response.
//!
//! Enum-valued fields are decoded leniently: a value this client does not know
//! yet becomes `None` instead of failing the whole response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationResponseType {
    ActionDone,
    QueryAnswer,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationErrorCode {
    NoIntentMatch,
    NoValidTargets,
    FailedToHandle,
    TimerNotFound,
    MultipleTimersMatched,
    NoTimerSupport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationTargetType {
    Area,
    Floor,
    Device,
    Entity,
    Domain,
    DeviceClass,
    Custom,
}

/// Something the intent acted upon (an area, a device, an entity, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTarget {
    pub name: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_type: Option<ConversationTargetType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `response.data` of an intent result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationData {
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<ConversationErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<ConversationTarget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<Vec<ConversationTarget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<ConversationTarget>>,
}

impl ConversationData {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.targets.as_ref().is_none_or(Vec::is_empty)
            && self.success.as_ref().is_none_or(Vec::is_empty)
            && self.failed.as_ref().is_none_or(Vec::is_empty)
    }
}

/// Decode an optional value, mapping anything unparseable to `None`.
pub fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}
