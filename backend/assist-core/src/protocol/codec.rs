//! Wire encoding and tolerant decoding of protocol messages.

use crate::error::ProtocolError;
use crate::protocol::events::PipelineEvent;
use crate::protocol::messages::SocketMessage;
use crate::protocol::{TYPE_FIELD, event_type, message_type};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Encode a message as a single JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode(message: &SocketMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a text frame.
///
/// Never fails: invalid JSON, a missing or unrecognized discriminator and
/// payloads that do not match their variant all yield [`SocketMessage::Unknown`].
pub fn decode(raw: &str) -> SocketMessage {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => decode_value(value),
        Err(e) => {
            warn!("Discarding frame that is not valid JSON: {e}");
            SocketMessage::Unknown
        }
    }
}

/// Decode an already parsed message object.
pub fn decode_value(value: Value) -> SocketMessage {
    let Some(kind) = discriminator(&value) else {
        warn!("Message without a '{TYPE_FIELD}' field");
        return SocketMessage::Unknown;
    };

    match kind.as_str() {
        message_type::AUTH_REQUIRED => decode_as(&kind, value, SocketMessage::AuthRequired),
        message_type::AUTH => decode_as(&kind, value, SocketMessage::Auth),
        message_type::AUTH_OK => decode_as(&kind, value, SocketMessage::AuthOk),
        message_type::AUTH_INVALID => decode_as(&kind, value, SocketMessage::AuthInvalid),
        message_type::PIPELINE_RUN => decode_as(&kind, value, SocketMessage::PipelineRun),
        message_type::RESULT => decode_as(&kind, value, SocketMessage::CommandResult),
        message_type::EVENT => decode_as(&kind, value, SocketMessage::Event),
        _ => {
            debug!("Unrecognized message type '{kind}'");
            SocketMessage::Unknown
        }
    }
}

/// Decode a pipeline event from the `event` field of an `event` message.
pub fn decode_event(raw: &str) -> PipelineEvent {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => decode_event_value(value),
        Err(e) => {
            warn!("Discarding event that is not valid JSON: {e}");
            PipelineEvent::Unknown
        }
    }
}

pub fn decode_event_value(value: Value) -> PipelineEvent {
    let Some(kind) = discriminator(&value) else {
        warn!("Pipeline event without a '{TYPE_FIELD}' field");
        return PipelineEvent::Unknown;
    };

    let decoded = match kind.as_str() {
        event_type::RUN_START => serde_json::from_value(value).map(PipelineEvent::RunStart),
        event_type::INTENT_END => serde_json::from_value(value).map(PipelineEvent::IntentEnd),
        event_type::RUN_END => serde_json::from_value(value).map(PipelineEvent::RunEnd),
        event_type::ERROR => serde_json::from_value(value).map(PipelineEvent::Error),
        _ => {
            debug!("Unrecognized pipeline event '{kind}'");
            return PipelineEvent::Unknown;
        }
    };

    decoded.unwrap_or_else(|e| {
        warn!("Malformed '{kind}' pipeline event: {e}");
        PipelineEvent::Unknown
    })
}

fn discriminator(value: &Value) -> Option<String> {
    value
        .get(TYPE_FIELD)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn decode_as<T, F>(kind: &str, value: Value, wrap: F) -> SocketMessage
where
    T: DeserializeOwned,
    F: FnOnce(T) -> SocketMessage,
{
    match serde_json::from_value::<T>(value) {
        Ok(payload) => wrap(payload),
        Err(e) => {
            warn!("Malformed '{kind}' message: {e}");
            SocketMessage::Unknown
        }
    }
}
