//! Home Assistant WebSocket message protocol.
//!
//! Every frame is a JSON object discriminated by its `type` field. Decoding
//! goes through a fixed dispatch table in [`codec`]; anything the table does
//! not recognize (or cannot parse) becomes `Unknown` so that newer servers
//! never break the session.
//!
//! Pipeline events nested inside `event` messages follow the same scheme
//! with their own table.

pub mod codec;
pub mod events;
pub mod messages;

pub use codec::{decode, decode_event, encode};
pub use events::{
    ErrorData, ErrorEvent, IntentEnd, IntentEndData, IntentOutput, IntentResponse, PipelineEvent,
    PlainSpeech, Speech, StageEvent,
};
pub use messages::{
    Auth, AuthInvalid, AuthOk, AuthRequired, CommandError, CommandResult, EventMessage,
    PipelineInput, PipelineRun, SocketMessage,
};

/// Name of the discriminator field on every message and event.
pub const TYPE_FIELD: &str = "type";

/// Discriminators of top-level messages.
pub mod message_type {
    pub const AUTH_REQUIRED: &str = "auth_required";
    pub const AUTH: &str = "auth";
    pub const AUTH_OK: &str = "auth_ok";
    pub const AUTH_INVALID: &str = "auth_invalid";
    pub const PIPELINE_RUN: &str = "assist_pipeline/run";
    pub const RESULT: &str = "result";
    pub const EVENT: &str = "event";
}

/// Discriminators of pipeline events carried by `event` messages.
pub mod event_type {
    pub const RUN_START: &str = "run-start";
    pub const INTENT_END: &str = "intent-end";
    pub const RUN_END: &str = "run-end";
    pub const ERROR: &str = "error";
}
