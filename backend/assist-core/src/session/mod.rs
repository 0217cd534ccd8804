//! Assist conversation session.
//!
//! [`state::SessionState`] is a plain state machine: every input returns the
//! effects to perform. [`runtime`] owns one state machine and one connection
//! inside a single task and publishes the results; [`SessionHandle`] is the
//! cloneable front door to that task.

pub mod handle;
pub mod runtime;
pub mod state;

pub use handle::SessionHandle;
pub use state::{SessionEffect, SessionState};

/// Correlation id of one pipeline run, unique within a session.
pub type RequestId = u64;

/// How the user produced a message. Decides whether the reply is spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageOrigin {
    Text,
    Voice,
}

impl MessageOrigin {
    pub fn from_voice(voice: bool) -> Self {
        if voice {
            MessageOrigin::Voice
        } else {
            MessageOrigin::Text
        }
    }

    pub fn is_voice(&self) -> bool {
        *self == MessageOrigin::Voice
    }
}

/// A reply to hand to speech synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistResponse {
    pub request_id: RequestId,
    pub text: String,
    pub origin: MessageOrigin,
}
