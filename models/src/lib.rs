//! Domain models for Deep Assist.
//!
//! Pure data structures shared by the session core and the front-ends.
//! Models carry no I/O and no business logic beyond validation.
//!
//! ## Architecture
//!
//! - **models** (this crate): Pure data structures
//! - **assist-core**: Protocol, transport and session logic operating on models
//! - **assist**: Terminal application wiring everything together

pub mod assist_message;
pub mod connection_info;
pub mod connection_status;
pub mod conversation;
pub mod error;

pub use assist_message::AssistMessage;
pub use connection_info::ConnectionInfo;
pub use connection_info::builder::ConnectionInfoBuilder;
pub use connection_status::ConnectionStatus;
pub use conversation::{
    ConversationData, ConversationErrorCode, ConversationResponseType, ConversationTarget,
    ConversationTargetType,
};
pub use error::model_error::ModelError;

pub use common::ErrorLocation;

#[cfg(test)]
mod tests;
