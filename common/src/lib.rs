//! Shared primitives for the Deep Assist workspace.
//!
//! Everything here is dependency-light and used by every other crate:
//!
//! - [`ErrorLocation`]: call-site capture attached to every error variant
//! - [`RedactedToken`]: the Home Assistant access token, never printed or serialized
//!
//! ## Architecture
//!
//! - **common** (this crate): error location + secret handling
//! - **models**: pure data passed between layers
//! - **assist-core**: protocol, transport and session logic
//! - **assist**: terminal front-end wiring everything together

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;
