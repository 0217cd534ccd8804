use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failures turning a typed message into a wire frame.
///
/// Decoding has no error type: anything unreadable becomes `Unknown`.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}

impl From<serde_json::Error> for ProtocolError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        ProtocolError::Encode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
