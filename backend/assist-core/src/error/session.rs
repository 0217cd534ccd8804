use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Errors crossing the session handle boundary.
///
/// Connection and protocol problems are never reported here; they show up
/// as a [`models::ConnectionStatus`] or as error entries in the transcript.
#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("Session Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Acknowledgement Lost Error: {message} {location}")]
    AckLost {
        message: String,
        location: ErrorLocation,
    },
}
