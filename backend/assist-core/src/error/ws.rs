use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as TungsteniteError;

#[derive(Debug, ThisError)]
pub enum WsError {
    #[error("Invalid URL Error: {message} {location}")]
    InvalidUrl {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },
}

impl From<url::ParseError> for WsError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        WsError::InvalidUrl {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TungsteniteError> for WsError {
    #[track_caller]
    fn from(error: TungsteniteError) -> Self {
        WsError::Read {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
