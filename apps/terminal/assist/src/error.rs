use assist_core::error::{ConfigError, CoreError, SessionError, WsError};

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

/// Errors that end the terminal application.
///
/// Connection and pipeline problems never show up here; they are rendered as
/// status lines and transcript entries while the app keeps running.
#[derive(Debug, Error)]
pub enum AssistAppError {
    /// Error from this App
    #[error("Assist Error: {message} {location}")]
    Assist {
        message: String,
        location: ErrorLocation,
    },

    /// Missing or invalid configuration, including the access token
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Error from assist-core (endpoint, session actor)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for AssistAppError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        let message = error.to_string();
        let location = ErrorLocation::from(Location::caller());
        match error {
            CoreError::Config(_) => AssistAppError::Config { message, location },
            CoreError::Ws(_) | CoreError::Protocol(_) | CoreError::Session(_) => {
                AssistAppError::Core { message, location }
            }
        }
    }
}

impl From<ConfigError> for AssistAppError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        CoreError::from(error).into()
    }
}

impl From<WsError> for AssistAppError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        CoreError::from(error).into()
    }
}

impl From<SessionError> for AssistAppError {
    #[track_caller]
    fn from(error: SessionError) -> Self {
        CoreError::from(error).into()
    }
}

impl From<std::io::Error> for AssistAppError {
    #[track_caller]
    fn from(error: std::io::Error) -> Self {
        AssistAppError::Assist {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
