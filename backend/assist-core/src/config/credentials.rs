//! Access token lookup and connection parameters.
//!
//! The token never lives in `config.json`. It comes from the environment,
//! optionally seeded from a `.env` file.

use crate::config::AppConfig;
use crate::error::config::ConfigError;
use crate::{ACCESS_TOKEN_ENV, DEFAULT_CONFIG_HINT};

use common::{ErrorLocation, RedactedToken};
use models::{ConnectionInfo, ConnectionInfoBuilder};

use std::env;
use std::panic::Location;
use std::path::PathBuf;

use log::{info, warn};

/// Load `.env` from the working directory (or a parent), else from the
/// executable's directory. Existing variables are never overridden.
///
/// Returns the file that was loaded.
pub fn try_load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return Some(path);
    }

    let exe_path = env::current_exe().ok()?;
    let env_path = exe_path.parent()?.join(".env");
    if !env_path.exists() {
        return None;
    }

    match dotenvy::from_path(&env_path) {
        Ok(()) => {
            info!("Loaded .env from: {:?}", env_path);
            Some(env_path)
        }
        Err(e) => {
            warn!("Failed to parse .env at {:?}: {}", env_path, e);
            None
        }
    }
}

/// Read the access token from `HASS_TOKEN`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingValue`] if the variable is unset, blank or
/// not valid unicode.
pub fn access_token() -> Result<RedactedToken, ConfigError> {
    match env::var(ACCESS_TOKEN_ENV) {
        Ok(value) if !value.trim().is_empty() => Ok(RedactedToken::new(value.trim())),
        Ok(_) => Err(ConfigError::MissingValue {
            location: ErrorLocation::from(Location::caller()),
            field: ACCESS_TOKEN_ENV.to_string(),
            reason: format!("{ACCESS_TOKEN_ENV} is empty; {DEFAULT_CONFIG_HINT}"),
        }),
        Err(env::VarError::NotPresent) => Err(ConfigError::MissingValue {
            location: ErrorLocation::from(Location::caller()),
            field: ACCESS_TOKEN_ENV.to_string(),
            reason: DEFAULT_CONFIG_HINT.to_string(),
        }),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::MissingValue {
            location: ErrorLocation::from(Location::caller()),
            field: ACCESS_TOKEN_ENV.to_string(),
            reason: format!("{ACCESS_TOKEN_ENV} contains invalid unicode"),
        }),
    }
}

/// Combine the config file and the token into validated connection parameters.
///
/// # Errors
///
/// Returns [`ConfigError::MissingValue`] if `server.url` or
/// `server.assist_pipeline` is unset, and [`ConfigError::ValidationError`] if
/// the values are rejected.
pub fn connection_info(
    config: &AppConfig,
    token: RedactedToken,
) -> Result<ConnectionInfo, ConfigError> {
    let url = config
        .server
        .url
        .as_deref()
        .ok_or_else(|| ConfigError::MissingValue {
            location: ErrorLocation::from(Location::caller()),
            field: "server.url".to_string(),
            reason: "Set the Home Assistant base URL in config.json".to_string(),
        })?;

    let pipeline = config
        .server
        .assist_pipeline
        .as_deref()
        .ok_or_else(|| ConfigError::MissingValue {
            location: ErrorLocation::from(Location::caller()),
            field: "server.assist_pipeline".to_string(),
            reason: "Set the assist pipeline id in config.json".to_string(),
        })?;

    ConnectionInfoBuilder::default()
        .with_base_url(url)
        .with_access_token(token)
        .with_pipeline_id(pipeline)
        .build()
        .map_err(|e| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })
}
