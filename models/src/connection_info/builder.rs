use crate::error::model_error::ModelError;
use crate::{ConnectionInfo, ErrorLocation};

use common::RedactedToken;

use std::panic::Location;

/// Builder for creating validated [`ConnectionInfo`] instances.
#[derive(Debug, Default)]
pub struct ConnectionInfoBuilder {
    base_url: Option<String>,
    access_token: Option<RedactedToken>,
    pipeline_id: Option<String>,
}

impl ConnectionInfoBuilder {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_access_token(mut self, token: RedactedToken) -> Self {
        self.access_token = Some(token);
        self
    }

    pub fn with_pipeline_id(mut self, pipeline_id: impl Into<String>) -> Self {
        self.pipeline_id = Some(pipeline_id.into());
        self
    }

    /// Build the ConnectionInfo with validation.
    ///
    /// A trailing `/` on the base URL is stripped.
    #[track_caller]
    pub fn build(self) -> Result<ConnectionInfo, ModelError> {
        let base_url = self.base_url.ok_or_else(|| ModelError::Validation {
            message: String::from("Base URL is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let base_url = base_url.trim().trim_end_matches('/').to_string();

        if base_url.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Base URL cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ModelError::Validation {
                message: format!("Invalid base URL format: {base_url}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let access_token = self.access_token.ok_or_else(|| ModelError::Validation {
            message: String::from("Access token is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if access_token.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Access token cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let pipeline_id = self.pipeline_id.ok_or_else(|| ModelError::Validation {
            message: String::from("Assist pipeline id is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if pipeline_id.trim().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Assist pipeline id cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(ConnectionInfo {
            base_url,
            access_token,
            pipeline_id,
        })
    }
}
