//! Everything a session needs to reach a Home Assistant instance.

pub mod builder;

use common::RedactedToken;

/// Validated connection parameters for one assist session.
///
/// Built through [`builder::ConnectionInfoBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// `http(s)://host[:port]` of the Home Assistant instance, no trailing slash.
    pub base_url: String,
    pub access_token: RedactedToken,
    /// Assist pipeline id sent with every run request.
    pub pipeline_id: String,
}
