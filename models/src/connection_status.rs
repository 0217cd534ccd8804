//! Connection status of an assist session.

use serde::{Deserialize, Serialize};

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Where an assist session is in its connection lifecycle.
///
/// Owned by the session state machine; front-ends only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    NotStarted,
    Connecting,
    Authenticating,
    Opened,
    Closing,
    Closed,
    Failed,
    AuthenticationFailed,
}

impl ConnectionStatus {
    /// The connection is gone and stays gone until a manual retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Closed
                | ConnectionStatus::Failed
                | ConnectionStatus::AuthenticationFailed
        )
    }

    /// `observe_connection()` opens a fresh connection from this status.
    pub fn can_retry(&self) -> bool {
        *self == ConnectionStatus::NotStarted || self.is_terminal()
    }

    /// Authenticated and ready for pipeline runs.
    pub fn is_connected(&self) -> bool {
        *self == ConnectionStatus::Opened
    }
}

impl Display for ConnectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let text = match self {
            ConnectionStatus::NotStarted => "Not started",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Authenticating => "Authenticating...",
            ConnectionStatus::Opened => "Connected",
            ConnectionStatus::Closing => "Closing...",
            ConnectionStatus::Closed => "Connection closed.",
            ConnectionStatus::Failed => "Failed to connect.",
            ConnectionStatus::AuthenticationFailed => {
                "Authentication failed. Check your access token."
            }
        };
        f.write_str(text)
    }
}
