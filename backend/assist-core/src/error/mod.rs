pub mod config;
pub mod protocol;
pub mod session;
pub mod ws;

pub use config::ConfigError;
pub use protocol::ProtocolError;
pub use session::SessionError;
pub use ws::WsError;

use thiserror::Error;

/// Any error surfaced by this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ws(#[from] WsError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
