pub mod config;
pub mod error;
pub mod protocol;
pub mod repository;
pub mod session;
pub mod transport;
pub mod view_model;

#[cfg(test)]
mod tests;

pub use repository::AssistRepository;
pub use session::{AssistResponse, MessageOrigin, RequestId, SessionHandle};
pub use view_model::ConversationViewModel;

/// Path of the realtime API relative to the instance base URL.
pub const WEBSOCKET_API_PATH: &str = "api/websocket";

/// First and last pipeline stage of a text run; speech stages run on the device.
pub const PIPELINE_STAGE_INTENT: &str = "intent";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding the long-lived access token.
pub const ACCESS_TOKEN_ENV: &str = "HASS_TOKEN";

pub const APP_DIR_NAME: &str = "deep-assist";

pub const DEFAULT_CONFIG_HINT: &str =
    const_format::concatcp!("set ", ACCESS_TOKEN_ENV, " in the environment or in a .env file");
