use crate::WEBSOCKET_API_PATH;
use crate::error::WsError;

use common::ErrorLocation;

use std::panic::Location;

use url::Url;

/// Realtime API endpoint for a Home Assistant base URL.
///
/// `http` maps to `ws` and `https` to `wss`; a path prefix on the base URL is
/// kept and a trailing slash is tolerated.
///
/// # Errors
///
/// Returns [`WsError::InvalidUrl`] if the URL does not parse or is not http(s).
#[track_caller]
pub fn websocket_url(base_url: &str) -> Result<Url, WsError> {
    let mut url = Url::parse(base_url.trim())?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(WsError::InvalidUrl {
                message: format!(
                    "Unsupported scheme '{other}' in {base_url} (expected http or https)"
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    url.set_scheme(scheme).map_err(|_| WsError::InvalidUrl {
        message: format!("Cannot use {scheme} for {base_url}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let path = format!("{}/{}", url.path().trim_end_matches('/'), WEBSOCKET_API_PATH);
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
