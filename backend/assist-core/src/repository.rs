//! Bridge between "say this" and the session, plus the speech callback.

use crate::error::{SessionError, WsError};
use crate::session::{MessageOrigin, RequestId, SessionHandle};
use crate::transport::Transport;

use models::ConnectionInfo;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::broadcast::error::RecvError;

/// Owns a session and forwards each reply to `on_response(text, is_voice)`.
///
/// Speech synthesis is the caller's job; the callback runs on a Tokio task,
/// so it should hand off anything slow.
#[derive(Debug, Clone)]
pub struct AssistRepository {
    session: SessionHandle,
}

impl AssistRepository {
    /// Spawn the session and its response pump onto the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidUrl`] if `info.base_url` has no WebSocket endpoint.
    pub fn new<F>(
        info: ConnectionInfo,
        request_timeout: Duration,
        transport: Arc<dyn Transport>,
        on_response: F,
    ) -> Result<Self, WsError>
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        let session = SessionHandle::spawn(info, request_timeout, transport)?;
        let mut responses = session.subscribe_responses();

        tokio::spawn(async move {
            loop {
                match responses.recv().await {
                    Ok(response) => {
                        debug!(
                            "Reply to request {} ({:?})",
                            response.request_id, response.origin
                        );
                        on_response(&response.text, response.origin.is_voice());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Response callback fell behind, skipped {} replies", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Self { session })
    }

    /// Send typed (`voice == false`) or dictated (`voice == true`) text.
    pub async fn send_text(
        &self,
        text: impl Into<String>,
        voice: bool,
    ) -> Result<RequestId, SessionError> {
        self.session
            .send_message(text, MessageOrigin::from_voice(voice))
            .await
    }

    pub async fn observe_connection(&self) -> Result<(), SessionError> {
        self.session.observe_connection().await
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }
}
