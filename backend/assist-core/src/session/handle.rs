use crate::error::{SessionError, WsError};
use crate::session::runtime::{SessionCommand, SessionPublishers, run_session};
use crate::session::state::SessionState;
use crate::session::{AssistResponse, MessageOrigin, RequestId};
use crate::transport::{Transport, websocket_url};

use common::ErrorLocation;
use models::{AssistMessage, ConnectionInfo, ConnectionStatus};

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

const COMMAND_BUFFER: usize = 32;
const RESPONSE_BUFFER: usize = 16;

/// Cloneable handle to a running session actor.
///
/// The actor stops (and releases its connection) when the last clone is
/// dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<ConnectionStatus>,
    transcript: watch::Receiver<Vec<AssistMessage>>,
    responding: watch::Receiver<usize>,
    responses: broadcast::Sender<AssistResponse>,
}

impl SessionHandle {
    /// Spawn a session actor onto the current Tokio runtime.
    ///
    /// The session starts in [`ConnectionStatus::NotStarted`]; nothing is
    /// opened until [`SessionHandle::observe_connection`].
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidUrl`] if the base URL has no WebSocket endpoint.
    pub fn spawn(
        info: ConnectionInfo,
        request_timeout: Duration,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, WsError> {
        let endpoint = websocket_url(&info.base_url)?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::NotStarted);
        let (transcript_tx, transcript_rx) = watch::channel(Vec::new());
        let (responding_tx, responding_rx) = watch::channel(0);
        let (responses_tx, _) = broadcast::channel(RESPONSE_BUFFER);

        let publishers = SessionPublishers {
            status: status_tx,
            transcript: transcript_tx,
            responding: responding_tx,
            responses: responses_tx.clone(),
        };

        let state = SessionState::new(info, request_timeout);
        tokio::spawn(run_session(
            state, endpoint, transport, command_rx, publishers,
        ));

        Ok(Self {
            commands: command_tx,
            status: status_rx,
            transcript: transcript_rx,
            responding: responding_rx,
            responses: responses_tx,
        })
    }

    /// Open the connection, or reopen it after it closed or failed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unavailable`] if the actor has stopped.
    pub async fn observe_connection(&self) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::ObserveConnection)
            .await
            .map_err(|e| SessionError::Unavailable {
                message: format!("Session actor stopped: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Send a message; returns once it is in the transcript, not when answered.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unavailable`] if the actor has stopped, or
    /// [`SessionError::AckLost`] if it stopped while handling the message.
    pub async fn send_message(
        &self,
        text: impl Into<String>,
        origin: MessageOrigin,
    ) -> Result<RequestId, SessionError> {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.commands
            .send(SessionCommand::SendMessage {
                text: text.into(),
                origin,
                ack: ack_tx,
            })
            .await
            .map_err(|e| SessionError::Unavailable {
                message: format!("Session actor stopped: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        ack_rx.await.map_err(|e| SessionError::AckLost {
            message: format!("Session actor dropped the acknowledgement: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn transcript(&self) -> Vec<AssistMessage> {
        self.transcript.borrow().clone()
    }

    pub fn watch_transcript(&self) -> watch::Receiver<Vec<AssistMessage>> {
        self.transcript.clone()
    }

    pub fn responding(&self) -> usize {
        *self.responding.borrow()
    }

    pub fn watch_responding(&self) -> watch::Receiver<usize> {
        self.responding.clone()
    }

    /// Replies to speak, in the order they arrive.
    pub fn subscribe_responses(&self) -> broadcast::Receiver<AssistResponse> {
        self.responses.subscribe()
    }
}
