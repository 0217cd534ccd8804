//! The session actor.
//!
//! One task owns the [`SessionState`] and the current connection. It waits on
//! user commands, inbound transport events and the earliest request deadline,
//! feeds each into the state machine, carries out the effects and publishes
//! whatever changed. All mutation happens here.

use crate::protocol;
use crate::session::state::{SessionEffect, SessionState};
use crate::session::{AssistResponse, MessageOrigin, RequestId};
use crate::transport::{LifecycleEvent, Transport, TransportConnection, TransportEvent};

use models::{AssistMessage, ConnectionStatus};

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use url::Url;

/// Requests from [`crate::SessionHandle`] to the actor.
#[derive(Debug)]
pub enum SessionCommand {
    ObserveConnection,
    SendMessage {
        text: String,
        origin: MessageOrigin,
        /// Answered once the user message is in the published transcript.
        ack: oneshot::Sender<RequestId>,
    },
}

/// Senders the actor publishes through.
#[derive(Debug)]
pub struct SessionPublishers {
    pub status: watch::Sender<ConnectionStatus>,
    pub transcript: watch::Sender<Vec<AssistMessage>>,
    pub responding: watch::Sender<usize>,
    pub responses: broadcast::Sender<AssistResponse>,
}

enum Input {
    Command(SessionCommand),
    Transport(Option<TransportEvent>),
    Deadline,
}

/// Run the actor until every command sender is dropped.
pub async fn run_session(
    mut state: SessionState,
    endpoint: Url,
    transport: Arc<dyn Transport>,
    mut commands: mpsc::Receiver<SessionCommand>,
    publishers: SessionPublishers,
) {
    info!("Session started for {}", endpoint);

    let mut connection: Option<TransportConnection> = None;

    loop {
        let deadline = state.next_deadline();

        let input = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => Input::Command(command),
                None => break,
            },
            event = next_event(&mut connection) => Input::Transport(event),
            _ = wait_until(deadline) => Input::Deadline,
        };

        let mut ack = None;
        let effects = match input {
            Input::Command(SessionCommand::ObserveConnection) => state.observe_connection(),
            Input::Command(SessionCommand::SendMessage {
                text,
                origin,
                ack: reply,
            }) => {
                let (id, effects) = state.send_message(text, origin, Instant::now());
                ack = Some((reply, id));
                effects
            }
            Input::Transport(Some(TransportEvent::Lifecycle(event))) => state.on_lifecycle(event),
            Input::Transport(Some(TransportEvent::Message(raw))) => state.on_frame(&raw),
            Input::Transport(None) => {
                warn!("Transport stopped without a closing event");
                connection = None;
                state.on_lifecycle(LifecycleEvent::Failed {
                    reason: "transport stopped".to_string(),
                })
            }
            Input::Deadline => state.on_deadline(Instant::now()),
        };

        for effect in effects {
            execute(
                effect,
                &mut connection,
                transport.as_ref(),
                &endpoint,
                &publishers,
            );
        }

        publish(&state, &publishers);

        if let Some((reply, id)) = ack {
            let _ = reply.send(id);
        }
    }

    info!("Session for {} stopped", endpoint);
}

async fn next_event(connection: &mut Option<TransportConnection>) -> Option<TransportEvent> {
    match connection {
        Some(connection) => connection.next_event().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn execute(
    effect: SessionEffect,
    connection: &mut Option<TransportConnection>,
    transport: &dyn Transport,
    endpoint: &Url,
    publishers: &SessionPublishers,
) {
    match effect {
        SessionEffect::OpenConnection => {
            if connection.take().is_some() {
                debug!("Releasing previous connection");
            }
            *connection = Some(transport.open(endpoint));
        }
        SessionEffect::CloseConnection => {
            if connection.take().is_some() {
                debug!("Connection released");
            }
        }
        SessionEffect::Send(message) => {
            let Some(current) = connection.as_ref() else {
                warn!("No connection, dropping {:?}", message);
                return;
            };

            debug!("-> {:?}", message);
            match protocol::encode(&message) {
                Ok(raw) => {
                    if let Err(e) = current.send(raw) {
                        warn!("Dropping outgoing message: {}", e);
                    }
                }
                Err(e) => error!("Failed to encode outgoing message: {}", e),
            }
        }
        SessionEffect::Respond(response) => {
            // No subscribers is fine; nobody wants speech.
            let _ = publishers.responses.send(response);
        }
    }
}

fn publish(state: &SessionState, publishers: &SessionPublishers) {
    let status = state.status();
    publishers.status.send_if_modified(|current| {
        if *current == status {
            return false;
        }
        *current = status;
        true
    });

    // Append-only, so a length change is the only change.
    let transcript = state.transcript();
    publishers.transcript.send_if_modified(|current| {
        if current.len() == transcript.len() {
            return false;
        }
        *current = transcript.to_vec();
        true
    });

    let responding = state.responding();
    publishers.responding.send_if_modified(|current| {
        if *current == responding {
            return false;
        }
        *current = responding;
        true
    });
}
