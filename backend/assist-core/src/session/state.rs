//! Connection status, handshake, request correlation and transcript.
//!
//! Nothing here performs I/O or reads the clock. Callers pass `now` in and
//! carry out the returned [`SessionEffect`]s in order.

use crate::protocol::{self, CommandResult, IntentEnd, PipelineEvent, SocketMessage};
use crate::session::{AssistResponse, MessageOrigin, RequestId};
use crate::transport::LifecycleEvent;

use models::{AssistMessage, ConnectionInfo, ConnectionStatus};

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

pub const TIMED_OUT_TEXT: &str = "The assistant did not answer in time.";
pub const CONNECTION_LOST_TEXT: &str = "Connection lost before the assistant answered.";
pub const NO_ANSWER_TEXT: &str = "The assistant finished without an answer.";
pub const REQUEST_FAILED_TEXT: &str = "The assistant could not process the request.";

/// How many timed-out requests are remembered for late replies.
pub const MAX_EXPIRED_REQUESTS: usize = 32;

/// Work the owner of a [`SessionState`] must carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Drop any current connection and open a fresh one.
    OpenConnection,
    /// Drop the current connection.
    CloseConnection,
    Send(SocketMessage),
    /// Speak this reply.
    Respond(AssistResponse),
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    origin: MessageOrigin,
    deadline: Instant,
}

#[derive(Debug)]
pub struct SessionState {
    info: ConnectionInfo,
    request_timeout: Duration,
    status: ConnectionStatus,
    transcript: Vec<AssistMessage>,
    conversation_id: Option<String>,
    next_request_id: RequestId,
    pending: BTreeMap<RequestId, PendingRequest>,
    /// Runs issued before `auth_ok`, written once the handshake completes.
    queued: BTreeMap<RequestId, SocketMessage>,
    /// Requests that hit their deadline; a late reply is still shown but not spoken.
    expired: BTreeSet<RequestId>,
    /// Highest request id whose answer set `conversation_id`.
    latest_answered: Option<RequestId>,
}

impl SessionState {
    pub fn new(info: ConnectionInfo, request_timeout: Duration) -> Self {
        Self {
            info,
            request_timeout,
            status: ConnectionStatus::NotStarted,
            transcript: Vec::new(),
            conversation_id: None,
            next_request_id: 1,
            pending: BTreeMap::new(),
            queued: BTreeMap::new(),
            expired: BTreeSet::new(),
            latest_answered: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn transcript(&self) -> &[AssistMessage] {
        &self.transcript
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Number of requests still waiting for an answer.
    pub fn responding(&self) -> usize {
        self.pending.len()
    }

    pub fn is_responding(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Earliest deadline among outstanding requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|request| request.deadline).min()
    }

    /// Start a connection, or restart one after it ended.
    ///
    /// Does nothing while a connection is live.
    pub fn observe_connection(&mut self) -> Vec<SessionEffect> {
        if !self.status.can_retry() {
            debug!("observe_connection ignored while {:?}", self.status);
            return Vec::new();
        }

        self.abandon_pending();
        self.transition(ConnectionStatus::Connecting);
        vec![SessionEffect::OpenConnection]
    }

    /// Record the user's message and issue a pipeline run for it.
    ///
    /// The message is appended to the transcript before anything is sent.
    /// Until the handshake completes the run is held back, since the server
    /// only accepts `auth` during the auth phase.
    pub fn send_message(
        &mut self,
        text: impl Into<String>,
        origin: MessageOrigin,
        now: Instant,
    ) -> (RequestId, Vec<SessionEffect>) {
        let text = text.into();
        let id = self.next_request_id;
        self.next_request_id += 1;

        self.transcript.push(AssistMessage::user(text.clone()));
        self.pending.insert(
            id,
            PendingRequest {
                origin,
                deadline: now + self.request_timeout,
            },
        );

        let run = SocketMessage::pipeline_run(
            id,
            text,
            self.info.pipeline_id.clone(),
            self.conversation_id.clone(),
        );

        if !self.status.is_connected() {
            info!("Holding request {} until connected ({:?})", id, self.status);
            self.queued.insert(id, run);
            return (id, Vec::new());
        }

        (id, vec![SessionEffect::Send(run)])
    }

    pub fn on_lifecycle(&mut self, event: LifecycleEvent) -> Vec<SessionEffect> {
        use ConnectionStatus as S;

        let next = match (self.status, &event) {
            (S::Connecting, LifecycleEvent::Opened) => S::Authenticating,
            (S::Connecting, LifecycleEvent::Closed) => S::Closed,
            (S::Connecting, LifecycleEvent::Failed { .. }) => S::Failed,
            (S::Authenticating | S::Opened, LifecycleEvent::Closing) => S::Closing,
            (S::Authenticating | S::Opened | S::Closing, LifecycleEvent::Closed) => S::Closed,
            (S::Authenticating | S::Opened | S::Closing, LifecycleEvent::Failed { .. }) => S::Failed,
            (status, event) => {
                debug!("Ignoring {:?} while {:?}", event, status);
                return Vec::new();
            }
        };

        if let LifecycleEvent::Failed { reason } = &event {
            warn!("Connection failed: {}", reason);
        }

        self.transition(next);

        if next.is_terminal() {
            self.abandon_pending();
            vec![SessionEffect::CloseConnection]
        } else {
            Vec::new()
        }
    }

    /// Handle one raw text frame from the server.
    pub fn on_frame(&mut self, raw: &str) -> Vec<SessionEffect> {
        self.on_message(protocol::decode(raw))
    }

    pub fn on_message(&mut self, message: SocketMessage) -> Vec<SessionEffect> {
        match (self.status, message) {
            (ConnectionStatus::Authenticating, SocketMessage::AuthRequired(required)) => {
                info!(
                    "Home Assistant {} requires authentication",
                    required.server_version
                );
                vec![SessionEffect::Send(SocketMessage::auth(
                    &self.info.access_token,
                ))]
            }
            (ConnectionStatus::Authenticating, SocketMessage::AuthOk(ok)) => {
                info!("Authenticated with Home Assistant {}", ok.server_version);
                self.transition(ConnectionStatus::Opened);
                self.flush_queued()
            }
            (ConnectionStatus::Authenticating, SocketMessage::AuthInvalid(invalid)) => {
                warn!("Authentication rejected: {}", invalid.message);
                self.transition(ConnectionStatus::AuthenticationFailed);
                self.abandon_pending();
                vec![SessionEffect::CloseConnection]
            }
            (_, SocketMessage::CommandResult(result)) => {
                self.on_result(result);
                Vec::new()
            }
            (_, SocketMessage::Event(message)) => self.on_event(message.id, message.event),
            (status, SocketMessage::Unknown) => {
                debug!("Ignoring unknown message while {:?}", status);
                Vec::new()
            }
            (status, other) => {
                warn!("Unexpected {:?} while {:?}", other, status);
                Vec::new()
            }
        }
    }

    /// Expire every request whose deadline is at or before `now`.
    pub fn on_deadline(&mut self, now: Instant) -> Vec<SessionEffect> {
        let due: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            self.pending.remove(&id);
            // A run that never went out cannot be answered late.
            if self.queued.remove(&id).is_none() {
                self.remember_expired(id);
            }
            warn!("Request {} timed out", id);
            self.transcript.push(AssistMessage::error(TIMED_OUT_TEXT));
        }

        Vec::new()
    }

    fn on_result(&mut self, result: CommandResult) {
        if result.success {
            debug!("Request {} accepted", result.id);
            return;
        }

        let text = result
            .error
            .map(|error| {
                warn!("Request {} rejected: {} {}", result.id, error.code, error.message);
                error.message
            })
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| REQUEST_FAILED_TEXT.to_string());

        self.fail_request(result.id, text);
    }

    fn on_event(&mut self, id: RequestId, event: PipelineEvent) -> Vec<SessionEffect> {
        match event {
            PipelineEvent::IntentEnd(end) => self.complete_request(id, end),
            PipelineEvent::Error(error) => {
                warn!(
                    "Pipeline error for request {}: {} {}",
                    id, error.data.code, error.data.message
                );
                let text = if error.data.message.trim().is_empty() {
                    REQUEST_FAILED_TEXT.to_string()
                } else {
                    error.data.message
                };
                self.fail_request(id, text);
                Vec::new()
            }
            PipelineEvent::RunEnd(_) => {
                if self.pending.contains_key(&id) {
                    self.fail_request(id, NO_ANSWER_TEXT.to_string());
                } else {
                    self.expired.remove(&id);
                    debug!("Run {} finished", id);
                }
                Vec::new()
            }
            PipelineEvent::RunStart(_) => {
                debug!("Run {} started", id);
                Vec::new()
            }
            PipelineEvent::Unknown => {
                debug!("Ignoring unknown pipeline event for request {}", id);
                Vec::new()
            }
        }
    }

    fn complete_request(&mut self, id: RequestId, end: IntentEnd) -> Vec<SessionEffect> {
        let pending = self.pending.remove(&id);
        let late = pending.is_none() && self.expired.remove(&id);

        if pending.is_none() && !late {
            warn!("Ignoring answer for unknown request {}", id);
            return Vec::new();
        }

        if self.latest_answered.is_none_or(|latest| id > latest) {
            self.latest_answered = Some(id);
            self.conversation_id = end.conversation_id().map(str::to_owned);
        } else {
            debug!("Keeping conversation of a newer answer over request {}", id);
        }

        let text = end.speech().to_string();
        let response = end
            .data
            .intent_output
            .response
            .data
            .clone()
            .filter(|data| !data.is_empty());
        self.transcript.push(
            AssistMessage::assistant(text.clone(), response, Some(self.info.pipeline_id.clone()))
                .with_error(end.is_error()),
        );

        match pending {
            Some(request) => vec![SessionEffect::Respond(AssistResponse {
                request_id: id,
                text,
                origin: request.origin,
            })],
            None => {
                info!("Late answer for request {} shown without speech", id);
                Vec::new()
            }
        }
    }

    fn fail_request(&mut self, id: RequestId, text: String) {
        self.queued.remove(&id);
        if self.pending.remove(&id).is_some() {
            self.transcript.push(AssistMessage::error(text));
        } else if self.expired.remove(&id) {
            debug!("Request {} failed after it timed out", id);
        } else {
            debug!("Ignoring failure for unknown request {}", id);
        }
    }

    /// Write held-back runs in id order.
    fn flush_queued(&mut self) -> Vec<SessionEffect> {
        let queued = std::mem::take(&mut self.queued);
        queued
            .into_iter()
            .filter(|(id, _)| self.pending.contains_key(id))
            .map(|(_, run)| SessionEffect::Send(run))
            .collect()
    }

    fn remember_expired(&mut self, id: RequestId) {
        self.expired.insert(id);
        while self.expired.len() > MAX_EXPIRED_REQUESTS {
            self.expired.pop_first();
        }
    }

    /// Drop every outstanding request with a single error entry.
    fn abandon_pending(&mut self) {
        self.queued.clear();
        self.expired.clear();
        if self.pending.is_empty() {
            return;
        }

        warn!("Abandoning {} unanswered request(s)", self.pending.len());
        self.pending.clear();
        self.transcript.push(AssistMessage::error(CONNECTION_LOST_TEXT));
    }

    fn transition(&mut self, next: ConnectionStatus) {
        info!("Connection status: {:?} -> {:?}", self.status, next);
        self.status = next;
    }
}
