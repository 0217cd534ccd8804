//! Duplex realtime connection to a Home Assistant instance.
//!
//! A [`Transport`] only opens connections. Each connection is a pair of
//! channels: an ordered inbound stream of [`TransportEvent`]s and an outbound
//! sender for raw text frames. Reconnection is the session's business, not
//! the transport's.

pub mod endpoint;
pub mod ws;

pub use endpoint::websocket_url;
pub use ws::WsTransport;

use crate::error::WsError;

use common::ErrorLocation;

use std::panic::Location;

use tokio::sync::mpsc;
use url::Url;

const EVENT_BUFFER: usize = 64;

/// Connection lifecycle notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Opened,
    /// The server sent a close frame; `Closed` follows.
    Closing,
    Closed,
    Failed { reason: String },
}

impl LifecycleEvent {
    /// No further events follow a terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleEvent::Closed | LifecycleEvent::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Lifecycle(LifecycleEvent),
    /// One text frame, exactly as received.
    Message(String),
}

/// Opens connections. Implementations spawn their I/O onto the current Tokio runtime.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &Url) -> TransportConnection;
}

/// Session-side half of one connection attempt.
///
/// Dropping it releases the socket.
#[derive(Debug)]
pub struct TransportConnection {
    events: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
}

/// Driver-side half of a connection: the I/O task (or a test) holds this.
#[derive(Debug)]
pub struct TransportPeer {
    pub events: mpsc::Sender<TransportEvent>,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl TransportConnection {
    /// Create a connected pair of halves.
    pub fn pair() -> (TransportConnection, TransportPeer) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        (
            TransportConnection {
                events: events_rx,
                outbound: outbound_tx,
            },
            TransportPeer {
                events: events_tx,
                outbound: outbound_rx,
            },
        )
    }

    /// Queue a text frame. Frames are written in the order they are queued.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Send`] if the connection is already gone.
    #[track_caller]
    pub fn send(&self, raw: String) -> Result<(), WsError> {
        self.outbound.send(raw).map_err(|_| WsError::Send {
            message: "Connection is closed".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Next inbound event, or `None` once the driver is gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}
