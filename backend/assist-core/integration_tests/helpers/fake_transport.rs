use assist_core::transport::{
    LifecycleEvent, Transport, TransportConnection, TransportEvent, TransportPeer,
};

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use crate::helpers::WAIT;

/// Transport that hands every opened connection's driver side to the test.
pub struct FakeTransport {
    opened: mpsc::UnboundedSender<(Url, TransportPeer)>,
}

/// Test side of [`FakeTransport`].
pub struct FakeTransportControl {
    opened: mpsc::UnboundedReceiver<(Url, TransportPeer)>,
}

impl FakeTransport {
    pub fn new() -> (Arc<FakeTransport>, FakeTransportControl) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(FakeTransport { opened: tx }),
            FakeTransportControl { opened: rx },
        )
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &Url) -> TransportConnection {
        let (connection, peer) = TransportConnection::pair();
        let _ = self.opened.send((url.clone(), peer));
        connection
    }
}

impl FakeTransportControl {
    /// Next connection the session opened.
    pub async fn next_open(&mut self) -> (Url, FakePeer) {
        let (url, peer) = timeout(WAIT, self.opened.recv())
            .await
            .expect("Timed out waiting for the session to open a connection")
            .expect("Transport dropped");
        (url, FakePeer { peer })
    }
}

/// Plays the server side of one connection.
pub struct FakePeer {
    peer: TransportPeer,
}

impl FakePeer {
    pub async fn lifecycle(&self, event: LifecycleEvent) {
        self.peer
            .events
            .send(TransportEvent::Lifecycle(event))
            .await
            .expect("Session stopped reading");
    }

    pub async fn frame(&self, value: Value) {
        self.peer
            .events
            .send(TransportEvent::Message(value.to_string()))
            .await
            .expect("Session stopped reading");
    }

    /// Next frame the session wrote, parsed.
    pub async fn next_sent(&mut self) -> Value {
        let raw = timeout(WAIT, self.peer.outbound.recv())
            .await
            .expect("Timed out waiting for an outgoing frame")
            .expect("Connection released");
        serde_json::from_str(&raw).expect("Outgoing frame is not JSON")
    }

    /// `true` once the session has dropped its side of the connection.
    pub async fn is_released(&mut self) -> bool {
        matches!(timeout(WAIT, self.peer.outbound.recv()).await, Ok(None))
    }

    /// Run the handshake up to `auth_ok`.
    pub async fn authenticate(&mut self) -> Value {
        self.lifecycle(LifecycleEvent::Opened).await;
        self.frame(serde_json::json!({ "type": "auth_required", "ha_version": "2024.1.0" }))
            .await;
        let auth = self.next_sent().await;
        self.frame(serde_json::json!({ "type": "auth_ok", "ha_version": "2024.1.0" }))
            .await;
        auth
    }
}
