//! WebSocket transport over `tokio-tungstenite`.

use crate::error::WsError;
use crate::transport::{
    LifecycleEvent, Transport, TransportConnection, TransportEvent, TransportPeer,
};

use common::ErrorLocation;

use std::panic::Location;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Production transport: one spawned task per connection.
///
/// The task connects, reports `Opened`, then pumps frames both ways until
/// the socket ends or the [`TransportConnection`] is dropped. Ping frames are
/// answered by tungstenite; binary frames are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &Url) -> TransportConnection {
        let (connection, peer) = TransportConnection::pair();
        tokio::spawn(run_connection(url.clone(), peer));
        connection
    }
}

async fn run_connection(url: Url, peer: TransportPeer) {
    let TransportPeer {
        events,
        mut outbound,
    } = peer;

    info!("Connecting to {}", url);

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let error = WsError::Connect {
                message: format!("{url}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            };
            let _ = events.send(TransportEvent::Lifecycle(failed(error))).await;
            return;
        }
    };

    if events
        .send(TransportEvent::Lifecycle(LifecycleEvent::Opened))
        .await
        .is_err()
    {
        debug!("Connection to {} released before it opened", url);
        return;
    }

    info!("WebSocket connected to {}", url);

    let (mut write, mut read) = stream.split();

    let terminal = loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(raw) => {
                    if let Err(e) = write.send(Message::Text(raw.into())).await {
                        break failed(WsError::Send {
                            message: e.to_string(),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                }
                None => {
                    debug!("Connection to {} released, closing socket", url);
                    let _ = write.close().await;
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!("<- {}", text.as_str());
                    if events
                        .send(TransportEvent::Message(text.as_str().to_owned()))
                        .await
                        .is_err()
                    {
                        let _ = write.close().await;
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Server is closing the connection: {:?}", frame);
                    if events
                        .send(TransportEvent::Lifecycle(LifecycleEvent::Closing))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!("Ignoring binary frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break failed(WsError::from(e)),
                None => {
                    info!("WebSocket to {} closed", url);
                    break LifecycleEvent::Closed;
                }
            },
        }
    };

    let _ = events.send(TransportEvent::Lifecycle(terminal)).await;
}

/// Log a transport error and turn it into the terminal lifecycle event.
pub(crate) fn failed(error: WsError) -> LifecycleEvent {
    error!("{error}");
    LifecycleEvent::Failed {
        reason: error.to_string(),
    }
}
