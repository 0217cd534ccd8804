//! Scripted Home Assistant WebSocket API on a loopback port.

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use crate::helpers::WAIT;

pub const SERVER_VERSION: &str = "2024.1.0";
pub const CONVERSATION_ID: &str = "01hconversation";

/// How the server answers `assist_pipeline/run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// `result`, `run-start`, `intent-end` ("You said: <text>"), `run-end`.
    Answer,
    /// Only the `result` acknowledgement.
    Silent,
    /// Close the socket instead of answering.
    CloseOnRun,
}

pub struct FakeHomeAssistant {
    pub base_url: String,
    runs: mpsc::UnboundedReceiver<Value>,
}

impl FakeHomeAssistant {
    /// Accept connections until the test ends.
    pub async fn start(expected_token: &'static str, behavior: Behavior) -> FakeHomeAssistant {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake server");
        let address = listener.local_addr().expect("No local address");
        let (runs_tx, runs_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, expected_token, behavior, runs_tx.clone()));
            }
        });

        FakeHomeAssistant {
            base_url: format!("http://{address}"),
            runs: runs_rx,
        }
    }

    /// Next `assist_pipeline/run` request the server received.
    pub async fn next_run(&mut self) -> Value {
        timeout(WAIT, self.runs.recv())
            .await
            .expect("Timed out waiting for a pipeline run")
            .expect("Fake server stopped")
    }
}

async fn serve(
    stream: TcpStream,
    expected_token: &'static str,
    behavior: Behavior,
    runs: mpsc::UnboundedSender<Value>,
) {
    let ws = accept_async(stream)
        .await
        .expect("WebSocket handshake failed");
    let (mut write, mut read) = ws.split();

    send(
        &mut write,
        json!({ "type": "auth_required", "ha_version": SERVER_VERSION }),
    )
    .await;

    let Some(auth) = next_json(&mut read).await else {
        return;
    };

    if auth["type"] != "auth" || auth["access_token"] != expected_token {
        send(
            &mut write,
            json!({ "type": "auth_invalid", "message": "Invalid access token or password" }),
        )
        .await;
        close_gracefully(&mut write, &mut read).await;
        return;
    }

    send(
        &mut write,
        json!({ "type": "auth_ok", "ha_version": SERVER_VERSION }),
    )
    .await;

    while let Some(request) = next_json(&mut read).await {
        if request["type"] != "assist_pipeline/run" {
            continue;
        }

        let id = request["id"].as_u64().expect("Run without numeric id");
        let text = request["input"]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let _ = runs.send(request);

        if behavior == Behavior::CloseOnRun {
            close_gracefully(&mut write, &mut read).await;
            return;
        }

        send(
            &mut write,
            json!({ "id": id, "type": "result", "success": true, "result": null }),
        )
        .await;

        if behavior == Behavior::Silent {
            continue;
        }

        send(
            &mut write,
            json!({
                "id": id,
                "type": "event",
                "event": { "type": "run-start", "data": { "pipeline": "01hpipeline" }, "timestamp": "t" }
            }),
        )
        .await;
        send(
            &mut write,
            json!({
                "id": id,
                "type": "event",
                "event": {
                    "type": "intent-end",
                    "data": {
                        "intent_output": {
                            "response": {
                                "speech": { "plain": { "speech": format!("You said: {text}"), "extra_data": null } },
                                "card": {},
                                "language": "en",
                                "response_type": "action_done",
                                "data": { "targets": [], "success": [], "failed": [] }
                            },
                            "conversation_id": CONVERSATION_ID
                        }
                    },
                    "timestamp": "t"
                }
            }),
        )
        .await;
        send(
            &mut write,
            json!({
                "id": id,
                "type": "event",
                "event": { "type": "run-end", "data": null, "timestamp": "t" }
            }),
        )
        .await;
    }
}

type Writer = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;

async fn send(write: &mut Writer, value: Value) {
    let _ = write.send(Message::Text(value.to_string().into())).await;
}

/// Send a close frame and wait for the client's reply before dropping the socket.
async fn close_gracefully(write: &mut Writer, read: &mut SplitStream<WebSocketStream<TcpStream>>) {
    let _ = write.close().await;
    let _ = timeout(WAIT, async { while read.next().await.is_some() {} }).await;
}

async fn next_json(read: &mut SplitStream<WebSocketStream<TcpStream>>) -> Option<Value> {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => return serde_json::from_str(text.as_str()).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}
