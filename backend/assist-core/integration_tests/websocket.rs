use crate::helpers::fake_home_assistant::{Behavior, CONVERSATION_ID, FakeHomeAssistant};
use crate::helpers::{
    TEST_ACCESS_TOKEN, TEST_PIPELINE_ID, WAIT, connection_info, connection_info_with_token,
    wait_for,
};

use assist_core::session::state::CONNECTION_LOST_TEXT;
use assist_core::transport::WsTransport;
use assist_core::{AssistRepository, ConversationViewModel};

use models::{AssistMessage, ConnectionStatus};

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn view_model(
    info: models::ConnectionInfo,
) -> (ConversationViewModel, mpsc::UnboundedReceiver<(String, bool)>) {
    let (spoken_tx, spoken_rx) = mpsc::unbounded_channel();
    let repository = AssistRepository::new(
        info,
        Duration::from_secs(30),
        Arc::new(WsTransport::new()),
        move |text: &str, voice: bool| {
            let _ = spoken_tx.send((text.to_string(), voice));
        },
    )
    .expect("Failed to create repository");

    (ConversationViewModel::new(repository), spoken_rx)
}

/// **VALUE**: Verifies the whole stack against a real WebSocket server.
///
/// **WHY THIS MATTERS**: Unit tests drive the state machine with typed values; this
/// is the only test where frames cross a socket, so it catches wire mismatches
/// between the codec and what a server actually sends.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The endpoint path or scheme mapping is wrong
/// - The auth frame is not sent after `auth_required`
/// - The run request misses a field the server needs
/// - Replies interleaved with `result`/`run-start`/`run-end` are not matched by id
/// - The speech callback is not invoked
#[tokio::test]
async fn given_home_assistant_when_sending_voice_message_then_reply_spoken_and_recorded() {
    // GIVEN: A fake Home Assistant and a connected view model
    let mut server = FakeHomeAssistant::start(TEST_ACCESS_TOKEN, Behavior::Answer).await;
    let (view_model, mut spoken) = view_model(connection_info(&server.base_url));
    view_model.observe_connection().await.unwrap();
    let mut status = view_model.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;

    // WHEN: A voice message is sent
    view_model.send_voice_message("hello").await.unwrap();

    // THEN: The server got a well-formed run request
    let run = server.next_run().await;
    assert_eq!(run["start_stage"], "intent");
    assert_eq!(run["end_stage"], "intent");
    assert_eq!(run["pipeline"], TEST_PIPELINE_ID);
    assert_eq!(run["conversation_id"], serde_json::Value::Null);

    // THEN: The reply is spoken and shown
    let reply = timeout(WAIT, spoken.recv()).await.unwrap().unwrap();
    assert_eq!(reply, ("You said: hello".to_string(), true));

    let mut responding = view_model.watch_responding();
    wait_for(&mut responding, |n| *n == 0).await;
    let transcript = view_model.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, "You said: hello");
    assert!(!transcript[1].is_error);
}

/// **VALUE**: Typing right after start-up still authenticates with a valid token.
///
/// **BUG THIS CATCHES**: Would catch an early message reaching the server during the
/// auth phase and being reported as "Authentication failed".
#[tokio::test]
async fn given_message_sent_before_auth_completes_when_connecting_then_opened_and_answered() {
    // GIVEN: A fake Home Assistant and a view model that has only just started connecting
    let mut server = FakeHomeAssistant::start(TEST_ACCESS_TOKEN, Behavior::Answer).await;
    let (view_model, mut spoken) = view_model(connection_info(&server.base_url));
    view_model.observe_connection().await.unwrap();

    // WHEN: A message is sent immediately
    view_model
        .send_voice_message("turn on the lights")
        .await
        .unwrap();

    // THEN: The session opens, the run reaches the server and the reply is spoken
    let mut status = view_model.watch_status();
    let final_status = wait_for(&mut status, |s| {
        *s == ConnectionStatus::Opened || s.is_terminal()
    })
    .await;
    assert_eq!(final_status, ConnectionStatus::Opened);

    let run = server.next_run().await;
    assert_eq!(run["input"]["text"], "turn on the lights");
    let reply = timeout(WAIT, spoken.recv()).await.unwrap().unwrap();
    assert_eq!(reply, ("You said: turn on the lights".to_string(), true));
}

#[tokio::test]
async fn given_answered_message_when_sending_follow_up_then_server_sees_conversation_id() {
    let mut server = FakeHomeAssistant::start(TEST_ACCESS_TOKEN, Behavior::Answer).await;
    let (view_model, mut spoken) = view_model(connection_info(&server.base_url));
    view_model.observe_connection().await.unwrap();
    let mut status = view_model.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;

    view_model.send_message("first").await.unwrap();
    server.next_run().await;
    timeout(WAIT, spoken.recv()).await.unwrap().unwrap();

    view_model.send_message("second").await.unwrap();
    let run = server.next_run().await;

    assert_eq!(run["conversation_id"], CONVERSATION_ID);
    assert_eq!(run["id"], 2);
}

#[tokio::test]
async fn given_wrong_token_when_connecting_then_authentication_failed() {
    // GIVEN: A server expecting a different token
    let server = FakeHomeAssistant::start(TEST_ACCESS_TOKEN, Behavior::Answer).await;
    let (view_model, _spoken) =
        view_model(connection_info_with_token(&server.base_url, "wrong-token"));

    // WHEN: Connecting
    view_model.observe_connection().await.unwrap();

    // THEN: Authentication failure is reported, not a generic failure
    let mut status = view_model.watch_status();
    let final_status = wait_for(&mut status, |s| s.is_terminal()).await;
    assert_eq!(final_status, ConnectionStatus::AuthenticationFailed);
}

#[tokio::test]
async fn given_nothing_listening_when_connecting_then_failed() {
    // GIVEN: A port with no server behind it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    let (view_model, _spoken) = view_model(connection_info(&format!("http://{address}")));

    // WHEN: Connecting
    view_model.observe_connection().await.unwrap();

    // THEN: The connection fails
    let mut status = view_model.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Failed).await;
}

#[tokio::test]
async fn given_server_that_closes_when_request_pending_then_closed_with_error_entry() {
    // GIVEN: A server that hangs up on the first run request
    let mut server = FakeHomeAssistant::start(TEST_ACCESS_TOKEN, Behavior::CloseOnRun).await;
    let (view_model, _spoken) = view_model(connection_info(&server.base_url));
    view_model.observe_connection().await.unwrap();
    let mut status = view_model.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;

    // WHEN: A message is sent
    view_model.send_message("hello").await.unwrap();
    server.next_run().await;

    // THEN: The session ends closed and the request is abandoned
    let final_status = wait_for(&mut status, |s| s.is_terminal()).await;
    assert_eq!(final_status, ConnectionStatus::Closed);
    assert_eq!(view_model.responding(), 0);
    assert_eq!(
        view_model.transcript().last(),
        Some(&AssistMessage::error(CONNECTION_LOST_TEXT))
    );
}

#[tokio::test]
async fn given_silent_server_when_request_acknowledged_then_still_responding() {
    let mut server = FakeHomeAssistant::start(TEST_ACCESS_TOKEN, Behavior::Silent).await;
    let (view_model, _spoken) = view_model(connection_info(&server.base_url));
    view_model.observe_connection().await.unwrap();
    let mut status = view_model.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;

    view_model.send_message("hello").await.unwrap();
    server.next_run().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(view_model.responding(), 1);
    assert_eq!(view_model.status(), ConnectionStatus::Opened);
}
