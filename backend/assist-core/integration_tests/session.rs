use crate::helpers::fake_transport::FakeTransport;
use crate::helpers::{TEST_ACCESS_TOKEN, TEST_PIPELINE_ID, WAIT, connection_info, wait_for};

use assist_core::session::state::{CONNECTION_LOST_TEXT, TIMED_OUT_TEXT};
use assist_core::transport::LifecycleEvent;
use assist_core::{AssistResponse, MessageOrigin, SessionHandle};

use models::{AssistMessage, ConnectionStatus};

use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

const BASE_URL: &str = "http://homeassistant.local:8123";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn intent_end(id: u64, speech: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "event",
        "event": {
            "type": "intent-end",
            "data": {
                "intent_output": {
                    "response": { "speech": { "plain": { "speech": speech } } },
                    "conversation_id": "conv-1"
                }
            },
            "timestamp": "t"
        }
    })
}

#[tokio::test]
async fn given_new_session_when_observing_connection_then_opens_realtime_endpoint() {
    // GIVEN: A session that has not connected
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    assert_eq!(session.status(), ConnectionStatus::NotStarted);

    // WHEN: The connection is observed
    session.observe_connection().await.unwrap();

    // THEN: The realtime endpoint is opened and the session is connecting
    let (url, _peer) = control.next_open().await;
    assert_eq!(url.as_str(), "ws://homeassistant.local:8123/api/websocket");
    let mut status = session.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Connecting).await;
}

/// **VALUE**: The handshake completes without the caller touching the token.
///
/// **WHY THIS MATTERS**: Every front-end only calls `observe_connection()`; if the
/// session does not answer `auth_required` on its own, nothing ever connects.
///
/// **BUG THIS CATCHES**: Would catch the auth frame missing, carrying the wrong
/// field name, or the session reporting `Opened` before `auth_ok`.
#[tokio::test]
async fn given_opened_socket_when_server_requires_auth_then_session_authenticates() {
    // GIVEN: A session with an opened socket
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    let mut status = session.watch_status();

    peer.lifecycle(LifecycleEvent::Opened).await;
    wait_for(&mut status, |s| *s == ConnectionStatus::Authenticating).await;

    // WHEN: The server asks for authentication
    peer.frame(json!({ "type": "auth_required", "ha_version": "2024.1.0" }))
        .await;

    // THEN: The token is sent and the session waits for auth_ok
    let auth = peer.next_sent().await;
    assert_eq!(
        auth,
        json!({ "type": "auth", "access_token": TEST_ACCESS_TOKEN })
    );
    assert_eq!(session.status(), ConnectionStatus::Authenticating);

    peer.frame(json!({ "type": "auth_ok", "ha_version": "2024.1.0" }))
        .await;
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;
}

#[tokio::test]
async fn given_rejected_token_when_authenticating_then_authentication_failed_and_released() {
    // GIVEN: A session mid-handshake
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.lifecycle(LifecycleEvent::Opened).await;

    // WHEN: The server rejects the token
    peer.frame(json!({ "type": "auth_invalid", "message": "Invalid access token" }))
        .await;

    // THEN: The failure is reported distinctly and the socket is let go
    let mut status = session.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::AuthenticationFailed).await;
    assert!(peer.is_released().await);
}

/// **VALUE**: A message typed while connecting is delivered after the handshake.
///
/// **BUG THIS CATCHES**: Would catch the run reaching the socket ahead of `auth`,
/// which Home Assistant rejects as a failed login.
#[tokio::test]
async fn given_message_sent_while_connecting_when_handshake_completes_then_auth_written_first() {
    // GIVEN: A session that has started connecting
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;

    // WHEN: The user types before the socket is even open, then the handshake runs
    let id = session
        .send_message("hi", MessageOrigin::Text)
        .await
        .unwrap();
    let auth = peer.authenticate().await;

    // THEN: The first frame is the auth frame, the run follows, and the session opens
    assert_eq!(auth["type"], "auth");
    let run = peer.next_sent().await;
    assert_eq!(run["type"], "assist_pipeline/run");
    assert_eq!(run["id"], id);
    let mut status = session.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;
    assert_eq!(session.responding(), 1);
}

/// **VALUE**: The user entry is visible as soon as `send_message` returns.
///
/// **BUG THIS CATCHES**: Would catch the acknowledgement being sent before the
/// transcript is published, so a UI reading right after `send_message` misses it.
#[tokio::test]
async fn given_opened_session_when_sending_message_then_transcript_updated_before_reply() {
    // GIVEN: An authenticated session
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;
    let mut status = session.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;

    // WHEN: A message is sent
    let id = session
        .send_message("turn on the kitchen light", MessageOrigin::Text)
        .await
        .unwrap();

    // THEN: It is already in the transcript and the run is on the wire
    assert_eq!(id, 1);
    assert_eq!(
        session.transcript(),
        vec![AssistMessage::user("turn on the kitchen light")]
    );
    assert_eq!(session.responding(), 1);

    let run = peer.next_sent().await;
    assert_eq!(run["type"], "assist_pipeline/run");
    assert_eq!(run["id"], 1);
    assert_eq!(run["input"]["text"], "turn on the kitchen light");
    assert_eq!(run["pipeline"], TEST_PIPELINE_ID);
    assert_eq!(run["conversation_id"], serde_json::Value::Null);
}

#[tokio::test]
async fn given_pending_request_when_intent_end_arrives_then_response_published() {
    // GIVEN: An authenticated session with one voice request in flight
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    let mut responses = session.subscribe_responses();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;
    let id = session
        .send_message("what time is it", MessageOrigin::Voice)
        .await
        .unwrap();
    peer.next_sent().await;

    // WHEN: The pipeline answers
    peer.frame(intent_end(id, "It is 10 AM")).await;

    // THEN: The reply is published for speech and recorded in the transcript
    let response = timeout(WAIT, responses.recv()).await.unwrap().unwrap();
    assert_eq!(
        response,
        AssistResponse {
            request_id: id,
            text: "It is 10 AM".to_string(),
            origin: MessageOrigin::Voice,
        }
    );

    let mut responding = session.watch_responding();
    wait_for(&mut responding, |n| *n == 0).await;
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, "It is 10 AM");
    assert_eq!(transcript[1].agent.as_deref(), Some(TEST_PIPELINE_ID));
}

#[tokio::test]
async fn given_answered_request_when_sending_follow_up_then_conversation_id_threaded() {
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;

    let first = session
        .send_message("lights on", MessageOrigin::Text)
        .await
        .unwrap();
    peer.next_sent().await;
    peer.frame(intent_end(first, "Done")).await;
    let mut responding = session.watch_responding();
    wait_for(&mut responding, |n| *n == 0).await;

    session
        .send_message("and off", MessageOrigin::Text)
        .await
        .unwrap();
    let run = peer.next_sent().await;

    assert_eq!(run["id"], 2);
    assert_eq!(run["conversation_id"], "conv-1");
}

/// **VALUE**: A server that never answers cannot leave the session "responding".
///
/// **BUG THIS CATCHES**: Would catch the actor not waking up for request deadlines
/// when no other input arrives.
#[tokio::test(start_paused = true)]
async fn given_unanswered_request_when_deadline_passes_then_error_entry_and_not_responding() {
    // GIVEN: An authenticated session with a request the server ignores
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;
    session
        .send_message("hello?", MessageOrigin::Text)
        .await
        .unwrap();
    peer.next_sent().await;
    assert_eq!(session.responding(), 1);

    // WHEN: The request deadline passes
    tokio::time::sleep(REQUEST_TIMEOUT + Duration::from_secs(1)).await;

    // THEN: The request is resolved with an error entry
    let mut responding = session.watch_responding();
    wait_for(&mut responding, |n| *n == 0).await;
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error(TIMED_OUT_TEXT))
    );
}

#[tokio::test]
async fn given_pending_request_when_transport_fails_then_failed_and_pending_cleared() {
    // GIVEN: An authenticated session with a request in flight
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;
    session
        .send_message("hello", MessageOrigin::Text)
        .await
        .unwrap();
    peer.next_sent().await;

    // WHEN: The transport fails
    peer.lifecycle(LifecycleEvent::Failed {
        reason: "connection reset".to_string(),
    })
    .await;

    // THEN: Status is Failed and the request is abandoned with one error entry
    let mut status = session.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Failed).await;
    assert_eq!(session.responding(), 0);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error(CONNECTION_LOST_TEXT))
    );
}

#[tokio::test]
async fn given_failed_connection_when_retrying_then_fresh_connection_opened() {
    // GIVEN: A session whose connection attempt failed
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, first) = control.next_open().await;
    first
        .lifecycle(LifecycleEvent::Failed {
            reason: "refused".to_string(),
        })
        .await;
    let mut status = session.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Failed).await;

    // WHEN: The user retries
    session.observe_connection().await.unwrap();

    // THEN: A second connection is opened and can authenticate
    let (_, mut second) = control.next_open().await;
    wait_for(&mut status, |s| *s == ConnectionStatus::Connecting).await;
    second.authenticate().await;
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;
}

#[tokio::test]
async fn given_live_connection_when_observing_again_then_no_second_connection() {
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;
    let mut status = session.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;

    session.observe_connection().await.unwrap();
    // Round-trip through the actor so the second command has been handled.
    session.send_message("ping", MessageOrigin::Text).await.unwrap();

    assert!(
        timeout(Duration::from_millis(200), control.next_open())
            .await
            .is_err()
    );
    assert_eq!(session.status(), ConnectionStatus::Opened);
}

/// **VALUE**: Dropping the last handle shuts the session down.
///
/// **BUG THIS CATCHES**: Would catch the actor task keeping the socket open after
/// the front-end that owned it is gone.
#[tokio::test]
async fn given_connected_session_when_last_handle_dropped_then_connection_released() {
    let (transport, mut control) = FakeTransport::new();
    let session =
        SessionHandle::spawn(connection_info(BASE_URL), REQUEST_TIMEOUT, transport).unwrap();
    session.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;
    let clone = session.clone();

    drop(session);
    drop(clone);

    assert!(peer.is_released().await);
}

#[tokio::test]
async fn given_non_http_base_url_when_spawning_then_invalid_url_error() {
    let (transport, _control) = FakeTransport::new();
    let mut info = connection_info(BASE_URL);
    info.base_url = "ftp://homeassistant.local".to_string();

    let result = SessionHandle::spawn(info, REQUEST_TIMEOUT, transport);

    assert!(result.is_err());
}
