use crate::helpers::fake_transport::{FakePeer, FakeTransport, FakeTransportControl};
use crate::helpers::{WAIT, connection_info, wait_for};

use assist_core::{AssistRepository, ConversationViewModel};

use models::ConnectionStatus;

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn view_model() -> (
    ConversationViewModel,
    FakeTransportControl,
    mpsc::UnboundedReceiver<(String, bool)>,
) {
    let (transport, control) = FakeTransport::new();
    let (spoken_tx, spoken_rx) = mpsc::unbounded_channel();
    let repository = AssistRepository::new(
        connection_info("http://homeassistant.local:8123"),
        Duration::from_secs(30),
        transport,
        move |text: &str, voice: bool| {
            let _ = spoken_tx.send((text.to_string(), voice));
        },
    )
    .unwrap();

    (ConversationViewModel::new(repository), control, spoken_rx)
}

async fn connected(view_model: &ConversationViewModel, control: &mut FakeTransportControl) -> FakePeer {
    view_model.observe_connection().await.unwrap();
    let (_, mut peer) = control.next_open().await;
    peer.authenticate().await;
    let mut status = view_model.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;
    peer
}

async fn answer(peer: &mut FakePeer, speech: &str) {
    let run = peer.next_sent().await;
    peer.frame(json!({
        "id": run["id"],
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
    }))
    .await;
}

/// **VALUE**: Spoken replies reach the speech callback with the right origin flag.
///
/// **WHY THIS MATTERS**: Front-ends only read aloud answers to voice input; a wrong
/// flag either talks over a typed conversation or stays silent after dictation.
///
/// **BUG THIS CATCHES**: Would catch the origin being lost between the request and
/// its reply, or the callback never being invoked.
#[tokio::test]
async fn given_voice_and_typed_messages_when_answered_then_callback_gets_origin_flag() {
    // GIVEN: A connected view model
    let (view_model, mut control, mut spoken) = view_model();
    let mut peer = connected(&view_model, &mut control).await;

    // WHEN: A voice message and then a typed message are answered
    view_model.send_voice_message("lights on").await.unwrap();
    answer(&mut peer, "Turned on the lights").await;
    let first = timeout(WAIT, spoken.recv()).await.unwrap().unwrap();

    view_model.send_message("lights off").await.unwrap();
    answer(&mut peer, "Turned off the lights").await;
    let second = timeout(WAIT, spoken.recv()).await.unwrap().unwrap();

    // THEN: The callback sees each reply with its origin
    assert_eq!(first, ("Turned on the lights".to_string(), true));
    assert_eq!(second, ("Turned off the lights".to_string(), false));
}

#[tokio::test]
async fn given_two_unanswered_messages_when_observing_then_responding_is_two() {
    // GIVEN: A connected view model
    let (view_model, mut control, _spoken) = view_model();
    let mut peer = connected(&view_model, &mut control).await;

    // WHEN: Two messages are sent before any reply
    view_model.send_message("one").await.unwrap();
    view_model.send_message("two").await.unwrap();

    // THEN: Both are outstanding, and each reply counts down by one
    assert_eq!(view_model.responding(), 2);
    assert!(view_model.is_responding());

    answer(&mut peer, "First").await;
    let mut responding = view_model.watch_responding();
    wait_for(&mut responding, |n| *n == 1).await;

    answer(&mut peer, "Second").await;
    wait_for(&mut responding, |n| *n == 0).await;
    assert!(!view_model.is_responding());
}

#[tokio::test]
async fn given_conversation_when_watching_transcript_then_entries_arrive_in_order() {
    let (view_model, mut control, _spoken) = view_model();
    let mut peer = connected(&view_model, &mut control).await;
    let mut transcript = view_model.watch_transcript();

    view_model.send_message("hello").await.unwrap();
    answer(&mut peer, "Hi there").await;

    let entries = wait_for(&mut transcript, |entries| entries.len() == 2).await;
    assert!(entries[0].is_user_message);
    assert_eq!(entries[0].content, "hello");
    assert!(!entries[1].is_user_message);
    assert_eq!(entries[1].content, "Hi there");
    assert_eq!(view_model.transcript(), entries);
}

/// **VALUE**: A view model clone (for example after a screen rotation) keeps the session.
///
/// **BUG THIS CATCHES**: Would catch a clone spawning a second session with an empty
/// transcript and a fresh connection.
#[tokio::test]
async fn given_cloned_view_model_when_reading_state_then_shares_session() {
    let (view_model, mut control, _spoken) = view_model();
    let _peer = connected(&view_model, &mut control).await;
    view_model.send_message("hello").await.unwrap();

    let recreated = view_model.clone();
    drop(view_model);

    assert_eq!(recreated.status(), ConnectionStatus::Opened);
    assert_eq!(recreated.transcript().len(), 1);
    assert_eq!(recreated.responding(), 1);
}

#[tokio::test]
async fn given_closed_connection_when_retrying_then_reconnects() {
    // GIVEN: A connection the server closed
    let (view_model, mut control, _spoken) = view_model();
    let peer = connected(&view_model, &mut control).await;
    peer.lifecycle(assist_core::transport::LifecycleEvent::Closing)
        .await;
    peer.lifecycle(assist_core::transport::LifecycleEvent::Closed)
        .await;
    let mut status = view_model.watch_status();
    wait_for(&mut status, |s| *s == ConnectionStatus::Closed).await;

    // WHEN: The user retries
    view_model.retry().await.unwrap();

    // THEN: The handshake runs on a new connection
    let (_, mut second) = control.next_open().await;
    second.authenticate().await;
    wait_for(&mut status, |s| *s == ConnectionStatus::Opened).await;
}
