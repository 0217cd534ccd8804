use crate::protocol::{self, Auth, AuthInvalid, AuthOk, AuthRequired, SocketMessage};
use crate::session::state::{
    CONNECTION_LOST_TEXT, MAX_EXPIRED_REQUESTS, NO_ANSWER_TEXT, SessionEffect, SessionState,
    TIMED_OUT_TEXT,
};
use crate::session::{AssistResponse, MessageOrigin};
use crate::transport::LifecycleEvent;

use common::RedactedToken;
use models::{AssistMessage, ConnectionInfo, ConnectionInfoBuilder, ConnectionStatus};

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(30);

fn info() -> ConnectionInfo {
    ConnectionInfoBuilder::default()
        .with_base_url("http://homeassistant.local:8123")
        .with_access_token(RedactedToken::new("token-123"))
        .with_pipeline_id("pipeline-1")
        .build()
        .unwrap()
}

fn new_session() -> SessionState {
    SessionState::new(info(), TIMEOUT)
}

fn opened_session() -> SessionState {
    let mut session = new_session();
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);
    session.on_message(auth_ok());
    assert_eq!(session.status(), ConnectionStatus::Opened);
    session
}

fn auth_ok() -> SocketMessage {
    SocketMessage::AuthOk(AuthOk {
        server_version: "2024.1.0".to_string(),
    })
}

fn intent_end(id: u64, conversation_id: Option<&str>, speech: &str) -> String {
    json!({
        "id": id,
        "type": "event",
        "event": {
            "type": "intent-end",
            "data": {
                "intent_output": {
                    "response": {
                        "speech": { "plain": { "speech": speech } },
                        "response_type": "action_done"
                    },
                    "conversation_id": conversation_id
                }
            },
            "timestamp": "2024-01-01T00:00:00+00:00"
        }
    })
    .to_string()
}

fn run_end(id: u64) -> String {
    json!({
        "id": id,
        "type": "event",
        "event": { "type": "run-end", "data": null, "timestamp": "t" }
    })
    .to_string()
}

fn sent_run(effects: &[SessionEffect]) -> &protocol::PipelineRun {
    match effects {
        [SessionEffect::Send(SocketMessage::PipelineRun(run))] => run,
        other => panic!("expected a single pipeline run, got {other:?}"),
    }
}

// ============================================
// CONNECTION LIFECYCLE
// ============================================

#[test]
fn given_not_started_when_observing_connection_then_connecting_and_opens() {
    let mut session = new_session();

    let effects = session.observe_connection();

    assert_eq!(session.status(), ConnectionStatus::Connecting);
    assert_eq!(effects, vec![SessionEffect::OpenConnection]);
}

#[test]
fn given_opened_when_observing_connection_again_then_nothing_happens() {
    let mut session = opened_session();

    let effects = session.observe_connection();

    assert!(effects.is_empty());
    assert_eq!(session.status(), ConnectionStatus::Opened);
}

/// **VALUE**: The handshake runs without any caller involvement.
///
/// **BUG THIS CATCHES**: Would catch the session waiting for the UI to supply the
/// token, or answering `auth_required` before the socket is authenticating.
#[test]
fn given_opened_socket_when_auth_required_then_sends_auth_and_stays_authenticating() {
    let mut session = new_session();
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);

    let effects = session.on_frame(r#"{"type":"auth_required","ha_version":"2024.1"}"#);

    assert_eq!(session.status(), ConnectionStatus::Authenticating);
    assert_eq!(
        effects,
        vec![SessionEffect::Send(SocketMessage::Auth(Auth {
            access_token: "token-123".to_string()
        }))]
    );
}

#[test]
fn given_authenticating_when_auth_ok_then_opened() {
    let mut session = new_session();
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);

    session.on_message(auth_ok());

    assert_eq!(session.status(), ConnectionStatus::Opened);
}

#[test]
fn given_authenticating_when_auth_invalid_then_authentication_failed_and_closes() {
    let mut session = new_session();
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);

    let effects = session.on_message(SocketMessage::AuthInvalid(AuthInvalid {
        message: "Invalid password".to_string(),
    }));

    assert_eq!(session.status(), ConnectionStatus::AuthenticationFailed);
    assert_eq!(effects, vec![SessionEffect::CloseConnection]);
}

/// **VALUE**: No input can skip the handshake.
///
/// **BUG THIS CATCHES**: Would catch a stray `auth_ok` or `Opened` event moving a
/// session that never connected straight to `Opened`.
#[test]
fn given_not_started_when_receiving_any_input_then_status_never_changes() {
    let mut session = new_session();

    session.on_message(auth_ok());
    session.on_lifecycle(LifecycleEvent::Opened);
    session.on_lifecycle(LifecycleEvent::Closed);
    session.on_frame(r#"{"type":"auth_required","ha_version":"1"}"#);

    assert_eq!(session.status(), ConnectionStatus::NotStarted);
}

#[test]
fn given_opened_when_auth_messages_arrive_then_they_are_ignored() {
    let mut session = opened_session();

    let effects = session.on_message(SocketMessage::AuthRequired(AuthRequired {
        server_version: "1".to_string(),
    }));
    session.on_message(SocketMessage::AuthInvalid(AuthInvalid {
        message: "late".to_string(),
    }));

    assert!(effects.is_empty());
    assert_eq!(session.status(), ConnectionStatus::Opened);
}

#[test]
fn given_each_live_status_when_transport_events_arrive_then_follows_transition_table() {
    use ConnectionStatus::*;

    let failed = || LifecycleEvent::Failed {
        reason: "reset".to_string(),
    };

    // (inputs after observe_connection, expected status)
    let cases: Vec<(Vec<LifecycleEvent>, ConnectionStatus)> = vec![
        (vec![failed()], Failed),
        (vec![LifecycleEvent::Closed], Closed),
        (vec![LifecycleEvent::Closing], Connecting),
        (vec![LifecycleEvent::Opened], Authenticating),
        (vec![LifecycleEvent::Opened, LifecycleEvent::Closing], Closing),
        (vec![LifecycleEvent::Opened, LifecycleEvent::Closed], Closed),
        (vec![LifecycleEvent::Opened, failed()], Failed),
        (
            vec![
                LifecycleEvent::Opened,
                LifecycleEvent::Closing,
                LifecycleEvent::Closed,
            ],
            Closed,
        ),
        (
            vec![LifecycleEvent::Opened, LifecycleEvent::Closing, failed()],
            Failed,
        ),
        (
            vec![LifecycleEvent::Opened, LifecycleEvent::Opened],
            Authenticating,
        ),
    ];

    for (events, expected) in cases {
        let mut session = new_session();
        session.observe_connection();
        for event in events.clone() {
            session.on_lifecycle(event);
        }
        assert_eq!(session.status(), expected, "after {events:?}");
    }
}

#[test]
fn given_opened_when_server_closes_then_closing_then_closed() {
    let mut session = opened_session();

    session.on_lifecycle(LifecycleEvent::Closing);
    assert_eq!(session.status(), ConnectionStatus::Closing);

    let effects = session.on_lifecycle(LifecycleEvent::Closed);
    assert_eq!(session.status(), ConnectionStatus::Closed);
    assert_eq!(effects, vec![SessionEffect::CloseConnection]);
}

#[test]
fn given_terminal_status_when_observing_connection_then_retries() {
    let mut session = opened_session();
    session.on_lifecycle(LifecycleEvent::Failed {
        reason: "reset".to_string(),
    });

    let effects = session.observe_connection();

    assert_eq!(session.status(), ConnectionStatus::Connecting);
    assert_eq!(effects, vec![SessionEffect::OpenConnection]);
}

#[test]
fn given_authentication_failed_when_retrying_then_handshake_runs_again() {
    let mut session = new_session();
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);
    session.on_message(SocketMessage::AuthInvalid(AuthInvalid {
        message: "bad".to_string(),
    }));

    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);
    let effects = session.on_frame(r#"{"type":"auth_required","ha_version":"1"}"#);

    assert!(matches!(
        effects.as_slice(),
        [SessionEffect::Send(SocketMessage::Auth(_))]
    ));
}

// ============================================
// REQUESTS AND RESPONSES
// ============================================

/// **VALUE**: The user sees their own message immediately.
///
/// **BUG THIS CATCHES**: Would catch the user entry being added only after the
/// server answers, which makes slow pipelines look like lost input.
#[test]
fn given_opened_when_sending_message_then_user_entry_appended_before_any_reply() {
    let mut session = opened_session();

    let (id, effects) = session.send_message("hello", MessageOrigin::Text, Instant::now());

    assert_eq!(id, 1);
    assert_eq!(session.transcript(), &[AssistMessage::user("hello")]);
    assert_eq!(session.responding(), 1);

    let run = sent_run(&effects);
    assert_eq!(run.id, 1);
    assert_eq!(run.input.text, "hello");
    assert_eq!(run.pipeline_id, "pipeline-1");
    assert_eq!(run.start_stage, "intent");
    assert_eq!(run.end_stage, "intent");
    assert_eq!(run.conversation_id, None);
}

#[test]
fn given_sequential_sends_when_allocating_ids_then_ids_increase_from_one() {
    let mut session = opened_session();
    let now = Instant::now();

    let ids: Vec<u64> = (0..3)
        .map(|i| session.send_message(format!("m{i}"), MessageOrigin::Text, now).0)
        .collect();

    assert_eq!(ids, vec![1, 2, 3]);
}

/// **VALUE**: A single answer updates the transcript, the conversation and speech.
///
/// **BUG THIS CATCHES**: Would catch the conversation id not being threaded into
/// the next run, which makes every follow-up question lose context.
#[test]
fn given_pending_request_when_intent_end_arrives_then_reply_recorded_and_spoken() {
    let mut session = opened_session();
    let (id, _) = session.send_message("lights on", MessageOrigin::Voice, Instant::now());

    let effects = session.on_frame(&intent_end(id, Some("abc"), "Done"));

    assert_eq!(session.conversation_id(), Some("abc"));
    assert_eq!(session.responding(), 0);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::assistant(
            "Done",
            None,
            Some("pipeline-1".to_string())
        ))
    );
    assert_eq!(
        effects,
        vec![SessionEffect::Respond(AssistResponse {
            request_id: id,
            text: "Done".to_string(),
            origin: MessageOrigin::Voice,
        })]
    );

    let (_, effects) = session.send_message("and off", MessageOrigin::Text, Instant::now());
    assert_eq!(sent_run(&effects).conversation_id.as_deref(), Some("abc"));
}

#[test]
fn given_two_sends_when_each_answered_then_responding_counts_down() {
    let mut session = opened_session();
    let now = Instant::now();
    let (first, _) = session.send_message("one", MessageOrigin::Text, now);
    let (second, _) = session.send_message("two", MessageOrigin::Text, now);
    assert_eq!(session.responding(), 2);

    session.on_frame(&intent_end(second, Some("c"), "Two"));
    assert_eq!(session.responding(), 1);
    assert!(session.is_responding());

    session.on_frame(&intent_end(first, Some("c"), "One"));
    assert_eq!(session.responding(), 0);
    assert!(!session.is_responding());
}

#[test]
fn given_error_response_type_when_intent_end_arrives_then_entry_marked_error() {
    let mut session = opened_session();
    let (id, _) = session.send_message("gibberish", MessageOrigin::Text, Instant::now());
    let raw = json!({
        "id": id,
        "type": "event",
        "event": {
            "type": "intent-end",
            "data": {
                "intent_output": {
                    "response": {
                        "speech": { "plain": { "speech": "Sorry, I couldn't understand that" } },
                        "response_type": "error",
                        "data": { "code": "no_intent_match" }
                    },
                    "conversation_id": "abc"
                }
            },
            "timestamp": "t"
        }
    })
    .to_string();

    session.on_frame(&raw);

    let last = session.transcript().last().unwrap();
    assert!(last.is_error);
    assert!(!last.is_user_message);
    assert_eq!(last.content, "Sorry, I couldn't understand that");
}

#[test]
fn given_answer_for_never_issued_id_when_received_then_ignored() {
    let mut session = opened_session();
    session.send_message("hello", MessageOrigin::Text, Instant::now());

    let effects = session.on_frame(&intent_end(99, Some("zzz"), "Stray"));

    assert!(effects.is_empty());
    assert_eq!(session.responding(), 1);
    assert_eq!(session.conversation_id(), None);
    assert_eq!(session.transcript().len(), 1);
}

#[test]
fn given_answered_request_when_duplicate_answer_arrives_then_ignored() {
    let mut session = opened_session();
    let (id, _) = session.send_message("hello", MessageOrigin::Text, Instant::now());
    session.on_frame(&intent_end(id, Some("abc"), "Hi"));

    let effects = session.on_frame(&intent_end(id, Some("abc"), "Hi"));

    assert!(effects.is_empty());
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.responding(), 0);
}

#[test]
fn given_pending_request_when_result_fails_then_error_entry_with_server_message() {
    let mut session = opened_session();
    let (id, _) = session.send_message("hello", MessageOrigin::Text, Instant::now());
    let raw = json!({
        "id": id,
        "type": "result",
        "success": false,
        "error": { "code": "pipeline-not-found", "message": "Pipeline not found" }
    })
    .to_string();

    let effects = session.on_frame(&raw);

    assert!(effects.is_empty());
    assert_eq!(session.responding(), 0);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error("Pipeline not found"))
    );
}

#[test]
fn given_pending_request_when_result_succeeds_then_still_responding() {
    let mut session = opened_session();
    let (id, _) = session.send_message("hello", MessageOrigin::Text, Instant::now());

    session.on_frame(&json!({ "id": id, "type": "result", "success": true, "result": null }).to_string());

    assert_eq!(session.responding(), 1);
    assert_eq!(session.transcript().len(), 1);
}

#[test]
fn given_pending_request_when_pipeline_error_event_then_error_entry_and_resolved() {
    let mut session = opened_session();
    let (id, _) = session.send_message("hello", MessageOrigin::Voice, Instant::now());
    let raw = json!({
        "id": id,
        "type": "event",
        "event": {
            "type": "error",
            "data": { "code": "intent-failed", "message": "Unexpected error during intent recognition" },
            "timestamp": "t"
        }
    })
    .to_string();

    let effects = session.on_frame(&raw);

    assert!(effects.is_empty(), "errors are never spoken");
    assert_eq!(session.responding(), 0);
    let last = session.transcript().last().unwrap();
    assert!(last.is_error);
    assert_eq!(last.content, "Unexpected error during intent recognition");
}

#[test]
fn given_pending_request_when_run_ends_without_answer_then_error_entry() {
    let mut session = opened_session();
    let (id, _) = session.send_message("hello", MessageOrigin::Text, Instant::now());

    session.on_frame(&run_end(id));

    assert_eq!(session.responding(), 0);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error(NO_ANSWER_TEXT))
    );
}

#[test]
fn given_answered_request_when_run_ends_then_nothing_added() {
    let mut session = opened_session();
    let (id, _) = session.send_message("hello", MessageOrigin::Text, Instant::now());
    session.on_frame(&intent_end(id, Some("abc"), "Hi"));

    session.on_frame(&run_end(id));

    assert_eq!(session.transcript().len(), 2);
    assert!(!session.transcript()[1].is_error);
}

// ============================================
// DEADLINES AND CONNECTION LOSS
// ============================================

#[test]
fn given_pending_requests_when_asking_next_deadline_then_returns_earliest() {
    let mut session = opened_session();
    let now = Instant::now();
    session.send_message("late", MessageOrigin::Text, now + Duration::from_secs(5));
    session.send_message("early", MessageOrigin::Text, now);

    assert_eq!(session.next_deadline(), Some(now + TIMEOUT));
}

#[test]
fn given_no_pending_requests_when_asking_next_deadline_then_none() {
    assert_eq!(opened_session().next_deadline(), None);
}

/// **VALUE**: A silent server cannot leave the UI "responding" forever.
///
/// **BUG THIS CATCHES**: Would catch a request that never gets an answer keeping
/// the counter above zero for the rest of the session.
#[test]
fn given_pending_request_when_deadline_passes_then_error_entry_and_resolved() {
    let mut session = opened_session();
    let now = Instant::now();
    session.send_message("hello", MessageOrigin::Text, now);

    session.on_deadline(now + TIMEOUT - Duration::from_millis(1));
    assert_eq!(session.responding(), 1);

    session.on_deadline(now + TIMEOUT);
    assert_eq!(session.responding(), 0);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error(TIMED_OUT_TEXT))
    );
}

/// **VALUE**: A reply after the deadline is still shown but never unbalances the counter.
///
/// **BUG THIS CATCHES**: Would catch a late reply decrementing the responding counter a
/// second time (wrapping or underflowing), or speaking an answer the user gave up on.
#[test]
fn given_timed_out_request_when_late_reply_arrives_then_shown_without_speech() {
    let mut session = opened_session();
    let now = Instant::now();
    let (id, _) = session.send_message("hello", MessageOrigin::Voice, now);
    session.on_deadline(now + TIMEOUT);

    let effects = session.on_frame(&intent_end(id, Some("late-conv"), "Finally"));

    assert!(effects.is_empty());
    assert_eq!(session.responding(), 0);
    assert_eq!(session.conversation_id(), Some("late-conv"));
    assert_eq!(session.transcript().last().unwrap().content, "Finally");

    let effects = session.on_frame(&intent_end(id, Some("late-conv"), "Finally"));
    assert!(effects.is_empty());
    assert_eq!(session.transcript().len(), 3);
}

#[test]
fn given_pending_requests_when_connection_fails_then_single_error_entry_and_cleared() {
    let mut session = opened_session();
    let now = Instant::now();
    session.send_message("one", MessageOrigin::Text, now);
    session.send_message("two", MessageOrigin::Text, now);

    let effects = session.on_lifecycle(LifecycleEvent::Failed {
        reason: "reset".to_string(),
    });

    assert_eq!(effects, vec![SessionEffect::CloseConnection]);
    assert_eq!(session.status(), ConnectionStatus::Failed);
    assert_eq!(session.responding(), 0);
    assert_eq!(session.next_deadline(), None);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error(CONNECTION_LOST_TEXT))
    );
    assert_eq!(session.transcript().len(), 3);
}

#[test]
fn given_no_pending_requests_when_connection_closes_then_transcript_untouched() {
    let mut session = opened_session();

    session.on_lifecycle(LifecycleEvent::Closed);

    assert!(session.transcript().is_empty());
}

#[test]
fn given_request_sent_before_connecting_when_observing_connection_then_abandoned() {
    let mut session = new_session();
    session.send_message("too early", MessageOrigin::Text, Instant::now());

    session.observe_connection();

    assert_eq!(session.responding(), 0);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error(CONNECTION_LOST_TEXT))
    );
}

#[test]
fn given_answer_without_targets_when_recorded_then_entry_carries_no_data() {
    let mut session = opened_session();
    let (empty, _) = session.send_message("hello", MessageOrigin::Text, Instant::now());
    let (acted, _) = session.send_message("lights on", MessageOrigin::Text, Instant::now());
    let answer = |id: u64, data: serde_json::Value| {
        json!({
            "id": id,
            "type": "event",
            "event": {
                "type": "intent-end",
                "data": {
                    "intent_output": {
                        "response": { "speech": { "plain": { "speech": "ok" } }, "data": data },
                        "conversation_id": "c"
                    }
                },
                "timestamp": "t"
            }
        })
        .to_string()
    };

    session.on_frame(&answer(empty, json!({ "targets": [], "success": [], "failed": [] })));
    assert_eq!(session.transcript().last().unwrap().data, None);

    session.on_frame(&answer(
        acted,
        json!({ "success": [{ "name": "Kitchen Light", "type": "entity" }] }),
    ));
    let data = session.transcript().last().unwrap().data.clone().unwrap();
    assert_eq!(data.success.unwrap()[0].name, "Kitchen Light");
}

/// **VALUE**: Typing before the handshake finishes cannot break authentication.
///
/// **WHY THIS MATTERS**: Home Assistant only accepts `auth` during the auth phase. Any
/// other frame there is answered with `auth_invalid`, which the user would read as a
/// bad token.
///
/// **BUG THIS CATCHES**: Would catch a run issued while `Connecting` being written
/// before the `auth` frame.
#[test]
fn given_message_sent_while_connecting_when_handshake_completes_then_auth_first_and_run_after() {
    // GIVEN: A session that is still connecting, with a message typed already
    let mut session = new_session();
    session.observe_connection();
    let (id, effects) = session.send_message("turn on the lights", MessageOrigin::Voice, Instant::now());

    // THEN: Nothing is written yet, but the message is shown and outstanding
    assert!(effects.is_empty());
    assert_eq!(session.transcript(), &[AssistMessage::user("turn on the lights")]);
    assert_eq!(session.responding(), 1);

    // WHEN: The socket opens and the server asks for credentials
    session.on_lifecycle(LifecycleEvent::Opened);
    let effects = session.on_frame(r#"{"type":"auth_required","ha_version":"2024.1.0"}"#);

    // THEN: Only the auth frame goes out
    assert!(matches!(
        effects.as_slice(),
        [SessionEffect::Send(SocketMessage::Auth(_))]
    ));

    // WHEN: Authentication succeeds
    let effects = session.on_message(auth_ok());

    // THEN: The held run is written and the session is open
    assert_eq!(session.status(), ConnectionStatus::Opened);
    let run = sent_run(&effects);
    assert_eq!(run.id, id);
    assert_eq!(run.input.text, "turn on the lights");
}

#[test]
fn given_messages_sent_while_authenticating_when_auth_ok_then_runs_written_in_id_order() {
    let mut session = new_session();
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);
    let now = Instant::now();
    let (first, _) = session.send_message("one", MessageOrigin::Text, now);
    let (second, _) = session.send_message("two", MessageOrigin::Text, now);

    let effects = session.on_message(auth_ok());

    let ids: Vec<u64> = effects
        .iter()
        .map(|effect| match effect {
            SessionEffect::Send(SocketMessage::PipelineRun(run)) => run.id,
            other => panic!("expected pipeline runs, got {other:?}"),
        })
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[test]
fn given_held_request_when_it_times_out_before_auth_then_never_written() {
    let mut session = new_session();
    session.observe_connection();
    let now = Instant::now();
    session.send_message("too slow", MessageOrigin::Text, now);
    session.on_lifecycle(LifecycleEvent::Opened);

    session.on_deadline(now + TIMEOUT);
    let effects = session.on_message(auth_ok());

    assert!(effects.is_empty());
    assert_eq!(session.responding(), 0);
    assert_eq!(
        session.transcript().last(),
        Some(&AssistMessage::error(TIMED_OUT_TEXT))
    );
}

#[test]
fn given_held_request_when_authentication_rejected_then_abandoned_and_not_written() {
    let mut session = new_session();
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);
    session.send_message("hello", MessageOrigin::Text, Instant::now());

    let effects = session.on_message(SocketMessage::AuthInvalid(AuthInvalid {
        message: "Invalid access token or password".to_string(),
    }));

    assert_eq!(effects, vec![SessionEffect::CloseConnection]);
    assert_eq!(session.responding(), 0);

    // A retry that succeeds has nothing left to write.
    session.observe_connection();
    session.on_lifecycle(LifecycleEvent::Opened);
    assert!(session.on_message(auth_ok()).is_empty());
}

/// **VALUE**: Follow-up turns continue the conversation of the newest answer.
///
/// **BUG THIS CATCHES**: Would catch a late reply to an old request switching the
/// session back to the older conversation.
#[test]
fn given_newer_answer_when_late_reply_for_older_request_arrives_then_conversation_kept() {
    // GIVEN: An old request that timed out and a newer one that was answered
    let mut session = opened_session();
    let now = Instant::now();
    let (old, _) = session.send_message("old", MessageOrigin::Text, now);
    session.on_deadline(now + TIMEOUT);
    let (new, _) = session.send_message("new", MessageOrigin::Text, now + TIMEOUT);
    session.on_frame(&intent_end(new, Some("conv-new"), "New answer"));

    // WHEN: The old request's reply finally arrives
    session.on_frame(&intent_end(old, Some("conv-old"), "Old answer"));

    // THEN: It is shown, but the next turn still continues the newer conversation
    assert_eq!(session.transcript().last().unwrap().content, "Old answer");
    assert_eq!(session.conversation_id(), Some("conv-new"));
    let (_, effects) = session.send_message("next", MessageOrigin::Text, now + TIMEOUT);
    assert_eq!(sent_run(&effects).conversation_id.as_deref(), Some("conv-new"));
}

/// **VALUE**: A server that never answers cannot grow session memory without bound.
///
/// **BUG THIS CATCHES**: Would catch every timed-out id being remembered forever.
#[test]
fn given_many_timeouts_when_late_replies_arrive_then_only_recent_ones_are_shown() {
    let mut session = opened_session();
    let now = Instant::now();
    let total = MAX_EXPIRED_REQUESTS as u64 + 8;
    for i in 0..total {
        session.send_message(format!("m{i}"), MessageOrigin::Text, now);
    }
    session.on_deadline(now + TIMEOUT);
    let before = session.transcript().len();

    // The oldest timed-out id has been forgotten.
    session.on_frame(&intent_end(1, Some("c"), "Too late"));
    assert_eq!(session.transcript().len(), before);

    // The newest is still recognized as a late reply.
    session.on_frame(&intent_end(total, Some("c"), "Late but shown"));
    assert_eq!(session.transcript().len(), before + 1);
    assert_eq!(session.responding(), 0);
}

/// **VALUE**: The responding counter stays consistent under any interleaving.
///
/// **BUG THIS CATCHES**: Would catch double resolution through any pair of paths
/// (answer + timeout, error + run-end, loss + late answer).
#[test]
fn given_mixed_sends_answers_and_timeouts_when_replayed_then_counter_matches_outstanding() {
    let mut session = opened_session();
    let start = Instant::now();
    // Deadlines of requests nobody answers.
    let mut outstanding: Vec<Instant> = Vec::new();

    for step in 0..20u64 {
        let now = start + Duration::from_secs(step * 7);
        let (id, _) = session.send_message(format!("m{step}"), MessageOrigin::Text, now);

        match step % 3 {
            0 => {
                session.on_frame(&intent_end(id, Some("c"), "ok"));
                session.on_frame(&run_end(id));
            }
            1 => {
                session.on_frame(&run_end(id));
                session.on_frame(&intent_end(id, Some("c"), "late"));
            }
            _ => outstanding.push(now + TIMEOUT),
        }

        session.on_deadline(now);
        outstanding.retain(|deadline| *deadline > now);
        assert_eq!(session.responding(), outstanding.len(), "step {step}");
    }

    session.on_deadline(start + Duration::from_secs(10_000));
    assert_eq!(session.responding(), 0);
}
