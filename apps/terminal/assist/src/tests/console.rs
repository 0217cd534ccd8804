use crate::console::{Command, parse_command, render_message, render_spoken, render_status};

use models::{
    AssistMessage, ConnectionStatus, ConversationData, ConversationTarget, ConversationTargetType,
};

#[test]
fn given_plain_text_when_parsed_then_say() {
    assert_eq!(
        parse_command("  turn on the lights \n"),
        Command::Say("turn on the lights".to_string())
    );
}

#[test]
fn given_voice_command_when_parsed_then_voice_with_text() {
    assert_eq!(
        parse_command("/voice what time is it"),
        Command::Voice("what time is it".to_string())
    );
}

#[test]
fn given_control_commands_when_parsed_then_recognized() {
    assert_eq!(parse_command("/retry"), Command::Retry);
    assert_eq!(parse_command("/quit"), Command::Quit);
    assert_eq!(parse_command("/exit"), Command::Quit);
    assert_eq!(parse_command("/help"), Command::Help);
}

#[test]
fn given_blank_input_when_parsed_then_empty() {
    assert_eq!(parse_command("   "), Command::Empty);
    assert_eq!(parse_command("/voice   "), Command::Empty);
}

#[test]
fn given_unknown_slash_command_when_parsed_then_unknown() {
    assert_eq!(
        parse_command("/dance now"),
        Command::Unknown("dance".to_string())
    );
}

/// **VALUE**: Users must be able to tell a bad token from a network outage.
///
/// **BUG THIS CATCHES**: Would catch both failures rendering the same generic line.
#[test]
fn given_failure_statuses_when_rendered_then_lines_differ_and_offer_retry() {
    let failed = render_status(ConnectionStatus::Failed);
    let auth_failed = render_status(ConnectionStatus::AuthenticationFailed);

    assert_ne!(failed, auth_failed);
    assert!(failed.contains("/retry"), "{failed}");
    assert!(auth_failed.contains("token"), "{auth_failed}");
}

#[test]
fn given_live_status_when_rendered_then_no_retry_hint() {
    assert!(!render_status(ConnectionStatus::Opened).contains("/retry"));
}

#[test]
fn given_each_entry_kind_when_rendered_then_prefixed_by_speaker() {
    assert_eq!(render_message(&AssistMessage::user("hi")), "you> hi");
    assert_eq!(
        render_message(&AssistMessage::assistant("Hello", None, None)),
        "assist> Hello"
    );
    assert_eq!(
        render_message(&AssistMessage::error("Timed out")),
        "error> Timed out"
    );
}

#[test]
fn given_reply_with_affected_targets_when_rendered_then_lists_them() {
    let target = |name: &str| ConversationTarget {
        name: name.to_string(),
        target_type: Some(ConversationTargetType::Entity),
        id: None,
    };
    let data = ConversationData {
        success: Some(vec![target("Kitchen Light"), target("Hall Light")]),
        ..ConversationData::default()
    };

    let line = render_message(&AssistMessage::assistant(
        "Turned on the lights",
        Some(data),
        None,
    ));

    assert_eq!(line, "assist> Turned on the lights [Kitchen Light, Hall Light]");
}

#[test]
fn given_spoken_text_when_rendered_then_marked_as_spoken() {
    assert_eq!(render_spoken("Done"), "(spoken) Done");
}
