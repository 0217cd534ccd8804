//! Line-oriented rendering of the conversation and parsing of user input.

use models::{AssistMessage, ConnectionStatus};

const USER_PREFIX: &str = "you>";
const ASSISTANT_PREFIX: &str = "assist>";
const ERROR_PREFIX: &str = "error>";
const SPOKEN_PREFIX: &str = "(spoken)";

pub const HELP_TEXT: &str = "Type a message and press Enter.\n  \
    /voice <text>  send as if dictated (the reply is spoken)\n  \
    /retry         reconnect after a failure\n  \
    /quit          exit";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Voice(String),
    Retry,
    Quit,
    Help,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();

    if line.is_empty() {
        return Command::Empty;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };

    match name {
        "voice" if argument.is_empty() => Command::Empty,
        "voice" => Command::Voice(argument.to_string()),
        "retry" => Command::Retry,
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        _ => Command::Unknown(name.to_string()),
    }
}

pub fn render_status(status: ConnectionStatus) -> String {
    if status.is_terminal() {
        format!("* {status} Type /retry to reconnect.")
    } else {
        format!("* {status}")
    }
}

pub fn render_message(message: &AssistMessage) -> String {
    if message.is_user_message {
        return format!("{USER_PREFIX} {}", message.content);
    }

    if message.is_error {
        return format!("{ERROR_PREFIX} {}", message.content);
    }

    let acted_on: Vec<&str> = message
        .data
        .as_ref()
        .and_then(|data| data.success.as_ref())
        .map(|targets| targets.iter().map(|target| target.name.as_str()).collect())
        .unwrap_or_default();

    if acted_on.is_empty() {
        format!("{ASSISTANT_PREFIX} {}", message.content)
    } else {
        format!(
            "{ASSISTANT_PREFIX} {} [{}]",
            message.content,
            acted_on.join(", ")
        )
    }
}

pub fn render_spoken(text: &str) -> String {
    format!("{SPOKEN_PREFIX} {text}")
}
