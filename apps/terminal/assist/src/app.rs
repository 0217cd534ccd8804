//! Wiring: configuration, logging, the view model and the stdin loop.

use crate::console::{self, Command, HELP_TEXT};
use crate::error::AssistAppError;
use crate::logger;

use assist_core::config::{self, AppConfig, default_config_dir};
use assist_core::transport::WsTransport;
use assist_core::{APP_DIR_NAME, AssistRepository, ConversationViewModel};

use common::ErrorLocation;
use models::{AssistMessage, ConnectionStatus};

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

const LOG_DIR_NAME: &str = "logs";

/// `{platform local data dir}/deep-assist/logs`.
#[track_caller]
pub fn default_log_dir() -> Result<PathBuf, AssistAppError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(LOG_DIR_NAME))
        .ok_or_else(|| AssistAppError::Assist {
            message: "No local data directory on this platform".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}

/// Load the config file, writing a template on first run so there is
/// something to edit.
pub fn load_or_create_config(config_dir: &Path) -> Result<AppConfig, AssistAppError> {
    let config = AppConfig::load(config_dir)?;

    if !config_dir.join("config.json").exists() {
        config.save(config_dir)?;
        println!(
            "Created {}; set server.url and server.assist_pipeline there.",
            config_dir.join("config.json").display()
        );
    }

    Ok(config)
}

pub async fn run() -> Result<(), AssistAppError> {
    let log_dir = default_log_dir()?;
    create_dir_all(&log_dir)?;
    logger::initialize(&log_dir)?;

    info!("Deep Assist terminal client starting");
    info!("Log directory: {}", log_dir.display());

    config::try_load_dotenv();

    let config_dir = default_config_dir()?;
    let app_config = load_or_create_config(&config_dir)?;
    let token = config::access_token()?;
    let connection_info = config::connection_info(&app_config, token)?;

    info!(
        "Using {} with pipeline {}",
        connection_info.base_url, connection_info.pipeline_id
    );

    let repository = AssistRepository::new(
        connection_info,
        app_config.session.request_timeout(),
        Arc::new(WsTransport::new()),
        |text: &str, voice: bool| {
            if voice {
                println!("{}", console::render_spoken(text));
            }
        },
    )?;
    let view_model = ConversationViewModel::new(repository);

    tokio::spawn(render_status(view_model.watch_status()));
    tokio::spawn(render_transcript(view_model.watch_transcript()));

    println!("{HELP_TEXT}");
    view_model.observe_connection().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match console::parse_command(&line) {
            Command::Say(text) => {
                view_model.send_message(text).await?;
            }
            Command::Voice(text) => {
                view_model.send_voice_message(text).await?;
            }
            Command::Retry => {
                if view_model.status().can_retry() {
                    view_model.retry().await?;
                } else {
                    println!("Already {}", view_model.status());
                }
            }
            Command::Quit => break,
            Command::Help => println!("{HELP_TEXT}"),
            Command::Empty => {}
            Command::Unknown(name) => {
                warn!("Unknown command /{name}");
                println!("Unknown command /{name}. Type /help for commands.");
            }
        }
    }

    info!("Deep Assist terminal client exiting");
    Ok(())
}

async fn render_status(mut status: watch::Receiver<ConnectionStatus>) {
    loop {
        let current = *status.borrow_and_update();
        println!("{}", console::render_status(current));
        if status.changed().await.is_err() {
            break;
        }
    }
}

/// Print entries as they are appended. User entries are not echoed; the
/// user just typed them.
async fn render_transcript(mut transcript: watch::Receiver<Vec<AssistMessage>>) {
    let mut shown = 0;
    loop {
        let entries = transcript.borrow_and_update().clone();
        for entry in entries.iter().skip(shown) {
            if !entry.is_user_message {
                println!("{}", console::render_message(entry));
            }
        }
        shown = entries.len();

        if transcript.changed().await.is_err() {
            break;
        }
    }
}
