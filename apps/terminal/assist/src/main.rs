use assist::{app, logger};

use std::process::ExitCode;

use log::error;

#[tokio::main]
async fn main() -> ExitCode {
    match app::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The installed logger already writes errors to stderr.
            if logger::is_installed() {
                error!("{e}");
            } else {
                eprintln!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}
