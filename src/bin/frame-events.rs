//! Handles one storage event per run.
//!
//! Reads the event from the file named by the first argument, or from stdin
//! when no argument (or `-`) is given. Exits 0 when the event was handled and
//! 1 when the invocation failed.
use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use frame_events::{init_tracing, Dispatcher, EnvServices, HandlerError, LogFormat, TracingSink};
use tracing::{error, info};

fn read_input(arg: Option<String>) -> anyhow::Result<String> {
    match arg.as_deref() {
        None | Some("-") => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading event from stdin")?;
            Ok(input)
        }
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading event from {path}"))
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let input = read_input(std::env::args().nth(1))?;

    let sink = TracingSink;
    let dispatcher = Dispatcher::new(&EnvServices, &sink);
    let outcome = dispatcher
        .handle_json(&input)
        .await
        .context("event handling failed")?;

    info!(
        branch = ?outcome.branch,
        facts = outcome.facts.len(),
        face_count = outcome.face_count,
        "invocation_complete"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing .env is the normal case outside local development.
    let _ = dotenvy::dotenv();

    if let Err(err) = init_tracing(LogFormat::from_env()) {
        eprintln!("failed to install tracing subscriber: {err}");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<HandlerError>()
                .map_or("input", HandlerError::kind);
            error!(error_kind = kind, error = %format!("{err:#}"), "invocation_failed");
            ExitCode::FAILURE
        }
    }
}
