mod app;
mod audio;
mod config;
mod elapsed;
mod error;
mod messages;
mod permission;
mod services;
mod ui;

use app::App;
use config::Config;
use messages::UiEvent;
use permission::ConsentFile;
use services::DeviceBackend;
use ui::{PromptBroker, TerminalSurface};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Record the microphone to a file and play it back
#[derive(Parser, Debug)]
#[command(name = "dictaphone", version, about)]
struct Args {
    /// Config file (default: ~/.config/dictaphone/config.json)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Forget the stored microphone permission and ask again
    #[arg(long)]
    reset_permission: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they don't tear the status line on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dictaphone=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("Starting dictaphone");

    let config = Config::load(args.config.as_deref())?;
    config.validate()?;

    let consent_path = config.consent_path()?;
    if args.reset_permission {
        permission::reset(&consent_path)?;
    }

    let storage_dir = config.storage_dir()?;
    std::fs::create_dir_all(&storage_dir)
        .with_context(|| format!("Failed to create storage directory: {:?}", storage_dir))?;

    // LocalSet for !Send futures (capture sessions hold a cpal::Stream)
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async move { run_app(config, consent_path).await })
        .await
}

async fn run_app(config: Config, consent_path: PathBuf) -> Result<()> {
    let prompts = PromptBroker::new();
    let (ui_tx, ui_rx) = mpsc::channel(10);

    let lines = ui::spawn_stdin_reader();
    tokio::task::spawn_local(ui::read_input(lines, ui_tx.clone(), prompts.clone()));

    // Ctrl+C quits the same way 'q' does, so a recording is finalized
    tokio::task::spawn_local(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C");
            let _ = ui_tx.send(UiEvent::Quit).await;
        }
    });

    let app = App::new(
        config.recording_path()?,
        Box::new(DeviceBackend::new(config.input_device.clone())),
        Rc::new(ConsentFile::new(consent_path, prompts)),
        Box::new(TerminalSurface::new()),
        ui_rx,
    );

    let result = app.run().await;
    println!();
    result
}
