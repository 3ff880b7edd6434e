//! Command-line interface for reflecta.
//!
//! Provides commands for capturing entries from recordings or photos,
//! inspecting the pending-action queue, and flushing it after reconnect.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::clients::openai::ApiSettings;
use crate::clients::{
    ChatCoachingClient, ProbeConnectivityOracle, RestBackendClient, VisionChatClient,
    WhisperClient,
};
use crate::config;
use crate::domain::{Entry, SyncState};
use crate::pipeline::{EntryOrchestrator, PersistenceGateway};
use crate::sync::PendingActionQueue;

/// reflecta - offline-tolerant entry pipeline for a reflective journal
#[derive(Parser, Debug)]
#[command(name = "reflecta")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an entry from a voice recording
    Record {
        /// Path to the audio file
        audio: PathBuf,

        /// Reflection category (e.g. "Gratitude")
        #[arg(short, long)]
        category: String,

        /// Mark the entry private
        #[arg(long)]
        private: bool,
    },

    /// Create an entry from a photo URL plus caption
    Photo {
        /// Image URL (http/https)
        image_url: String,

        /// Caption text
        #[arg(short = 'm', long)]
        caption: String,

        /// Reflection category
        #[arg(short, long)]
        category: String,

        /// Mark the entry private
        #[arg(long)]
        private: bool,
    },

    /// Inspect or flush the pending-action queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Show queue status
    Status,

    /// Replay queued entries through the backend
    Flush,

    /// Discard a queued entry by its local id
    Discard {
        /// The temp_ placeholder id
        local_id: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Record {
                audio,
                category,
                private,
            } => {
                let orchestrator = build_orchestrator("cli-user").await?;
                let entry = orchestrator
                    .create_from_recording(&audio.to_string_lossy(), &category, private)
                    .await?;
                print_entry(&entry);
                Ok(())
            }
            Commands::Photo {
                image_url,
                caption,
                category,
                private,
            } => {
                let orchestrator = build_orchestrator("cli-user").await?;
                let entry = orchestrator
                    .create_from_image(&image_url, &caption, &category, private)
                    .await?;
                print_entry(&entry);
                Ok(())
            }
            Commands::Queue { command } => match command {
                QueueCommands::Status => queue_status().await,
                QueueCommands::Flush => queue_flush().await,
                QueueCommands::Discard { local_id } => queue_discard(&local_id).await,
            },
            Commands::Config => show_config(),
        }
    }
}

/// Build the full pipeline from resolved config and environment keys
async fn build_orchestrator(user_id: &str) -> Result<EntryOrchestrator> {
    let cfg = config::config()?;

    let api_key = std::env::var("REFLECTA_API_KEY").context("REFLECTA_API_KEY is not set")?;
    let settings = ApiSettings {
        base_url: cfg.models.api_base.clone(),
        api_key,
    };

    let speech = Arc::new(WhisperClient::new(settings.clone(), &cfg.models.speech));
    let vision = Arc::new(VisionChatClient::new(settings.clone(), &cfg.models.vision));
    let coaching = Arc::new(ChatCoachingClient::new(
        settings,
        &cfg.models.primary,
        &cfg.models.fallback,
        cfg.models.methodology.clone(),
    ));

    Ok(EntryOrchestrator::new(
        speech,
        vision,
        coaching,
        build_gateway().await?,
        cfg.timeouts,
        user_id,
    ))
}

async fn build_gateway() -> Result<PersistenceGateway> {
    let cfg = config::config()?;
    let backend_key = std::env::var("REFLECTA_BACKEND_KEY").unwrap_or_default();

    let backend = Arc::new(RestBackendClient::new(&cfg.backend.base_url, backend_key));
    let oracle = Arc::new(ProbeConnectivityOracle::new(&cfg.backend.probe_url));
    let queue = Arc::new(PendingActionQueue::open_default().await?);

    Ok(PersistenceGateway::new(backend, oracle, queue, cfg.timeouts))
}

fn print_entry(entry: &Entry) {
    println!("Entry {}", entry.id);
    println!("  category:  {}", entry.category);
    println!("  text:      {}", entry.transcription);
    if let Some(ref response) = entry.ai_response {
        println!("  coaching:  {}", response);
    }
    match entry.sync_state {
        SyncState::Synced => println!("  status:    synced"),
        SyncState::Queued => println!("  status:    saved, will sync"),
        SyncState::Local => println!("  status:    local only"),
    }
}

async fn queue_status() -> Result<()> {
    let queue = PendingActionQueue::open_default().await?;
    let status = queue.status().await?;

    println!(
        "Pending: {} ({} with failed attempts)",
        status.pending, status.retried
    );
    for action in &status.recent {
        println!(
            "  {}  {}  attempts={}  {}",
            action.local_id,
            action.payload.category,
            action.attempts,
            action.last_error.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn queue_flush() -> Result<()> {
    let gateway = build_gateway().await?;
    let report = gateway.flush().await?;

    println!(
        "Flushed: {} synced, {} dropped, {} remaining",
        report.synced, report.dropped, report.remaining
    );
    if let Some(err) = report.stopped_on {
        println!("Stopped on: {}", err);
    }
    Ok(())
}

async fn queue_discard(local_id: &str) -> Result<()> {
    let queue = PendingActionQueue::open_default().await?;

    if queue.get(local_id).await?.is_none() {
        anyhow::bail!("No queued action with local id {}", local_id);
    }

    queue.remove(local_id).await?;
    println!("Discarded {}", local_id);
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("home:      {}", cfg.home.display());
    match &cfg.config_file {
        Some(path) => println!("config:    {}", path.display()),
        None => println!("config:    (defaults)"),
    }
    println!("backend:   {}", cfg.backend.base_url);
    println!("probe:     {}", cfg.backend.probe_url);
    println!("primary:   {}", cfg.models.primary);
    println!("fallback:  {}", cfg.models.fallback);
    match &cfg.models.methodology {
        Some(model) => println!("methodology: {}", model),
        None => println!("methodology: (not configured)"),
    }
    println!("vision:    {}", cfg.models.vision);
    println!("speech:    {}", cfg.models.speech);
    Ok(())
}
