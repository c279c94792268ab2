use std::path::{Path, PathBuf};

use anyhow::Result;
use assistant_core::{
    ingestion_processor_from_settings, load_settings, prepare_backend_url,
    response_producer_from_settings, BackendClient, ConversationController, IngestionController,
    Settings, SubmitOutcome,
};
use clap::Parser;
use shared::domain::{AnswerMode, FileCandidate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::{parse_command, HostCommand, HELP};

#[derive(Parser, Debug)]
#[command(about = "Study assistant: ask questions about your notes and upload PDFs")]
struct Args {
    /// Settings file; defaults to ./assistant.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Answer backend base URL. Canned answers are used when absent.
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    accepted_type: Option<String>,
    #[arg(long)]
    response_latency_ms: Option<u64>,
    #[arg(long)]
    ingestion_delay_ms: Option<u64>,
    #[arg(long)]
    response_timeout_secs: Option<u64>,
    #[arg(long)]
    mode: Option<AnswerMode>,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => assistant_core::config::load_settings_from(path)?,
            None => load_settings(),
        };
        if let Some(v) = &self.backend_url {
            settings.backend_url = Some(v.clone());
        }
        if let Some(v) = &self.accepted_type {
            settings.accepted_media_type = v.clone();
        }
        if let Some(v) = self.response_latency_ms {
            settings.response_latency_ms = v;
        }
        if let Some(v) = self.ingestion_delay_ms {
            settings.ingestion_delay_ms = v;
        }
        if let Some(v) = self.response_timeout_secs {
            settings.response_timeout_secs = v;
        }
        Ok(settings)
    }
}

async fn candidate_for(path: &Path) -> Result<FileCandidate> {
    let metadata = tokio::fs::metadata(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(FileCandidate::new(name, metadata.len(), media_type))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = args.settings()?;

    let health_client = match settings.backend_url.as_deref() {
        Some(raw) => Some(
            BackendClient::new(prepare_backend_url(raw)?).with_timeout(settings.response_timeout()),
        ),
        None => None,
    };
    let conversation = ConversationController::new(
        response_producer_from_settings(&settings)?,
        settings.response_timeout(),
    );
    let ingestion = IngestionController::new(
        ingestion_processor_from_settings(&settings),
        settings.accepted_media_type.clone(),
    );
    if let Some(mode) = args.mode {
        conversation.set_mode(mode).await;
    }
    info!(
        backend = settings.backend_url.as_deref().unwrap_or("canned answers"),
        accepted = ingestion.accepted_media_type(),
        "study assistant ready"
    );

    let conversation_printer = tokio::spawn(render::pump_events(
        "conversation",
        conversation.subscribe_events(),
        |event| {
            if let Some(line) = render::conversation_line(event) {
                println!("{line}");
            }
        },
    ));
    let ingestion_printer = tokio::spawn(render::pump_events(
        "ingestion",
        ingestion.subscribe_events(),
        |event| {
            if let Some(line) = render::ingestion_line(event) {
                println!("{line}");
            }
        },
    ));

    for message in conversation.messages().await {
        println!("assistant> {}", message.text);
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            HostCommand::Ask(text) => match conversation.submit(&text).await {
                SubmitOutcome::Dispatched(_) | SubmitOutcome::Empty => {}
                SubmitOutcome::Busy => {
                    println!("Still answering the previous question; wait or /cancel.")
                }
                SubmitOutcome::Closed => break,
            },
            HostCommand::Mode(mode) => conversation.set_mode(mode).await,
            HostCommand::Add(paths) => {
                let mut candidates = Vec::with_capacity(paths.len());
                for path in &paths {
                    match candidate_for(path).await {
                        Ok(candidate) => candidates.push(candidate),
                        Err(error) => warn!(path = %path.display(), %error, "cannot read file"),
                    }
                }
                ingestion.add_files(candidates).await;
            }
            HostCommand::Remove(id) => {
                if !ingestion.remove_file(id).await {
                    println!("no upload with id {id}");
                }
            }
            HostCommand::Files => {
                let entries = ingestion.entries().await;
                if entries.is_empty() {
                    println!("no uploads");
                }
                for entry in &entries {
                    println!("{}", render::entry_line(entry));
                }
            }
            HostCommand::Cancel => {
                if !conversation.cancel_pending().await {
                    println!("nothing to cancel");
                }
            }
            HostCommand::Health => match &health_client {
                Some(client) => match client.health().await {
                    Ok(health) => println!("backend {}: {}", client.base_url(), health.message),
                    Err(error) => println!("backend {}: {error}", client.base_url()),
                },
                None => println!("backend: not configured, answers are canned"),
            },
            HostCommand::Help => println!("{HELP}"),
            HostCommand::Quit => break,
            HostCommand::Invalid(message) => println!("{message}"),
        }
    }

    conversation.shutdown().await;
    ingestion.shutdown().await;
    conversation_printer.abort();
    ingestion_printer.abort();
    Ok(())
}
