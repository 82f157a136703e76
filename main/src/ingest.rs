use std::path::PathBuf;

use anyhow::Context;
use api_router::{api_state::ApiState, batch::ingest_folder, service::UploadOptions};
use clap::Parser;
use common::utils::config::get_config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Uploads a folder of documents into the RAG corpus without going through
/// the HTTP API. Set `RAG_CORPUS` to import into an existing corpus.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder whose files are uploaded (not recursive)
    folder: PathBuf,

    /// Description stored with every uploaded document
    #[arg(long)]
    description: Option<String>,

    /// Chunk size in tokens (defaults to CHUNK_SIZE)
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Chunk overlap in tokens (defaults to CHUNK_OVERLAP)
    #[arg(long)]
    chunk_overlap: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = get_config().context("loading configuration")?;
    let state = ApiState::new(&config)
        .await
        .context("building API state")?;

    let summary = ingest_folder(
        &state,
        &args.folder,
        UploadOptions {
            description: args.description,
            chunk_size: args.chunk_size,
            chunk_overlap: args.chunk_overlap,
        },
    )
    .await
    .with_context(|| format!("ingesting {}", args.folder.display()))?;

    for file in &summary.uploaded {
        match &file.error {
            Some(error) => println!("FAILED   {}: {error}", file.filename),
            None => println!("uploaded {}", file.filename),
        }
    }
    for skipped in &summary.skipped {
        println!("skipped  {}: {}", skipped.path.display(), skipped.reason);
    }
    if let Some(corpus) = state.registry.corpus().await {
        println!("corpus   {}", corpus.name);
    }
    println!(
        "{} uploaded, {} failed, {} skipped in {} batch(es)",
        summary.succeeded,
        summary.failed,
        summary.skipped.len(),
        summary.batches
    );

    if summary.succeeded == 0 && summary.failed > 0 {
        anyhow::bail!("no documents were imported");
    }
    Ok(())
}
