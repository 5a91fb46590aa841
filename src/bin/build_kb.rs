//! Knowledge base build binary.
//!
//! Loads the passage corpus, embeds every passage and writes the knowledge
//! base file. The previous file is only replaced once the whole build has
//! succeeded.
//!
//! # Examples
//!
//! Build from a curated JSON corpus:
//! ```bash
//! build_kb --input passages.json --output knowledge_base.skb
//! ```
//!
//! Build from a directory of paper summaries:
//! ```bash
//! build_kb --text-dir summaries/ --chunk-size 800 --chunk-overlap 200
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use scholar_kb::{
    embedding::{
        dynamic::{DynamicEmbeddingProvider, ProviderKind},
        EmbeddingProvider,
    },
    ingestion::{IndexBuilder, DEFAULT_BATCH_SIZE},
    provider::{
        chunker::{TextChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
        json::JsonFilePassageProvider,
        text_dir::TextDirectoryProvider,
        PassageProvider,
    },
    DEFAULT_KB_FILE,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Embedding provider type
#[derive(Debug, Clone, ValueEnum)]
enum EmbeddingProviderType {
    /// FastEmbed local embedding provider (default, no API required)
    FastEmbed,
    /// OpenAI cloud-based embedding provider (requires OPENAI_API_KEY)
    #[value(name = "openai")]
    OpenAI,
}

impl From<EmbeddingProviderType> for ProviderKind {
    fn from(value: EmbeddingProviderType) -> Self {
        match value {
            EmbeddingProviderType::FastEmbed => ProviderKind::FastEmbed,
            EmbeddingProviderType::OpenAI => ProviderKind::OpenAI,
        }
    }
}

/// Build the scholar knowledge base from a passage corpus
#[derive(Parser, Debug)]
#[command(
    name = "build_kb",
    version,
    about = "Embed a passage corpus and save it as a knowledge base",
    long_about = "Embeds every passage of a corpus and saves the vectors, the corpus and the \
                  embedding configuration as one knowledge base file. The output file is replaced \
                  atomically, so a failed build leaves the previous knowledge base intact.

EXAMPLES:
  Build from a JSON corpus:
    build_kb --input passages.json

  Build from a directory of .txt summaries:
    build_kb --text-dir summaries/ --output scholar.skb

  Use OpenAI embeddings:
    OPENAI_API_KEY=sk-... build_kb --input passages.json --embedding-provider openai

  Custom batch size and logging:
    build_kb --input passages.json --batch-size 8 --log-level debug"
)]
struct BuildArgs {
    /// JSON file containing an array of {title, content, page} passages
    #[arg(short, long, value_name = "FILE", required_unless_present = "text_dir", conflicts_with = "text_dir")]
    input: Option<PathBuf>,

    /// Directory of .txt paper summaries to chunk
    #[arg(long, value_name = "DIR")]
    text_dir: Option<PathBuf>,

    /// Knowledge base file to write
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_KB_FILE)]
    output: PathBuf,

    /// Embedding provider to use
    #[arg(long, value_enum, default_value = "fast-embed")]
    embedding_provider: EmbeddingProviderType,

    /// Specific embedding model name (provider-dependent, optional)
    #[arg(long, value_name = "MODEL")]
    embedding_model: Option<String>,

    /// Number of passages to embed per batch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Maximum chunk length in characters (with --text-dir)
    #[arg(long, value_name = "CHARS", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks (with --text-dir)
    #[arg(long, value_name = "CHARS", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Strip paper boilerplate (author lines, references, URLs) from raw extracted text (with --text-dir)
    #[arg(long, requires = "text_dir")]
    clean_text: bool,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Create the passage provider selected on the command line
async fn create_passage_provider(args: &BuildArgs) -> Result<Box<dyn PassageProvider>> {
    if let Some(dir) = &args.text_dir {
        if !dir.is_dir() {
            anyhow::bail!("Summary directory not found: {}", dir.display());
        }
        let chunker = TextChunker::new(args.chunk_size, args.chunk_overlap)
            .context("Invalid chunking parameters")?;
        debug!(chunk_size = args.chunk_size, chunk_overlap = args.chunk_overlap, "Chunking summaries");
        let provider = TextDirectoryProvider::with_chunker(dir.clone(), chunker).with_cleaning(args.clean_text);
        return Ok(Box::new(provider));
    }

    let input = args
        .input
        .as_ref()
        .context("Either --input or --text-dir must be given")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let provider = JsonFilePassageProvider::from_file(input)
        .await
        .with_context(|| format!("Failed to load passages from {}", input.display()))?;
    Ok(Box::new(provider))
}

/// Create a progress bar for tracking embedding
fn create_progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} passages")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = BuildArgs::parse();

    init_logging(&args.log_level)?;

    info!("Starting knowledge base build");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    let provider = create_passage_provider(&args).await?;
    let passages = provider
        .fetch_passages()
        .await
        .with_context(|| format!("Failed to read passages from {}", provider.name()))?;
    info!("Found {} passages from {}", passages.len(), provider.name());

    if passages.is_empty() {
        warn!("Corpus is empty; nothing to build");
        anyhow::bail!("No passages found in {}", provider.name());
    }

    let embedding_provider = DynamicEmbeddingProvider::create(
        args.embedding_provider.clone().into(),
        args.embedding_model.as_deref(),
        args.cache_dir.clone(),
    )
    .context("Failed to create embedding provider")?;

    info!(
        "Embedding provider initialized: model={}, dimension={}",
        embedding_provider.model_name(),
        embedding_provider.dimension()
    );

    let progress = create_progress_bar(passages.len())?;
    let bar = progress.clone();
    let builder = IndexBuilder::new(embedding_provider)
        .with_batch_size(args.batch_size)
        .with_progress(move |done, _total| bar.set_position(done as u64));

    let result = builder.build_and_persist(passages, &args.output).await;
    match &result {
        Ok(_) => progress.finish(),
        Err(_) => progress.abandon(),
    }
    let stats = result.with_context(|| {
        format!(
            "Failed to build knowledge base; {} was left unchanged",
            args.output.display()
        )
    })?;

    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Knowledge Base Built              ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Passages indexed:     {:>16} ║", stats.passages);
    println!("║ Dimension:            {:>16} ║", stats.dimension);
    println!("║ Embedding time:       {:>13.2?} ║", stats.elapsed);
    println!("║ Total time:           {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");
    println!("Saved to {}", args.output.display());

    info!("Knowledge base build completed successfully");

    Ok(())
}
