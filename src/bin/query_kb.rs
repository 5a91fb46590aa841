//! Query binary entry point.
//!
//! Answers questions against a built knowledge base, either once from the
//! command line or in an interactive REPL, with table, JSON or plain-text
//! (prompt context) output.
//!
//! # Examples
//!
//! Single question with default settings (cosine, top 5):
//! ```bash
//! query_kb --question "What is participatory budgeting?"
//! ```
//!
//! Euclidean ranking, JSON output:
//! ```bash
//! query_kb --kb-path scholar.skb --question "digital twins" --metric l2 --format json
//! ```
//!
//! Interactive mode:
//! ```bash
//! query_kb --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use scholar_kb::{
    embedding::{dynamic::DynamicEmbeddingProvider, EmbeddingProvider},
    models::{RelevanceLevel, RetrievedPassage},
    query::{KnowledgeBaseSearchEngine, SearchEngine, SearchQuery, DEFAULT_TOP_K},
    storage::KnowledgeBase,
    store::Metric,
    DEFAULT_KB_FILE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HELP: &str = "Commands:
  <question>           - Search the knowledge base
  /top N               - Set number of results to N
  /metric cos|l2|ip    - Set ranking metric
  /format table        - Use table output format
  /format json         - Use JSON output format
  /format text         - Print passage texts only
  /detail N            - Show full passage for result rank N
  /help                - Show this help
  Ctrl+D or Ctrl+C     - Exit";

/// Output format for search results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table with colored relevance levels
    Table,
    /// Machine-readable JSON format
    Json,
    /// Passage texts separated by blank lines, for prompt context
    Text,
}

/// Query the scholar knowledge base
#[derive(Parser, Debug)]
#[command(
    name = "query_kb",
    version,
    about = "Retrieve the passages most relevant to a question",
    long_about = "Embeds a question with the model the knowledge base was built with and ranks \
                  every stored passage under the chosen metric. Supports single-question and \
                  interactive modes.

EXAMPLES:
  Single question:
    query_kb --question \"What is participatory budgeting?\"

  Inner product ranking, top 3, JSON output:
    query_kb --question \"digital twins\" --metric ip --top-k 3 --format json

  Interactive mode:
    query_kb --kb-path scholar.skb --interactive"
)]
struct Args {
    /// Knowledge base file path
    #[arg(long, value_name = "PATH", default_value = DEFAULT_KB_FILE)]
    kb_path: PathBuf,

    /// Question (required for single-question mode, omitted in interactive mode)
    #[arg(long, short = 'q', value_name = "TEXT", conflicts_with = "interactive")]
    question: Option<String>,

    /// Ranking metric: cos, l2 or ip
    #[arg(long, value_name = "METRIC", default_value = "cos", value_parser = parse_metric)]
    metric: Metric,

    /// Number of passages to return
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory (only used with FastEmbed models)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

fn parse_metric(value: &str) -> Result<Metric, String> {
    value.parse::<Metric>().map_err(|e| e.to_string())
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Shorten `text` to at most `max` characters, marking the cut with "...".
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Format results as a pretty table
fn format_results_table(results: &[RetrievedPassage], metric: Metric) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let score_header = match metric {
        Metric::EuclideanDistance => "Distance",
        Metric::CosineSimilarity => "Similarity",
        Metric::InnerProduct => "Inner product",
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Page").add_attribute(Attribute::Bold),
        Cell::new("Passage").add_attribute(Attribute::Bold),
        Cell::new("Relevance").add_attribute(Attribute::Bold),
        Cell::new(score_header).add_attribute(Attribute::Bold),
    ]);

    for result in results {
        let (relevance_str, color) = match result.relevance {
            Some(RelevanceLevel::Identical) => ("IDENTICAL", Color::Green),
            Some(RelevanceLevel::HighlySimilar) => ("HIGHLY_SIMILAR", Color::Cyan),
            Some(RelevanceLevel::Similar) => ("SIMILAR", Color::Yellow),
            Some(RelevanceLevel::Relevant) => ("RELEVANT", Color::White),
            None => ("-", Color::White),
        };

        table.add_row(vec![
            Cell::new(result.rank),
            Cell::new(truncate_chars(&result.passage.title, 50)),
            Cell::new(result.passage.page),
            Cell::new(truncate_chars(&result.passage.content, 80)),
            Cell::new(relevance_str).fg(color),
            Cell::new(format!("{:.4}", result.score)),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[RetrievedPassage]) -> Result<String> {
    serde_json::to_string_pretty(results).context("Failed to serialize results to JSON")
}

/// Format results as bare passage texts
fn format_results_text(results: &[RetrievedPassage]) -> String {
    results
        .iter()
        .map(|r| r.passage.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn print_results(results: &[RetrievedPassage], metric: Metric, format: OutputFormat, elapsed: f64) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(results, metric));
            println!("\nFound {} passages in {:.2}s ({})", results.len(), elapsed, metric);
        }
        OutputFormat::Json => println!("{}", format_results_json(results)?),
        OutputFormat::Text => println!("{}", format_results_text(results)),
    }
    Ok(())
}

/// Display the full passage behind a result
fn display_result_detail(result: &RetrievedPassage) {
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", result.rank);
    println!("Title: {}", result.passage.title);
    println!("Page: {}", result.passage.page);
    println!("Corpus index: {}", result.index);
    if let Some(relevance) = result.relevance {
        println!("Relevance: {:?}", relevance);
    }
    println!("Score: {:.4}", result.score);
    println!("\n{}", result.passage.content);
    println!("{}", "═".repeat(80));
}

/// Execute a search and return results
async fn execute_search<E: EmbeddingProvider>(
    engine: &KnowledgeBaseSearchEngine<E>,
    question: &str,
    metric: Metric,
    top_k: usize,
) -> Result<Vec<RetrievedPassage>> {
    debug!("Executing search for question: {}", question);

    let query = SearchQuery::new(question.to_string(), Some(metric), Some(top_k));
    engine
        .search(&query)
        .await
        .with_context(|| format!("Failed to search for: '{}'", question))
}

/// Run interactive REPL mode
async fn run_interactive<E: EmbeddingProvider>(
    engine: KnowledgeBaseSearchEngine<E>,
    mut metric: Metric,
    mut top_k: usize,
    mut format: OutputFormat,
) -> Result<()> {
    println!(
        "Interactive Knowledge Base Search ({} passages)",
        engine.knowledge_base().len()
    );
    println!("{}\n", HELP);

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;
    let mut last_results: Vec<RetrievedPassage> = Vec::new();

    loop {
        match rl.readline("Ask> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // history is best effort
                let _ = rl.add_history_entry(line);

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match (parts[0], parts.get(1).copied(), parts.len()) {
                        ("/help", _, _) => println!("{}", HELP),
                        ("/top", Some(n), 2) => match n.parse::<usize>() {
                            Ok(n) if n > 0 => {
                                top_k = n;
                                println!("Set top-k to {}", top_k);
                            }
                            _ => eprintln!("Invalid number: must be a positive integer"),
                        },
                        ("/top", _, _) => eprintln!("Usage: /top N"),
                        ("/metric", Some(name), 2) => match name.parse::<Metric>() {
                            Ok(m) => {
                                metric = m;
                                println!("Set metric to {}", metric);
                            }
                            Err(e) => eprintln!("{} (expected cos, l2 or ip)", e),
                        },
                        ("/metric", _, _) => eprintln!("Usage: /metric cos|l2|ip"),
                        ("/format", Some(name), 2) => match OutputFormat::from_str(name, true) {
                            Ok(f) => {
                                format = f;
                                println!("Set output format to {}", name.to_lowercase());
                            }
                            Err(_) => eprintln!("Invalid format: must be 'table', 'json' or 'text'"),
                        },
                        ("/format", _, _) => eprintln!("Usage: /format table|json|text"),
                        ("/detail", Some(n), 2) => match n.parse::<usize>() {
                            Ok(rank) if rank > 0 && rank <= last_results.len() => {
                                display_result_detail(&last_results[rank - 1]);
                            }
                            Ok(rank) if rank > last_results.len() => {
                                eprintln!(
                                    "Rank {} out of range (last search had {} results)",
                                    rank,
                                    last_results.len()
                                );
                            }
                            _ => eprintln!("Invalid rank: must be a positive integer"),
                        },
                        ("/detail", _, _) => eprintln!("Usage: /detail N"),
                        (other, _, _) => {
                            eprintln!("Unknown command: {}. Type /help for available commands.", other)
                        }
                    }
                    continue;
                }

                let start = Instant::now();
                match execute_search(&engine, line, metric, top_k).await {
                    Ok(results) => {
                        if let Err(e) = print_results(&results, metric, format, start.elapsed().as_secs_f64()) {
                            eprintln!("Error formatting results: {}", e);
                        }
                        last_results = results;
                    }
                    Err(e) => eprintln!("Search failed: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    if !args.kb_path.exists() {
        anyhow::bail!(
            "Knowledge base not found: {}\n\
             Please run build_kb first to create it.",
            args.kb_path.display()
        );
    }

    info!("Loading knowledge base from: {}", args.kb_path.display());
    let kb = KnowledgeBase::load(&args.kb_path)
        .with_context(|| format!("Failed to load knowledge base {}", args.kb_path.display()))?;

    info!(
        "Using embedding model: {} (dimension: {}), {} passages",
        kb.config.model_name,
        kb.config.dimension,
        kb.len()
    );

    if kb.is_empty() {
        anyhow::bail!("Knowledge base is empty. Please rebuild it with build_kb.");
    }

    let embedding_provider = DynamicEmbeddingProvider::for_config(&kb.config, args.cache_dir.clone())
        .context("Failed to create the embedding provider the knowledge base was built with")?;

    let engine = KnowledgeBaseSearchEngine::new(embedding_provider, Arc::new(kb))?;

    if args.interactive {
        return run_interactive(engine, args.metric, args.top_k, args.format).await;
    }

    let Some(question) = args.question else {
        anyhow::bail!(
            "Either --question or --interactive must be specified.\n\
             Use --help for usage information."
        );
    };

    let start = Instant::now();
    let results = execute_search(&engine, &question, args.metric, args.top_k).await?;
    print_results(&results, args.metric, args.format, start.elapsed().as_secs_f64())
}
