//! Community Graph CLI
//!
//! Builds a community-summarized knowledge graph from a folder of documents
//! and answers questions against it.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commgraph_agents::{
    ChatClient, ExtractionPolicy, Pipeline, PipelineConfig, PipelineRun, PromptSet, QueryAnswerer,
};
use commgraph_core::document::{list_article_titles, read_source};
use commgraph_core::dot::render_dot;
use commgraph_core::{EntityGraph, FILE_NOT_FOUND};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const RUN_FILE: &str = "run.json";

/// Community Graph - question answering over community summaries of a knowledge graph
#[derive(Parser)]
#[command(name = "commgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the saved run (defaults to ~/.commgraph/run)
    #[arg(short, long, global = true)]
    run_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph, communities and summaries from a data folder
    Build(BuildArgs),

    /// Answer a question from the saved community summaries
    Query {
        /// The question
        query: String,

        /// Rewrite the final answer as ranked bullet points
        #[arg(long)]
        refine: bool,

        /// Also print the intermediate answers
        #[arg(long)]
        show_intermediate: bool,

        /// Directory of prompt overrides ({name}.txt)
        #[arg(long)]
        prompts: Option<PathBuf>,
    },

    /// List the community summaries of the saved run
    Communities,

    /// Show build statistics of the saved run
    Stats,

    /// List the article titles of a data folder
    Sources {
        /// Data folder (defaults to the saved run's folder)
        folder: Option<PathBuf>,
    },

    /// Print a source document by name
    ShowSource {
        /// File name, e.g. article.txt
        name: String,

        /// Data folder (defaults to the saved run's folder)
        #[arg(short, long)]
        folder: Option<PathBuf>,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Folder of documents to process
    data_folder: PathBuf,

    /// Tokens per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Tokens shared by consecutive chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Maximum model calls in flight
    #[arg(short = 'j', long)]
    max_concurrency: Option<usize>,

    /// Seconds before a single model call is abandoned
    #[arg(long)]
    timeout: Option<u64>,

    /// Retry a failed chunk extraction this many times
    #[arg(long, conflicts_with = "abort_on_failure")]
    retries: Option<usize>,

    /// Fail the build when any chunk cannot be extracted
    #[arg(long)]
    abort_on_failure: bool,

    /// Directory of prompt overrides ({name}.txt)
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// Allowed node labels (comma-separated)
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,

    /// Allowed relationship types (comma-separated)
    #[arg(long, value_delimiter = ',')]
    relationships: Vec<String>,

    /// Louvain resolution
    #[arg(long)]
    resolution: Option<f64>,

    /// Also write a Graphviz rendering of the communities
    #[arg(long)]
    dot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let run_dir = match cli.run_dir {
        Some(dir) => dir,
        None => default_run_dir()?,
    };

    match cli.command {
        Commands::Build(args) => {
            cmd_build(&run_dir, args).await?;
        }
        Commands::Query {
            query,
            refine,
            show_intermediate,
            prompts,
        } => {
            cmd_query(&run_dir, query, refine, show_intermediate, prompts).await?;
        }
        Commands::Communities => {
            cmd_communities(&run_dir)?;
        }
        Commands::Stats => {
            cmd_stats(&run_dir)?;
        }
        Commands::Sources { folder } => {
            cmd_sources(&run_dir, folder)?;
        }
        Commands::ShowSource { name, folder } => {
            cmd_show_source(&run_dir, name, folder)?;
        }
    }

    Ok(())
}

fn default_run_dir() -> Result<PathBuf> {
    let mut path = dirs::home_dir().context("Could not find home directory")?;
    path.push(".commgraph");
    path.push("run");
    Ok(path)
}

fn save_run(run_dir: &Path, run: &PipelineRun) -> Result<PathBuf> {
    std::fs::create_dir_all(run_dir)
        .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;
    let path = run_dir.join(RUN_FILE);
    let json = serde_json::to_string_pretty(run).context("Failed to serialize run")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn load_run(run_dir: &Path) -> Result<PipelineRun> {
    let path = run_dir.join(RUN_FILE);
    let json = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "No saved run at {} (run `commgraph build <folder>` first)",
            path.display()
        )
    })?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Explicit folder, else the folder the saved run was built from
fn data_folder(run_dir: &Path, folder: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(folder) = folder {
        return Ok(folder);
    }
    load_run(run_dir)?
        .data_folder
        .map(PathBuf::from)
        .context("The saved run has no data folder; pass one explicitly")
}

fn chat_client(config: &PipelineConfig) -> Result<ChatClient> {
    let client = ChatClient::from_env()
        .context("Failed to configure the language model (see LLM_PROVIDER, OPENAI_API_KEY)")?
        .with_timeout(config.call_timeout);
    info!(provider = ?client.provider(), model = client.model(), "Using language model");
    Ok(client)
}

fn load_prompts(dir: Option<&Path>) -> Result<PromptSet> {
    match dir {
        Some(dir) => PromptSet::from_dir(dir)
            .with_context(|| format!("Failed to load prompts from {}", dir.display())),
        None => Ok(PromptSet::default()),
    }
}

async fn cmd_build(run_dir: &Path, args: BuildArgs) -> Result<()> {
    let mut config = PipelineConfig::from_env();
    if args.chunk_size.is_some() || args.chunk_overlap.is_some() {
        let size = args.chunk_size.unwrap_or(config.chunk_size);
        let overlap = args.chunk_overlap.unwrap_or(config.chunk_overlap);
        config = config.with_chunking(size, overlap);
    }
    if let Some(n) = args.max_concurrency {
        config = config.with_max_concurrency(n);
    }
    if let Some(secs) = args.timeout {
        config = config.with_call_timeout(Duration::from_secs(secs));
    }
    if let Some(n) = args.retries {
        config = config.with_extraction_policy(ExtractionPolicy::Retry(n));
    }
    if args.abort_on_failure {
        config = config.with_extraction_policy(ExtractionPolicy::Abort);
    }
    if !args.nodes.is_empty() {
        config = config.with_allowed_nodes(args.nodes);
    }
    if !args.relationships.is_empty() {
        config = config.with_allowed_relationships(args.relationships);
    }
    if let Some(r) = args.resolution {
        config = config.with_resolution(r);
    }

    let prompts = load_prompts(args.prompts.as_deref())?;

    let client = chat_client(&config)?;
    let model_ok = client.health().await.unwrap_or(false);
    if !model_ok {
        eprintln!("Error: language model is not reachable.");
        eprintln!("  {:?}: {}", client.provider(), client.base_url());
        anyhow::bail!("Language model unavailable");
    }

    let pipeline = Pipeline::new(Arc::new(client), prompts, config)?;
    let run = pipeline
        .build_from_folder(&args.data_folder)
        .await
        .with_context(|| format!("Failed to build from {}", args.data_folder.display()))?;

    let saved = save_run(run_dir, &run)?;

    if let Some(dot_path) = &args.dot {
        let projection = EntityGraph::from_document(&run.graph);
        std::fs::write(dot_path, render_dot(&projection, &run.partition))
            .with_context(|| format!("Failed to write {}", dot_path.display()))?;
        println!("✓ Wrote graph report to {}", dot_path.display());
    }

    let stats = &run.report.stats;
    println!("✓ Built run {}", run.run_id);
    println!("  • Files: {}", stats.files);
    println!("  • Chunks: {}", stats.chunks);
    println!("  • Entities: {}", stats.entities);
    println!("  • Communities: {}", run.partition.len());
    println!("  • Modularity: {:.4}", run.partition.modularity);
    println!("  • Elapsed: {:.2}s", run.report.elapsed_ms as f64 / 1000.0);
    println!("  • Saved to {}", saved.display());

    Ok(())
}

async fn cmd_query(
    run_dir: &Path,
    query: String,
    refine: bool,
    show_intermediate: bool,
    prompts: Option<PathBuf>,
) -> Result<()> {
    let run = load_run(run_dir)?;
    let prompts = load_prompts(prompts.as_deref())?;
    // Answering never chunks, so the chunking settings are not validated here
    let config = PipelineConfig::from_env();
    let client = chat_client(&config)?;
    let answerer = QueryAnswerer::new(Arc::new(client), Arc::new(prompts), config.pool())
        .with_refinement(refine);

    let answer = answerer
        .answer(&query, &run.summaries, &run.source_names())
        .await?;

    if show_intermediate {
        for (i, partial) in answer.intermediate.iter().enumerate() {
            println!("[{}] {}", i + 1, partial);
        }
        println!();
    }

    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  • {}", source);
        }
    }

    Ok(())
}

fn cmd_communities(run_dir: &Path) -> Result<()> {
    let run = load_run(run_dir)?;

    if run.summaries.is_empty() {
        println!("No communities.");
        return Ok(());
    }
    println!("{}", run.digest());

    Ok(())
}

fn cmd_stats(run_dir: &Path) -> Result<()> {
    let run = load_run(run_dir)?;
    let report = &run.report;
    let stats = &report.stats;

    println!("Run {} ({})", run.run_id, run.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  • Files: {}", stats.files);
    println!("  • Chunks: {}", stats.chunks);
    println!("  • Entities: {}", stats.entities);
    println!("  • Relationships: {}", stats.relationships);
    println!("  • Provenance edges: {}", stats.provenance_edges);
    println!("  • Communities: {}", run.partition.len());
    println!("  • Elapsed: {:.2}s", report.elapsed_ms as f64 / 1000.0);

    if !report.file_failures.is_empty() {
        println!("  • Files skipped: {}", report.file_failures.len());
        for failure in &report.file_failures {
            println!("    - {}: {}", failure.path, failure.error);
        }
    }
    let failed: Vec<_> = report.failed_chunks().collect();
    if !failed.is_empty() {
        println!("  • Chunks failed: {}", failed.len());
        for outcome in failed {
            println!("    - {} chunk {}", outcome.file, outcome.chunk);
        }
    }
    let placeholders = run.summaries.iter().filter(|s| s.is_placeholder()).count();
    if placeholders > 0 {
        println!("  • Summaries failed: {}", placeholders);
    }

    Ok(())
}

fn cmd_sources(run_dir: &Path, folder: Option<PathBuf>) -> Result<()> {
    let folder = data_folder(run_dir, folder)?;
    let titles = list_article_titles(&folder);

    if titles.is_empty() {
        println!("No articles in {}", folder.display());
        return Ok(());
    }
    for title in titles {
        println!("{}", title);
    }

    Ok(())
}

fn cmd_show_source(run_dir: &Path, name: String, folder: Option<PathBuf>) -> Result<()> {
    let folder = data_folder(run_dir, folder)?;

    match read_source(&folder, &name) {
        Some(text) => println!("{}", text),
        None => println!("{}", FILE_NOT_FOUND),
    }

    Ok(())
}
