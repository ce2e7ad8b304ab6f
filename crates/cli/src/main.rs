use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use loglens_vector_store::{Metadata, StoreConfig, TfidfVectorizer, VectorEntry, VectorStore};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod docs;

const DEFAULT_STORE: &str = ".loglens/store.json";

#[derive(Parser)]
#[command(name = "loglens")]
#[command(about = "Index and search log-analysis documentation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a TF-IDF vectorizer over a documentation tree and store one vector per file
    Index(IndexArgs),

    /// Rank stored documents against a free-text query
    Search(SearchArgs),

    /// Show store statistics
    Stats(StatsArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Directory containing .md / .txt documents
    docs_dir: PathBuf,

    /// Store file to write
    #[arg(long, default_value = DEFAULT_STORE)]
    store: PathBuf,

    /// Vector dimensionality (vocabulary size)
    #[arg(long, default_value_t = 512)]
    dimensions: usize,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    #[arg(long, default_value = DEFAULT_STORE)]
    store: PathBuf,

    /// Maximum number of hits
    #[arg(short = 'k', long, default_value_t = 5)]
    top_k: usize,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatsArgs {
    #[arg(long, default_value = DEFAULT_STORE)]
    store: PathBuf,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct IndexOutput {
    documents: usize,
    dimensions: usize,
    vocabulary: usize,
    store: PathBuf,
    vectorizer: PathBuf,
}

#[derive(Serialize)]
struct SearchHit {
    rank: usize,
    id: String,
    score: f32,
    title: String,
    path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers.
    let json_output = match &cli.command {
        Commands::Index(args) => args.json,
        Commands::Search(args) => args.json,
        Commands::Stats(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Index(args) => run_index(args).await?,
        Commands::Search(args) => run_search(args).await?,
        Commands::Stats(args) => run_stats(args).await?,
    }

    Ok(())
}

async fn run_index(args: IndexArgs) -> Result<()> {
    let documents = docs::collect(&args.docs_dir)
        .with_context(|| format!("Failed to read documents from {}", args.docs_dir.display()))?;
    if documents.is_empty() {
        bail!("No .md or .txt documents found under {}", args.docs_dir.display());
    }
    log::info!("Indexing {} documents", documents.len());

    let mut vectorizer = TfidfVectorizer::new(args.dimensions);
    let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
    let vectors = vectorizer
        .fit_transform(&texts)
        .context("Failed to fit vectorizer")?;

    let base = StoreConfig::from_env();
    let config = StoreConfig {
        max_vectors: base.max_vectors.max(documents.len()),
        persist_path: None,
        autosave_interval: None,
        ..base
    };
    let store = VectorStore::new(config)?;
    let batch = documents
        .into_iter()
        .zip(vectors)
        .map(|(doc, vector)| {
            let mut entry = VectorEntry::new(&doc.id, &doc.text, vector);
            entry.metadata = Metadata::from([
                ("path".to_string(), doc.id.clone()),
                ("title".to_string(), doc.title),
            ]);
            entry
        })
        .collect();
    let stored = store.store_batch(batch)?;

    if let Some(parent) = args.store.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let vectorizer_path = vectorizer_path(&args.store);
    store
        .save_to_file(&args.store)
        .await
        .with_context(|| format!("Failed to save store to {}", args.store.display()))?;
    vectorizer
        .save(&vectorizer_path)
        .await
        .with_context(|| format!("Failed to save vectorizer to {}", vectorizer_path.display()))?;

    let out = IndexOutput {
        documents: stored,
        dimensions: vectorizer.dimensions(),
        vocabulary: vectorizer.vocabulary_size(),
        store: args.store,
        vectorizer: vectorizer_path,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Indexed {} documents ({} terms) into {}",
            out.documents,
            out.vocabulary,
            out.store.display()
        );
    }
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let vectorizer_path = vectorizer_path(&args.store);
    let vectorizer = TfidfVectorizer::load(&vectorizer_path)
        .await
        .with_context(|| format!("Failed to load vectorizer from {}", vectorizer_path.display()))?;
    let store = load_store(&args.store).await?;

    let query = vectorizer.vectorize(&args.query)?;
    let hits: Vec<SearchHit> = store
        .search(&query, args.top_k)
        .into_iter()
        .enumerate()
        .map(|(i, result)| SearchHit {
            rank: i + 1,
            title: result.metadata.get("title").cloned().unwrap_or_default(),
            path: result
                .metadata
                .get("path")
                .cloned()
                .unwrap_or_else(|| result.id.clone()),
            id: result.id,
            score: result.score,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        eprintln!("No results");
    } else {
        for hit in &hits {
            println!("{}. {} (score: {:.3})", hit.rank, hit.path, hit.score);
            if !hit.title.is_empty() {
                println!("   Title: {}", hit.title);
            }
        }
    }
    Ok(())
}

async fn run_stats(args: StatsArgs) -> Result<()> {
    let store = load_store(&args.store).await?;
    let stats = store.stats();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Vectors: {} / {}", stats.vectors, stats.max_vectors);
        println!(
            "Cache: {} (policy {})",
            if stats.cache_enabled { "enabled" } else { "disabled" },
            store.config().eviction_policy.as_str()
        );
    }
    Ok(())
}

/// Opens a store file for reading without autosave or a capacity limit.
async fn load_store(path: &Path) -> Result<VectorStore> {
    let config = StoreConfig {
        max_vectors: usize::MAX,
        persist_path: None,
        autosave_interval: None,
        ..StoreConfig::from_env()
    };
    let store = VectorStore::new(config)?;
    store
        .load_from_file(path)
        .await
        .with_context(|| format!("Failed to load store from {}", path.display()))?;
    Ok(store)
}

/// `store.json` -> `store.tfidf.json`, next to the store.
fn vectorizer_path(store: &Path) -> PathBuf {
    let stem = store
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    store.with_file_name(format!("{stem}.tfidf.json"))
}
