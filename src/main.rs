//! # Lorebase CLI (`lore`)
//!
//! The `lore` binary drives the ingestion/indexing pipeline and answers
//! questions against the indexed corpus.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore init` | Create the index database schema (idempotent) |
//! | `lore ingest` | Sweep the source catalog into the corpus |
//! | `lore index` | Build the vector index, or reattach if populated |
//! | `lore ask "<q>"` | Retrieve context and generate an answer |
//! | `lore status` | Per-category coverage report |
//! | `lore reindex` | Clear the vector index (next load rebuilds) |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lorebase::{answer, config, corpus, db, embedding, index, ingest, retrieve, status};

/// Lorebase — a local-first knowledge assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file holding the corpus paths, the source catalog, and provider settings.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Lorebase — a local-first knowledge assistant with idempotent ingestion and recency-aware retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database schema.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Sweep the source catalog into the corpus.
    ///
    /// Already-ingested sources are skipped via the cache-key test, so a
    /// sweep over an unchanged corpus performs zero network fetches.
    /// Per-source failures are logged and never abort the sweep.
    Ingest,

    /// Build the vector index, or reattach to an existing one.
    ///
    /// An empty persisted store triggers a full build (reads and embeds
    /// the whole corpus); a populated store is reattached without touching
    /// the corpus or the embedder. Records ingested after a build stay
    /// invisible until `lore reindex`.
    Index,

    /// Ask a question against the indexed corpus.
    Ask {
        /// The question to answer.
        question: String,

        /// Similarity candidates to consider before the recency stage.
        #[arg(long)]
        top_k: Option<usize>,

        /// Passages surviving the recency stage.
        #[arg(long)]
        recency_window: Option<usize>,
    },

    /// Show per-category ingestion coverage and index state.
    Status,

    /// Clear the persisted vector index.
    ///
    /// The next `lore index` or `lore ask` rebuilds from the corpus —
    /// this is how newly ingested records become visible.
    Reindex,
}

/// Cancellation flag flipped by Ctrl-C; the index builder polls it
/// between records.
fn spawn_cancel_watcher() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.index.db_path).await?;
            index::run_migrations(&pool).await?;
            pool.close().await;
            println!("Index database initialized successfully.");
        }
        Commands::Ingest => {
            ingest::run_ingest_cmd(&cfg).await?;
        }
        Commands::Index => {
            let store = corpus::CorpusStore::open(&cfg.corpus.dir)?;
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            let pool = db::connect(&cfg.index.db_path).await?;
            let cancel = spawn_cancel_watcher();

            let summary = index::load_or_build(
                &pool,
                &store,
                embedder.as_ref(),
                cfg.index.max_chunk_chars,
                &cancel,
            )
            .await?;
            pool.close().await;

            match summary.path {
                index::IndexPath::FullBuild => {
                    println!("index built: {} entries", summary.entry_count);
                }
                index::IndexPath::FastAttach => {
                    println!("index attached: {} entries (corpus not re-read)", summary.entry_count);
                }
            }
        }
        Commands::Ask {
            question,
            top_k,
            recency_window,
        } => {
            let store = corpus::CorpusStore::open(&cfg.corpus.dir)?;
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            let provider = answer::create_answer_provider(&cfg.answer)?;
            let pool = db::connect(&cfg.index.db_path).await?;
            let cancel = spawn_cancel_watcher();

            index::load_or_build(
                &pool,
                &store,
                embedder.as_ref(),
                cfg.index.max_chunk_chars,
                &cancel,
            )
            .await?;

            let passages = retrieve::answer_context(
                &pool,
                embedder.as_ref(),
                &question,
                top_k.unwrap_or(cfg.retrieval.top_k),
                recency_window.unwrap_or(cfg.retrieval.recency_window),
            )
            .await?;

            let reply = answer::answer_question(provider.as_ref(), &question, &passages).await?;
            pool.close().await;

            println!("{}", reply);
            if !passages.is_empty() {
                println!();
                println!("sources:");
                for p in &passages {
                    println!("  [{}] {}", p.source_date.format("%Y-%m-%d"), p.source_url);
                }
            }
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Reindex => {
            let pool = db::connect(&cfg.index.db_path).await?;
            index::run_migrations(&pool).await?;
            let removed = index::clear(&pool).await?;
            pool.close().await;
            println!("index cleared: {} entries removed", removed);
            println!("next `lore index` or `lore ask` will rebuild from the corpus");
        }
    }

    Ok(())
}
