//! Coverage report: catalog vs corpus vs index.
//!
//! Computes per-category ingested/missing counts through the same
//! `derive_cache_key` + `exists` pair the orchestrator uses, so the report
//! can never disagree with what the next sweep would actually skip.

use anyhow::Result;

use crate::cache_key::derive_cache_key;
use crate::catalog::{Catalog, Category};
use crate::config::Config;
use crate::corpus::CorpusStore;
use crate::{db, index};

pub async fn run_status(config: &Config) -> Result<()> {
    let catalog = Catalog::load(config)?;
    let store = CorpusStore::open(&config.corpus.dir)?;

    println!("{:<12} {:>8} {:>8} {:>8}", "CATEGORY", "SOURCES", "INGESTED", "MISSING");

    let mut total_missing: Vec<String> = Vec::new();

    for category in [Category::Manual, Category::Reference, Category::Commentary] {
        let entries: Vec<_> = catalog
            .entries()
            .iter()
            .filter(|e| e.category == category)
            .collect();

        let mut ingested = 0usize;
        let mut missing = 0usize;
        for entry in &entries {
            if store.exists(&derive_cache_key(entry)) {
                ingested += 1;
            } else {
                missing += 1;
                if total_missing.len() < 5 {
                    total_missing.push(entry.url.clone());
                }
            }
        }

        println!(
            "{:<12} {:>8} {:>8} {:>8}",
            category.label(),
            entries.len(),
            ingested,
            missing
        );
    }

    if !total_missing.is_empty() {
        println!();
        println!("missing (first {}):", total_missing.len());
        for url in &total_missing {
            println!("  - {}", url);
        }
    }

    println!();
    println!("corpus records: {}", store.record_count()?);

    let pool = db::connect(&config.index.db_path).await?;
    index::run_migrations(&pool).await?;
    let entries = index::entry_count(&pool).await?;
    println!("index entries:  {}", entries);
    if entries == 0 {
        println!("index state:    empty (next load takes the slow path)");
    } else {
        println!("index state:    populated (loads reattach; `lore reindex` to rebuild)");
    }
    pool.close().await;

    Ok(())
}
