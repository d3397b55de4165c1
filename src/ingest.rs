//! Ingestion orchestration.
//!
//! Sweeps the source catalog: cache-key test → fetch+extract on miss →
//! minimum-length gate → corpus write. At most one fetch per source per
//! corpus lifetime; re-running a sweep over an unchanged corpus performs
//! zero network work. Every per-entry failure (fetch, extract, too-short
//! content, corpus write) is logged and counted, never raised — one bad
//! source must not block the rest of the sweep.
//!
//! The sweep is a single serialized loop, which also satisfies the
//! per-key exists/write ordering requirement without any locking.

use anyhow::Result;

use crate::cache_key::derive_cache_key;
use crate::catalog::{Catalog, Category, SourceEntry};
use crate::config::Config;
use crate::corpus::{CorpusStore, RecordHeader};
use crate::fetch::FetchExtract;

/// Per-category tallies for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryReport {
    /// Fetched, extracted, and written this sweep.
    pub fetched: usize,
    /// Skipped because the record already existed.
    pub cached: usize,
    /// Fetch/extract/write failures, including short-content rejections.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestionReport {
    pub manual: CategoryReport,
    pub reference: CategoryReport,
    pub commentary: CategoryReport,
}

impl IngestionReport {
    fn for_category(&mut self, category: Category) -> &mut CategoryReport {
        match category {
            Category::Manual => &mut self.manual,
            Category::Reference => &mut self.reference,
            Category::Commentary => &mut self.commentary,
        }
    }

    pub fn total_fetched(&self) -> usize {
        self.manual.fetched + self.reference.fetched + self.commentary.fetched
    }

    pub fn total_cached(&self) -> usize {
        self.manual.cached + self.reference.cached + self.commentary.cached
    }

    pub fn total_failed(&self) -> usize {
        self.manual.failed + self.reference.failed + self.commentary.failed
    }
}

/// Run one ingestion sweep over the catalog.
///
/// The existence check and the write key both come from
/// [`derive_cache_key`] — the one derivation, used twice. Deriving the
/// write name any other way (say, from a scraped page title) silently
/// breaks the cache and re-fetches the catalog forever.
pub async fn run_ingest(
    catalog: &Catalog,
    store: &CorpusStore,
    fetcher: &dyn FetchExtract,
    config: &Config,
) -> Result<IngestionReport> {
    let mut report = IngestionReport::default();

    for entry in catalog.entries() {
        let key = derive_cache_key(entry);
        let tally = report.for_category(entry.category);

        if store.exists(&key) {
            tally.cached += 1;
            continue;
        }

        let extracted = match fetcher.fetch_and_extract(entry).await {
            Ok(e) => e,
            Err(err) => {
                eprintln!("Warning: fetch failed for {}: {}", entry.url, err);
                tally.failed += 1;
                continue;
            }
        };

        // Block-page heuristic. Manual sources are human-curated and
        // bypass it entirely.
        if entry.category != Category::Manual
            && extracted.text.len() < config.ingest.min_content_len
        {
            eprintln!(
                "Warning: rejecting {} — {} chars is below the content threshold",
                entry.url,
                extracted.text.len()
            );
            tally.failed += 1;
            continue;
        }

        let header = RecordHeader {
            source_url: source_url_for(entry),
            source_date: extracted.publication_date,
        };

        if let Err(err) = store.write(&key, &header, &extracted.text) {
            eprintln!("Warning: failed to write record {}: {}", key, err);
            tally.failed += 1;
            continue;
        }

        tally.fetched += 1;
    }

    Ok(report)
}

/// Manual entries record a file URL; networked entries record their URL.
fn source_url_for(entry: &SourceEntry) -> String {
    match entry.category {
        Category::Manual => format!("file://{}", entry.url),
        _ => entry.url.clone(),
    }
}

/// CLI entry point: build the catalog and the HTTP fetcher, sweep, print.
pub async fn run_ingest_cmd(config: &Config) -> Result<()> {
    let catalog = Catalog::load(config)?;
    let store = CorpusStore::open(&config.corpus.dir)?;
    let fetcher = crate::fetch::HttpFetcher::new(config.ingest.fetch_timeout_secs)?;

    let report = run_ingest(&catalog, &store, &fetcher, config).await?;

    println!("ingest");
    println!("  catalog entries: {}", catalog.len());
    for (label, tally) in [
        ("manual", &report.manual),
        ("reference", &report.reference),
        ("commentary", &report.commentary),
    ] {
        println!(
            "  {:<12} fetched: {:<4} cached: {:<4} failed: {}",
            label, tally.fetched, tally.cached, tally.failed
        );
    }
    println!(
        "  total: {} fetched, {} cached, {} failed",
        report.total_fetched(),
        report.total_cached(),
        report.total_failed()
    );
    println!("ok");

    Ok(())
}
