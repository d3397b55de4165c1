//! Vector index: persistence, build, and load.
//!
//! The persisted store's entry count is the sole rebuild-vs-reattach signal:
//!
//! - **count == 0 (slow path)** — enumerate every corpus record, chunk it,
//!   embed it, and publish all entries in a single transaction. An
//!   embedding failure or a cancellation aborts the build and publishes
//!   nothing; there is never a partially built index on disk.
//! - **count > 0 (fast path)** — reattach to the existing entries without
//!   reading the corpus or invoking the embedder.
//!
//! Operational caveat, by design: corpus records added after the index was
//! built are invisible on the fast path. `lore reindex` clears the store,
//! which forces the next load onto the slow path. This staleness trade-off
//! buys instant startup on a warm index and is the documented behavior,
//! not a bug.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::corpus::CorpusStore;
use crate::embedding::{vec_to_blob, Embedder};

/// Which branch `load_or_build` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPath {
    /// Reattached to a populated store; corpus untouched, embedder idle.
    FastAttach,
    /// Store was empty; the whole corpus was embedded and published.
    FullBuild,
}

/// Outcome of a `load_or_build` call.
#[derive(Debug, Clone, Copy)]
pub struct IndexSummary {
    pub path: IndexPath,
    pub entry_count: i64,
}

/// Create the index schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_entries (
            id TEXT PRIMARY KEY,
            record_key TEXT NOT NULL,
            source_url TEXT NOT NULL,
            source_date TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(record_key, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_record_key ON index_entries(record_key)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_source_date ON index_entries(source_date DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of persisted index entries.
pub async fn entry_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete every index entry, forcing the next load onto the slow path.
pub async fn clear(pool: &SqlitePool) -> Result<i64> {
    let before = entry_count(pool).await?;
    sqlx::query("DELETE FROM index_entries").execute(pool).await?;
    Ok(before)
}

/// Attach to the persisted index, building it first if it is empty.
///
/// Exactly one of the two paths executes per call; a fast attach never
/// merges in freshly embedded entries. Embedding failures on the slow path
/// surface to the caller with nothing published.
pub async fn load_or_build(
    pool: &SqlitePool,
    corpus: &CorpusStore,
    embedder: &dyn Embedder,
    max_chunk_chars: usize,
    cancel: &AtomicBool,
) -> Result<IndexSummary> {
    run_migrations(pool).await?;

    let count = entry_count(pool).await?;
    if count > 0 {
        return Ok(IndexSummary {
            path: IndexPath::FastAttach,
            entry_count: count,
        });
    }

    let entries = build_entries(corpus, embedder, max_chunk_chars, cancel).await?;
    let published = publish_entries(pool, &entries, embedder).await?;

    Ok(IndexSummary {
        path: IndexPath::FullBuild,
        entry_count: published,
    })
}

/// A staged entry, not yet persisted.
struct StagedEntry {
    id: String,
    record_key: String,
    source_url: String,
    source_date: String,
    chunk_index: i64,
    content_hash: String,
    text: String,
    embedding: Vec<u8>,
}

/// Slow path, stage 1: read, chunk, and embed the whole corpus.
///
/// The cancellation flag is checked between records so a long build over
/// hundreds of records can be interrupted; an interrupted build returns an
/// error before anything is written.
async fn build_entries(
    corpus: &CorpusStore,
    embedder: &dyn Embedder,
    max_chunk_chars: usize,
    cancel: &AtomicBool,
) -> Result<Vec<StagedEntry>> {
    let records = corpus.list_all()?;
    let mut staged = Vec::new();

    for record in &records {
        if cancel.load(Ordering::Relaxed) {
            anyhow::bail!("Index build cancelled before completion; nothing was published");
        }

        let chunks = chunk_text(&record.key, &record.body, max_chunk_chars);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let vectors = embedder
            .embed(&texts)
            .await
            .with_context(|| format!("Failed to embed record {}", record.key))?;

        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} chunks of {}",
                vectors.len(),
                chunks.len(),
                record.key
            );
        }

        let content_hash = hash_text(&record.body);
        // Invariant: every entry carries a concrete, parseable date.
        // CorpusStore::read already applied the mtime fallback.
        let source_date = record.effective_date.format("%Y-%m-%d").to_string();

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            staged.push(StagedEntry {
                id: Uuid::new_v4().to_string(),
                record_key: record.key.clone(),
                source_url: record.header.source_url.clone(),
                source_date: source_date.clone(),
                chunk_index: chunk.chunk_index,
                content_hash: content_hash.clone(),
                text: chunk.text.clone(),
                embedding: vec_to_blob(vector),
            });
        }
    }

    Ok(staged)
}

/// Slow path, stage 2: publish all staged entries in one transaction.
async fn publish_entries(
    pool: &SqlitePool,
    entries: &[StagedEntry],
    embedder: &dyn Embedder,
) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();
    let model = embedder.model_name().to_string();
    let dims = embedder.dims() as i64;

    let mut tx = pool.begin().await?;

    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO index_entries
                (id, record_key, source_url, source_date, chunk_index, content_hash, text, embedding, model, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.record_key)
        .bind(&entry.source_url)
        .bind(&entry.source_date)
        .bind(entry.chunk_index)
        .bind(&entry.content_hash)
        .bind(&entry.text)
        .bind(&entry.embedding)
        .bind(&model)
        .bind(dims)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(entries.len() as i64)
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
