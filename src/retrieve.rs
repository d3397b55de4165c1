//! Retrieval: similarity search plus recency rerank.
//!
//! Two stages, and only two:
//!
//! 1. **Similarity** — embed the question, cosine-score every index entry,
//!    keep the `top_k` best. Ties break on insertion order (rowid), so
//!    results are stable across runs.
//! 2. **Recency** — of those, keep at most `recency_window` entries sorted
//!    by source date, newest first. The knowledge domain is under active
//!    development; a slightly-less-similar-but-newer passage should
//!    displace an older best match.
//!
//! An empty index yields an empty passage list (the caller renders a
//! "no knowledge available" reply); an unreachable index store is an error,
//! never silently empty.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use crate::embedding::{self, Embedder};

/// One retrieved passage, ready to hand to the answer generator.
#[derive(Debug, Clone)]
pub struct Passage {
    pub record_key: String,
    pub source_url: String,
    pub source_date: NaiveDate,
    pub text: String,
    pub similarity: f32,
}

/// Retrieve the context passages for a question.
///
/// Returns an empty vector when the index holds no entries. Fails when the
/// index store itself is unreachable — callers must distinguish "cannot
/// answer" from "no relevant context".
pub async fn answer_context(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    question: &str,
    top_k: usize,
    recency_window: usize,
) -> Result<Vec<Passage>> {
    let rows = sqlx::query(
        r#"
        SELECT rowid, record_key, source_url, source_date, text, embedding
        FROM index_entries
        ORDER BY rowid ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Vector index unavailable; run `lore init` and `lore index` first")?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embedding::embed_query(embedder, question).await?;

    let mut candidates: Vec<(i64, Passage)> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            let similarity = embedding::cosine_similarity(&query_vec, &vec);

            let date_str: String = row.get("source_date");
            let source_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .unwrap_or(NaiveDate::MIN);

            let rowid: i64 = row.get("rowid");
            (
                rowid,
                Passage {
                    record_key: row.get("record_key"),
                    source_url: row.get("source_url"),
                    source_date,
                    text: row.get("text"),
                    similarity,
                },
            )
        })
        .collect();

    // Similarity desc, rowid asc on ties.
    candidates.sort_by(|a, b| {
        b.1.similarity
            .partial_cmp(&a.1.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    candidates.truncate(top_k);

    let passages: Vec<Passage> = candidates.into_iter().map(|(_, p)| p).collect();
    Ok(rerank_by_recency(passages, recency_window))
}

/// Stage 2: newest-first ordering, truncated to the window.
///
/// Stable sort: candidates sharing a date keep their similarity order.
/// Fewer candidates than the window is not an error; all survive.
pub fn rerank_by_recency(mut passages: Vec<Passage>, recency_window: usize) -> Vec<Passage> {
    passages.sort_by(|a, b| b.source_date.cmp(&a.source_date));
    passages.truncate(recency_window);
    passages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(key: &str, date: &str, similarity: f32) -> Passage {
        Passage {
            record_key: key.to_string(),
            source_url: format!("https://x/{}", key),
            source_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            text: String::new(),
            similarity,
        }
    }

    #[test]
    fn recency_keeps_newest_in_order() {
        let candidates = vec![
            passage("a", "2024-01-01", 0.9),
            passage("b", "2025-06-01", 0.8),
            passage("c", "2025-01-01", 0.7),
        ];
        let reranked = rerank_by_recency(candidates, 2);
        let keys: Vec<&str> = reranked.iter().map(|p| p.record_key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(reranked[0].source_date.to_string(), "2025-06-01");
        assert_eq!(reranked[1].source_date.to_string(), "2025-01-01");
    }

    #[test]
    fn recency_with_fewer_candidates_than_window() {
        let candidates = vec![passage("a", "2025-01-01", 0.5)];
        let reranked = rerank_by_recency(candidates, 3);
        assert_eq!(reranked.len(), 1);
    }

    #[test]
    fn recency_of_empty_is_empty() {
        let reranked = rerank_by_recency(Vec::new(), 3);
        assert!(reranked.is_empty());
    }

    #[test]
    fn equal_dates_preserve_similarity_order() {
        let candidates = vec![
            passage("hi", "2025-01-01", 0.9),
            passage("lo", "2025-01-01", 0.2),
            passage("old", "2020-01-01", 0.95),
        ];
        let reranked = rerank_by_recency(candidates, 2);
        let keys: Vec<&str> = reranked.iter().map(|p| p.record_key.as_str()).collect();
        assert_eq!(keys, vec!["hi", "lo"]);
    }
}
