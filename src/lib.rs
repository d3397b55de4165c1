//! # Lorebase
//!
//! A local-first knowledge assistant: idempotent ingestion, vector
//! indexing, and recency-aware retrieval.
//!
//! Lorebase sweeps a fixed catalog of knowledge sources (wiki pages,
//! developer-commentary threads, hand-pasted transcripts) into a local
//! text corpus, builds a persisted vector index over it, and answers
//! questions by retrieving the most similar passages and reranking them
//! by publication date before handing them to a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────┐   ┌──────────────┐
//! │ Catalog  │──▶│ Ingest sweep  │──▶│  Corpus    │──▶│ Vector index │
//! │ (config) │   │ cache-key dedup│   │ (txt files)│   │  (SQLite)    │
//! └──────────┘   └───────────────┘   └────────────┘   └──────┬───────┘
//!                                                            │
//!                                         ┌──────────────────┤
//!                                         ▼                  ▼
//!                                   ┌──────────┐      ┌────────────┐
//!                                   │ Retrieve │─────▶│  Answer    │
//!                                   │ +recency │      │ (LLM, ext) │
//!                                   └──────────┘      └────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! lore init          # create the index database
//! lore ingest        # sweep the catalog into the corpus
//! lore index         # build (or reattach to) the vector index
//! lore ask "how do markets work?"
//! lore status        # coverage report
//! lore reindex       # clear the index; next load rebuilds from corpus
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`catalog`] | Fixed registry of knowledge sources |
//! | [`cache_key`] | URL → corpus filename derivation (the dedup crux) |
//! | [`corpus`] | On-disk record store with metadata headers |
//! | [`fetch`] | Fetch+extract capability (HTTP, RSS fallback, manual files) |
//! | [`ingest`] | Idempotent ingestion sweep |
//! | [`chunk`] | Paragraph-boundary chunking |
//! | [`embedding`] | Embedding capability and vector utilities |
//! | [`index`] | Vector index build/load (fast/slow path) |
//! | [`retrieve`] | Similarity search + recency rerank |
//! | [`answer`] | Answer-generation capability |
//! | [`status`] | Coverage reporting |
//! | [`db`] | Index database connection |

pub mod answer;
pub mod cache_key;
pub mod catalog;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod fetch;
pub mod index;
pub mod ingest;
pub mod retrieve;
pub mod status;
