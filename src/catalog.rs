//! Source catalog: the fixed registry of knowledge origins.
//!
//! The catalog is assembled once at startup from the TOML config plus a scan
//! of the manual-transcripts directory, and never mutated afterwards. Entries
//! iterate manual → reference → commentary, preserving declaration order
//! within each category; manual sources come first because they are trusted
//! human input and should win any filename collision.

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Config;

/// Source category. Determines the cache-key prefix, the extraction
/// strategy, and whether the minimum-length heuristic applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Manual,
    Reference,
    Commentary,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Manual => "manual",
            Category::Reference => "reference",
            Category::Commentary => "commentary",
        }
    }
}

/// One knowledge origin. For manual entries `url` is a local file path.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub url: String,
    pub category: Category,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<SourceEntry>,
}

impl Catalog {
    /// Build the catalog from config lists plus the manual directory scan.
    /// Manual files are discovered in sorted order for deterministic sweeps.
    pub fn load(config: &Config) -> Result<Self> {
        let mut entries = Vec::new();

        if let Some(ref manual_dir) = config.corpus.manual_dir {
            if manual_dir.exists() {
                let mut manual_paths: Vec<String> = WalkDir::new(manual_dir)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| {
                        e.path()
                            .extension()
                            .map(|ext| ext == "txt")
                            .unwrap_or(false)
                    })
                    .map(|e| e.path().to_string_lossy().to_string())
                    .collect();
                manual_paths.sort();

                for path in manual_paths {
                    entries.push(SourceEntry {
                        url: path,
                        category: Category::Manual,
                    });
                }
            }
        }

        for url in &config.catalog.reference {
            entries.push(SourceEntry {
                url: url.clone(),
                category: Category::Reference,
            });
        }

        for url in &config.catalog.commentary {
            entries.push(SourceEntry {
                url: url.clone(),
                category: Category::Commentary,
            });
        }

        Ok(Self { entries })
    }

    /// Build a catalog directly from entries. Primarily for tests.
    pub fn from_entries(entries: Vec<SourceEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
