//! Corpus store: one normalized text record per ingested source.
//!
//! Records live as UTF-8 files in the corpus directory, filename = cache
//! key, each prefixed with a fixed two-line header:
//!
//! ```text
//! Source URL: <url>
//! Source Date: <YYYY-MM-DD>
//!
//! <body>
//! ```
//!
//! The header format is load-bearing: the index builder parses `Source Date:`
//! out of every record, and any ingestion path that produces records must
//! emit exactly this shape. Writes go through a temp file in the same
//! directory followed by a rename, so readers never observe a truncated
//! record.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};

/// Metadata header carried by every corpus record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub source_url: String,
    /// Best-effort publication date. `None` if the header line is missing
    /// or unparseable; readers fall back to the file's mtime.
    pub source_date: Option<NaiveDate>,
}

/// A record read back from the store. `effective_date` is always concrete:
/// the header date when present, the file mtime otherwise.
#[derive(Debug, Clone)]
pub struct CorpusRecord {
    pub key: String,
    pub header: RecordHeader,
    pub effective_date: NaiveDate,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CorpusStore {
    dir: PathBuf,
}

impl CorpusStore {
    /// Open (creating if needed) the corpus directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create corpus directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self, key: &str) -> bool {
        self.dir.join(key).is_file()
    }

    /// Write a whole record under `key`. Overwrites any prior version;
    /// a crash mid-write leaves the prior version intact.
    pub fn write(&self, key: &str, header: &RecordHeader, body: &str) -> Result<()> {
        let final_path = self.dir.join(key);
        let tmp_path = self.dir.join(format!(".{}.tmp", key));

        let mut content = format!("Source URL: {}\n", header.source_url);
        match header.source_date {
            Some(date) => content.push_str(&format!("Source Date: {}\n\n", date.format("%Y-%m-%d"))),
            None => content.push_str("Source Date: unknown\n\n"),
        }
        content.push_str(body);

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("Failed to write record: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("Failed to finalize record: {}", final_path.display()))?;
        Ok(())
    }

    /// Read one record back, computing its effective date.
    pub fn read(&self, key: &str) -> Result<CorpusRecord> {
        let path = self.dir.join(key);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read record: {}", path.display()))?;

        let (header, body) = parse_record(&raw);
        let effective_date = match header.source_date {
            Some(date) => date,
            None => file_mtime_date(&path)?,
        };

        Ok(CorpusRecord {
            key: key.to_string(),
            header,
            effective_date,
            body,
        })
    }

    /// Every record in the store, in filename order (deterministic).
    /// Temp files and dotfiles are skipped.
    pub fn list_all(&self) -> Result<Vec<CorpusRecord>> {
        let mut keys: Vec<String> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list corpus directory: {}", self.dir.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        keys.sort();

        keys.iter().map(|key| self.read(key)).collect()
    }

    pub fn record_count(&self) -> Result<usize> {
        Ok(self.list_all()?.len())
    }
}

/// Split a raw record into header and body. Tolerant of malformed input:
/// unknown or missing header lines simply leave their field empty.
fn parse_record(raw: &str) -> (RecordHeader, String) {
    let mut source_url = String::new();
    let mut source_date = None;
    let mut body_start = raw.len();

    for (offset, line) in line_offsets(raw) {
        if let Some(rest) = line.strip_prefix("Source URL:") {
            source_url = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Source Date:") {
            source_date = NaiveDate::parse_from_str(rest.trim(), "%Y-%m-%d").ok();
        } else if line.is_empty() {
            // Blank line terminates the header.
            body_start = offset + 1;
            break;
        } else {
            // No header at all: the whole record is body.
            body_start = offset;
            break;
        }
    }

    let body = raw.get(body_start..).unwrap_or("").to_string();
    (
        RecordHeader {
            source_url,
            source_date,
        },
        body,
    )
}

/// Iterate lines with the byte offset each line starts at.
fn line_offsets(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    raw.split_inclusive('\n').scan(0usize, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line.trim_end_matches('\n')))
    })
}

/// The record file's last-modified timestamp as a date (UTC).
pub fn file_mtime_date(path: &Path) -> Result<NaiveDate> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat record: {}", path.display()))?;
    let modified = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let dt: DateTime<Utc> = modified.into();
    Ok(dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CorpusStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = CorpusStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    fn header(url: &str, date: Option<&str>) -> RecordHeader {
        RecordHeader {
            source_url: url.to_string(),
            source_date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        }
    }

    #[test]
    fn write_then_read_roundtrip() {
        let (_tmp, store) = store();
        store
            .write(
                "Economy.txt",
                &header("https://wiki.example.com/Economy", Some("2025-06-01")),
                "Trade goods and markets.",
            )
            .unwrap();

        assert!(store.exists("Economy.txt"));
        let record = store.read("Economy.txt").unwrap();
        assert_eq!(record.header.source_url, "https://wiki.example.com/Economy");
        assert_eq!(
            record.header.source_date,
            Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
        );
        assert_eq!(record.effective_date.to_string(), "2025-06-01");
        assert_eq!(record.body, "Trade goods and markets.");
    }

    #[test]
    fn missing_date_falls_back_to_mtime() {
        let (_tmp, store) = store();
        store
            .write("note.txt", &header("file:///note", None), "body text")
            .unwrap();

        let record = store.read("note.txt").unwrap();
        assert_eq!(record.header.source_date, None);
        // mtime of a freshly written file is today
        assert_eq!(record.effective_date, Utc::now().date_naive());
    }

    #[test]
    fn unparseable_date_falls_back_to_mtime() {
        let (tmp, store) = store();
        std::fs::write(
            tmp.path().join("bad.txt"),
            "Source URL: https://x\nSource Date: last Tuesday\n\nbody",
        )
        .unwrap();

        let record = store.read("bad.txt").unwrap();
        assert_eq!(record.header.source_date, None);
        assert_eq!(record.effective_date, Utc::now().date_naive());
        assert_eq!(record.body, "body");
    }

    #[test]
    fn headerless_record_is_all_body() {
        let (tmp, store) = store();
        std::fs::write(tmp.path().join("raw.txt"), "just pasted text\nmore text").unwrap();

        let record = store.read("raw.txt").unwrap();
        assert!(record.header.source_url.is_empty());
        assert_eq!(record.body, "just pasted text\nmore text");
    }

    #[test]
    fn list_all_is_sorted_and_skips_temp_files() {
        let (tmp, store) = store();
        store
            .write("b.txt", &header("https://x/b", Some("2025-01-01")), "bb")
            .unwrap();
        store
            .write("a.txt", &header("https://x/a", Some("2025-01-02")), "aa")
            .unwrap();
        std::fs::write(tmp.path().join(".c.txt.tmp"), "partial").unwrap();

        let records = store.list_all().unwrap();
        let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn overwrite_replaces_whole_record() {
        let (_tmp, store) = store();
        store
            .write("k.txt", &header("https://x/k", Some("2024-01-01")), "old")
            .unwrap();
        store
            .write("k.txt", &header("https://x/k", Some("2025-01-01")), "new")
            .unwrap();

        let record = store.read("k.txt").unwrap();
        assert_eq!(record.body, "new");
        assert_eq!(record.effective_date.to_string(), "2025-01-01");
    }
}
