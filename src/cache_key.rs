//! Cache-key derivation: source URL → deterministic corpus filename.
//!
//! [`derive_cache_key`] is the single source of truth for corpus filenames.
//! The ingestion sweep uses it both to test "already ingested?" and to pick
//! the filename a fresh record is written under. Earlier iterations of this
//! pipeline derived the existence-check name from the URL slug but the write
//! name from the scraped page title; the two never matched, so every sweep
//! re-fetched the whole catalog. Routing both operations through this one
//! function forecloses that defect structurally — do not add a second
//! derivation path.
//!
//! The function is pure and total: no I/O, and the category fallback token
//! guarantees a non-empty key for any input.

use crate::catalog::{Category, SourceEntry};

/// Characters that cannot appear in a corpus filename.
const ILLEGAL: &[char] = &['\\', '/', '*', '?', ':', '<', '>', '|', '"'];

/// Placeholder segment some wikis serve for their front page.
const WIKI_PLACEHOLDER: &str = "index.php";

/// Derive the corpus filename for a source entry.
///
/// Last non-empty path segment of the URL (query string stripped), sanitized
/// of filename-illegal characters with internal spaces collapsed to
/// underscores, prefixed by the category convention, with a `.txt` extension.
/// Empty or placeholder segments fall back to a category-specific token, so
/// the result is never empty.
pub fn derive_cache_key(entry: &SourceEntry) -> String {
    let slug = last_path_segment(&entry.url);

    let slug = match slug {
        Some(s) if s != WIKI_PLACEHOLDER => s,
        _ => fallback_token(entry.category),
    };
    let slug = slug.strip_suffix(".txt").unwrap_or(slug);

    let clean = sanitize(slug);
    let clean = if clean.is_empty() {
        sanitize(fallback_token(entry.category))
    } else {
        clean
    };

    format!("{}{}.txt", prefix(entry.category), clean)
}

/// Last non-empty path segment, with the scheme/host and any query string
/// excluded. A bare host (no path) yields `None`.
fn last_path_segment(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = match without_query.find("://") {
        Some(pos) => &without_query[pos + 3..],
        None => without_query,
    };
    let mut parts = after_scheme.split('/');
    let _host = parts.next();
    parts.rev().find(|s| !s.is_empty())
}

fn fallback_token(category: Category) -> &'static str {
    match category {
        Category::Reference => "wiki_index",
        Category::Commentary => "thread_index",
        Category::Manual => "manual_note",
    }
}

fn prefix(category: Category) -> &'static str {
    match category {
        Category::Reference => "",
        Category::Commentary => "tinto_",
        Category::Manual => "manual_",
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !ILLEGAL.contains(c))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, category: Category) -> SourceEntry {
        SourceEntry {
            url: url.to_string(),
            category,
        }
    }

    #[test]
    fn derivation_is_stable() {
        let e = entry(
            "https://wiki.example.com/Beginner%27s_guide",
            Category::Reference,
        );
        assert_eq!(derive_cache_key(&e), derive_cache_key(&e));
    }

    #[test]
    fn reference_key_is_bare_slug() {
        let e = entry("https://wiki.example.com/Economy", Category::Reference);
        assert_eq!(derive_cache_key(&e), "Economy.txt");
    }

    #[test]
    fn query_string_is_stripped() {
        let e = entry(
            "https://wiki.example.com/Economy?action=history",
            Category::Reference,
        );
        assert_eq!(derive_cache_key(&e), "Economy.txt");
    }

    #[test]
    fn commentary_key_gets_thread_prefix() {
        let e = entry(
            "https://forum.example.com/threads/talks-5-march.1647775/",
            Category::Commentary,
        );
        assert_eq!(derive_cache_key(&e), "tinto_talks-5-march.1647775.txt");
    }

    #[test]
    fn manual_key_gets_manual_prefix() {
        let e = entry("/home/u/manual_sources/patch notes.txt", Category::Manual);
        assert_eq!(derive_cache_key(&e), "manual_patch_notes.txt");
    }

    #[test]
    fn sanitization_strips_illegal_chars() {
        // Raw segment "Wiki: About/Page?" — colon, slash, question mark
        // removed, space replaced by underscore.
        assert_eq!(sanitize("Wiki: About/Page?"), "Wiki_AboutPage");
    }

    #[test]
    fn placeholder_segment_falls_back() {
        let e = entry("https://wiki.example.com/index.php", Category::Reference);
        assert_eq!(derive_cache_key(&e), "wiki_index.txt");
    }

    #[test]
    fn bare_host_falls_back() {
        let e = entry("https://forum.example.com/", Category::Commentary);
        assert_eq!(derive_cache_key(&e), "tinto_thread_index.txt");
        let e = entry("https://wiki.example.com", Category::Reference);
        assert_eq!(derive_cache_key(&e), "wiki_index.txt");
    }

    #[test]
    fn never_empty_even_for_degenerate_input() {
        let e = entry("", Category::Reference);
        let key = derive_cache_key(&e);
        assert!(!key.is_empty());
        assert!(key.ends_with(".txt"));

        let e = entry("???//", Category::Manual);
        let key = derive_cache_key(&e);
        assert!(key.starts_with("manual_"));
        assert!(key.len() > "manual_.txt".len());
    }
}
