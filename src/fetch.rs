//! Fetch + extract capability.
//!
//! The orchestrator consumes sources through the [`FetchExtract`] trait and
//! never touches the network itself. [`HttpFetcher`] is the shipped
//! implementation: a plain GET with a per-request timeout, site-aware text
//! extraction, and exactly one fallback strategy (the thread RSS feed) for
//! commentary sources before an entry is given up on. No retry loops.
//!
//! Extraction is deliberately modest — boilerplate stripping, a footer
//! date probe — because the corpus quality gate lives in the orchestrator's
//! minimum-length check, not here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};
use std::time::Duration;

use crate::catalog::{Category, SourceEntry};

/// Clean text plus a best-effort publication date.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub publication_date: Option<NaiveDate>,
}

/// Opaque `fetch(url) -> (cleanText, date)` capability.
#[async_trait]
pub trait FetchExtract: Send + Sync {
    async fn fetch_and_extract(&self, entry: &SourceEntry) -> Result<Extracted>;
}

/// HTTP-backed fetcher with per-category extraction strategies.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("lorebase/0.3")
            .build()?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;
        let response = response
            .error_for_status()
            .with_context(|| format!("Non-success status from {}", url))?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))
    }
}

#[async_trait]
impl FetchExtract for HttpFetcher {
    async fn fetch_and_extract(&self, entry: &SourceEntry) -> Result<Extracted> {
        match entry.category {
            Category::Manual => read_manual_file(&entry.url),
            Category::Reference => {
                let html = self.get_text(&entry.url).await?;
                Ok(extract_reference_page(&html))
            }
            Category::Commentary => {
                // Forum threads are JavaScript-heavy; when the page itself
                // fails, the thread's RSS feed is the one fallback tried.
                match self.get_text(&entry.url).await {
                    Ok(html) => Ok(extract_reference_page(&html)),
                    Err(page_err) => {
                        let rss_url = rss_fallback_url(&entry.url).ok_or(page_err)?;
                        let xml = self.get_text(&rss_url).await?;
                        extract_rss_posts(&xml)
                    }
                }
            }
        }
    }
}

/// Manual transcripts are local files; the date is the file's mtime.
fn read_manual_file(path: &str) -> Result<Extracted> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manual source: {}", path))?;
    let date = crate::corpus::file_mtime_date(std::path::Path::new(path)).ok();
    Ok(Extracted {
        text,
        publication_date: date,
    })
}

/// Strip an HTML page down to headline/paragraph/list text and probe the
/// wiki footer for a last-edited date. Falls back to today's date — an
/// ingestion-time best effort, per the record header contract.
fn extract_reference_page(html: &str) -> Extracted {
    let doc = Html::parse_document(html);

    let content_selector = match Selector::parse("h1, h2, h3, h4, p, li, td, th") {
        Ok(s) => s,
        Err(_) => {
            return Extracted {
                text: String::new(),
                publication_date: None,
            }
        }
    };

    let mut parts: Vec<String> = Vec::new();
    for element in doc.select(&content_selector) {
        let text: String = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            parts.push(text);
        }
    }

    let date = probe_footer_date(&doc).unwrap_or_else(|| Utc::now().date_naive());

    Extracted {
        text: parts.join("\n"),
        publication_date: Some(date),
    }
}

/// Parse `This page was last edited on 22 December 2025, at 10:00.` out of
/// the wiki footer element.
fn probe_footer_date(doc: &Html) -> Option<NaiveDate> {
    let selector = Selector::parse("#footer-info-lastmod").ok()?;
    let element = doc.select(&selector).next()?;
    let text: String = element.text().collect();
    parse_last_edited(&text)
}

fn parse_last_edited(text: &str) -> Option<NaiveDate> {
    let rest = text.split("last edited on ").nth(1)?;
    let date_part = rest.split(',').next()?.trim();
    NaiveDate::parse_from_str(date_part, "%d %B %Y").ok()
}

/// `https://host/forum/threads/<slug>/index.rss` for a thread URL.
fn rss_fallback_url(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let after_scheme = &url[scheme_end + 3..];
    let host = after_scheme.split('/').next()?;
    if host.is_empty() {
        return None;
    }
    let slug = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains("//"))?;
    Some(format!(
        "{}://{}/forum/threads/{}/index.rss",
        &url[..scheme_end],
        host,
        slug
    ))
}

/// Pull every `<item><description>` out of a thread RSS feed, strip the
/// inner HTML, and join the posts. The feed's newest `<pubDate>` becomes
/// the publication date.
fn extract_rss_posts(xml: &str) -> Result<Extracted> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut posts: Vec<String> = Vec::new();
    let mut newest_date: Option<NaiveDate> = None;
    let mut in_item = false;
    let mut capture: Option<&'static str> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" => in_item = true,
                b"description" if in_item => capture = Some("description"),
                b"pubDate" if in_item => capture = Some("pubDate"),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" => in_item = false,
                b"description" | b"pubDate" => capture = None,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let content = t.unescape().unwrap_or_default().into_owned();
                match capture {
                    Some("description") => {
                        let text = strip_html(&content);
                        if !text.is_empty() {
                            posts.push(text);
                        }
                    }
                    Some("pubDate") => {
                        if let Ok(parsed) = DateTime::parse_from_rfc2822(content.trim()) {
                            let date = parsed.date_naive();
                            if newest_date.map(|d| date > d).unwrap_or(true) {
                                newest_date = Some(date);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::CData(t)) => {
                if capture == Some("description") {
                    let content = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    let text = strip_html(&content);
                    if !text.is_empty() {
                        posts.push(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("RSS parse failed: {}", e),
            _ => {}
        }
        buf.clear();
    }

    if posts.is_empty() {
        anyhow::bail!("RSS feed contained no posts");
    }

    let numbered: Vec<String> = posts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("=== Post {} ===\n{}", i + 1, p))
        .collect();

    Ok(Extracted {
        text: numbered.join("\n\n---\n\n"),
        publication_date: Some(newest_date.unwrap_or_else(|| Utc::now().date_naive())),
    })
}

/// Forum post descriptions embed HTML fragments; flatten them to text.
fn strip_html(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let text: Vec<&str> = doc.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_date_parses_to_iso() {
        let date =
            parse_last_edited(" This page was last edited on 22 December 2025, at 10:00.").unwrap();
        assert_eq!(date.to_string(), "2025-12-22");
    }

    #[test]
    fn footer_date_missing_yields_none() {
        assert!(parse_last_edited("no date here").is_none());
        assert!(parse_last_edited("last edited on someday, at 10:00").is_none());
    }

    #[test]
    fn reference_extraction_strips_markup_and_finds_date() {
        let html = r#"
        <html><head><title>Economy</title><script>var x = 1;</script></head>
        <body>
            <h1>Economy</h1>
            <p>Trade goods flow   through markets.</p>
            <ul><li>Grain</li><li>Iron</li></ul>
            <div id="footer-info-lastmod">This page was last edited on 3 January 2025, at 09:12.</div>
        </body></html>
        "#;
        let extracted = extract_reference_page(html);
        assert!(extracted.text.contains("Economy"));
        assert!(extracted.text.contains("Trade goods flow through markets."));
        assert!(extracted.text.contains("Grain"));
        assert!(!extracted.text.contains("var x"));
        assert_eq!(
            extracted.publication_date.unwrap().to_string(),
            "2025-01-03"
        );
    }

    #[test]
    fn rss_fallback_url_built_from_thread_slug() {
        let url = "https://forum.example.com/forum/developer-diary/talks-5.1647775/";
        assert_eq!(
            rss_fallback_url(url).unwrap(),
            "https://forum.example.com/forum/threads/talks-5.1647775/index.rss"
        );
    }

    #[test]
    fn rss_fallback_url_rejects_degenerate_input() {
        assert!(rss_fallback_url("not a url").is_none());
        assert!(rss_fallback_url("https:///").is_none());
    }

    #[test]
    fn rss_posts_extracted_and_numbered() {
        let xml = r#"<?xml version="1.0"?>
        <rss><channel>
            <item>
                <pubDate>Wed, 01 Jan 2025 12:00:00 +0000</pubDate>
                <description>&lt;p&gt;First post body&lt;/p&gt;</description>
            </item>
            <item>
                <pubDate>Thu, 05 Jun 2025 12:00:00 +0000</pubDate>
                <description>&lt;p&gt;Second post body&lt;/p&gt;</description>
            </item>
        </channel></rss>"#;
        let extracted = extract_rss_posts(xml).unwrap();
        assert!(extracted.text.contains("=== Post 1 ==="));
        assert!(extracted.text.contains("First post body"));
        assert!(extracted.text.contains("Second post body"));
        assert_eq!(
            extracted.publication_date.unwrap().to_string(),
            "2025-06-05"
        );
    }

    #[test]
    fn empty_rss_feed_is_an_error() {
        let xml = "<rss><channel></channel></rss>";
        assert!(extract_rss_posts(xml).is_err());
    }

    #[tokio::test]
    async fn manual_file_read_uses_mtime_date() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "pasted transcript").unwrap();

        let fetcher = HttpFetcher::new(5).unwrap();
        let entry = SourceEntry {
            url: path.to_string_lossy().to_string(),
            category: Category::Manual,
        };
        let extracted = fetcher.fetch_and_extract(&entry).await.unwrap();
        assert_eq!(extracted.text, "pasted transcript");
        assert_eq!(
            extracted.publication_date.unwrap(),
            Utc::now().date_naive()
        );
    }
}
