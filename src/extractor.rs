//! Article content extraction.
//!
//! [`parse_article`] turns an article page into an [`ExtractedArticle`] using
//! the metadata most news sites publish: Open Graph tags, JSON-LD blocks,
//! `<time datetime>` and paragraph text under the article container. Paragraphs
//! inside navigation, headers, footers, asides, forms and cookie or newsletter
//! banners are never part of the body.
//!
//! [`extract_articles`] runs it over a crawl's [`ArchiveEntry`] list, one URL
//! at a time with a fixed delay, and applies the date rules:
//!
//! 1. an entry whose archive date is already older than the cutoff is skipped
//!    without a request
//! 2. the page's own publish date wins over the archive date
//! 3. the cutoff is checked again against the chosen date
//! 4. an article with no date at all is kept with a null publish date
//!
//! Fetch or parse failures drop the URL; there are no retries.

use crate::dates::{self, DateValue};
use crate::error::{PipelineError, Result};
use crate::http::PageFetcher;
use crate::models::{ArchiveEntry, ArchiveRow, ExtractedArticle};
use crate::outputs::csv::read_rows;
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static TITLE_META: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"][content], meta[name="twitter:title"][content]"#)
        .unwrap()
});
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static AUTHOR_META: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="author"][content], meta[property="article:author"][content]"#)
        .unwrap()
});
static DATE_META: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"meta[property="article:published_time"][content], meta[name="article:published_time"][content], meta[name="pubdate"][content], meta[name="publishdate"][content], meta[itemprop="datePublished"][content], meta[name="date"][content]"#,
    )
    .unwrap()
});
static TIME_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static IMAGE_META: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:image"][content], meta[name="twitter:image"][content]"#)
        .unwrap()
});
static BODY_CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"[itemprop="articleBody"] p"#,
        "article p",
        "main p",
        r#"[role="main"] p"#,
        r#"[class*="article-body"] p, [class*="story-body"] p, [class*="entry-content"] p, [class*="post-content"] p"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "form"];
const BOILERPLATE_ROLES: &[&str] = &["navigation", "banner", "complementary", "contentinfo"];
/// Matched against lowercased `class` and `id` values.
const BOILERPLATE_MARKERS: &[&str] = &["cookie", "consent", "newsletter", "subscribe", "related"];

/// Inputs for one extraction batch.
#[derive(Debug, Clone)]
pub struct ExtractParams {
    pub cutoff: DateTime<Utc>,
    pub delay: Duration,
}

/// Load the archive links saved by the crawl stage.
///
/// # Arguments
///
/// * `path` - The site's `*_archive_article_urls.csv`
/// * `now` - Reference time for re-parsing relative archive dates
///
/// # Errors
///
/// [`PipelineError::MissingInput`] when the crawl has not written the file
/// yet, or any CSV error while reading it.
pub async fn read_archive(path: &Path, now: DateTime<Utc>) -> Result<Vec<ArchiveEntry>> {
    if !tokio::fs::try_exists(path).await? {
        return Err(PipelineError::MissingInput {
            path: path.display().to_string(),
            stage: "crawl",
        });
    }
    Ok(read_rows::<ArchiveRow>(path)
        .await?
        .into_iter()
        .map(|row| row.into_entry(now))
        .collect())
}

/// Fetch and parse a single article page.
#[instrument(level = "info", skip(fetcher))]
pub async fn extract<F: PageFetcher>(fetcher: &F, url: &str) -> Result<ExtractedArticle> {
    let html = fetcher.fetch(url).await?;
    parse_article(url, &html, Utc::now())
}

/// Pull title, authors, publish date, body and lead image out of `html`.
///
/// Fails only when the page has neither a title nor any body text.
pub fn parse_article(url: &str, html: &str, now: DateTime<Utc>) -> Result<ExtractedArticle> {
    let page_url = Url::parse(url)?;
    let document = Html::parse_document(html);
    let json_ld = json_ld_objects(&document);

    let title = extract_title(&document);
    let body = extract_body(&document);
    if title.is_empty() && body.is_empty() {
        return Err(PipelineError::Extraction {
            url: url.to_string(),
            reason: "no title and no paragraph text".to_string(),
        });
    }

    Ok(ExtractedArticle {
        url: url.to_string(),
        title,
        authors: extract_authors(&document, &json_ld),
        publish_date: extract_publish_date(&document, &json_ld, now),
        body,
        primary_image_url: extract_image(&document, &page_url),
    })
}

/// Extract every entry in order, applying the cutoff and date precedence.
///
/// URLs are fetched sequentially with `params.delay` between requests. Each
/// failed fetch or parse is logged and skipped without failing the batch.
///
/// # Arguments
///
/// * `fetcher` - Source of article page HTML
/// * `entries` - Archive links, usually from [`read_archive`]
/// * `params` - Cutoff date and inter-request delay
///
/// # Returns
///
/// The kept [`ExtractedArticle`]s in input order, unique by URL.
#[instrument(level = "info", skip_all, fields(count = entries.len()))]
pub async fn extract_articles<F: PageFetcher>(
    fetcher: &F,
    entries: Vec<ArchiveEntry>,
    params: &ExtractParams,
) -> Vec<ExtractedArticle> {
    let total = entries.len();
    let articles: Vec<ExtractedArticle> = stream::iter(entries.into_iter().enumerate())
        .then(|(i, entry)| async move {
            let archive_date = entry.observed_timestamp();
            if archive_date.is_some_and(|d| d < params.cutoff) {
                debug!(url = %entry.url, "Archive date predates cutoff; skipping without fetching");
                return None;
            }

            info!(index = i + 1, total, url = %entry.url, "Extracting article");
            let result = extract(fetcher, &entry.url).await;
            if i + 1 < total {
                sleep(params.delay).await;
            }

            match result {
                Ok(article) => finalize(article, archive_date, params.cutoff),
                Err(e) if e.is_transient() => {
                    warn!(url = %entry.url, error = %e, "Article download failed; dropping URL");
                    None
                }
                Err(e) => {
                    error!(url = %entry.url, error = %e, "Article extraction failed; dropping URL");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    let articles: Vec<ExtractedArticle> = articles
        .into_iter()
        .unique_by(|a| a.url.clone())
        .collect();
    info!(extracted = articles.len(), total, "Article extraction finished");
    articles
}

/// Choose the publish date and re-apply the cutoff.
fn finalize(
    mut article: ExtractedArticle,
    archive_date: Option<DateTime<Utc>>,
    cutoff: DateTime<Utc>,
) -> Option<ExtractedArticle> {
    let chosen = article.publish_date.or(archive_date);
    let title = truncate_for_log(&article.title, 50);
    match chosen {
        Some(date) if date < cutoff => {
            info!(%title, date = %date.date_naive(), "Article predates cutoff; ignored");
            None
        }
        Some(date) => {
            debug!(%title, date = %date.date_naive(), "Article kept");
            article.publish_date = Some(date);
            Some(article)
        }
        None => {
            warn!(%title, url = %article.url, "Article kept without a publish date");
            article.publish_date = None;
            Some(article)
        }
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().join(" ")
}

fn extract_title(document: &Html) -> String {
    document
        .select(&TITLE_META)
        .filter_map(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
        .or_else(|| {
            document
                .select(&H1)
                .chain(document.select(&TITLE))
                .map(element_text)
                .find(|t| !t.is_empty())
        })
        .unwrap_or_default()
}

fn is_boilerplate(el: ElementRef<'_>) -> bool {
    let v = el.value();
    BOILERPLATE_TAGS.contains(&v.name())
        || v.attr("role").is_some_and(|r| BOILERPLATE_ROLES.contains(&r))
        || v.attr("class").into_iter().chain(v.attr("id")).any(|attr| {
            let attr = attr.to_ascii_lowercase();
            BOILERPLATE_MARKERS.iter().any(|m| attr.contains(m))
        })
}

fn in_boilerplate(el: ElementRef<'_>) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(is_boilerplate)
}

fn extract_body(document: &Html) -> String {
    for selector in BODY_CONTAINERS.iter() {
        let paragraphs: Vec<String> = document
            .select(selector)
            .filter(|p| !in_boilerplate(*p))
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n\n");
        }
    }
    String::new()
}

/// Every JSON-LD object on the page, with `@graph` members flattened.
fn json_ld_objects(document: &Html) -> Vec<Value> {
    let mut objects = Vec::new();
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            debug!("Skipping malformed JSON-LD block");
            continue;
        };
        let top = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in top {
            if let Some(Value::Array(graph)) = item.get("@graph") {
                objects.extend(graph.iter().cloned());
            }
            objects.push(item);
        }
    }
    objects
}

fn extract_authors(document: &Html, json_ld: &[Value]) -> Vec<String> {
    let mut authors = Vec::new();
    for obj in json_ld {
        match obj.get("author") {
            Some(Value::Array(list)) => authors.extend(list.iter().filter_map(author_name)),
            Some(author) => authors.extend(author_name(author)),
            None => {}
        }
    }
    authors.extend(
        document
            .select(&AUTHOR_META)
            .filter_map(|m| m.value().attr("content"))
            .filter(|c| !c.starts_with("http"))
            .map(|c| c.trim().to_string()),
    );
    authors
        .into_iter()
        .filter(|a| !a.is_empty())
        .unique_by(|a| a.to_lowercase())
        .collect()
}

fn author_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(obj) => obj
            .get("name")
            .and_then(Value::as_str)
            .map(|n| n.trim().to_string()),
        _ => None,
    }
}

fn extract_publish_date(
    document: &Html,
    json_ld: &[Value],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let from_meta = document
        .select(&DATE_META)
        .filter_map(|m| m.value().attr("content"));
    let from_json_ld = json_ld
        .iter()
        .filter_map(|obj| obj.get("datePublished").and_then(Value::as_str));
    let from_time = document
        .select(&TIME_TAG)
        .filter_map(|t| t.value().attr("datetime"));

    from_meta
        .chain(from_json_ld)
        .chain(from_time)
        .find_map(|raw| match dates::parse(raw, now) {
            DateValue::Timestamp(ts) => Some(ts),
            DateValue::Raw(_) => None,
        })
}

fn extract_image(document: &Html, page_url: &Url) -> Option<String> {
    document
        .select(&IMAGE_META)
        .filter_map(|m| m.value().attr("content"))
        .filter(|c| !c.trim().is_empty())
        .find_map(|c| page_url.join(c.trim()).ok())
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StaticFetcher;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    const ARTICLE: &str = r#"
<html><head>
  <title>Fallback title | Site</title>
  <meta property="og:title" content="Drone attack hits Kharkiv">
  <meta property="og:image" content="/images/lead.jpg">
  <meta name="author" content="Olena Example">
  <meta property="article:published_time" content="2024-03-10T08:15:00+00:00">
  <script type="application/ld+json">
    {"@context":"https://schema.org","@graph":[
      {"@type":"NewsArticle","author":[{"@type":"Person","name":"Olena Example"},{"@type":"Person","name":"Ivan Sample"}]}
    ]}
  </script>
</head><body>
  <nav><p>Menu text</p></nav>
  <article>
    <h1>Drone attack hits Kharkiv</h1>
    <p>First   paragraph.</p>
    <p></p>
    <p>Second <b>paragraph</b>.</p>
  </article>
</body></html>"#;

    fn article(url: &str, date: Option<DateTime<Utc>>) -> ExtractedArticle {
        ExtractedArticle {
            url: url.to_string(),
            title: "t".to_string(),
            authors: vec![],
            publish_date: date,
            body: "b".to_string(),
            primary_image_url: None,
        }
    }

    #[test]
    fn test_parse_article_fields() {
        let parsed = parse_article("https://example.com/news/1", ARTICLE, Utc::now()).unwrap();

        assert_eq!(parsed.title, "Drone attack hits Kharkiv");
        assert_eq!(parsed.authors, vec!["Olena Example", "Ivan Sample"]);
        assert_eq!(
            parsed.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 8, 15, 0).unwrap())
        );
        assert_eq!(parsed.body, "First paragraph.\n\nSecond paragraph.");
        assert_eq!(
            parsed.primary_image_url.as_deref(),
            Some("https://example.com/images/lead.jpg")
        );
    }

    #[test]
    fn test_parse_article_fallbacks() {
        let html = r#"<html><head><title>Only title</title></head><body>
            <main><p>Main paragraph</p></main><time datetime="2023-07-01">July 1</time></body></html>"#;
        let parsed = parse_article("https://example.com/x", html, Utc::now()).unwrap();
        assert_eq!(parsed.title, "Only title");
        assert_eq!(parsed.body, "Main paragraph");
        assert_eq!(parsed.publish_date, Some(utc(2023, 7, 1)));
        assert!(parsed.authors.is_empty());
        assert_eq!(parsed.primary_image_url, None);
    }

    #[test]
    fn test_body_skips_boilerplate_paragraphs() {
        let html = r#"<html><head><title>Shelling in Odesa</title></head><body>
  <header><p>Sign in</p></header>
  <div class="cookie-banner"><p>We use cookies.</p></div>
  <article>
    <header><p>Live updates</p></header>
    <p>Port infrastructure was hit overnight.</p>
    <aside><p>Read more: earlier strikes</p></aside>
    <div id="newsletter-signup"><p>Get our daily briefing</p></div>
    <p>Two people were injured.</p>
    <div class="related-stories"><p>Related: grain corridor</p></div>
  </article>
  <footer><p>Copyright 2024</p></footer>
</body></html>"#;
        let parsed = parse_article("https://example.com/odesa", html, Utc::now()).unwrap();
        assert_eq!(
            parsed.body,
            "Port infrastructure was hit overnight.\n\nTwo people were injured."
        );
    }

    #[test]
    fn test_paragraphs_outside_containers_are_ignored() {
        let html = r#"<html><head><title>Index page</title></head><body>
  <nav><p>Home</p></nav>
  <div><p>Subscribe to alerts</p></div>
  <footer><p>Contact</p></footer>
</body></html>"#;
        let parsed = parse_article("https://example.com/index", html, Utc::now()).unwrap();
        assert_eq!(parsed.title, "Index page");
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn test_parse_article_without_content_fails() {
        let err = parse_article("https://example.com/x", "<html><body></body></html>", Utc::now())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction { .. }));
    }

    #[test]
    fn test_page_date_wins_over_archive_date() {
        let cutoff = utc(2022, 2, 1);
        let kept = finalize(article("u", Some(utc(2023, 1, 1))), Some(utc(2021, 1, 1)), cutoff)
            .unwrap();
        assert_eq!(kept.publish_date, Some(utc(2023, 1, 1)));

        // The page date is older than the cutoff even though the archive said otherwise.
        assert!(finalize(article("u", Some(utc(2021, 1, 1))), Some(utc(2023, 1, 1)), cutoff).is_none());
    }

    #[test]
    fn test_archive_date_used_when_page_has_none() {
        let cutoff = utc(2022, 2, 1);
        let kept = finalize(article("u", None), Some(utc(2024, 5, 5)), cutoff).unwrap();
        assert_eq!(kept.publish_date, Some(utc(2024, 5, 5)));
        let undated = finalize(article("u", None), None, cutoff).unwrap();
        assert_eq!(undated.publish_date, None);
    }

    #[tokio::test]
    async fn test_read_archive_requires_crawl_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kyiv_independent_archive_article_urls.csv");

        let err = read_archive(&path, Utc::now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { stage: "crawl", .. }));

        let saved = vec![ArchiveEntry::new(
            "https://example.com/news/1",
            Some(DateValue::Timestamp(utc(2024, 5, 5))),
        )];
        let rows: Vec<ArchiveRow> = saved.iter().map(ArchiveRow::from).collect();
        crate::outputs::csv::write_rows(&path, &rows).await.unwrap();

        let entries = read_archive(&path, Utc::now()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://example.com/news/1");
        assert_eq!(entries[0].observed_timestamp(), Some(utc(2024, 5, 5)));
    }

    #[tokio::test]
    async fn test_extract_articles_batch_rules() {
        let fetcher = StaticFetcher::new()
            .with_page("https://example.com/news/1", ARTICLE)
            .with_page(
                "https://example.com/news/2",
                "<html><body><article><p>Undated text</p></article></body></html>",
            );
        let entries = vec![
            ArchiveEntry::new("https://example.com/news/1", None),
            ArchiveEntry::new(
                "https://example.com/old",
                Some(DateValue::Timestamp(utc(2020, 1, 1))),
            ),
            ArchiveEntry::new("https://example.com/broken", None),
            ArchiveEntry::new(
                "https://example.com/news/2",
                Some(DateValue::Raw("yesterday-ish".to_string())),
            ),
        ];
        let params = ExtractParams {
            cutoff: utc(2022, 2, 1),
            delay: Duration::ZERO,
        };

        let articles = extract_articles(&fetcher, entries, &params).await;

        let urls: Vec<_> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/news/1", "https://example.com/news/2"]);
        assert_eq!(articles[1].publish_date, None);
        // The stale entry is never requested.
        assert!(!fetcher.requests.borrow().iter().any(|u| u.ends_with("/old")));
    }
}
