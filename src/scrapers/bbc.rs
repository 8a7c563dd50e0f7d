//! BBC News topic pages.
//!
//! The "war in Ukraine" topic at `https://www.bbc.com/news/war-in-ukraine` is
//! rendered as promo cards tagged with `data-testid` values such as
//! `london-card`. Card dates are labels (`"18 hrs ago"`, `"24 May 2025"`) in
//! `span[data-testid=card-metadata-lastupdated]`. Links leaving `/news/` (live
//! pages, sport, sounds) are ignored.
//!
//! Pagination prefers `<link rel="next">` and falls back to the numbered
//! pagination control's next button.

use super::{ArchiveSource, absolute_url, link_rel_next};
use crate::dates;
use crate::models::ArchiveEntry;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

const BBC_HOSTS: &[&str] = &["www.bbc.com", "www.bbc.co.uk"];

static CARD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"div[data-testid="london-card"], div[data-testid="dundee-card"], div[data-testid="liverpool-card"]"#,
    )
    .unwrap()
});
static CARD_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static CARD_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[data-testid="card-metadata-lastupdated"]"#).unwrap());
static NEXT_BUTTON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[data-testid="pagination-next-button"][href]"#).unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct BbcNews;

/// Keep relative `/news/…` links and absolute BBC links containing `/news/`.
fn is_news_link(href: &str) -> bool {
    match Url::parse(href) {
        Ok(url) => {
            url.host_str().is_some_and(|h| BBC_HOSTS.contains(&h)) && href.contains("/news/")
        }
        Err(_) => href.starts_with("/news/"),
    }
}

impl ArchiveSource for BbcNews {
    fn name(&self) -> &'static str {
        "BBC News"
    }

    fn slug(&self) -> &'static str {
        "bbc_news"
    }

    fn start_url(&self) -> &'static str {
        "https://www.bbc.com/news/war-in-ukraine"
    }

    fn base_url(&self) -> &'static str {
        "https://www.bbc.com"
    }

    fn extract_entries(
        &self,
        html: &str,
        base_url: &Url,
        now: DateTime<Utc>,
    ) -> Vec<ArchiveEntry> {
        let document = Html::parse_document(html);
        let mut entries = Vec::new();
        let mut cards = 0usize;

        for card in document.select(&CARD) {
            cards += 1;
            let Some(href) = card
                .select(&CARD_LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };
            if !is_news_link(href) {
                debug!(href, "Skipping non-news card link");
                continue;
            }
            let Some(url) = absolute_url(base_url, href) else {
                continue;
            };

            let observed_date = card
                .select(&CARD_DATE)
                .next()
                .map(|span| span.text().collect::<String>())
                .map(|label| dates::parse(label.trim(), now));

            entries.push(ArchiveEntry::new(url, observed_date));
        }

        debug!(cards, links = entries.len(), "Extracted BBC News cards");
        entries
    }

    fn find_next_page(&self, html: &str, page_url: &Url) -> Option<String> {
        let document = Html::parse_document(html);
        link_rel_next(&document, page_url).or_else(|| {
            document
                .select(&NEXT_BUTTON)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| absolute_url(page_url, href))
        })
    }
}
