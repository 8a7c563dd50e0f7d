//! Kyiv Independent news archive.
//!
//! The archive at `https://kyivindependent.com/news-archive/` lists cards
//! like:
//!
//! ```html
//! <article class="js-card archiveCard" data-archive-id="2025-06-03T13:43:00.000Z">
//!   <h3 class="archiveCard__title"><a class="archiveCard__link" href="/slug/">…</a></h3>
//! </article>
//! ```
//!
//! Older pages used `Date.toString()` output in `data-archive-id`; both are
//! handled by [`crate::dates::parse`]. Pagination follows `<link rel="next">`.

use super::{ArchiveSource, absolute_url, link_rel_next};
use crate::dates;
use crate::models::ArchiveEntry;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

static CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article.js-card, article.archiveCard").unwrap());
static CARD_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3.archiveCard__title a.archiveCard__link[href]").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct KyivIndependent;

impl ArchiveSource for KyivIndependent {
    fn name(&self) -> &'static str {
        "Kyiv Independent"
    }

    fn slug(&self) -> &'static str {
        "kyiv_independent"
    }

    fn start_url(&self) -> &'static str {
        "https://kyivindependent.com/news-archive/"
    }

    fn base_url(&self) -> &'static str {
        "https://kyivindependent.com"
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
            let url = card
                .select(&CARD_LINK)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| absolute_url(base_url, href));

            let observed_date = match card.value().attr("data-archive-id") {
                Some(raw) => Some(dates::parse(raw, now)),
                None => {
                    warn!(?url, "Archive card has no data-archive-id attribute");
                    None
                }
            };

            if let Some(url) = url {
                entries.push(ArchiveEntry::new(url, observed_date));
            }
        }

        if cards == 0 {
            warn!("No article.archiveCard blocks found on page");
        }
        debug!(cards, links = entries.len(), "Extracted Kyiv Independent archive cards");
        entries
    }

    fn find_next_page(&self, html: &str, page_url: &Url) -> Option<String> {
        link_rel_next(&Html::parse_document(html), page_url)
    }
}
