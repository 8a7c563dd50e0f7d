//! Archive pagination with a date cutoff.
//!
//! [`crawl`] walks an archive page by page through any [`ArchiveSource`] and
//! collects article links until one of these happens:
//!
//! - `max_pages` pages have been fetched
//! - a page fails to download (already collected entries are kept)
//! - a page after the first one has no cards
//! - every card on a page is dated before the cutoff
//! - there is no next-page link, or it points to a page already visited
//!
//! Cards whose date could not be parsed are kept: staleness cannot be proven.
//! The "whole page is stale" stop rule can cut a crawl short when an archive
//! pins old stories among new ones; it is kept as is.

use crate::http::PageFetcher;
use crate::models::ArchiveEntry;
use crate::scrapers::ArchiveSource;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Inputs for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlParams {
    pub start_url: String,
    pub base_url: String,
    pub cutoff: DateTime<Utc>,
    pub max_pages: usize,
    pub delay: Duration,
}

impl CrawlParams {
    /// Start and base URL from `source`, limits from the caller.
    pub fn for_source<S: ArchiveSource + ?Sized>(
        source: &S,
        cutoff: DateTime<Utc>,
        max_pages: usize,
        delay: Duration,
    ) -> Self {
        Self {
            start_url: source.start_url().to_string(),
            base_url: source.base_url().to_string(),
            cutoff,
            max_pages,
            delay,
        }
    }
}

/// Why a crawl ended. Logged, never returned as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxPages,
    FetchFailed,
    EmptyPage,
    AllStale,
    NoNextPage,
    AlreadyVisited,
}

/// Collected entries plus crawl bookkeeping.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Unique by URL, in discovery order.
    pub entries: Vec<ArchiveEntry>,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
}

/// Walk the archive described by `source` and `params`.
///
/// Pages are fetched one at a time with `params.delay` between them. Entries
/// dated before `params.cutoff` are dropped, URLs seen on earlier pages are
/// skipped, and the walk ends at the first stop condition (see
/// [`StopReason`]).
///
/// # Arguments
///
/// * `fetcher` - Source of archive page HTML
/// * `source` - Site-specific card and pagination parsing
/// * `params` - Start URL, cutoff, page ceiling and delay
///
/// # Returns
///
/// A [`CrawlOutcome`] with the collected entries in page order. A fetch
/// failure ends the walk but keeps everything gathered before it.
#[instrument(level = "info", skip_all, fields(source = source.name(), start = %params.start_url))]
pub async fn crawl<F, S>(fetcher: &F, source: &S, params: &CrawlParams) -> CrawlOutcome
where
    F: PageFetcher,
    S: ArchiveSource + ?Sized,
{
    let base_url = match Url::parse(&params.base_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(base_url = %params.base_url, error = %e, "Invalid base URL; nothing crawled");
            return CrawlOutcome {
                entries: Vec::new(),
                pages_fetched: 0,
                stop_reason: StopReason::FetchFailed,
            };
        }
    };

    let mut visited: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut entries: Vec<ArchiveEntry> = Vec::new();
    let mut pages_fetched = 0usize;
    let mut current = Some(params.start_url.clone());

    let stop_reason = loop {
        let Some(page_url) = current.take() else {
            break StopReason::NoNextPage;
        };
        if visited.contains(&page_url) {
            break StopReason::AlreadyVisited;
        }
        if pages_fetched >= params.max_pages {
            break StopReason::MaxPages;
        }

        visited.insert(page_url.clone());
        pages_fetched += 1;
        info!(page = pages_fetched, url = %page_url, "Fetching archive page");

        let html = match fetcher.fetch(&page_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %page_url, error = %e, "Archive page download failed; stopping pagination");
                break StopReason::FetchFailed;
            }
        };

        let found = source.extract_entries(&html, &base_url, Utc::now());
        if found.is_empty() && pages_fetched > 1 {
            info!(url = %page_url, "No articles on page; end of archive or selectors out of date");
            break StopReason::EmptyPage;
        }

        let mut only_stale = !found.is_empty();
        let mut added = 0usize;
        for entry in found {
            if entry.is_stale(params.cutoff) {
                debug!(url = %entry.url, date = ?entry.observed_timestamp(), "Older than cutoff");
                continue;
            }
            only_stale = false;
            if seen_urls.insert(entry.url.clone()) {
                entries.push(entry);
                added += 1;
            }
        }
        info!(page = pages_fetched, added, total = entries.len(), "Processed archive page");

        if only_stale {
            info!(cutoff = %params.cutoff.date_naive(), "Every article on page predates the cutoff; stopping pagination");
            break StopReason::AllStale;
        }

        let page = Url::parse(&page_url).unwrap_or_else(|_| base_url.clone());
        current = source.find_next_page(&html, &page);
        match &current {
            Some(next) => {
                debug!(%next, delay = ?params.delay, "Waiting before next archive page");
                sleep(params.delay).await;
            }
            None => info!("No next-page link found"),
        }
    };

    info!(
        pages_fetched,
        unique_urls = entries.len(),
        ?stop_reason,
        "Archive crawl finished"
    );
    CrawlOutcome {
        entries,
        pages_fetched,
        stop_reason,
    }
}
