//! Archive-page scrapers, one per news site.
//!
//! Each site implements [`ArchiveSource`]: given the HTML of one archive
//! page it returns the article cards found there and the link to the next
//! page. The paginator in [`crate::paginator`] is generic over this trait and
//! owns fetching, cutoffs, dedup and politeness delays.
//!
//! # Supported Sources
//!
//! | Source | Module | Card selector | Date |
//! |--------|--------|---------------|------|
//! | Kyiv Independent | [`kyiv`] | `article.archiveCard` | `data-archive-id` attribute (ISO) |
//! | BBC News | [`bbc`] | `div[data-testid=*-card]` | relative or absolute label |

pub mod bbc;
pub mod kyiv;

use crate::models::{ArchiveEntry, SourceType};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use scraper::{Html, Selector};
use url::Url;

/// Site-specific knowledge needed to walk a paginated archive.
pub trait ArchiveSource {
    /// Human readable name, used in logs.
    fn name(&self) -> &'static str;

    /// File-name prefix for this site's CSV outputs.
    fn slug(&self) -> &'static str;

    /// First archive page.
    fn start_url(&self) -> &'static str;

    /// Origin that relative article links are resolved against.
    fn base_url(&self) -> &'static str;

    /// Article cards on one archive page, in page order.
    fn extract_entries(&self, html: &str, base_url: &Url, now: DateTime<Utc>)
    -> Vec<ArchiveEntry>;

    /// Absolute URL of the following archive page, if any.
    fn find_next_page(&self, html: &str, page_url: &Url) -> Option<String>;
}

/// Archive sites selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Site {
    /// The Kyiv Independent news archive
    Kyiv,
    /// BBC News "war in Ukraine" topic pages
    Bbc,
}

impl Site {
    pub fn source(&self) -> Box<dyn ArchiveSource> {
        match self {
            Site::Kyiv => Box::new(kyiv::KyivIndependent),
            Site::Bbc => Box::new(bbc::BbcNews),
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Site::Kyiv => SourceType::KyivIndependent,
            Site::Bbc => SourceType::BbcNews,
        }
    }
}

/// Resolve `href` against `base`, dropping any fragment.
pub(crate) fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let mut resolved = base.join(href.trim()).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// The `<link rel="next">` pointer most paginated archives emit in `<head>`.
pub(crate) fn link_rel_next(document: &Html, page_url: &Url) -> Option<String> {
    let selector = Selector::parse(r#"link[rel~="next"][href]"#).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| absolute_url(page_url, href))
}
