//! Records produced and consumed by the pipeline stages.
//!
//! - [`ArchiveEntry`]: one article link discovered on an archive page
//! - [`ExtractedArticle`]: the fields pulled out of an article page
//! - [`RedditPost`], [`RedditComment`], [`TelegramMessage`]: social collector rows
//! - [`NormalizedDocument`]: cleaned, language-tagged and lemmatized text
//!
//! Every record is created once by its stage and never mutated afterwards;
//! the next stage reads it back from the CSV snapshot.

use crate::dates::{self, DateValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder written when an archive card carried no date at all.
pub const MISSING_DATE: &str = "N/A_DATE";

/// An article link found while walking an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Absolute article URL, the dedup key.
    pub url: String,
    /// `None` when the card had no date; `Raw` when it could not be parsed.
    pub observed_date: Option<DateValue>,
}

impl ArchiveEntry {
    pub fn new(url: impl Into<String>, observed_date: Option<DateValue>) -> Self {
        Self {
            url: url.into(),
            observed_date,
        }
    }

    /// `true` only when the date parsed and lies strictly before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.observed_date
            .as_ref()
            .is_some_and(|d| d.is_before(cutoff))
    }

    pub fn observed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observed_date.as_ref().and_then(DateValue::timestamp)
    }
}

/// CSV row for [`ArchiveEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRow {
    pub url: String,
    pub date_on_archive_utc_iso: String,
}

impl From<&ArchiveEntry> for ArchiveRow {
    fn from(entry: &ArchiveEntry) -> Self {
        Self {
            url: entry.url.clone(),
            date_on_archive_utc_iso: entry
                .observed_date
                .as_ref()
                .map(DateValue::to_csv_string)
                .unwrap_or_else(|| MISSING_DATE.to_string()),
        }
    }
}

impl ArchiveRow {
    /// Rebuild the entry, re-parsing the stored date.
    pub fn into_entry(self, now: DateTime<Utc>) -> ArchiveEntry {
        let observed_date = match self.date_on_archive_utc_iso.trim() {
            "" | MISSING_DATE => None,
            raw => Some(dates::parse(raw, now)),
        };
        ArchiveEntry::new(self.url, observed_date)
    }
}

/// Fields extracted from one article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub url: String,
    pub title: String,
    pub authors: Vec<String>,
    /// `None` when neither the page nor the archive provided a usable date.
    pub publish_date: Option<DateTime<Utc>>,
    pub body: String,
    pub primary_image_url: Option<String>,
}

/// CSV row for [`ExtractedArticle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRow {
    pub url: String,
    pub title: String,
    pub authors: String,
    pub publish_date_iso: String,
    pub body: String,
    pub primary_image_url: String,
}

impl From<&ExtractedArticle> for ArticleRow {
    fn from(article: &ExtractedArticle) -> Self {
        Self {
            url: article.url.clone(),
            title: article.title.clone(),
            authors: article.authors.join(", "),
            publish_date_iso: article
                .publish_date
                .map(dates::format_iso)
                .unwrap_or_default(),
            body: article.body.clone(),
            primary_image_url: article.primary_image_url.clone().unwrap_or_default(),
        }
    }
}

/// A Reddit submission returned by a subreddit search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub post_id: String,
    pub subreddit: String,
    pub title: String,
    pub selftext: String,
    pub author: String,
    pub created_utc: f64,
    pub score: i64,
    pub num_comments: u64,
    pub permalink: String,
    pub search_query: String,
}

/// A comment attached to a [`RedditPost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditComment {
    pub comment_id: String,
    pub post_id: String,
    pub subreddit: String,
    pub author: String,
    pub body: String,
    pub created_utc: f64,
    pub score: i64,
}

/// A message read from a public Telegram channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: u64,
    pub chat_id: String,
    pub chat_title: String,
    pub sender: String,
    pub text: String,
    pub timestamp_utc: String,
    pub reply_to_message_id: Option<u64>,
    pub views: Option<u64>,
}

/// Which input table a [`NormalizedDocument`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "Kyiv_Independent")]
    KyivIndependent,
    #[serde(rename = "BBC_News")]
    BbcNews,
    #[serde(rename = "Reddit_Comment")]
    RedditComment,
    #[serde(rename = "Telegram")]
    Telegram,
}

impl SourceType {
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::KyivIndependent => "Kyiv_Independent",
            SourceType::BbcNews => "BBC_News",
            SourceType::RedditComment => "Reddit_Comment",
            SourceType::Telegram => "Telegram",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label used when language detection was skipped or failed.
pub const NOT_DETECTED: &str = "not_detected";

/// One row of the consolidated corpus handed to downstream analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub source_id: String,
    pub source_type: SourceType,
    pub original_date: String,
    pub detected_language: String,
    pub cleaned_text: String,
    /// Empty unless the language is English or Italian and its model loaded.
    pub lemmatized_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entry_with_raw_date_is_never_stale() {
        let cutoff = Utc.with_ymd_and_hms(2022, 2, 1, 0, 0, 0).unwrap();
        let entry = ArchiveEntry::new(
            "https://example.com/a",
            Some(DateValue::Raw("unparseable-text".to_string())),
        );
        assert!(!entry.is_stale(cutoff));
        assert!(!ArchiveEntry::new("https://example.com/b", None).is_stale(cutoff));
    }

    #[test]
    fn test_archive_row_round_trip_keeps_dates() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let entry = ArchiveEntry::new("https://example.com/a", Some(DateValue::Timestamp(ts)));
        let row = ArchiveRow::from(&entry);
        assert_eq!(row.date_on_archive_utc_iso, "2024-05-01T08:00:00Z");
        assert_eq!(row.into_entry(now), entry);

        let missing = ArchiveRow::from(&ArchiveEntry::new("https://example.com/b", None));
        assert_eq!(missing.date_on_archive_utc_iso, MISSING_DATE);
        assert_eq!(missing.into_entry(now).observed_date, None);
    }

    #[test]
    fn test_article_row_flattens_optional_fields() {
        let article = ExtractedArticle {
            url: "https://example.com/a".to_string(),
            title: "Title".to_string(),
            authors: vec!["Jane Roe".to_string(), "John Doe".to_string()],
            publish_date: None,
            body: "Body".to_string(),
            primary_image_url: None,
        };
        let row = ArticleRow::from(&article);
        assert_eq!(row.authors, "Jane Roe, John Doe");
        assert_eq!(row.publish_date_iso, "");
        assert_eq!(row.primary_image_url, "");
    }

    #[test]
    fn test_source_type_serializes_to_label() {
        let json = serde_json::to_string(&SourceType::RedditComment).unwrap();
        assert_eq!(json, "\"Reddit_Comment\"");
        assert_eq!(SourceType::BbcNews.to_string(), "BBC_News");
    }
}
