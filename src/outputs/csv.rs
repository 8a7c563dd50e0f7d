//! CSV snapshots between stages.
//!
//! Every stage writes its whole output in one call: rows are serialized into
//! an in-memory buffer and flushed with a single `tokio::fs::write`. Headers
//! come from [`CsvRecord::HEADER`] so that an empty table still carries its
//! column names for the next stage.

use crate::error::{PipelineError, Result};
use crate::models::{
    ArchiveRow, ArticleRow, NormalizedDocument, RedditComment, RedditPost, TelegramMessage,
};
use crate::utils::ensure_parent_dir;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// A row type with a fixed column layout.
pub trait CsvRecord: Serialize {
    const HEADER: &'static [&'static str];
}

impl CsvRecord for ArchiveRow {
    const HEADER: &'static [&'static str] = &["url", "date_on_archive_utc_iso"];
}

impl CsvRecord for ArticleRow {
    const HEADER: &'static [&'static str] = &[
        "url",
        "title",
        "authors",
        "publish_date_iso",
        "body",
        "primary_image_url",
    ];
}

impl CsvRecord for RedditPost {
    const HEADER: &'static [&'static str] = &[
        "post_id",
        "subreddit",
        "title",
        "selftext",
        "author",
        "created_utc",
        "score",
        "num_comments",
        "permalink",
        "search_query",
    ];
}

impl CsvRecord for RedditComment {
    const HEADER: &'static [&'static str] = &[
        "comment_id",
        "post_id",
        "subreddit",
        "author",
        "body",
        "created_utc",
        "score",
    ];
}

impl CsvRecord for TelegramMessage {
    const HEADER: &'static [&'static str] = &[
        "message_id",
        "chat_id",
        "chat_title",
        "sender",
        "text",
        "timestamp_utc",
        "reply_to_message_id",
        "views",
    ];
}

impl CsvRecord for NormalizedDocument {
    const HEADER: &'static [&'static str] = &[
        "source_id",
        "source_type",
        "original_date",
        "detected_language",
        "cleaned_text",
        "lemmatized_text",
    ];
}

/// Serialize `rows` to CSV bytes, header first.
pub fn to_csv_bytes<T: CsvRecord>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(T::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

/// Write `rows` to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = rows.len()))]
pub async fn write_rows<T: CsvRecord>(path: &Path, rows: &[T]) -> Result<()> {
    let bytes = to_csv_bytes(rows)?;
    ensure_parent_dir(path).await?;
    fs::write(path, &bytes).await?;
    info!(bytes = bytes.len(), "Wrote CSV");
    Ok(())
}

/// Read a whole CSV file into typed rows.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = fs::read(path).await?;
    let mut reader = ReaderBuilder::new().from_reader(bytes.as_slice());
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()?;
    debug!(rows = rows.len(), "Read CSV");
    Ok(rows)
}

/// An untyped table, for inputs whose columns are looked up by name.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: StringRecord,
    pub records: Vec<StringRecord>,
}

impl CsvTable {
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).await?;
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes.as_slice());
        let headers = reader.headers()?.clone();
        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { headers, records })
    }

    /// Index of `column`, or [`PipelineError::MissingColumn`].
    pub fn column(&self, path: &Path, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                path: path.display().to_string(),
                column: column.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    #[test]
    fn test_empty_table_still_has_header() {
        let bytes = to_csv_bytes::<ArchiveRow>(&[]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "url,date_on_archive_utc_iso\n");
    }

    #[test]
    fn test_optional_fields_are_empty_cells() {
        let msg = TelegramMessage {
            message_id: 42,
            chat_id: "kyivindependent_official".to_string(),
            chat_title: "Kyiv Independent".to_string(),
            sender: "Kyiv Independent".to_string(),
            text: "Air raid, \"alert\"".to_string(),
            timestamp_utc: "2024-01-01T00:00:00Z".to_string(),
            reply_to_message_id: None,
            views: Some(1200),
        };
        let out = String::from_utf8(to_csv_bytes(&[msg]).unwrap()).unwrap();
        let second = out.lines().nth(1).unwrap();
        assert_eq!(
            second,
            r#"42,kyivindependent_official,Kyiv Independent,Kyiv Independent,"Air raid, ""alert""",2024-01-01T00:00:00Z,,1200"#
        );
    }

    #[test]
    fn test_header_matches_serialized_fields() {
        let doc = NormalizedDocument {
            source_id: "id".to_string(),
            source_type: SourceType::BbcNews,
            original_date: String::new(),
            detected_language: "en".to_string(),
            cleaned_text: "a".to_string(),
            lemmatized_text: String::new(),
        };
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.serialize(&doc).unwrap();
        let derived = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let ours = String::from_utf8(to_csv_bytes(&[doc]).unwrap()).unwrap();
        assert_eq!(derived, ours);
    }

    #[tokio::test]
    async fn test_write_then_read_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("raw").join("archive.csv");
        let rows = vec![
            ArchiveRow {
                url: "https://kyivindependent.com/a/".to_string(),
                date_on_archive_utc_iso: "2024-01-01T00:00:00Z".to_string(),
            },
            ArchiveRow {
                url: "https://kyivindependent.com/b/".to_string(),
                date_on_archive_utc_iso: "N/A_DATE".to_string(),
            },
        ];
        write_rows(&path, &rows).await.unwrap();

        let back: Vec<ArchiveRow> = read_rows(&path).await.unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].date_on_archive_utc_iso, "N/A_DATE");
    }

    #[tokio::test]
    async fn test_table_column_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.csv");
        tokio::fs::write(&path, "text,message_id\nhello,1\n").await.unwrap();
        let table = CsvTable::read(&path).await.unwrap();
        assert_eq!(table.column(&path, "message_id").unwrap(), 1);
        assert!(matches!(
            table.column(&path, "timestamp_utc"),
            Err(PipelineError::MissingColumn { .. })
        ));
        assert_eq!(table.records.len(), 1);
    }
}
