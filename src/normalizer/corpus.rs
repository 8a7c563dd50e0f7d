//! Build the consolidated corpus from the collected tables.
//!
//! Each input names its text columns, id column and date column. Rows are
//! normalized one at a time and the result is written once to the
//! `normalized_corpus.csv` snapshot.

use super::Normalizer;
use crate::config::DataPaths;
use crate::dates;
use crate::error::{PipelineError, Result};
use crate::models::{NormalizedDocument, SourceType};
use crate::outputs::csv::{CsvTable, write_rows};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// One table to fold into the corpus.
#[derive(Debug, Clone)]
pub struct CorpusInput {
    pub path: PathBuf,
    pub source_type: SourceType,
    /// Concatenated with a single space; at least one must exist in the file.
    pub text_columns: &'static [&'static str],
    pub id_column: &'static str,
    pub date_column: &'static str,
}

impl CorpusInput {
    /// The four tables the collectors produce, in processing order.
    pub fn standard(paths: &DataPaths) -> Vec<CorpusInput> {
        vec![
            CorpusInput {
                path: paths.articles_csv("bbc_news"),
                source_type: SourceType::BbcNews,
                text_columns: &["title", "body"],
                id_column: "url",
                date_column: "publish_date_iso",
            },
            CorpusInput {
                path: paths.articles_csv("kyiv_independent"),
                source_type: SourceType::KyivIndependent,
                text_columns: &["title", "body"],
                id_column: "url",
                date_column: "publish_date_iso",
            },
            CorpusInput {
                path: paths.reddit_comments_csv.clone(),
                source_type: SourceType::RedditComment,
                text_columns: &["body"],
                id_column: "comment_id",
                date_column: "created_utc",
            },
            CorpusInput {
                path: paths.telegram_messages_csv.clone(),
                source_type: SourceType::Telegram,
                text_columns: &["text"],
                id_column: "message_id",
                date_column: "timestamp_utc",
            },
        ]
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub rows_seen: usize,
    pub documents: usize,
    pub skipped_empty_text: usize,
    pub files_skipped: usize,
}

/// Numeric epoch cells become ISO-8601; anything else is kept as written.
fn normalize_date_cell(raw: &str) -> String {
    let raw = raw.trim();
    match dates::from_epoch_str(raw) {
        Some(ts) => dates::format_iso(ts),
        None => raw.to_string(),
    }
}

fn process_table(
    input: &CorpusInput,
    table: &CsvTable,
    normalizer: &Normalizer,
    stats: &mut CorpusStats,
) -> Result<Vec<NormalizedDocument>> {
    let text_idx: Vec<usize> = input
        .text_columns
        .iter()
        .filter_map(|c| table.column(&input.path, c).ok())
        .collect();
    if text_idx.is_empty() {
        return Err(PipelineError::MissingColumn {
            path: input.path.display().to_string(),
            column: input.text_columns.join("|"),
        });
    }
    let id_idx = table.column(&input.path, input.id_column)?;
    let date_idx = table.column(&input.path, input.date_column)?;

    let mut documents = Vec::with_capacity(table.records.len());
    for record in &table.records {
        stats.rows_seen += 1;
        let text = text_idx
            .iter()
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            stats.skipped_empty_text += 1;
            continue;
        }

        let normalized = normalizer.normalize(&text);
        documents.push(NormalizedDocument {
            source_id: record.get(id_idx).unwrap_or_default().to_string(),
            source_type: input.source_type,
            original_date: normalize_date_cell(record.get(date_idx).unwrap_or_default()),
            detected_language: normalized.detected_language,
            cleaned_text: normalized.cleaned_text,
            lemmatized_text: normalized.lemmatized_text,
        });
    }
    Ok(documents)
}

/// Read every input, normalize its rows and concatenate the results.
///
/// A missing file is skipped with a warning; a file lacking a required column
/// is skipped with an error log. Neither aborts the run.
#[instrument(level = "info", skip_all, fields(inputs = inputs.len()))]
pub async fn build_corpus(
    inputs: &[CorpusInput],
    normalizer: &Normalizer,
) -> (Vec<NormalizedDocument>, CorpusStats) {
    let mut stats = CorpusStats::default();
    let mut corpus = Vec::new();

    for input in inputs {
        let path = input.path.display().to_string();
        if !input.path.exists() {
            warn!(%path, source = %input.source_type, "Input file not found; skipping");
            stats.files_skipped += 1;
            continue;
        }

        let table = match CsvTable::read(&input.path).await {
            Ok(table) => table,
            Err(e) => {
                error!(%path, error = %e, "Could not read input file; skipping");
                stats.files_skipped += 1;
                continue;
            }
        };
        info!(%path, rows = table.records.len(), "Loaded input table");

        match process_table(input, &table, normalizer, &mut stats) {
            Ok(documents) => {
                info!(%path, documents = documents.len(), "Normalized input table");
                corpus.extend(documents);
            }
            Err(e) => {
                error!(%path, error = %e, "Required column missing; skipping file");
                stats.files_skipped += 1;
            }
        }
    }

    stats.documents = corpus.len();
    info!(
        rows_seen = stats.rows_seen,
        documents = stats.documents,
        skipped_empty_text = stats.skipped_empty_text,
        files_skipped = stats.files_skipped,
        "Corpus normalization finished"
    );
    (corpus, stats)
}

/// [`build_corpus`] followed by a single write to `output`.
pub async fn normalize_to_csv(
    inputs: &[CorpusInput],
    normalizer: &Normalizer,
    output: &Path,
) -> Result<CorpusStats> {
    let (corpus, stats) = build_corpus(inputs, normalizer).await;
    if corpus.is_empty() {
        warn!("No documents were normalized");
    }
    write_rows(output, &corpus).await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_DETECTED;
    use crate::outputs::csv::read_rows;

    fn input(
        path: PathBuf,
        source_type: SourceType,
        text_columns: &'static [&'static str],
        id_column: &'static str,
        date_column: &'static str,
    ) -> CorpusInput {
        CorpusInput {
            path,
            source_type,
            text_columns,
            id_column,
            date_column,
        }
    }

    #[test]
    fn test_normalize_date_cell() {
        assert_eq!(normalize_date_cell("1700000000.0"), "2023-11-14T22:13:20Z");
        assert_eq!(normalize_date_cell("2024-01-01T00:00:00Z"), "2024-01-01T00:00:00Z");
        assert_eq!(normalize_date_cell(""), "");
    }

    #[tokio::test]
    async fn test_build_corpus_joins_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let articles = tmp.path().join("articles.csv");
        let comments = tmp.path().join("comments.csv");
        let broken = tmp.path().join("broken.csv");
        tokio::fs::write(
            &articles,
            "url,title,authors,publish_date_iso,body,primary_image_url\n\
             https://www.bbc.com/news/1,Drone strike,,2024-03-10T08:15:00Z,Details #breaking,\n\
             https://www.bbc.com/news/2,,,,,\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            &comments,
            "comment_id,post_id,subreddit,author,body,created_utc,score\n\
             c1,p1,ukraine,someone,Slava @user 2024,1700000000.0,5\n",
        )
        .await
        .unwrap();
        tokio::fs::write(&broken, "message_id,text\n1,hello\n").await.unwrap();

        let inputs = vec![
            input(articles, SourceType::BbcNews, &["title", "body"], "url", "publish_date_iso"),
            input(tmp.path().join("missing.csv"), SourceType::KyivIndependent, &["title", "body"], "url", "publish_date_iso"),
            input(comments, SourceType::RedditComment, &["body"], "comment_id", "created_utc"),
            input(broken, SourceType::Telegram, &["text"], "message_id", "timestamp_utc"),
        ];

        let (corpus, stats) = build_corpus(&inputs, &Normalizer::new(Default::default(), 15)).await;

        assert_eq!(
            stats,
            CorpusStats {
                rows_seen: 3,
                documents: 2,
                skipped_empty_text: 1,
                files_skipped: 2,
            }
        );
        assert_eq!(corpus[0].source_id, "https://www.bbc.com/news/1");
        assert_eq!(corpus[0].cleaned_text, "drone strike details");
        assert_eq!(corpus[1].source_type, SourceType::RedditComment);
        assert_eq!(corpus[1].original_date, "2023-11-14T22:13:20Z");
        assert_eq!(corpus[1].cleaned_text, "slava");
        assert_eq!(corpus[1].detected_language, NOT_DETECTED);
    }

    #[tokio::test]
    async fn test_normalize_to_csv_writes_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let telegram = tmp.path().join("telegram.csv");
        tokio::fs::write(
            &telegram,
            "message_id,chat_id,chat_title,sender,text,timestamp_utc,reply_to_message_id,views\n\
             7,chan,Chan,Chan,Air raid alert in Kyiv http://t.me/x,2024-05-01T10:00:00Z,,100\n",
        )
        .await
        .unwrap();
        let output = tmp.path().join("processed").join("normalized_corpus.csv");
        let inputs = vec![input(
            telegram,
            SourceType::Telegram,
            &["text"],
            "message_id",
            "timestamp_utc",
        )];

        let stats = normalize_to_csv(&inputs, &Normalizer::default(), &output)
            .await
            .unwrap();
        assert_eq!(stats.documents, 1);

        let rows: Vec<NormalizedDocument> = read_rows(&output).await.unwrap();
        assert_eq!(rows[0].source_id, "7");
        assert_eq!(rows[0].source_type, SourceType::Telegram);
        assert_eq!(rows[0].cleaned_text, "air raid alert in kyiv");
        assert_eq!(rows[0].original_date, "2024-05-01T10:00:00Z");
    }
}
