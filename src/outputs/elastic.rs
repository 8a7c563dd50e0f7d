//! Elasticsearch loader for the normalized corpus.
//!
//! The index is dropped and recreated with a fixed mapping on every run, then
//! filled through `_bulk` in NDJSON batches. Each document is one CSV row,
//! keyed by `source_id`; empty cells are sent as `null` and columns that are
//! empty in every row are left out entirely.

use crate::config::ElasticConfig;
use crate::error::{PipelineError, Result};
use crate::outputs::csv::CsvTable;
use itertools::Itertools;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Column used as the document `_id`.
const ID_COLUMN: &str = "source_id";

/// Field mapping of the corpus index. Sentiment and topic fields are filled by
/// later enrichment steps and are optional in the input.
pub fn index_mapping() -> Value {
    json!({
        "properties": {
            "source_id": {"type": "keyword"},
            "source_type": {"type": "keyword"},
            "original_date": {
                "type": "date",
                "format": "date_optional_time||epoch_second",
                "ignore_malformed": true
            },
            "detected_language": {"type": "keyword"},
            "cleaned_text": {"type": "text", "analyzer": "standard"},
            "lemmatized_text": {"type": "text", "analyzer": "standard"},
            "sentiment_label": {"type": "keyword"},
            "sentiment_score_positive": {"type": "float"},
            "sentiment_score_negative": {"type": "float"},
            "sentiment_score_neutral": {"type": "float"},
            "dominant_topic": {"type": "integer"}
        }
    })
}

/// The two index operations the loader needs.
pub trait SearchIndex {
    /// Delete `index` if it exists and create it with `mapping`.
    async fn recreate_index(&self, index: &str, mapping: &Value) -> Result<()>;
    /// Send one NDJSON `_bulk` body and return the response JSON.
    async fn bulk(&self, body: String) -> Result<Value>;
}

/// `reqwest` client speaking the Elasticsearch REST API with basic auth.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    client: Client,
    host: String,
    user: String,
    password: String,
}

impl ElasticClient {
    pub fn new(config: &ElasticConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.host, path.trim_start_matches('/'))
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!(%url, %body, "Elasticsearch error response");
        Err(PipelineError::HttpStatus {
            url,
            status: status.as_u16(),
        })
    }

    /// `GET /` to verify host and credentials.
    #[instrument(level = "info", skip(self), fields(host = %self.host))]
    pub async fn ping(&self) -> Result<Value> {
        let response = self
            .client
            .get(self.url("/"))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;
        let info: Value = self.check(response).await?.json().await?;
        info!(
            version = info["version"]["number"].as_str().unwrap_or("unknown"),
            "Connected to Elasticsearch"
        );
        Ok(info)
    }
}

impl SearchIndex for ElasticClient {
    async fn recreate_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let exists = self
            .client
            .head(self.url(index))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;
        if exists.status() == StatusCode::OK {
            warn!(%index, "Index exists; deleting it");
            let response = self
                .client
                .delete(self.url(index))
                .basic_auth(&self.user, Some(&self.password))
                .send()
                .await?;
            self.check(response).await?;
        }

        let response = self
            .client
            .put(self.url(index))
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({ "mappings": mapping }))
            .send()
            .await?;
        self.check(response).await?;
        info!(%index, "Created index with mapping");
        Ok(())
    }

    async fn bulk(&self, body: String) -> Result<Value> {
        let response = self
            .client
            .post(self.url("_bulk"))
            .basic_auth(&self.user, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }
}

/// Typed value for a cell: numbers for numeric fields, `null` for empty cells.
fn cell_value(column: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    let numeric = column.starts_with("sentiment_score_") || column == "dominant_topic";
    if numeric {
        if let Ok(n) = raw.trim().parse::<i64>() {
            return Value::from(n);
        }
        if let Some(n) = raw.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Turn table rows into `(id, source)` pairs.
pub fn documents(table: &CsvTable, path: &Path) -> Result<Vec<(String, Value)>> {
    let id_idx = table.column(path, ID_COLUMN)?;
    let kept_columns: Vec<(usize, &str)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            table
                .records
                .iter()
                .any(|r| r.get(*i).is_some_and(|c| !c.trim().is_empty()))
        })
        .collect_vec();

    Ok(table
        .records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let id = record
                .get(id_idx)
                .filter(|id| !id.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("doc_{row}"));
            let source: Map<String, Value> = kept_columns
                .iter()
                .map(|&(i, column)| {
                    (
                        column.to_string(),
                        cell_value(column, record.get(i).unwrap_or_default()),
                    )
                })
                .collect();
            (id, Value::Object(source))
        })
        .collect())
}

/// NDJSON body for one batch: an `index` action line then the source line.
pub fn bulk_body(index: &str, docs: &[(String, Value)]) -> Result<String> {
    let mut body = String::new();
    for (id, source) in docs {
        body.push_str(&serde_json::to_string(
            &json!({"index": {"_index": index, "_id": id}}),
        )?);
        body.push('\n');
        body.push_str(&serde_json::to_string(source)?);
        body.push('\n');
    }
    Ok(body)
}

/// A failed bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: String,
    pub error_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub indexed: usize,
    pub failed: usize,
    pub first_failure: Option<BulkFailure>,
}

impl IndexSummary {
    fn absorb(&mut self, response: &Value) {
        let Some(items) = response["items"].as_array() else {
            return;
        };
        for item in items {
            let result = item
                .as_object()
                .and_then(|o| o.values().next())
                .cloned()
                .unwrap_or(Value::Null);
            if result.get("error").is_some_and(|e| !e.is_null()) {
                self.failed += 1;
                if self.first_failure.is_none() {
                    self.first_failure = Some(BulkFailure {
                        id: result["_id"].as_str().unwrap_or_default().to_string(),
                        error_type: result["error"]["type"].as_str().unwrap_or_default().to_string(),
                        reason: result["error"]["reason"].as_str().unwrap_or_default().to_string(),
                    });
                }
            } else {
                self.indexed += 1;
            }
        }
    }
}

/// Recreate `config.index` and load every row of the CSV at `input`.
///
/// # Arguments
///
/// * `index` - The search backend
/// * `config` - Index name and bulk batch size
/// * `input` - Normalized corpus CSV; must have a `source_id` column
///
/// # Returns
///
/// Counts of indexed and rejected documents. A failed bulk request counts
/// its whole batch as rejected and the next batch still runs.
///
/// # Errors
///
/// Reading the CSV, a missing `source_id` column, or a failure to recreate
/// the index.
#[instrument(level = "info", skip_all, fields(index = %config.index, input = %input.display()))]
pub async fn index_csv<I: SearchIndex>(
    index: &I,
    config: &ElasticConfig,
    input: &Path,
) -> Result<IndexSummary> {
    let table = CsvTable::read(input).await?;
    let docs = documents(&table, input)?;
    info!(rows = docs.len(), columns = table.headers.len(), "Loaded corpus");

    index.recreate_index(&config.index, &index_mapping()).await?;

    let mut summary = IndexSummary::default();
    for (n, batch) in docs.chunks(config.batch_size.max(1)).enumerate() {
        let body = bulk_body(&config.index, batch)?;
        match index.bulk(body).await {
            Ok(response) => summary.absorb(&response),
            Err(e) => {
                error!(batch = n, size = batch.len(), error = %e, "Bulk request failed");
                summary.failed += batch.len();
            }
        }
        debug!(batch = n, indexed = summary.indexed, failed = summary.failed, "Bulk batch sent");
    }

    info!(indexed = summary.indexed, failed = summary.failed, "Indexing finished");
    if let Some(first) = &summary.first_failure {
        error!(
            id = %first.id,
            error_type = %first.error_type,
            reason = %first.reason,
            "First failed document"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Document ids in a bulk body.
    fn bulk_ids(body: &str) -> Vec<String> {
        body.lines()
            .step_by(2)
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|v| v["index"]["_id"].as_str().map(str::to_string))
            .collect_vec()
    }

    #[derive(Default)]
    struct FakeIndex {
        recreated: RefCell<Vec<String>>,
        bodies: RefCell<Vec<String>>,
    }

    impl SearchIndex for FakeIndex {
        async fn recreate_index(&self, index: &str, mapping: &Value) -> Result<()> {
            assert!(mapping["properties"]["source_id"].is_object());
            self.recreated.borrow_mut().push(index.to_string());
            Ok(())
        }

        async fn bulk(&self, body: String) -> Result<Value> {
            let ids = bulk_ids(&body);
            self.bodies.borrow_mut().push(body);
            let items: Vec<Value> = ids
                .iter()
                .map(|id| {
                    if id == "bad" {
                        json!({"index": {"_id": id, "status": 400,
                            "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [original_date]"}}})
                    } else {
                        json!({"index": {"_id": id, "status": 201}})
                    }
                })
                .collect();
            Ok(json!({"errors": ids.iter().any(|i| i == "bad"), "items": items}))
        }
    }

    const CORPUS: &str = "source_id,source_type,original_date,detected_language,cleaned_text,lemmatized_text,sentiment_score_positive\n\
        a,BBC_News,2024-01-01T00:00:00Z,en,text a,lemma,0.75\n\
        bad,Telegram,not a date,it,text b,,\n\
        c,Reddit_Comment,,not_detected,text c,,\n";

    async fn table(tmp: &tempfile::TempDir) -> (CsvTable, std::path::PathBuf) {
        let path = tmp.path().join("normalized_corpus.csv");
        tokio::fs::write(&path, CORPUS).await.unwrap();
        (CsvTable::read(&path).await.unwrap(), path)
    }

    #[tokio::test]
    async fn test_documents_null_empty_cells() {
        let tmp = tempfile::tempdir().unwrap();
        let (table, path) = table(&tmp).await;
        let docs = documents(&table, &path).unwrap();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].0, "a");
        assert_eq!(docs[0].1["sentiment_score_positive"], json!(0.75));
        assert_eq!(docs[1].1["lemmatized_text"], Value::Null);
        assert_eq!(docs[2].1["original_date"], Value::Null);
    }

    #[test]
    fn test_all_empty_columns_are_dropped() {
        let mut table = CsvTable::default();
        table.headers = csv::StringRecord::from(vec!["source_id", "sentiment_label"]);
        table.records = vec![csv::StringRecord::from(vec!["x", ""])];
        let docs = documents(&table, Path::new("t.csv")).unwrap();
        assert!(docs[0].1.get("sentiment_label").is_none());
        assert_eq!(docs[0].1["source_id"], json!("x"));
    }

    #[test]
    fn test_bulk_body_is_ndjson() {
        let docs = vec![("a".to_string(), json!({"source_id": "a"}))];
        let body = bulk_body("corpus", &docs).unwrap();
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert!(body.ends_with('\n'));
        assert_eq!(
            lines,
            vec![
                json!({"index": {"_index": "corpus", "_id": "a"}}),
                json!({"source_id": "a"})
            ]
        );
        assert_eq!(bulk_ids(&body), vec!["a"]);
    }

    #[tokio::test]
    async fn test_index_csv_batches_and_counts_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, path) = table(&tmp).await;
        let config = ElasticConfig {
            index: "corpus".to_string(),
            batch_size: 2,
            ..ElasticConfig::default()
        };
        let index = FakeIndex::default();

        let summary = index_csv(&index, &config, &path).await.unwrap();

        assert_eq!(index.recreated.borrow().as_slice(), ["corpus"]);
        assert_eq!(index.bodies.borrow().len(), 2);
        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.failed, 1);
        let first = summary.first_failure.unwrap();
        assert_eq!(first.id, "bad");
        assert_eq!(first.error_type, "mapper_parsing_exception");
    }

    #[tokio::test]
    async fn test_missing_id_column_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.csv");
        tokio::fs::write(&path, "cleaned_text\nhello\n").await.unwrap();
        let err = index_csv(&FakeIndex::default(), &ElasticConfig::default(), &path)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }
}
