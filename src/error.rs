//! Error type shared by every pipeline stage.
//!
//! Stages propagate these with `?`; the callers decide which failures are
//! fatal (configuration) and which only abort the current page, article or
//! entity (everything network related).

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("rate limited while fetching {url}; retry after {retry_after:?}")]
    RateLimited { url: String, retry_after: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not extract {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("{path} not found; run `{stage}` first")]
    MissingInput { path: String, stage: &'static str },

    #[error("column '{column}' not found in {path}")]
    MissingColumn { path: String, column: String },

    #[error("API error: {0}")]
    Api(String),
}

impl PipelineError {
    /// `true` for failures caused by the remote side or the network.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Http(_)
                | PipelineError::HttpStatus { .. }
                | PipelineError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
