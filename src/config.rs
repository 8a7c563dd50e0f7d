//! Pipeline configuration.
//!
//! All settings live in one [`PipelineConfig`] built at startup and passed to
//! every stage. Built-in defaults cover everything; an optional YAML file
//! overrides any subset of them, and credential flags on the command line
//! (or their environment variables) override the file.
//!
//! ```yaml
//! data_dir: ./data
//! global_start_date: 2022-02-01
//! scraping:
//!   max_pages: 50
//!   delay_secs: 2.0
//! reddit:
//!   client_id: abc
//!   client_secret: def
//! ```

use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

const PLACEHOLDER_REDDIT_ID: &str = "YOUR_CLIENT_ID";
const PLACEHOLDER_REDDIT_SECRET: &str = "YOUR_CLIENT_SECRET";
const PLACEHOLDER_ELASTIC_PASSWORD: &str = "elastic";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root for `raw/`, `processed/` and `models/`.
    pub data_dir: PathBuf,
    /// Earliest publish date accepted into the dataset (UTC midnight).
    pub global_start_date: NaiveDate,
    pub scraping: ScrapingConfig,
    pub reddit: RedditConfig,
    pub telegram: TelegramConfig,
    pub normalizer: NormalizerConfig,
    pub elasticsearch: ElasticConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            global_start_date: NaiveDate::from_ymd_opt(2022, 2, 1).unwrap_or_default(),
            scraping: ScrapingConfig::default(),
            reddit: RedditConfig::default(),
            telegram: TelegramConfig::default(),
            normalizer: NormalizerConfig::default(),
            elasticsearch: ElasticConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Hard ceiling on archive pages fetched per crawl.
    pub max_pages: usize,
    /// Pause between consecutive outbound requests.
    pub delay_secs: f64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            delay_secs: 2.0,
            request_timeout_secs: 20,
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_language: "en-GB,en;q=0.5".to_string(),
        }
    }
}

impl ScrapingConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs.max(0.0))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub subreddits: Vec<String>,
    /// Joined with `OR` into one search query per subreddit.
    pub keywords: Vec<String>,
    pub post_limit: usize,
    pub comment_limit: usize,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: PLACEHOLDER_REDDIT_ID.to_string(),
            client_secret: PLACEHOLDER_REDDIT_SECRET.to_string(),
            user_agent: format!("war_news_corpus/{}", env!("CARGO_PKG_VERSION")),
            subreddits: to_strings(&[
                "worldnews",
                "europe",
                "ukraine",
                "UkraineWarReport",
                "RussiaUkraineWarNews",
            ]),
            keywords: to_strings(&["ukraine", "russia", "zelensky", "putin", "nato"]),
            post_limit: 200,
            comment_limit: 50,
        }
    }
}

impl RedditConfig {
    pub fn search_query(&self) -> String {
        self.keywords.join(" OR ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Public channel usernames, without the `@`.
    pub channels: Vec<String>,
    pub keywords_en: Vec<String>,
    pub keywords_it: Vec<String>,
    pub message_limit: usize,
    /// Overrides `global_start_date` for message collection.
    pub start_date: Option<NaiveDate>,
    /// Pause between two channels.
    pub channel_pause_secs: f64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            channels: to_strings(&[
                "ClashReport",
                "militarylandnet",
                "WarTranslated",
                "Edizione_Straordinaria",
                "militaresemplice",
            ]),
            keywords_en: to_strings(&[
                "ukraine", "ukrainian", "russia", "russian", "war", "conflict", "attack",
                "military", "troops", "soldiers", "putin", "zelensky", "nato", "drone",
                "invasion", "forces", "defense", "weapon", "sanction", "peace", "refugee",
                "casualty", "territory", "frontline", "kyiv", "moscow", "kremlin", "donbas",
                "crimea", "kharkiv", "kherson", "mariupol", "bakhmut", "shelling", "artillery",
                "wagner", "himars",
            ]),
            keywords_it: to_strings(&[
                "ucraina", "ucraino", "russia", "russo", "guerra", "conflitto", "attacco",
                "militare", "truppe", "soldati", "putin", "zelensky", "nato", "drone",
                "invasione", "forze", "difesa", "arma", "sanzione", "pace", "profugo",
                "vittima", "territorio", "fronte", "kiev", "mosca", "cremlino", "donbas",
                "crimea", "kharkiv", "kherson", "mariupol", "bakhmut", "bombardamento",
                "artiglieria", "wagner",
            ]),
            message_limit: 1000,
            start_date: None,
            channel_pause_secs: 5.0,
        }
    }
}

impl TelegramConfig {
    /// English and Italian keywords, lowercased.
    pub fn keyword_filter(&self) -> Vec<String> {
        self.keywords_en
            .iter()
            .chain(self.keywords_it.iter())
            .map(|k| k.to_lowercase())
            .collect()
    }

    pub fn channel_pause(&self) -> Duration {
        Duration::from_secs_f64(self.channel_pause_secs.max(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Directory holding `lemmas_en.tsv` / `lemmas_it.tsv`; defaults to `<data_dir>/models`.
    pub models_dir: Option<PathBuf>,
    /// Texts shorter than this skip language detection.
    pub min_detect_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            models_dir: None,
            min_detect_chars: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub index: String,
    pub accept_invalid_certs: bool,
    pub batch_size: usize,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            host: "https://localhost:9200".to_string(),
            user: "elastic".to_string(),
            password: PLACEHOLDER_ELASTIC_PASSWORD.to_string(),
            index: "war_news_corpus".to_string(),
            accept_invalid_certs: true,
            batch_size: 500,
        }
    }
}

/// File locations derived from `data_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub models_dir: PathBuf,
    pub reddit_posts_csv: PathBuf,
    pub reddit_comments_csv: PathBuf,
    pub telegram_messages_csv: PathBuf,
    pub normalized_csv: PathBuf,
}

impl DataPaths {
    /// `<raw>/<slug>_archive_article_urls.csv`
    pub fn archive_csv(&self, slug: &str) -> PathBuf {
        self.raw_dir.join(format!("{slug}_archive_article_urls.csv"))
    }

    /// `<raw>/<slug>_extracted_articles.csv`
    pub fn articles_csv(&self, slug: &str) -> PathBuf {
        self.raw_dir.join(format!("{slug}_extracted_articles.csv"))
    }
}

impl PipelineConfig {
    /// Load the YAML file at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).await?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// The global cutoff as a UTC instant.
    pub fn cutoff(&self) -> DateTime<Utc> {
        start_of_day(self.global_start_date)
    }

    pub fn telegram_start(&self) -> DateTime<Utc> {
        start_of_day(self.telegram.start_date.unwrap_or(self.global_start_date))
    }

    pub fn paths(&self) -> DataPaths {
        let raw_dir = self.data_dir.join("raw");
        let processed_dir = self.data_dir.join("processed");
        let models_dir = self
            .normalizer
            .models_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("models"));
        DataPaths {
            reddit_posts_csv: raw_dir.join("reddit_posts.csv"),
            reddit_comments_csv: raw_dir.join("reddit_comments.csv"),
            telegram_messages_csv: raw_dir.join("telegram_messages.csv"),
            normalized_csv: processed_dir.join("normalized_corpus.csv"),
            raw_dir,
            processed_dir,
            models_dir,
        }
    }

    /// Reject empty or placeholder Reddit credentials before any request.
    pub fn validate_reddit(&self) -> Result<()> {
        let r = &self.reddit;
        if is_unset(&r.client_id, PLACEHOLDER_REDDIT_ID)
            || is_unset(&r.client_secret, PLACEHOLDER_REDDIT_SECRET)
        {
            return Err(PipelineError::Config(
                "Reddit client_id/client_secret are not set (config file, --client-id/--client-secret, or REDDIT_CLIENT_ID/REDDIT_CLIENT_SECRET)".to_string(),
            ));
        }
        if r.subreddits.is_empty() || r.keywords.is_empty() {
            return Err(PipelineError::Config(
                "Reddit subreddits and keywords must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_telegram(&self) -> Result<()> {
        if self.telegram.channels.iter().all(|c| c.trim().is_empty()) {
            return Err(PipelineError::Config(
                "telegram.channels must list at least one public channel".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_elasticsearch(&self) -> Result<()> {
        let es = &self.elasticsearch;
        if is_unset(&es.password, PLACEHOLDER_ELASTIC_PASSWORD) {
            return Err(PipelineError::Config(
                "Elasticsearch password is unset or still the default (ELASTIC_PASSWORD)"
                    .to_string(),
            ));
        }
        if es.batch_size == 0 {
            return Err(PipelineError::Config(
                "elasticsearch.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

fn is_unset(value: &str, placeholder: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == placeholder
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.cutoff(), Utc.with_ymd_and_hms(2022, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(config.scraping.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.normalizer.min_detect_chars, 15);
        assert_eq!(config.reddit.search_query(), "ukraine OR russia OR zelensky OR putin OR nato");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
data_dir: /tmp/corpus
global_start_date: 2023-05-01
scraping:
  max_pages: 3
  delay_secs: 0.5
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/corpus"));
        assert_eq!(config.scraping.max_pages, 3);
        assert_eq!(config.scraping.delay(), Duration::from_millis(500));
        assert_eq!(config.scraping.request_timeout_secs, 20);
        assert_eq!(config.cutoff(), Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(config.telegram.message_limit, 1000);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = PipelineConfig::from_yaml("   \n").unwrap();
        assert_eq!(config.scraping.max_pages, 100);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(PipelineConfig::from_yaml("scraping: [1, 2").is_err());
    }

    #[test]
    fn test_paths_layout() {
        let config = PipelineConfig {
            data_dir: PathBuf::from("/srv/data"),
            ..PipelineConfig::default()
        };
        let paths = config.paths();
        assert_eq!(paths.models_dir, PathBuf::from("/srv/data/models"));
        assert_eq!(
            paths.archive_csv("bbc_news"),
            PathBuf::from("/srv/data/raw/bbc_news_archive_article_urls.csv")
        );
        assert_eq!(
            paths.normalized_csv,
            PathBuf::from("/srv/data/processed/normalized_corpus.csv")
        );
    }

    #[test]
    fn test_placeholder_credentials_are_rejected() {
        let mut config = PipelineConfig::default();
        assert!(matches!(config.validate_reddit(), Err(PipelineError::Config(_))));
        assert!(config.validate_elasticsearch().is_err());

        config.reddit.client_id = "id".to_string();
        config.reddit.client_secret = "secret".to_string();
        config.elasticsearch.password = "s3cret".to_string();
        assert!(config.validate_reddit().is_ok());
        assert!(config.validate_elasticsearch().is_ok());
    }

    #[test]
    fn test_telegram_start_falls_back_to_global() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.telegram_start(), config.cutoff());
        config.telegram.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(
            config.telegram_start(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(config.validate_telegram().is_ok());
        config.telegram.channels.clear();
        assert!(config.validate_telegram().is_err());
    }
}
