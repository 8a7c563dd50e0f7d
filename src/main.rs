//! # War News Corpus
//!
//! Builds a multilingual text corpus about the war in Ukraine from news
//! archives and social media, then normalizes it for downstream analysis.
//!
//! ## Stages
//!
//! 1. **crawl**: walk the Kyiv Independent or BBC News archive and save the
//!    article links with the date shown on the archive card
//! 2. **extract**: fetch every saved link and extract title, authors, publish
//!    date, body and lead image
//! 3. **reddit** / **telegram**: collect keyword-matching comments and
//!    channel messages
//! 4. **normalize**: clean, language-tag and lemmatize all tables into one
//!    consolidated CSV
//! 5. **index**: bulk-load the consolidated CSV into Elasticsearch
//!
//! Stages run strictly sequentially and hand data to each other through CSV
//! files under the data directory.
//!
//! ## Usage
//!
//! ```sh
//! war_news_corpus crawl --site kyiv && war_news_corpus extract --site kyiv
//! ```

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod error;
mod extractor;
mod http;
mod models;
mod normalizer;
mod outputs;
mod paginator;
mod scrapers;
mod social;
mod utils;

use cli::{Cli, Command};
use config::PipelineConfig;
use extractor::ExtractParams;
use http::HttpFetcher;
use models::{ArchiveRow, ArticleRow};
use normalizer::Normalizer;
use normalizer::corpus::{CorpusInput, normalize_to_csv};
use normalizer::lemmatizer::LanguageModels;
use outputs::csv::write_rows;
use outputs::elastic::{ElasticClient, index_csv};
use paginator::{CrawlParams, crawl};
use scrapers::Site;
use social::reddit::{RedditClient, collect as collect_reddit};
use social::telegram::collect as collect_telegram;
use utils::ensure_writable_dir;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("war_news_corpus starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.data_dir, ?args.command, "Parsed CLI arguments");

    let mut config = PipelineConfig::load(args.config.as_deref()).await?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    info!(data_dir = %config.data_dir.display(), cutoff = %config.cutoff(), "Configuration ready");

    let result = match args.command {
        Command::Crawl { site, max_pages } => {
            if let Some(max_pages) = max_pages {
                config.scraping.max_pages = max_pages;
            }
            run_crawl(&config, site).await
        }
        Command::Extract { site } => run_extract(&config, site).await,
        Command::Reddit {
            client_id,
            client_secret,
        } => {
            if let Some(id) = client_id {
                config.reddit.client_id = id;
            }
            if let Some(secret) = client_secret {
                config.reddit.client_secret = secret;
            }
            run_reddit(&config).await
        }
        Command::Telegram => run_telegram(&config).await,
        Command::Normalize => run_normalize(&config).await,
        Command::Index { password, input } => {
            if let Some(password) = password {
                config.elasticsearch.password = password;
            }
            run_index(&config, input).await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Stage failed");
        return Err(e.into());
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip(config))]
async fn run_crawl(config: &PipelineConfig, site: Site) -> error::Result<()> {
    let paths = config.paths();
    ensure_writable_dir(&paths.raw_dir).await?;

    let source = site.source();
    let fetcher = HttpFetcher::new(&config.scraping)?;
    let params = CrawlParams::for_source(
        source.as_ref(),
        config.cutoff(),
        config.scraping.max_pages,
        config.scraping.delay(),
    );

    let outcome = crawl(&fetcher, source.as_ref(), &params).await;
    info!(
        source = %site.source_type(),
        entries = outcome.entries.len(),
        pages = outcome.pages_fetched,
        stop_reason = ?outcome.stop_reason,
        "Crawl finished"
    );

    let rows: Vec<ArchiveRow> = outcome.entries.iter().map(ArchiveRow::from).collect();
    write_rows(&paths.archive_csv(source.slug()), &rows).await
}

#[instrument(level = "info", skip(config))]
async fn run_extract(config: &PipelineConfig, site: Site) -> error::Result<()> {
    let paths = config.paths();
    ensure_writable_dir(&paths.raw_dir).await?;

    let source = site.source();
    let entries = extractor::read_archive(&paths.archive_csv(source.slug()), Utc::now()).await?;
    info!(entries = entries.len(), "Loaded archive links");

    let fetcher = HttpFetcher::new(&config.scraping)?;
    let params = ExtractParams {
        cutoff: config.cutoff(),
        delay: config.scraping.delay(),
    };
    let articles = extractor::extract_articles(&fetcher, entries, &params).await;

    let rows: Vec<ArticleRow> = articles.iter().map(ArticleRow::from).collect();
    write_rows(&paths.articles_csv(source.slug()), &rows).await
}

#[instrument(level = "info", skip_all)]
async fn run_reddit(config: &PipelineConfig) -> error::Result<()> {
    config.validate_reddit()?;
    let paths = config.paths();
    ensure_writable_dir(&paths.raw_dir).await?;

    let client = RedditClient::connect(&config.reddit, config.scraping.request_timeout()).await?;
    let harvest = collect_reddit(&client, &config.reddit, config.scraping.delay()).await;
    if !harvest.failed_subreddits.is_empty() {
        warn!(failed = ?harvest.failed_subreddits, "Some subreddits could not be searched");
    }

    write_rows(&paths.reddit_posts_csv, &harvest.posts).await?;
    write_rows(&paths.reddit_comments_csv, &harvest.comments).await
}

#[instrument(level = "info", skip_all)]
async fn run_telegram(config: &PipelineConfig) -> error::Result<()> {
    config.validate_telegram()?;
    let paths = config.paths();
    ensure_writable_dir(&paths.raw_dir).await?;

    let fetcher = HttpFetcher::new(&config.scraping)?;
    let messages = collect_telegram(
        &fetcher,
        &config.telegram,
        config.telegram_start(),
        config.scraping.delay(),
    )
    .await;
    write_rows(&paths.telegram_messages_csv, &messages).await
}

#[instrument(level = "info", skip_all)]
async fn run_normalize(config: &PipelineConfig) -> error::Result<()> {
    let paths = config.paths();
    ensure_writable_dir(&paths.processed_dir).await?;

    let models = LanguageModels::load(&paths.models_dir).await;
    let normalizer = Normalizer::new(models, config.normalizer.min_detect_chars);
    let stats = normalize_to_csv(
        &CorpusInput::standard(&paths),
        &normalizer,
        &paths.normalized_csv,
    )
    .await?;
    info!(
        documents = stats.documents,
        path = %paths.normalized_csv.display(),
        "Normalized corpus written"
    );
    Ok(())
}

#[instrument(level = "info", skip(config))]
async fn run_index(config: &PipelineConfig, input: Option<std::path::PathBuf>) -> error::Result<()> {
    config.validate_elasticsearch()?;
    let input = input.unwrap_or_else(|| config.paths().normalized_csv);

    let client = ElasticClient::new(&config.elasticsearch, config.scraping.request_timeout())?;
    client.ping().await?;
    let summary = index_csv(&client, &config.elasticsearch, &input).await?;
    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some documents were rejected by Elasticsearch");
    }
    Ok(())
}
