//! Command-line interface definitions for the corpus builder.
//!
//! Each pipeline stage is a subcommand; they communicate only through the
//! CSV files under the data directory, so they can be run one at a time.
//! Credentials can come from flags or environment variables.

use crate::scrapers::Site;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the corpus builder.
///
/// # Examples
///
/// ```sh
/// # Walk the Kyiv Independent archive, then extract the articles
/// war_news_corpus crawl --site kyiv
/// war_news_corpus extract --site kyiv
///
/// # Collect Reddit comments with credentials from the environment
/// REDDIT_CLIENT_ID=... REDDIT_CLIENT_SECRET=... war_news_corpus reddit
///
/// # Normalize everything and load it into Elasticsearch
/// war_news_corpus -c config.yaml normalize
/// ELASTIC_PASSWORD=... war_news_corpus index
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory from the config file
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk a news archive and save the article links it lists
    Crawl {
        #[arg(short, long, value_enum)]
        site: Site,

        /// Stop after this many archive pages
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Fetch every archived link of a site and extract the article content
    Extract {
        #[arg(short, long, value_enum)]
        site: Site,
    },

    /// Search subreddits and collect posts and comments
    Reddit {
        #[arg(long, env = "REDDIT_CLIENT_ID", hide_env_values = true)]
        client_id: Option<String>,

        #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
        client_secret: Option<String>,
    },

    /// Collect keyword-matching messages from public Telegram channels
    Telegram,

    /// Clean, language-tag and lemmatize every collected table into one corpus
    Normalize,

    /// Load the normalized corpus into Elasticsearch
    Index {
        #[arg(long, env = "ELASTIC_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// CSV to index instead of the normalized corpus
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}
