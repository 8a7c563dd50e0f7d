//! Output sinks for pipeline results.
//!
//! # Submodules
//!
//! - [`csv`]: whole-table CSV snapshots shared between stages
//! - [`elastic`]: bulk loading of the normalized corpus into Elasticsearch
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── raw/
//! │   ├── kyiv_independent_archive_article_urls.csv
//! │   ├── kyiv_independent_extracted_articles.csv
//! │   ├── bbc_news_archive_article_urls.csv
//! │   ├── bbc_news_extracted_articles.csv
//! │   ├── reddit_posts.csv
//! │   ├── reddit_comments.csv
//! │   └── telegram_messages.csv
//! ├── processed/
//! │   └── normalized_corpus.csv
//! └── models/
//!     ├── lemmas_en.tsv
//!     └── lemmas_it.tsv
//! ```

pub mod csv;
pub mod elastic;
