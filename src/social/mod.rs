//! Social media collectors.
//!
//! - [`reddit`]: keyword searches over subreddits plus their comment trees
//! - [`telegram`]: keyword-filtered history of public channels

pub mod reddit;
pub mod telegram;
