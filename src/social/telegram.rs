//! Public Telegram channels via the web preview.
//!
//! `https://t.me/s/<channel>` renders the latest messages of a public channel
//! as HTML, oldest at the top. Older history is reached with
//! `?before=<message id>`. Each message looks like:
//!
//! ```html
//! <div class="tgme_widget_message js-widget_message" data-post="ClashReport/1234">
//!   <a class="tgme_widget_message_owner_name"><span>Clash Report</span></a>
//!   <a class="tgme_widget_message_reply" href="https://t.me/ClashReport/1230">…</a>
//!   <div class="tgme_widget_message_text js-message_text">Text<br/>more text</div>
//!   <span class="tgme_widget_message_views">1.2K</span>
//!   <a class="tgme_widget_message_date"><time datetime="2024-05-01T10:00:00+00:00"></time></a>
//! </div>
//! ```

use crate::config::TelegramConfig;
use crate::dates::{self, DateValue};
use crate::error::{PipelineError, Result};
use crate::http::PageFetcher;
use crate::models::TelegramMessage;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

const PREVIEW_BASE: &str = "https://t.me/s";

static MESSAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.tgme_widget_message[data-post]").unwrap());
static MESSAGE_TEXT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tgme_widget_message_text.js-message_text").unwrap());
static MESSAGE_TIME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tgme_widget_message_date time[datetime]").unwrap());
static VIEWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tgme_widget_message_views").unwrap());
static REPLY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.tgme_widget_message_reply[href]").unwrap());
static AUTHOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".tgme_widget_message_from_author, .tgme_widget_message_owner_name").unwrap()
});
static CHANNEL_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".tgme_channel_info_header_title, .tgme_header_title").unwrap()
});

/// A message as rendered on the preview page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewMessage {
    pub id: u64,
    pub sender: Option<String>,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub reply_to: Option<u64>,
    pub views: Option<u64>,
}

/// One parsed preview page; `messages` are newest first.
#[derive(Debug, Clone, Default)]
pub struct PreviewPage {
    pub title: Option<String>,
    pub messages: Vec<PreviewMessage>,
}

/// `"1.2K"` → 1200, `"3M"` → 3000000, `"950"` → 950.
pub fn parse_views(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (number, multiplier) = match raw.chars().last()? {
        'K' | 'k' => (&raw[..raw.len() - 1], 1_000.0),
        'M' | 'm' => (&raw[..raw.len() - 1], 1_000_000.0),
        _ => (raw, 1.0),
    };
    let value: f64 = number.trim().parse().ok()?;
    (value >= 0.0).then(|| (value * multiplier).round() as u64)
}

fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Message text with `<br>` turned into newlines.
fn message_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Trailing numeric segment of `ClashReport/1234` or `https://t.me/ClashReport/1234`.
fn post_id(reference: &str) -> Option<u64> {
    reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|id| id.split('?').next())
        .and_then(|id| id.parse().ok())
}

pub fn parse_preview_page(html: &str, now: DateTime<Utc>) -> PreviewPage {
    let document = Html::parse_document(html);
    let title = document
        .select(&CHANNEL_TITLE)
        .map(collapsed_text)
        .find(|t| !t.is_empty());

    let mut messages: Vec<PreviewMessage> = document
        .select(&MESSAGE)
        .filter_map(|el| {
            let id = el.value().attr("data-post").and_then(post_id)?;
            let timestamp = el
                .select(&MESSAGE_TIME)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .and_then(|raw| match dates::parse(raw, now) {
                    DateValue::Timestamp(ts) => Some(ts),
                    DateValue::Raw(_) => None,
                });
            Some(PreviewMessage {
                id,
                sender: el
                    .select(&AUTHOR)
                    .map(collapsed_text)
                    .find(|s| !s.is_empty()),
                text: el.select(&MESSAGE_TEXT).next().map(message_text).unwrap_or_default(),
                timestamp,
                reply_to: el
                    .select(&REPLY)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(post_id),
                views: el
                    .select(&VIEWS)
                    .next()
                    .and_then(|v| parse_views(&collapsed_text(v))),
            })
        })
        .collect();
    messages.sort_by(|a, b| b.id.cmp(&a.id));
    messages.dedup_by_key(|m| m.id);
    PreviewPage { title, messages }
}

/// Fetch `url`; on HTTP 429 sleep for the server's `Retry-After` and try once more.
async fn fetch_with_backoff<F: PageFetcher>(fetcher: &F, url: &str) -> Result<String> {
    match fetcher.fetch(url).await {
        Err(PipelineError::RateLimited { retry_after, .. }) => {
            warn!(%url, ?retry_after, "Rate limited; waiting before a single retry");
            sleep(retry_after).await;
            fetcher.fetch(url).await
        }
        other => other,
    }
}

/// Limits for one channel.
#[derive(Debug, Clone)]
pub struct ChannelParams {
    pub start: DateTime<Utc>,
    pub message_limit: usize,
    /// Lowercased; an empty list keeps every message with text.
    pub keywords: Vec<String>,
    /// Wait before every `?before=` page request.
    pub delay: Duration,
}

fn matches_keywords(text: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k.as_str()))
}

/// Walk one channel backwards from its newest message.
///
/// Stops at the start date, after `message_limit` scanned messages, when a
/// page is empty, or when a fetch fails (after the single 429 retry). What
/// was kept up to that point is returned.
#[instrument(level = "info", skip(fetcher, params))]
pub async fn collect_channel<F: PageFetcher>(
    fetcher: &F,
    channel: &str,
    params: &ChannelParams,
) -> Vec<TelegramMessage> {
    let mut kept = Vec::new();
    let mut scanned = 0usize;
    let mut before: Option<u64> = None;
    let mut chat_title = channel.to_string();

    'pages: loop {
        let url = match before {
            Some(id) => format!("{PREVIEW_BASE}/{channel}?before={id}"),
            None => format!("{PREVIEW_BASE}/{channel}"),
        };
        if before.is_some() {
            debug!(%url, delay = ?params.delay, "Waiting before next channel page");
            sleep(params.delay).await;
        }
        let html = match fetch_with_backoff(fetcher, &url).await {
            Ok(html) => html,
            Err(e) => {
                error!(%url, error = %e, "Channel page fetch failed; stopping channel");
                break;
            }
        };

        let page = parse_preview_page(&html, Utc::now());
        if let Some(title) = page.title.filter(|_| before.is_none()) {
            chat_title = title;
        }
        let Some(oldest) = page.messages.last().map(|m| m.id) else {
            debug!(%url, "No messages on page");
            break;
        };
        if before.is_some_and(|b| oldest >= b) {
            warn!(%url, oldest, "Pagination did not move backwards; stopping channel");
            break;
        }

        for message in page.messages {
            if scanned >= params.message_limit {
                info!(limit = params.message_limit, "Message limit reached");
                break 'pages;
            }
            if message.timestamp.is_some_and(|ts| ts < params.start) {
                info!(start = %params.start.date_naive(), "Reached start date");
                break 'pages;
            }
            scanned += 1;

            if message.text.is_empty() || !matches_keywords(&message.text, &params.keywords) {
                continue;
            }
            kept.push(TelegramMessage {
                message_id: message.id,
                chat_id: channel.to_string(),
                chat_title: chat_title.clone(),
                sender: message.sender.unwrap_or_else(|| chat_title.clone()),
                text: message.text,
                timestamp_utc: message.timestamp.map(dates::format_iso).unwrap_or_default(),
                reply_to_message_id: message.reply_to,
                views: message.views,
            });
        }

        before = Some(oldest);
    }

    info!(scanned, kept = kept.len(), "Channel finished");
    kept
}

/// Collect every configured channel, pausing between channels.
///
/// # Arguments
///
/// * `fetcher` - Page source for the `t.me/s` previews
/// * `config` - Channels, keywords, message limit and channel pause
/// * `start` - Messages older than this end a channel's walk
/// * `delay` - Wait between page requests inside one channel
///
/// # Returns
///
/// Kept messages of every channel, channel by channel, newest first within
/// each. A channel that cannot be fetched contributes nothing.
#[instrument(level = "info", skip_all, fields(channels = config.channels.len()))]
pub async fn collect<F: PageFetcher>(
    fetcher: &F,
    config: &TelegramConfig,
    start: DateTime<Utc>,
    delay: Duration,
) -> Vec<TelegramMessage> {
    let params = ChannelParams {
        start,
        message_limit: config.message_limit,
        keywords: config.keyword_filter(),
        delay,
    };
    let channels: Vec<&str> = config
        .channels
        .iter()
        .map(|c| c.trim().trim_start_matches('@'))
        .filter(|c| !c.is_empty())
        .collect();

    let mut messages = Vec::new();
    for (i, channel) in channels.iter().enumerate() {
        messages.extend(collect_channel(fetcher, channel, &params).await);
        if i + 1 < channels.len() {
            sleep(config.channel_pause()).await;
        }
    }
    info!(messages = messages.len(), "Telegram collection finished");
    messages
}
