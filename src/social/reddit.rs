//! Reddit posts and comments.
//!
//! Uses the read-only OAuth API with an application-only token
//! (`grant_type=client_credentials`). For each subreddit the collector runs a
//! keyword search, then pulls the comment tree of every post it found,
//! expands up to five `more` stubs and keeps the first `comment_limit`
//! comments in breadth-first order (top-level comments before replies).

use crate::config::RedditConfig;
use crate::error::{PipelineError, Result};
use crate::models::{RedditComment, RedditPost};
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
/// Largest page the search endpoint returns.
const SEARCH_PAGE_SIZE: usize = 100;
const DELETED: &str = "[deleted]";
/// `more` stubs expanded per post.
const MORE_EXPANSIONS: usize = 5;
/// Ids accepted by one `/api/morechildren` call.
const MORE_CHILDREN_BATCH: usize = 100;

/// The two Reddit endpoints the collector needs.
pub trait RedditApi {
    /// One page of `/r/{subreddit}/search`, as the raw listing JSON.
    async fn search(
        &self,
        subreddit: &str,
        query: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<Value>;

    /// `/r/{subreddit}/comments/{post_id}`, as the raw `[post, comments]` JSON.
    async fn comments(&self, subreddit: &str, post_id: &str, limit: usize) -> Result<Value>;

    /// `/api/morechildren` for the ids of one `more` stub, as the raw JSON.
    async fn more_children(&self, post_id: &str, children: &[String]) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// HTTP implementation of [`RedditApi`].
#[derive(Debug, Clone)]
pub struct RedditClient {
    client: Client,
    token: String,
}

impl RedditClient {
    /// Obtain an application-only token and build the client.
    #[instrument(level = "info", skip_all)]
    pub async fn connect(config: &RedditConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()?;

        let response = client
            .post(TOKEN_URL)
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api(format!(
                "Reddit token request failed with HTTP {status}"
            )));
        }
        let token: TokenResponse = response.json().await?;
        info!(expires_in = token.expires_in, "Authenticated with Reddit (read-only)");
        Ok(Self {
            client,
            token: token.access_token,
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

impl RedditApi for RedditClient {
    async fn search(
        &self,
        subreddit: &str,
        query: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<Value> {
        let url = format!("{API_BASE}/r/{}/search", urlencoding::encode(subreddit));
        let mut params = vec![
            ("q", query.to_string()),
            ("restrict_sr", "1".to_string()),
            ("sort", "relevance".to_string()),
            ("limit", limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }
        self.get_json(&url, &params).await
    }

    async fn comments(&self, subreddit: &str, post_id: &str, limit: usize) -> Result<Value> {
        let url = format!(
            "{API_BASE}/r/{}/comments/{}",
            urlencoding::encode(subreddit),
            urlencoding::encode(post_id)
        );
        let params = [
            ("limit", limit.to_string()),
            ("sort", "top".to_string()),
            ("raw_json", "1".to_string()),
        ];
        self.get_json(&url, &params).await
    }

    async fn more_children(&self, post_id: &str, children: &[String]) -> Result<Value> {
        let url = format!("{API_BASE}/api/morechildren");
        let params = [
            ("api_type", "json".to_string()),
            ("link_id", format!("t3_{post_id}")),
            ("children", children.join(",")),
            ("raw_json", "1".to_string()),
        ];
        self.get_json(&url, &params).await
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    subreddit: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    author: Option<String>,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    permalink: String,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    score: i64,
    /// Fullname of the parent (`t3_` post or `t1_` comment).
    #[serde(default)]
    parent_id: String,
    /// Either `""` or a nested listing.
    #[serde(default)]
    replies: Value,
}

#[derive(Debug, Deserialize)]
struct MoreStub {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    parent_id: String,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenResponse {
    json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenJson {
    #[serde(default)]
    data: MoreChildrenData,
}

#[derive(Debug, Default, Deserialize)]
struct MoreChildrenData {
    #[serde(default)]
    things: Vec<Thing>,
}

fn author_or_deleted(author: Option<String>) -> String {
    author
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| DELETED.to_string())
}

/// Posts on one search page and the cursor for the next page.
fn parse_search_page(json: Value, query: &str) -> Result<(Vec<RedditPost>, Option<String>)> {
    let listing: Listing = serde_json::from_value(json)?;
    let posts = listing
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == "t3")
        .filter_map(|thing| match serde_json::from_value::<RawPost>(thing.data) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(error = %e, "Skipping malformed post");
                None
            }
        })
        .map(|raw| RedditPost {
            post_id: raw.id,
            subreddit: raw.subreddit,
            title: raw.title,
            selftext: raw.selftext,
            author: author_or_deleted(raw.author),
            created_utc: raw.created_utc,
            score: raw.score,
            num_comments: raw.num_comments,
            permalink: raw.permalink,
            search_query: query.to_string(),
        })
        .collect();
    Ok((posts, listing.data.after.filter(|a| !a.is_empty())))
}

/// One post's comments grouped by parent fullname, plus the `more` stubs
/// that have not been expanded yet.
#[derive(Debug)]
struct CommentTree {
    root: String,
    replies: HashMap<String, Vec<RedditComment>>,
    stubs: Vec<MoreStub>,
}

impl CommentTree {
    fn new(post: &RedditPost) -> Self {
        Self {
            root: format!("t3_{}", post.post_id),
            replies: HashMap::new(),
            stubs: Vec::new(),
        }
    }

    /// Attach `things` below `parent`, recursing into nested reply listings.
    /// A thing's own `parent_id` wins over `parent` when present.
    fn graft(&mut self, parent: &str, things: Vec<Thing>, post: &RedditPost) {
        for thing in things {
            match thing.kind.as_str() {
                "t1" => {
                    let Ok(raw) = serde_json::from_value::<RawComment>(thing.data) else {
                        continue;
                    };
                    let parent_id = if raw.parent_id.is_empty() {
                        parent.to_string()
                    } else {
                        raw.parent_id
                    };
                    let fullname = format!("t1_{}", raw.id);
                    self.replies.entry(parent_id).or_default().push(RedditComment {
                        comment_id: raw.id,
                        post_id: post.post_id.clone(),
                        subreddit: post.subreddit.clone(),
                        author: author_or_deleted(raw.author),
                        body: raw.body,
                        created_utc: raw.created_utc,
                        score: raw.score,
                    });
                    if let Ok(nested) = serde_json::from_value::<Listing>(raw.replies) {
                        self.graft(&fullname, nested.data.children, post);
                    }
                }
                "more" => {
                    let Ok(mut stub) = serde_json::from_value::<MoreStub>(thing.data) else {
                        continue;
                    };
                    // "continue this thread" links carry no ids
                    if stub.children.is_empty() {
                        continue;
                    }
                    if stub.parent_id.is_empty() {
                        stub.parent_id = parent.to_string();
                    }
                    self.stubs.push(stub);
                }
                _ => {}
            }
        }
    }

    /// Largest `count` first; the earliest stub wins a tie.
    fn next_stub(&mut self) -> Option<MoreStub> {
        let (index, _) = self
            .stubs
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.count.cmp(&b.count).then(ib.cmp(ia)))?;
        Some(self.stubs.remove(index))
    }

    /// The first `limit` comments, level by level from the post down.
    fn breadth_first(mut self, limit: usize) -> Vec<RedditComment> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([self.root.clone()]);
        while let Some(parent) = queue.pop_front() {
            for comment in self.replies.remove(&parent).unwrap_or_default() {
                if out.len() >= limit {
                    return out;
                }
                queue.push_back(format!("t1_{}", comment.comment_id));
                out.push(comment);
            }
        }
        out
    }
}

fn comment_tree(json: Value, post: &RedditPost) -> Result<CommentTree> {
    let Value::Array(mut parts) = json else {
        return Err(PipelineError::Api(
            "comment response is not a [post, comments] pair".to_string(),
        ));
    };
    let mut tree = CommentTree::new(post);
    if parts.len() < 2 {
        return Ok(tree);
    }
    let listing: Listing = serde_json::from_value(parts.swap_remove(1))?;
    let root = tree.root.clone();
    tree.graft(&root, listing.data.children, post);
    Ok(tree)
}

fn parse_more_children(json: Value) -> Result<Vec<Thing>> {
    let response: MoreChildrenResponse = serde_json::from_value(json)?;
    Ok(response.json.data.things)
}

/// Replace up to [`MORE_EXPANSIONS`] stubs with the comments they hide. A
/// failed expansion only loses that stub.
async fn expand_more<A: RedditApi>(
    api: &A,
    tree: &mut CommentTree,
    post: &RedditPost,
    pause: Duration,
) {
    for _ in 0..MORE_EXPANSIONS {
        let Some(stub) = tree.next_stub() else {
            break;
        };
        let ids: Vec<String> = stub.children.into_iter().take(MORE_CHILDREN_BATCH).collect();
        sleep(pause).await;
        match api
            .more_children(&post.post_id, &ids)
            .await
            .and_then(parse_more_children)
        {
            Ok(things) => tree.graft(&stub.parent_id, things, post),
            Err(e) => warn!(post_id = %post.post_id, error = %e, "Could not expand more comments"),
        }
    }
}

/// Everything gathered by one [`collect`] run.
#[derive(Debug, Clone, Default)]
pub struct RedditHarvest {
    pub posts: Vec<RedditPost>,
    pub comments: Vec<RedditComment>,
    pub failed_subreddits: Vec<String>,
}

async fn search_subreddit<A: RedditApi>(
    api: &A,
    subreddit: &str,
    config: &RedditConfig,
    pause: Duration,
) -> Result<Vec<RedditPost>> {
    let query = config.search_query();
    let mut posts = Vec::new();
    let mut after: Option<String> = None;

    while posts.len() < config.post_limit {
        let page_size = (config.post_limit - posts.len()).min(SEARCH_PAGE_SIZE);
        let json = api
            .search(subreddit, &query, page_size, after.as_deref())
            .await?;
        let (page, next) = parse_search_page(json, &query)?;
        debug!(subreddit, page = page.len(), "Search page received");
        let empty = page.is_empty();
        posts.extend(page);
        match next {
            Some(cursor) if !empty => after = Some(cursor),
            _ => break,
        }
        sleep(pause).await;
    }
    posts.truncate(config.post_limit);
    Ok(posts)
}

/// Search every configured subreddit and collect posts and comments.
///
/// A failing subreddit is logged and recorded in
/// [`RedditHarvest::failed_subreddits`]; the rest still run. A failing comment
/// fetch only loses that post's comments.
///
/// # Arguments
///
/// * `api` - Authenticated Reddit endpoints
/// * `config` - Subreddits, keywords, post and comment limits
/// * `pause` - Wait between consecutive API calls
///
/// # Returns
///
/// A [`RedditHarvest`] with posts in search order and, per post, comments in
/// breadth-first order.
#[instrument(level = "info", skip_all, fields(subreddits = config.subreddits.len()))]
pub async fn collect<A: RedditApi>(api: &A, config: &RedditConfig, pause: Duration) -> RedditHarvest {
    let mut harvest = RedditHarvest::default();

    for subreddit in &config.subreddits {
        info!(%subreddit, query = %config.search_query(), "Searching subreddit");
        let posts = match search_subreddit(api, subreddit, config, pause).await {
            Ok(posts) => posts,
            Err(e) => {
                error!(%subreddit, error = %e, "Subreddit search failed; moving on");
                harvest.failed_subreddits.push(subreddit.clone());
                continue;
            }
        };
        info!(%subreddit, posts = posts.len(), "Posts found");

        for post in &posts {
            let fetched = match api.comments(subreddit, &post.post_id, config.comment_limit).await {
                Ok(json) => comment_tree(json, post),
                Err(e) => Err(e),
            };
            match fetched {
                Ok(mut tree) => {
                    expand_more(api, &mut tree, post, pause).await;
                    let comments = tree.breadth_first(config.comment_limit);
                    debug!(
                        post = %truncate_for_log(&post.title, 50),
                        comments = comments.len(),
                        "Comments collected"
                    );
                    harvest.comments.extend(comments);
                }
                Err(e) => warn!(post_id = %post.post_id, error = %e, "Comment fetch failed"),
            }
            sleep(pause).await;
        }
        harvest.posts.extend(posts);
    }

    info!(
        posts = harvest.posts.len(),
        comments = harvest.comments.len(),
        failed = harvest.failed_subreddits.len(),
        "Reddit collection finished"
    );
    harvest
}
