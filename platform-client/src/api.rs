use crate::query::build_query;
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::retry::{decide, RetryDecision, RetryPolicy};
use chirp_core::{
    CandidatePost, CoreError, PlatformApiError, PlatformCredentials, PostReceipt, SearchFilter,
    MIN_AUTHOR_FOLLOWERS,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, Response, StatusCode};
use url::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const DEFAULT_API_BASE: &str = "https://api.x.com";
const SEARCH_MAX_RESULTS: &str = "25";
const TWEET_FIELDS: &str = "author_id,text,created_at,public_metrics,referenced_tweets";
const USER_FIELDS: &str = "username,verified,public_metrics";

/// Fallback reset delay when the 429 response carries no usable header;
/// matches the search endpoint's 15-minute window.
const DEFAULT_RATE_LIMIT_RESET_SECS: u64 = 900;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<TweetData>,
    pub includes: Option<Includes>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetLookupResponse {
    pub data: Option<TweetData>,
    pub includes: Option<Includes>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<String>,
    pub public_metrics: Option<TweetMetrics>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetMetrics {
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub retweet_count: u32,
    #[serde(default)]
    pub quote_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<UserData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub verified: bool,
    pub public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetrics {
    #[serde(default)]
    pub followers_count: u64,
}

#[derive(Debug, Serialize)]
struct CreatePostRequest {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTarget>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget {
    in_reply_to_tweet_id: String,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Discovery seam: recent search plus single-post lookup.
pub trait PostSearch {
    async fn search_recent(
        &self,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<CandidatePost>, CoreError>;

    async fn get_post(&self, post_id: &str) -> Result<CandidatePost, CoreError>;
}

/// Posting seam: create a reply to an existing post.
pub trait ReplyPoster {
    async fn post_reply(
        &self,
        text: &str,
        in_reply_to: &str,
    ) -> Result<PostReceipt, CoreError>;
}

#[derive(Debug)]
pub struct PlatformApiClient {
    http_client: Client,
    credentials: PlatformCredentials,
    rate_limiter: RateLimiter,
    retry_policy: RetryPolicy,
    base_url: String,
}

impl PlatformApiClient {
    pub fn new(credentials: PlatformCredentials) -> Result<Self, CoreError> {
        Self::with_base_url(credentials, DEFAULT_API_BASE)
    }

    /// Custom base URL, for pointing at a mock server in tests.
    pub fn with_base_url(
        credentials: PlatformCredentials,
        base_url: &str,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent("chirp/0.1")
            .timeout(Duration::from_secs(20))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let parsed = Url::parse(base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            http_client,
            credentials,
            rate_limiter: RateLimiter::new(RateLimitConfig::platform_search()),
            retry_policy: RetryPolicy::platform(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    async fn execute_get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        self.rate_limiter.acquire().await;
        let url = format!("{}{}", self.base_url, endpoint);

        debug!("Platform API request: GET {}", endpoint);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.credentials.bearer_token)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::PlatformApi(PlatformApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        map_error_status(response, endpoint)
    }

    /// GET with bounded in-process retry for transient failures. Auth,
    /// permission, and rate-limit errors abort on the first occurrence.
    async fn get_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let start = Instant::now();
        let mut attempt = 0;
        loop {
            let result = self.execute_get(endpoint, params).await;
            match result {
                Ok(response) => {
                    return response.json().await.map_err(|e| {
                        CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                            details: format!("failed to parse {endpoint} response: {e}"),
                        })
                    });
                }
                Err(error) => {
                    match decide(&error, attempt, start.elapsed(), &self.retry_policy) {
                        RetryDecision::RetryAfter(delay) => {
                            warn!(
                                "Request to {} failed ({}), retrying in {:?}",
                                endpoint, error, delay
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::Abort => return Err(error),
                    }
                }
            }
        }
    }

    /// Exchanges the refresh token for a short-lived access token.
    async fn refresh_access_token(&self) -> Result<String, CoreError> {
        let (client_id, client_secret, redirect_url, refresh_token) = match (
            &self.credentials.client_id,
            &self.credentials.client_secret,
            &self.credentials.redirect_url,
            &self.credentials.refresh_token,
        ) {
            (Some(id), Some(secret), Some(redirect), Some(refresh)) => {
                (id, secret, redirect, refresh)
            }
            _ => {
                return Err(CoreError::PlatformApi(
                    PlatformApiError::AuthenticationFailed {
                        reason: "posting credentials not configured".to_string(),
                    },
                ))
            }
        };

        let url = format!("{}/2/oauth2/token", self.base_url);
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("redirect_uri", redirect_url.as_str()),
        ];

        debug!("Refreshing platform access token");
        let response = self
            .http_client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::PlatformApi(PlatformApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::PlatformApi(
                PlatformApiError::AuthenticationFailed {
                    reason: format!("token refresh failed with status {status}"),
                },
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|_| {
            CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                details: "token response missing access_token".to_string(),
            })
        })?;

        Ok(token.access_token)
    }
}

impl PostSearch for PlatformApiClient {
    async fn search_recent(
        &self,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<CandidatePost>, CoreError> {
        let query = build_query(filter)?;
        info!("Search query: {}", query);

        let params = [
            ("query", query),
            ("max_results", SEARCH_MAX_RESULTS.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];

        let response: SearchResponse = self
            .get_with_retry("/2/tweets/search/recent", &params)
            .await?;

        let users = index_users(&response.includes);
        let now = Utc::now();

        let mut candidates = Vec::new();
        for tweet in response.data {
            let Some(candidate) = candidate_from_parts(tweet, &users) else {
                continue;
            };
            // Server-side operators should already enforce the engagement
            // thresholds; re-check everything client-side in case of filter
            // drift, and drop silently rather than erroring.
            if !validate_candidate(&candidate, filter, now) {
                debug!("Dropping candidate {} on client-side validation", candidate.id);
                continue;
            }
            candidates.push(candidate);
            if candidates.len() >= limit.max(1) {
                break;
            }
        }

        info!(
            "Found {} candidates (followers>={}, replies>={}, likes>={})",
            candidates.len(),
            MIN_AUTHOR_FOLLOWERS,
            filter.min_replies,
            filter.min_faves
        );
        Ok(candidates)
    }

    async fn get_post(&self, post_id: &str) -> Result<CandidatePost, CoreError> {
        let endpoint = format!("/2/tweets/{post_id}");
        let params = [
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];

        let response: TweetLookupResponse = self.get_with_retry(&endpoint, &params).await?;

        let users = index_users(&response.includes);
        response
            .data
            .and_then(|tweet| candidate_from_parts(tweet, &users))
            .ok_or_else(|| {
                CoreError::PlatformApi(PlatformApiError::PostNotFound {
                    post_id: post_id.to_string(),
                })
            })
    }
}

impl ReplyPoster for PlatformApiClient {
    async fn post_reply(
        &self,
        text: &str,
        in_reply_to: &str,
    ) -> Result<PostReceipt, CoreError> {
        let access_token = self.refresh_access_token().await?;

        let url = format!("{}/2/tweets", self.base_url);
        let payload = CreatePostRequest {
            text: text.to_string(),
            reply: Some(ReplyTarget {
                in_reply_to_tweet_id: in_reply_to.to_string(),
            }),
        };

        info!("Posting reply to {}", in_reply_to);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::PlatformApi(PlatformApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::CREATED {
            let created: CreatePostResponse = response.json().await.map_err(|_| {
                CoreError::PlatformApi(PlatformApiError::InvalidResponse {
                    details: "create-post response missing data".to_string(),
                })
            })?;
            info!("Reply posted: {}", created.data.id);
            return Ok(PostReceipt {
                posted_id: created.data.id,
                text: created.data.text,
            });
        }

        let error = match status.as_u16() {
            401 => PlatformApiError::AuthenticationFailed {
                reason: "401 Unauthorized while posting".to_string(),
            },
            403 => PlatformApiError::Forbidden {
                resource: "/2/tweets".to_string(),
            },
            429 => PlatformApiError::RateLimitExceeded {
                retry_after: reset_delay_from_headers(&response),
            },
            code if status.is_server_error() => PlatformApiError::ServerError { status_code: code },
            _ => {
                let body = response.text().await.unwrap_or_default();
                PlatformApiError::PostRejected {
                    reason: format!("status {status}: {}", body.chars().take(200).collect::<String>()),
                }
            }
        };
        Err(CoreError::PlatformApi(error))
    }
}

fn index_users(includes: &Option<Includes>) -> HashMap<String, UserData> {
    includes
        .as_ref()
        .map(|inc| {
            inc.users
                .iter()
                .map(|u| (u.id.clone(), u.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Joins a raw tweet with its author record into a candidate. Returns `None`
/// when the id, handle, or text is missing; such rows are unusable, not
/// errors.
fn candidate_from_parts(
    tweet: TweetData,
    users: &HashMap<String, UserData>,
) -> Option<CandidatePost> {
    let author = tweet.author_id.as_ref().and_then(|id| users.get(id))?;
    let text = tweet.text.trim().to_string();
    if tweet.id.is_empty() || author.username.is_empty() || text.is_empty() {
        return None;
    }

    let metrics = tweet.public_metrics.unwrap_or_default();
    let created_at = tweet
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let is_reply = tweet.referenced_tweets.iter().any(|r| r.kind == "replied_to");
    let is_retweet = tweet.referenced_tweets.iter().any(|r| r.kind == "retweeted");

    let url = format!("https://x.com/{}/status/{}", author.username, tweet.id);
    Some(CandidatePost {
        id: tweet.id,
        handle: author.username.clone(),
        text,
        url,
        verified: author.verified,
        followers: author
            .public_metrics
            .as_ref()
            .map(|m| m.followers_count)
            .unwrap_or(0),
        reply_count: metrics.reply_count,
        like_count: metrics.like_count,
        created_at,
        is_reply,
        is_retweet,
    })
}

/// Client-side re-validation of the server-side filters, plus the follower
/// floor and recency window the API cannot express.
pub fn validate_candidate(
    candidate: &CandidatePost,
    filter: &SearchFilter,
    now: DateTime<Utc>,
) -> bool {
    if candidate.followers < MIN_AUTHOR_FOLLOWERS {
        return false;
    }
    if candidate.reply_count < filter.min_replies {
        return false;
    }
    if candidate.like_count < filter.min_faves {
        return false;
    }
    if filter.exclude_replies && candidate.is_reply {
        return false;
    }
    if filter.exclude_retweets && candidate.is_retweet {
        return false;
    }
    if let Some(created_at) = candidate.created_at {
        let cutoff = now - ChronoDuration::hours(filter.window_hours.max(1) as i64);
        if created_at < cutoff {
            return false;
        }
    }
    true
}

/// Seconds until the rate limit resets, from `x-rate-limit-reset` (epoch
/// seconds) or `retry-after` (delta seconds).
fn reset_delay_from_headers(response: &Response) -> u64 {
    if let Some(reset) = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        return reset.saturating_sub(now).max(1);
    }

    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT_RESET_SECS)
}

fn map_error_status(response: Response, endpoint: &str) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error = match status.as_u16() {
        401 => PlatformApiError::AuthenticationFailed {
            reason: "401 Unauthorized".to_string(),
        },
        403 => PlatformApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => PlatformApiError::PostNotFound {
            post_id: endpoint.rsplit('/').next().unwrap_or_default().to_string(),
        },
        429 => {
            let retry_after = reset_delay_from_headers(&response);
            warn!("Rate limited, reset in {} seconds", retry_after);
            PlatformApiError::RateLimitExceeded { retry_after }
        }
        code if status.is_server_error() => PlatformApiError::ServerError { status_code: code },
        _ => PlatformApiError::InvalidResponse {
            details: format!("unexpected status {status} for {endpoint}"),
        },
    };
    Err(CoreError::PlatformApi(error))
}
