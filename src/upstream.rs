use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::UpstreamConfig;
use crate::envelope::Envelope;

/// The upstream never serves more than this many articles per page.
pub const MAX_PER_PAGE: u32 = 50;

/// Upstream error bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 500;

/// The five upstream news routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    PreMatch,
    PreMatchBySeason,
    PreMatchUpcoming,
    PostMatch,
    PostMatchBySeason,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 5] = [
        EndpointKind::PreMatch,
        EndpointKind::PreMatchBySeason,
        EndpointKind::PreMatchUpcoming,
        EndpointKind::PostMatch,
        EndpointKind::PostMatchBySeason,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            EndpointKind::PreMatch => "pre_match",
            EndpointKind::PreMatchBySeason => "pre_match_season",
            EndpointKind::PreMatchUpcoming => "pre_match_upcoming",
            EndpointKind::PostMatch => "post_match",
            EndpointKind::PostMatchBySeason => "post_match_season",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EndpointKind::PreMatch => "Pre-Match News",
            EndpointKind::PreMatchBySeason => "Pre-Match News by Season",
            EndpointKind::PreMatchUpcoming => "Pre-Match News (Upcoming)",
            EndpointKind::PostMatch => "Post-Match News",
            EndpointKind::PostMatchBySeason => "Post-Match News by Season",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EndpointKind::PreMatch => {
                "All available pre-match news articles, published 48+ hours before kick-off."
            }
            EndpointKind::PreMatchBySeason => "Pre-match news filtered by a specific season ID.",
            EndpointKind::PreMatchUpcoming => "Pre-match news for upcoming fixtures only.",
            EndpointKind::PostMatch => {
                "Post-match reports, available immediately after the final whistle."
            }
            EndpointKind::PostMatchBySeason => "Post-match news filtered by a specific season ID.",
        }
    }

    pub fn needs_season(&self) -> bool {
        matches!(
            self,
            EndpointKind::PreMatchBySeason | EndpointKind::PostMatchBySeason
        )
    }

    /// Display form of the path, with a `{SEASON_ID}` placeholder.
    pub fn path_template(&self) -> &'static str {
        match self {
            EndpointKind::PreMatch => "/news/pre-match",
            EndpointKind::PreMatchBySeason => "/news/pre-match/seasons/{SEASON_ID}",
            EndpointKind::PreMatchUpcoming => "/news/pre-match/upcoming",
            EndpointKind::PostMatch => "/news/post-match",
            EndpointKind::PostMatchBySeason => "/news/post-match/seasons/{SEASON_ID}",
        }
    }

    /// Path below the upstream base URL, e.g. `/news/pre-match/seasons/23614`.
    pub fn path(&self, season_id: Option<u64>) -> Result<String, FetchError> {
        let season = || {
            season_id.ok_or_else(|| {
                FetchError::InvalidRequest("season_id is required for this endpoint".to_string())
            })
        };
        Ok(match self {
            EndpointKind::PreMatch => "/news/pre-match".to_string(),
            EndpointKind::PreMatchBySeason => format!("/news/pre-match/seasons/{}", season()?),
            EndpointKind::PreMatchUpcoming => "/news/pre-match/upcoming".to_string(),
            EndpointKind::PostMatch => "/news/post-match".to_string(),
            EndpointKind::PostMatchBySeason => format!("/news/post-match/seasons/{}", season()?),
        })
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EndpointKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EndpointKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| format!("Unknown endpoint: {}", s))
    }
}

/// Query parameters forwarded to the upstream, after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    pub include: String,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
}

impl PageParams {
    pub fn with_page(&self, page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
            ..self.clone()
        }
    }
}

/// Why an upstream call produced no envelope.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("Request Error: {0}")]
    Transport(String),

    #[error("HTTP {status_code}: {body}")]
    Status { status_code: u16, body: String },

    #[error("Unexpected Error: {0}")]
    Decode(String),

    #[error("{0}")]
    InvalidRequest(String),
}

impl FetchError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// The wire shape: `{"error": true, "status_code"?: n, "message": "..."}`.
    pub fn to_envelope(&self) -> Value {
        match self.status_code() {
            Some(status_code) => json!({
                "error": true,
                "status_code": status_code,
                "message": self.to_string(),
            }),
            None => json!({
                "error": true,
                "message": self.to_string(),
            }),
        }
    }
}

impl Serialize for FetchError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_envelope().serialize(serializer)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Client for the upstream news API.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: Client,
    base_url: String,
    api_token: String,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("SportMonksNews/1.0 (News Proxy)")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query string pairs; empty values and a zero page are left out.
    pub fn query_pairs(&self, params: &PageParams) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("api_token", self.api_token.clone())];
        if !params.include.is_empty() {
            pairs.push(("include", params.include.clone()));
        }
        if !params.order.is_empty() {
            pairs.push(("order", params.order.clone()));
        }
        if params.per_page > 0 {
            pairs.push(("per_page", params.per_page.to_string()));
        }
        if params.page > 0 {
            pairs.push(("page", params.page.to_string()));
        }
        pairs
    }

    /// One GET against the upstream, returning its JSON body untouched.
    pub async fn fetch_raw(
        &self,
        kind: EndpointKind,
        season_id: Option<u64>,
        params: &PageParams,
    ) -> Result<Value, FetchError> {
        let path = kind.path(season_id)?;
        let url = format!("{}{}", self.base_url, path);
        info!("Fetching {} page {}", path, params.page);

        let response = self
            .client
            .get(&url)
            .query(&self.query_pairs(params))
            .send()
            .await
            .map_err(|e| {
                warn!("Request to {} failed: {}", path, e);
                FetchError::Transport(e.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Upstream returned {} for {}", status, path);
            return Err(FetchError::Status {
                status_code: status.as_u16(),
                body: truncate_chars(&body, ERROR_BODY_LIMIT),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Like [`Upstream::fetch_raw`], projected onto an [`Envelope`].
    pub async fn fetch_page(
        &self,
        kind: EndpointKind,
        season_id: Option<u64>,
        params: &PageParams,
    ) -> Result<Envelope, FetchError> {
        let value = self.fetch_raw(kind, season_id, params).await?;
        Envelope::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
