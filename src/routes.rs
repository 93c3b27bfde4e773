use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{de, Deserialize, Deserializer};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::aggregate::merge_feeds;
use crate::config::{Config, QueryDefaults};
use crate::envelope::Envelope;
use crate::filter::{filter_by_league, FilterGroup, Selection};
use crate::stats::Stats;
use crate::upstream::{EndpointKind, FetchError, PageParams, Upstream, MAX_PER_PAGE};
use crate::view::{DashboardView, Outcome};
use crate::walker::{walk_all_pages, WalkResult};

/// Dashboard value for the merged upcoming + post-match view.
const COMBINED_KEY: &str = "combined";

pub struct AppState {
    pub upstream: Upstream,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let upstream = Upstream::new(&config.upstream)?;
        Ok(Self { upstream, config })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/token-status", get(token_status))
        .route("/api/leagues", get(leagues))
        .route("/api/news/all", get(walk_all))
        .route("/api/news/combined", get(combined))
        .route("/api/news/pre-match", get(pre_match))
        .route("/api/news/pre-match/seasons/:season_id", get(pre_match_by_season))
        .route("/api/news/pre-match/upcoming", get(pre_match_upcoming))
        .route("/api/news/post-match", get(post_match))
        .route("/api/news/post-match/seasons/:season_id", get(post_match_by_season))
        .nest_service("/static", ServeDir::new("static"))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub form: FormState,
    pub heading: Option<Heading>,
    pub view: Option<DashboardView>,
}

pub struct Heading {
    pub title: String,
    pub upstream_url: String,
}

pub struct EndpointOption {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub selected: bool,
}

pub struct LeagueOption {
    pub id: String,
    pub name: String,
    pub checked: bool,
}

/// Sidebar form, echoing the current request back.
pub struct FormState {
    pub endpoints: Vec<EndpointOption>,
    pub season_id: String,
    pub include: String,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
    pub all: bool,
    pub leagues: Vec<LeagueOption>,
}

impl FormState {
    fn new(query: &DashboardQuery, config: &Config, selection: &Selection) -> Self {
        let params = query.page_params(&config.defaults);
        let selected = query.endpoint.as_deref().unwrap_or("");

        let mut endpoints: Vec<EndpointOption> = EndpointKind::ALL
            .into_iter()
            .map(|kind| EndpointOption {
                key: kind.key(),
                label: kind.label(),
                description: kind.description(),
                selected: kind.key() == selected,
            })
            .collect();
        endpoints.push(EndpointOption {
            key: COMBINED_KEY,
            label: "Upcoming + Post-Match (combined)",
            description: "Upcoming previews and post-match reports merged, newest first.",
            selected: selected == COMBINED_KEY,
        });

        Self {
            endpoints,
            season_id: query.season_id.map(|s| s.to_string()).unwrap_or_default(),
            include: params.include,
            order: params.order,
            per_page: params.per_page,
            page: params.page,
            all: query.all,
            leagues: config
                .leagues
                .iter()
                .map(|g| LeagueOption {
                    id: g.id.clone(),
                    name: g.name.clone(),
                    checked: selection.contains(&g.id),
                })
                .collect(),
        }
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Query string of the five proxy routes.
#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub per_page: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u32>,
}

impl NewsQuery {
    /// Proxy calls ask for a full page unless `per_page` is given; the configured
    /// `defaults.per_page` only applies to the dashboard.
    pub fn page_params(&self, defaults: &QueryDefaults) -> PageParams {
        resolve_params(
            self.include.as_deref(),
            self.order.as_deref(),
            Some(self.per_page.unwrap_or(MAX_PER_PAGE)),
            self.page,
            defaults,
        )
    }
}

fn resolve_params(
    include: Option<&str>,
    order: Option<&str>,
    per_page: Option<u32>,
    page: Option<u32>,
    defaults: &QueryDefaults,
) -> PageParams {
    PageParams {
        include: include.unwrap_or(&defaults.include).to_string(),
        order: order.unwrap_or(&defaults.order).to_string(),
        per_page: per_page.unwrap_or(defaults.per_page).clamp(1, MAX_PER_PAGE),
        page: page.unwrap_or(1).max(1),
    }
}

/// Query string of the dashboard, walk and combined routes.
///
/// Parsed from raw pairs because the dashboard form repeats `leagues` once per
/// ticked checkbox and sends empty strings for blank number inputs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DashboardQuery {
    pub endpoint: Option<String>,
    pub season_id: Option<u64>,
    pub include: Option<String>,
    pub order: Option<String>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub all: bool,
    pub leagues: Vec<String>,
}

impl DashboardQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let value = value.trim();
            match key.as_str() {
                "endpoint" if !value.is_empty() => query.endpoint = Some(value.to_string()),
                "season_id" => query.season_id = value.parse().ok(),
                "include" => query.include = Some(value.to_string()),
                "order" if !value.is_empty() => query.order = Some(value.to_string()),
                "per_page" => query.per_page = value.parse().ok(),
                "page" => query.page = value.parse().ok(),
                "all" => query.all = matches!(value, "true" | "on" | "1"),
                "leagues" => query.leagues.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string),
                ),
                _ => {}
            }
        }
        query
    }

    pub fn page_params(&self, defaults: &QueryDefaults) -> PageParams {
        resolve_params(
            self.include.as_deref(),
            self.order.as_deref(),
            self.per_page,
            self.page,
            defaults,
        )
    }

    pub fn selection(&self, available: &[FilterGroup]) -> Selection {
        Selection::from_ids(available, &self.leagues)
    }

    fn endpoint_kind(&self) -> Result<EndpointKind, FetchError> {
        let key = self
            .endpoint
            .as_deref()
            .ok_or_else(|| FetchError::InvalidRequest("endpoint is required".to_string()))?;
        key.parse().map_err(FetchError::InvalidRequest)
    }
}

/// Walk every page of one endpoint, starting at `params.page`.
async fn walk_endpoint(
    upstream: &Upstream,
    kind: EndpointKind,
    season_id: Option<u64>,
    params: &PageParams,
) -> WalkResult {
    walk_all_pages(
        |page, per_page| {
            let page_params = params.with_page(page, per_page);
            async move { upstream.fetch_page(kind, season_id, &page_params).await }
        },
        params.per_page,
        params.page,
    )
    .await
}

/// Merged upcoming + post-match page, with the error of the half that failed.
struct CombinedFeed {
    envelope: Envelope,
    error: Option<FetchError>,
}

/// One page each of upcoming previews and post-match reports, merged.
///
/// When only one half fails the other half is still returned, alongside the
/// error. Only when both fail is the first error returned on its own.
async fn fetch_combined(
    upstream: &Upstream,
    params: &PageParams,
) -> Result<CombinedFeed, FetchError> {
    let upcoming = upstream
        .fetch_page(EndpointKind::PreMatchUpcoming, None, params)
        .await;
    let reports = upstream
        .fetch_page(EndpointKind::PostMatch, None, params)
        .await;

    match (upcoming, reports) {
        (Ok(upcoming), Ok(reports)) => Ok(CombinedFeed {
            envelope: merge_feeds(upcoming, reports),
            error: None,
        }),
        (Ok(envelope), Err(error)) | (Err(error), Ok(envelope)) => {
            warn!("Combined feed is partial: {}", error);
            Ok(CombinedFeed {
                envelope: merge_feeds(envelope, Envelope::default()),
                error: Some(error),
            })
        }
        (Err(error), Err(_)) => Err(error),
    }
}

async fn relay(
    state: &AppState,
    kind: EndpointKind,
    season_id: Option<u64>,
    query: &NewsQuery,
) -> Json<Value> {
    let params = query.page_params(&state.config.defaults);
    match state.upstream.fetch_raw(kind, season_id, &params).await {
        Ok(body) => Json(body),
        Err(e) => Json(e.to_envelope()),
    }
}

// Route handlers
pub async fn pre_match(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Json<Value> {
    relay(&state, EndpointKind::PreMatch, None, &query).await
}

pub async fn pre_match_by_season(
    State(state): State<Arc<AppState>>,
    Path(season_id): Path<u64>,
    Query(query): Query<NewsQuery>,
) -> Json<Value> {
    relay(&state, EndpointKind::PreMatchBySeason, Some(season_id), &query).await
}

pub async fn pre_match_upcoming(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Json<Value> {
    relay(&state, EndpointKind::PreMatchUpcoming, None, &query).await
}

pub async fn post_match(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Json<Value> {
    relay(&state, EndpointKind::PostMatch, None, &query).await
}

pub async fn post_match_by_season(
    State(state): State<Arc<AppState>>,
    Path(season_id): Path<u64>,
    Query(query): Query<NewsQuery>,
) -> Json<Value> {
    relay(&state, EndpointKind::PostMatchBySeason, Some(season_id), &query).await
}

pub async fn walk_all(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let query = DashboardQuery::from_pairs(&pairs);
    let kind = match query.endpoint_kind() {
        Ok(kind) => kind,
        Err(e) => return Ok(Json(e.to_envelope())),
    };

    let mut params = query.page_params(&state.config.defaults);
    params.per_page = query.per_page.unwrap_or(MAX_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let walk = walk_endpoint(&state.upstream, kind, query.season_id, &params).await;
    let articles = filter_by_league(walk.articles, &query.selection(&state.config.leagues));
    let stats = Stats::collect(&articles);

    let mut body = json!({
        "total_articles": articles.len(),
        "pages_fetched": walk.pages_fetched,
        "truncated": walk.truncated,
        "stats": serde_json::to_value(&stats)?,
        "data": serde_json::to_value(&articles)?,
    });
    if let Some(err) = walk.error {
        body["error"] = err.to_envelope();
        body["failed_page"] = json!(walk.failed_page);
    }
    Ok(Json(body))
}

pub async fn combined(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let query = DashboardQuery::from_pairs(&pairs);
    let params = query.page_params(&state.config.defaults);

    let CombinedFeed {
        mut envelope,
        error,
    } = match fetch_combined(&state.upstream, &params).await {
        Ok(feed) => feed,
        Err(e) => return Ok(Json(e.to_envelope())),
    };

    let selection = query.selection(&state.config.leagues);
    envelope.data = filter_by_league(envelope.data, &selection);

    let mut body = serde_json::to_value(&envelope)?;
    if let Some(err) = error {
        body["error"] = err.to_envelope();
    }
    Ok(Json(body))
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let query = DashboardQuery::from_pairs(&pairs);
    let selection = query.selection(&state.config.leagues);
    let form = FormState::new(&query, &state.config, &selection);
    let params = query.page_params(&state.config.defaults);
    let base_url = state.upstream.base_url();

    let (heading, outcome) = match query.endpoint.as_deref() {
        None => (None, None),
        Some(COMBINED_KEY) => {
            let heading = Heading {
                title: "Upcoming + Post-Match News".to_string(),
                upstream_url: format!(
                    "{0}/news/pre-match/upcoming + {0}/news/post-match",
                    base_url
                ),
            };
            let outcome = match fetch_combined(&state.upstream, &params).await {
                Ok(CombinedFeed {
                    envelope,
                    error: Some(error),
                }) => Outcome::Partial(envelope, error),
                Ok(CombinedFeed {
                    envelope,
                    error: None,
                }) => Outcome::Page(envelope),
                Err(e) => Outcome::Failed(e),
            };
            (Some(heading), Some(outcome))
        }
        Some(_) => match query.endpoint_kind() {
            Ok(kind) => {
                let path = kind
                    .path(query.season_id)
                    .unwrap_or_else(|_| kind.path_template().to_string());
                let title = if query.all {
                    format!("{} (all pages)", kind.label())
                } else {
                    kind.label().to_string()
                };
                let heading = Heading {
                    title,
                    upstream_url: format!("{}{}", base_url, path),
                };
                let outcome = if query.all {
                    info!("Dashboard walking all pages of {}", kind);
                    let walk_params = params.with_page(1, MAX_PER_PAGE);
                    Outcome::Walk(
                        walk_endpoint(&state.upstream, kind, query.season_id, &walk_params).await,
                    )
                } else {
                    match state
                        .upstream
                        .fetch_page(kind, query.season_id, &params)
                        .await
                    {
                        Ok(envelope) => Outcome::Page(envelope),
                        Err(e) => Outcome::Failed(e),
                    }
                };
                (Some(heading), Some(outcome))
            }
            Err(e) => (None, Some(Outcome::Failed(e))),
        },
    };

    let view = outcome.map(|outcome| DashboardView::build(&outcome, &selection));

    HtmlTemplate(DashboardTemplate {
        form,
        heading,
        view,
    })
}

pub async fn leagues(State(state): State<Arc<AppState>>) -> Json<Vec<FilterGroup>> {
    Json(state.config.leagues.clone())
}

pub async fn token_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.upstream.token_status())
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "message": "SportMonks News API Explorer is live",
    }))
}
