//! Dashboard projection.
//!
//! Everything the dashboard shows is derived here from what was fetched plus the
//! current league selection, so changing filters never needs hidden state.

use chrono::NaiveDateTime;
use serde_json::{json, Value};

use crate::envelope::{Article, Envelope};
use crate::filter::{filter_by_league, Selection};
use crate::stats::{LeagueCount, Stats};
use crate::upstream::FetchError;
use crate::walker::{WalkResult, MAX_PAGES};

/// What a dashboard request produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    Page(Envelope),
    /// A page assembled from several requests where at least one failed.
    Partial(Envelope, FetchError),
    Walk(WalkResult),
    Failed(FetchError),
}

/// Why the article list is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// Articles came back but the league filter excluded all of them.
    Filtered,
    /// The upstream returned no articles.
    NoArticles,
}

impl EmptyState {
    pub fn message(&self) -> &'static str {
        match self {
            EmptyState::Filtered => {
                "No articles match the selected leagues. Clear the league filter to see everything that was fetched."
            }
            EmptyState::NoArticles => {
                "No articles returned for this endpoint. There may be no current articles, or try a different season ID."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatCard {
    pub value: String,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorView {
    pub message: String,
    pub hint: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitView {
    pub remaining: String,
    pub resets_in_seconds: String,
    pub requested_entity: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphView {
    pub text: String,
    pub player_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCard {
    pub index: usize,
    pub title: String,
    pub pre_match: bool,
    pub fixture: Option<String>,
    pub league: Option<String>,
    pub league_image: Option<String>,
    pub kick_off: Option<String>,
    pub id: Option<String>,
    pub created: Option<String>,
    pub paragraphs: Vec<ParagraphView>,
}

impl ArticleCard {
    pub fn from_article(index: usize, article: &Article) -> Self {
        Self {
            index,
            title: article.title().unwrap_or("Untitled Article").to_string(),
            pre_match: article.is_pre_match(),
            fixture: article.fixture_name().map(str::to_string),
            league: article.league_name().map(str::to_string),
            league_image: article.league_image().map(str::to_string),
            kick_off: article.kick_off().map(format_datetime),
            id: article.id().map(display_value),
            created: Some(article.created_at())
                .filter(|c| !c.is_empty())
                .map(format_datetime),
            paragraphs: article
                .paragraphs()
                .map(|p| ParagraphView {
                    text: p.text.into_owned(),
                    player_id: p.player_id,
                })
                .collect(),
        }
    }

    pub fn badge_class(&self) -> &'static str {
        if self.pre_match {
            "badge-pre"
        } else {
            "badge-post"
        }
    }

    pub fn badge_label(&self) -> &'static str {
        if self.pre_match {
            "PRE-MATCH"
        } else {
            "POST-MATCH"
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub stats: Vec<StatCard>,
    pub plans: Vec<String>,
    pub rate_limit: Option<RateLimitView>,
    pub leagues: Vec<LeagueCount>,
    pub articles: Vec<ArticleCard>,
    /// "Showing x of y" when a league filter is active.
    pub filter_summary: Option<String>,
    pub error: Option<ErrorView>,
    pub warning: Option<String>,
    pub empty: Option<EmptyState>,
    pub raw_json: String,
}

impl DashboardView {
    pub fn build(outcome: &Outcome, selection: &Selection) -> Self {
        match outcome {
            Outcome::Page(envelope) => Self::from_page(envelope, selection),
            Outcome::Partial(envelope, err) => {
                let mut view = Self::from_page(envelope, selection);
                view.error = Some(ErrorView {
                    message: format!("API Error: {}", err),
                    hint: plan_hint(err),
                });
                if envelope.data.is_empty() {
                    view.empty = None;
                }
                view
            }
            Outcome::Walk(walk) => Self::from_walk(walk, selection),
            Outcome::Failed(err) => Self::from_failure(err),
        }
    }

    fn from_page(envelope: &Envelope, selection: &Selection) -> Self {
        let visible = filter_by_league(envelope.data.clone(), selection);
        let stats = Stats::collect(&visible);

        let cards = vec![
            StatCard {
                value: stats.total_articles.to_string(),
                label: "Articles Fetched",
            },
            StatCard {
                value: stats.total_paragraphs.to_string(),
                label: "Total Paragraphs",
            },
            StatCard {
                value: envelope.pagination.current_page.to_string(),
                label: "Current Page",
            },
            StatCard {
                value: if envelope.has_more() { "Yes" } else { "No" }.to_string(),
                label: "More Pages",
            },
        ];

        Self {
            stats: cards,
            plans: envelope.plan_names(),
            rate_limit: rate_limit_view(&envelope.rate_limit),
            leagues: Vec::new(),
            articles: article_cards(&visible),
            filter_summary: filter_summary(selection, visible.len(), envelope.data.len()),
            error: None,
            warning: None,
            empty: empty_state(visible.len(), envelope.data.len()),
            raw_json: pretty(&serde_json::to_value(envelope).unwrap_or(Value::Null)),
        }
    }

    fn from_walk(walk: &WalkResult, selection: &Selection) -> Self {
        let visible = filter_by_league(walk.articles.clone(), selection);
        let stats = Stats::collect(&visible);

        let cards = vec![
            StatCard {
                value: stats.total_articles.to_string(),
                label: "Total Articles",
            },
            StatCard {
                value: stats.total_paragraphs.to_string(),
                label: "Total Paragraphs",
            },
            StatCard {
                value: walk.pages_fetched.to_string(),
                label: "Pages Fetched",
            },
            StatCard {
                value: stats.league_count.to_string(),
                label: "Leagues Covered",
            },
        ];

        let error = walk.error.as_ref().map(|err| ErrorView {
            message: format!(
                "Error on page {}: {}",
                walk.failed_page.unwrap_or(walk.pages_fetched + 1),
                err
            ),
            hint: plan_hint(err),
        });
        let warning = walk
            .truncated
            .then(|| format!("Stopped at {} pages (safety limit).", MAX_PAGES));

        // A walk that failed before returning anything is a plain failure.
        let empty = if error.is_some() && walk.articles.is_empty() {
            None
        } else {
            empty_state(visible.len(), walk.articles.len())
        };

        let raw = json!({
            "total_articles": walk.articles.len(),
            "pages_fetched": walk.pages_fetched,
            "truncated": walk.truncated,
            "data": walk.articles,
        });

        Self {
            stats: cards,
            plans: Vec::new(),
            rate_limit: None,
            leagues: stats.leagues,
            articles: article_cards(&visible),
            filter_summary: filter_summary(selection, visible.len(), walk.articles.len()),
            error,
            warning,
            empty,
            raw_json: pretty(&raw),
        }
    }

    fn from_failure(err: &FetchError) -> Self {
        Self {
            stats: Vec::new(),
            plans: Vec::new(),
            rate_limit: None,
            leagues: Vec::new(),
            articles: Vec::new(),
            filter_summary: None,
            error: Some(ErrorView {
                message: format!("API Error: {}", err),
                hint: plan_hint(err),
            }),
            warning: None,
            empty: None,
            raw_json: pretty(&err.to_envelope()),
        }
    }
}

fn article_cards(articles: &[Article]) -> Vec<ArticleCard> {
    articles
        .iter()
        .enumerate()
        .map(|(i, article)| ArticleCard::from_article(i + 1, article))
        .collect()
}

fn empty_state(visible: usize, fetched: usize) -> Option<EmptyState> {
    match (visible, fetched) {
        (0, 0) => Some(EmptyState::NoArticles),
        (0, _) => Some(EmptyState::Filtered),
        _ => None,
    }
}

fn filter_summary(selection: &Selection, visible: usize, fetched: usize) -> Option<String> {
    if selection.is_empty() {
        return None;
    }
    let names: Vec<&str> = selection.groups().iter().map(|g| g.name.as_str()).collect();
    Some(format!(
        "Showing {} of {} articles ({})",
        visible,
        fetched,
        names.join(", ")
    ))
}

fn plan_hint(err: &FetchError) -> Option<&'static str> {
    (err.status_code() == Some(403))
        .then_some("This endpoint requires a subscription plan that includes the news add-on.")
}

fn rate_limit_view(rate_limit: &Value) -> Option<RateLimitView> {
    let map = rate_limit.as_object().filter(|m| !m.is_empty())?;
    let field = |key: &str| map.get(key).map(display_value).unwrap_or_else(|| "N/A".to_string());
    Some(RateLimitView {
        remaining: field("remaining"),
        resets_in_seconds: field("resets_in_seconds"),
        requested_entity: field("requested_entity"),
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Render an upstream timestamp such as `2024-03-01 18:30:00` as `Mar 01, 2024 at 06:30 PM`.
pub fn format_datetime(raw: &str) -> String {
    if raw.is_empty() {
        return "N/A".to_string();
    }
    let head: String = raw.chars().take(19).collect();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&head, fmt).ok())
        .map(|dt| dt.format("%b %d, %Y at %I:%M %p").to_string())
        .unwrap_or_else(|| raw.chars().take(16).collect())
}
