use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::envelope::Article;

/// A named set of keywords matched against an article's league name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
}

impl FilterGroup {
    pub fn new(id: &str, name: &str, keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Case-insensitive substring match of any keyword against `league`.
    pub fn matches(&self, league: &str) -> bool {
        let league = league.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| league.contains(&k.to_lowercase()))
    }
}

/// The filter groups a user has switched on. An empty selection means "no filtering".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    groups: Vec<FilterGroup>,
}

impl Selection {
    pub fn new(groups: Vec<FilterGroup>) -> Self {
        Self { groups }
    }

    /// Resolve group ids against the configured groups. Unknown ids are dropped.
    pub fn from_ids<S: AsRef<str>>(available: &[FilterGroup], ids: &[S]) -> Self {
        let mut groups: Vec<FilterGroup> = Vec::new();
        for id in ids {
            let id = id.as_ref().trim();
            if id.is_empty() || groups.iter().any(|g| g.id == id) {
                continue;
            }
            match available.iter().find(|g| g.id == id) {
                Some(group) => groups.push(group.clone()),
                None => warn!("Ignoring unknown league filter '{}'", id),
            }
        }
        Self { groups }
    }

    /// Parse a comma-separated list of group ids, e.g. `premier-league,la-liga`.
    pub fn parse(available: &[FilterGroup], raw: &str) -> Self {
        let ids: Vec<&str> = raw.split(',').collect();
        Self::from_ids(available, &ids)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.groups.iter().any(|g| g.id == id)
    }

    pub fn groups(&self) -> &[FilterGroup] {
        &self.groups
    }

    pub fn to_query(&self) -> String {
        self.groups
            .iter()
            .map(|g| g.id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn matches(&self, article: &Article) -> bool {
        if self.groups.is_empty() {
            return true;
        }
        match article.league_name() {
            Some(league) => self.groups.iter().any(|g| g.matches(league)),
            None => false,
        }
    }
}

/// Keep the articles whose league matches the selection.
pub fn filter_by_league(articles: Vec<Article>, selection: &Selection) -> Vec<Article> {
    if selection.is_empty() {
        return articles;
    }
    articles
        .into_iter()
        .filter(|article| selection.matches(article))
        .collect()
}
