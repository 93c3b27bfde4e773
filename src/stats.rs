use std::collections::HashMap;

use serde::Serialize;

use crate::envelope::Article;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeagueCount {
    pub name: String,
    pub count: usize,
}

/// Read-only summary of an article sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_articles: usize,
    pub total_paragraphs: usize,
    pub league_count: usize,
    /// Sorted by count, descending; equal counts keep discovery order.
    pub leagues: Vec<LeagueCount>,
}

impl Stats {
    pub fn collect(articles: &[Article]) -> Self {
        let mut leagues: Vec<LeagueCount> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut total_paragraphs = 0;

        for article in articles {
            total_paragraphs += article.lines().len();

            if let Some(name) = article.league_name() {
                match index.get(name) {
                    Some(&i) => leagues[i].count += 1,
                    None => {
                        index.insert(name, leagues.len());
                        leagues.push(LeagueCount {
                            name: name.to_string(),
                            count: 1,
                        });
                    }
                }
            }
        }

        leagues.sort_by(|a, b| b.count.cmp(&a.count));

        Self {
            total_articles: articles.len(),
            total_paragraphs,
            league_count: leagues.len(),
            leagues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article(league: Option<&str>, lines: usize) -> Article {
        let lines: Vec<_> = (0..lines).map(|i| json!({"line": format!("p{}", i)})).collect();
        match league {
            Some(name) => Article::new(json!({"league": {"name": name}, "lines": lines})),
            None => Article::new(json!({"lines": lines})),
        }
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(Stats::collect(&[]), Stats::default());
    }

    #[test]
    fn test_totals() {
        let articles = vec![
            article(Some("Premier League"), 3),
            article(Some("La Liga"), 2),
            article(None, 4),
        ];

        let stats = Stats::collect(&articles);

        assert_eq!(stats.total_articles, 3);
        assert_eq!(stats.total_paragraphs, 9);
        assert_eq!(stats.league_count, 2);
    }

    #[test]
    fn test_league_counts_sorted_descending() {
        let articles = vec![
            article(Some("Serie A"), 0),
            article(Some("Premier League"), 0),
            article(Some("Premier League"), 0),
            article(Some("La Liga"), 0),
            article(Some("Premier League"), 0),
            article(Some("La Liga"), 0),
        ];

        let stats = Stats::collect(&articles);
        let counts: Vec<(&str, usize)> = stats
            .leagues
            .iter()
            .map(|l| (l.name.as_str(), l.count))
            .collect();

        assert_eq!(
            counts,
            vec![("Premier League", 3), ("La Liga", 2), ("Serie A", 1)]
        );
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let articles = vec![
            article(Some("Ligue 1"), 0),
            article(Some("Bundesliga"), 0),
            article(Some("Serie A"), 0),
        ];

        let stats = Stats::collect(&articles);
        let names: Vec<&str> = stats.leagues.iter().map(|l| l.name.as_str()).collect();

        assert_eq!(names, vec!["Ligue 1", "Bundesliga", "Serie A"]);
    }

    #[test]
    fn test_articles_without_lines() {
        let articles = vec![Article::new(json!({"id": 1, "lines": null}))];
        let stats = Stats::collect(&articles);
        assert_eq!(stats.total_paragraphs, 0);
        assert_eq!(stats.league_count, 0);
    }
}
