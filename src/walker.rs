use std::future::Future;

use serde::Serialize;
use tracing::{info, warn};

use crate::envelope::{Article, Envelope};
use crate::upstream::FetchError;

/// Hard ceiling on the number of pages one walk will request.
pub const MAX_PAGES: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WalkResult {
    #[serde(rename = "data")]
    pub articles: Vec<Article>,
    pub pages_fetched: u32,
    /// Set when the walk stopped at [`MAX_PAGES`] while the upstream still reported more.
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchError>,
    /// Page number whose request failed, when `error` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_page: Option<u32>,
}

impl WalkResult {
    pub fn is_complete(&self) -> bool {
        !self.truncated && self.error.is_none()
    }
}

/// Fetch `start_page`, `start_page + 1`, ... until the upstream reports no more pages,
/// a page fails, or [`MAX_PAGES`] pages have been fetched.
///
/// Pages are requested strictly one after another. A failed page ends the walk but the
/// articles collected so far are kept in the result.
pub async fn walk_all_pages<F, Fut>(mut fetch: F, per_page: u32, start_page: u32) -> WalkResult
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Envelope, FetchError>>,
{
    let mut result = WalkResult::default();
    let mut page = start_page.max(1);

    loop {
        if result.pages_fetched >= MAX_PAGES {
            warn!("Stopped at {} pages (safety limit)", MAX_PAGES);
            result.truncated = true;
            break;
        }

        match fetch(page, per_page).await {
            Ok(envelope) => {
                result.pages_fetched += 1;
                let has_more = envelope.has_more();
                result.articles.extend(envelope.data);
                if !has_more {
                    break;
                }
                page += 1;
            }
            Err(e) => {
                warn!("Error on page {}: {}", page, e);
                result.error = Some(e);
                result.failed_page = Some(page);
                break;
            }
        }
    }

    info!(
        "Walk finished: {} articles over {} pages",
        result.articles.len(),
        result.pages_fetched
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Pagination;
    use serde_json::json;

    fn page_of(first_id: i64, count: i64, has_more: bool) -> Envelope {
        Envelope {
            data: (first_id..first_id + count)
                .map(|id| Article::new(json!({"id": id})))
                .collect(),
            pagination: Pagination {
                has_more,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn ids(articles: &[Article]) -> Vec<i64> {
        articles
            .iter()
            .map(|a| a.id().and_then(|v| v.as_i64()).unwrap())
            .collect()
    }

    /// Walk a fixed script of responses; page `n` answers with `script[n - 1]`.
    async fn walk_script(
        script: Vec<Result<Envelope, FetchError>>,
        start_page: u32,
    ) -> (WalkResult, Vec<u32>) {
        let mut requested = Vec::new();
        let result = walk_all_pages(
            |page, _per_page| {
                requested.push(page);
                let response = script
                    .get(page as usize - 1)
                    .cloned()
                    .unwrap_or_else(|| Ok(Envelope::default()));
                async move { response }
            },
            50,
            start_page,
        )
        .await;
        (result, requested)
    }

    #[tokio::test]
    async fn test_single_page() {
        let (result, requested) = walk_script(vec![Ok(page_of(1, 3, false))], 1).await;

        assert_eq!(ids(&result.articles), vec![1, 2, 3]);
        assert_eq!(result.pages_fetched, 1);
        assert!(result.is_complete());
        assert_eq!(requested, vec![1]);
    }

    #[tokio::test]
    async fn test_concatenates_pages_in_order() {
        let script = vec![
            Ok(page_of(1, 50, true)),
            Ok(page_of(51, 50, true)),
            Ok(page_of(101, 10, false)),
        ];

        let (result, requested) = walk_script(script, 1).await;

        assert_eq!(result.articles.len(), 110);
        assert_eq!(ids(&result.articles), (1..=110).collect::<Vec<_>>());
        assert_eq!(result.pages_fetched, 3);
        assert!(!result.truncated);
        assert!(result.error.is_none());
        assert_eq!(requested, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let (result, _) = walk_script(vec![Ok(Envelope::default())], 1).await;

        assert!(result.articles.is_empty());
        assert_eq!(result.pages_fetched, 1);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_error_keeps_partial_results() {
        let script = vec![
            Ok(page_of(1, 5, true)),
            Ok(page_of(6, 5, true)),
            Err(FetchError::Status {
                status_code: 500,
                body: "boom".to_string(),
            }),
            Ok(page_of(100, 5, false)),
        ];

        let (result, requested) = walk_script(script, 1).await;

        assert_eq!(ids(&result.articles), (1..=10).collect::<Vec<_>>());
        assert_eq!(result.pages_fetched, 2);
        assert!(!result.truncated);
        assert_eq!(
            result.error,
            Some(FetchError::Status {
                status_code: 500,
                body: "boom".to_string()
            })
        );
        assert_eq!(requested, vec![1, 2, 3]);
        assert_eq!(result.failed_page, Some(3));
    }

    #[tokio::test]
    async fn test_failed_page_counts_from_start_page() {
        let result = walk_all_pages(
            |page, _| {
                let response = if page < 12 {
                    Ok(page_of(page as i64, 1, true))
                } else {
                    Err(FetchError::Transport("reset".to_string()))
                };
                async move { response }
            },
            10,
            10,
        )
        .await;

        assert_eq!(result.pages_fetched, 2);
        assert_eq!(result.failed_page, Some(12));
    }

    #[tokio::test]
    async fn test_null_current_page_does_not_end_walk() {
        let pages = [
            json!({"data": [{"id": 1}], "pagination": {"current_page": null, "has_more": true}}),
            json!({"data": [{"id": 2}], "pagination": {"current_page": "2", "has_more": true}}),
            json!({"data": [{"id": 3}], "pagination": {"current_page": 3, "has_more": false}}),
        ];
        let script = pages
            .into_iter()
            .map(|v| Ok(Envelope::from_value(v).unwrap()))
            .collect();

        let (result, requested) = walk_script(script, 1).await;

        assert_eq!(ids(&result.articles), vec![1, 2, 3]);
        assert_eq!(requested, vec![1, 2, 3]);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_error_on_first_page() {
        let script = vec![Err(FetchError::Transport("connection refused".to_string()))];

        let (result, _) = walk_script(script, 1).await;

        assert!(result.articles.is_empty());
        assert_eq!(result.pages_fetched, 0);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_never_ending_upstream_is_truncated() {
        let mut calls = 0;
        let result = walk_all_pages(
            |page, _| {
                calls += 1;
                let envelope = page_of(page as i64, 1, true);
                async move { Ok(envelope) }
            },
            1,
            1,
        )
        .await;

        assert_eq!(calls, MAX_PAGES);
        assert_eq!(result.pages_fetched, MAX_PAGES);
        assert_eq!(result.articles.len(), MAX_PAGES as usize);
        assert!(result.truncated);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_last_allowed_page_without_more_is_not_truncated() {
        let mut script: Vec<_> = (0..49).map(|i| Ok(page_of(i, 1, true))).collect();
        script.push(Ok(page_of(49, 1, false)));

        let (result, _) = walk_script(script, 1).await;

        assert_eq!(result.pages_fetched, 50);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_start_page_and_per_page_forwarded() {
        let mut seen = Vec::new();
        let result = walk_all_pages(
            |page, per_page| {
                seen.push((page, per_page));
                let envelope = page_of(page as i64, 1, page < 4);
                async move { Ok(envelope) }
            },
            20,
            3,
        )
        .await;

        assert_eq!(seen, vec![(3, 20), (4, 20)]);
        assert_eq!(result.pages_fetched, 2);
    }

    #[tokio::test]
    async fn test_start_page_zero_is_clamped() {
        let (result, requested) = walk_script(vec![Ok(page_of(1, 1, false))], 0).await;
        assert_eq!(requested, vec![1]);
        assert_eq!(result.pages_fetched, 1);
    }

    #[test]
    fn test_serializes_with_data_key() {
        let result = WalkResult {
            articles: vec![Article::new(json!({"id": 1}))],
            pages_fetched: 1,
            truncated: false,
            error: None,
            failed_page: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"data": [{"id": 1}], "pages_fetched": 1, "truncated": false})
        );
    }
}
