use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One upstream news article.
///
/// The payload is kept as raw JSON so fields the upstream adds later survive the
/// round trip; the accessors below are the only fields the aggregation code reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Article(Value);

impl Article {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn id(&self) -> Option<&Value> {
        self.0.get("id").filter(|v| !v.is_null())
    }

    /// The upstream `type` tag, e.g. `prematch` or `postmatch`.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn is_pre_match(&self) -> bool {
        self.kind()
            .map(|kind| kind.to_lowercase().contains("pre"))
            .unwrap_or(false)
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    /// Sort key. Missing timestamps read as the empty string so they order last
    /// under a descending sort.
    pub fn created_at(&self) -> &str {
        self.0
            .get("created_at")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn league_name(&self) -> Option<&str> {
        self.nested_str("league", "name")
    }

    pub fn league_image(&self) -> Option<&str> {
        self.nested_str("league", "image_path")
    }

    pub fn fixture_name(&self) -> Option<&str> {
        self.nested_str("fixture", "name")
    }

    pub fn kick_off(&self) -> Option<&str> {
        self.nested_str("fixture", "starting_at")
    }

    pub fn lines(&self) -> &[Value] {
        self.0
            .get("lines")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = Paragraph<'_>> {
        self.lines().iter().map(Paragraph::from_value)
    }

    fn nested_str(&self, object: &str, field: &str) -> Option<&str> {
        self.0
            .get(object)
            .and_then(|o| o.get(field))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

impl From<Value> for Article {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A single entry of an article's `lines`.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph<'a> {
    pub text: Cow<'a, str>,
    pub player_id: Option<String>,
}

impl<'a> Paragraph<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Paragraph {
                text: Cow::Borrowed(s),
                player_id: None,
            },
            Value::Object(map) => {
                let text = map
                    .get("line")
                    .or_else(|| map.get("text"))
                    .map(value_text)
                    .unwrap_or_else(|| Cow::Owned(value.to_string()));
                let player_id = map.get("player_id").and_then(|p| match p {
                    Value::Null | Value::Bool(false) => None,
                    Value::String(s) if s.is_empty() => None,
                    Value::Number(n) if n.as_i64() == Some(0) => None,
                    other => Some(value_text(other).into_owned()),
                });
                Paragraph { text, player_id }
            }
            other => Paragraph {
                text: Cow::Owned(other.to_string()),
                player_id: None,
            },
        }
    }
}

fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_current_page")]
    pub current_page: u32,
    #[serde(default)]
    pub has_more: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_current_page() -> u32 {
    1
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: default_current_page(),
            has_more: false,
            extra: Map::new(),
        }
    }
}

/// Upstream response envelope: `{data, pagination, rate_limit, subscription}`.
///
/// Absent or mistyped `data`/`pagination` fall back to empty/defaults instead of
/// failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "lenient_articles")]
    pub data: Vec<Article>,
    #[serde(default, deserialize_with = "lenient_pagination")]
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub rate_limit: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub subscription: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn has_more(&self) -> bool {
        self.pagination.has_more
    }

    /// Names of the subscription plans, read from `subscription[0].plans[*].plan`.
    pub fn plan_names(&self) -> Vec<String> {
        self.subscription
            .get(0)
            .and_then(|s| s.get("plans"))
            .and_then(Value::as_array)
            .map(|plans| {
                plans
                    .iter()
                    .map(|p| {
                        p.get("plan")
                            .and_then(Value::as_str)
                            .unwrap_or("N/A")
                            .to_string()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn lenient_articles<'de, D>(deserializer: D) -> Result<Vec<Article>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.into_iter().map(Article::new).collect(),
        _ => Vec::new(),
    })
}

fn lenient_pagination<'de, D>(deserializer: D) -> Result<Pagination, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Object(mut map)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Pagination::default());
    };

    // Fields fall back to their own defaults independently.
    let current_page = map
        .remove("current_page")
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_else(default_current_page);
    let has_more = map
        .remove("has_more")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(Pagination {
        current_page,
        has_more,
        extra: map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod article_tests {
        use super::*;

        #[test]
        fn test_projection_reads_known_fields() {
            let article = Article::new(json!({
                "id": 42,
                "type": "prematch",
                "title": "Arsenal vs Chelsea preview",
                "created_at": "2024-03-01 10:00:00",
                "league": {"name": "Premier League", "image_path": "https://cdn/epl.png"},
                "fixture": {"name": "Arsenal vs Chelsea", "starting_at": "2024-03-03 15:00:00"},
                "lines": [{"line": "First"}, {"line": "Second"}]
            }));

            assert_eq!(article.id(), Some(&json!(42)));
            assert_eq!(article.kind(), Some("prematch"));
            assert!(article.is_pre_match());
            assert_eq!(article.title(), Some("Arsenal vs Chelsea preview"));
            assert_eq!(article.created_at(), "2024-03-01 10:00:00");
            assert_eq!(article.league_name(), Some("Premier League"));
            assert_eq!(article.league_image(), Some("https://cdn/epl.png"));
            assert_eq!(article.fixture_name(), Some("Arsenal vs Chelsea"));
            assert_eq!(article.kick_off(), Some("2024-03-03 15:00:00"));
            assert_eq!(article.lines().len(), 2);
        }

        #[test]
        fn test_missing_fields_default() {
            let article = Article::new(json!({"id": 1}));

            assert_eq!(article.created_at(), "");
            assert_eq!(article.league_name(), None);
            assert!(article.lines().is_empty());
            assert!(!article.is_pre_match());
        }

        #[test]
        fn test_empty_league_name_is_none() {
            let article = Article::new(json!({"league": {"name": ""}}));
            assert_eq!(article.league_name(), None);
        }

        #[test]
        fn test_league_not_an_object() {
            let article = Article::new(json!({"league": "Premier League"}));
            assert_eq!(article.league_name(), None);
        }

        #[test]
        fn test_post_match_type() {
            let article = Article::new(json!({"type": "postmatch"}));
            assert!(!article.is_pre_match());
        }

        #[test]
        fn test_unknown_fields_round_trip() {
            let raw = json!({"id": 7, "sentiment": {"score": 0.4}, "tags": ["a", "b"]});
            let article: Article = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(serde_json::to_value(&article).unwrap(), raw);
        }
    }

    mod paragraph_tests {
        use super::*;

        #[test]
        fn test_line_with_player() {
            let value = json!({"line": "Saka scored.", "player_id": 1234});
            let paragraph = Paragraph::from_value(&value);
            assert_eq!(paragraph.text, "Saka scored.");
            assert_eq!(paragraph.player_id.as_deref(), Some("1234"));
        }

        #[test]
        fn test_text_fallback() {
            let value = json!({"text": "Alternate key"});
            let paragraph = Paragraph::from_value(&value);
            assert_eq!(paragraph.text, "Alternate key");
            assert_eq!(paragraph.player_id, None);
        }

        #[test]
        fn test_plain_string_line() {
            let value = json!("Just text");
            assert_eq!(Paragraph::from_value(&value).text, "Just text");
        }

        #[test]
        fn test_record_without_text_renders_json() {
            let value = json!({"other": 1});
            assert_eq!(Paragraph::from_value(&value).text, r#"{"other":1}"#);
        }

        #[test]
        fn test_null_player_is_none() {
            let value = json!({"line": "x", "player_id": null});
            assert_eq!(Paragraph::from_value(&value).player_id, None);
        }
    }

    mod envelope_tests {
        use super::*;

        #[test]
        fn test_parse_full_envelope() {
            let envelope = Envelope::from_value(json!({
                "data": [{"id": 1}, {"id": 2}],
                "pagination": {"count": 2, "per_page": 25, "current_page": 3, "next_page": null, "has_more": true},
                "rate_limit": {"resets_in_seconds": 3600, "remaining": 2999, "requested_entity": "News"},
                "subscription": [{"plans": [{"plan": "Pro"}, {"plan": "News add-on"}]}],
                "timezone": "UTC"
            }))
            .unwrap();

            assert_eq!(envelope.data.len(), 2);
            assert_eq!(envelope.pagination.current_page, 3);
            assert!(envelope.has_more());
            assert_eq!(envelope.pagination.extra.get("count"), Some(&json!(2)));
            assert_eq!(envelope.plan_names(), vec!["Pro", "News add-on"]);
            assert_eq!(envelope.extra.get("timezone"), Some(&json!("UTC")));
        }

        #[test]
        fn test_missing_keys_default() {
            let envelope = Envelope::from_value(json!({})).unwrap();

            assert!(envelope.data.is_empty());
            assert_eq!(envelope.pagination.current_page, 1);
            assert!(!envelope.has_more());
            assert!(envelope.plan_names().is_empty());
        }

        #[test]
        fn test_null_and_mistyped_keys_default() {
            let envelope = Envelope::from_value(json!({
                "data": {"id": 1},
                "pagination": null
            }))
            .unwrap();

            assert!(envelope.data.is_empty());
            assert!(!envelope.has_more());
        }

        #[test]
        fn test_mistyped_has_more_stops() {
            let envelope =
                Envelope::from_value(json!({"pagination": {"has_more": "yes"}})).unwrap();
            assert!(!envelope.has_more());
        }

        #[test]
        fn test_bad_current_page_keeps_has_more() {
            for current_page in [json!(null), json!("two"), json!({"n": 2}), json!(-1)] {
                let envelope = Envelope::from_value(json!({
                    "data": [{"id": 1}],
                    "pagination": {"current_page": current_page, "has_more": true, "count": 1}
                }))
                .unwrap();

                assert!(envelope.has_more(), "has_more lost for {}", current_page);
                assert_eq!(envelope.pagination.current_page, 1);
                assert_eq!(envelope.pagination.extra.get("count"), Some(&json!(1)));
            }
        }

        #[test]
        fn test_numeric_string_current_page() {
            let envelope = Envelope::from_value(json!({
                "pagination": {"current_page": "2", "has_more": true}
            }))
            .unwrap();

            assert_eq!(envelope.pagination.current_page, 2);
            assert!(envelope.has_more());
        }

        #[test]
        fn test_non_object_is_error() {
            assert!(Envelope::from_value(json!([1, 2, 3])).is_err());
        }
    }
}
