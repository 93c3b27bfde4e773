use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::filter::FilterGroup;

const TOKEN_PLACEHOLDER: &str = "YOUR_TOKEN_HERE";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub defaults: QueryDefaults,
    /// League filter groups offered by the dashboard
    #[serde(default = "default_leagues")]
    pub leagues: Vec<FilterGroup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            defaults: QueryDefaults::default(),
            leagues: default_leagues(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_token: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_token: String::new(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.sportmonks.com/v3/football".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TokenStatus {
    pub configured: bool,
    pub token_preview: String,
}

impl UpstreamConfig {
    pub fn token_configured(&self) -> bool {
        !self.api_token.is_empty() && self.api_token != TOKEN_PLACEHOLDER
    }

    pub fn token_status(&self) -> TokenStatus {
        if self.token_configured() {
            let preview: String = self.api_token.chars().take(8).collect();
            TokenStatus {
                configured: true,
                token_preview: format!("{}...", preview),
            }
        } else {
            TokenStatus {
                configured: false,
                token_preview: "NOT SET".to_string(),
            }
        }
    }
}

/// Query values used when a request leaves them out.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryDefaults {
    #[serde(default = "default_include")]
    pub include: String,
    #[serde(default = "default_order")]
    pub order: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            include: default_include(),
            order: default_order(),
            per_page: default_per_page(),
        }
    }
}

fn default_include() -> String {
    "fixture.participants;league;lines".to_string()
}

fn default_order() -> String {
    "desc".to_string()
}

fn default_per_page() -> u32 {
    25
}

fn default_leagues() -> Vec<FilterGroup> {
    vec![
        FilterGroup::new("champions-league", "Champions League", &["champions league"]),
        FilterGroup::new("premier-league", "Premier League", &["premier league"]),
        FilterGroup::new("la-liga", "La Liga", &["la liga", "laliga"]),
        FilterGroup::new("bundesliga", "Bundesliga", &["bundesliga"]),
        FilterGroup::new("serie-a", "Serie A", &["serie a"]),
        FilterGroup::new("ligue-1", "Ligue 1", &["ligue 1"]),
    ]
}

fn strip_quotes(value: &str) -> String {
    value
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        info!("Loading configuration from {}", path.display());
        Self::load(path)
    }

    /// Apply `SPORTMONKS_API_TOKEN`, `SPORTMONKS_BASE_URL`, `HOST` and `PORT`
    /// from the process environment. `FASTAPI_HOST`/`FASTAPI_PORT` are read when
    /// the shorter names are absent.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("SPORTMONKS_API_TOKEN") {
            self.upstream.api_token = token;
        }
        self.upstream.api_token = strip_quotes(&self.upstream.api_token);

        if let Some(base_url) = lookup("SPORTMONKS_BASE_URL") {
            self.upstream.base_url = base_url;
        }
        let first = |keys: [&'static str; 2]| {
            keys.into_iter()
                .find_map(|key| lookup(key).map(|value| (key, value)))
        };
        if let Some((_, host)) = first(["HOST", "FASTAPI_HOST"]) {
            self.server.host = host;
        }
        if let Some((key, port)) = first(["PORT", "FASTAPI_PORT"]) {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid {} value: {}", key, port))?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
