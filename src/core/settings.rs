use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    /// Feed type -> endpoint path, relative to `api.base_url`.
    pub fetchers: BTreeMap<String, String>,
    pub feeds: Vec<FeedSettings>,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            fetchers: default_fetchers(),
            feeds: default_feeds(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Name of the environment variable holding the bearer token, if any.
    pub token_env: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            token_env: Some("POLLMUX_API_TOKEN".to_string()),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub key: String,
    pub feed_type: String,
    pub interval_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            key: String::new(),
            feed_type: String::new(),
            interval_ms: 10_000,
        }
    }
}

fn default_fetchers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("jobs".to_string(), "/jobs".to_string()),
        ("dashboard-stats".to_string(), "/stats/dashboard".to_string()),
        ("detailed-costs".to_string(), "/costs/detailed".to_string()),
        ("recent-posts".to_string(), "/posts/recent".to_string()),
    ])
}

fn default_feeds() -> Vec<FeedSettings> {
    vec![
        FeedSettings {
            key: "jobs".to_string(),
            feed_type: "jobs".to_string(),
            interval_ms: 10_000,
        },
        FeedSettings {
            key: "dashboard-stats-global".to_string(),
            feed_type: "dashboard-stats".to_string(),
            interval_ms: 30_000,
        },
    ]
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pollmux").join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }

        if self.api.request_timeout_secs == 0 {
            anyhow::bail!("api.request_timeout_secs must be greater than zero");
        }

        for feed in &self.feeds {
            if feed.key.is_empty() {
                anyhow::bail!("feed key must not be empty");
            }
            if feed.interval_ms == 0 {
                anyhow::bail!("feed `{}`: interval_ms must be greater than zero", feed.key);
            }
            if !self.fetchers.contains_key(&feed.feed_type) {
                anyhow::bail!(
                    "feed `{}`: no endpoint configured for feed type `{}`",
                    feed.key,
                    feed.feed_type
                );
            }
        }

        Ok(())
    }
}
