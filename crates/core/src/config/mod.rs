//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (POSTCACHE_*)
//! 2. TOML config file (if POSTCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Which partition a cached entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionRole {
    Static,
    Dynamic,
}

impl PartitionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionRole::Static => "static",
            PartitionRole::Dynamic => "dynamic",
        }
    }

    /// Inverse of [`PartitionRole::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "static" => Some(PartitionRole::Static),
            "dynamic" => Some(PartitionRole::Dynamic),
            _ => None,
        }
    }
}

/// Location of the repository-backed content host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Hostname serving the contents listing API.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Hostname serving raw file contents.
    #[serde(default = "default_raw_host")]
    pub raw_host: String,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_repo")]
    pub repo: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Directory inside the repository that holds the markdown posts.
    #[serde(default = "default_posts_path")]
    pub posts_path: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            raw_host: default_raw_host(),
            owner: default_owner(),
            repo: default_repo(),
            branch: default_branch(),
            posts_path: default_posts_path(),
        }
    }
}

impl UpstreamConfig {
    /// URL of the contents listing for the posts directory.
    pub fn posts_list_url(&self) -> String {
        format!(
            "https://{}/repos/{}/{}/contents/{}?ref={}",
            self.api_host,
            self.owner,
            self.repo,
            self.posts_path.trim_end_matches('/'),
            self.branch
        )
    }

    /// Raw content URL for a single post file.
    pub fn post_content_url(&self, filename: &str) -> String {
        format!(
            "https://{}/{}/{}/{}/{}/{}",
            self.raw_host,
            self.owner,
            self.repo,
            self.branch,
            self.posts_path.trim_end_matches('/'),
            filename
        )
    }
}

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (POSTCACHE_*)
/// 2. TOML config file (if POSTCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix for partition names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version suffix for partition names. Bumping it retires every
    /// partition of the previous version at the next activation.
    ///
    /// Set via POSTCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path to SQLite cache database.
    ///
    /// Set via POSTCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network timeout in milliseconds. A fetch that runs longer is
    /// treated as a network failure.
    ///
    /// Set via POSTCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Origin of the site the worker serves.
    #[serde(default = "default_site_origin")]
    pub site_origin: String,

    /// Pre-declared same-origin paths, fetched on install.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Path suffixes that mark a same-origin request as a static asset.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Content-delivery hostnames whose responses are cached first.
    #[serde(default = "default_third_party_hosts")]
    pub third_party_hosts: Vec<String>,

    /// Pre-declared third-party URLs, pre-warmed best-effort on install.
    #[serde(default = "default_third_party_assets")]
    pub third_party_assets: Vec<String>,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Upstream statuses that mean "blocked or rate-limited".
    #[serde(default = "default_rate_limit_statuses")]
    pub rate_limit_statuses: Vec<u16>,

    /// Maximum number of entries in the static partition.
    #[serde(default = "default_max_entries_static")]
    pub max_entries_static: usize,

    /// Maximum number of entries in the dynamic partition.
    #[serde(default = "default_max_entries_dynamic")]
    pub max_entries_dynamic: usize,

    /// Entry time-to-live in seconds, measured from the injected cached-at tag.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Same-origin path of the offline page served to failed navigations.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Interval of the opportunistic expiration sweep. Zero disables the timer.
    #[serde(default)]
    pub sweep_interval_secs: u64,

    /// Copy entries from superseded dynamic partitions into the current one
    /// before they are deleted at activation.
    #[serde(default)]
    pub migrate_dynamic_on_activate: bool,
}

fn default_cache_prefix() -> String {
    "bambans".into()
}

fn default_cache_version() -> String {
    "1.2.0".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./postcache.sqlite")
}

fn default_user_agent() -> String {
    "postcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_site_origin() -> String {
    "https://bambans.github.io".into()
}

fn default_static_assets() -> Vec<String> {
    [
        "/",
        "/blog/",
        "/blog/index.html",
        "/blog/css/style.css",
        "/css/style.css",
        "/js/main.js",
        "/js/blog-utils.js",
        "/js/tailwind_config.js",
        "/blog/offline.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_static_extensions() -> Vec<String> {
    [".html", ".css", ".js"].into_iter().map(String::from).collect()
}

fn default_third_party_hosts() -> Vec<String> {
    ["cdn.tailwindcss.com", "cdn.jsdelivr.net"].into_iter().map(String::from).collect()
}

fn default_third_party_assets() -> Vec<String> {
    [
        "https://cdn.tailwindcss.com/tailwind.min.js",
        "https://cdn.jsdelivr.net/npm/github-markdown-css@5.2.0/github-markdown.min.css",
        "https://cdn.jsdelivr.net/npm/prismjs@1.29.0/themes/prism-tomorrow.min.css",
        "https://cdn.jsdelivr.net/npm/katex@0.16.8/dist/katex.min.css",
        "https://cdn.jsdelivr.net/npm/marked/marked.min.js",
        "https://cdn.jsdelivr.net/npm/dompurify@3.0.6/dist/purify.min.js",
        "https://cdn.jsdelivr.net/npm/prismjs@1.29.0/components/prism-core.min.js",
        "https://cdn.jsdelivr.net/npm/prismjs@1.29.0/plugins/autoloader/prism-autoloader.min.js",
        "https://cdn.jsdelivr.net/npm/mermaid@10.6.1/dist/mermaid.min.js",
        "https://cdn.jsdelivr.net/npm/katex@0.16.8/dist/katex.min.js",
        "https://cdn.jsdelivr.net/npm/katex@0.16.8/dist/contrib/auto-render.min.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_api_host() -> String {
    "api.github.com".into()
}

fn default_raw_host() -> String {
    "raw.githubusercontent.com".into()
}

fn default_owner() -> String {
    "bambans".into()
}

fn default_repo() -> String {
    "bambans.github.io".into()
}

fn default_branch() -> String {
    "main".into()
}

fn default_posts_path() -> String {
    "blog/posts".into()
}

fn default_rate_limit_statuses() -> Vec<u16> {
    vec![403, 429]
}

fn default_max_entries_static() -> usize {
    100
}

fn default_max_entries_dynamic() -> usize {
    50
}

fn default_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_offline_page() -> String {
    "/blog/offline.html".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            site_origin: default_site_origin(),
            static_assets: default_static_assets(),
            static_extensions: default_static_extensions(),
            third_party_hosts: default_third_party_hosts(),
            third_party_assets: default_third_party_assets(),
            upstream: UpstreamConfig::default(),
            rate_limit_statuses: default_rate_limit_statuses(),
            max_entries_static: default_max_entries_static(),
            max_entries_dynamic: default_max_entries_dynamic(),
            max_age_secs: default_max_age_secs(),
            offline_page: default_offline_page(),
            sweep_interval_secs: 0,
            migrate_dynamic_on_activate: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Entry time-to-live.
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age_secs as i64)
    }

    /// Sweep timer period, if the timer is enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Entry bound for the partition with the given role.
    pub fn max_entries(&self, role: PartitionRole) -> usize {
        match role {
            PartitionRole::Static => self.max_entries_static,
            PartitionRole::Dynamic => self.max_entries_dynamic,
        }
    }

    /// Whether an upstream status means "blocked or rate-limited".
    pub fn is_rate_limit_status(&self, status: u16) -> bool {
        self.rate_limit_statuses.contains(&status)
    }

    /// Parsed site origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `site_origin` is not an absolute URL.
    pub fn site_origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.site_origin)
            .map_err(|e| ConfigError::Invalid { field: "site_origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `POSTCACHE_`
    /// 2. TOML file from `POSTCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("POSTCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("POSTCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
