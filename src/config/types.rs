use serde::Deserialize;
use std::time::Duration;

/// Placeholder substituted with the numeric ID in [`SiteConfig::url_template`]
pub const ID_PLACEHOLDER: &str = "{id}";

/// Category keywords used when the config does not list its own
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "pakistan",
    "world",
    "column",
    "editorial",
    "letters",
    "50-years-ago",
    "business",
    "sport",
    "sponsored",
    "culture",
    "tech",
    "front-page",
    "back-page",
    "national",
    "international",
];

/// Main configuration structure for idcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawl loop pacing and batching
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Politeness pause after every classified attempt (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Fixed backoff before retrying a transient failure (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Retries per ID after the first failed attempt before the crawl gives up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive not-found responses that end the crawl
    #[serde(rename = "miss-threshold", default = "default_miss_threshold")]
    pub miss_threshold: u32,

    /// Buffered records that trigger a flush
    #[serde(rename = "flush-batch-size", default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            request_delay_ms: default_request_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            miss_threshold: default_miss_threshold(),
            flush_batch_size: default_flush_batch_size(),
        }
    }
}

/// The crawled site: where items live and how they are tagged
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Item URL with an `{id}` placeholder (e.g., "https://www.dawn.com/news/{id}")
    #[serde(rename = "url-template")]
    pub url_template: String,

    /// Source tag stored with every record and checkpoint
    pub source: String,

    /// Closed keyword set for category classification
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl SiteConfig {
    /// Renders the item URL for `id`
    pub fn item_url(&self, id: i64) -> String {
        self.url_template.replace(ID_PLACEHOLDER, &id.to_string())
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_request_delay_ms() -> u64 {
    300
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    10
}

fn default_miss_threshold() -> u32 {
    50
}

fn default_flush_batch_size() -> usize {
    50
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}
