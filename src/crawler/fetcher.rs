//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building the HTTP client with the configured user agent and timeout
//! - Rendering item URLs from the site template
//! - Classifying each exchange as a page, a miss, or a transient failure

use crate::config::{SiteConfig, UserAgentConfig};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Statuses meaning "no item has this ID"
const MISS_STATUSES: &[StatusCode] = &[StatusCode::NOT_FOUND, StatusCode::GONE];

/// A page that was fetched successfully
#[derive(Debug, Clone)]
pub struct Document {
    /// The ID the page was requested for
    pub id: i64,

    /// URL built from the template (not the post-redirect URL)
    pub url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Raw HTML body
    pub body: String,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// The exchange completed and the item exists
    Success(Document),

    /// The site reports no item with this ID
    Miss {
        /// The HTTP status code (404 or 410)
        status_code: u16,
    },

    /// The exchange did not complete; the same ID should be tried again
    TransientFailure {
        /// Error description
        cause: String,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - User agent configuration for the header
/// * `timeout` - Overall request timeout; the connect timeout is capped at 10s
///
/// # Returns
///
/// * `Ok(Client)` - Configured HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use idcrawl::config::UserAgentConfig;
/// use idcrawl::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "idcrawl".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches item pages by ID
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    site: SiteConfig,
}

impl Fetcher {
    pub fn new(client: Client, site: SiteConfig) -> Self {
        Self { client, site }
    }

    /// The URL requested for `id`
    pub fn url_for(&self, id: i64) -> String {
        self.site.item_url(id)
    }

    /// Fetches the page for `id` and classifies the outcome
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | HTTP 404, 410 | `Miss` |
    /// | Any other status with a readable body | `Success` |
    /// | Timeout, connect error, DNS failure, reset | `TransientFailure` |
    /// | Body could not be read | `TransientFailure` |
    pub async fn fetch(&self, id: i64) -> FetchOutcome {
        let url = self.url_for(id);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchOutcome::TransientFailure {
                    cause: describe_error(&e),
                }
            }
        };

        let status = response.status();
        if MISS_STATUSES.contains(&status) {
            return FetchOutcome::Miss {
                status_code: status.as_u16(),
            };
        }

        if !status.is_success() {
            tracing::warn!("ID {} answered HTTP {}, treating as a page", id, status);
        }

        match response.text().await {
            Ok(body) => FetchOutcome::Success(Document {
                id,
                url,
                status_code: status.as_u16(),
                body,
            }),
            Err(e) => FetchOutcome::TransientFailure {
                cause: format!("Failed to read body: {}", describe_error(&e)),
            },
        }
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}
