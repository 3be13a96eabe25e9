use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig, ID_PLACEHOLDER,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl loop pacing and batching
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max_retries must be >= 1".to_string(),
        ));
    }

    if config.miss_threshold < 1 {
        return Err(ConfigError::Validation(
            "miss_threshold must be >= 1".to_string(),
        ));
    }

    if config.flush_batch_size < 1 {
        return Err(ConfigError::Validation(
            "flush_batch_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the URL template, source tag, and category keywords
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_url_template(&config.url_template)?;

    if config.source.is_empty() {
        return Err(ConfigError::Validation("source cannot be empty".to_string()));
    }

    if !config
        .source
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source must contain only lowercase letters, digits, '-' and '_', got '{}'",
            config.source
        )));
    }

    if config.categories.is_empty() {
        return Err(ConfigError::Validation(
            "categories must list at least one keyword".to_string(),
        ));
    }

    for keyword in &config.categories {
        // Matched against class tokens, which never contain whitespace
        if keyword.is_empty() || keyword.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "category keyword '{}' must be a single non-empty token",
                keyword
            )));
        }
    }

    Ok(())
}

/// Validates that a template has exactly one `{id}` and renders to an http(s) URL
fn validate_url_template(template: &str) -> Result<(), ConfigError> {
    let placeholders = template.matches(ID_PLACEHOLDER).count();
    if placeholders != 1 {
        return Err(ConfigError::InvalidTemplate(format!(
            "'{}' must contain {} exactly once, found {}",
            template, ID_PLACEHOLDER, placeholders
        )));
    }

    let sample = template.replace(ID_PLACEHOLDER, "1");
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidTemplate(format!("'{}': {}", template, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidTemplate(format!(
            "'{}' must use http or https",
            template
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
