use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Novel-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of fetch tasks allowed to run at the same time
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Total attempts per resource, including the first one
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed part of the delay between attempts (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Delay added per failed attempt (milliseconds)
    #[serde(rename = "backoff-step-ms", default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,

    /// Timeout for a single HTTP request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_step_ms: default_backoff_step_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_workers() -> u32 {
    8
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    3000
}

fn default_backoff_step_ms() -> u64 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
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
    /// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
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
    /// Root directory for chapter records, images, cover and report
    #[serde(rename = "output-path")]
    pub output_path: PathBuf,

    /// Partition chapter records into one directory per volume
    #[serde(rename = "pack-by-volume", default)]
    pub pack_by_volume: bool,

    /// Append a source link line to every saved chapter body
    #[serde(rename = "add-source-url", default)]
    pub add_source_url: bool,

    /// Debug mode hides progress bars so log output stays readable
    #[serde(rename = "debug-mode", default)]
    pub debug_mode: bool,

    /// Image fetched when the book has no usable cover
    #[serde(rename = "fallback-cover-url", default)]
    pub fallback_cover_url: Option<String>,
}

/// A site handled by the generic HTTP source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Base URL the source is registered under (e.g. "https://example.com/")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// CSS selector of the element holding the chapter text
    #[serde(rename = "content-selector")]
    pub content_selector: String,

    /// CSS selectors of elements stripped from the chapter text
    #[serde(rename = "remove-selectors", default)]
    pub remove_selectors: Vec<String>,
}
