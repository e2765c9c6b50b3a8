//! Registry of content sources keyed by base URL

use crate::config::Config;
use crate::source::{ContentSource, HttpSource};
use crate::url::{normalize_base_url, UrlError};
use crate::HarvestError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps normalized base URLs to the sources that handle them
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn ContentSource>>,
}

impl SourceRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry holding one [`HttpSource`] per configured site
    ///
    /// All sources share a single HTTP client so connections are pooled.
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let client = crate::source::build_http_client(
            &config.user_agent,
            config.crawler.request_timeout(),
        )?;

        let mut registry = Self::new();
        for entry in &config.sources {
            let source = HttpSource::new(client.clone(), entry)
                .map_err(|e| crate::ConfigError::Validation(e.to_string()))?;
            registry
                .register(&entry.base_url, Arc::new(source))
                .map_err(|e| crate::ConfigError::InvalidUrl(e.to_string()))?;
        }

        tracing::debug!("Registered {} content sources", registry.len());
        Ok(registry)
    }

    /// Registers a source under a base URL, replacing any previous entry
    pub fn register(
        &mut self,
        base_url: &str,
        source: Arc<dyn ContentSource>,
    ) -> Result<(), UrlError> {
        let key = normalize_base_url(base_url)?;
        if self.sources.insert(key.clone(), source).is_some() {
            tracing::warn!("Source for {} was registered twice; keeping the latest", key);
        }
        Ok(())
    }

    /// Finds the source responsible for a novel URL
    ///
    /// When several base URLs match, the longest (most specific) one wins.
    pub fn resolve(&self, novel_url: &str) -> Option<Arc<dyn ContentSource>> {
        let target = novel_url.trim();
        let target_with_slash = format!("{}/", target.trim_end_matches('/'));

        self.sources
            .iter()
            .filter(|(base, _)| {
                target.starts_with(base.as_str()) || target_with_slash.as_str() == base.as_str()
            })
            .max_by_key(|(base, _)| base.len())
            .map(|(_, source)| Arc::clone(source))
    }

    /// Lists the registered base URLs in sorted order
    pub fn base_urls(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
