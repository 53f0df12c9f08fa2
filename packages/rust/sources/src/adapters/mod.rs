//! Adapter trait and the per-source registry.

mod feed;
mod html;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use agenda_shared::{AdapterConfig, AgendaError, AppConfig, IngestConfig, RawEventRecord, Result};

pub use feed::FeedAdapter;
pub use html::HtmlAdapter;

/// User-Agent string for listing page requests.
const USER_AGENT: &str = concat!("Agenda/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Produces the raw records of one source.
///
/// Adapters only extract fields. Dates stay as source text and categories as
/// hints; normalization happens downstream.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source tag this adapter serves.
    fn name(&self) -> &str;

    /// Fetch the current listing. An error means the whole batch is unavailable.
    async fn fetch(&self) -> Result<Vec<RawEventRecord>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds one adapter per source, in registration order.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every configured source. HTML sources share one client.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = http_client(IngestConfig::from(config).fetch_timeout)?;

        let mut registry = Self::new();
        for source in &config.sources {
            let adapter: Box<dyn SourceAdapter> = match &source.adapter {
                AdapterConfig::Feed { path } => Box::new(FeedAdapter::new(&source.name, path)),
                AdapterConfig::Html(selectors) => {
                    Box::new(HtmlAdapter::new(&source.name, selectors, client.clone())?)
                }
            };
            registry.register(adapter);
        }
        Ok(registry)
    }

    /// Add an adapter, replacing any previous one with the same name.
    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>) {
        self.adapters.retain(|a| a.name() != adapter.name());
        self.adapters.push(adapter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// HTTP client used by page-fetching adapters.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| AgendaError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn fetch(&self) -> Result<Vec<RawEventRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn builds_one_adapter_per_source() {
        let config: AppConfig = toml::from_str(
            r#"
[[sources]]
name = "beacons"
notation = "short-month-multi"

[sources.adapter]
kind = "feed"
path = "/tmp/beacons.json"

[[sources]]
name = "sympla"
notation = "day-month-time"

[sources.adapter]
kind = "html"
url = "https://www.sympla.com.br/eventos/vitoria-es"
card = "a.sympla-card"
title = "h3"
"#,
        )
        .expect("parse config");

        let registry = SourceRegistry::from_config(&config).expect("registry");
        assert_eq!(registry.names(), vec!["beacons", "sympla"]);
        assert!(registry.get("sympla").is_some());
        assert!(registry.get("eventim").is_none());
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let config: AppConfig = toml::from_str(
            r#"
[[sources]]
name = "broken"
notation = "numeric-range"

[sources.adapter]
kind = "html"
url = "https://example.com"
card = "div[["
title = "h3"
"#,
        )
        .expect("parse config");

        let err = SourceRegistry::from_config(&config).err().expect("selector error");
        assert!(matches!(err, AgendaError::Config { .. }));
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = SourceRegistry::new();
        registry.register(Box::new(Fixed("a")));
        registry.register(Box::new(Fixed("b")));
        registry.register(Box::new(Fixed("a")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["b", "a"]);
    }
}
