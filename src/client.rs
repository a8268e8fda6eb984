//! High-level client — `OddstreamClient` with explicit shared dependencies.
//!
//! The store, the session connector, and the feed config are constructed
//! here and handed out as explicit dependencies. Components never reach into
//! ambient global state; anything that needs the store gets the `Arc`.

use crate::error::SdkError;
use crate::feed::FeedConfig;
use crate::http::AccountHttp;
use crate::session::SessionConnector;
use crate::store::EntityStore;

use std::sync::Arc;

/// The primary entry point for the Oddstream SDK.
pub struct OddstreamClient {
    http: AccountHttp,
    session: Arc<SessionConnector>,
    store: Arc<EntityStore>,
    feed_config: FeedConfig,
}

impl OddstreamClient {
    pub fn builder() -> OddstreamClientBuilder {
        OddstreamClientBuilder::default()
    }

    /// The session connector for account-API requests.
    pub fn session(&self) -> &Arc<SessionConnector> {
        &self.session
    }

    /// The shared entity store that subscription pumps write into.
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// The low-level HTTP client (no session semantics).
    pub fn http(&self) -> &AccountHttp {
        &self.http
    }

    /// Feed configuration for creating feed connections.
    ///
    /// The feed client is intentionally not embedded in `OddstreamClient`:
    /// connection lifetimes are managed by the application (a lost
    /// connection means building a fresh client and re-registering).
    pub fn feed_config(&self) -> &FeedConfig {
        &self.feed_config
    }

    /// Create a new native feed client from the current config.
    #[cfg(feature = "feed-native")]
    pub fn feed(&self) -> crate::feed::native::FeedClient {
        crate::feed::native::FeedClient::new(self.feed_config.clone())
    }
}

impl Clone for OddstreamClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            session: self.session.clone(),
            store: self.store.clone(),
            feed_config: self.feed_config.clone(),
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct OddstreamClientBuilder {
    base_url: String,
    feed_url: String,
    feed_config: FeedConfig,
}

impl Default for OddstreamClientBuilder {
    fn default() -> Self {
        Self {
            base_url: crate::network::DEFAULT_API_URL.to_string(),
            feed_url: crate::network::DEFAULT_FEED_URL.to_string(),
            feed_config: FeedConfig::default(),
        }
    }
}

impl OddstreamClientBuilder {
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn feed_url(mut self, url: &str) -> Self {
        self.feed_url = url.to_string();
        self
    }

    pub fn feed_config(mut self, config: FeedConfig) -> Self {
        self.feed_config = config;
        self
    }

    pub fn build(self) -> Result<OddstreamClient, SdkError> {
        let http = AccountHttp::new(&self.base_url);
        let session = Arc::new(SessionConnector::new(http.clone()));
        Ok(OddstreamClient {
            http,
            session,
            store: Arc::new(EntityStore::new()),
            feed_config: FeedConfig {
                url: self.feed_url,
                ..self.feed_config
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = OddstreamClient::builder().build().unwrap();
        assert_eq!(client.http().base_url(), crate::network::DEFAULT_API_URL);
        assert_eq!(client.feed_config().url, crate::network::DEFAULT_FEED_URL);
    }

    #[test]
    fn test_clones_share_store() {
        let client = OddstreamClient::builder().build().unwrap();
        let clone = client.clone();
        assert!(Arc::ptr_eq(client.store(), clone.store()));
        assert!(Arc::ptr_eq(client.session(), clone.session()));
    }
}
