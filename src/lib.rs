//! # Oddstream SDK
//!
//! A Rust SDK for the Oddstream sports data platform: a real-time feed sync
//! core plus an authenticated account API client.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Core** — Shared newtypes, typed entity domains, the self-describing
//!    record decoder
//! 2. **Store** — The authoritative in-memory state; applies dumps and diffs
//! 3. **Feed** — Subscription registry + native WebSocket transport
//! 4. **HTTP API** — `AccountHttp` with per-endpoint retry policies
//! 5. **Session** — `SessionConnector` with transparent login/expiry recovery
//! 6. **High-Level Client** — `OddstreamClient` wiring the pieces together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oddstream_sdk::prelude::*;
//!
//! let client = OddstreamClient::builder()
//!     .base_url("https://account.oddstream.io")
//!     .build()?;
//!
//! client.session().login("user@example.com", "hunter2").await?;
//! let balance = client.session().balance().await?;
//!
//! let mut feed = client.feed();
//! feed.connect().await?;
//! let registry = feed.subscriptions();
//! let descriptor = EndpointDescriptor::Matches { sport_id: "football".into() };
//! let scope = descriptor.scope();
//! let (handle, events) = registry.register(descriptor).await?;
//! tokio::spawn(sync_subscription(client.store().clone(), scope, events));
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes used across all domains.
pub mod shared;

/// Domain modules (vertical slices): typed entities and the record decoder.
pub mod domain;

/// Unified SDK error types.
pub mod error;

/// Network URL constants.
pub mod network;

// ── Layer 2: Store ───────────────────────────────────────────────────────────

/// The authoritative in-memory entity store.
pub mod store;

// ── Layer 3: Feed ────────────────────────────────────────────────────────────

/// Feed layer: wire messages, subscriptions, native transport.
pub mod feed;

// ── Layer 4: HTTP API ────────────────────────────────────────────────────────

/// HTTP client with retry policies.
#[cfg(feature = "http")]
pub mod http;

// ── Layer 5: Session ─────────────────────────────────────────────────────────

/// Account session: tokens, credentials, transparent re-login.
#[cfg(feature = "http")]
pub mod session;

// ── Layer 6: High-Level Client ───────────────────────────────────────────────

/// `OddstreamClient` — the primary entry point.
#[cfg(feature = "http")]
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{EntityId, Scope};

    // Domain types — taxonomy
    pub use crate::domain::sport::{EventCategory, Location, Sport};

    // Domain types — events
    pub use crate::domain::event::{EventInfo, Match, MatchStatus, NextMatchesNumber, Tournament};

    // Domain types — markets
    pub use crate::domain::market::{
        BettingOffer, MainMarket, Market, MarketInfo, MarketOutcomeRelation, Outcome,
        TradingStatus,
    };

    // Record layer
    pub use crate::domain::record::{
        ChangeRecord, ChangeType, Entity, EntityKind, EntityRecord,
    };

    // Errors
    pub use crate::error::{FeedError, HttpError, SdkError, SessionError};

    // Network
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_FEED_URL};

    // Store
    pub use crate::store::{sync_subscription, EntityStore};

    // Feed
    pub use crate::feed::{
        Aggregator, EndpointDescriptor, FeedConfig, MessageIn, MessageOut, SubscriptionEvent,
        SubscriptionHandle, SubscriptionRegistry, SubscriptionState,
    };
    #[cfg(feature = "feed-native")]
    pub use crate::feed::native::FeedClient;

    // Session
    #[cfg(feature = "http")]
    pub use crate::session::{
        AccountEndpoint, SessionConnector, SessionCredentials, SessionToken,
    };

    // HTTP client
    #[cfg(feature = "http")]
    pub use crate::client::{OddstreamClient, OddstreamClientBuilder};
    #[cfg(feature = "http")]
    pub use crate::http::retry::{RetryConfig, RetryPolicy};
}
