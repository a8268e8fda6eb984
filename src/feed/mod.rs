//! Feed layer — wire messages, endpoint descriptors, subscriptions, events.
//!
//! The push feed is a single multiplexed connection: many logical
//! subscriptions share one transport. [`SubscriptionRegistry`] owns the
//! per-subscription lifecycles; the native transport (feed-native feature)
//! moves frames and routes inbound messages through the registry.

pub mod registry;

#[cfg(feature = "feed-native")]
pub mod native;

use crate::domain::record::EntityRecord;
use serde::{Deserialize, Serialize};

pub use registry::{SubscriptionHandle, SubscriptionRegistry};

// ─── Endpoint descriptors ────────────────────────────────────────────────────

/// Parameters identifying one logical feed subscription.
///
/// One live subscription per (endpoint, parameter set) pair. Changing
/// parameters (switch sport, switch market group, switch user) means
/// unregistering the old handle *before* registering the new one — two live
/// registrations into the same logical scope corrupt the store with
/// interleaved dumps.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum EndpointDescriptor {
    /// All sports with live match counters.
    #[serde(rename = "sports")]
    Sports,
    /// Matches (with tournaments and locations) for one sport.
    #[serde(rename = "matches")]
    Matches { sport_id: String },
    /// Markets, outcomes and offers for one match, optionally narrowed to a
    /// market group.
    #[serde(rename = "markets")]
    Markets {
        match_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        market_group: Option<String>,
    },
    /// Upcoming-match counters per sport.
    #[serde(rename = "nextMatches")]
    NextMatches { sport_id: String },
    /// Account-scoped updates (balance, settled bets) for a session.
    #[serde(rename = "account")]
    Account { session_key: String },
}

impl EndpointDescriptor {
    /// Stable key identifying this registration, parameters included.
    pub fn subscription_key(&self) -> String {
        match self {
            Self::Sports => "sports".to_string(),
            Self::Matches { sport_id } => format!("matches:{sport_id}"),
            Self::Markets {
                match_id,
                market_group,
            } => match market_group {
                Some(group) => format!("markets:{match_id}:{group}"),
                None => format!("markets:{match_id}"),
            },
            Self::NextMatches { sport_id } => format!("nextMatches:{sport_id}"),
            Self::Account { session_key } => format!("account:{session_key}"),
        }
    }

    /// The store scope this subscription delivers into.
    ///
    /// Deliberately excludes the parameters: re-parameterizing a
    /// subscription (switch sport, switch match) keeps delivering into the
    /// same logical slot, and the new registration's initial dump then
    /// clears the old parameters' entries out of it.
    pub fn scope(&self) -> crate::shared::Scope {
        let family = match self {
            Self::Sports => "sports",
            Self::Matches { .. } => "matches",
            Self::Markets { .. } => "markets",
            Self::NextMatches { .. } => "nextMatches",
            Self::Account { .. } => "account",
        };
        crate::shared::Scope::new(family)
    }
}

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum MessageOut {
    #[serde(rename = "subscribe")]
    Subscribe {
        subscription: u64,
        params: EndpointDescriptor,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { subscription: u64 },
    #[serde(rename = "ping")]
    Ping,
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// Raw inbound message from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageIn {
    #[serde(flatten)]
    pub kind: Kind,
}

/// The type of inbound feed message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Kind {
    /// Authoritative full content for one subscription's scope.
    #[serde(rename = "initial")]
    Initial(AggregatorPayload),
    /// Incremental, ordered changes for one subscription's scope.
    #[serde(rename = "update")]
    Update(AggregatorPayload),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error(FeedErrorPayload),
}

/// A delivered batch of entity records addressed to one subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorPayload {
    pub subscription: u64,
    pub records: Vec<EntityRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedErrorPayload {
    pub message: String,
    pub code: Option<String>,
}

// ─── Subscription events ─────────────────────────────────────────────────────

/// A bounded batch of entity records as handed to a consumer.
#[derive(Debug, Clone)]
pub struct Aggregator {
    pub records: Vec<EntityRecord>,
}

impl From<AggregatorPayload> for Aggregator {
    fn from(payload: AggregatorPayload) -> Self {
        Self {
            records: payload.records,
        }
    }
}

/// Ordered event sequence of one subscription:
/// `Connect → InitialContent → UpdatedContent* → Disconnected`.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// Always the first event, carrying the handle.
    Connect(SubscriptionHandle),
    InitialContent(Aggregator),
    UpdatedContent(Aggregator),
    /// Terminal. Reconnection is the caller's responsibility (re-register).
    Disconnected { reason: String },
}

/// Per-handle lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Connected,
    Receiving,
    Disconnected,
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    /// Capacity of each subscription's event channel. A full channel applies
    /// backpressure to the shared dispatch, so slow consumers should drain
    /// promptly or size this up.
    pub event_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_FEED_URL.to_string(),
            connect_timeout_ms: 30_000,
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
            event_buffer: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_serialization() {
        let msg = MessageOut::Subscribe {
            subscription: 7,
            params: EndpointDescriptor::Matches {
                sport_id: "football".to_string(),
            },
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(parsed["type"], "subscribe");
        assert_eq!(parsed["subscription"], 7);
        assert_eq!(parsed["params"]["type"], "matches");
    }

    #[test]
    fn test_descriptor_params_use_snake_keys() {
        let params = EndpointDescriptor::Matches {
            sport_id: "football".to_string(),
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&params).unwrap()).unwrap();
        assert_eq!(parsed["type"], "matches");
        assert_eq!(parsed["sport_id"], "football");
    }

    #[test]
    fn test_subscription_key_includes_parameters() {
        let a = EndpointDescriptor::Matches {
            sport_id: "football".to_string(),
        };
        let b = EndpointDescriptor::Matches {
            sport_id: "tennis".to_string(),
        };
        assert_ne!(a.subscription_key(), b.subscription_key());
        assert_eq!(a.subscription_key(), "matches:football");
    }

    #[test]
    fn test_market_group_widens_key() {
        let plain = EndpointDescriptor::Markets {
            match_id: "m1".to_string(),
            market_group: None,
        };
        let grouped = EndpointDescriptor::Markets {
            match_id: "m1".to_string(),
            market_group: Some("goals".to_string()),
        };
        assert_eq!(plain.subscription_key(), "markets:m1");
        assert_eq!(grouped.subscription_key(), "markets:m1:goals");
    }

    #[test]
    fn test_scope_is_the_endpoint_family() {
        let football = EndpointDescriptor::Matches {
            sport_id: "football".to_string(),
        };
        let tennis = EndpointDescriptor::Matches {
            sport_id: "tennis".to_string(),
        };
        // Different registry keys, one logical store slot.
        assert_ne!(football.subscription_key(), tennis.subscription_key());
        assert_eq!(football.scope(), tennis.scope());
        assert_ne!(football.scope(), EndpointDescriptor::Sports.scope());
    }

    #[test]
    fn test_inbound_initial_decodes() {
        let json = r#"{
            "type": "initial",
            "subscription": 3,
            "records": [{"_type":"sport","id":"s1","name":"Football"}]
        }"#;
        let msg: MessageIn = serde_json::from_str(json).unwrap();
        match msg.kind {
            Kind::Initial(payload) => {
                assert_eq!(payload.subscription, 3);
                assert_eq!(payload.records.len(), 1);
            }
            other => panic!("expected initial, got {other:?}"),
        }
    }
}
