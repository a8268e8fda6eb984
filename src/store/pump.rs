//! Glue between a subscription's event stream and the store.

use crate::error::SdkError;
use crate::feed::SubscriptionEvent;
use crate::shared::Scope;
use crate::store::EntityStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Drive one subscription's events into the store, in delivery order.
///
/// Runs until the stream ends — either `Disconnected` (transport loss or
/// registry shutdown) or the sender side being dropped after `unregister`.
/// Events for different scopes can be pumped concurrently from separate
/// tasks; the store serializes only the individual applications.
pub async fn sync_subscription(
    store: Arc<EntityStore>,
    scope: Scope,
    mut events: mpsc::Receiver<SubscriptionEvent>,
) -> Result<(), SdkError> {
    while let Some(event) = events.recv().await {
        match event {
            SubscriptionEvent::Connect(handle) => {
                tracing::debug!(scope = %scope, ?handle, "Subscription connected");
            }
            SubscriptionEvent::InitialContent(aggregator) => {
                tracing::debug!(
                    scope = %scope,
                    records = aggregator.records.len(),
                    "Applying initial dump"
                );
                // An initial dump is the authoritative full content of its
                // scope: clear-then-insert, so a re-registered subscription
                // (new parameters, same slot) displaces the old entries.
                store
                    .apply_initial_dump(&scope, &aggregator.records, true)
                    .await?;
            }
            SubscriptionEvent::UpdatedContent(aggregator) => {
                store.apply_update_batch(&scope, &aggregator.records).await?;
            }
            SubscriptionEvent::Disconnected { reason } => {
                tracing::info!(scope = %scope, reason = %reason, "Subscription disconnected");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::EntityId;
    use serde_json::json;

    use crate::feed::Aggregator;

    fn aggregator(records: Vec<serde_json::Value>) -> Aggregator {
        Aggregator {
            records: records
                .into_iter()
                .map(|v| serde_json::from_value(v).unwrap())
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_pump_applies_dump_then_updates_then_stops() {
        let store = Arc::new(EntityStore::new());
        let (tx, rx) = mpsc::channel(16);

        tx.send(SubscriptionEvent::InitialContent(aggregator(
            vec![json!({
                "_type": "match",
                "id": "m1",
                "name": "Home vs Away",
                "sportId": "s1",
                "startTime": "2025-06-01T18:00:00Z"
            })],
        )))
        .await
        .unwrap();
        tx.send(SubscriptionEvent::UpdatedContent(aggregator(
            vec![json!({
                "changeType": "update",
                "entityType": "match",
                "id": "m1",
                "changedProperties": {"score": "1-0"}
            })],
        )))
        .await
        .unwrap();
        tx.send(SubscriptionEvent::Disconnected {
            reason: "test over".to_string(),
        })
        .await
        .unwrap();

        sync_subscription(store.clone(), Scope::new("matches:s1"), rx)
            .await
            .unwrap();

        let m = store.match_by_id(&EntityId::from("m1")).await.unwrap();
        assert_eq!(m.score.as_deref(), Some("1-0"));
    }

    #[tokio::test]
    async fn test_pump_ends_when_sender_dropped() {
        let store = Arc::new(EntityStore::new());
        let (tx, rx) = mpsc::channel(16);
        drop(tx);

        sync_subscription(store, Scope::new("sports"), rx)
            .await
            .unwrap();
    }
}
