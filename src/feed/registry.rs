//! Subscription registry — lifecycle owner for every logical subscription.
//!
//! Each handle gets its own mpsc event channel and its own delivery slot
//! lock. Inbound frames are routed in arrival order, so one scope's stream
//! is never reordered; unrelated handles only contend for the brief registry
//! map lookup, not for each other's delivery.
//!
//! Unregistration is checked at the delivery boundary: the slot's sender is
//! taken under the slot lock, so once `unregister` returns, a frame already
//! in flight finds an empty slot and is discarded.

use crate::error::FeedError;
use crate::feed::{
    Aggregator, AggregatorPayload, EndpointDescriptor, Kind, MessageIn, MessageOut,
    SubscriptionEvent, SubscriptionState,
};
use async_lock::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque token representing one active registration.
///
/// Owns no data; it is the unit of unregistration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self { id }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

struct DeliverySlot {
    sender: Option<mpsc::Sender<SubscriptionEvent>>,
    state: SubscriptionState,
}

struct ActiveSub {
    descriptor: EndpointDescriptor,
    slot: Arc<Mutex<DeliverySlot>>,
}

/// Owns the lifecycle of one logical subscription per
/// (endpoint descriptor, parameter set) pair.
pub struct SubscriptionRegistry {
    out_tx: mpsc::Sender<MessageOut>,
    active: Mutex<HashMap<u64, ActiveSub>>,
    next_id: AtomicU64,
    event_buffer: usize,
}

impl SubscriptionRegistry {
    pub fn new(out_tx: mpsc::Sender<MessageOut>, event_buffer: usize) -> Self {
        Self {
            out_tx,
            active: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            event_buffer: event_buffer.max(1),
        }
    }

    /// Open a new subscription.
    ///
    /// The first event on the returned receiver is always
    /// [`SubscriptionEvent::Connect`] carrying the handle; the second, once
    /// the feed responds, is `InitialContent`.
    ///
    /// Callers re-parameterizing a subscription must `unregister` the old
    /// handle before registering the new one.
    pub async fn register(
        &self,
        descriptor: EndpointDescriptor,
    ) -> Result<(SubscriptionHandle, mpsc::Receiver<SubscriptionEvent>), FeedError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriptionHandle::new(id);
        let (tx, rx) = mpsc::channel(self.event_buffer);

        // Connect is enqueued before the subscribe frame leaves, so the
        // consumer observes it before any content.
        tx.try_send(SubscriptionEvent::Connect(handle.clone()))
            .expect("fresh event channel cannot be full");

        {
            let mut active = self.active.lock().await;
            if active
                .values()
                .any(|sub| sub.descriptor == descriptor)
            {
                tracing::warn!(
                    key = %descriptor.subscription_key(),
                    "Registering an endpoint that already has a live subscription"
                );
            }
            active.insert(
                id,
                ActiveSub {
                    descriptor: descriptor.clone(),
                    slot: Arc::new(Mutex::new(DeliverySlot {
                        sender: Some(tx),
                        state: SubscriptionState::Connecting,
                    })),
                },
            );
        }

        let frame = MessageOut::Subscribe {
            subscription: id,
            params: descriptor,
        };
        if self.out_tx.send(frame).await.is_err() {
            self.active.lock().await.remove(&id);
            return Err(FeedError::NotConnected);
        }

        tracing::debug!(subscription = id, "Registered feed subscription");
        Ok((handle, rx))
    }

    /// Tear down a subscription.
    ///
    /// When this returns, no further events reach the handle's receiver —
    /// including messages the transport had already accepted.
    pub async fn unregister(&self, handle: &SubscriptionHandle) {
        let removed = self.active.lock().await.remove(&handle.id());
        let Some(sub) = removed else {
            tracing::debug!(subscription = handle.id(), "Unregister for unknown handle");
            return;
        };

        {
            // Waits for any in-flight delivery holding the slot, then closes it.
            let mut slot = sub.slot.lock().await;
            slot.sender = None;
            slot.state = SubscriptionState::Disconnected;
        }

        let frame = MessageOut::Unsubscribe {
            subscription: handle.id(),
        };
        if self.out_tx.send(frame).await.is_err() {
            tracing::debug!(
                subscription = handle.id(),
                "Transport gone before unsubscribe frame"
            );
        }
        tracing::debug!(subscription = handle.id(), "Unregistered feed subscription");
    }

    /// Current lifecycle state of a handle, if still registered.
    pub async fn state(&self, handle: &SubscriptionHandle) -> Option<SubscriptionState> {
        let active = self.active.lock().await;
        let sub = active.get(&handle.id())?;
        let slot = sub.slot.lock().await;
        Some(slot.state)
    }

    /// Number of live subscriptions.
    pub async fn len(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.active.lock().await.is_empty()
    }

    /// Route one inbound frame to its subscription, in arrival order.
    pub async fn handle_message(&self, msg: MessageIn) {
        match msg.kind {
            Kind::Initial(payload) => {
                self.deliver_content(payload, true).await;
            }
            Kind::Update(payload) => {
                self.deliver_content(payload, false).await;
            }
            Kind::Pong => {}
            Kind::Error(payload) => {
                tracing::warn!(
                    code = ?payload.code,
                    message = %payload.message,
                    "Feed error frame"
                );
            }
        }
    }

    /// Transport loss is terminal for every live handle.
    pub async fn handle_transport_closed(&self, reason: &str) {
        let drained: Vec<ActiveSub> = {
            let mut active = self.active.lock().await;
            active.drain().map(|(_, sub)| sub).collect()
        };
        for sub in drained {
            let mut slot = sub.slot.lock().await;
            slot.state = SubscriptionState::Disconnected;
            if let Some(sender) = slot.sender.take() {
                let _ = sender
                    .send(SubscriptionEvent::Disconnected {
                        reason: reason.to_string(),
                    })
                    .await;
            }
        }
        tracing::info!(reason = %reason, "Feed transport closed");
    }

    async fn deliver_content(&self, payload: AggregatorPayload, initial: bool) {
        let slot = {
            let active = self.active.lock().await;
            match active.get(&payload.subscription) {
                Some(sub) => sub.slot.clone(),
                None => {
                    // Already unregistered — the in-flight message dies here.
                    tracing::debug!(
                        subscription = payload.subscription,
                        "Dropping content for unregistered subscription"
                    );
                    return;
                }
            }
        };

        let mut slot = slot.lock().await;
        let Some(sender) = slot.sender.clone() else {
            return;
        };

        slot.state = if initial {
            SubscriptionState::Connected
        } else {
            SubscriptionState::Receiving
        };

        let aggregator = Aggregator::from(payload);
        let event = if initial {
            SubscriptionEvent::InitialContent(aggregator)
        } else {
            SubscriptionEvent::UpdatedContent(aggregator)
        };

        // Held slot lock serializes delivery with unregister; a full channel
        // backpressures the shared dispatch rather than dropping or
        // reordering this scope's stream.
        if sender.send(event).await.is_err() {
            tracing::debug!("Subscription receiver dropped; closing slot");
            slot.sender = None;
            slot.state = SubscriptionState::Disconnected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> (SubscriptionRegistry, mpsc::Receiver<MessageOut>) {
        let (out_tx, out_rx) = mpsc::channel(64);
        (SubscriptionRegistry::new(out_tx, 16), out_rx)
    }

    fn initial_msg(subscription: u64) -> MessageIn {
        serde_json::from_value(json!({
            "type": "initial",
            "subscription": subscription,
            "records": [{"_type":"sport","id":"s1","name":"Football"}]
        }))
        .unwrap()
    }

    fn update_msg(subscription: u64) -> MessageIn {
        serde_json::from_value(json!({
            "type": "update",
            "subscription": subscription,
            "records": [{
                "changeType": "update",
                "entityType": "sport",
                "id": "s1",
                "changedProperties": {"numberOfMatches": 3}
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_event_is_connect_with_handle() {
        let (registry, _out_rx) = registry();
        let (handle, mut rx) = registry
            .register(EndpointDescriptor::Sports)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            SubscriptionEvent::Connect(h) => assert_eq!(h, handle),
            other => panic!("expected Connect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_sends_subscribe_frame() {
        let (registry, mut out_rx) = registry();
        let _ = registry
            .register(EndpointDescriptor::Matches {
                sport_id: "football".into(),
            })
            .await
            .unwrap();

        match out_rx.recv().await.unwrap() {
            MessageOut::Subscribe { params, .. } => {
                assert_eq!(params.subscription_key(), "matches:football");
            }
            other => panic!("expected Subscribe frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_order_and_states() {
        let (registry, _out_rx) = registry();
        let (handle, mut rx) = registry
            .register(EndpointDescriptor::Sports)
            .await
            .unwrap();
        assert_eq!(
            registry.state(&handle).await,
            Some(SubscriptionState::Connecting)
        );

        registry.handle_message(initial_msg(handle.id())).await;
        assert_eq!(
            registry.state(&handle).await,
            Some(SubscriptionState::Connected)
        );

        registry.handle_message(update_msg(handle.id())).await;
        assert_eq!(
            registry.state(&handle).await,
            Some(SubscriptionState::Receiving)
        );

        assert!(matches!(
            rx.recv().await.unwrap(),
            SubscriptionEvent::Connect(_)
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SubscriptionEvent::InitialContent(_)
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SubscriptionEvent::UpdatedContent(_)
        ));
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery_of_in_flight_messages() {
        let (registry, mut out_rx) = registry();
        let (handle, mut rx) = registry
            .register(EndpointDescriptor::Sports)
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            SubscriptionEvent::Connect(_)
        ));

        registry.unregister(&handle).await;

        // A message the transport had already accepted arrives afterwards.
        registry.handle_message(initial_msg(handle.id())).await;

        assert!(rx.recv().await.is_none(), "no events after unregister");
        assert_eq!(registry.state(&handle).await, None);

        // Subscribe then unsubscribe frames both went out.
        assert!(matches!(
            out_rx.recv().await.unwrap(),
            MessageOut::Subscribe { .. }
        ));
        assert!(matches!(
            out_rx.recv().await.unwrap(),
            MessageOut::Unsubscribe { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_subscription_content_is_dropped() {
        let (registry, _out_rx) = registry();
        // No registration at all — must not panic or leak.
        registry.handle_message(initial_msg(99)).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_transport_close_is_terminal_for_all_handles() {
        let (registry, _out_rx) = registry();
        let (h1, mut rx1) = registry
            .register(EndpointDescriptor::Sports)
            .await
            .unwrap();
        let (_h2, mut rx2) = registry
            .register(EndpointDescriptor::Matches {
                sport_id: "tennis".into(),
            })
            .await
            .unwrap();

        registry.handle_transport_closed("stream ended").await;

        assert!(matches!(
            rx1.recv().await.unwrap(),
            SubscriptionEvent::Connect(_)
        ));
        match rx1.recv().await.unwrap() {
            SubscriptionEvent::Disconnected { reason } => assert_eq!(reason, "stream ended"),
            other => panic!("expected Disconnected, got {other:?}"),
        }
        assert!(rx1.recv().await.is_none());

        assert!(matches!(
            rx2.recv().await.unwrap(),
            SubscriptionEvent::Connect(_)
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            SubscriptionEvent::Disconnected { .. }
        ));

        assert!(registry.is_empty().await);
        assert_eq!(registry.state(&h1).await, None);
    }

    #[tokio::test]
    async fn test_register_fails_without_transport() {
        let (out_tx, out_rx) = mpsc::channel(1);
        let registry = SubscriptionRegistry::new(out_tx, 16);
        drop(out_rx);

        let result = registry.register(EndpointDescriptor::Sports).await;
        assert!(matches!(result, Err(FeedError::NotConnected)));
        assert!(registry.is_empty().await);
    }
}
