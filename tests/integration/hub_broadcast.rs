//! Broadcast hub fan-out across many subscribers

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use greenhouse_telemetry::actors::hub::{HubHandle, HubSettings};
use greenhouse_telemetry::hub::{Envelope, EventType, HubError, SubscriberSink};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::*;

/// Accepts the welcome message, then fails every write
struct FlakySink {
    writes: AtomicUsize,
}

impl SubscriberSink for FlakySink {
    fn send_text(&self, _text: &str) -> Result<(), HubError> {
        if self.writes.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(())
        } else {
            Err(HubError::Closed)
        }
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn test_events_arrive_in_publish_order_for_every_subscriber() {
    let hub = HubHandle::spawn(HubSettings::default());
    let mut receivers = Vec::new();
    for _ in 0..10 {
        receivers.push(subscribe(&hub).await.1);
    }

    for i in 0..5 {
        let delivered = hub
            .broadcast(Envelope::new(EventType::TelemetryUpdate, json!({ "seq": i })))
            .await
            .unwrap();
        assert_eq!(delivered, 10);
    }

    for rx in &mut receivers {
        for i in 0..5 {
            let envelope = next_envelope(rx).await;
            assert_eq!(envelope["data"]["seq"], i);
            assert!(envelope["timestamp"].is_string());
        }
    }
}

#[tokio::test]
async fn test_broken_subscriber_is_isolated_and_dropped() {
    let hub = HubHandle::spawn(HubSettings::default());
    let (_first, mut first_rx) = subscribe(&hub).await;

    let flaky: Arc<dyn SubscriberSink> = Arc::new(FlakySink {
        writes: AtomicUsize::new(0),
    });
    hub.connect(flaky).await.unwrap();

    let (_last, mut last_rx) = subscribe(&hub).await;
    assert_eq!(hub.subscriber_count().await.unwrap(), 3);

    let delivered = hub
        .broadcast(Envelope::new(EventType::NewAlerts, json!([])))
        .await
        .unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(next_envelope(&mut first_rx).await["type"], "new_alerts");
    assert_eq!(next_envelope(&mut last_rx).await["type"], "new_alerts");
    assert_eq!(hub.subscriber_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_topic_subscriptions_filter_when_enabled() {
    let hub = HubHandle::spawn(HubSettings {
        filter_by_topic: true,
        ..HubSettings::default()
    });
    let (alerts_only, mut alerts_rx) = subscribe(&hub).await;
    let (_everything, mut all_rx) = subscribe(&hub).await;

    hub.incoming(
        alerts_only,
        r#"{"type":"subscribe","data":{"topic":"alerts"}}"#.to_string(),
    )
    .await
    .unwrap();
    let confirmed = next_envelope(&mut alerts_rx).await;
    assert_eq!(confirmed["type"], "subscription_confirmed");
    assert_eq!(confirmed["data"]["topic"], "alerts");

    hub.publish(EventType::TelemetryUpdate, json!({ "temperature": 21.0 }))
        .await
        .unwrap();
    hub.publish(EventType::NewAlerts, json!([])).await.unwrap();
    hub.publish(EventType::PlantChanged, json!({ "previous": "Tomato" }))
        .await
        .unwrap();

    assert_eq!(next_envelope(&mut alerts_rx).await["type"], "new_alerts");
    assert_eq!(next_envelope(&mut alerts_rx).await["type"], "plant_changed");

    assert_eq!(next_envelope(&mut all_rx).await["type"], "telemetry_update");
    assert_eq!(next_envelope(&mut all_rx).await["type"], "new_alerts");
    assert_eq!(next_envelope(&mut all_rx).await["type"], "plant_changed");
}

#[tokio::test]
async fn test_unknown_messages_keep_the_subscriber() {
    let hub = HubHandle::spawn(HubSettings::default());
    let (id, mut rx) = subscribe(&hub).await;

    hub.incoming(id, "definitely not json".to_string()).await.unwrap();
    hub.incoming(id, r#"{"type":"dance"}"#.to_string()).await.unwrap();
    hub.incoming(id, r#"{"type":"ping"}"#.to_string()).await.unwrap();

    assert_eq!(next_envelope(&mut rx).await["type"], "pong");
    assert_eq!(hub.subscriber_count().await.unwrap(), 1);

    hub.disconnect(id).await.unwrap();
    assert_eq!(hub.subscriber_count().await.unwrap(), 0);
}
