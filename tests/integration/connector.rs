//! Connector against a live hub
//!
//! Covers the WebSocket driver end to end: handler dispatch, subscription
//! replay, manual close and giving up on an unreachable hub.

use std::time::Duration;

use greenhouse_telemetry::actors::hub::HubHandle;
use greenhouse_telemetry::connector::{
    ConnectionState, ConnectorBuilder, ConnectorHandle, ReconnectPolicy,
};
use greenhouse_telemetry::hub::{ClientMessage, Envelope, EventType, Topic};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::api_endpoints::{simulated, spawn_test_hub, spawn_test_hub_at};

const WAIT: Duration = Duration::from_secs(5);

fn stream_url(addr: std::net::SocketAddr) -> String {
    format!("ws://{addr}/api/v1/stream")
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for envelope")
        .expect("connector dropped its handlers")
}

async fn wait_for_state(
    connector: &ConnectorHandle,
    wanted: ConnectionState,
) {
    timeout(WAIT, connector.wait_for(|state| *state == wanted))
        .await
        .unwrap_or_else(|_| panic!("connector never reached {wanted:?}"))
        .unwrap();
}

async fn wait_for_subscribers(hub: &HubHandle, wanted: usize) {
    timeout(WAIT, async {
        while hub.subscriber_count().await.unwrap() != wanted {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("hub never reached {wanted} subscribers"));
}

#[tokio::test]
async fn test_connector_dispatches_hub_events() {
    let hub = spawn_test_hub(simulated()).await;

    let (welcome_tx, mut welcome_rx) = mpsc::unbounded_channel();
    let (all_tx, mut all_rx) = mpsc::unbounded_channel();

    let connector = ConnectorBuilder::new(stream_url(hub.addr))
        .on(EventType::ConnectionEstablished, move |envelope| {
            let _ = welcome_tx.send(envelope.clone());
        })
        .on_any(move |envelope| {
            let _ = all_tx.send(envelope.clone());
        })
        .subscribe(Topic::Alerts)
        .spawn();

    wait_for_state(&connector, ConnectionState::Open).await;

    let welcome = next(&mut welcome_rx).await;
    assert_eq!(welcome.kind, EventType::ConnectionEstablished);

    // fallback handlers see the welcome too, then the subscription reply
    assert_eq!(next(&mut all_rx).await.kind, EventType::ConnectionEstablished);
    let confirmed = next(&mut all_rx).await;
    assert_eq!(confirmed.kind, EventType::SubscriptionConfirmed);
    assert_eq!(confirmed.data["topic"], "alerts");

    hub.hub
        .publish(EventType::PlantChanged, json!({ "previous": "Tomato" }))
        .await
        .unwrap();
    let changed = loop {
        let envelope = next(&mut all_rx).await;
        if envelope.kind == EventType::PlantChanged {
            break envelope;
        }
    };
    assert_eq!(changed.data["previous"], "Tomato");

    assert!(connector.send(ClientMessage::Ping).await.unwrap());
    let pong = loop {
        let envelope = next(&mut all_rx).await;
        if envelope.kind == EventType::Pong {
            break envelope;
        }
    };
    assert_eq!(pong.kind, EventType::Pong);
}

#[tokio::test]
async fn test_keep_alive_pings_until_closed() {
    let hub = spawn_test_hub(simulated()).await;

    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel();
    let connector = ConnectorBuilder::new(stream_url(hub.addr))
        .keep_alive(Duration::from_millis(50))
        .on(EventType::Pong, move |envelope| {
            let _ = pong_tx.send(envelope.clone());
        })
        .spawn();
    wait_for_state(&connector, ConnectionState::Open).await;

    // no manual ping is sent; every pong answers a keep-alive
    for _ in 0..3 {
        assert_eq!(next(&mut pong_rx).await.kind, EventType::Pong);
    }

    connector.close().await.unwrap();
    wait_for_state(&connector, ConnectionState::Closed).await;
    while pong_rx.try_recv().is_ok() {}

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(pong_rx.try_recv().is_err());
    wait_for_subscribers(&hub.hub, 0).await;
}

#[tokio::test]
async fn test_manual_close_does_not_reconnect() {
    let hub = spawn_test_hub(simulated()).await;

    let connector = ConnectorBuilder::new(stream_url(hub.addr)).spawn();
    wait_for_state(&connector, ConnectionState::Open).await;
    wait_for_subscribers(&hub.hub, 1).await;

    connector.close().await.unwrap();
    wait_for_state(&connector, ConnectionState::Closed).await;

    // the hub drops the subscriber once the close frame arrives
    wait_for_subscribers(&hub.hub, 0).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connector.state(), ConnectionState::Closed);
    assert_eq!(hub.hub.subscriber_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreachable_hub_fails_permanently() {
    // grab a free port and release it so nothing is listening there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = ConnectorBuilder::new(stream_url(addr))
        .policy(ReconnectPolicy {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(50),
            max_attempts: 2,
        })
        .spawn();

    wait_for_state(&connector, ConnectionState::PermanentlyFailed).await;

    // messages are dropped rather than queued while offline
    assert!(!connector.send(ClientMessage::Ping).await.unwrap());
    assert_eq!(connector.state(), ConnectionState::PermanentlyFailed);

    connector.close().await.unwrap();
}

#[tokio::test]
async fn test_reset_reconnects_after_hub_comes_up() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = ConnectorBuilder::new(stream_url(addr))
        .policy(ReconnectPolicy {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(20),
            max_attempts: 1,
        })
        .spawn();
    wait_for_state(&connector, ConnectionState::PermanentlyFailed).await;

    // stays failed until told otherwise, even once the hub is up
    let hub = spawn_test_hub_at(simulated(), addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connector.state(), ConnectionState::PermanentlyFailed);
    assert_eq!(hub.hub.subscriber_count().await.unwrap(), 0);

    connector.reset().await.unwrap();
    wait_for_state(&connector, ConnectionState::Open).await;
    wait_for_subscribers(&hub.hub, 1).await;

    connector.close().await.unwrap();
    wait_for_state(&connector, ConnectionState::Closed).await;
}
