//! Event fan-out and subscription lifecycle

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{channel_subscriber, recv_within};
use strand_common::TypedValue;
use strand_node::{EventSubscriber, NodeError};

#[tokio::test]
async fn test_publish_delivers_exactly_once_per_subscription() {
    let node = common::test_node();
    node.start().await.unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe("svc/added", subscriber).await.unwrap();

    node.publish("svc/added", Some(TypedValue::from(json!({"sum": 7}))))
        .await
        .unwrap();

    let payload = recv_within(&mut rx, "event").await.unwrap();
    assert_eq!(payload.as_json(), &json!({"sum": 7}));
    assert!(rx.try_recv().is_err());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_wildcard_subscription_sees_all_service_events() {
    let node = common::test_node();
    node.start().await.unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe("svc/>", subscriber).await.unwrap();

    node.publish("svc/a", Some(TypedValue::from(json!(1))))
        .await
        .unwrap();
    node.publish("svc/a/b", Some(TypedValue::from(json!(2))))
        .await
        .unwrap();
    node.publish("other/a", Some(TypedValue::from(json!(3))))
        .await
        .unwrap();

    assert_eq!(recv_within(&mut rx, "first").await.unwrap().as_json(), &json!(1));
    assert_eq!(recv_within(&mut rx, "second").await.unwrap().as_json(), &json!(2));
    assert!(rx.try_recv().is_err());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_publish_order_is_preserved_per_subscriber() {
    let node = common::test_node();
    node.start().await.unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe("svc/counter", subscriber).await.unwrap();

    for n in 0..10 {
        node.publish("svc/counter", Some(TypedValue::from(json!(n))))
            .await
            .unwrap();
    }
    for n in 0..10 {
        let payload = recv_within(&mut rx, "ordered event").await.unwrap();
        assert_eq!(payload.as_json(), &json!(n));
    }

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_failing_subscriber_does_not_abort_others() {
    let node = common::test_node();
    node.start().await.unwrap();

    let failing: EventSubscriber =
        Arc::new(|_ctx, _payload| Box::pin(async { Err("subscriber exploded".to_string()) }));
    node.subscribe("svc/added", failing).await.unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe("svc/added", subscriber).await.unwrap();

    node.publish("svc/added", Some(TypedValue::from(json!({"ok": true}))))
        .await
        .unwrap();

    let payload = recv_within(&mut rx, "event despite failure").await.unwrap();
    assert_eq!(payload.as_json(), &json!({"ok": true}));

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent_error_after_success() {
    let node = common::test_node();
    node.start().await.unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    let id = node.subscribe("svc/added", subscriber).await.unwrap();

    node.unsubscribe(id).await.unwrap();
    let err = node.unsubscribe(id).await.unwrap_err();
    assert!(matches!(err, NodeError::NotFound(_)));

    node.publish("svc/added", Some(TypedValue::from(json!(1))))
        .await
        .unwrap();
    assert!(rx.try_recv().is_err());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_publish_before_start_is_rejected() {
    let node = common::test_node();
    let err = node
        .publish("svc/added", Some(TypedValue::null()))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::NotStarted));
}

#[tokio::test]
async fn test_event_without_payload_delivers_none() {
    let node = common::test_node();
    node.start().await.unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe("svc/ping", subscriber).await.unwrap();

    node.publish("svc/ping", None).await.unwrap();
    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(payload.is_none());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_subscriber_can_publish_follow_up_events() {
    let node = common::test_node();
    node.start().await.unwrap();

    let relays = Arc::new(AtomicUsize::new(0));
    let relays_seen = relays.clone();
    let relay: EventSubscriber = Arc::new(move |ctx, _payload| {
        let relays = relays_seen.clone();
        Box::pin(async move {
            // Only relay the original event, not our own follow-up.
            if relays.fetch_add(1, Ordering::SeqCst) == 0 {
                ctx.publish("relayed", Some(TypedValue::from(json!("follow-up"))))
                    .await
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        })
    });
    node.subscribe("svc/>", relay).await.unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe("svc/relayed", subscriber).await.unwrap();

    node.publish("svc/origin", Some(TypedValue::from(json!("hello"))))
        .await
        .unwrap();

    let payload = recv_within(&mut rx, "relayed event").await.unwrap();
    assert_eq!(payload.as_json(), &json!("follow-up"));

    node.stop().await.unwrap();
}
