//! Retained event history and replay

mod common;

use std::time::Duration;

use serde_json::json;

use common::{channel_subscriber, recv_within};
use strand_common::TypedValue;
use strand_node::{Node, NodeConfig, OnOptions, PublishOptions, SubscribeOptions};

#[tokio::test]
async fn test_retained_replay_is_oldest_first_then_live() {
    // Arrange: two retained events on different topics under one service
    let node = common::test_node();
    node.start().await.unwrap();

    node.publish_with_options(
        "svc/a",
        Some(TypedValue::from(json!({"n": 1}))),
        PublishOptions::retained(),
    )
    .await
    .unwrap();
    node.publish_with_options(
        "svc/b",
        Some(TypedValue::from(json!({"n": 2}))),
        PublishOptions::retained(),
    )
    .await
    .unwrap();

    // Act: late subscriber asks for the past
    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe_with_options("svc/>", subscriber, SubscribeOptions { include_past: true })
        .await
        .unwrap();

    // Assert: replay in publish order, then live events
    let first = recv_within(&mut rx, "first retained event").await.unwrap();
    assert_eq!(first.as_json(), &json!({"n": 1}));
    let second = recv_within(&mut rx, "second retained event").await.unwrap();
    assert_eq!(second.as_json(), &json!({"n": 2}));

    node.publish("svc/added", Some(TypedValue::from(json!({"sum": 7}))))
        .await
        .unwrap();
    let live = recv_within(&mut rx, "live event").await.unwrap();
    assert_eq!(live.as_json(), &json!({"sum": 7}));

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_without_include_past_gets_no_replay() {
    let node = common::test_node();
    node.start().await.unwrap();

    node.publish_with_options(
        "svc/a",
        Some(TypedValue::from(json!(1))),
        PublishOptions::retained(),
    )
    .await
    .unwrap();

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe("svc/>", subscriber).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_clear_retained_then_fresh_subscribe_sees_nothing() {
    let node = common::test_node();
    node.start().await.unwrap();

    node.publish_with_options(
        "svc/a",
        Some(TypedValue::from(json!({"n": 1}))),
        PublishOptions::retained(),
    )
    .await
    .unwrap();
    node.publish_with_options(
        "svc/b",
        Some(TypedValue::from(json!({"n": 2}))),
        PublishOptions::retained(),
    )
    .await
    .unwrap();

    let cleared = node.clear_retained_events_matching("svc/>").unwrap();
    assert_eq!(cleared, 2);

    // Clearing again finds nothing.
    assert_eq!(node.clear_retained_events_matching("svc/>").unwrap(), 0);

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe_with_options("svc/>", subscriber, SubscribeOptions { include_past: true })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_retained_history_is_bounded_oldest_evicted() {
    let node = Node::new(NodeConfig::new("main").with_max_retained_per_topic(3));
    node.start().await.unwrap();

    for n in 0..5 {
        node.publish_with_options(
            "svc/counter",
            Some(TypedValue::from(json!(n))),
            PublishOptions::retained(),
        )
        .await
        .unwrap();
    }

    let (subscriber, mut rx) = channel_subscriber();
    node.subscribe_with_options(
        "svc/counter",
        subscriber,
        SubscribeOptions { include_past: true },
    )
    .await
    .unwrap();

    // Only the last three survive, in insertion order.
    for expected in [2, 3, 4] {
        let payload = recv_within(&mut rx, "bounded replay").await.unwrap();
        assert_eq!(payload.as_json(), &json!(expected));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_on_resolves_with_live_event() {
    let node = common::test_node();
    node.start().await.unwrap();

    let waiter = {
        let node = node.clone();
        tokio::spawn(async move {
            node.on(
                "svc/ready",
                OnOptions {
                    timeout: Some(Duration::from_secs(2)),
                    include_past: false,
                },
            )
            .await
        })
    };

    // Give the waiter time to register its subscription.
    tokio::time::sleep(Duration::from_millis(50)).await;
    node.publish("svc/ready", Some(TypedValue::from(json!("go"))))
        .await
        .unwrap();

    let resolved = waiter.await.unwrap().unwrap();
    assert_eq!(resolved.unwrap().as_json(), &json!("go"));

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_on_timeout_resolves_none() {
    let node = common::test_node();
    node.start().await.unwrap();

    let resolved = node
        .on(
            "svc/never",
            OnOptions {
                timeout: Some(Duration::from_millis(50)),
                include_past: false,
            },
        )
        .await
        .unwrap();
    assert!(resolved.is_none());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_on_satisfied_by_retained_replay() {
    let node = common::test_node();
    node.start().await.unwrap();

    node.publish_with_options(
        "svc/ready",
        Some(TypedValue::from(json!("already happened"))),
        PublishOptions::retained(),
    )
    .await
    .unwrap();

    let resolved = node
        .on(
            "svc/ready",
            OnOptions {
                timeout: Some(Duration::from_secs(2)),
                include_past: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.unwrap().as_json(), &json!("already happened"));

    node.stop().await.unwrap();
}
