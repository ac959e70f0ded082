//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use strand_common::{SerializationContext, TypedValue};
use strand_node::{
    AbstractService, EventSubscriber, LifecycleContext, Node, NodeConfig, RemoteTransport,
};

static TRACING: Once = Once::new();

/// Route bus logs through `RUST_LOG` once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Node with defaults for the `main` network
pub fn test_node() -> Node {
    init_tracing();
    Node::new(NodeConfig::new("main"))
}

/// Subscriber that forwards every delivered payload into a channel
pub fn channel_subscriber() -> (EventSubscriber, UnboundedReceiver<Option<TypedValue>>) {
    let (tx, rx) = unbounded_channel();
    let subscriber: EventSubscriber = Arc::new(move |_ctx, payload| {
        let tx = tx.clone();
        Box::pin(async move { tx.send(payload).map_err(|e| e.to_string()) })
    });
    (subscriber, rx)
}

/// Receive with a deadline, failing the test on timeout
pub async fn recv_within(
    rx: &mut UnboundedReceiver<Option<TypedValue>>,
    what: &str,
) -> Option<TypedValue> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap_or_else(|| panic!("channel closed waiting for {what}"))
}

/// Arithmetic service registering `add` and publishing `added` events
pub struct MathService {
    network_id: Option<String>,
}

impl MathService {
    pub fn new() -> Self {
        Self { network_id: None }
    }
}

impl Default for MathService {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct AddRequest {
    a: i64,
    b: i64,
}

#[async_trait]
impl AbstractService for MathService {
    fn name(&self) -> String {
        "Math".to_string()
    }
    fn version(&self) -> String {
        "1.0.0".to_string()
    }
    fn path(&self) -> String {
        "math".to_string()
    }
    fn description(&self) -> String {
        "Arithmetic over the bus".to_string()
    }
    fn network_id(&self) -> Option<String> {
        self.network_id.clone()
    }
    fn set_network_id(&mut self, network_id: String) {
        self.network_id = Some(network_id);
    }

    async fn init(&self, ctx: LifecycleContext) -> Result<(), String> {
        ctx.register_action(
            "add",
            Arc::new(|payload, req_ctx| {
                Box::pin(async move {
                    let request: AddRequest = payload.as_type().map_err(|e| e.to_string())?;
                    let sum = request.a + request.b;
                    // Best-effort notification; the response does not depend on it.
                    let _ = req_ctx
                        .publish("added", Some(TypedValue::from(json!({ "sum": sum }))))
                        .await;
                    Ok(TypedValue::from(json!({ "sum": sum })))
                })
            }),
        )
        .map_err(|e| e.to_string())
    }

    async fn start(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }

    async fn stop(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
}

/// Inert service used for registry introspection and pause/resume tests
pub struct DummyService {
    network_id: Option<String>,
}

impl DummyService {
    pub fn new() -> Self {
        Self { network_id: None }
    }
}

impl Default for DummyService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AbstractService for DummyService {
    fn name(&self) -> String {
        "Dummy".to_string()
    }
    fn version(&self) -> String {
        "1.0.0".to_string()
    }
    fn path(&self) -> String {
        "dummy".to_string()
    }
    fn description(&self) -> String {
        "Does nothing, observably".to_string()
    }
    fn network_id(&self) -> Option<String> {
        self.network_id.clone()
    }
    fn set_network_id(&mut self, network_id: String) {
        self.network_id = Some(network_id);
    }

    async fn init(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
    async fn start(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
    async fn stop(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
}

/// Service whose `start` fails, for lifecycle error-path tests
pub struct BrokenService {
    network_id: Option<String>,
}

impl BrokenService {
    pub fn new() -> Self {
        Self { network_id: None }
    }
}

#[async_trait]
impl AbstractService for BrokenService {
    fn name(&self) -> String {
        "Broken".to_string()
    }
    fn version(&self) -> String {
        "0.1.0".to_string()
    }
    fn path(&self) -> String {
        "broken".to_string()
    }
    fn description(&self) -> String {
        "Fails to start".to_string()
    }
    fn network_id(&self) -> Option<String> {
        self.network_id.clone()
    }
    fn set_network_id(&mut self, network_id: String) {
        self.network_id = Some(network_id);
    }

    async fn init(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
    async fn start(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Err("refusing to start".to_string())
    }
    async fn stop(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
}

/// Service whose `start` sleeps, for start-timeout tests
pub struct SlowService {
    network_id: Option<String>,
    delay: Duration,
}

impl SlowService {
    pub fn new(delay: Duration) -> Self {
        Self {
            network_id: None,
            delay,
        }
    }
}

#[async_trait]
impl AbstractService for SlowService {
    fn name(&self) -> String {
        "Slow".to_string()
    }
    fn version(&self) -> String {
        "0.1.0".to_string()
    }
    fn path(&self) -> String {
        "slow".to_string()
    }
    fn description(&self) -> String {
        "Takes its time starting".to_string()
    }
    fn network_id(&self) -> Option<String> {
        self.network_id.clone()
    }
    fn set_network_id(&mut self, network_id: String) {
        self.network_id = Some(network_id);
    }

    async fn init(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
    async fn start(&self, _ctx: LifecycleContext) -> Result<(), String> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
    async fn stop(&self, _ctx: LifecycleContext) -> Result<(), String> {
        Ok(())
    }
}

/// In-process transport that answers `remote/inc` with `{y: x + 1}`
pub struct LoopbackTransport;

#[async_trait]
impl RemoteTransport for LoopbackTransport {
    async fn start(&self) -> Result<(), String> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), String> {
        Ok(())
    }

    async fn request(&self, path: &str, payload: Vec<u8>) -> Result<Vec<u8>, String> {
        let ctx = SerializationContext::plaintext();
        let value = TypedValue::deserialize(&payload, &ctx).map_err(|e| e.to_string())?;
        if path.ends_with("remote/inc") {
            let x = value
                .as_json()
                .get("x")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| "missing x".to_string())?;
            let response = TypedValue::from(json!({ "y": x + 1 }));
            response.serialize(&ctx).map_err(|e| e.to_string())
        } else {
            Err(format!("no remote handler for {path}"))
        }
    }
}

/// Transport that never answers, for request-timeout tests
pub struct StalledTransport;

#[async_trait]
impl RemoteTransport for StalledTransport {
    async fn start(&self) -> Result<(), String> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), String> {
        Ok(())
    }

    async fn request(&self, _path: &str, _payload: Vec<u8>) -> Result<Vec<u8>, String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err("unreachable".to_string())
    }
}

/// Transport whose requests always fail
pub struct FailingTransport;

#[async_trait]
impl RemoteTransport for FailingTransport {
    async fn start(&self) -> Result<(), String> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), String> {
        Ok(())
    }

    async fn request(&self, path: &str, _payload: Vec<u8>) -> Result<Vec<u8>, String> {
        Err(format!("unreachable peer for {path}"))
    }
}
