//! Node dispatcher
//!
//! The node owns the service registry, the retained-event store, and the
//! keystore handle. It orchestrates service lifecycle, routes requests to
//! local handlers or the remote transport, fans events out to subscribers,
//! and replays retained history to late subscribers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use uuid::Uuid;

use strand_common::{Component, ScopedLogger, SerializationContext, TypedValue};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::network::RemoteTransport;
use crate::routing::{PathTrie, TopicPath};
use crate::services::registry_service::{RegistryService, REGISTRY_SERVICE_PATH};
use crate::services::service_registry::ServiceRegistry;
use crate::services::{
    is_internal_service_path, AbstractService, EventContext, EventSubscriber, LifecycleContext,
    RequestContext, ServiceEntry, ServiceState, SubscriptionKind, SubscriptionMetadata,
};

/// Options for a publish
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Keep the event in the retained store for late subscribers
    pub retain: bool,
}

impl PublishOptions {
    /// Options with retention enabled
    pub fn retained() -> Self {
        Self { retain: true }
    }
}

/// Options for a subscribe
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// Replay matching retained events to the new subscriber
    pub include_past: bool,
}

/// Options for the one-shot `on` helper
#[derive(Debug, Clone, Copy, Default)]
pub struct OnOptions {
    /// Give up after this long, resolving with `None`
    pub timeout: Option<Duration>,
    /// Let a retained replay satisfy the wait
    pub include_past: bool,
}

/// An event as delivered to subscribers
#[derive(Debug, Clone)]
pub struct EventMessage {
    /// Service path the event was published under
    pub service: String,
    /// Event name (action path of the topic)
    pub event: String,
    /// Event payload
    pub payload: Option<TypedValue>,
    /// Publish wall-clock time, milliseconds since the epoch
    pub timestamp_ms: u64,
}

/// A retained event awaiting late subscribers
#[derive(Debug, Clone)]
pub struct RetainedEvent {
    /// Publish wall-clock time, milliseconds since the epoch
    pub timestamp_ms: u64,
    /// Event name (action path of the topic)
    pub event_name: String,
    /// Event payload
    pub payload: Option<TypedValue>,
    // Node-wide retention order; breaks timestamp ties during replay.
    pub(crate) sequence: u64,
}

struct NodeInner {
    config: NodeConfig,
    registry: ServiceRegistry,
    running: AtomicBool,
    // Retained events by canonical topic string, oldest first.
    retained_events: Mutex<HashMap<String, VecDeque<RetainedEvent>>>,
    // Reverse index: topic pattern -> canonical key, for wildcard clears
    // and include_past replay.
    retained_index: Mutex<PathTrie<String>>,
    // key -> topic, to remove index entries without re-parsing keys.
    retained_topics: Mutex<HashMap<String, TopicPath>>,
    retained_seq: AtomicU64,
    remote_transport: Mutex<Option<Arc<dyn RemoteTransport>>>,
    logger: ScopedLogger,
}

/// The local service bus
///
/// Cheap to clone; all clones share one dispatcher. Contexts handed to
/// services carry a clone for re-entrant requests and publishes.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Build a node from configuration
    pub fn new(config: NodeConfig) -> Self {
        let logger = ScopedLogger::new(Component::Node, config.default_network_id.clone());
        let remote_transport = Mutex::new(config.remote_transport.clone());
        Self {
            inner: Arc::new(NodeInner {
                config,
                registry: ServiceRegistry::new(),
                running: AtomicBool::new(false),
                retained_events: Mutex::new(HashMap::new()),
                retained_index: Mutex::new(PathTrie::new()),
                retained_topics: Mutex::new(HashMap::new()),
                retained_seq: AtomicU64::new(0),
                remote_transport,
                logger,
            }),
        }
    }

    /// The network id assumed for unqualified paths
    pub fn network_id(&self) -> &str {
        &self.inner.config.default_network_id
    }

    /// Whether `start` has completed and `stop` has not run
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub(crate) fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    /// Install a remote transport adapter; only meaningful before `start`
    pub fn set_remote_transport(&self, transport: Arc<dyn RemoteTransport>) {
        *self.inner.remote_transport.lock() = Some(transport);
    }

    /// Register a service; must happen before `start`
    pub fn add_service<S: AbstractService + 'static>(&self, mut service: S) -> NodeResult<()> {
        if self.is_running() {
            return Err(NodeError::Registration(
                "services must be added before the node starts".to_string(),
            ));
        }
        let path = service.path();
        if path.is_empty() {
            return Err(NodeError::Registration("service path is empty".to_string()));
        }
        if is_internal_service_path(&path) {
            return Err(NodeError::Registration(format!(
                "service path '{path}' uses a reserved internal prefix"
            )));
        }
        if service.network_id().is_none() {
            service.set_network_id(self.network_id().to_string());
        }
        let network_id = service
            .network_id()
            .unwrap_or_else(|| self.network_id().to_string());
        let service_topic = TopicPath::new_service(network_id, path);
        self.inner.registry.add_local_service(ServiceEntry {
            service: Arc::new(service),
            service_topic,
            state: ServiceState::Created,
            registration_time: now_ms(),
            last_start_time: None,
        })
    }

    /// Start the node
    ///
    /// Brings up the built-in registry service, then internal services, then
    /// marks the node running and starts all user services concurrently,
    /// each under the configured start timeout. A service that fails or
    /// times out is set to Error and logged; it never blocks the others.
    pub async fn start(&self) -> NodeResult<()> {
        if self.is_running() {
            return Err(NodeError::AlreadyStarted);
        }
        self.inner.logger.info("Starting node");

        if let Some(transport) = self.inner.remote_transport.lock().clone() {
            transport.start().await.map_err(NodeError::RemoteError)?;
        }

        // Single registration path for the built-in registry service: it is
        // constructed here, before any user service is examined.
        let registry_service =
            RegistryService::new(self.clone(), self.network_id().to_string());
        let registry_topic = TopicPath::new_service(self.network_id(), REGISTRY_SERVICE_PATH);
        self.inner.registry.add_local_service(ServiceEntry {
            service: Arc::new(registry_service),
            service_topic: registry_topic.clone(),
            state: ServiceState::Created,
            registration_time: now_ms(),
            last_start_time: None,
        })?;

        let entries = self.inner.registry.get_local_services();
        let (internal, user): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| is_internal_service_path(entry.service_topic.service_path()));

        // Internal services come up synchronously, before anything else.
        for entry in internal {
            if let Err(e) = self.bring_up_service(&entry).await {
                self.inner.logger.error(format!(
                    "Internal service {} failed to start: {e}",
                    entry.service_topic.as_string()
                ));
                let _ = self
                    .inner
                    .registry
                    .update_service_state(&entry.service_topic, ServiceState::Error);
                return Err(NodeError::Registration(format!(
                    "internal service {} failed: {e}",
                    entry.service_topic.service_path()
                )));
            }
        }

        self.inner.running.store(true, Ordering::SeqCst);

        let start_timeout = Duration::from_millis(self.inner.config.service_start_timeout_ms);
        let bring_ups = user.into_iter().map(|entry| {
            let node = self.clone();
            async move {
                let topic = entry.service_topic.clone();
                match tokio::time::timeout(start_timeout, node.bring_up_service(&entry)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        node.inner.logger.warn(format!(
                            "Service {} failed to start: {e}",
                            topic.as_string()
                        ));
                        let _ = node
                            .inner
                            .registry
                            .update_service_state(&topic, ServiceState::Error);
                    }
                    Err(_) => {
                        node.inner.logger.warn(format!(
                            "Service {} start timed out after {start_timeout:?}",
                            topic.as_string()
                        ));
                        let _ = node
                            .inner
                            .registry
                            .update_service_state(&topic, ServiceState::Error);
                    }
                }
            }
        });
        join_all(bring_ups).await;

        self.inner.logger.info("Node started");
        Ok(())
    }

    /// Initialize (when still Created) and start one service
    async fn bring_up_service(&self, entry: &ServiceEntry) -> Result<(), String> {
        let topic = &entry.service_topic;
        let ctx = LifecycleContext::new(self.clone(), topic);

        let state = self
            .inner
            .registry
            .get_local_service_state(topic)
            .unwrap_or(ServiceState::Unknown);
        if state == ServiceState::Created {
            entry.service.init(ctx.clone()).await?;
            self.inner
                .registry
                .update_service_state(topic, ServiceState::Initialized)
                .map_err(|e| e.to_string())?;
        }

        entry.service.start(ctx).await?;
        self.inner
            .registry
            .update_service_state(topic, ServiceState::Running)
            .map_err(|e| e.to_string())?;
        self.inner.registry.record_start_time(topic, now_ms());
        Ok(())
    }

    /// Stop the node
    ///
    /// Marks the node not running, then stops every service. Stop failures
    /// and rejected state transitions are logged, never propagated.
    pub async fn stop(&self) -> NodeResult<()> {
        if !self.is_running() {
            return Ok(());
        }
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.logger.info("Stopping node");

        for entry in self.inner.registry.get_local_services() {
            let ctx = LifecycleContext::new(self.clone(), &entry.service_topic);
            if let Err(e) = entry.service.stop(ctx).await {
                self.inner.logger.warn(format!(
                    "Service {} stop failed: {e}",
                    entry.service_topic.as_string()
                ));
            }
            if let Err(e) = self
                .inner
                .registry
                .update_service_state(&entry.service_topic, ServiceState::Stopped)
            {
                self.inner.logger.warn(format!(
                    "Service {} not marked Stopped: {e}",
                    entry.service_topic.as_string()
                ));
            }
        }

        if let Some(transport) = self.inner.remote_transport.lock().clone() {
            if let Err(e) = transport.stop().await {
                self.inner.logger.warn(format!("Remote transport stop failed: {e}"));
            }
        }

        self.inner.logger.info("Node stopped");
        Ok(())
    }

    /// Route a request to a local handler, falling back to the remote
    /// transport when no local handler resolves it
    pub async fn request(&self, path: &str, payload: TypedValue) -> NodeResult<TypedValue> {
        if !self.is_running() {
            return Err(NodeError::NotStarted);
        }
        let topic = TopicPath::parse(path, self.network_id())?;
        if !topic.is_concrete() {
            return Err(NodeError::InvalidTopic(format!(
                "request paths must be concrete: '{path}'"
            )));
        }

        let service_topic = topic.service_topic();
        match self.inner.registry.get_local_service_state(&service_topic) {
            Some(ServiceState::Running) => {}
            Some(state) => {
                // Local owner exists but is not serving; give the network a
                // chance before surfacing the local state.
                return match self.remote_request(&topic, &payload).await {
                    Ok(response) => Ok(response),
                    Err(_) => Err(NodeError::InvalidServiceState(state)),
                };
            }
            None => return self.remote_request(&topic, &payload).await,
        }

        let handlers = self.inner.registry.find_local_action_handlers(&topic);
        let Some(matched) = handlers.into_iter().next() else {
            return self.remote_request(&topic, &payload).await;
        };

        let ctx = RequestContext::new(self.clone(), topic, matched.params);
        (matched.content)(payload, ctx)
            .await
            .map_err(NodeError::HandlerError)
    }

    /// Forward a request through the remote transport adapter
    ///
    /// Remote calls are bounded by the configured request timeout; local
    /// handler invocations are not.
    async fn remote_request(
        &self,
        topic: &TopicPath,
        payload: &TypedValue,
    ) -> NodeResult<TypedValue> {
        let Some(transport) = self.inner.remote_transport.lock().clone() else {
            return Err(NodeError::NoHandler(topic.as_string()));
        };
        let ctx = self.serialization_context();
        let bytes = payload.serialize(&ctx)?;
        let deadline = Duration::from_millis(self.inner.config.request_timeout_ms);
        let response = tokio::time::timeout(deadline, transport.request(&topic.as_string(), bytes))
            .await
            .map_err(|_| NodeError::Timeout)?
            .map_err(NodeError::RemoteError)?;
        Ok(TypedValue::deserialize(&response, &ctx)?)
    }

    /// Publish an event to local subscribers
    pub async fn publish(&self, topic: &str, data: Option<TypedValue>) -> NodeResult<()> {
        self.publish_with_options(topic, data, PublishOptions::default())
            .await
    }

    /// Publish an event, optionally retaining it for late subscribers
    ///
    /// Subscribers run concurrently and are all awaited; one failing
    /// subscriber is logged and never aborts the others.
    pub async fn publish_with_options(
        &self,
        topic: &str,
        data: Option<TypedValue>,
        options: PublishOptions,
    ) -> NodeResult<()> {
        if !self.is_running() {
            return Err(NodeError::NotStarted);
        }
        let topic = TopicPath::parse(topic, self.network_id())?;
        if !topic.is_concrete() {
            return Err(NodeError::InvalidTopic(format!(
                "publish topics must be concrete: '{}'",
                topic.as_string()
            )));
        }

        let subscribers = self.inner.registry.get_subscribers(&topic);
        let message = EventMessage {
            service: topic.service_path().to_string(),
            event: topic.action_path(),
            payload: data,
            timestamp_ms: now_ms(),
        };

        let deliveries = subscribers.into_iter().map(|entry| {
            let ctx = EventContext::new(self.clone(), topic.clone());
            let payload = message.payload.clone();
            let logger = self.inner.logger.clone();
            let event_topic = topic.as_string();
            async move {
                if let Err(e) = (entry.subscriber)(ctx, payload).await {
                    logger.warn(format!(
                        "Subscriber {} failed on {event_topic}: {e}",
                        entry.id
                    ));
                }
            }
        });
        join_all(deliveries).await;

        if options.retain {
            self.retain_event(&topic, &message);
        }
        Ok(())
    }

    fn retain_event(&self, topic: &TopicPath, message: &EventMessage) {
        let key = topic.as_string();
        let max = self.inner.config.max_retained_per_topic;

        let sequence = self.inner.retained_seq.fetch_add(1, Ordering::SeqCst);
        let mut store = self.inner.retained_events.lock();
        let events = store.entry(key.clone()).or_default();
        events.push_back(RetainedEvent {
            timestamp_ms: message.timestamp_ms,
            event_name: message.event.clone(),
            payload: message.payload.clone(),
            sequence,
        });
        while events.len() > max {
            events.pop_front();
        }
        drop(store);

        let mut topics = self.inner.retained_topics.lock();
        if !topics.contains_key(&key) {
            topics.insert(key.clone(), topic.clone());
            self.inner.retained_index.lock().set_value(topic, key);
        }
    }

    /// Subscribe to events matching a pattern
    pub async fn subscribe(
        &self,
        topic_pattern: &str,
        subscriber: EventSubscriber,
    ) -> NodeResult<Uuid> {
        self.subscribe_with_options(topic_pattern, subscriber, SubscribeOptions::default())
            .await
    }

    /// Subscribe, optionally replaying matching retained events
    pub async fn subscribe_with_options(
        &self,
        topic_pattern: &str,
        subscriber: EventSubscriber,
        options: SubscribeOptions,
    ) -> NodeResult<Uuid> {
        let pattern = TopicPath::parse(topic_pattern, self.network_id())?;
        let service_topic = pattern.service_topic();
        self.subscribe_as(pattern, service_topic, subscriber, options)
            .await
    }

    pub(crate) async fn subscribe_as(
        &self,
        pattern: TopicPath,
        service_topic: TopicPath,
        subscriber: EventSubscriber,
        options: SubscribeOptions,
    ) -> NodeResult<Uuid> {
        let id = self.inner.registry.subscribe(
            &pattern,
            service_topic,
            subscriber.clone(),
            SubscriptionMetadata {
                path: pattern.as_string(),
            },
            SubscriptionKind::Local,
        );
        if options.include_past {
            self.replay_retained(&pattern, subscriber);
        }
        Ok(id)
    }

    /// Deliver matching retained events to one subscriber, oldest first
    ///
    /// Runs on a spawned task; live publishes may interleave with the
    /// replay. Delivery failures are logged and do not stop the replay.
    fn replay_retained(&self, pattern: &TopicPath, subscriber: EventSubscriber) {
        let keys = self.inner.retained_index.lock().find_wildcard_matches(pattern);
        if keys.is_empty() {
            return;
        }

        let mut events: Vec<(TopicPath, RetainedEvent)> = Vec::new();
        {
            let store = self.inner.retained_events.lock();
            let topics = self.inner.retained_topics.lock();
            for key in keys {
                if let (Some(list), Some(topic)) = (store.get(&key), topics.get(&key)) {
                    events.extend(list.iter().cloned().map(|event| (topic.clone(), event)));
                }
            }
        }
        events.sort_by_key(|(_, event)| (event.timestamp_ms, event.sequence));

        let node = self.clone();
        tokio::spawn(async move {
            for (topic, event) in events {
                let ctx = EventContext::new(node.clone(), topic.clone());
                if let Err(e) = (subscriber)(ctx, event.payload.clone()).await {
                    node.inner.logger.warn(format!(
                        "Retained replay to subscriber failed on {}: {e}",
                        topic.as_string()
                    ));
                }
            }
        });
    }

    /// Remove a subscription
    pub async fn unsubscribe(&self, id: Uuid) -> NodeResult<()> {
        if self.inner.registry.unsubscribe(&id) {
            Ok(())
        } else {
            Err(NodeError::NotFound(id.to_string()))
        }
    }

    /// Wait for the next event on a topic
    ///
    /// Subscribes, resolves with the first delivered payload, and always
    /// unsubscribes. With `include_past`, a retained replay can satisfy the
    /// wait. A configured timeout resolves with `None` on expiry.
    pub async fn on(&self, topic: &str, options: OnOptions) -> NodeResult<Option<TypedValue>> {
        let (tx, rx) = tokio::sync::oneshot::channel::<TypedValue>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let subscriber: EventSubscriber = Arc::new(move |_ctx, payload| {
            let tx = tx.clone();
            Box::pin(async move {
                if let Some(sender) = tx.lock().take() {
                    let _ = sender.send(payload.unwrap_or_else(TypedValue::null));
                }
                Ok(())
            })
        });

        let id = self
            .subscribe_with_options(
                topic,
                subscriber,
                SubscribeOptions {
                    include_past: options.include_past,
                },
            )
            .await?;

        let received = match options.timeout {
            Some(duration) => match tokio::time::timeout(duration, rx).await {
                Ok(Ok(value)) => Some(value),
                Ok(Err(_)) | Err(_) => None,
            },
            None => rx.await.ok(),
        };

        let _ = self.unsubscribe(id).await;
        Ok(received)
    }

    /// Drop retained events whose topic matches the pattern
    ///
    /// Returns the number of topic keys cleared.
    pub fn clear_retained_events_matching(&self, pattern: &str) -> NodeResult<usize> {
        let pattern = TopicPath::parse(pattern, self.network_id())?;
        let keys = self.inner.retained_index.lock().find_wildcard_matches(&pattern);

        let mut removed = 0;
        let mut store = self.inner.retained_events.lock();
        let mut topics = self.inner.retained_topics.lock();
        let mut index = self.inner.retained_index.lock();
        for key in keys {
            if store.remove(&key).is_some() {
                removed += 1;
            }
            if let Some(topic) = topics.remove(&key) {
                index.remove_values(&topic);
            }
        }
        Ok(removed)
    }

    fn serialization_context(&self) -> SerializationContext {
        let mut ctx = SerializationContext::plaintext();
        if let Some(keystore) = self.inner.config.keystore.clone() {
            ctx = ctx.with_keystore(keystore);
        }
        ctx
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
