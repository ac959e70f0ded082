//! Lifecycle context
//!
//! Handed to `init`/`start`/`stop`. This is where services register action
//! handlers and subscriptions and publish lifecycle events. Paths are
//! normalized against the owning service, so `register_action("add")` on the
//! `math` service binds `math/add`.

use uuid::Uuid;

use strand_common::{Component, ScopedLogger, TypedValue};

use crate::error::NodeResult;
use crate::node::{Node, SubscribeOptions};
use crate::routing::TopicPath;
use crate::services::{normalize_context_path, ActionHandler, EventSubscriber};

/// Context for service lifecycle callbacks
#[derive(Clone)]
pub struct LifecycleContext {
    /// Network the service is bound to
    pub network_id: String,
    /// Service path the context acts for
    pub service_path: String,
    /// Logger scoped to the service
    pub logger: ScopedLogger,
    node: Node,
}

impl LifecycleContext {
    pub(crate) fn new(node: Node, service_topic: &TopicPath) -> Self {
        let logger = ScopedLogger::new(Component::Service, service_topic.service_path());
        Self {
            network_id: service_topic.network_id().to_string(),
            service_path: service_topic.service_path().to_string(),
            logger,
            node,
        }
    }

    /// Register an action handler under this service
    ///
    /// The name may contain template parameters and `/` separators, e.g.
    /// `"services/{service_path}/state"`.
    pub fn register_action(&self, name: &str, handler: ActionHandler) -> NodeResult<()> {
        let topic = TopicPath::new_service(&self.network_id, &self.service_path)
            .new_action_topic(name)?;
        self.node.registry().add_local_action_handler(&topic, handler);
        self.logger.debug(format!("Registered action {}", topic.as_string()));
        Ok(())
    }

    /// Subscribe to events on behalf of this service
    pub async fn subscribe(
        &self,
        topic: &str,
        subscriber: EventSubscriber,
    ) -> NodeResult<Uuid> {
        let full = normalize_context_path(topic, &self.network_id, &self.service_path);
        let pattern = TopicPath::parse(&full, &self.network_id)?;
        let service_topic = TopicPath::new_service(&self.network_id, &self.service_path);
        self.node
            .subscribe_as(pattern, service_topic, subscriber, SubscribeOptions::default())
            .await
    }

    /// Publish an event from this service
    pub async fn publish(&self, topic: &str, data: Option<TypedValue>) -> NodeResult<()> {
        let full = normalize_context_path(topic, &self.network_id, &self.service_path);
        self.node.publish(&full, data).await
    }

    /// Log at debug level
    pub fn debug(&self, message: impl AsRef<str>) {
        self.logger.debug(message);
    }

    /// Log at info level
    pub fn info(&self, message: impl AsRef<str>) {
        self.logger.info(message);
    }

    /// Log at warn level
    pub fn warn(&self, message: impl AsRef<str>) {
        self.logger.warn(message);
    }

    /// Log at error level
    pub fn error(&self, message: impl AsRef<str>) {
        self.logger.error(message);
    }
}
