//! Event context
//!
//! Handed to event subscribers alongside the payload. Carries the event
//! topic, a scoped logger, and a re-entrant node handle so subscribers can
//! publish follow-up events or call services.

use strand_common::{Component, ScopedLogger, TypedValue};

use crate::error::NodeResult;
use crate::node::Node;
use crate::routing::TopicPath;
use crate::services::normalize_context_path;

/// Context for a single event delivery
#[derive(Clone)]
pub struct EventContext {
    /// Complete topic path of the event
    pub topic_path: TopicPath,
    /// Logger scoped to the service and event
    pub logger: ScopedLogger,
    node: Node,
}

impl EventContext {
    pub(crate) fn new(node: Node, topic_path: TopicPath) -> Self {
        let mut logger = ScopedLogger::new(Component::Service, topic_path.service_path());
        let event_path = topic_path.action_path();
        if !event_path.is_empty() {
            logger = logger.with_scope(&event_path);
        }
        Self {
            topic_path,
            logger,
            node,
        }
    }

    /// Publish a follow-up event
    pub async fn publish(&self, topic: &str, data: Option<TypedValue>) -> NodeResult<()> {
        let full = normalize_context_path(
            topic,
            self.topic_path.network_id(),
            self.topic_path.service_path(),
        );
        self.node.publish(&full, data).await
    }

    /// Make a request from within the subscriber
    pub async fn request(&self, path: &str, payload: TypedValue) -> NodeResult<TypedValue> {
        let full = normalize_context_path(
            path,
            self.topic_path.network_id(),
            self.topic_path.service_path(),
        );
        self.node.request(&full, payload).await
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
