//! Request context
//!
//! Handed to action handlers alongside the payload. Carries the matched
//! topic, template parameter bindings, a scoped logger, and a re-entrant
//! node handle for nested requests and publishes.

use std::collections::HashMap;

use strand_common::{Component, ScopedLogger, TypedValue};

use crate::error::NodeResult;
use crate::node::Node;
use crate::routing::TopicPath;
use crate::services::normalize_context_path;

/// Context for a single action invocation
#[derive(Clone)]
pub struct RequestContext {
    /// Complete topic path of the request
    pub topic_path: TopicPath,
    /// Template parameters captured by the matched handler pattern
    pub path_params: HashMap<String, String>,
    /// Logger scoped to the service and action
    pub logger: ScopedLogger,
    node: Node,
}

impl RequestContext {
    pub(crate) fn new(
        node: Node,
        topic_path: TopicPath,
        path_params: HashMap<String, String>,
    ) -> Self {
        let mut logger = ScopedLogger::new(Component::Service, topic_path.service_path());
        let action_path = topic_path.action_path();
        if !action_path.is_empty() {
            logger = logger.with_scope(&action_path);
        }
        Self {
            topic_path,
            path_params,
            logger,
            node,
        }
    }

    /// Make a nested request
    ///
    /// Paths without a network id or service path are completed from this
    /// context, so `request("add", …)` targets the handling service itself.
    pub async fn request(&self, path: &str, payload: TypedValue) -> NodeResult<TypedValue> {
        let full = normalize_context_path(
            path,
            self.topic_path.network_id(),
            self.topic_path.service_path(),
        );
        self.node.request(&full, payload).await
    }

    /// Publish an event from within the handler
    pub async fn publish(&self, topic: &str, data: Option<TypedValue>) -> NodeResult<()> {
        let full = normalize_context_path(
            topic,
            self.topic_path.network_id(),
            self.topic_path.service_path(),
        );
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
