//! Service registry
//!
//! Holds the action-handler trie, the subscription trie with its id maps,
//! the local service entries, and lifecycle state. The node is the single
//! writer; locks are never held across await points.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{NodeError, NodeResult};
use crate::routing::{PathTrie, PathTrieMatch, TopicPath};
use crate::services::abstract_service::{AbstractService, ServiceState};
use crate::services::{ActionHandler, EventSubscriber};

/// A service registered on the local node
#[derive(Clone)]
pub struct ServiceEntry {
    /// The service implementation
    pub service: Arc<dyn AbstractService>,
    /// Service topic (network id + service path)
    pub service_topic: TopicPath,
    /// Current lifecycle state
    pub state: ServiceState,
    /// Registration wall-clock time, milliseconds since the epoch
    pub registration_time: u64,
    /// Last successful start time, if any
    pub last_start_time: Option<u64>,
}

/// Where a subscription was created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Created by local code on this node
    Local,
    /// Mirrored on behalf of a remote peer
    Remote,
}

/// Descriptive metadata recorded with a subscription
#[derive(Debug, Clone)]
pub struct SubscriptionMetadata {
    /// The pattern string the subscriber asked for
    pub path: String,
}

/// A registered event subscription
#[derive(Clone)]
pub struct SubscriptionEntry {
    /// Opaque id handed back from `subscribe`
    pub id: Uuid,
    /// Local or remote origin
    pub kind: SubscriptionKind,
    /// Descriptive metadata
    pub metadata: SubscriptionMetadata,
    /// Topic of the service the subscription belongs to
    pub service_topic: TopicPath,
    /// Delivery callback
    pub subscriber: EventSubscriber,
}

/// Registry of handlers, subscriptions, and local services
pub struct ServiceRegistry {
    action_handlers: RwLock<PathTrie<ActionHandler>>,
    subscriptions: RwLock<PathTrie<SubscriptionEntry>>,
    // id -> registered pattern, for O(matches-at-leaf) unsubscribe
    subscription_patterns: DashMap<Uuid, TopicPath>,
    // service topic string -> entry
    local_services: RwLock<HashMap<String, ServiceEntry>>,
    // service path -> registered action paths, for introspection
    service_actions: DashMap<String, Vec<String>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            action_handlers: RwLock::new(PathTrie::new()),
            subscriptions: RwLock::new(PathTrie::new()),
            subscription_patterns: DashMap::new(),
            local_services: RwLock::new(HashMap::new()),
            service_actions: DashMap::new(),
        }
    }

    /// Register an action handler under a (possibly templated) topic
    pub fn add_local_action_handler(&self, topic: &TopicPath, handler: ActionHandler) {
        self.action_handlers.write().set_value(topic, handler);
        let action_path = topic.action_path();
        if !action_path.is_empty() {
            self.service_actions
                .entry(topic.service_path().to_string())
                .or_default()
                .push(action_path);
        }
    }

    /// Handlers whose registered pattern matches the concrete topic,
    /// most-specific-first, with template bindings
    pub fn find_local_action_handlers(
        &self,
        concrete_topic: &TopicPath,
    ) -> Vec<PathTrieMatch<ActionHandler>> {
        self.action_handlers.read().find_matches(concrete_topic)
    }

    /// Action paths registered for a service, for introspection
    pub fn actions_for(&self, service_path: &str) -> Vec<String> {
        self.service_actions
            .get(service_path)
            .map(|actions| actions.value().clone())
            .unwrap_or_default()
    }

    /// Record an event subscription; returns its id
    pub fn subscribe(
        &self,
        topic_pattern: &TopicPath,
        service_topic: TopicPath,
        subscriber: EventSubscriber,
        metadata: SubscriptionMetadata,
        kind: SubscriptionKind,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let entry = SubscriptionEntry {
            id,
            kind,
            metadata,
            service_topic,
            subscriber,
        };
        self.subscriptions.write().set_value(topic_pattern, entry);
        self.subscription_patterns.insert(id, topic_pattern.clone());
        id
    }

    /// Remove a subscription; true when the id was known
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        let Some((_, pattern)) = self.subscription_patterns.remove(id) else {
            return false;
        };
        let removed = self
            .subscriptions
            .write()
            .retain_values(&pattern, |entry| entry.id != *id);
        removed > 0
    }

    /// Subscriptions whose registered pattern matches the concrete topic
    pub fn get_subscribers(&self, concrete_topic: &TopicPath) -> Vec<SubscriptionEntry> {
        self.subscriptions
            .read()
            .find_matches(concrete_topic)
            .into_iter()
            .map(|matched| matched.content)
            .collect()
    }

    /// Add a local service entry
    pub fn add_local_service(&self, entry: ServiceEntry) -> NodeResult<()> {
        let key = entry.service_topic.as_string();
        let mut services = self.local_services.write();
        if services.contains_key(&key) {
            return Err(NodeError::Registration(format!(
                "service already registered at {key}"
            )));
        }
        services.insert(key, entry);
        Ok(())
    }

    /// Snapshot of all local service entries
    pub fn get_local_services(&self) -> Vec<ServiceEntry> {
        let mut entries: Vec<ServiceEntry> = self.local_services.read().values().cloned().collect();
        entries.sort_by_key(|entry| entry.registration_time);
        entries
    }

    /// Entry for one service topic
    pub fn get_local_service(&self, service_topic: &TopicPath) -> Option<ServiceEntry> {
        self.local_services
            .read()
            .get(&service_topic.as_string())
            .cloned()
    }

    /// Lifecycle state for one service topic
    pub fn get_local_service_state(&self, service_topic: &TopicPath) -> Option<ServiceState> {
        self.local_services
            .read()
            .get(&service_topic.as_string())
            .map(|entry| entry.state)
    }

    /// Apply a lifecycle transition, enforcing the state machine
    ///
    /// Returns the new state, or `InvalidServiceState` carrying the current
    /// state when the machine rejects the transition.
    pub fn update_service_state(
        &self,
        service_topic: &TopicPath,
        new_state: ServiceState,
    ) -> NodeResult<ServiceState> {
        let mut services = self.local_services.write();
        let entry = services
            .get_mut(&service_topic.as_string())
            .ok_or_else(|| NodeError::NotFound(service_topic.as_string()))?;
        if !entry.state.can_transition_to(new_state) {
            return Err(NodeError::InvalidServiceState(entry.state));
        }
        entry.state = new_state;
        Ok(new_state)
    }

    /// Stamp the last successful start time
    pub fn record_start_time(&self, service_topic: &TopicPath, timestamp_ms: u64) {
        if let Some(entry) = self
            .local_services
            .write()
            .get_mut(&service_topic.as_string())
        {
            entry.last_start_time = Some(timestamp_ms);
        }
    }

    /// Fail unless the service is Running (the only state pause is valid from)
    pub fn validate_pause_transition(&self, service_topic: &TopicPath) -> NodeResult<()> {
        match self.get_local_service_state(service_topic) {
            Some(ServiceState::Running) => Ok(()),
            Some(state) => Err(NodeError::InvalidServiceState(state)),
            None => Err(NodeError::NotFound(service_topic.as_string())),
        }
    }

    /// Fail unless the service is Paused (the only state resume is valid from)
    pub fn validate_resume_transition(&self, service_topic: &TopicPath) -> NodeResult<()> {
        match self.get_local_service_state(service_topic) {
            Some(ServiceState::Paused) => Ok(()),
            Some(state) => Err(NodeError::InvalidServiceState(state)),
            None => Err(NodeError::NotFound(service_topic.as_string())),
        }
    }
}
