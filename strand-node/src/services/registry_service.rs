//! Built-in registry service
//!
//! Exposes service introspection and pause/resume over the bus itself, under
//! the reserved `$registry` service path. The node constructs and registers
//! this service once, during `start`, before any user service comes up.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use strand_common::TypedValue;

use crate::node::Node;
use crate::routing::TopicPath;
use crate::services::abstract_service::{AbstractService, ServiceState};
use crate::services::service_registry::ServiceEntry;
use crate::services::{ActionHandler, LifecycleContext};

/// Reserved service path of the registry service
pub const REGISTRY_SERVICE_PATH: &str = "$registry";

/// Introspection record for a local service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMetadata {
    /// Network the service is bound to
    pub network_id: String,
    /// Service path
    pub service_path: String,
    /// Service name
    pub name: String,
    /// Service version
    pub version: String,
    /// Service description
    pub description: String,
    /// Registered action paths
    pub actions: Vec<String>,
    /// Registration time, milliseconds since the epoch
    pub registration_time: u64,
    /// Last successful start time, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_start_time: Option<u64>,
}

impl ServiceMetadata {
    fn from_entry(entry: &ServiceEntry, actions: Vec<String>) -> Self {
        Self {
            network_id: entry.service_topic.network_id().to_string(),
            service_path: entry.service_topic.service_path().to_string(),
            name: entry.service.name(),
            version: entry.service.version(),
            description: entry.service.description(),
            actions,
            registration_time: entry.registration_time,
            last_start_time: entry.last_start_time,
        }
    }
}

/// The built-in `$registry` service
pub struct RegistryService {
    network_id: Option<String>,
    node: Node,
}

impl RegistryService {
    pub(crate) fn new(node: Node, network_id: String) -> Self {
        Self {
            network_id: Some(network_id),
            node,
        }
    }

    fn metadata_for(node: &Node, entry: &ServiceEntry) -> ServiceMetadata {
        let actions = node.registry().actions_for(entry.service_topic.service_path());
        ServiceMetadata::from_entry(entry, actions)
    }

    /// Resolve the `{service_path}` parameter into a service topic
    fn param_service_topic(
        ctx_network: &str,
        params: &std::collections::HashMap<String, String>,
    ) -> Result<TopicPath, String> {
        let service_path = params
            .get("service_path")
            .ok_or_else(|| "missing service_path parameter".to_string())?;
        Ok(TopicPath::new_service(ctx_network, service_path))
    }

    fn list_handler(&self) -> ActionHandler {
        let node = self.node.clone();
        Arc::new(move |_payload, _ctx| {
            let node = node.clone();
            Box::pin(async move {
                let services: Vec<ServiceMetadata> = node
                    .registry()
                    .get_local_services()
                    .iter()
                    .map(|entry| Self::metadata_for(&node, entry))
                    .collect();
                TypedValue::from_typed(services).map_err(|e| e.to_string())
            })
        })
    }

    fn info_handler(&self) -> ActionHandler {
        let node = self.node.clone();
        Arc::new(move |_payload, ctx| {
            let node = node.clone();
            Box::pin(async move {
                let topic =
                    Self::param_service_topic(ctx.topic_path.network_id(), &ctx.path_params)?;
                match node.registry().get_local_service(&topic) {
                    Some(entry) => TypedValue::from_typed(Self::metadata_for(&node, &entry))
                        .map_err(|e| e.to_string()),
                    None => Ok(TypedValue::null()),
                }
            })
        })
    }

    fn state_handler(&self) -> ActionHandler {
        let node = self.node.clone();
        Arc::new(move |_payload, ctx| {
            let node = node.clone();
            Box::pin(async move {
                let topic =
                    Self::param_service_topic(ctx.topic_path.network_id(), &ctx.path_params)?;
                let state = node
                    .registry()
                    .get_local_service_state(&topic)
                    .unwrap_or(ServiceState::Unknown);
                Ok(TypedValue::from(json!({
                    "service_path": topic.service_path(),
                    "state": state.to_string(),
                })))
            })
        })
    }

    fn pause_handler(&self) -> ActionHandler {
        let node = self.node.clone();
        Arc::new(move |_payload, ctx| {
            let node = node.clone();
            Box::pin(async move {
                let topic =
                    Self::param_service_topic(ctx.topic_path.network_id(), &ctx.path_params)?;
                node.registry()
                    .validate_pause_transition(&topic)
                    .map_err(|e| e.to_string())?;
                let state = node
                    .registry()
                    .update_service_state(&topic, ServiceState::Paused)
                    .map_err(|e| e.to_string())?;
                ctx.info(format!("Paused service {}", topic.service_path()));
                Ok(TypedValue::from(json!(state.to_string())))
            })
        })
    }

    fn resume_handler(&self) -> ActionHandler {
        let node = self.node.clone();
        Arc::new(move |_payload, ctx| {
            let node = node.clone();
            Box::pin(async move {
                let topic =
                    Self::param_service_topic(ctx.topic_path.network_id(), &ctx.path_params)?;
                node.registry()
                    .validate_resume_transition(&topic)
                    .map_err(|e| e.to_string())?;
                let state = node
                    .registry()
                    .update_service_state(&topic, ServiceState::Running)
                    .map_err(|e| e.to_string())?;
                ctx.info(format!("Resumed service {}", topic.service_path()));
                Ok(TypedValue::from(json!(state.to_string())))
            })
        })
    }
}

#[async_trait]
impl AbstractService for RegistryService {
    fn name(&self) -> String {
        "Registry".to_string()
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn path(&self) -> String {
        REGISTRY_SERVICE_PATH.to_string()
    }

    fn description(&self) -> String {
        "Service introspection and lifecycle control".to_string()
    }

    fn network_id(&self) -> Option<String> {
        self.network_id.clone()
    }

    fn set_network_id(&mut self, network_id: String) {
        self.network_id = Some(network_id);
    }

    async fn init(&self, ctx: LifecycleContext) -> Result<(), String> {
        // Order matters for specificity only in documentation; the trie
        // ranks literal segments ahead of template parameters either way.
        ctx.register_action("services/list", self.list_handler())
            .map_err(|e| e.to_string())?;
        ctx.register_action("services/{service_path}", self.info_handler())
            .map_err(|e| e.to_string())?;
        ctx.register_action("services/{service_path}/state", self.state_handler())
            .map_err(|e| e.to_string())?;
        ctx.register_action("services/{service_path}/pause", self.pause_handler())
            .map_err(|e| e.to_string())?;
        ctx.register_action("services/{service_path}/resume", self.resume_handler())
            .map_err(|e| e.to_string())?;
        ctx.debug("Registry service actions registered");
        Ok(())
    }

    async fn start(&self, ctx: LifecycleContext) -> Result<(), String> {
        ctx.debug("Registry service started");
        Ok(())
    }

    async fn stop(&self, ctx: LifecycleContext) -> Result<(), String> {
        ctx.debug("Registry service stopped");
        Ok(())
    }
}
