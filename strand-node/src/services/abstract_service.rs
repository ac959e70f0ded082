//! Service trait and lifecycle states

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::LifecycleContext;

/// Lifecycle state of a registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Registered, not yet initialized
    Created,
    /// `init` completed
    Initialized,
    /// `start` completed; the service handles requests
    Running,
    /// Temporarily not handling requests
    Paused,
    /// `stop` completed
    Stopped,
    /// Initialization or start failed
    Error,
    /// State could not be determined
    Unknown,
}

impl ServiceState {
    /// Whether the lifecycle machine permits this transition
    ///
    /// Allowed: Created → Initialized → Running, Running ↔ Paused,
    /// Running → Stopped, Initialized → Stopped, any → Error.
    pub fn can_transition_to(self, next: ServiceState) -> bool {
        if next == ServiceState::Error {
            return true;
        }
        matches!(
            (self, next),
            (ServiceState::Created, ServiceState::Initialized)
                | (ServiceState::Initialized, ServiceState::Running)
                | (ServiceState::Running, ServiceState::Paused)
                | (ServiceState::Paused, ServiceState::Running)
                | (ServiceState::Running, ServiceState::Stopped)
                | (ServiceState::Initialized, ServiceState::Stopped)
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Created => "Created",
            ServiceState::Initialized => "Initialized",
            ServiceState::Running => "Running",
            ServiceState::Paused => "Paused",
            ServiceState::Stopped => "Stopped",
            ServiceState::Error => "Error",
            ServiceState::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// Trait implemented by services hosted on a node
///
/// `init` runs before the node accepts traffic for the service and is where
/// action handlers and subscriptions are registered. `start` and `stop`
/// bracket the running phase. Lifecycle errors are strings; the node decides
/// how to surface them.
#[async_trait]
pub trait AbstractService: Send + Sync {
    /// Human-readable service name
    fn name(&self) -> String;

    /// Service version string
    fn version(&self) -> String;

    /// Service path (first topic segment) this service owns
    fn path(&self) -> String;

    /// One-line description for introspection
    fn description(&self) -> String;

    /// Network this service is bound to, if assigned
    fn network_id(&self) -> Option<String>;

    /// Bind the service to a network; called by the node before registration
    fn set_network_id(&mut self, network_id: String);

    /// Register handlers and subscriptions
    async fn init(&self, ctx: LifecycleContext) -> Result<(), String>;

    /// Begin serving
    async fn start(&self, ctx: LifecycleContext) -> Result<(), String>;

    /// Stop serving
    async fn stop(&self, ctx: LifecycleContext) -> Result<(), String>;
}
