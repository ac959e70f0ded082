//! Node configuration
//!
//! Values resolve env > explicit > defaults: construct with `new`, refine
//! with the `with_*` builders, then `apply_env_overrides` lets deployment
//! environments adjust without code changes.

use std::env;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::network::RemoteTransport;
use strand_common::Keystore;

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default per-service start timeout in milliseconds
pub const DEFAULT_SERVICE_START_TIMEOUT_MS: u64 = 30_000;

/// Default bound on retained events per topic
pub const DEFAULT_MAX_RETAINED_PER_TOPIC: usize = 100;

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "STRAND_";

/// Deployment role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// User-facing node; typically holds profile keys only
    Frontend,
    /// Infrastructure node; typically holds network keys
    Backend,
}

impl Default for NodeRole {
    fn default() -> Self {
        NodeRole::Backend
    }
}

/// Configuration for a node
#[derive(Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network id assumed when a path carries none
    pub default_network_id: String,
    /// All networks this node participates in
    pub network_ids: Vec<String>,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Per-service start timeout in milliseconds
    pub service_start_timeout_ms: u64,
    /// Bound on retained events per topic (oldest evicted first)
    pub max_retained_per_topic: usize,
    /// Deployment role
    pub role: NodeRole,
    /// Keystore capability handle
    #[serde(skip)]
    pub keystore: Option<Arc<dyn Keystore>>,
    /// Remote transport adapter
    #[serde(skip)]
    pub remote_transport: Option<Arc<dyn RemoteTransport>>,
}

impl NodeConfig {
    /// Configuration with defaults for the given default network
    pub fn new(default_network_id: impl Into<String>) -> Self {
        let default_network_id = default_network_id.into();
        Self {
            network_ids: vec![default_network_id.clone()],
            default_network_id,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            service_start_timeout_ms: DEFAULT_SERVICE_START_TIMEOUT_MS,
            max_retained_per_topic: DEFAULT_MAX_RETAINED_PER_TOPIC,
            role: NodeRole::default(),
            keystore: None,
            remote_transport: None,
        }
    }

    /// Set the participating networks
    pub fn with_network_ids(mut self, network_ids: Vec<String>) -> Self {
        self.network_ids = network_ids;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-service start timeout
    pub fn with_service_start_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.service_start_timeout_ms = timeout_ms;
        self
    }

    /// Set the retained-event bound per topic
    pub fn with_max_retained_per_topic(mut self, max: usize) -> Self {
        self.max_retained_per_topic = max;
        self
    }

    /// Set the deployment role
    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    /// Attach a keystore capability handle
    pub fn with_keystore(mut self, keystore: Arc<dyn Keystore>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    /// Attach a remote transport adapter
    pub fn with_remote_transport(mut self, transport: Arc<dyn RemoteTransport>) -> Self {
        self.remote_transport = Some(transport);
        self
    }

    /// Apply `STRAND_*` environment variable overrides
    ///
    /// Recognized: `STRAND_DEFAULT_NETWORK_ID`, `STRAND_REQUEST_TIMEOUT_MS`,
    /// `STRAND_SERVICE_START_TIMEOUT_MS`, `STRAND_MAX_RETAINED_PER_TOPIC`,
    /// `STRAND_ROLE` (`frontend` | `backend`). Unparseable values are
    /// ignored.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(value) = env::var(format!("{ENV_PREFIX}DEFAULT_NETWORK_ID")) {
            if !value.is_empty() {
                self.default_network_id = value;
            }
        }
        if let Some(value) = parse_env(format!("{ENV_PREFIX}REQUEST_TIMEOUT_MS")) {
            self.request_timeout_ms = value;
        }
        if let Some(value) = parse_env(format!("{ENV_PREFIX}SERVICE_START_TIMEOUT_MS")) {
            self.service_start_timeout_ms = value;
        }
        if let Some(value) = parse_env(format!("{ENV_PREFIX}MAX_RETAINED_PER_TOPIC")) {
            self.max_retained_per_topic = value;
        }
        if let Ok(value) = env::var(format!("{ENV_PREFIX}ROLE")) {
            match value.to_lowercase().as_str() {
                "frontend" => self.role = NodeRole::Frontend,
                "backend" => self.role = NodeRole::Backend,
                _ => {}
            }
        }
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: String) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("default_network_id", &self.default_network_id)
            .field("network_ids", &self.network_ids)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("service_start_timeout_ms", &self.service_start_timeout_ms)
            .field("max_retained_per_topic", &self.max_retained_per_topic)
            .field("role", &self.role)
            .field("keystore", &self.keystore.as_ref().map(|_| "<Keystore>"))
            .field(
                "remote_transport",
                &self.remote_transport.as_ref().map(|_| "<RemoteTransport>"),
            )
            .finish()
    }
}
