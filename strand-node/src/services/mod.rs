//! Services layer
//!
//! Provides:
//! - `AbstractService`: the trait user services implement
//! - Lifecycle, request, and event contexts handed into service code
//! - `ServiceRegistry`: action handlers, subscriptions, lifecycle state
//! - `RegistryService`: the built-in `$registry` introspection service

pub mod abstract_service;
pub mod event_context;
pub mod lifecycle_context;
pub mod registry_service;
pub mod request_context;
pub mod service_registry;

pub use abstract_service::{AbstractService, ServiceState};
pub use event_context::EventContext;
pub use lifecycle_context::LifecycleContext;
pub use registry_service::{RegistryService, ServiceMetadata};
pub use request_context::RequestContext;
pub use service_registry::{
    ServiceEntry, ServiceRegistry, SubscriptionEntry, SubscriptionKind, SubscriptionMetadata,
};

use std::sync::Arc;

use futures::future::BoxFuture;

use strand_common::TypedValue;

/// Service-path prefixes reserved for built-in services
///
/// Services under these prefixes are started before any user service, and
/// user code cannot register them.
pub const INTERNAL_SERVICE_PREFIXES: &[&str] = &["$registry", "$keys"];

/// True when a service path is reserved for built-ins
pub fn is_internal_service_path(service_path: &str) -> bool {
    INTERNAL_SERVICE_PREFIXES
        .iter()
        .any(|prefix| service_path.starts_with(prefix))
}

/// Handler for a registered action
///
/// Receives the request payload and a context carrying path parameters and a
/// re-entrant node handle. The returned error string is propagated to the
/// caller verbatim.
pub type ActionHandler = Arc<
    dyn Fn(TypedValue, RequestContext) -> BoxFuture<'static, Result<TypedValue, String>>
        + Send
        + Sync,
>;

/// Callback for delivered events
pub type EventSubscriber = Arc<
    dyn Fn(EventContext, Option<TypedValue>) -> BoxFuture<'static, Result<(), String>>
        + Send
        + Sync,
>;

/// Normalize a caller-supplied path against the calling context
///
/// Accepts three shapes:
/// - `"network:service/action"` is used as-is
/// - `"service/action"` gets the context's network id
/// - `"action"` gets the context's network id and service path (targets the
///   calling service itself)
pub(crate) fn normalize_context_path(input: &str, network_id: &str, service_path: &str) -> String {
    if input.contains(':') {
        input.to_string()
    } else if input.contains('/') {
        format!("{network_id}:{input}")
    } else {
        format!("{network_id}:{service_path}/{input}")
    }
}
