//! Scoped logging on top of `tracing`
//!
//! Services and contexts receive a `ScopedLogger` carrying the component and
//! the path it is acting for, so bus internals and user handlers emit events
//! with consistent structured fields without threading `tracing` spans
//! through every call site.

use std::fmt;

/// Subsystem a log event originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Node dispatcher and lifecycle
    Node,
    /// Service registry internals
    Registry,
    /// A user or built-in service
    Service,
    /// Remote transport adapter
    Network,
    /// Keystore capability surface
    Keys,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Node => "node",
            Component::Registry => "registry",
            Component::Service => "service",
            Component::Network => "network",
            Component::Keys => "keys",
        };
        write!(f, "{name}")
    }
}

/// Logger scoped to a component and path
///
/// Cheap to clone; derive narrower scopes with `with_scope`.
#[derive(Debug, Clone)]
pub struct ScopedLogger {
    component: Component,
    scope: String,
}

impl ScopedLogger {
    /// Root logger for a component
    pub fn new(component: Component, scope: impl Into<String>) -> Self {
        Self {
            component,
            scope: scope.into(),
        }
    }

    /// Derive a logger with a path segment appended to the scope
    pub fn with_scope(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref();
        let scope = if self.scope.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", self.scope, segment)
        };
        Self {
            component: self.component,
            scope,
        }
    }

    /// The scope path this logger reports under
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Log at debug level
    pub fn debug(&self, message: impl AsRef<str>) {
        tracing::debug!(component = %self.component, scope = %self.scope, "{}", message.as_ref());
    }

    /// Log at info level
    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!(component = %self.component, scope = %self.scope, "{}", message.as_ref());
    }

    /// Log at warn level
    pub fn warn(&self, message: impl AsRef<str>) {
        tracing::warn!(component = %self.component, scope = %self.scope, "{}", message.as_ref());
    }

    /// Log at error level
    pub fn error(&self, message: impl AsRef<str>) {
        tracing::error!(component = %self.component, scope = %self.scope, "{}", message.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_derivation() {
        let root = ScopedLogger::new(Component::Service, "math");
        let scoped = root.with_scope("add");
        assert_eq!(scoped.scope(), "math/add");
        assert_eq!(root.scope(), "math");
    }

    #[test]
    fn test_empty_scope_derivation() {
        let root = ScopedLogger::new(Component::Node, "");
        assert_eq!(root.with_scope("start").scope(), "start");
    }
}
