//! Network-qualified hierarchical topic paths
//!
//! A topic path is `"{network_id}:{service_path}/{segment}/…"`. The first
//! segment names a service; any remaining segments form the action or event
//! path. Segments may be literals, template parameters (`{name}`), the
//! single-segment wildcard `*`, or the terminal multi-segment wildcard `>`.
//! Wildcards and template parameters are only valid in handler and
//! subscription patterns, never in concrete request or publish paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Single-segment wildcard
pub const WILDCARD_SINGLE: &str = "*";

/// Terminal multi-segment wildcard
pub const WILDCARD_MULTI: &str = ">";

/// Immutable network-qualified topic path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPath {
    network_id: String,
    segments: Vec<String>,
}

impl TopicPath {
    /// Parse `"network:service/a/b"` or `"service/a/b"`, defaulting the
    /// network id when the input carries none
    pub fn parse(input: &str, default_network_id: &str) -> NodeResult<Self> {
        if input.is_empty() {
            return Err(NodeError::InvalidTopic("empty path".to_string()));
        }

        let (network_id, path) = match input.split_once(':') {
            Some((network, rest)) => {
                if network.is_empty() {
                    return Err(NodeError::InvalidTopic(format!(
                        "empty network id in '{input}'"
                    )));
                }
                if rest.contains(':') {
                    return Err(NodeError::InvalidTopic(format!("stray ':' in '{input}'")));
                }
                (network.to_string(), rest)
            }
            None => (default_network_id.to_string(), input),
        };

        if network_id.is_empty() {
            return Err(NodeError::InvalidTopic(format!(
                "no network id for '{input}' and no default configured"
            )));
        }
        if path.is_empty() {
            return Err(NodeError::InvalidTopic(format!("empty path in '{input}'")));
        }

        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        Self::validate_segments(&segments, input)?;

        Ok(Self {
            network_id,
            segments,
        })
    }

    fn validate_segments(segments: &[String], input: &str) -> NodeResult<()> {
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(NodeError::InvalidTopic(format!(
                    "empty segment in '{input}'"
                )));
            }
            if segment == WILDCARD_MULTI && i != segments.len() - 1 {
                return Err(NodeError::InvalidTopic(format!(
                    "'>' must be the final segment in '{input}'"
                )));
            }
        }
        Ok(())
    }

    /// Build a service topic (network id + service path only)
    pub fn new_service(network_id: impl Into<String>, service_path: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            segments: vec![service_path.into()],
        }
    }

    /// Derive a topic with the action name's segments appended
    pub fn new_action_topic(&self, action_name: &str) -> NodeResult<Self> {
        if action_name.is_empty() {
            return Err(NodeError::InvalidTopic("empty action name".to_string()));
        }
        let mut segments = self.segments.clone();
        segments.extend(action_name.split('/').map(str::to_string));
        Self::validate_segments(&segments, action_name)?;
        Ok(Self {
            network_id: self.network_id.clone(),
            segments,
        })
    }

    /// Derive a topic with the event name's segments appended
    pub fn new_event_topic(&self, event_name: &str) -> NodeResult<Self> {
        self.new_action_topic(event_name)
    }

    /// The network this topic belongs to
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// The service segment (first segment)
    pub fn service_path(&self) -> &str {
        &self.segments[0]
    }

    /// The action path (all segments after the service), `/`-joined
    pub fn action_path(&self) -> String {
        self.segments[1..].join("/")
    }

    /// All segments in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The service topic this path belongs to
    pub fn service_topic(&self) -> Self {
        Self {
            network_id: self.network_id.clone(),
            segments: vec![self.segments[0].clone()],
        }
    }

    /// True when this path has no action segments
    pub fn is_service_topic(&self) -> bool {
        self.segments.len() == 1
    }

    /// Canonical string form: `"network:service/a/b"`
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.network_id, self.segments.join("/"))
    }

    /// True when any segment is `*` or `>`
    pub fn has_wildcards(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s == WILDCARD_SINGLE || s == WILDCARD_MULTI)
    }

    /// True when any segment is a `{name}` template parameter
    pub fn has_templates(&self) -> bool {
        self.segments.iter().any(|s| is_template_segment(s))
    }

    /// True when this path is usable as a concrete request or publish target
    pub fn is_concrete(&self) -> bool {
        !self.has_wildcards() && !self.has_templates()
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// True for `{name}` segments with a non-empty name
pub(crate) fn is_template_segment(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// The parameter name of a `{name}` segment
pub(crate) fn template_param_name(segment: &str) -> Option<&str> {
    if is_template_segment(segment) {
        Some(&segment[1..segment.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_network() {
        let tp = TopicPath::parse("main:math/add", "default").unwrap();
        assert_eq!(tp.network_id(), "main");
        assert_eq!(tp.service_path(), "math");
        assert_eq!(tp.action_path(), "add");
        assert_eq!(tp.as_string(), "main:math/add");
    }

    #[test]
    fn test_parse_defaults_network() {
        let tp = TopicPath::parse("math/add", "default").unwrap();
        assert_eq!(tp.network_id(), "default");
        assert_eq!(tp.as_string(), "default:math/add");
    }

    #[test]
    fn test_parse_round_trip() {
        for input in ["main:svc", "main:svc/a/b/c", "main:svc/{id}/state", "main:svc/>"] {
            let tp = TopicPath::parse(input, "other").unwrap();
            let back = TopicPath::parse(&tp.as_string(), tp.network_id()).unwrap();
            assert_eq!(back, tp);
        }
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(TopicPath::parse("", "default").is_err());
        assert!(TopicPath::parse(":svc/a", "default").is_err());
        assert!(TopicPath::parse("a:b:c", "default").is_err());
        assert!(TopicPath::parse("svc//a", "default").is_err());
        assert!(TopicPath::parse("svc/a/", "default").is_err());
        assert!(TopicPath::parse("svc/>/a", "default").is_err());
        assert!(TopicPath::parse("main:", "default").is_err());
        assert!(TopicPath::parse("svc/a", "").is_err());
    }

    #[test]
    fn test_multi_wildcard_terminal_is_valid() {
        let tp = TopicPath::parse("svc/>", "default").unwrap();
        assert!(tp.has_wildcards());
        assert!(!tp.is_concrete());
    }

    #[test]
    fn test_action_topic_derivation() {
        let service = TopicPath::new_service("main", "registry");
        let action = service.new_action_topic("services/list").unwrap();
        assert_eq!(action.segments().len(), 3);
        assert_eq!(action.action_path(), "services/list");
        assert_eq!(action.service_topic(), service);
    }

    #[test]
    fn test_template_detection() {
        let tp = TopicPath::parse("registry/services/{service_path}", "main").unwrap();
        assert!(tp.has_templates());
        assert!(!tp.has_wildcards());
        assert_eq!(template_param_name("{service_path}"), Some("service_path"));
        assert_eq!(template_param_name("plain"), None);
        assert_eq!(template_param_name("{}"), None);
    }

    #[test]
    fn test_service_topic_properties() {
        let tp = TopicPath::parse("main:math", "main").unwrap();
        assert!(tp.is_service_topic());
        assert_eq!(tp.action_path(), "");
    }
}
