//! Strand node: local service bus core
//!
//! An in-process request/response and publish/subscribe router organized
//! around hierarchical topic paths. A node hosts locally-registered
//! services; the dispatcher matches request and event paths against a topic
//! trie with wildcard and template-parameter support, maintains retained
//! event history, coordinates service lifecycle, and falls back to a
//! pluggable remote transport when no local handler resolves a request.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use strand_common::TypedValue;
//! use strand_node::{Node, NodeConfig};
//!
//! # async fn example() -> strand_node::NodeResult<()> {
//! let node = Node::new(NodeConfig::new("main"));
//! node.start().await?;
//!
//! let sub = node
//!     .subscribe(
//!         "sensors/>",
//!         Arc::new(|_ctx, payload| {
//!             Box::pin(async move {
//!                 println!("event: {payload:?}");
//!                 Ok(())
//!             })
//!         }),
//!     )
//!     .await?;
//!
//! node.publish("sensors/temp", Some(TypedValue::from(json!({"c": 21}))))
//!     .await?;
//! node.unsubscribe(sub).await?;
//! node.stop().await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod error;
pub mod network;
pub mod node;
pub mod routing;
pub mod services;

pub use config::{NodeConfig, NodeRole};
pub use error::{NodeError, NodeResult};
pub use network::RemoteTransport;
pub use node::{
    EventMessage, Node, OnOptions, PublishOptions, RetainedEvent, SubscribeOptions,
};
pub use routing::{PathTrie, PathTrieMatch, TopicPath};
pub use services::{
    AbstractService, ActionHandler, EventContext, EventSubscriber, LifecycleContext,
    RequestContext, ServiceEntry, ServiceMetadata, ServiceState, SubscriptionEntry,
    SubscriptionKind, SubscriptionMetadata,
};
