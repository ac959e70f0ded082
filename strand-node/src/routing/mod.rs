//! Topic routing
//!
//! Provides:
//! - `TopicPath`: network-qualified hierarchical paths
//! - `PathTrie`: pattern matching over registered paths with wildcard and
//!   template-parameter support

pub mod path_trie;
pub mod topic_path;

pub use path_trie::{PathTrie, PathTrieMatch};
pub use topic_path::TopicPath;
