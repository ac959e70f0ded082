//! Pattern trie over topic paths
//!
//! Each node fans out along three kinds of edges: literal children, template
//! parameter children (keyed by parameter name, matching any single segment
//! and binding it), and wildcard children (`*` single-segment, `>` terminal
//! multi-segment). Leaves hold zero or more values, so several handlers or
//! subscribers can share one pattern.
//!
//! `find_matches` resolves a concrete path against stored patterns and
//! orders results most-specific-first: literal-only matches, then matches
//! that bound template parameters, then `*` matches, then `>` matches.
//! `find_wildcard_matches` is the dual: it resolves a wildcard pattern
//! against stored keys, which is how retained-event keys are reverse-indexed
//! by subscription patterns.

use std::collections::{BTreeMap, HashMap};

use crate::routing::topic_path::{
    template_param_name, TopicPath, WILDCARD_MULTI, WILDCARD_SINGLE,
};

// Specificity ranks for match ordering; lower is more specific.
const RANK_LITERAL: u8 = 0;
const RANK_PARAM: u8 = 1;
const RANK_SINGLE: u8 = 2;
const RANK_MULTI: u8 = 3;

/// A value matched by `find_matches`, with any template parameter bindings
#[derive(Debug, Clone, PartialEq)]
pub struct PathTrieMatch<V> {
    /// The stored value
    pub content: V,
    /// Parameter name to captured segment, for `{name}` pattern segments
    pub params: HashMap<String, String>,
}

struct TrieNode<V> {
    literals: HashMap<String, TrieNode<V>>,
    // Keyed by parameter name so distinct templates at one position coexist;
    // BTreeMap keeps match order deterministic.
    params: BTreeMap<String, TrieNode<V>>,
    single: Option<Box<TrieNode<V>>>,
    values: Vec<V>,
    // Values registered under a terminal `>` at this position.
    multi_values: Vec<V>,
}

impl<V> Default for TrieNode<V> {
    fn default() -> Self {
        Self {
            literals: HashMap::new(),
            params: BTreeMap::new(),
            single: None,
            values: Vec::new(),
            multi_values: Vec::new(),
        }
    }
}

/// Trie of values keyed by topic-path patterns
pub struct PathTrie<V> {
    networks: HashMap<String, TrieNode<V>>,
}

impl<V> Default for PathTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PathTrie<V> {
    /// Empty trie
    pub fn new() -> Self {
        Self {
            networks: HashMap::new(),
        }
    }

    /// Append a value at the pattern's leaf
    ///
    /// Inserting the same pattern again appends to the existing leaf list.
    pub fn set_value(&mut self, topic: &TopicPath, value: V) {
        let mut node = self.networks.entry(topic.network_id().to_string()).or_default();
        for segment in topic.segments() {
            if segment == WILDCARD_MULTI {
                // Terminal by TopicPath validation.
                node.multi_values.push(value);
                return;
            }
            node = if segment == WILDCARD_SINGLE {
                &mut **node.single.get_or_insert_with(Box::default)
            } else if let Some(name) = template_param_name(segment) {
                node.params.entry(name.to_string()).or_default()
            } else {
                node.literals.entry(segment.clone()).or_default()
            };
        }
        node.values.push(value);
    }

    /// Clear the leaf value list at exactly this pattern
    ///
    /// Intermediate nodes are retained; no structural compaction happens.
    pub fn remove_values(&mut self, topic: &TopicPath) {
        if let Some(values) = self.leaf_values_mut(topic) {
            values.clear();
        }
    }

    /// Keep only leaf values at this pattern that satisfy the predicate,
    /// returning how many were removed
    pub fn retain_values(&mut self, topic: &TopicPath, mut keep: impl FnMut(&V) -> bool) -> usize {
        match self.leaf_values_mut(topic) {
            Some(values) => {
                let before = values.len();
                values.retain(|v| keep(v));
                before - values.len()
            }
            None => 0,
        }
    }

    fn leaf_values_mut(&mut self, topic: &TopicPath) -> Option<&mut Vec<V>> {
        let mut node = self.networks.get_mut(topic.network_id())?;
        for segment in topic.segments() {
            if segment == WILDCARD_MULTI {
                return Some(&mut node.multi_values);
            }
            node = if segment == WILDCARD_SINGLE {
                node.single.as_deref_mut()?
            } else if let Some(name) = template_param_name(segment) {
                node.params.get_mut(name)?
            } else {
                node.literals.get_mut(segment.as_str())?
            };
        }
        Some(&mut node.values)
    }
}

impl<V: Clone> PathTrie<V> {
    /// Values stored at exactly this pattern (no wildcard resolution)
    pub fn get_exact_values(&self, topic: &TopicPath) -> Vec<V> {
        let mut node = match self.networks.get(topic.network_id()) {
            Some(node) => node,
            None => return Vec::new(),
        };
        for segment in topic.segments() {
            if segment == WILDCARD_MULTI {
                return node.multi_values.clone();
            }
            let next = if segment == WILDCARD_SINGLE {
                node.single.as_deref()
            } else if let Some(name) = template_param_name(segment) {
                node.params.get(name)
            } else {
                node.literals.get(segment.as_str())
            };
            node = match next {
                Some(next) => next,
                None => return Vec::new(),
            };
        }
        node.values.clone()
    }

    /// All stored values whose pattern matches the concrete path, ordered
    /// most-specific-first with template parameter bindings attached
    pub fn find_matches(&self, concrete: &TopicPath) -> Vec<PathTrieMatch<V>> {
        let mut out: Vec<(u8, PathTrieMatch<V>)> = Vec::new();
        if let Some(root) = self.networks.get(concrete.network_id()) {
            Self::collect_matches(
                root,
                concrete.segments(),
                HashMap::new(),
                RANK_LITERAL,
                &mut out,
            );
        }
        // Stable sort keeps insertion order within a specificity bucket.
        out.sort_by_key(|(bucket, _)| *bucket);
        out.into_iter().map(|(_, matched)| matched).collect()
    }

    fn collect_matches(
        node: &TrieNode<V>,
        segments: &[String],
        bindings: HashMap<String, String>,
        bucket: u8,
        out: &mut Vec<(u8, PathTrieMatch<V>)>,
    ) {
        let (head, rest) = match segments.split_first() {
            Some(split) => split,
            None => {
                for value in &node.values {
                    out.push((
                        bucket,
                        PathTrieMatch {
                            content: value.clone(),
                            params: bindings.clone(),
                        },
                    ));
                }
                return;
            }
        };

        if let Some(child) = node.literals.get(head.as_str()) {
            Self::collect_matches(child, rest, bindings.clone(), bucket, out);
        }
        for (name, child) in &node.params {
            let mut bound = bindings.clone();
            bound.insert(name.clone(), head.clone());
            Self::collect_matches(child, rest, bound, bucket.max(RANK_PARAM), out);
        }
        if let Some(child) = node.single.as_deref() {
            Self::collect_matches(child, rest, bindings.clone(), bucket.max(RANK_SINGLE), out);
        }
        // `>` consumes the one-or-more remaining segments (never zero).
        for value in &node.multi_values {
            out.push((
                RANK_MULTI,
                PathTrieMatch {
                    content: value.clone(),
                    params: bindings.clone(),
                },
            ));
        }
    }

    /// Stored values whose key matches a subscription-style pattern
    ///
    /// The dual of `find_matches`: here the argument carries the wildcards
    /// and the stored keys are (typically concrete) topics.
    pub fn find_wildcard_matches(&self, pattern: &TopicPath) -> Vec<V> {
        let mut out = Vec::new();
        if let Some(root) = self.networks.get(pattern.network_id()) {
            Self::collect_wildcard(root, pattern.segments(), &mut out);
        }
        out
    }

    fn collect_wildcard(node: &TrieNode<V>, segments: &[String], out: &mut Vec<V>) {
        let (head, rest) = match segments.split_first() {
            Some(split) => split,
            None => {
                out.extend(node.values.iter().cloned());
                return;
            }
        };

        if head == WILDCARD_MULTI {
            // One or more remaining segments: everything strictly below here.
            out.extend(node.multi_values.iter().cloned());
            for child in node.literals.values() {
                Self::collect_subtree(child, out);
            }
            for child in node.params.values() {
                Self::collect_subtree(child, out);
            }
            if let Some(child) = node.single.as_deref() {
                Self::collect_subtree(child, out);
            }
            return;
        }

        if head == WILDCARD_SINGLE {
            for child in node.literals.values() {
                Self::collect_wildcard(child, rest, out);
            }
        } else if let Some(child) = node.literals.get(head.as_str()) {
            Self::collect_wildcard(child, rest, out);
        }
        // Stored template and `*` edges overlap any pattern segment.
        for child in node.params.values() {
            Self::collect_wildcard(child, rest, out);
        }
        if let Some(child) = node.single.as_deref() {
            Self::collect_wildcard(child, rest, out);
        }
    }

    fn collect_subtree(node: &TrieNode<V>, out: &mut Vec<V>) {
        out.extend(node.values.iter().cloned());
        out.extend(node.multi_values.iter().cloned());
        for child in node.literals.values() {
            Self::collect_subtree(child, out);
        }
        for child in node.params.values() {
            Self::collect_subtree(child, out);
        }
        if let Some(child) = node.single.as_deref() {
            Self::collect_subtree(child, out);
        }
    }
}
