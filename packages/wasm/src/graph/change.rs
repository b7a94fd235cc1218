//! Snapshot fingerprints and change classification.
//!
//! A snapshot has two hashes: the *structural* hash covers exactly what the
//! layout depends on (ids, kinds, explicit depths, structural edges) and the
//! *content* hash covers everything. Comparing both against the previous
//! snapshot yields one of three outcomes, decided in a single function.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use super::edge::Edge;
use super::node::Node;
use super::snapshot::GraphSnapshot;

/// How a new snapshot relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Identical content; nothing to do.
    NoOp,
    /// Same layout inputs, some content field changed; update in place.
    DataOnly,
    /// Ids, kinds, depths or structural edges changed; relayout.
    Structural,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::NoOp => "no_op",
            ChangeKind::DataOnly => "data_only",
            ChangeKind::Structural => "structural",
        }
    }
}

/// Pair of hashes identifying a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint {
    pub structural: u64,
    pub content: u64,
}

impl Fingerprint {
    pub fn of(snapshot: &GraphSnapshot) -> Self {
        Self {
            structural: structural_hash(&snapshot.nodes, &snapshot.edges),
            content: content_hash(snapshot),
        }
    }
}

/// Classify the transition from `previous` (None on first load) to `next`.
pub fn classify_change(previous: Option<&Fingerprint>, next: &Fingerprint) -> ChangeKind {
    match previous {
        None => ChangeKind::Structural,
        Some(prev) if prev.structural != next.structural => ChangeKind::Structural,
        Some(prev) if prev.content != next.content => ChangeKind::DataOnly,
        Some(_) => ChangeKind::NoOp,
    }
}

/// Hash over sorted `(id, kind, depth)` tuples and sorted structural
/// `(from, to)` pairs. Input order does not matter.
pub fn structural_hash(nodes: &[Node], edges: &[Edge]) -> u64 {
    let mut node_keys: Vec<_> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.kind, n.depth()))
        .collect();
    node_keys.sort_unstable();

    let mut edge_keys: Vec<_> = edges
        .iter()
        .filter(|e| e.layer.is_structural())
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    edge_keys.sort_unstable();
    edge_keys.dedup();

    let mut hasher = DefaultHasher::new();
    node_keys.hash(&mut hasher);
    edge_keys.hash(&mut hasher);
    hasher.finish()
}

/// Hash over every field of every node and edge, order-independent.
pub fn content_hash(snapshot: &GraphSnapshot) -> u64 {
    let mut node_hashes: Vec<(&str, u64)> = snapshot
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), node_content_hash(n)))
        .collect();
    node_hashes.sort_unstable();

    let mut edges: Vec<&Edge> = snapshot.edges.iter().collect();
    edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut hasher = DefaultHasher::new();
    node_hashes.hash(&mut hasher);
    edges.hash(&mut hasher);
    if let Some(groups) = &snapshot.groups {
        for group in groups {
            group.id.hash(&mut hasher);
            group.label.hash(&mut hasher);
            group.members.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Hash of one node's full content; used to find which views to update.
pub fn node_content_hash(node: &Node) -> u64 {
    let mut hasher = DefaultHasher::new();
    node.id.hash(&mut hasher);
    node.kind.hash(&mut hasher);
    node.title.hash(&mut hasher);
    node.status.hash(&mut hasher);
    node.priority.hash(&mut hasher);
    node.assignee.hash(&mut hasher);
    node.structural_depth.map(f64::to_bits).hash(&mut hasher);
    node.progress.map(f64::to_bits).hash(&mut hasher);
    hasher.finish()
}
