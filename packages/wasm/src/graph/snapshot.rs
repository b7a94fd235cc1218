//! Node/edge snapshot as delivered by the data layer, and its sanitization.
//!
//! Sanitization is the only place malformed input is dealt with. Every
//! anomaly degrades to "ignore the offending element" and is logged; none of
//! them aborts the snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::edge::Edge;
use super::node::Node;
use crate::layout::GroupSpec;

/// One render cycle's worth of graph data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Optional host-defined groups replacing the computed components.
    #[serde(default)]
    pub groups: Option<Vec<GroupSpec>>,
}

/// What sanitization had to fix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    pub duplicate_nodes: usize,
    pub dangling_edges: usize,
    pub duplicate_edges: usize,
    pub normalized_fields: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        *self == SanitizeReport::default()
    }
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            groups: None,
        }
    }

    /// Drop duplicate nodes, dangling and duplicate edges, and normalize
    /// invalid numeric metadata to absent.
    pub fn sanitize(mut self) -> (GraphSnapshot, SanitizeReport) {
        let mut report = SanitizeReport::default();

        let mut seen = HashSet::with_capacity(self.nodes.len());
        self.nodes.retain(|node| {
            if seen.insert(node.id.clone()) {
                true
            } else {
                warn!(node = %node.id, "duplicate node id in snapshot; keeping first occurrence");
                report.duplicate_nodes += 1;
                false
            }
        });

        for node in &mut self.nodes {
            report.normalized_fields += normalize_metadata(node);
        }

        let mut seen_edges = HashSet::with_capacity(self.edges.len());
        self.edges.retain(|edge| {
            if !seen.contains(&edge.from) || !seen.contains(&edge.to) {
                report.dangling_edges += 1;
                return false;
            }
            if !seen_edges.insert(edge.clone()) {
                report.duplicate_edges += 1;
                return false;
            }
            true
        });

        if report.dangling_edges > 0 {
            debug!(count = report.dangling_edges, "dropped edges referencing unknown nodes");
        }

        (self, report)
    }
}

/// Returns the number of fields reset or clamped.
fn normalize_metadata(node: &mut Node) -> usize {
    let mut fixed = 0;

    if let Some(depth) = node.structural_depth {
        if !depth.is_finite() || depth < 0.0 {
            warn!(node = %node.id, depth, "invalid structural_depth; treating as absent");
            node.structural_depth = None;
            fixed += 1;
        }
    }

    if let Some(progress) = node.progress {
        if !progress.is_finite() || progress < 0.0 {
            warn!(node = %node.id, progress, "invalid progress; treating as absent");
            node.progress = None;
            fixed += 1;
        } else if progress > 100.0 {
            debug!(node = %node.id, progress, "progress above 100; clamping");
            node.progress = Some(100.0);
            fixed += 1;
        }
    }

    fixed
}
