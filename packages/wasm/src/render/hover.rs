//! Hover tracking with debounced impact analysis.
//!
//! Pointer moves only record the hovered id and a timestamp. Upstream and
//! downstream sets are computed once the pointer has rested on the same node
//! for the debounce period, on the next `tick`.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::graph::{GraphModel, NodeId, TraversalDirection};

/// Everything connected to the hovered node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoverImpact {
    pub id: NodeId,
    pub upstream: BTreeSet<NodeId>,
    pub downstream: BTreeSet<NodeId>,
}

impl HoverImpact {
    pub fn compute(graph: &GraphModel, id: &NodeId) -> Self {
        Self {
            id: id.clone(),
            upstream: graph.traverse(id.as_str(), TraversalDirection::Upstream, None),
            downstream: graph.traverse(id.as_str(), TraversalDirection::Downstream, None),
        }
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.upstream.contains(id) || self.downstream.contains(id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HoverTracker {
    debounce_ms: f64,
    hovered: Option<NodeId>,
    /// When the current hover started, while impact is still pending.
    pending_since: Option<f64>,
    impact: Option<HoverImpact>,
}

impl HoverTracker {
    pub fn new(debounce_ms: f64) -> Self {
        Self {
            debounce_ms,
            ..Self::default()
        }
    }

    pub fn hovered(&self) -> Option<&NodeId> {
        self.hovered.as_ref()
    }

    pub fn impact(&self) -> Option<&HoverImpact> {
        self.impact.as_ref()
    }

    /// Record the node under the pointer. Returns the previous impact when
    /// the hovered node changed and one had been computed, so the caller can
    /// clear its highlight; `None` as the outer value means nothing changed.
    pub fn update(&mut self, id: Option<NodeId>, now_ms: f64) -> Option<Option<HoverImpact>> {
        if id == self.hovered {
            return None;
        }
        self.pending_since = id.as_ref().map(|_| now_ms);
        self.hovered = id;
        Some(self.impact.take())
    }

    /// Whether the debounce period has elapsed for a pending hover.
    pub fn is_due(&self, now_ms: f64) -> bool {
        self.pending_since
            .is_some_and(|since| now_ms - since >= self.debounce_ms)
    }

    /// Compute and store the impact if due.
    pub fn settle(&mut self, graph: &GraphModel, now_ms: f64) -> Option<&HoverImpact> {
        if !self.is_due(now_ms) {
            return None;
        }
        let id = self.hovered.clone()?;
        self.pending_since = None;
        self.impact = Some(HoverImpact::compute(graph, &id));
        self.impact.as_ref()
    }

    /// Recompute a settled impact against `graph`. Returns the new impact
    /// only when it differs from the stored one.
    pub fn refresh(&mut self, graph: &GraphModel) -> Option<&HoverImpact> {
        let current = self.impact.as_ref()?;
        let next = HoverImpact::compute(graph, &current.id);
        if *current == next {
            return None;
        }
        self.impact = Some(next);
        self.impact.as_ref()
    }

    pub fn reset(&mut self) {
        self.hovered = None;
        self.pending_since = None;
        self.impact = None;
    }
}
