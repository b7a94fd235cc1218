//! Layout output types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::graph::NodeId;

/// Center position of one laid-out node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePosition {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
    /// Index into `LayoutResult::layers`.
    pub layer: usize,
}

impl NodePosition {
    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Bounds of one group (a structural connected component, or a host group).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBounds {
    pub id: String,
    pub label: String,
    /// Node whose title the label was taken from.
    pub anchor: NodeId,
    pub member_count: usize,
    pub members: Vec<NodeId>,
    pub bounds: Rect,
    pub color: String,
}

/// A group supplied by the host instead of the computed components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub members: Vec<NodeId>,
}

/// Anomalies the layout worked around.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutDiagnostics {
    /// Nodes forced into a layer to break a structural cycle, in order.
    pub forced_nodes: Vec<NodeId>,
    /// Edges excluded because an endpoint is not in the node list.
    pub dropped_edges: usize,
    /// Structural self-loops ignored by the layering.
    pub self_loops: usize,
}

impl LayoutDiagnostics {
    #[inline]
    pub fn has_cycles(&self) -> bool {
        !self.forced_nodes.is_empty()
    }
}

/// Complete output of one layout run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutResult {
    pub positions: BTreeMap<NodeId, NodePosition>,
    /// Covers every node box (centers plus half extents).
    pub bounds: Rect,
    /// Node ids per layer, in final left-to-right order.
    pub layers: Vec<Vec<NodeId>>,
    pub groups: Vec<GroupBounds>,
    pub diagnostics: LayoutDiagnostics,
}

impl LayoutResult {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<&NodePosition> {
        self.positions.get(id)
    }

    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).map(|p| p.layer)
    }

    /// Box of a node given its size.
    pub fn node_rect(&self, id: &str, width: f32, height: f32) -> Option<Rect> {
        self.positions
            .get(id)
            .map(|p| Rect::centered(p.center(), width, height))
    }

    /// Group a node belongs to, if any.
    pub fn group_of(&self, id: &str) -> Option<&GroupBounds> {
        self.groups
            .iter()
            .find(|g| g.members.iter().any(|m| m.as_str() == id))
    }
}
