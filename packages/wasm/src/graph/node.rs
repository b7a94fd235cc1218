//! Node type and related enums.
//!
//! Nodes are project entities (roots, objectives, deliverables, tasks).
//! The engine only ever holds a read snapshot of them; every field except
//! `id`, `kind` and `structural_depth` is "content" that can change without
//! forcing a relayout.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable node identifier supplied by the data layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    #[inline]
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Entity kind. Unknown kinds from the host deserialize as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Objective,
    Deliverable,
    Task,
    #[default]
    #[serde(other)]
    Other,
}

/// Shape the renderer draws for a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    Hexagon,
    RoundedRect,
    Rect,
    Pill,
}

/// Fixed per-kind rendering capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindCapabilities {
    pub shape: NodeShape,
    pub icon: &'static str,
    pub shows_progress: bool,
}

impl NodeKind {
    /// Capability table; the renderer dispatches on this instead of looking
    /// anything up by name.
    pub const fn capabilities(self) -> KindCapabilities {
        match self {
            NodeKind::Root => KindCapabilities {
                shape: NodeShape::Hexagon,
                icon: "flag",
                shows_progress: true,
            },
            NodeKind::Objective => KindCapabilities {
                shape: NodeShape::RoundedRect,
                icon: "target",
                shows_progress: true,
            },
            NodeKind::Deliverable => KindCapabilities {
                shape: NodeShape::Rect,
                icon: "package",
                shows_progress: true,
            },
            NodeKind::Task => KindCapabilities {
                shape: NodeShape::Pill,
                icon: "check",
                shows_progress: false,
            },
            NodeKind::Other => KindCapabilities {
                shape: NodeShape::Rect,
                icon: "dot",
                shows_progress: false,
            },
        }
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Todo,
    InProgress,
    Blocked,
    Review,
    Done,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

/// A project entity as delivered by the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default, rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assignee: Option<String>,
    /// Explicit layer hint; overrides the computed layer when present.
    #[serde(default)]
    pub structural_depth: Option<f64>,
    /// Completion percentage, 0-100.
    #[serde(default)]
    pub progress: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            status: NodeStatus::default(),
            priority: None,
            assignee: None,
            structural_depth: None,
            progress: None,
        }
    }

    /// Explicit depth as a layer index, if one was supplied and is valid.
    pub fn depth(&self) -> Option<u32> {
        self.structural_depth
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.min(u32::MAX as f64) as u32)
    }

    /// Depth used for deterministic ordering: explicit depth, or 0.
    #[inline]
    pub fn normalized_depth(&self) -> u32 {
        self.depth().unwrap_or(0)
    }

    /// Case-insensitive substring match against id and title.
    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.id.as_str().to_lowercase().contains(needle)
            || self.title.to_lowercase().contains(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId::new("task-42");
        assert_eq!(id.as_str(), "task-42");
        assert_eq!(format!("{}", id), "task-42");
        let from: NodeId = "task-42".into();
        assert_eq!(id, from);
    }

    #[test]
    fn test_node_deserialize_defaults_and_unknown_variants() {
        let node: Node = serde_json::from_str(
            r#"{ "id": "n1", "type": "milestone", "title": "Ship", "status": "paused", "priority": "high" }"#,
        )
        .unwrap();
        assert_eq!(node.kind, NodeKind::Other);
        assert_eq!(node.status, NodeStatus::Unknown);
        assert_eq!(node.priority, Some(Priority::High));
        assert_eq!(node.assignee, None);
        assert_eq!(node.depth(), None);
    }

    #[test]
    fn test_depth_rejects_invalid_values() {
        let mut node = Node::new("a", NodeKind::Task, "A");
        node.structural_depth = Some(2.7);
        assert_eq!(node.depth(), Some(2));
        node.structural_depth = Some(-1.0);
        assert_eq!(node.depth(), None);
        node.structural_depth = Some(f64::NAN);
        assert_eq!(node.normalized_depth(), 0);
    }

    #[test]
    fn test_matches_search_case_insensitive() {
        let node = Node::new("OBJ-7", NodeKind::Objective, "Launch Beta");
        assert!(node.matches_search("beta"));
        assert!(node.matches_search("obj-"));
        assert!(!node.matches_search("gamma"));
    }

    #[test]
    fn test_capability_table() {
        assert_eq!(NodeKind::Root.capabilities().shape, NodeShape::Hexagon);
        assert!(!NodeKind::Task.capabilities().shows_progress);
    }
}
