//! Per-node view state and the command queue drained by the host.

use serde::{Deserialize, Serialize};

use super::lod::LodLevel;
use crate::graph::{Node, NodeId, NodeKind, NodeShape, NodeStatus, Priority};
use crate::layout::{GroupBounds, NodePosition};

/// View flags packed into a single byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewFlags {
    flags: u8,
}

impl ViewFlags {
    pub const SHOWN: u8 = 0b0000_0001;
    pub const SELECTED: u8 = 0b0000_0010;
    pub const HOVERED: u8 = 0b0000_0100;
    pub const HIGHLIGHTED: u8 = 0b0000_1000;

    #[inline]
    pub fn has(self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Returns whether the flag changed.
    #[inline]
    pub fn set(&mut self, flag: u8, on: bool) -> bool {
        let before = self.flags;
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
        before != self.flags
    }
}

/// What the host draws for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContent {
    pub id: NodeId,
    pub kind: NodeKind,
    pub title: String,
    pub status: NodeStatus,
    pub priority: Option<Priority>,
    pub assignee: Option<String>,
    pub progress: Option<f64>,
    pub shape: NodeShape,
    pub icon: &'static str,
    pub shows_progress: bool,
    pub x: f32,
    pub y: f32,
}

impl NodeContent {
    pub fn new(node: &Node, position: &NodePosition) -> Self {
        let caps = node.kind.capabilities();
        Self {
            id: node.id.clone(),
            kind: node.kind,
            title: node.title.clone(),
            status: node.status,
            priority: node.priority,
            assignee: node.assignee.clone(),
            progress: node.progress.filter(|_| caps.shows_progress),
            shape: caps.shape,
            icon: caps.icon,
            shows_progress: caps.shows_progress,
            x: position.x,
            y: position.y,
        }
    }
}

/// Engine-side record of one created view.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub content: NodeContent,
    pub content_hash: u64,
    pub flags: ViewFlags,
    /// LOD last sent for this view, if it has been shown.
    pub lod: Option<LodLevel>,
}

impl NodeView {
    pub fn is_shown(&self) -> bool {
        self.flags.has(ViewFlags::SHOWN)
    }
}

/// Supplementary marker attached to a node by asynchronous enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: NodeId,
    pub label: String,
}

/// Instruction for the host renderer. Drained in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ViewCommand {
    /// Destroy every view.
    Teardown,
    CreateView { view: NodeContent },
    DrawGroups { groups: Vec<GroupBounds> },
    Show { id: NodeId, lod: LodLevel },
    Hide { id: NodeId },
    ApplyLod { lod: LodLevel, ids: Vec<NodeId> },
    UpdateContent { view: NodeContent },
    SetSelected { id: NodeId, selected: bool },
    SetHovered { id: Option<NodeId> },
    Highlight {
        id: NodeId,
        upstream: Vec<NodeId>,
        downstream: Vec<NodeId>,
    },
    ClearHighlight,
    SetBadges { badges: Vec<Badge> },
    ClearBadges,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = ViewFlags::default();
        assert!(flags.set(ViewFlags::SELECTED, true));
        assert!(!flags.set(ViewFlags::SELECTED, true));
        assert!(flags.has(ViewFlags::SELECTED));
        assert!(!flags.has(ViewFlags::SHOWN));
        assert!(flags.set(ViewFlags::SELECTED, false));
        assert_eq!(flags, ViewFlags::default());
    }

    #[test]
    fn test_content_respects_capabilities() {
        let mut task = Node::new("t", NodeKind::Task, "Task");
        task.progress = Some(50.0);
        let pos = NodePosition {
            id: "t".into(),
            x: 10.0,
            y: 20.0,
            layer: 0,
        };
        let content = NodeContent::new(&task, &pos);
        assert_eq!(content.shape, NodeShape::Pill);
        assert_eq!(content.progress, None);

        let mut root = Node::new("r", NodeKind::Root, "Root");
        root.progress = Some(50.0);
        assert_eq!(NodeContent::new(&root, &pos).progress, Some(50.0));
    }

    #[test]
    fn test_command_serialization() {
        let cmd = ViewCommand::Show {
            id: "a".into(),
            lod: LodLevel::Meso,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "show", "id": "a", "lod": "meso" }));
        assert_eq!(
            serde_json::to_value(&ViewCommand::Teardown).unwrap(),
            serde_json::json!({ "op": "teardown" })
        );
    }
}
