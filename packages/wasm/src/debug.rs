//! Introspection snapshot of the whole engine.
//!
//! Available in debug builds, or in release builds with the `introspection`
//! feature. The facade serializes it to a plain JS object.

use serde::Serialize;

use crate::graph::{NodeId, SanitizeReport};
use crate::interaction::FilterCriteria;
use crate::layout::{LayoutDiagnostics, LayoutStats};
use crate::render::{LodLevel, RenderController};
use crate::viewport::ViewportState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    pub node_count: usize,
    pub edge_count: usize,
    pub sanitize: SanitizeReport,
    pub layers: usize,
    pub groups: usize,
    pub diagnostics: LayoutDiagnostics,
    pub layout_stats: LayoutStats,
    pub selected: Vec<NodeId>,
    pub filter: FilterCriteria,
    pub filtered_count: usize,
    pub visible: Vec<NodeId>,
    pub view_count: usize,
    pub lod: Option<LodLevel>,
    pub viewport: ViewportState,
    pub drill_root: Option<NodeId>,
    pub hovered: Option<NodeId>,
    pub badge_count: usize,
    pub pending_commands: usize,
}

impl DebugSnapshot {
    pub fn capture(controller: &RenderController) -> Self {
        let layout = controller.layout();
        Self {
            node_count: controller.graph().node_count(),
            edge_count: controller.graph().edge_count(),
            sanitize: controller.sanitize_report().clone(),
            layers: layout.layers.len(),
            groups: layout.groups.len(),
            diagnostics: layout.diagnostics.clone(),
            layout_stats: controller.layout_engine().stats(),
            selected: controller.selection().selected().iter().cloned().collect(),
            filter: controller.filter().criteria().clone(),
            filtered_count: controller.filter().visible_ids().len(),
            visible: controller.visible_ids().iter().cloned().collect(),
            view_count: controller.view_count(),
            lod: controller.lod(),
            viewport: controller.viewport().state(),
            drill_root: controller.drill_root().cloned(),
            hovered: controller.hover().hovered().cloned(),
            badge_count: controller.badges().count(),
            pending_commands: controller.pending_commands().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, GraphSnapshot, Node, NodeKind};

    #[test]
    fn test_capture_reports_cycles() {
        let mut controller = RenderController::default();
        controller.apply_snapshot(GraphSnapshot::new(
            vec![
                Node::new("a", NodeKind::Task, "a"),
                Node::new("b", NodeKind::Task, "b"),
                Node::new("b", NodeKind::Task, "duplicate"),
            ],
            vec![Edge::structural("a", "b"), Edge::structural("b", "a")],
        ));

        let snapshot = DebugSnapshot::capture(&controller);
        assert_eq!(snapshot.node_count, 2);
        assert_eq!(snapshot.sanitize.duplicate_nodes, 1);
        assert_eq!(snapshot.diagnostics.forced_nodes.len(), 1);
        assert_eq!(snapshot.layout_stats.computed, 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["nodeCount"], 2);
        assert!(json["drillRoot"].is_null());
    }
}
