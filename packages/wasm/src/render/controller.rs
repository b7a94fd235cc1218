//! RenderController - reconciles snapshots, layout, culling and LOD into a
//! queue of view commands.
//!
//! Handlers run to completion before returning, so the visible set, the LOD
//! level and the active layout are never observed half-updated.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::mem;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::hover::{HoverImpact, HoverTracker};
use super::lod::LodLevel;
use super::view::{Badge, NodeContent, NodeView, ViewCommand, ViewFlags};
use crate::config::EngineConfig;
use crate::events::{SubscriptionId, Subscribers};
use crate::geometry::{Point, Rect};
use crate::graph::{
    ChangeKind, EdgeLayer, Fingerprint, GraphModel, GraphSnapshot, Node, NodeId, SanitizeReport,
    TraversalDirection, classify_change, node_content_hash,
};
use crate::interaction::{FilterEvent, FilterManager, SelectionEvent, SelectionManager};
use crate::layout::{LayoutEngine, LayoutResult};
use crate::routing::{EdgeRoute, OrthogonalRouter};
use crate::spatial::{SpatialIndex, SpatialItem};
use crate::viewport::{ViewportController, ViewportState};

/// Hover change as reported to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverEvent {
    pub id: Option<NodeId>,
}

pub struct RenderController {
    config: EngineConfig,
    layout_engine: LayoutEngine,
    spatial: SpatialIndex,
    router: OrthogonalRouter,
    selection: SelectionManager,
    filter: FilterManager,
    viewport: ViewportController,
    hover: HoverTracker,
    hover_subscribers: Subscribers<HoverEvent>,

    snapshot: GraphSnapshot,
    report: SanitizeReport,
    fingerprint: Option<Fingerprint>,
    graph: Rc<GraphModel>,
    full_layout: Rc<LayoutResult>,
    /// Layout currently on screen: the full one, or a drill-down subset.
    layout: Rc<LayoutResult>,
    drill_root: Option<NodeId>,

    views: BTreeMap<NodeId, NodeView>,
    visible: BTreeSet<NodeId>,
    lod: Option<LodLevel>,
    badges: BTreeMap<NodeId, Badge>,
    commands: Vec<ViewCommand>,
}

impl RenderController {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            layout_engine: LayoutEngine::new(config.layout.clone()),
            spatial: SpatialIndex::new(),
            router: OrthogonalRouter::new(config.layout.clone(), config.router.clone()),
            selection: SelectionManager::new(),
            filter: FilterManager::new(),
            viewport: ViewportController::new(config.viewport.clone()),
            hover: HoverTracker::new(config.render.hover_debounce_ms),
            hover_subscribers: Subscribers::new(),
            snapshot: GraphSnapshot::default(),
            report: SanitizeReport::default(),
            fingerprint: None,
            graph: Rc::new(GraphModel::new()),
            full_layout: Rc::new(LayoutResult::default()),
            layout: Rc::new(LayoutResult::default()),
            drill_root: None,
            views: BTreeMap::new(),
            visible: BTreeSet::new(),
            lod: None,
            badges: BTreeMap::new(),
            commands: Vec::new(),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn sanitize_report(&self) -> &SanitizeReport {
        &self.report
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn layout(&self) -> &Rc<LayoutResult> {
        &self.layout
    }

    pub fn layout_engine(&self) -> &LayoutEngine {
        &self.layout_engine
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn filter(&self) -> &FilterManager {
        &self.filter
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn hover(&self) -> &HoverTracker {
        &self.hover
    }

    pub fn drill_root(&self) -> Option<&NodeId> {
        self.drill_root.as_ref()
    }

    pub fn visible_ids(&self) -> &BTreeSet<NodeId> {
        &self.visible
    }

    pub fn lod(&self) -> Option<LodLevel> {
        self.lod
    }

    pub fn view(&self, id: &str) -> Option<&NodeView> {
        self.views.get(id)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn badges(&self) -> impl Iterator<Item = &Badge> {
        self.badges.values()
    }

    pub fn pending_commands(&self) -> &[ViewCommand] {
        &self.commands
    }

    /// Drain the queued view commands.
    pub fn take_commands(&mut self) -> Vec<ViewCommand> {
        mem::take(&mut self.commands)
    }

    pub fn on_hover_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&HoverEvent) + 'static,
    {
        self.hover_subscribers.subscribe(callback)
    }

    pub fn unsubscribe_hover(&mut self, id: SubscriptionId) -> bool {
        self.hover_subscribers.unsubscribe(id)
    }

    pub fn on_selection_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SelectionEvent) + 'static,
    {
        self.selection.on_change(callback)
    }

    pub fn on_filter_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&FilterEvent) + 'static,
    {
        self.filter.on_change(callback)
    }

    pub fn on_viewport_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ViewportState) + 'static,
    {
        self.viewport.on_change(callback)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Classify `snapshot` against the current one and react.
    pub fn apply_snapshot(&mut self, snapshot: GraphSnapshot) -> ChangeKind {
        let (snapshot, report) = snapshot.sanitize();
        if !report.is_clean() {
            debug!(
                duplicate_nodes = report.duplicate_nodes,
                dangling_edges = report.dangling_edges,
                duplicate_edges = report.duplicate_edges,
                normalized_fields = report.normalized_fields,
                "snapshot sanitized"
            );
        }

        let fingerprint = Fingerprint::of(&snapshot);
        let kind = classify_change(self.fingerprint.as_ref(), &fingerprint);
        self.fingerprint = Some(fingerprint);
        self.report = report;

        match kind {
            ChangeKind::NoOp => {}
            ChangeKind::DataOnly => self.apply_data_change(snapshot),
            ChangeKind::Structural => self.apply_structural_change(snapshot),
        }
        debug!(change = kind.as_str(), nodes = self.snapshot.nodes.len(), "snapshot applied");
        kind
    }

    fn apply_data_change(&mut self, snapshot: GraphSnapshot) {
        let previous: HashMap<&NodeId, u64> = self
            .snapshot
            .nodes
            .iter()
            .map(|n| (&n.id, node_content_hash(n)))
            .collect();
        let changed: HashSet<NodeId> = snapshot
            .nodes
            .iter()
            .filter(|n| previous.get(&n.id) != Some(&node_content_hash(n)))
            .map(|n| n.id.clone())
            .collect();

        self.snapshot = snapshot;
        self.refresh_graph();

        for node in self.snapshot.nodes.iter().filter(|n| changed.contains(&n.id)) {
            let Some(view) = self.views.get_mut(&node.id) else {
                continue;
            };
            let Some(position) = self.layout.positions.get(&node.id) else {
                continue;
            };
            view.content = NodeContent::new(node, position);
            view.content_hash = node_content_hash(node);
            self.commands.push(ViewCommand::UpdateContent {
                view: view.content.clone(),
            });
        }

        // Cache hit; only group labels can differ.
        let full = self
            .layout_engine
            .layout(&self.snapshot.nodes, &self.snapshot.edges, self.snapshot.groups.as_deref());
        let active = match self.drill_root.clone() {
            Some(root) => Rc::new(self.subset_layout(&root)),
            None => Rc::clone(&full),
        };
        if active.groups != self.layout.groups {
            self.commands.push(ViewCommand::DrawGroups {
                groups: active.groups.clone(),
            });
            self.layout = active;
        }
        self.full_layout = full;

        // Reference edges feed the hover impact.
        if let Some(impact) = self.hover.refresh(&self.graph).cloned() {
            self.highlight(impact);
        }

        let group_of = group_membership(&self.full_layout);
        self.filter.set_snapshot(&self.snapshot.nodes, &group_of);
        self.viewport_pass();
    }

    fn apply_structural_change(&mut self, snapshot: GraphSnapshot) {
        self.snapshot = snapshot;
        self.refresh_graph();
        self.clear_hover();
        self.badges.retain(|id, _| self.graph.contains(id.as_str()));

        self.full_layout = self
            .layout_engine
            .layout(&self.snapshot.nodes, &self.snapshot.edges, self.snapshot.groups.as_deref());
        if self.full_layout.diagnostics.has_cycles() {
            warn!(
                forced = self.full_layout.diagnostics.forced_nodes.len(),
                "snapshot contains structural cycles"
            );
        }

        let group_of = group_membership(&self.full_layout);
        self.filter.set_snapshot(&self.snapshot.nodes, &group_of);

        let active = match self.drill_root.clone() {
            Some(root) if self.graph.contains(root.as_str()) => Rc::new(self.subset_layout(&root)),
            Some(root) => {
                debug!(root = %root, "drill-down root vanished; showing full layout");
                self.drill_root = None;
                Rc::clone(&self.full_layout)
            }
            None => Rc::clone(&self.full_layout),
        };
        self.install_layout(active);
        info!(
            nodes = self.layout.positions.len(),
            layers = self.layout.layers.len(),
            groups = self.layout.groups.len(),
            "structural relayout"
        );
        self.viewport_pass();
    }

    fn refresh_graph(&mut self) {
        self.graph = Rc::new(GraphModel::from_parts(&self.snapshot.nodes, &self.snapshot.edges));
        self.selection.set_graph(Rc::clone(&self.graph));
    }

    /// Tear down every view and build new ones for `layout`.
    fn install_layout(&mut self, layout: Rc<LayoutResult>) {
        let (width, height) = (self.config.layout.node_width, self.config.layout.node_height);
        self.spatial.load(
            layout.bounds,
            layout
                .positions
                .values()
                .map(|p| {
                    SpatialItem::from_rect(p.id.clone(), Rect::centered(p.center(), width, height))
                })
                .collect(),
        );

        self.commands.push(ViewCommand::Teardown);
        self.views.clear();
        self.visible.clear();
        self.lod = None;

        let nodes: HashMap<&NodeId, &Node> =
            self.snapshot.nodes.iter().map(|n| (&n.id, n)).collect();
        for position in layout.positions.values() {
            let Some(node) = nodes.get(&position.id) else {
                continue;
            };
            let content = NodeContent::new(node, position);
            self.commands.push(ViewCommand::CreateView {
                view: content.clone(),
            });
            self.views.insert(
                position.id.clone(),
                NodeView {
                    content,
                    content_hash: node_content_hash(node),
                    flags: ViewFlags::default(),
                    lod: None,
                },
            );
        }
        self.commands.push(ViewCommand::DrawGroups {
            groups: layout.groups.clone(),
        });
        self.layout = layout;

        self.sync_selection();
        if !self.badges.is_empty() {
            self.commands.push(ViewCommand::SetBadges {
                badges: self.badges.values().cloned().collect(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Viewport culling
    // ------------------------------------------------------------------

    /// Recompute the visible set from the viewport, the spatial index and
    /// the filter, and emit commands only for what changed.
    pub fn viewport_pass(&mut self) {
        let world = self.viewport.world_viewport(self.config.render.viewport_padding);
        let filtered = self.filter.visible_ids();
        let next: BTreeSet<NodeId> = self
            .spatial
            .query_ids(&world)
            .into_iter()
            .filter(|id| filtered.contains(id) && self.views.contains_key(id))
            .collect();
        let lod = LodLevel::for_scale_with(self.viewport.scale(), &self.config.render);

        for id in self.visible.difference(&next) {
            if let Some(view) = self.views.get_mut(id) {
                view.flags.set(ViewFlags::SHOWN, false);
            }
            self.commands.push(ViewCommand::Hide { id: id.clone() });
        }

        let mut retained = Vec::new();
        for id in &next {
            let Some(view) = self.views.get_mut(id) else {
                continue;
            };
            if self.visible.contains(id) {
                retained.push(id.clone());
            } else {
                view.flags.set(ViewFlags::SHOWN, true);
                view.lod = Some(lod);
                self.commands.push(ViewCommand::Show { id: id.clone(), lod });
            }
        }

        if self.lod.is_some_and(|previous| previous != lod) && !retained.is_empty() {
            for id in &retained {
                if let Some(view) = self.views.get_mut(id) {
                    view.lod = Some(lod);
                }
            }
            debug!(lod = ?lod, count = retained.len(), "reapplying LOD");
            self.commands.push(ViewCommand::ApplyLod { lod, ids: retained });
        }

        self.visible = next;
        self.lod = Some(lod);
    }

    /// Apply a viewport operation and rerun culling if it changed anything.
    pub fn with_viewport<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(&mut ViewportController) -> bool,
    {
        let changed = op(&mut self.viewport);
        if changed {
            self.viewport_pass();
        }
        changed
    }

    /// Apply a filter operation and rerun culling if it changed anything.
    pub fn with_filter<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(&mut FilterManager) -> bool,
    {
        let changed = op(&mut self.filter);
        if changed {
            self.viewport_pass();
        }
        changed
    }

    /// Apply a selection operation and sync view selection flags.
    pub fn with_selection<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(&mut SelectionManager) -> bool,
    {
        let changed = op(&mut self.selection);
        if changed {
            self.sync_selection();
        }
        changed
    }

    /// Fit the active layout into the viewport.
    pub fn fit_to_layout(&mut self) -> bool {
        if self.layout.is_empty() {
            return false;
        }
        let bounds = self.layout.bounds;
        self.with_viewport(|vp| vp.fit_to(bounds))
    }

    fn sync_selection(&mut self) {
        let selected = self.selection.selected();
        for (id, view) in self.views.iter_mut() {
            let want = selected.contains(id);
            if view.flags.set(ViewFlags::SELECTED, want) {
                self.commands.push(ViewCommand::SetSelected {
                    id: id.clone(),
                    selected: want,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------

    /// Node under a screen point, among the shown ones.
    pub fn pick(&self, screen_x: f32, screen_y: f32) -> Option<NodeId> {
        let world = self.viewport.screen_to_world(Point::new(screen_x, screen_y));
        self.spatial
            .hit_test(world.x, world.y)
            .filter(|id| self.visible.contains(id))
    }

    pub fn pointer_move(&mut self, screen_x: f32, screen_y: f32, now_ms: f64) {
        let hit = self.pick(screen_x, screen_y);
        self.set_hover(hit, now_ms);
    }

    pub fn pointer_leave(&mut self, now_ms: f64) {
        self.set_hover(None, now_ms);
    }

    /// Click: toggle the node under the pointer; empty space clears the
    /// selection unless `multi`.
    pub fn pointer_down(&mut self, screen_x: f32, screen_y: f32, multi: bool) -> bool {
        match self.pick(screen_x, screen_y) {
            Some(id) => self.with_selection(|s| s.toggle_select(id.as_str(), multi)),
            None if !multi => self.with_selection(SelectionManager::clear_selection),
            None => false,
        }
    }

    /// Advance time; runs the debounced hover impact analysis when due.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let Some(impact) = self.hover.settle(&self.graph, now_ms).cloned() else {
            return false;
        };
        self.highlight(impact);
        true
    }

    fn highlight(&mut self, impact: HoverImpact) {
        for (id, view) in self.views.iter_mut() {
            view.flags.set(ViewFlags::HIGHLIGHTED, impact.contains(id));
        }
        debug!(
            node = %impact.id,
            upstream = impact.upstream.len(),
            downstream = impact.downstream.len(),
            "hover impact"
        );
        self.commands.push(ViewCommand::Highlight {
            id: impact.id.clone(),
            upstream: impact.upstream.into_iter().collect(),
            downstream: impact.downstream.into_iter().collect(),
        });
    }

    fn set_hover(&mut self, id: Option<NodeId>, now_ms: f64) {
        let previous_id = self.hover.hovered().cloned();
        let Some(previous_impact) = self.hover.update(id.clone(), now_ms) else {
            return;
        };
        self.apply_hover_change(previous_id, id, previous_impact);
    }

    fn clear_hover(&mut self) {
        let previous_id = self.hover.hovered().cloned();
        let previous_impact = self.hover.impact().cloned();
        self.hover.reset();
        if previous_id.is_some() {
            self.apply_hover_change(previous_id, None, previous_impact);
        }
    }

    fn apply_hover_change(
        &mut self,
        previous: Option<NodeId>,
        next: Option<NodeId>,
        impact: Option<HoverImpact>,
    ) {
        if let Some(view) = previous.as_ref().and_then(|id| self.views.get_mut(id)) {
            view.flags.set(ViewFlags::HOVERED, false);
        }
        if let Some(view) = next.as_ref().and_then(|id| self.views.get_mut(id)) {
            view.flags.set(ViewFlags::HOVERED, true);
        }
        if impact.is_some() {
            for view in self.views.values_mut() {
                view.flags.set(ViewFlags::HIGHLIGHTED, false);
            }
            self.commands.push(ViewCommand::ClearHighlight);
        }
        self.commands.push(ViewCommand::SetHovered { id: next.clone() });
        self.hover_subscribers.emit(&HoverEvent { id: next });
    }

    // ------------------------------------------------------------------
    // Drill-down
    // ------------------------------------------------------------------

    fn subset_layout(&mut self, root: &NodeId) -> LayoutResult {
        let mut ids: HashSet<NodeId> = self
            .graph
            .traverse(root.as_str(), TraversalDirection::Downstream, Some(EdgeLayer::Structural))
            .into_iter()
            .collect();
        ids.insert(root.clone());
        self.layout_engine
            .layout_subset(&self.snapshot.nodes, &self.snapshot.edges, &ids)
    }

    /// Show only `id` and its structural descendants.
    pub fn drill_down(&mut self, id: &str) -> bool {
        if !self.graph.contains(id) {
            debug!(id, "drill_down ignored unknown id");
            return false;
        }
        let root = NodeId::from(id);
        if self.drill_root.as_ref() == Some(&root) {
            return false;
        }
        let subset = self.subset_layout(&root);
        self.drill_root = Some(root);
        self.clear_hover();
        self.install_layout(Rc::new(subset));
        if !self.fit_to_layout() {
            self.viewport_pass();
        }
        true
    }

    /// Return to the full layout.
    pub fn exit_drill_down(&mut self) -> bool {
        if self.drill_root.take().is_none() {
            return false;
        }
        self.clear_hover();
        self.install_layout(Rc::clone(&self.full_layout));
        if !self.fit_to_layout() {
            self.viewport_pass();
        }
        true
    }

    // ------------------------------------------------------------------
    // Edges and enrichment
    // ------------------------------------------------------------------

    /// Routes for edges whose endpoints are both visible.
    pub fn route_visible_edges(&self) -> Vec<EdgeRoute> {
        let edges = self
            .snapshot
            .edges
            .iter()
            .filter(|e| self.visible.contains(&e.from) && self.visible.contains(&e.to));
        self.router.route_edges(edges, &self.layout.positions)
    }

    /// Install badges from asynchronous enrichment. Errors clear them and
    /// never affect the core render.
    pub fn apply_enrichment<E: std::fmt::Display>(
        &mut self,
        result: Result<Vec<Badge>, E>,
    ) -> usize {
        match result {
            Ok(badges) => {
                self.badges = badges
                    .into_iter()
                    .filter(|b| self.graph.contains(b.id.as_str()))
                    .map(|b| (b.id.clone(), b))
                    .collect();
                if self.badges.is_empty() {
                    self.commands.push(ViewCommand::ClearBadges);
                } else {
                    self.commands.push(ViewCommand::SetBadges {
                        badges: self.badges.values().cloned().collect(),
                    });
                }
                self.badges.len()
            }
            Err(err) => {
                warn!(error = %err, "enrichment failed; omitting badges");
                if !self.badges.is_empty() {
                    self.badges.clear();
                    self.commands.push(ViewCommand::ClearBadges);
                }
                0
            }
        }
    }
}

impl Default for RenderController {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn group_membership(layout: &LayoutResult) -> HashMap<NodeId, String> {
    layout
        .groups
        .iter()
        .flat_map(|g| g.members.iter().map(move |m| (m.clone(), g.id.clone())))
        .collect()
}
