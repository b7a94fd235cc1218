//! Planview - WASM Module
//!
//! Layout and viewport engine for project dependency graphs. It is compiled
//! to WebAssembly and exposes a JavaScript-friendly API via wasm-bindgen.
//! The host owns the DOM; the engine hands it a queue of view commands.
//!
//! # Architecture
//!
//! - `graph`: Snapshot model, sanitization, change classification, petgraph topology
//! - `layout`: Layered (Sugiyama) layout with grid snapping, groups and a result cache
//! - `spatial`: R-tree spatial indexing for viewport culling and hit testing
//! - `routing`: Orthogonal A* edge router on the layout grid
//! - `interaction`: Selection and filtering
//! - `viewport`: Pan/zoom state and coordinate conversion
//! - `render`: Culling, level of detail, hover impact and view diffing

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::Function;
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use tracing::{Level, warn};
use wasm_bindgen::prelude::*;

pub mod config;
#[cfg(any(debug_assertions, feature = "introspection"))]
pub mod debug;
pub mod error;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod interaction;
pub mod layout;
pub mod logging;
pub mod render;
pub mod routing;
pub mod spatial;
pub mod viewport;

use config::EngineConfig;
use error::EngineError;
use geometry::Point;
use graph::{ChangeKind, GraphSnapshot, NodeStatus, Priority, TraversalDirection};
use interaction::{FilterCriteria, FilterKey, FilterManager, SelectionManager};
use render::{Badge, RenderController};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Install console logging at `level` (`trace`..`error`).
///
/// Must run before the first engine is constructed to take effect; returns
/// the level that is active.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: &str) -> Result<String, JsValue> {
    let level = logging::parse_level(level).ok_or_else(|| {
        EngineError::Payload {
            what: "log level",
            message: format!("unknown level `{level}`"),
        }
    })?;
    Ok(logging::init_logging(level).to_string().to_lowercase())
}

type CallbackSlot = Rc<RefCell<Option<Function>>>;

/// Call the host callback in `slot`, if any, with the value `arg` builds.
fn notify<F>(slot: &CallbackSlot, arg: F)
where
    F: FnOnce() -> Result<JsValue, EngineError>,
{
    let slot = slot.borrow();
    let Some(callback) = slot.as_ref() else {
        return;
    };
    match arg() {
        Ok(value) => {
            if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                warn!(error = ?err, "host callback threw");
            }
        }
        Err(err) => warn!(error = %err, "could not encode callback payload"),
    }
}

fn to_js<T: Serialize + ?Sized>(what: &'static str, value: &T) -> Result<JsValue, EngineError> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| EngineError::encode(what, err))
}

fn from_js<T: serde::de::DeserializeOwned>(
    what: &'static str,
    value: JsValue,
) -> Result<T, EngineError> {
    serde_wasm_bindgen::from_value(value).map_err(|err| EngineError::payload(what, err))
}

fn id_or_null(id: Option<&str>) -> JsValue {
    id.map_or(JsValue::NULL, JsValue::from_str)
}

/// Main entry point for the plan view engine.
///
/// This struct wraps the internal RenderController and provides the public
/// API exposed to JavaScript.
#[wasm_bindgen]
pub struct PlanViewWasm {
    controller: RenderController,
    selection_dirty: Rc<Cell<bool>>,
    selection_callback: CallbackSlot,
    hover_callback: CallbackSlot,
    viewport_callback: CallbackSlot,
    filter_callback: CallbackSlot,
}

impl PlanViewWasm {
    /// Build an engine from an already decoded configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init_logging(Level::WARN);

        let mut controller = RenderController::new(config);
        let selection_dirty = Rc::new(Cell::new(false));
        let selection_callback = CallbackSlot::default();
        let hover_callback = CallbackSlot::default();
        let viewport_callback = CallbackSlot::default();
        let filter_callback = CallbackSlot::default();

        {
            let dirty = Rc::clone(&selection_dirty);
            controller.on_selection_change(move |_| dirty.set(true));
        }
        {
            let slot = Rc::clone(&hover_callback);
            controller.on_hover_change(move |event| {
                notify(&slot, || Ok(id_or_null(event.id.as_ref().map(|id| id.as_str()))));
            });
        }
        {
            let slot = Rc::clone(&viewport_callback);
            controller.on_viewport_change(move |state| notify(&slot, || to_js("viewport", state)));
        }
        {
            let slot = Rc::clone(&filter_callback);
            controller
                .on_filter_change(move |event| notify(&slot, || to_js("filter event", event)));
        }

        Ok(Self {
            controller,
            selection_dirty,
            selection_callback,
            hover_callback,
            viewport_callback,
            filter_callback,
        })
    }

    pub fn controller(&self) -> &RenderController {
        &self.controller
    }

    /// Apply a decoded snapshot.
    pub fn load(&mut self, snapshot: GraphSnapshot) -> ChangeKind {
        let kind = self.controller.apply_snapshot(snapshot);
        self.flush_selection();
        kind
    }

    /// Selection manager events only say what changed; listeners get the
    /// primary id, read once the operation has finished.
    fn flush_selection(&mut self) {
        if !self.selection_dirty.replace(false) {
            return;
        }
        let primary = self.controller.selection().primary().map(|id| id.as_str());
        notify(&self.selection_callback, || Ok(id_or_null(primary)));
    }

    fn select<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(&mut SelectionManager) -> bool,
    {
        let changed = self.controller.with_selection(op);
        self.flush_selection();
        changed
    }
}

#[wasm_bindgen]
impl PlanViewWasm {
    /// Create an engine. `config` may be omitted, or a partial
    /// `EngineConfig` object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<PlanViewWasm, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            from_js("config", config)?
        };
        Ok(Self::with_config(config)?)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Apply a `{ nodes, edges, groups? }` snapshot.
    ///
    /// Returns `"no_op"`, `"data_only"` or `"structural"`.
    #[wasm_bindgen(js_name = setSnapshot)]
    pub fn set_snapshot(&mut self, snapshot: JsValue) -> Result<String, JsValue> {
        let snapshot: GraphSnapshot = from_js("snapshot", snapshot)?;
        Ok(self.load(snapshot).as_str().to_string())
    }

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> usize {
        self.controller.graph().node_count()
    }

    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> usize {
        self.controller.graph().edge_count()
    }

    /// Drain the queued view commands as an array of `{ op, ... }` objects.
    #[wasm_bindgen(js_name = takeCommands)]
    pub fn take_commands(&mut self) -> Result<JsValue, JsValue> {
        let commands = self.controller.take_commands();
        Ok(to_js("view commands", &commands)?)
    }

    /// The active layout (positions, layers, groups, diagnostics).
    #[wasm_bindgen(js_name = getLayout)]
    pub fn get_layout(&self) -> Result<JsValue, JsValue> {
        Ok(to_js("layout", self.controller.layout().as_ref())?)
    }

    // =========================================================================
    // Viewport
    // =========================================================================

    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        self.controller.with_viewport(|vp| vp.resize(width, height))
    }

    /// Pan by a screen-space drag delta.
    #[wasm_bindgen(js_name = panBy)]
    pub fn pan_by(&mut self, dx: f32, dy: f32) -> bool {
        self.controller.with_viewport(|vp| vp.pan_by(dx, dy))
    }

    /// Wheel zoom around a screen point.
    #[wasm_bindgen(js_name = zoomAt)]
    pub fn zoom_at(&mut self, factor: f32, screen_x: f32, screen_y: f32) -> bool {
        self.controller
            .with_viewport(|vp| vp.zoom_at(factor, Point::new(screen_x, screen_y)))
    }

    #[wasm_bindgen(js_name = setScale)]
    pub fn set_scale(&mut self, scale: f32) -> bool {
        self.controller.with_viewport(|vp| vp.set_scale(scale))
    }

    #[wasm_bindgen(js_name = centerOn)]
    pub fn center_on(&mut self, x: f32, y: f32) -> bool {
        self.controller.with_viewport(|vp| vp.center_on(Point::new(x, y)))
    }

    /// Center the view on a laid-out node.
    #[wasm_bindgen(js_name = centerOnNode)]
    pub fn center_on_node(&mut self, id: &str) -> bool {
        let Some(center) = self.controller.layout().position(id).map(|p| p.center()) else {
            return false;
        };
        self.controller.with_viewport(|vp| vp.center_on(center))
    }

    #[wasm_bindgen(js_name = fitToLayout)]
    pub fn fit_to_layout(&mut self) -> bool {
        self.controller.fit_to_layout()
    }

    /// `{ x, y, width, height, scale }`.
    #[wasm_bindgen(js_name = getViewport)]
    pub fn get_viewport(&self) -> Result<JsValue, JsValue> {
        Ok(to_js("viewport", &self.controller.viewport().state())?)
    }

    #[wasm_bindgen(js_name = screenToWorld)]
    pub fn screen_to_world(&self, x: f32, y: f32) -> Vec<f32> {
        let p = self.controller.viewport().screen_to_world(Point::new(x, y));
        vec![p.x, p.y]
    }

    #[wasm_bindgen(js_name = worldToScreen)]
    pub fn world_to_screen(&self, x: f32, y: f32) -> Vec<f32> {
        let p = self.controller.viewport().world_to_screen(Point::new(x, y));
        vec![p.x, p.y]
    }

    #[wasm_bindgen(js_name = visibleIds)]
    pub fn visible_ids(&self) -> Vec<String> {
        self.controller.visible_ids().iter().map(|id| id.to_string()).collect()
    }

    // =========================================================================
    // Pointer Input
    // =========================================================================

    /// Node under a screen point, if it is shown.
    pub fn pick(&self, screen_x: f32, screen_y: f32) -> Option<String> {
        self.controller.pick(screen_x, screen_y).map(|id| id.to_string())
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, screen_x: f32, screen_y: f32, now_ms: f64) {
        self.controller.pointer_move(screen_x, screen_y, now_ms);
    }

    #[wasm_bindgen(js_name = pointerLeave)]
    pub fn pointer_leave(&mut self, now_ms: f64) {
        self.controller.pointer_leave(now_ms);
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, screen_x: f32, screen_y: f32, multi: bool) -> bool {
        let changed = self.controller.pointer_down(screen_x, screen_y, multi);
        self.flush_selection();
        changed
    }

    /// Advance the clock. Returns true if a hover highlight was emitted.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.controller.tick(now_ms)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    #[wasm_bindgen(js_name = toggleSelect)]
    pub fn toggle_select(&mut self, id: &str, multi: bool) -> bool {
        self.select(|s| s.toggle_select(id, multi))
    }

    /// `direction` is `"upstream"`, `"downstream"` or `"both"`.
    #[wasm_bindgen(js_name = selectDependencyChain)]
    pub fn select_dependency_chain(
        &mut self,
        id: &str,
        direction: JsValue,
    ) -> Result<bool, JsValue> {
        let direction: TraversalDirection = from_js("direction", direction)?;
        Ok(self.select(|s| s.select_dependency_chain(id, direction)))
    }

    #[wasm_bindgen(js_name = selectAll)]
    pub fn select_all(&mut self) -> bool {
        self.select(SelectionManager::select_all)
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&mut self) -> bool {
        self.select(SelectionManager::clear_selection)
    }

    #[wasm_bindgen(js_name = selectedIds)]
    pub fn selected_ids(&self) -> Vec<String> {
        self.controller
            .selection()
            .selected()
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    #[wasm_bindgen(js_name = toggleStatus)]
    pub fn toggle_status(&mut self, status: JsValue) -> Result<bool, JsValue> {
        let status: NodeStatus = from_js("status", status)?;
        Ok(self.controller.with_filter(|f| f.toggle_status(status)))
    }

    #[wasm_bindgen(js_name = togglePriority)]
    pub fn toggle_priority(&mut self, priority: JsValue) -> Result<bool, JsValue> {
        let priority: Priority = from_js("priority", priority)?;
        Ok(self.controller.with_filter(|f| f.toggle_priority(priority)))
    }

    #[wasm_bindgen(js_name = toggleAssignee)]
    pub fn toggle_assignee(&mut self, assignee: &str) -> bool {
        self.controller.with_filter(|f| f.toggle_assignee(assignee))
    }

    #[wasm_bindgen(js_name = toggleGroup)]
    pub fn toggle_group(&mut self, group: &str) -> bool {
        self.controller.with_filter(|f| f.toggle_group(group))
    }

    #[wasm_bindgen(js_name = setSearchText)]
    pub fn set_search_text(&mut self, text: &str) -> bool {
        self.controller.with_filter(|f| f.set_search_text(text))
    }

    /// Merge a partial criteria object into the active one.
    #[wasm_bindgen(js_name = updateCriteria)]
    pub fn update_criteria(&mut self, partial: JsValue) -> Result<bool, JsValue> {
        let partial: FilterCriteria = from_js("filter criteria", partial)?;
        Ok(self.controller.with_filter(|f| f.update_criteria(partial)))
    }

    #[wasm_bindgen(js_name = clearCriterion)]
    pub fn clear_criterion(&mut self, key: JsValue) -> Result<bool, JsValue> {
        let key: FilterKey = from_js("filter key", key)?;
        Ok(self.controller.with_filter(|f| f.clear_criterion(key)))
    }

    #[wasm_bindgen(js_name = clearFilter)]
    pub fn clear_filter(&mut self) -> bool {
        self.controller.with_filter(FilterManager::clear_filter)
    }

    #[wasm_bindgen(js_name = getCriteria)]
    pub fn get_criteria(&self) -> Result<JsValue, JsValue> {
        Ok(to_js("filter criteria", self.controller.filter().criteria())?)
    }

    // =========================================================================
    // Drill-down, Routing, Enrichment
    // =========================================================================

    #[wasm_bindgen(js_name = drillDown)]
    pub fn drill_down(&mut self, id: &str) -> bool {
        self.controller.drill_down(id)
    }

    #[wasm_bindgen(js_name = exitDrillDown)]
    pub fn exit_drill_down(&mut self) -> bool {
        self.controller.exit_drill_down()
    }

    #[wasm_bindgen(js_name = drillRoot)]
    pub fn drill_root(&self) -> Option<String> {
        self.controller.drill_root().map(|id| id.to_string())
    }

    /// Orthogonal routes for every edge whose endpoints are both visible.
    #[wasm_bindgen(js_name = routeVisibleEdges)]
    pub fn route_visible_edges(&self) -> Result<JsValue, JsValue> {
        let routes = self.controller.route_visible_edges();
        Ok(to_js("edge routes", &routes)?)
    }

    /// Install enrichment badges (`[{ id, label }]`). A payload that does
    /// not decode clears the badges instead of failing.
    #[wasm_bindgen(js_name = applyEnrichment)]
    pub fn apply_enrichment(&mut self, badges: JsValue) -> usize {
        let decoded: Result<Vec<Badge>, EngineError> = from_js("badges", badges);
        self.controller.apply_enrichment(decoded)
    }

    /// Report a failed enrichment request; badges are cleared.
    #[wasm_bindgen(js_name = enrichmentFailed)]
    pub fn enrichment_failed(&mut self, message: &str) -> usize {
        self.controller.apply_enrichment::<&str>(Err(message))
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    /// `callback(selectedId | null)`. Pass `null` to remove.
    #[wasm_bindgen(js_name = onSelectionChange)]
    pub fn on_selection_change(&mut self, callback: Option<Function>) {
        *self.selection_callback.borrow_mut() = callback;
    }

    /// `callback(hoveredId | null)`.
    #[wasm_bindgen(js_name = onHoverChange)]
    pub fn on_hover_change(&mut self, callback: Option<Function>) {
        *self.hover_callback.borrow_mut() = callback;
    }

    /// `callback({ x, y, width, height, scale })`.
    #[wasm_bindgen(js_name = onViewportChange)]
    pub fn on_viewport_change(&mut self, callback: Option<Function>) {
        *self.viewport_callback.borrow_mut() = callback;
    }

    /// `callback({ criteria, visible_count, total_count })`.
    #[wasm_bindgen(js_name = onFilterChange)]
    pub fn on_filter_change(&mut self, callback: Option<Function>) {
        *self.filter_callback.borrow_mut() = callback;
    }
}

// =========================================================================
// Introspection
// =========================================================================

#[cfg(any(debug_assertions, feature = "introspection"))]
#[wasm_bindgen]
impl PlanViewWasm {
    /// Counts, diagnostics and interaction state for debugging tools.
    #[wasm_bindgen(js_name = debugSnapshot)]
    pub fn debug_snapshot(&self) -> Result<JsValue, JsValue> {
        let snapshot = debug::DebugSnapshot::capture(&self.controller);
        Ok(to_js("debug snapshot", &snapshot)?)
    }
}
