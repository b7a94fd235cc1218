//! Engine configuration.
//!
//! Every section deserializes with `#[serde(default)]`, so the host can pass
//! a partial object (or nothing) and get the stock geometry.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the whole engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub router: RouterConfig,
    pub viewport: ViewportConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Check every section for values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        self.router.validate()?;
        self.viewport.validate()?;
        self.render.validate()
    }
}

/// Geometry and heuristics for the layered layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Node box width (default: 160.0).
    pub node_width: f32,
    /// Node box height (default: 60.0).
    pub node_height: f32,
    /// Coordinate grid unit every position snaps to (default: 20.0).
    pub grid_unit: f32,
    /// Vertical distance between layers (default: 120.0).
    pub row_step: f32,
    /// Horizontal distance between neighbours in a layer (default: 200.0).
    pub column_step: f32,
    /// Margin around the whole drawing (default: 40.0).
    pub padding: f32,
    /// Minimum gap between two node boxes in a layer (default: 20.0).
    pub min_gap: f32,
    /// Padding around group bounds (default: 20.0).
    pub group_padding: f32,
    /// Barycenter down/up sweep iterations (default: 3).
    pub crossing_iterations: u32,
    /// Group colors, assigned in component-discovery order.
    pub palette: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 160.0,
            node_height: 60.0,
            grid_unit: 20.0,
            row_step: 120.0,
            column_step: 200.0,
            padding: 40.0,
            min_gap: 20.0,
            group_padding: 20.0,
            crossing_iterations: 3,
            palette: [
                "#4e79a7", "#f28e2b", "#59a14f", "#e15759", "#76b7b2", "#edc948", "#b07aa1",
                "#9c755f",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}

impl LayoutConfig {
    #[inline]
    pub fn half_width(&self) -> f32 {
        self.node_width * 0.5
    }

    #[inline]
    pub fn half_height(&self) -> f32 {
        self.node_height * 0.5
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("layout.node_width", self.node_width)?;
        positive("layout.node_height", self.node_height)?;
        positive("layout.grid_unit", self.grid_unit)?;
        positive("layout.row_step", self.row_step)?;
        positive("layout.column_step", self.column_step)?;
        non_negative("layout.padding", self.padding)?;
        non_negative("layout.min_gap", self.min_gap)?;
        non_negative("layout.group_padding", self.group_padding)?;
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        Ok(())
    }
}

/// Budget and cost model for the orthogonal router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Maximum A* node expansions before falling back (default: 20000).
    pub max_expansions: usize,
    /// Extra grid cells around the endpoints searched for detours (default: 6).
    pub search_margin_cells: u32,
    /// Hard cap on the number of grid points in a search window (default: 250000).
    pub max_grid_cells: usize,
    /// Cost of a bend, in straight steps (default: 2).
    pub turn_penalty_steps: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_expansions: 20_000,
            search_margin_cells: 6,
            max_grid_cells: 250_000,
            turn_penalty_steps: 2,
        }
    }
}

impl RouterConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_expansions == 0 {
            return Err(ConfigError::NonPositive {
                field: "router.max_expansions",
                value: 0.0,
            });
        }
        if self.max_grid_cells == 0 {
            return Err(ConfigError::NonPositive {
                field: "router.max_grid_cells",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Pan/zoom limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub initial_scale: f32,
    /// Screen margin kept around content by `fit_to` (default: 40.0).
    pub fit_margin: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.05,
            max_scale: 4.0,
            initial_scale: 1.0,
            fit_margin: 40.0,
        }
    }
}

impl ViewportConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("viewport.min_scale", self.min_scale)?;
        positive("viewport.max_scale", self.max_scale)?;
        positive("viewport.initial_scale", self.initial_scale)?;
        non_negative("viewport.fit_margin", self.fit_margin)?;
        if self.min_scale > self.max_scale {
            return Err(ConfigError::ScaleRange {
                min: self.min_scale,
                max: self.max_scale,
            });
        }
        Ok(())
    }
}

/// Level-of-detail thresholds and render-loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Below this scale nodes render as bare shapes (default: 0.3).
    pub macro_below: f32,
    /// Below this scale nodes render with their id only (default: 0.7).
    pub meso_below: f32,
    /// Screen-space padding added around the viewport before culling (default: 120.0).
    pub viewport_padding: f32,
    /// Quiet period before hover impact analysis runs, in ms (default: 300.0).
    pub hover_debounce_ms: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            macro_below: 0.3,
            meso_below: 0.7,
            viewport_padding: 120.0,
            hover_debounce_ms: 300.0,
        }
    }
}

impl RenderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.macro_below > 0.0 && self.macro_below < self.meso_below;
        if !(ordered && self.meso_below.is_finite()) {
            return Err(ConfigError::LodThresholds {
                macro_below: self.macro_below,
                meso_below: self.meso_below,
            });
        }
        non_negative("render.viewport_padding", self.viewport_padding)?;
        non_negative("render.hover_debounce_ms", self.hover_debounce_ms as f32)
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}
