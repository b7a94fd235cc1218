//! Layout algorithms for graph visualization.
//!
//! This module computes target positions for nodes: a deterministic layered
//! layout, group bounds, and a cache keyed on the graph structure.

pub mod engine;
mod groups;
pub mod layered;
pub mod result;

pub use engine::{LayoutEngine, LayoutStats};
pub use layered::count_crossings;
pub use result::{GroupBounds, GroupSpec, LayoutDiagnostics, LayoutResult, NodePosition};
