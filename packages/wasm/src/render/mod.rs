//! Render orchestration.
//!
//! The engine never touches the DOM. It keeps per-node view state and
//! emits `ViewCommand`s that the host drains and applies.

mod controller;
mod hover;
mod lod;
mod view;

pub use controller::{HoverEvent, RenderController};
pub use hover::{HoverImpact, HoverTracker};
pub use lod::LodLevel;
pub use view::{Badge, NodeContent, NodeView, ViewCommand, ViewFlags};
