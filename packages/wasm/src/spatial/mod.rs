//! Spatial indexing for O(log n) viewport queries and hit testing.
//!
//! This module provides an R-tree based spatial index over node bounding
//! boxes.

mod rtree;

pub use rtree::{SpatialIndex, SpatialItem};
