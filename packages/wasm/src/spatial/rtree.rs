//! R-tree based spatial index using the rstar crate.
//!
//! Stores node bounding boxes and provides O(log n + k) queries for:
//! - Rectangle intersection (viewport virtualization)
//! - Point hit testing (pointer picking)

use rstar::{AABB, RTree, RTreeObject};
use serde::Serialize;
use tracing::{trace, warn};

use crate::geometry::Rect;
use crate::graph::NodeId;

/// An axis-aligned box in the spatial index with associated node ID.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialItem {
    /// The node identifier.
    pub id: NodeId,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl SpatialItem {
    pub fn new(id: impl Into<NodeId>, x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w,
            h,
        }
    }

    /// Item covering `rect`.
    pub fn from_rect(id: impl Into<NodeId>, rect: Rect) -> Self {
        Self::new(id, rect.x, rect.y, rect.width, rect.height)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
            && self.w >= 0.0
            && self.h >= 0.0
    }
}

impl RTreeObject for SpatialItem {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.x, self.y], [self.x + self.w, self.y + self.h])
    }
}

fn envelope_of(rect: &Rect) -> AABB<[f32; 2]> {
    AABB::from_corners([rect.x, rect.y], [rect.right(), rect.bottom()])
}

/// Spatial index for node boxes.
///
/// Uses an R*-tree for efficient spatial queries. `bounds` records the
/// region the index was last rebuilt for; items outside it are still
/// indexed and returned.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<SpatialItem>,
    bounds: Rect,
}

impl SpatialIndex {
    /// Create a new empty spatial index.
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            bounds: Rect::default(),
        }
    }

    /// Reset the index to an empty tree covering `bounds`.
    pub fn rebuild(&mut self, bounds: Rect) {
        self.tree = RTree::new();
        self.bounds = bounds;
    }

    /// Insert one item. Items with non-finite or negative geometry are
    /// rejected; returns whether the item was stored.
    pub fn insert(&mut self, item: SpatialItem) -> bool {
        if !item.is_valid() {
            warn!(node = %item.id, "rejected spatial item with invalid geometry");
            return false;
        }
        if !self.bounds.intersects(&item.rect()) {
            trace!(node = %item.id, "spatial item outside index bounds");
        }
        self.tree.insert(item);
        true
    }

    /// Replace the contents with `items` in one bulk load.
    ///
    /// This is more efficient than incremental inserts for bulk updates.
    pub fn load(&mut self, bounds: Rect, items: Vec<SpatialItem>) {
        let total = items.len();
        let valid: Vec<SpatialItem> = items.into_iter().filter(SpatialItem::is_valid).collect();
        if valid.len() < total {
            warn!(rejected = total - valid.len(), "rejected spatial items with invalid geometry");
        }
        self.tree = RTree::bulk_load(valid);
        self.bounds = bounds;
    }

    /// Clear all items from the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.bounds = Rect::default();
    }

    /// Items whose box intersects `rect`; touching edges count.
    pub fn query_rect(&self, rect: &Rect) -> Vec<SpatialItem> {
        if !rect.is_finite() {
            return Vec::new();
        }
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(rect))
            .cloned()
            .collect()
    }

    /// Ids of the items intersecting `rect`.
    pub fn query_ids(&self, rect: &Rect) -> Vec<NodeId> {
        if !rect.is_finite() {
            return Vec::new();
        }
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(rect))
            .map(|item| item.id.clone())
            .collect()
    }

    /// Topmost item containing the point. Overlaps resolve to the smallest
    /// id so the answer does not depend on tree shape.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<NodeId> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .map(|item| &item.id)
            .min()
            .cloned()
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Get the number of items in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[SpatialItem]) -> Vec<&str> {
        let mut out: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_insert_and_query() {
        let mut index = SpatialIndex::new();
        index.rebuild(Rect::new(0.0, 0.0, 100.0, 100.0));
        index.insert(SpatialItem::new("a", 0.0, 0.0, 10.0, 10.0));
        index.insert(SpatialItem::new("b", 20.0, 20.0, 10.0, 10.0));
        index.insert(SpatialItem::new("c", 50.0, 50.0, 10.0, 10.0));

        let found = index.query_rect(&Rect::new(5.0, 5.0, 20.0, 20.0));
        assert_eq!(ids(&found), vec!["a", "b"]);
    }

    #[test]
    fn test_touching_edges_count() {
        let mut index = SpatialIndex::new();
        index.insert(SpatialItem::new("a", 0.0, 0.0, 10.0, 10.0));
        let found = index.query_rect(&Rect::new(10.0, 10.0, 5.0, 5.0));
        assert_eq!(ids(&found), vec!["a"]);
    }

    #[test]
    fn test_rejects_invalid_geometry() {
        let mut index = SpatialIndex::new();
        assert!(!index.insert(SpatialItem::new("nan", f32::NAN, 0.0, 1.0, 1.0)));
        assert!(!index.insert(SpatialItem::new("neg", 0.0, 0.0, -1.0, 1.0)));
        assert!(index.insert(SpatialItem::new("ok", 0.0, 0.0, 1.0, 1.0)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_item_outside_bounds_still_found() {
        let mut index = SpatialIndex::new();
        index.rebuild(Rect::new(0.0, 0.0, 10.0, 10.0));
        index.insert(SpatialItem::new("far", 500.0, 500.0, 10.0, 10.0));
        assert_eq!(ids(&index.query_rect(&Rect::new(490.0, 490.0, 20.0, 20.0))), vec!["far"]);
    }

    #[test]
    fn test_hit_test() {
        let mut index = SpatialIndex::new();
        index.insert(SpatialItem::new("b", 0.0, 0.0, 20.0, 20.0));
        index.insert(SpatialItem::new("a", 10.0, 10.0, 20.0, 20.0));

        assert_eq!(index.hit_test(5.0, 5.0), Some(NodeId::from("b")));
        assert_eq!(index.hit_test(15.0, 15.0), Some(NodeId::from("a")));
        assert_eq!(index.hit_test(100.0, 100.0), None);
    }

    #[test]
    fn test_load_and_clear() {
        let mut index = SpatialIndex::new();
        index.insert(SpatialItem::new("old", 0.0, 0.0, 1.0, 1.0));

        let bounds = Rect::new(0.0, 0.0, 30.0, 30.0);
        index.load(
            bounds,
            vec![
                SpatialItem::new("1", 1.0, 1.0, 1.0, 1.0),
                SpatialItem::new("2", 2.0, 2.0, 1.0, 1.0),
                SpatialItem::new("3", 3.0, 3.0, 1.0, 1.0),
                SpatialItem::new("bad", f32::INFINITY, 3.0, 1.0, 1.0),
            ],
        );
        assert_eq!(index.len(), 3);
        assert_eq!(index.bounds(), bounds);
        assert!(index.hit_test(0.5, 0.5).is_none());

        index.clear();
        assert!(index.is_empty());
        assert!(index.query_rect(&bounds).is_empty());
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod property {
        use super::*;
        use proptest::prelude::*;

        fn arb_rect() -> impl Strategy<Value = (f32, f32, f32, f32)> {
            (-500.0f32..500.0, -500.0f32..500.0, 0.0f32..120.0, 0.0f32..120.0)
        }

        proptest! {
            #[test]
            fn test_query_matches_brute_force(
                boxes in prop::collection::vec(arb_rect(), 0..200),
                query in arb_rect(),
                bulk in any::<bool>(),
            ) {
                let items: Vec<SpatialItem> = boxes
                    .iter()
                    .enumerate()
                    .map(|(i, &(x, y, w, h))| SpatialItem::new(format!("n{i}"), x, y, w, h))
                    .collect();

                let mut index = SpatialIndex::new();
                if bulk {
                    index.load(Rect::default(), items.clone());
                } else {
                    index.rebuild(Rect::default());
                    for item in &items {
                        index.insert(item.clone());
                    }
                }

                let q = Rect::new(query.0, query.1, query.2, query.3);
                let mut expected: Vec<String> = items
                    .iter()
                    .filter(|item| item.rect().intersects(&q))
                    .map(|item| item.id.to_string())
                    .collect();
                expected.sort();

                let mut actual: Vec<String> = index
                    .query_rect(&q)
                    .into_iter()
                    .map(|item| item.id.to_string())
                    .collect();
                actual.sort();

                prop_assert_eq!(actual, expected);
            }
        }
    }
}
