//! Deterministic layered (Sugiyama-style) layout.
//!
//! # Algorithm Overview
//!
//! 1. **Ordering:** nodes sorted by (depth hint, kind, id), edges by
//!    (from, to, layer, relation), so every tie-break is reproducible.
//! 2. **Adjacency:** structural edges only; `depends_on[n]` holds n's parents
//!    and `depended_by[n]` its children. Self-loops are ignored.
//! 3. **Layering:** topological sweep. Layer 0 holds nodes without a parent;
//!    each following layer holds nodes whose parents are all placed. When no
//!    node is ready but some remain (a cycle), the first remaining node in
//!    sort order is forced into the next layer so the sweep terminates.
//! 4. **Depth hints:** an explicit `structural_depth` replaces the computed
//!    layer; layer values are then compacted to dense indices.
//! 5. **Crossing reduction:** barycenter heuristic, a fixed number of
//!    down/up sweeps.
//! 6. **Coordinates:** rows at `layer * row_step + padding`, each row
//!    centered, everything snapped to the grid.
//! 7. **Overlap pass:** forward and backward minimum-gap sweep per row.
//! 8. **Bounds** and **groups** (see `groups.rs`).
//!
//! Every phase is linear in nodes + edges except the barycenter sorts
//! (n log n per sweep, fixed sweep count).

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use super::groups::{build_groups, structural_components};
use super::result::{GroupSpec, LayoutDiagnostics, LayoutResult, NodePosition};
use crate::config::LayoutConfig;
use crate::geometry::{Rect, snap, snap_up};
use crate::graph::{Edge, Node, NodeId};

/// Sorted, deduplicated view of the input that every phase indexes into.
pub(crate) struct LayeredGraph<'a> {
    /// Nodes in deterministic sort order; a node's slot is its index here.
    pub nodes: Vec<&'a Node>,
    /// Parents of each slot (structural edges `parent -> slot`).
    pub depends_on: Vec<Vec<usize>>,
    /// Children of each slot.
    pub depended_by: Vec<Vec<usize>>,
    /// Structural `(parent, child)` slot pairs, sorted.
    pub structural_pairs: Vec<(usize, usize)>,
    pub diagnostics: LayoutDiagnostics,
}

impl<'a> LayeredGraph<'a> {
    /// Phases 1 and 2. `subset` restricts the node set (edges leaving it are
    /// excluded without being counted as dropped).
    pub fn build(nodes: &'a [Node], edges: &[Edge], subset: Option<&HashSet<NodeId>>) -> Self {
        let mut seen: HashSet<&str> = HashSet::with_capacity(nodes.len());
        let mut sorted: Vec<&Node> = nodes
            .iter()
            .filter(|n| seen.insert(n.id.as_str()))
            .collect();
        let known = seen;

        if let Some(subset) = subset {
            sorted.retain(|n| subset.contains(&n.id));
        }
        sorted.sort_by(|a, b| {
            (a.normalized_depth(), a.kind, &a.id).cmp(&(b.normalized_depth(), b.kind, &b.id))
        });

        let slot_of: HashMap<&str, usize> = sorted
            .iter()
            .enumerate()
            .map(|(slot, n)| (n.id.as_str(), slot))
            .collect();

        let mut sorted_edges: Vec<&Edge> = edges.iter().collect();
        sorted_edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut diagnostics = LayoutDiagnostics::default();
        let mut structural_pairs = Vec::new();
        for edge in sorted_edges {
            if !known.contains(edge.from.as_str()) || !known.contains(edge.to.as_str()) {
                diagnostics.dropped_edges += 1;
                continue;
            }
            if !edge.layer.is_structural() {
                continue;
            }
            let (Some(&from), Some(&to)) =
                (slot_of.get(edge.from.as_str()), slot_of.get(edge.to.as_str()))
            else {
                continue;
            };
            if from == to {
                diagnostics.self_loops += 1;
                continue;
            }
            structural_pairs.push((from, to));
        }
        structural_pairs.sort_unstable();
        structural_pairs.dedup();

        let n = sorted.len();
        let mut depends_on = vec![Vec::new(); n];
        let mut depended_by = vec![Vec::new(); n];
        for &(parent, child) in &structural_pairs {
            depends_on[child].push(parent);
            depended_by[parent].push(child);
        }

        Self {
            nodes: sorted,
            depends_on,
            depended_by,
            structural_pairs,
            diagnostics,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Phase 3: fallback layer per slot. Records forced nodes.
    pub fn fallback_layers(&mut self) -> Vec<usize> {
        let n = self.len();
        let mut layer_of = vec![usize::MAX; n];
        let mut remaining: Vec<usize> = self.depends_on.iter().map(Vec::len).collect();
        let mut frontier: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
        let mut placed = 0;
        let mut level = 0;

        while placed < n {
            if frontier.is_empty() {
                // Structural cycle: nothing is ready. Force the first
                // unplaced node so the sweep always terminates.
                let Some(forced) = (0..n).find(|&i| layer_of[i] == usize::MAX) else {
                    break;
                };
                self.diagnostics.forced_nodes.push(self.nodes[forced].id.clone());
                frontier.push(forced);
            }

            for &slot in &frontier {
                layer_of[slot] = level;
                placed += 1;
            }

            let mut next = Vec::new();
            for &slot in &frontier {
                for &child in &self.depended_by[slot] {
                    if layer_of[child] != usize::MAX {
                        continue;
                    }
                    remaining[child] = remaining[child].saturating_sub(1);
                    if remaining[child] == 0 {
                        next.push(child);
                    }
                }
            }
            next.sort_unstable();
            next.dedup();
            frontier = next;
            level += 1;
        }

        if !self.diagnostics.forced_nodes.is_empty() {
            warn!(
                forced = self.diagnostics.forced_nodes.len(),
                "structural cycle detected; forced nodes into layers"
            );
        }
        layer_of
    }

    /// Phase 4: apply depth hints and compact to dense layer indices.
    pub fn final_layers(&self, fallback: &[usize]) -> Vec<usize> {
        let raw: Vec<usize> = self
            .nodes
            .iter()
            .zip(fallback)
            .map(|(node, &fb)| node.depth().map_or(fb, |d| d as usize))
            .collect();

        let mut distinct: Vec<usize> = raw.clone();
        distinct.sort_unstable();
        distinct.dedup();
        let dense: HashMap<usize, usize> = distinct
            .iter()
            .enumerate()
            .map(|(index, &value)| (value, index))
            .collect();

        raw.iter().map(|value| dense[value]).collect()
    }
}

/// Phase 5: barycenter crossing reduction. `rows` holds slots per layer in
/// initial order and is reordered in place.
pub(crate) fn minimize_crossings(
    graph: &LayeredGraph<'_>,
    rows: &mut [Vec<usize>],
    iterations: u32,
) {
    if rows.len() < 2 {
        return;
    }

    let mut index_in_row = vec![0usize; graph.len()];
    for row in rows.iter() {
        for (index, &slot) in row.iter().enumerate() {
            index_in_row[slot] = index;
        }
    }
    let mut row_of = vec![0usize; graph.len()];
    for (r, row) in rows.iter().enumerate() {
        for &slot in row {
            row_of[slot] = r;
        }
    }

    for _ in 0..iterations {
        for r in 1..rows.len() {
            reorder_row(graph, rows, r, r - 1, &row_of, &mut index_in_row);
        }
        for r in (0..rows.len() - 1).rev() {
            reorder_row(graph, rows, r, r + 1, &row_of, &mut index_in_row);
        }
    }
}

fn reorder_row(
    graph: &LayeredGraph<'_>,
    rows: &mut [Vec<usize>],
    row: usize,
    reference: usize,
    row_of: &[usize],
    index_in_row: &mut [usize],
) {
    let mut keyed: Vec<(f32, usize, usize)> = rows[row]
        .iter()
        .enumerate()
        .map(|(previous, &slot)| {
            let mut sum = 0.0f32;
            let mut count = 0usize;
            for &other in graph.depends_on[slot].iter().chain(&graph.depended_by[slot]) {
                if row_of[other] == reference {
                    sum += index_in_row[other] as f32;
                    count += 1;
                }
            }
            let key = if count == 0 {
                previous as f32
            } else {
                sum / count as f32
            };
            (key, previous, slot)
        })
        .collect();

    keyed.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then_with(|| graph.nodes[a.2].id.cmp(&graph.nodes[b.2].id))
    });

    rows[row] = keyed.into_iter().map(|(_, _, slot)| slot).collect();
    for (index, &slot) in rows[row].iter().enumerate() {
        index_in_row[slot] = index;
    }
}

/// Phases 6 and 7: grid-snapped coordinates per slot.
pub(crate) fn assign_coordinates(
    rows: &[Vec<usize>],
    slot_count: usize,
    config: &LayoutConfig,
) -> Vec<(f32, f32)> {
    let mut coords = vec![(0.0f32, 0.0f32); slot_count];
    let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
    if widest == 0 {
        return coords;
    }

    let grid = config.grid_unit;
    let center_x = config.padding + (widest.saturating_sub(1)) as f32 * config.column_step * 0.5;
    let min_distance = snap_up(config.node_width + config.min_gap, grid);

    for (layer, row) in rows.iter().enumerate() {
        let y = snap(layer as f32 * config.row_step + config.padding, grid);
        let offset = (row.len().saturating_sub(1)) as f32 * 0.5;
        let mut xs: Vec<f32> = (0..row.len())
            .map(|i| snap(center_x + (i as f32 - offset) * config.column_step, grid))
            .collect();

        resolve_overlaps(&mut xs, min_distance);

        for (&slot, &x) in row.iter().zip(&xs) {
            coords[slot] = (x, y);
        }
    }
    coords
}

/// Forward then backward sweep enforcing `min_distance` between neighbours.
/// Inputs are on the grid and `min_distance` is a grid multiple, so the
/// outputs stay on the grid.
fn resolve_overlaps(xs: &mut [f32], min_distance: f32) {
    for i in 1..xs.len() {
        if xs[i] - xs[i - 1] < min_distance {
            xs[i] = xs[i - 1] + min_distance;
        }
    }
    for i in (0..xs.len().saturating_sub(1)).rev() {
        if xs[i + 1] - xs[i] < min_distance {
            xs[i] = xs[i + 1] - min_distance;
        }
    }
}

/// Run every phase. `subset` restricts the layout to the given ids.
pub(crate) fn compute_layout(
    nodes: &[Node],
    edges: &[Edge],
    groups: Option<&[GroupSpec]>,
    subset: Option<&HashSet<NodeId>>,
    config: &LayoutConfig,
) -> LayoutResult {
    let mut graph = LayeredGraph::build(nodes, edges, subset);
    let n = graph.len();
    if n == 0 {
        return LayoutResult {
            diagnostics: graph.diagnostics,
            ..LayoutResult::default()
        };
    }

    let fallback = graph.fallback_layers();
    let layer_of = graph.final_layers(&fallback);

    let layer_count = layer_of.iter().copied().max().map_or(0, |m| m + 1);
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
    for slot in 0..n {
        rows[layer_of[slot]].push(slot);
    }

    minimize_crossings(&graph, &mut rows, config.crossing_iterations);
    let coords = assign_coordinates(&rows, n, config);

    let mut positions = BTreeMap::new();
    for slot in 0..n {
        let id = graph.nodes[slot].id.clone();
        let (x, y) = coords[slot];
        positions.insert(
            id.clone(),
            NodePosition {
                id,
                x,
                y,
                layer: layer_of[slot],
            },
        );
    }

    let bounds = Rect::enclosing(coords.iter().map(|&(x, y)| {
        Rect::new(
            x - config.half_width(),
            y - config.half_height(),
            config.node_width,
            config.node_height,
        )
    }))
    .unwrap_or_default();

    let layers: Vec<Vec<NodeId>> = rows
        .iter()
        .map(|row| row.iter().map(|&slot| graph.nodes[slot].id.clone()).collect())
        .collect();

    let groups = match groups {
        Some(specs) => build_groups(specs, &graph, &layer_of, &positions, config),
        None => structural_components(&graph, &layer_of, &positions, config),
    };

    debug!(
        nodes = n,
        layers = layers.len(),
        groups = groups.len(),
        forced = graph.diagnostics.forced_nodes.len(),
        "layered layout computed"
    );

    LayoutResult {
        positions,
        bounds,
        layers,
        groups,
        diagnostics: graph.diagnostics,
    }
}

/// Number of edge crossings between adjacent rows; used by tests and the
/// debug snapshot to judge the barycenter pass.
pub fn count_crossings(result: &LayoutResult, edges: &[Edge]) -> usize {
    let mut by_rows: HashMap<usize, Vec<(f32, f32)>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.layer.is_structural()) {
        let (Some(a), Some(b)) = (result.positions.get(&edge.from), result.positions.get(&edge.to))
        else {
            continue;
        };
        let (top, bottom) = if a.layer <= b.layer { (a, b) } else { (b, a) };
        if bottom.layer != top.layer + 1 {
            continue;
        }
        by_rows.entry(top.layer).or_default().push((top.x, bottom.x));
    }

    let mut crossings = 0;
    for segments in by_rows.values() {
        for i in 0..segments.len() {
            for j in (i + 1)..segments.len() {
                let (a0, a1) = segments[i];
                let (b0, b1) = segments[j];
                let upper = a0.partial_cmp(&b0).unwrap_or(Ordering::Equal);
                let lower = a1.partial_cmp(&b1).unwrap_or(Ordering::Equal);
                if upper != Ordering::Equal && lower != Ordering::Equal && upper != lower {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    fn task(id: &str) -> Node {
        Node::new(id, NodeKind::Task, format!("Title {id}"))
    }

    fn diamond() -> (Vec<Node>, Vec<Edge>) {
        (
            vec![task("A"), task("B"), task("C"), task("D")],
            vec![
                Edge::structural("A", "B"),
                Edge::structural("A", "C"),
                Edge::structural("B", "D"),
                Edge::structural("C", "D"),
            ],
        )
    }

    #[test]
    fn test_empty_graph() {
        let result = compute_layout(&[], &[], None, None, &LayoutConfig::default());
        assert!(result.is_empty());
        assert_eq!(result.bounds, Rect::default());
        assert!(result.layers.is_empty());
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_diamond_layers() {
        let (nodes, edges) = diamond();
        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());

        assert_eq!(result.layers.len(), 3);
        assert_eq!(result.layers[0], vec![NodeId::from("A")]);
        let mut middle = result.layers[1].clone();
        middle.sort();
        assert_eq!(middle, vec![NodeId::from("B"), NodeId::from("C")]);
        assert_eq!(result.layers[2], vec![NodeId::from("D")]);
        assert_eq!(result.layer_of("D"), Some(2));
    }

    #[test]
    fn test_children_below_parents_in_acyclic_graph() {
        // Three-level hierarchy with cross links between branches.
        let mut nodes = vec![task("root")];
        let mut edges = Vec::new();
        for o in 0..4 {
            let obj = format!("o{o}");
            nodes.push(task(&obj));
            edges.push(Edge::structural("root", obj.as_str()));
            for t in 0..3 {
                let id = format!("o{o}t{t}");
                nodes.push(task(&id));
                edges.push(Edge::structural(obj.as_str(), id.as_str()));
            }
        }
        edges.push(Edge::structural("o0t0", "o3t2"));
        edges.push(Edge::structural("o1", "o2t1"));

        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());
        for edge in &edges {
            let parent = result.layer_of(edge.from.as_str()).unwrap();
            let child = result.layer_of(edge.to.as_str()).unwrap();
            assert!(child > parent, "{} -> {}: {} !> {}", edge.from, edge.to, child, parent);
        }
        assert!(!result.diagnostics.has_cycles());
    }

    #[test]
    fn test_deterministic_regardless_of_input_order() {
        let (nodes, edges) = diamond();
        let first = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());

        let mut rev_nodes = nodes.clone();
        rev_nodes.reverse();
        let mut rev_edges = edges.clone();
        rev_edges.reverse();
        let second = compute_layout(&rev_nodes, &rev_edges, None, None, &LayoutConfig::default());

        assert_eq!(first, second);
    }

    #[test]
    fn test_cycle_is_forced_and_reported() {
        let nodes = vec![task("A"), task("B"), task("C")];
        let edges = vec![
            Edge::structural("A", "B"),
            Edge::structural("B", "C"),
            Edge::structural("C", "A"),
        ];
        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());

        assert_eq!(result.positions.len(), 3);
        assert_eq!(result.diagnostics.forced_nodes, vec![NodeId::from("A")]);
        assert_eq!(result.layer_of("A"), Some(0));
        assert_eq!(result.layer_of("B"), Some(1));
        assert_eq!(result.layer_of("C"), Some(2));
    }

    #[test]
    fn test_self_loop_ignored() {
        let nodes = vec![task("A")];
        let edges = vec![Edge::structural("A", "A")];
        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());
        assert_eq!(result.layer_of("A"), Some(0));
        assert_eq!(result.diagnostics.self_loops, 1);
        assert!(!result.diagnostics.has_cycles());
    }

    #[test]
    fn test_explicit_depth_overrides_and_compacts() {
        let mut nodes = vec![task("A"), task("B"), task("C")];
        nodes[2].structural_depth = Some(7.0);
        let edges = vec![Edge::structural("A", "B")];
        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());

        // Raw layers 0, 1, 7 compact to 0, 1, 2.
        assert_eq!(result.layer_of("A"), Some(0));
        assert_eq!(result.layer_of("B"), Some(1));
        assert_eq!(result.layer_of("C"), Some(2));
        assert_eq!(result.layers.len(), 3);
    }

    #[test]
    fn test_dangling_edges_dropped() {
        let nodes = vec![task("A"), task("B")];
        let edges = vec![Edge::structural("A", "B"), Edge::structural("ghost", "B")];
        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());
        assert_eq!(result.diagnostics.dropped_edges, 1);
        assert_eq!(result.layer_of("B"), Some(1));
    }

    #[test]
    fn test_coordinates_snapped_and_separated() {
        let config = LayoutConfig::default();
        let mut nodes = vec![task("root")];
        let mut edges = Vec::new();
        for i in 0..7 {
            let id = format!("c{i}");
            nodes.push(task(&id));
            edges.push(Edge::structural("root", id.as_str()));
        }
        let result = compute_layout(&nodes, &edges, None, None, &config);

        for pos in result.positions.values() {
            assert_eq!(pos.x % config.grid_unit, 0.0, "x off grid: {}", pos.x);
            assert_eq!(pos.y % config.grid_unit, 0.0, "y off grid: {}", pos.y);
        }

        let row: Vec<f32> = result.layers[1].iter().map(|id| result.positions[id].x).collect();
        for pair in row.windows(2) {
            assert!(pair[1] - pair[0] >= config.node_width + config.min_gap);
        }

        // Row y = layer * row_step + padding.
        assert_eq!(result.positions[&NodeId::from("root")].y, 40.0);
        assert_eq!(result.positions[&NodeId::from("c0")].y, 160.0);
    }

    #[test]
    fn test_overlap_pass_with_tight_columns() {
        let config = LayoutConfig {
            column_step: 50.0,
            ..LayoutConfig::default()
        };
        let nodes: Vec<Node> = (0..4).map(|i| task(&format!("n{i}"))).collect();
        let result = compute_layout(&nodes, &[], None, None, &config);
        let xs: Vec<f32> = result.layers[0].iter().map(|id| result.positions[id].x).collect();
        for pair in xs.windows(2) {
            assert!(pair[1] - pair[0] >= 180.0, "{:?}", xs);
        }
    }

    #[test]
    fn test_bounds_include_half_extents() {
        let config = LayoutConfig::default();
        let result = compute_layout(&[task("solo")], &[], None, None, &config);
        let pos = &result.positions[&NodeId::from("solo")];
        assert_eq!(result.bounds.x, pos.x - 80.0);
        assert_eq!(result.bounds.y, pos.y - 30.0);
        assert_eq!(result.bounds.width, 160.0);
        assert_eq!(result.bounds.height, 60.0);
    }

    #[test]
    fn test_barycenter_removes_avoidable_crossing() {
        // a1 -> b2, a2 -> b1: sorted order would cross, barycenter untangles.
        let nodes = vec![task("a1"), task("a2"), task("b1"), task("b2")];
        let mut nodes = nodes;
        nodes[2].structural_depth = Some(1.0);
        nodes[3].structural_depth = Some(1.0);
        let edges = vec![Edge::structural("a1", "b2"), Edge::structural("a2", "b1")];
        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());
        assert_eq!(count_crossings(&result, &edges), 0);
    }

    #[test]
    fn test_subset_layout() {
        let (nodes, edges) = diamond();
        let subset: HashSet<NodeId> = ["B", "D"].iter().map(|s| NodeId::from(*s)).collect();
        let result = compute_layout(&nodes, &edges, None, Some(&subset), &LayoutConfig::default());
        assert_eq!(result.positions.len(), 2);
        assert_eq!(result.layer_of("B"), Some(0));
        assert_eq!(result.layer_of("D"), Some(1));
        assert_eq!(result.diagnostics.dropped_edges, 0);
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod property {
        use super::*;
        use proptest::prelude::*;

        /// Node count and edges oriented from lower to higher index, so the
        /// graph is acyclic by construction.
        fn arb_dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
            (1usize..40).prop_flat_map(|n| {
                let pairs = prop::collection::vec((0..n, 0..n), 0..(n * 2)).prop_map(|pairs| {
                    pairs
                        .into_iter()
                        .filter(|(a, b)| a != b)
                        .map(|(a, b)| (a.min(b), a.max(b)))
                        .collect::<Vec<_>>()
                });
                (Just(n), pairs)
            })
        }

        proptest! {
            #[test]
            fn test_children_always_below_parents((n, pairs) in arb_dag()) {
                let nodes: Vec<Node> = (0..n).map(|i| task(&format!("n{i:02}"))).collect();
                let edges: Vec<Edge> = pairs
                    .iter()
                    .map(|(a, b)| Edge::structural(format!("n{a:02}"), format!("n{b:02}")))
                    .collect();

                let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());

                prop_assert_eq!(result.positions.len(), n);
                prop_assert!(!result.diagnostics.has_cycles());
                for edge in &edges {
                    let parent = result.layer_of(edge.from.as_str()).unwrap();
                    let child = result.layer_of(edge.to.as_str()).unwrap();
                    prop_assert!(
                        child > parent,
                        "{} -> {}: {} !> {}",
                        edge.from,
                        edge.to,
                        child,
                        parent
                    );
                }
            }
        }
    }
}
