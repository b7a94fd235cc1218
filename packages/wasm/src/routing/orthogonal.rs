//! Orthogonal edge routing on the layout grid.
//!
//! Each route leaves the source through the center of the side facing the
//! target, steps out to the first grid line beyond the boundary (the stub),
//! searches a bounded window of grid points with A* while treating node boxes
//! as blocked, and enters the target the same way. When the search exceeds
//! its budget the route degrades to a direct two or four point polyline.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{LayoutConfig, RouterConfig};
use crate::geometry::{Point, Rect, snap, snap_up};
use crate::graph::{Edge, EdgeLayer, NodeId};
use crate::layout::NodePosition;

/// Cost of one grid step; turn penalties are multiples of it.
const STEP_COST: u32 = 10;

const EPSILON: f32 = 1e-3;

/// Side of a node box a route attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    fn is_vertical(self) -> bool {
        matches!(self, Side::Top | Side::Bottom)
    }

    /// Unit step pointing away from the node.
    fn outward(self) -> (i32, i32) {
        match self {
            Side::Left => (-1, 0),
            Side::Right => (1, 0),
            Side::Top => (0, -1),
            Side::Bottom => (0, 1),
        }
    }
}

/// A routed polyline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub points: Vec<Point>,
    pub used_fallback: bool,
}

impl Route {
    fn fallback(points: Vec<Point>) -> Self {
        Self {
            points,
            used_fallback: true,
        }
    }
}

/// Route of one edge, as handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRoute {
    pub from: NodeId,
    pub to: NodeId,
    pub layer: EdgeLayer,
    pub route: Route,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridState {
    x: i32,
    y: i32,
    dir: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridEntry {
    est: u32,
    cost: u32,
    state: GridState,
}

impl Ord for GridEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .cmp(&self.est)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| self.state.y.cmp(&other.state.y))
            .then_with(|| self.state.x.cmp(&other.state.x))
            .then_with(|| self.state.dir.cmp(&other.state.dir))
    }
}

impl PartialOrd for GridEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const DIRS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

fn dir_index(step: (i32, i32)) -> u8 {
    DIRS.iter().position(|&d| d == step).unwrap_or(0) as u8
}

/// Window of grid points searched for one route.
struct SearchGrid {
    origin: Point,
    unit: f32,
    cols: i32,
    rows: i32,
    blocked: Vec<bool>,
}

impl SearchGrid {
    fn index(&self, ix: i32, iy: i32) -> usize {
        (iy * self.cols + ix) as usize
    }

    fn cell_for(&self, p: Point) -> Option<(i32, i32)> {
        let ix = ((p.x - self.origin.x) / self.unit).round() as i32;
        let iy = ((p.y - self.origin.y) / self.unit).round() as i32;
        (ix >= 0 && iy >= 0 && ix < self.cols && iy < self.rows).then_some((ix, iy))
    }

    fn point(&self, ix: i32, iy: i32) -> Point {
        Point::new(
            self.origin.x + ix as f32 * self.unit,
            self.origin.y + iy as f32 * self.unit,
        )
    }

    /// Mark every grid point strictly inside `rect`.
    fn block(&mut self, rect: &Rect) {
        let lo_x = (((rect.x - self.origin.x) / self.unit).floor() as i32).max(0);
        let hi_x = (((rect.right() - self.origin.x) / self.unit).ceil() as i32).min(self.cols - 1);
        let lo_y = (((rect.y - self.origin.y) / self.unit).floor() as i32).max(0);
        let hi_y = (((rect.bottom() - self.origin.y) / self.unit).ceil() as i32).min(self.rows - 1);
        for iy in lo_y..=hi_y {
            for ix in lo_x..=hi_x {
                let p = self.point(ix, iy);
                if p.x > rect.x && p.x < rect.right() && p.y > rect.y && p.y < rect.bottom() {
                    let index = self.index(ix, iy);
                    self.blocked[index] = true;
                }
            }
        }
    }
}

/// Grid-based orthogonal router over laid-out node boxes.
#[derive(Debug, Clone, Default)]
pub struct OrthogonalRouter {
    layout: LayoutConfig,
    config: RouterConfig,
}

impl OrthogonalRouter {
    pub fn new(layout: LayoutConfig, config: RouterConfig) -> Self {
        Self { layout, config }
    }

    fn node_rect(&self, pos: &NodePosition) -> Rect {
        Rect::centered(pos.center(), self.layout.node_width, self.layout.node_height)
    }

    /// Route from `from` to `to`. Unknown endpoints give an empty fallback.
    pub fn route(&self, from: &str, to: &str, positions: &BTreeMap<NodeId, NodePosition>) -> Route {
        let (Some(source), Some(target)) = (positions.get(from), positions.get(to)) else {
            debug!(from, to, "route requested for unknown node");
            return Route::fallback(Vec::new());
        };

        if from == to {
            return Route::fallback(self.self_loop(&self.node_rect(source)));
        }

        let source_rect = self.node_rect(source);
        let target_rect = self.node_rect(target);
        let (source_side, target_side) = self.choose_sides(source, target);

        let start = port(&source_rect, source_side);
        let end = port(&target_rect, target_side);
        let start_stub = self.stub(start, source_side);
        let end_stub = self.stub(end, target_side);

        match self.search(start_stub, source_side, end_stub, positions) {
            Some(path) => {
                let mut points = Vec::with_capacity(path.len() + 2);
                points.push(start);
                points.extend(path);
                points.push(end);
                Route {
                    points: compress_path(&points),
                    used_fallback: false,
                }
            }
            None => {
                trace!(from, to, "grid search failed; using direct route");
                Route::fallback(self.direct_route(start, source_side, start_stub, end, end_stub))
            }
        }
    }

    /// Route each edge in order.
    pub fn route_edges<'a, I>(
        &self,
        edges: I,
        positions: &BTreeMap<NodeId, NodePosition>,
    ) -> Vec<EdgeRoute>
    where
        I: IntoIterator<Item = &'a Edge>,
    {
        edges
            .into_iter()
            .map(|edge| EdgeRoute {
                from: edge.from.clone(),
                to: edge.to.clone(),
                layer: edge.layer,
                route: self.route(edge.from.as_str(), edge.to.as_str(), positions),
            })
            .collect()
    }

    /// Vertical attachment when the offset is mostly vertical relative to
    /// the node's aspect ratio, horizontal otherwise.
    fn choose_sides(&self, source: &NodePosition, target: &NodePosition) -> (Side, Side) {
        let dx = target.x - source.x;
        let dy = target.y - source.y;
        if dy.abs() * self.layout.node_width >= dx.abs() * self.layout.node_height {
            if dy >= 0.0 {
                (Side::Bottom, Side::Top)
            } else {
                (Side::Top, Side::Bottom)
            }
        } else if dx >= 0.0 {
            (Side::Right, Side::Left)
        } else {
            (Side::Left, Side::Right)
        }
    }

    /// First grid point strictly outside the boundary, straight out of `port`.
    fn stub(&self, port: Point, side: Side) -> Point {
        let unit = self.layout.grid_unit;
        let outside = |v: f32| {
            let snapped = snap_up(v, unit);
            if (snapped - v).abs() < EPSILON { v + unit } else { snapped }
        };
        let inside = |v: f32| {
            let snapped = -snap_up(-v, unit);
            if (snapped - v).abs() < EPSILON { v - unit } else { snapped }
        };
        match side {
            Side::Right => Point::new(outside(port.x), snap(port.y, unit)),
            Side::Left => Point::new(inside(port.x), snap(port.y, unit)),
            Side::Bottom => Point::new(snap(port.x, unit), outside(port.y)),
            Side::Top => Point::new(snap(port.x, unit), inside(port.y)),
        }
    }

    fn search(
        &self,
        start: Point,
        start_side: Side,
        end: Point,
        positions: &BTreeMap<NodeId, NodePosition>,
    ) -> Option<Vec<Point>> {
        let unit = self.layout.grid_unit;
        if unit <= 0.0 || self.config.max_expansions == 0 {
            return None;
        }

        let margin = self.config.search_margin_cells as f32 * unit;
        let window = Rect::from_corners(start, end).inflate(margin);
        let origin = Point::new(snap(window.x, unit), snap(window.y, unit));
        // Sized in f64 so far-off positions from callers cannot overflow i32.
        let span = |extent: f32| (f64::from(extent) / f64::from(unit)).ceil().max(0.0) + 1.0;
        let (span_x, span_y) = (span(window.right() - origin.x), span(window.bottom() - origin.y));
        let area = span_x * span_y;
        if !area.is_finite() || area > self.config.max_grid_cells as f64 {
            trace!(area, "search window too large");
            return None;
        }
        let (cols, rows) = (span_x as i32, span_y as i32);
        let cells = cols as usize * rows as usize;

        let mut grid = SearchGrid {
            origin,
            unit,
            cols,
            rows,
            blocked: vec![false; cells],
        };
        let clearance = unit * 0.5;
        for pos in positions.values() {
            let rect = self.node_rect(pos).inflate(clearance);
            if rect.intersects(&window) {
                grid.block(&rect);
            }
        }

        let (start_ix, start_iy) = grid.cell_for(start)?;
        let (end_ix, end_iy) = grid.cell_for(end)?;
        if (start_ix, start_iy) == (end_ix, end_iy) {
            return Some(vec![start]);
        }

        let turn_penalty = self.config.turn_penalty_steps.saturating_mul(STEP_COST);
        let states = cells * 4;
        let mut best_cost = vec![u32::MAX; states];
        let mut prev: Vec<Option<GridState>> = vec![None; states];
        let mut heap = BinaryHeap::new();

        let first = GridState {
            x: start_ix,
            y: start_iy,
            dir: dir_index(start_side.outward()),
        };
        best_cost[grid.index(start_ix, start_iy) * 4 + first.dir as usize] = 0;
        heap.push(GridEntry {
            est: 0,
            cost: 0,
            state: first,
        });

        let mut end_state = None;
        let mut expansions = 0usize;
        while let Some(GridEntry { cost, state, .. }) = heap.pop() {
            if expansions >= self.config.max_expansions {
                break;
            }
            expansions += 1;

            let state_index = grid.index(state.x, state.y) * 4 + state.dir as usize;
            if cost != best_cost[state_index] {
                continue;
            }
            if state.x == end_ix && state.y == end_iy {
                end_state = Some(state);
                break;
            }

            for (dir, (dx, dy)) in DIRS.iter().enumerate() {
                let nx = state.x + dx;
                let ny = state.y + dy;
                if nx < 0 || ny < 0 || nx >= grid.cols || ny >= grid.rows {
                    continue;
                }
                let is_endpoint = (nx, ny) == (end_ix, end_iy);
                if !is_endpoint && grid.blocked[grid.index(nx, ny)] {
                    continue;
                }
                let mut next_cost = cost.saturating_add(STEP_COST);
                if state.dir != dir as u8 {
                    next_cost = next_cost.saturating_add(turn_penalty);
                }
                let next_index = grid.index(nx, ny) * 4 + dir;
                if next_cost >= best_cost[next_index] {
                    continue;
                }
                best_cost[next_index] = next_cost;
                prev[next_index] = Some(state);
                let manhattan = (nx - end_ix).unsigned_abs() + (ny - end_iy).unsigned_abs();
                heap.push(GridEntry {
                    est: next_cost.saturating_add(manhattan.saturating_mul(STEP_COST)),
                    cost: next_cost,
                    state: GridState {
                        x: nx,
                        y: ny,
                        dir: dir as u8,
                    },
                });
            }
        }

        let Some(mut current) = end_state else {
            trace!(expansions, "grid search exhausted");
            return None;
        };
        let mut cells_on_path = vec![(current.x, current.y)];
        while let Some(previous) =
            prev[grid.index(current.x, current.y) * 4 + current.dir as usize]
        {
            cells_on_path.push((previous.x, previous.y));
            current = previous;
        }
        cells_on_path.reverse();

        Some(cells_on_path.into_iter().map(|(ix, iy)| grid.point(ix, iy)).collect())
    }

    /// Two points when the ports line up, otherwise a dog-leg through the
    /// grid line halfway between the stubs.
    fn direct_route(
        &self,
        start: Point,
        side: Side,
        start_stub: Point,
        end: Point,
        end_stub: Point,
    ) -> Vec<Point> {
        let unit = self.layout.grid_unit;
        if side.is_vertical() {
            if (start.x - end.x).abs() < EPSILON {
                return vec![start, end];
            }
            let mid = snap((start_stub.y + end_stub.y) * 0.5, unit);
            vec![start, Point::new(start.x, mid), Point::new(end.x, mid), end]
        } else {
            if (start.y - end.y).abs() < EPSILON {
                return vec![start, end];
            }
            let mid = snap((start_stub.x + end_stub.x) * 0.5, unit);
            vec![start, Point::new(mid, start.y), Point::new(mid, end.y), end]
        }
    }

    /// Loop out of the right side and back in through the top.
    fn self_loop(&self, rect: &Rect) -> Vec<Point> {
        let center = rect.center();
        let right = Point::new(rect.right(), center.y);
        let top = Point::new(center.x, rect.y);
        let right_stub = self.stub(right, Side::Right);
        let top_stub = self.stub(top, Side::Top);
        let corner = Point::new(right_stub.x, top_stub.y);
        vec![right, right_stub, corner, top_stub, top]
    }
}

/// Center of the given side of `rect`.
fn port(rect: &Rect, side: Side) -> Point {
    let center = rect.center();
    match side {
        Side::Left => Point::new(rect.x, center.y),
        Side::Right => Point::new(rect.right(), center.y),
        Side::Top => Point::new(center.x, rect.y),
        Side::Bottom => Point::new(center.x, rect.bottom()),
    }
}

/// Drop duplicate and collinear interior points.
pub fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if let Some(last) = out.last() {
            if (p.x - last.x).abs() <= EPSILON && (p.y - last.y).abs() <= EPSILON {
                continue;
            }
        }
        if out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let vertical = (a.x - b.x).abs() <= EPSILON && (b.x - p.x).abs() <= EPSILON;
            let horizontal = (a.y - b.y).abs() <= EPSILON && (b.y - p.y).abs() <= EPSILON;
            if vertical || horizontal {
                out.pop();
            }
        }
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(list: &[(&str, f32, f32)]) -> BTreeMap<NodeId, NodePosition> {
        list.iter()
            .map(|&(id, x, y)| {
                (
                    NodeId::from(id),
                    NodePosition {
                        id: NodeId::from(id),
                        x,
                        y,
                        layer: 0,
                    },
                )
            })
            .collect()
    }

    fn router() -> OrthogonalRouter {
        OrthogonalRouter::new(LayoutConfig::default(), RouterConfig::default())
    }

    fn assert_orthogonal(points: &[Point]) {
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                (a.x - b.x).abs() < EPSILON || (a.y - b.y).abs() < EPSILON,
                "diagonal segment {:?} -> {:?}",
                a,
                b
            );
        }
    }

    /// Whether an axis-aligned segment passes through the interior of `rect`.
    fn crosses(a: Point, b: Point, rect: &Rect) -> bool {
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
        min_x < rect.right() && max_x > rect.x && min_y < rect.bottom() && max_y > rect.y
    }

    #[test]
    fn test_unknown_endpoint() {
        let route = router().route("a", "ghost", &positions(&[("a", 100.0, 100.0)]));
        assert!(route.points.is_empty());
        assert!(route.used_fallback);
    }

    #[test]
    fn test_straight_vertical_route() {
        let pos = positions(&[("a", 200.0, 40.0), ("b", 200.0, 160.0)]);
        let route = router().route("a", "b", &pos);

        assert!(!route.used_fallback);
        assert_eq!(route.points, vec![Point::new(200.0, 70.0), Point::new(200.0, 130.0)]);
    }

    #[test]
    fn test_horizontal_route_ends_on_boundaries() {
        let pos = positions(&[("a", 40.0, 40.0), ("b", 440.0, 40.0)]);
        let route = router().route("a", "b", &pos);

        assert!(!route.used_fallback);
        assert_eq!(route.points.first(), Some(&Point::new(120.0, 40.0)));
        assert_eq!(route.points.last(), Some(&Point::new(360.0, 40.0)));
        assert_orthogonal(&route.points);
    }

    #[test]
    fn test_route_avoids_intervening_node() {
        let pos = positions(&[("a", 200.0, 40.0), ("blocker", 200.0, 220.0), ("c", 200.0, 400.0)]);
        let route = router().route("a", "c", &pos);

        assert!(!route.used_fallback);
        assert_eq!(route.points.first(), Some(&Point::new(200.0, 70.0)));
        assert_eq!(route.points.last(), Some(&Point::new(200.0, 370.0)));
        assert_orthogonal(&route.points);

        let blocker = Rect::centered(Point::new(200.0, 220.0), 160.0, 60.0);
        for pair in route.points.windows(2) {
            assert!(!crosses(pair[0], pair[1], &blocker), "segment {:?} crosses blocker", pair);
        }

        let inner = &route.points[1..route.points.len() - 1];
        for p in inner {
            assert!(p.x % 20.0 == 0.0 || p.y % 20.0 == 0.0, "off-grid point {:?}", p);
        }
    }

    #[test]
    fn test_fallback_when_budget_exhausted() {
        let router = OrthogonalRouter::new(
            LayoutConfig::default(),
            RouterConfig {
                max_expansions: 0,
                ..RouterConfig::default()
            },
        );
        let pos = positions(&[("a", 200.0, 40.0), ("b", 400.0, 280.0)]);
        let route = router.route("a", "b", &pos);

        assert!(route.used_fallback);
        assert_eq!(
            route.points,
            vec![
                Point::new(200.0, 70.0),
                Point::new(200.0, 160.0),
                Point::new(400.0, 160.0),
                Point::new(400.0, 250.0),
            ]
        );
    }

    #[test]
    fn test_far_apart_positions_fall_back() {
        for far in [1.0e11_f32, 1.0e30] {
            let pos = positions(&[("a", -far, 40.0), ("b", far, 40.0)]);
            let route = router().route("a", "b", &pos);

            assert!(route.used_fallback);
            assert!((2..=4).contains(&route.points.len()));
            assert_orthogonal(&route.points);
        }
    }

    #[test]
    fn test_self_loop() {
        let pos = positions(&[("a", 200.0, 40.0)]);
        let route = router().route("a", "a", &pos);

        assert!(route.used_fallback);
        assert_eq!(route.points.len(), 5);
        assert_eq!(route.points[0], Point::new(280.0, 40.0));
        assert_eq!(route.points[4], Point::new(200.0, 10.0));
        assert_orthogonal(&route.points);
    }

    #[test]
    fn test_compress_path() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 20.0),
            Point::new(10.0, 20.0),
            Point::new(20.0, 20.0),
        ];
        assert_eq!(
            compress_path(&points),
            vec![Point::new(0.0, 0.0), Point::new(0.0, 20.0), Point::new(20.0, 20.0)]
        );
    }

    #[test]
    fn test_route_edges() {
        let pos = positions(&[("a", 200.0, 40.0), ("b", 200.0, 160.0)]);
        let edges = vec![Edge::structural("a", "b"), Edge::reference("b", "ghost", "blocks")];
        let routes = router().route_edges(&edges, &pos);
        assert_eq!(routes.len(), 2);
        assert!(!routes[0].route.used_fallback);
        assert!(routes[1].route.points.is_empty());
    }
}
