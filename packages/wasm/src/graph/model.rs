//! GraphModel - indexed topology for traversal queries.
//!
//! Wraps a petgraph `StableGraph` built from a sanitized snapshot, with a
//! map from the data layer's string ids to petgraph indices. Selection,
//! hover impact analysis and drill-down all walk this structure.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use super::edge::{Edge, EdgeLayer};
use super::node::{Node, NodeId};

/// Which way to walk dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    /// Towards what a node depends on (edge sources).
    Upstream,
    /// Towards what depends on a node (edge targets).
    Downstream,
    Both,
}

/// Immutable topology of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    /// Nodes store their id, edges store their layer.
    graph: StableGraph<NodeId, EdgeLayer, Directed>,

    /// Map from data-layer id to petgraph NodeIndex
    index_of: HashMap<NodeId, NodeIndex>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from nodes and edges. Edges with unknown endpoints are skipped.
    pub fn from_parts(nodes: &[Node], edges: &[Edge]) -> Self {
        let mut graph = StableGraph::with_capacity(nodes.len(), edges.len());
        let mut index_of = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if index_of.contains_key(&node.id) {
                continue;
            }
            let index = graph.add_node(node.id.clone());
            index_of.insert(node.id.clone(), index);
        }

        for edge in edges {
            let (Some(&from), Some(&to)) = (index_of.get(&edge.from), index_of.get(&edge.to)) else {
                continue;
            };
            graph.add_edge(from, to, edge.layer);
        }

        Self { graph, index_of }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of.contains_key(id)
    }

    /// All node ids, sorted.
    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.index_of.keys().cloned().collect()
    }

    /// Direct neighbours in one direction (`Upstream` = edge sources).
    pub fn neighbors(&self, id: &str, direction: TraversalDirection) -> BTreeSet<NodeId> {
        let Some(&start) = self.index_of.get(id) else {
            return BTreeSet::new();
        };
        self.step(start, direction, None)
            .into_iter()
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Breadth-first walk from `id`; the start node is not included.
    ///
    /// `Both` is the union of the upstream and downstream walks, so siblings
    /// reached only by turning around at a shared neighbour are excluded.
    /// `layer` restricts the walk to one edge family (None = all edges).
    pub fn traverse(
        &self,
        id: &str,
        direction: TraversalDirection,
        layer: Option<EdgeLayer>,
    ) -> BTreeSet<NodeId> {
        let Some(&start) = self.index_of.get(id) else {
            return BTreeSet::new();
        };

        match direction {
            TraversalDirection::Both => {
                let mut chain = self.walk(start, TraversalDirection::Upstream, layer);
                chain.extend(self.walk(start, TraversalDirection::Downstream, layer));
                chain
            }
            one_way => self.walk(start, one_way, layer),
        }
    }

    fn walk(
        &self,
        start: NodeIndex,
        direction: TraversalDirection,
        layer: Option<EdgeLayer>,
    ) -> BTreeSet<NodeId> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for next in self.step(current, direction, layer) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited.remove(&start);
        visited
            .into_iter()
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    fn step(
        &self,
        node: NodeIndex,
        direction: TraversalDirection,
        layer: Option<EdgeLayer>,
    ) -> Vec<NodeIndex> {
        let directions: &[Direction] = match direction {
            TraversalDirection::Upstream => &[Direction::Incoming],
            TraversalDirection::Downstream => &[Direction::Outgoing],
            TraversalDirection::Both => &[Direction::Incoming, Direction::Outgoing],
        };

        let mut out = Vec::new();
        for &dir in directions {
            for edge in self.graph.edges_directed(node, dir) {
                if layer.is_some_and(|wanted| *edge.weight() != wanted) {
                    continue;
                }
                let other = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                out.push(other);
            }
        }
        out
    }
}
