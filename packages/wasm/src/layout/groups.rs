//! Group bounds: structural connected components, or host-supplied groups.

use std::collections::{BTreeMap, HashMap};

use petgraph::unionfind::UnionFind;

use super::layered::LayeredGraph;
use super::result::{GroupBounds, GroupSpec, NodePosition};
use crate::config::LayoutConfig;
use crate::geometry::Rect;
use crate::graph::NodeId;

const FALLBACK_COLOR: &str = "#64748b";

/// One group per connected component of the structural edges, treated as
/// undirected. Singletons form their own group. Groups come out in order of
/// their first member in sort order and are named after their smallest
/// member id, so an id stays put while its membership does.
pub(crate) fn structural_components(
    graph: &LayeredGraph<'_>,
    layer_of: &[usize],
    positions: &BTreeMap<NodeId, NodePosition>,
    config: &LayoutConfig,
) -> Vec<GroupBounds> {
    let n = graph.len();
    let mut components = UnionFind::<usize>::new(n);
    for &(parent, child) in &graph.structural_pairs {
        components.union(parent, child);
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    for slot in 0..n {
        let root = components.find(slot);
        let index = *group_of_root.entry(root).or_insert_with(|| {
            members.push(Vec::new());
            members.len() - 1
        });
        members[index].push(slot);
    }

    members
        .iter()
        .enumerate()
        .filter_map(|(index, slots)| {
            let name = slots.iter().map(|&slot| &graph.nodes[slot].id).min()?;
            make_group(
                format!("group-{name}"),
                None,
                slots,
                index,
                graph,
                layer_of,
                positions,
                config,
            )
        })
        .collect()
}

/// Groups from the host. Unknown members are ignored and groups left
/// without members are dropped.
pub(crate) fn build_groups(
    specs: &[GroupSpec],
    graph: &LayeredGraph<'_>,
    layer_of: &[usize],
    positions: &BTreeMap<NodeId, NodePosition>,
    config: &LayoutConfig,
) -> Vec<GroupBounds> {
    let slot_of: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(slot, node)| (node.id.as_str(), slot))
        .collect();

    specs
        .iter()
        .enumerate()
        .filter_map(|(index, spec)| {
            let mut slots: Vec<usize> = spec
                .members
                .iter()
                .filter_map(|id| slot_of.get(id.as_str()).copied())
                .collect();
            slots.sort_unstable();
            slots.dedup();
            make_group(
                spec.id.clone(),
                spec.label.clone(),
                &slots,
                index,
                graph,
                layer_of,
                positions,
                config,
            )
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn make_group(
    id: String,
    label: Option<String>,
    slots: &[usize],
    index: usize,
    graph: &LayeredGraph<'_>,
    layer_of: &[usize],
    positions: &BTreeMap<NodeId, NodePosition>,
    config: &LayoutConfig,
) -> Option<GroupBounds> {
    // Anchor: shallowest member, ties broken by id.
    let anchor = slots
        .iter()
        .copied()
        .min_by_key(|&slot| (layer_of[slot], &graph.nodes[slot].id))?;

    let bounds = Rect::enclosing(slots.iter().filter_map(|&slot| {
        positions
            .get(&graph.nodes[slot].id)
            .map(|p| Rect::centered(p.center(), config.node_width, config.node_height))
    }))?
    .inflate(config.group_padding);

    let color = if config.palette.is_empty() {
        FALLBACK_COLOR.to_string()
    } else {
        config.palette[index % config.palette.len()].clone()
    };

    let mut members: Vec<NodeId> = slots.iter().map(|&slot| graph.nodes[slot].id.clone()).collect();
    members.sort();

    Some(GroupBounds {
        id,
        label: label.unwrap_or_else(|| graph.nodes[anchor].title.clone()),
        anchor: graph.nodes[anchor].id.clone(),
        member_count: members.len(),
        members,
        bounds,
        color,
    })
}

#[cfg(test)]
mod tests {
    use super::super::layered::compute_layout;
    use super::*;
    use crate::graph::{Edge, Node, NodeKind};

    fn node(id: &str, title: &str) -> Node {
        Node::new(id, NodeKind::Task, title)
    }

    #[test]
    fn test_components_become_groups() {
        let nodes = vec![
            node("a", "Alpha"),
            node("b", "Beta"),
            node("c", "Gamma"),
            node("x", "Lonely"),
        ];
        let edges = vec![Edge::structural("a", "b"), Edge::structural("c", "b")];
        let result = compute_layout(&nodes, &edges, None, None, &LayoutConfig::default());

        assert_eq!(result.groups.len(), 2);
        let big = result.group_of("b").unwrap();
        assert_eq!(big.member_count, 3);
        assert_eq!(big.anchor, NodeId::from("a"));
        assert_eq!(big.label, "Alpha");

        let solo = result.group_of("x").unwrap();
        assert_eq!(solo.member_count, 1);
        assert_eq!(solo.label, "Lonely");
        assert_eq!(big.id, "group-a");
        assert_eq!(solo.id, "group-x");
    }

    #[test]
    fn test_component_ids_survive_unrelated_nodes() {
        let edges = vec![Edge::structural("b1", "b2"), Edge::structural("c1", "c2")];
        let before: Vec<Node> = ["b1", "b2", "c1", "c2"].iter().map(|id| node(id, id)).collect();
        let mut after = before.clone();
        after.push(node("a0", "a0"));

        let config = LayoutConfig::default();
        let first = compute_layout(&before, &edges, None, None, &config);
        let second = compute_layout(&after, &edges, None, None, &config);

        assert_eq!(second.groups.len(), 3);
        for id in ["b1", "c2"] {
            assert_eq!(first.group_of(id).unwrap().id, second.group_of(id).unwrap().id);
        }
        assert_eq!(second.group_of("c1").unwrap().id, "group-c1");
    }

    #[test]
    fn test_group_bounds_enclose_members_with_padding() {
        let config = LayoutConfig::default();
        let nodes = vec![node("a", "A"), node("b", "B")];
        let edges = vec![Edge::structural("a", "b")];
        let result = compute_layout(&nodes, &edges, None, None, &config);
        let group = &result.groups[0];

        for id in ["a", "b"] {
            let rect = result.node_rect(id, config.node_width, config.node_height).unwrap();
            assert!(group.bounds.x <= rect.x - config.group_padding);
            assert!(group.bounds.right() >= rect.right() + config.group_padding);
            assert!(group.bounds.bottom() >= rect.bottom() + config.group_padding);
        }
    }

    #[test]
    fn test_palette_cycles() {
        let config = LayoutConfig {
            palette: vec!["#111".into(), "#222".into()],
            ..LayoutConfig::default()
        };
        let nodes: Vec<Node> = ["a", "b", "c"].iter().map(|id| node(id, id)).collect();
        let result = compute_layout(&nodes, &[], None, None, &config);
        let colors: Vec<&str> = result.groups.iter().map(|g| g.color.as_str()).collect();
        assert_eq!(colors, vec!["#111", "#222", "#111"]);
    }

    #[test]
    fn test_host_groups_replace_components() {
        let nodes = vec![node("a", "A"), node("b", "B"), node("c", "C")];
        let specs = vec![
            GroupSpec {
                id: "team-1".into(),
                label: Some("Platform".into()),
                members: vec!["a".into(), "c".into(), "ghost".into()],
            },
            GroupSpec {
                id: "empty".into(),
                label: None,
                members: vec!["nobody".into()],
            },
        ];
        let result = compute_layout(&nodes, &[], Some(&specs), None, &LayoutConfig::default());

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].id, "team-1");
        assert_eq!(result.groups[0].label, "Platform");
        assert_eq!(result.groups[0].members, vec![NodeId::from("a"), NodeId::from("c")]);
        assert!(result.group_of("b").is_none());
    }
}
