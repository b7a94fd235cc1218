//! LayoutEngine - cached entry point for the layered layout.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, trace};

use super::layered::compute_layout;
use super::result::{GroupSpec, LayoutResult};
use crate::config::LayoutConfig;
use crate::graph::{Edge, Node, NodeId, structural_hash};

/// Counters for the debug snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayoutStats {
    pub computed: u64,
    pub cache_hits: u64,
    pub subset_runs: u64,
}

/// Computes layouts and remembers the most recent full one.
///
/// The cache key is the structural hash of the input plus the host groups,
/// so content-only changes (titles, statuses) hit the cache. Group labels
/// come from titles, so a hit refreshes them without relayout.
#[derive(Debug, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
    cache: Option<(u64, Rc<LayoutResult>)>,
    stats: LayoutStats,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            cache: None,
            stats: LayoutStats::default(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Replace the configuration; the cache no longer applies.
    pub fn set_config(&mut self, config: LayoutConfig) {
        self.config = config;
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub fn stats(&self) -> LayoutStats {
        self.stats
    }

    /// Most recent full layout, if any.
    pub fn cached(&self) -> Option<Rc<LayoutResult>> {
        self.cache.as_ref().map(|(_, result)| Rc::clone(result))
    }

    /// Full layout. Returns the cached result when the structure is unchanged.
    pub fn layout(
        &mut self,
        nodes: &[Node],
        edges: &[Edge],
        groups: Option<&[GroupSpec]>,
    ) -> Rc<LayoutResult> {
        let key = cache_key(nodes, edges, groups);

        let hit = self.cache.as_ref().filter(|(k, _)| *k == key).map(|(_, r)| Rc::clone(r));
        if let Some(cached) = hit {
            self.stats.cache_hits += 1;
            trace!(key, "layout cache hit");
            return match refresh_labels(&cached, nodes, groups) {
                Some(updated) => {
                    let updated = Rc::new(updated);
                    self.cache = Some((key, Rc::clone(&updated)));
                    updated
                }
                None => cached,
            };
        }

        let result = Rc::new(compute_layout(nodes, edges, groups, None, &self.config));
        self.stats.computed += 1;
        debug!(key, nodes = result.positions.len(), "layout cache miss; recomputed");
        self.cache = Some((key, Rc::clone(&result)));
        result
    }

    /// Layout restricted to `visible`. Never cached.
    pub fn layout_subset(
        &mut self,
        nodes: &[Node],
        edges: &[Edge],
        visible: &HashSet<NodeId>,
    ) -> LayoutResult {
        self.stats.subset_runs += 1;
        compute_layout(nodes, edges, None, Some(visible), &self.config)
    }
}

fn cache_key(nodes: &[Node], edges: &[Edge], groups: Option<&[GroupSpec]>) -> u64 {
    let mut hasher = DefaultHasher::new();
    structural_hash(nodes, edges).hash(&mut hasher);
    if let Some(groups) = groups {
        for group in groups {
            group.id.hash(&mut hasher);
            group.members.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Copy of `cached` with group labels matching the current titles, or None
/// when nothing changed.
fn refresh_labels(
    cached: &LayoutResult,
    nodes: &[Node],
    groups: Option<&[GroupSpec]>,
) -> Option<LayoutResult> {
    let titles: HashMap<&str, &str> =
        nodes.iter().map(|n| (n.id.as_str(), n.title.as_str())).collect();
    let host_labels: HashMap<&str, Option<&str>> = groups
        .unwrap_or_default()
        .iter()
        .map(|g| (g.id.as_str(), g.label.as_deref()))
        .collect();

    let wanted: Vec<Option<String>> = cached
        .groups
        .iter()
        .map(|group| {
            let label = host_labels
                .get(group.id.as_str())
                .copied()
                .flatten()
                .or_else(|| titles.get(group.anchor.as_str()).copied())?;
            (label != group.label).then(|| label.to_string())
        })
        .collect();

    if wanted.iter().all(Option::is_none) {
        return None;
    }

    let mut updated = cached.clone();
    for (group, label) in updated.groups.iter_mut().zip(wanted) {
        if let Some(label) = label {
            group.label = label;
        }
    }
    Some(updated)
}
