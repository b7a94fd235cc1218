//! FilterManager - criteria over node metadata and the derived visible set.
//!
//! A node is visible when it passes every active category (AND across
//! categories) and matches at least one value inside each of them (OR within
//! a category). Absent or empty categories impose no restriction. The
//! visible set is recomputed eagerly on every effective change.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::{SubscriptionId, Subscribers};
use crate::graph::{Node, NodeId, NodeStatus, Priority};

/// Active filter criteria. `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub statuses: Option<BTreeSet<NodeStatus>>,
    pub priorities: Option<BTreeSet<Priority>>,
    pub assignees: Option<BTreeSet<String>>,
    pub groups: Option<BTreeSet<String>>,
    pub search: Option<String>,
}

impl FilterCriteria {
    /// True when no category restricts anything.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_none()
            && self.priorities.is_none()
            && self.assignees.is_none()
            && self.groups.is_none()
            && self.search.is_none()
    }

    /// Collapse empty sets and blank search text to `None`.
    fn normalized(mut self) -> Self {
        fn drop_empty<T>(set: &mut Option<BTreeSet<T>>) {
            if set.as_ref().is_some_and(BTreeSet::is_empty) {
                *set = None;
            }
        }
        drop_empty(&mut self.statuses);
        drop_empty(&mut self.priorities);
        drop_empty(&mut self.assignees);
        drop_empty(&mut self.groups);
        self.search = self
            .search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self
    }
}

/// One filter category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    Status,
    Priority,
    Assignee,
    Group,
    Search,
}

/// Emitted once per effective criteria change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterEvent {
    pub criteria: FilterCriteria,
    pub visible_count: usize,
    pub total_count: usize,
}

/// The node fields filtering looks at.
#[derive(Debug, Clone)]
struct FilterEntry {
    id: NodeId,
    status: NodeStatus,
    priority: Option<Priority>,
    assignee: Option<String>,
    group: Option<String>,
    /// Lowercased id and title for search.
    haystack: (String, String),
}

impl FilterEntry {
    fn matches(&self, criteria: &FilterCriteria) -> bool {
        fn allowed<T: Ord>(set: &Option<BTreeSet<T>>, value: Option<&T>) -> bool {
            match set {
                None => true,
                Some(set) => value.is_some_and(|v| set.contains(v)),
            }
        }

        allowed(&criteria.statuses, Some(&self.status))
            && allowed(&criteria.priorities, self.priority.as_ref())
            && allowed(&criteria.assignees, self.assignee.as_ref())
            && allowed(&criteria.groups, self.group.as_ref())
            && criteria
                .search
                .as_deref()
                .is_none_or(|needle| {
                    self.haystack.0.contains(needle) || self.haystack.1.contains(needle)
                })
    }
}

#[derive(Default)]
pub struct FilterManager {
    criteria: FilterCriteria,
    entries: Vec<FilterEntry>,
    visible: BTreeSet<NodeId>,
    subscribers: Subscribers<FilterEvent>,
}

impl FilterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&FilterEvent) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Load a new snapshot. `group_of` maps node ids to group ids for the
    /// group category. Returns whether the visible set changed.
    pub fn set_snapshot(&mut self, nodes: &[Node], group_of: &HashMap<NodeId, String>) -> bool {
        self.entries = nodes
            .iter()
            .map(|node| FilterEntry {
                id: node.id.clone(),
                status: node.status,
                priority: node.priority,
                assignee: node.assignee.clone(),
                group: group_of.get(&node.id).cloned(),
                haystack: (node.id.as_str().to_lowercase(), node.title.to_lowercase()),
            })
            .collect();
        self.recompute()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Ids passing the current criteria.
    pub fn visible_ids(&self) -> &BTreeSet<NodeId> {
        &self.visible
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visible.contains(id)
    }

    pub fn toggle_status(&mut self, status: NodeStatus) -> bool {
        let mut next = self.criteria.clone();
        toggle(&mut next.statuses, status);
        self.apply(next)
    }

    pub fn toggle_priority(&mut self, priority: Priority) -> bool {
        let mut next = self.criteria.clone();
        toggle(&mut next.priorities, priority);
        self.apply(next)
    }

    pub fn toggle_assignee(&mut self, assignee: &str) -> bool {
        let mut next = self.criteria.clone();
        toggle(&mut next.assignees, assignee.to_string());
        self.apply(next)
    }

    pub fn toggle_group(&mut self, group: &str) -> bool {
        let mut next = self.criteria.clone();
        toggle(&mut next.groups, group.to_string());
        self.apply(next)
    }

    /// Case-insensitive substring match against id and title. Blank text
    /// removes the search restriction.
    pub fn set_search_text(&mut self, text: &str) -> bool {
        let next = FilterCriteria {
            search: Some(text.to_string()),
            ..self.criteria.clone()
        };
        self.apply(next)
    }

    /// Overwrite the categories that `partial` sets; others stay as they are.
    pub fn update_criteria(&mut self, partial: FilterCriteria) -> bool {
        let current = self.criteria.clone();
        let next = FilterCriteria {
            statuses: partial.statuses.or(current.statuses),
            priorities: partial.priorities.or(current.priorities),
            assignees: partial.assignees.or(current.assignees),
            groups: partial.groups.or(current.groups),
            search: partial.search.or(current.search),
        };
        self.apply(next)
    }

    pub fn clear_criterion(&mut self, key: FilterKey) -> bool {
        let mut next = self.criteria.clone();
        match key {
            FilterKey::Status => next.statuses = None,
            FilterKey::Priority => next.priorities = None,
            FilterKey::Assignee => next.assignees = None,
            FilterKey::Group => next.groups = None,
            FilterKey::Search => next.search = None,
        }
        self.apply(next)
    }

    pub fn clear_filter(&mut self) -> bool {
        self.apply(FilterCriteria::default())
    }

    fn apply(&mut self, next: FilterCriteria) -> bool {
        let next = next.normalized();
        if next == self.criteria {
            return false;
        }
        self.criteria = next;
        self.recompute();
        debug!(visible = self.visible.len(), total = self.entries.len(), "filter criteria changed");
        let event = FilterEvent {
            criteria: self.criteria.clone(),
            visible_count: self.visible.len(),
            total_count: self.entries.len(),
        };
        self.subscribers.emit(&event);
        true
    }

    fn recompute(&mut self) -> bool {
        let visible: BTreeSet<NodeId> = self
            .entries
            .iter()
            .filter(|entry| entry.matches(&self.criteria))
            .map(|entry| entry.id.clone())
            .collect();
        let changed = visible != self.visible;
        self.visible = visible;
        changed
    }
}

fn toggle<T: Ord>(set: &mut Option<BTreeSet<T>>, value: T) {
    let values = set.get_or_insert_with(BTreeSet::new);
    if !values.remove(&value) {
        values.insert(value);
    }
}
