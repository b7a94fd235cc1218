//! SelectionManager - the set of selected node ids.

use std::collections::BTreeSet;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use crate::events::{SubscriptionId, Subscribers};
use crate::graph::{GraphModel, NodeId, TraversalDirection};

/// What a selection change did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionEventKind {
    Select,
    Deselect,
    Clear,
}

/// Emitted once per effective selection change.
///
/// For `Select`, `ids` is the selection after the change; for `Deselect`
/// and `Clear` it holds the ids that were removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionEvent {
    pub kind: SelectionEventKind,
    pub ids: Vec<NodeId>,
}

/// Selected ids over the current graph snapshot.
#[derive(Default)]
pub struct SelectionManager {
    graph: Rc<GraphModel>,
    selected: BTreeSet<NodeId>,
    /// Most recently toggled-on id, if still selected.
    last: Option<NodeId>,
    subscribers: Subscribers<SelectionEvent>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new snapshot's topology. Ids that vanished are dropped and
    /// reported with one `Deselect` event.
    pub fn set_graph(&mut self, graph: Rc<GraphModel>) {
        self.graph = graph;
        let removed: Vec<NodeId> = self
            .selected
            .iter()
            .filter(|id| !self.graph.contains(id.as_str()))
            .cloned()
            .collect();
        if removed.is_empty() {
            return;
        }
        for id in &removed {
            self.selected.remove(id);
        }
        debug!(removed = removed.len(), "pruned vanished ids from selection");
        self.emit(SelectionEventKind::Deselect, removed);
    }

    pub fn on_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SelectionEvent) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn selected(&self) -> &BTreeSet<NodeId> {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// The id reported to single-selection listeners.
    pub fn primary(&self) -> Option<&NodeId> {
        self.last
            .as_ref()
            .filter(|id| self.selected.contains(*id))
            .or_else(|| self.selected.iter().next())
    }

    /// Without `multi`: select only `id`, or clear if it already was the
    /// sole selection. With `multi`: add or remove `id`.
    pub fn toggle_select(&mut self, id: &str, multi: bool) -> bool {
        if !self.graph.contains(id) {
            debug!(id, "toggle_select ignored unknown id");
            return false;
        }
        let id = NodeId::from(id);

        if multi {
            if self.selected.remove(&id) {
                self.emit(SelectionEventKind::Deselect, vec![id]);
            } else {
                self.selected.insert(id.clone());
                self.last = Some(id);
                let ids = self.snapshot();
                self.emit(SelectionEventKind::Select, ids);
            }
            return true;
        }

        if self.selected.len() == 1 && self.selected.contains(&id) {
            return self.clear_selection();
        }
        self.selected = BTreeSet::from([id.clone()]);
        self.last = Some(id.clone());
        self.emit(SelectionEventKind::Select, vec![id]);
        true
    }

    /// Replace the selection with everything reachable from `id` in
    /// `direction`, excluding `id`.
    pub fn select_dependency_chain(&mut self, id: &str, direction: TraversalDirection) -> bool {
        if !self.graph.contains(id) {
            return false;
        }
        let chain = self.graph.traverse(id, direction, None);
        self.replace(chain)
    }

    pub fn select_all(&mut self) -> bool {
        let all = self.graph.node_ids();
        self.replace(all)
    }

    pub fn clear_selection(&mut self) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        let removed = self.snapshot();
        self.selected.clear();
        self.last = None;
        self.emit(SelectionEventKind::Clear, removed);
        true
    }

    fn replace(&mut self, next: BTreeSet<NodeId>) -> bool {
        if next == self.selected {
            return false;
        }
        if next.is_empty() {
            return self.clear_selection();
        }
        self.selected = next;
        self.last = None;
        let ids = self.snapshot();
        self.emit(SelectionEventKind::Select, ids);
        true
    }

    fn snapshot(&self) -> Vec<NodeId> {
        self.selected.iter().cloned().collect()
    }

    fn emit(&mut self, kind: SelectionEventKind, ids: Vec<NodeId>) {
        let event = SelectionEvent { kind, ids };
        self.subscribers.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::graph::{Edge, Node, NodeKind};

    /// B and C depend on A, D depends on B and C.
    fn diamond() -> Rc<GraphModel> {
        let nodes: Vec<Node> = ["A", "B", "C", "D"]
            .iter()
            .map(|id| Node::new(*id, NodeKind::Task, *id))
            .collect();
        let edges = vec![
            Edge::structural("A", "B"),
            Edge::structural("A", "C"),
            Edge::structural("B", "D"),
            Edge::structural("C", "D"),
        ];
        Rc::new(GraphModel::from_parts(&nodes, &edges))
    }

    fn recorded(manager: &mut SelectionManager) -> Rc<RefCell<Vec<SelectionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        manager.on_change(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    fn ids(list: &[&str]) -> BTreeSet<NodeId> {
        list.iter().map(|s| NodeId::from(*s)).collect()
    }

    #[test]
    fn test_toggle_twice_returns_to_empty() {
        let mut manager = SelectionManager::new();
        manager.set_graph(diamond());
        let events = recorded(&mut manager);

        assert!(manager.toggle_select("B", false));
        assert_eq!(manager.selected(), &ids(&["B"]));
        assert!(manager.toggle_select("B", false));
        assert!(manager.is_empty());

        let kinds: Vec<_> = events.borrow().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![SelectionEventKind::Select, SelectionEventKind::Clear]);
    }

    #[test]
    fn test_single_select_replaces() {
        let mut manager = SelectionManager::new();
        manager.set_graph(diamond());
        manager.toggle_select("A", false);
        manager.toggle_select("B", false);
        assert_eq!(manager.selected(), &ids(&["B"]));
        assert_eq!(manager.primary(), Some(&NodeId::from("B")));
    }

    #[test]
    fn test_multi_toggle() {
        let mut manager = SelectionManager::new();
        manager.set_graph(diamond());
        let events = recorded(&mut manager);

        manager.toggle_select("A", true);
        manager.toggle_select("C", true);
        assert_eq!(manager.selected(), &ids(&["A", "C"]));
        assert_eq!(manager.primary(), Some(&NodeId::from("C")));

        manager.toggle_select("A", true);
        assert_eq!(manager.selected(), &ids(&["C"]));

        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].kind, SelectionEventKind::Deselect);
        assert_eq!(events[2].ids, vec![NodeId::from("A")]);
    }

    #[test]
    fn test_dependency_chain() {
        let mut manager = SelectionManager::new();
        manager.set_graph(diamond());

        assert!(manager.select_dependency_chain("D", TraversalDirection::Upstream));
        assert_eq!(manager.selected(), &ids(&["A", "B", "C"]));

        manager.select_dependency_chain("B", TraversalDirection::Downstream);
        assert_eq!(manager.selected(), &ids(&["D"]));

        // C is a sibling of B, not part of its chain.
        manager.select_dependency_chain("B", TraversalDirection::Both);
        assert_eq!(manager.selected(), &ids(&["A", "D"]));
    }

    #[test]
    fn test_noop_calls_emit_nothing() {
        let mut manager = SelectionManager::new();
        manager.set_graph(diamond());
        let events = recorded(&mut manager);

        assert!(!manager.clear_selection());
        assert!(manager.select_all());
        assert!(!manager.select_all());
        assert!(!manager.toggle_select("ghost", false));
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn test_new_graph_prunes_selection() {
        let mut manager = SelectionManager::new();
        manager.set_graph(diamond());
        manager.select_all();
        let events = recorded(&mut manager);

        let smaller = GraphModel::from_parts(&[Node::new("A", NodeKind::Task, "A")], &[]);
        manager.set_graph(Rc::new(smaller));

        assert_eq!(manager.selected(), &ids(&["A"]));
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SelectionEventKind::Deselect);
        assert_eq!(events[0].ids.len(), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let mut manager = SelectionManager::new();
        manager.set_graph(diamond());
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let sub = manager.on_change(move |_| *sink.borrow_mut() += 1);
        manager.toggle_select("A", false);
        assert!(manager.unsubscribe(sub));
        manager.toggle_select("B", false);
        assert_eq!(*count.borrow(), 1);
    }
}
