//! Edge type.
//!
//! A structural edge `from -> to` is a parent/child relation: `to` depends
//! on `from` and is laid out below it. Reference edges are associative:
//! rendered and traversable, but ignored by the layering.

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Which relation family an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeLayer {
    #[default]
    Structural,
    Reference,
}

impl EdgeLayer {
    #[inline]
    pub fn is_structural(self) -> bool {
        matches!(self, EdgeLayer::Structural)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub layer: EdgeLayer,
    #[serde(default)]
    pub relation: String,
}

impl Edge {
    pub fn structural(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            layer: EdgeLayer::Structural,
            relation: "parent".to_string(),
        }
    }

    pub fn reference(
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            layer: EdgeLayer::Reference,
            relation: relation.into(),
        }
    }

    /// Sort key used everywhere edges must be ordered reproducibly.
    #[inline]
    pub fn sort_key(&self) -> (&NodeId, &NodeId, EdgeLayer, &str) {
        (&self.from, &self.to, self.layer, self.relation.as_str())
    }

    #[inline]
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}
