//! Graph data model.
//!
//! Nodes and edges as delivered by the data layer, snapshot sanitization,
//! change classification between snapshots, and an indexed topology
//! (petgraph `StableGraph`) for traversal queries.

mod change;
mod edge;
mod model;
mod node;
mod snapshot;

pub use change::{
    ChangeKind, Fingerprint, classify_change, content_hash, node_content_hash, structural_hash,
};
pub use edge::{Edge, EdgeLayer};
pub use model::{GraphModel, TraversalDirection};
pub use node::{KindCapabilities, Node, NodeId, NodeKind, NodeShape, NodeStatus, Priority};
pub use snapshot::{GraphSnapshot, SanitizeReport};
