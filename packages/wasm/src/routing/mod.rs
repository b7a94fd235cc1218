//! Edge routing.

mod orthogonal;

pub use orthogonal::{EdgeRoute, OrthogonalRouter, Route, Side, compress_path};
