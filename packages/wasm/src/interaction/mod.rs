//! User-driven state: selection and filtering.

mod filter;
mod selection;

pub use filter::{FilterCriteria, FilterEvent, FilterKey, FilterManager};
pub use selection::{SelectionEvent, SelectionEventKind, SelectionManager};
