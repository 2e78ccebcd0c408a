//! Page interaction
//!
//! Discovers a page's interactive affordances and operates a bounded set of
//! them (fill, click, select, toggle) to reveal content that static
//! extraction cannot see.

pub mod elements;
pub mod explorer;
pub mod rules;

pub use elements::{discover, ElementCounts, ElementDescriptor, ElementKind, ELEMENT_ID_ATTR};
pub use explorer::{InteractionExplorer, InteractionOp, InteractionReport, InteractionStep};
