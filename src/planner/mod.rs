//! Planning and task state
//!
//! The state machine at the heart of the agent: what has been learned so
//! far ([`Context`]), where the run stands ([`PlannerState`]), and which
//! [`PlannerAction`] comes next.

pub mod action;
pub mod context;
pub mod decision;
pub mod state;

pub use action::PlannerAction;
pub use context::{Context, ExtractionEntry, Session};
pub use decision::{Planner, NO_OUTCOME};
pub use state::PlannerState;
