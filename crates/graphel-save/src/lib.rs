//! Save planner for graphel.
//!
//! Turns an in-memory object graph into an ordered sequence of insert and
//! update statement batches:
//!
//! - `iter_graph` / `linked_new_objects` walk the graph through links
//! - `compute_ops` classifies changes and batches inserts topologically
//! - `compile_insert` / `compile_update` render parameterized EdgeQL
//! - `SaveExecutor` drives the plan, feeding server ids back into later
//!   statements, and commits the result into the graph

pub mod compile;
pub mod executor;
pub mod graph;
pub mod plan;
pub mod tracker;

pub use compile::{ParamBuilder, Params, Statement, compile_insert, compile_update};
pub use executor::SaveExecutor;
pub use graph::{iter_graph, linked_new_objects};
pub use plan::{
    ChangeRecord, FieldChange, MultiLinkDelta, MultiPropDelta, SavePlan, compute_ops,
};
pub use tracker::IdTracker;
