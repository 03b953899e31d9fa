//! Client-side object-graph persistence planner for a graph-relational
//! database.
//!
//! graphel turns mutations recorded on an in-memory object graph into
//! ordered batches of parameterized EdgeQL statements:
//!
//! - change-tracked objects, containers, and link-property proxies
//!   (`graphel-core`)
//! - graph traversal, dependency batching, statement compilation, and
//!   the resumable `SaveExecutor` (`graphel-save`)
//! - the [`session::StatementSession`] execution seam and the
//!   [`session::save`] driver, built on asupersync's cancel-correct
//!   `Cx`/`Outcome` primitives

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod session;

pub use graphel_core::{
    Cardinality, DependencyError, Error, FieldValue, LinkSet, Linked, Object, ObjectId,
    ObjectType, Pointer, PointerKind, Proxy, Result, TrackedList, TypeError, UsageError,
    UsageErrorKind, Value, quote_ident, quote_literal, quote_type_name,
};
pub use graphel_save::{
    ChangeRecord, FieldChange, IdTracker, MultiLinkDelta, MultiPropDelta, ParamBuilder, Params,
    SaveExecutor, SavePlan, Statement, compile_insert, compile_update, compute_ops, iter_graph,
    linked_new_objects,
};
pub use session::{StatementSession, save};
