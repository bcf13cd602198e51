//! The operator cursors.
//!
//! One module per operator family; every cursor implements
//! [`Cursor`](crate::exec::Cursor) and is built from its plan node by
//! the [factory](crate::exec::make_cursor).

pub mod accumulate;
pub mod aggregate;
pub mod bfs;
pub mod cartesian;
pub mod create;
pub mod create_index;
pub mod delete;
pub mod distinct;
pub mod expand;
pub mod expand_variable;
pub mod filter;
pub mod limit;
pub mod merge;
pub mod named_path;
pub mod once;
pub mod optional;
pub mod order_by;
pub mod produce;
pub mod pull_remote;
pub mod scan;
pub mod set;
pub mod synchronize;
pub mod union;
pub mod uniqueness;
pub mod unwind;
pub mod weighted_shortest_path;

pub use accumulate::AccumulateCursor;
pub use aggregate::AggregateCursor;
pub use bfs::ExpandBreadthFirstCursor;
pub use cartesian::CartesianCursor;
pub use create::{CreateExpandCursor, CreateNodeCursor};
pub use create_index::CreateIndexCursor;
pub use delete::DeleteCursor;
pub use distinct::DistinctCursor;
pub use expand::ExpandCursor;
pub use expand_variable::ExpandVariableCursor;
pub use filter::FilterCursor;
pub use limit::{LimitCursor, SkipCursor};
pub use merge::MergeCursor;
pub use named_path::ConstructNamedPathCursor;
pub use once::OnceCursor;
pub use optional::OptionalCursor;
pub use order_by::OrderByCursor;
pub use produce::ProduceCursor;
pub use pull_remote::PullRemoteCursor;
pub use scan::ScanAllCursor;
pub use set::{
    RemoveLabelsCursor, RemovePropertyCursor, SetLabelsCursor, SetPropertiesCursor,
    SetPropertyCursor,
};
pub use synchronize::SynchronizeCursor;
pub use union::UnionCursor;
pub use uniqueness::ExpandUniquenessFilterCursor;
pub use unwind::UnwindCursor;
pub use weighted_shortest_path::ExpandWeightedShortestPathCursor;

use quiver_core::{EngineError, EngineResult, Symbol};
use quiver_graph::VertexAccessor;

use crate::frame::Frame;
use crate::value::TypedValue;

/// Reads a symbol's frame slot as a vertex, naming the symbol in the
/// error. The planner guarantees the type; a mismatch is a plan bug
/// surfaced as a user-visible type error.
pub(crate) fn expect_vertex(frame: &Frame, symbol: &Symbol) -> EngineResult<VertexAccessor> {
    match &frame[symbol] {
        TypedValue::Vertex(vertex) => Ok(vertex.clone()),
        other => Err(EngineError::type_mismatch(
            format!("a vertex for '{}'", symbol.name()),
            other.type_name(),
        )),
    }
}
