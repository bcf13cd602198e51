//! Quiver Query
//!
//! The query execution core of Quiver: a pull-based operator pipeline
//! over sharded graph storage, with distributed control operators that
//! coordinate a master and its workers.
//!
//! # Architecture
//!
//! The planner (an external collaborator) hands the engine an immutable
//! [`PlanNode`](plan::PlanNode) tree plus a
//! [`SymbolTable`](quiver_core::SymbolTable). The
//! [factory](exec::make_cursor) folds the tree into a matching tree of
//! [`Cursor`](exec::Cursor)s. The client pulls the root cursor; each pull
//! recursively pulls the cursor's input until a leaf either produces a
//! row — by mutating the shared, symbol-indexed [`Frame`](frame::Frame)
//! in place — or signals exhaustion.
//!
//! Distribution happens through three mechanisms:
//!
//! - [`PullRemote`](exec::operators::PullRemoteCursor) streams batches of
//!   frames from every worker, round-robin, interleaved with local rows;
//! - [`Synchronize`](exec::operators::SynchronizeCursor) is the
//!   accumulation barrier: it drains the pipeline on every worker, replays
//!   deferred updates cluster-wide, and only then lets reads proceed;
//! - the [`Expand`](exec::operators::ExpandCursor) operator resolves
//!   remote edge endpoints on background tasks instead of blocking the
//!   pull chain.
//!
//! # Modules
//!
//! - [`value`] - The runtime value ([`TypedValue`](value::TypedValue))
//! - [`frame`] - Symbol-indexed row storage
//! - [`path`] - Graph paths
//! - [`expr`] / [`eval`] - Expressions and their evaluation
//! - [`plan`] - The immutable operator tree and its visitor
//! - [`exec`] - The cursor protocol and every operator
//! - [`distributed`] - Task handles, RPC pool traits, the data manager

pub mod distributed;
pub mod eval;
pub mod exec;
pub mod expr;
pub mod frame;
pub mod path;
pub mod plan;
pub mod value;

pub use exec::{make_cursor, BoxedCursor, Cursor, ExecutionConfig, ExecutionContext, Parameters};
pub use frame::Frame;
pub use path::Path;
pub use value::TypedValue;
