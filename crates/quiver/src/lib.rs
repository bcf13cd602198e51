//! Quiver — a distributed property-graph query execution engine.
//!
//! This crate is the integration surface: it wires the engine core
//! ([`quiver_query`]) and the sharded storage ([`quiver_graph`]) into
//! runnable deployments.
//!
//! # Single node
//!
//! ```
//! use quiver::{Database, Parameters};
//! use quiver_core::SymbolKind;
//! use quiver_query::plan::{PlanNode, ProduceNode, NamedExpr};
//! use quiver_query::expr::Expr;
//! use std::sync::Arc;
//!
//! let db = Database::in_memory();
//! let mut table = quiver_core::SymbolTable::new();
//! let out = table.create("x", SymbolKind::Any);
//! let plan = Arc::new(PlanNode::Produce(ProduceNode {
//!     input: PlanNode::once(),
//!     named_expressions: vec![NamedExpr { symbol: out, expression: Expr::integer(1) }],
//! }));
//! let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
//! assert_eq!(result.rows.len(), 1);
//! ```
//!
//! # Cluster
//!
//! [`LocalCluster`] wires one master and any number of workers in a
//! single process, implementing the engine's transport seams exactly
//! the way a networked transport would. [`DistributedPlan`] ships
//! worker-side plans on construction and tears them down on drop.
//!
//! # Modules
//!
//! - [`config`] - Engine configuration
//! - [`database`] - The single-node surface
//! - [`cluster`] - The in-process cluster
//! - [`plan_cache`] - The prepared-plan cache

pub mod cluster;
pub mod config;
pub mod database;
pub mod plan_cache;

pub use cluster::{DistributedPlan, LocalCluster};
pub use config::EngineConfig;
pub use database::{with_retries, Database, QueryResult};
pub use plan_cache::PlanCache;

// Re-export the engine vocabulary the integration surface speaks.
pub use quiver_core::{EngineError, EngineResult, Symbol, SymbolTable, WorkerId};
pub use quiver_query::{Frame, Parameters, TypedValue};
