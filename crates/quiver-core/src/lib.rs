//! Quiver Core
//!
//! This crate provides the shared vocabulary of the Quiver distributed
//! graph query engine:
//!
//! - **Identifiers**: [`Gid`], [`WorkerId`], [`GlobalAddress`] and
//!   [`PlanId`] for addressing records and dispatched plans across the
//!   cluster
//! - **Names**: [`Label`], [`EdgeTypeName`] and [`PropertyKey`] for
//!   schema-free categorization
//! - **Values**: [`PropertyValue`], the storage-legal value enum
//! - **Symbols**: [`Symbol`] and [`SymbolTable`], the planner-assigned
//!   frame slots
//! - **Errors**: [`EngineError`], the engine-wide error taxonomy with
//!   retryable classification
//!
//! # Modules
//!
//! - [`types`] - Identifier, name and value types
//! - [`symbol`] - Planner symbols and the symbol table
//! - [`error`] - Error types ([`EngineError`])

pub mod error;
pub mod symbol;
pub mod types;

// Re-export commonly used types
pub use error::{EngineError, EngineResult};
pub use symbol::{Symbol, SymbolKind, SymbolTable};
pub use types::{
    EdgeTypeName, Gid, GlobalAddress, Label, PlanId, PropertyKey, PropertyValue, WorkerId,
};
