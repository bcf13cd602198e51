//! The cursor protocol and every operator.

pub mod context;
pub mod cursor;
pub mod factory;
pub mod operators;

pub use context::{ExecutionConfig, ExecutionContext};
pub use cursor::{BoxedCursor, Cursor};
pub use factory::make_cursor;

// Parameter bindings are part of the execution surface.
pub use crate::eval::Parameters;

#[cfg(test)]
pub(crate) mod tests {
    //! Shared fixtures for operator tests.

    use std::sync::Arc;

    use quiver_core::{Symbol, SymbolKind, SymbolTable, WorkerId};
    use quiver_graph::{GraphStore, GraphTx};

    use super::context::ExecutionContext;

    /// A positional test symbol.
    pub fn symbol(position: usize) -> Symbol {
        Symbol::new(format!("s{position}"), position, SymbolKind::Any)
    }

    /// A single-node context over an empty shard.
    pub fn test_context() -> ExecutionContext {
        seeded_context(|_| {})
    }

    /// A single-node context whose shard is seeded by the closure.
    pub fn seeded_context(seed: impl FnOnce(&GraphTx)) -> ExecutionContext {
        let store = Arc::new(GraphStore::new(WorkerId::MASTER));
        let tx = GraphTx::single_node(store);
        seed(&tx);
        ExecutionContext::new(tx, SymbolTable::new())
    }
}
