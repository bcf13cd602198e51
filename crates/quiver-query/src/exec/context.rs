//! Per-query execution state.

use std::sync::Arc;

use quiver_core::{EngineError, EngineResult, SymbolTable};
use quiver_graph::GraphTx;

use crate::distributed::DistributedRuntime;
use crate::eval::Parameters;

/// Runtime configuration of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Poll interval, in milliseconds, while waiting for remote results.
    pub remote_pull_sleep_ms: u64,
    /// Rows per remote-pull batch.
    pub batch_size: usize,
}

impl ExecutionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self { remote_pull_sleep_ms: 1, batch_size: 20 }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The state shared by every cursor of one pull chain.
///
/// Cursors receive the context on every pull. All cursors of one query
/// run on one thread; the transaction-scoped [`GraphTx`] is therefore
/// shared without further synchronisation.
pub struct ExecutionContext {
    /// The transactional graph accessor.
    pub tx: GraphTx,
    /// Named parameter bindings.
    pub parameters: Parameters,
    /// The plan's symbol assignment.
    pub symbol_table: SymbolTable,
    /// Runtime configuration.
    pub config: ExecutionConfig,
    /// True inside an explicit (multicommand) transaction.
    pub in_explicit_transaction: bool,
    /// Set when the query created an index; the plan cache is flushed
    /// by the caller.
    pub index_created: bool,
    /// The cluster runtime; absent on single-node executions.
    pub distributed: Option<Arc<DistributedRuntime>>,
}

impl ExecutionContext {
    /// Creates a context for a single-node execution.
    #[must_use]
    pub fn new(tx: GraphTx, symbol_table: SymbolTable) -> Self {
        Self {
            tx,
            parameters: Parameters::new(),
            symbol_table,
            config: ExecutionConfig::new(),
            in_explicit_transaction: false,
            index_created: false,
            distributed: None,
        }
    }

    /// Attaches parameter bindings.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attaches the cluster runtime.
    #[must_use]
    pub fn with_distributed(mut self, runtime: Arc<DistributedRuntime>) -> Self {
        self.distributed = Some(runtime);
        self
    }

    /// Returns true once cooperative abortion was requested.
    #[must_use]
    pub fn should_abort(&self) -> bool {
        self.tx.should_abort()
    }

    /// Fails with `AbortRequested` once cooperative abortion was
    /// requested. Every operator that can loop for a long time calls
    /// this at the top of its pull.
    pub fn check_abort(&self) -> EngineResult<()> {
        if self.should_abort() {
            Err(EngineError::AbortRequested)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::WorkerId;
    use quiver_graph::GraphStore;

    #[test]
    fn abort_check_fails_after_request() {
        let tx = GraphTx::single_node(Arc::new(GraphStore::new(WorkerId::MASTER)));
        let ctx = ExecutionContext::new(tx, SymbolTable::new());

        assert!(ctx.check_abort().is_ok());
        ctx.tx.request_abort();
        assert!(matches!(ctx.check_abort().unwrap_err(), EngineError::AbortRequested));
    }
}
