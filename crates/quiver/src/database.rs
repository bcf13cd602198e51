//! The single-node database surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use quiver_core::{EngineError, EngineResult, SymbolTable, WorkerId};
use quiver_graph::{GraphStore, GraphTx};
use quiver_query::plan::PlanRef;
use quiver_query::{make_cursor, ExecutionContext, Frame, Parameters, TypedValue};

use crate::config::EngineConfig;
use crate::plan_cache::PlanCache;

/// The rows of a completed query, projected on the plan's output
/// symbols.
#[derive(Debug, Default)]
pub struct QueryResult {
    /// The produced rows.
    pub rows: Vec<Vec<TypedValue>>,
}

/// How many times a retryable failure restarts the plan on a fresh
/// transaction.
const MAX_RETRIES: u32 = 3;

/// Reruns the attempt on retryable failures (serialization conflicts,
/// lock timeouts); fatal errors and exhaustion of the retry budget
/// surface to the caller.
pub fn with_retries<T>(mut attempt: impl FnMut() -> EngineResult<T>) -> EngineResult<T> {
    let mut tries = 0;
    loop {
        match attempt() {
            Err(error) if error.is_retryable() && tries < MAX_RETRIES => {
                tries += 1;
                debug!(%error, tries, "retrying transaction");
            }
            other => return other,
        }
    }
}

/// An embedded single-node engine instance.
pub struct Database {
    store: Arc<GraphStore>,
    config: EngineConfig,
    plan_cache: PlanCache,
    next_transaction: AtomicU64,
}

impl Database {
    /// Opens an in-memory single-node instance.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_config(EngineConfig::new())
    }

    /// Opens an in-memory instance with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            store: Arc::new(GraphStore::new(WorkerId::MASTER)),
            plan_cache: PlanCache::new(config.plan_cache_ttl_sec),
            config,
            next_transaction: AtomicU64::new(1),
        }
    }

    /// Returns the underlying shard.
    #[must_use]
    pub fn store(&self) -> Arc<GraphStore> {
        Arc::clone(&self.store)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the prepared-plan cache.
    #[must_use]
    pub const fn plan_cache(&self) -> &PlanCache {
        &self.plan_cache
    }

    /// Opens a transaction-scoped accessor.
    #[must_use]
    pub fn tx(&self) -> GraphTx {
        let _transaction = self.next_transaction.fetch_add(1, Ordering::SeqCst);
        GraphTx::single_node(Arc::clone(&self.store))
    }

    /// Resolves a prepared plan through the cache, building and caching
    /// it on a miss.
    pub fn prepare(
        &self,
        query: &str,
        build: impl FnOnce() -> (PlanRef, SymbolTable),
    ) -> (PlanRef, SymbolTable) {
        if let Some(prepared) = self.plan_cache.get(query) {
            return prepared;
        }
        let (plan, table) = build();
        self.plan_cache.insert(query, PlanRef::clone(&plan), table.clone());
        (plan, table)
    }

    /// Runs a plan to completion within one transaction, retrying on
    /// retryable failures, and returns the rows projected on the plan's
    /// output symbols.
    pub fn run_plan(
        &self,
        plan: &PlanRef,
        table: &SymbolTable,
        parameters: &Parameters,
    ) -> EngineResult<QueryResult> {
        with_retries(|| self.run_plan_once(plan, table, parameters.clone()))
    }

    fn run_plan_once(
        &self,
        plan: &PlanRef,
        table: &SymbolTable,
        parameters: Parameters,
    ) -> EngineResult<QueryResult> {
        let mut ctx =
            ExecutionContext::new(self.tx(), table.clone()).with_parameters(parameters);
        ctx.config = self.config.execution();

        let outputs = plan.output_symbols();
        let mut cursor = make_cursor(plan)?;
        let mut frame = Frame::new(table.len());
        let mut rows = Vec::new();
        loop {
            match cursor.pull(&mut frame, &mut ctx) {
                Ok(true) => {
                    rows.push(outputs.iter().map(|symbol| frame[symbol].clone()).collect());
                }
                Ok(false) => break,
                Err(EngineError::AbortRequested) => {
                    // The cooperative abort is recovered here: the
                    // transaction ends, nothing is reported as a
                    // failure of the operator pipeline.
                    debug!("query aborted on request");
                    return Err(EngineError::AbortRequested);
                }
                Err(error) => return Err(error),
            }
        }

        // Writes of this statement become visible to the next one.
        ctx.tx.advance_command();

        if ctx.index_created {
            // Cached plans were chosen without the new index.
            self.plan_cache.clear();
        }
        Ok(QueryResult { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_reruns_retryable_failures() {
        let mut attempts = 0;
        let result = with_retries(|| {
            attempts += 1;
            if attempts < 3 {
                Err(EngineError::Serialization("conflict".into()))
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn retry_gives_up_on_fatal_errors() {
        let mut attempts = 0;
        let result: EngineResult<()> = with_retries(|| {
            attempts += 1;
            Err(EngineError::query("bad"))
        });
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let mut attempts = 0;
        let result: EngineResult<()> = with_retries(|| {
            attempts += 1;
            Err(EngineError::LockTimeout("stuck".into()))
        });
        assert!(result.is_err());
        assert_eq!(attempts, 1 + MAX_RETRIES);
    }
}
