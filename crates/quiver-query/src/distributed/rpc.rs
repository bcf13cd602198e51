//! RPC client pool traits and wire state codes.
//!
//! The engine never talks to a transport directly: `PullRemote` and
//! `Synchronize` go through these pools, and the pools return
//! [`TaskHandle`]s so cursors can poll instead of block. Errors cross
//! the boundary as state codes ([`PullState`],
//! [`UpdateResult`](quiver_graph::UpdateResult)) and are translated back
//! into the error taxonomy at the moment a result is taken.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quiver_core::{EngineError, EngineResult, PlanId, Symbol, SymbolTable, WorkerId};
use quiver_graph::{UpdateResult, UpdateServer};

use crate::distributed::data_manager::DataManager;
use crate::distributed::future::TaskHandle;
use crate::eval::Parameters;
use crate::plan::PlanRef;
use crate::value::TypedValue;

/// The state of a worker-side cursor after a remote pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullState {
    /// More rows may follow.
    InProgress,
    /// The worker-side cursor is exhausted.
    Exhausted,
    /// A serialization conflict; retryable.
    SerializationFailure,
    /// A lock could not be acquired in time; retryable.
    LockTimeout,
    /// An update targeted a deleted record.
    UpdateDeleted,
    /// A record could not be re-resolved.
    ReconstructionFailure,
    /// Any other runtime failure of the worker-side plan.
    QueryFailure,
}

impl PullState {
    /// Maps a worker-side error onto the state code crossing the wire.
    #[must_use]
    pub fn from_error(error: &EngineError) -> Self {
        match error {
            EngineError::Serialization(_) => Self::SerializationFailure,
            EngineError::LockTimeout(_) => Self::LockTimeout,
            EngineError::RecordDeleted(_) => Self::UpdateDeleted,
            EngineError::Reconstruction(_) => Self::ReconstructionFailure,
            _ => Self::QueryFailure,
        }
    }

    /// Translates an error state back into the taxonomy; the progress
    /// states map to `Ok`. `phase` names the failing operation in the
    /// user-visible message.
    pub fn into_result(self, phase: &str) -> EngineResult<()> {
        match self {
            Self::InProgress | Self::Exhausted => Ok(()),
            Self::SerializationFailure => {
                Err(EngineError::Serialization(format!("failed to {phase}")))
            }
            Self::LockTimeout => Err(EngineError::LockTimeout(format!("failed to {phase}"))),
            Self::UpdateDeleted => Err(EngineError::RecordDeleted(format!("failed to {phase}"))),
            Self::ReconstructionFailure => {
                Err(EngineError::Reconstruction(format!("failed to {phase}")))
            }
            Self::QueryFailure => Err(EngineError::query(format!("failed to {phase}"))),
        }
    }
}

/// One batch of rows pulled from a worker.
#[derive(Debug)]
pub struct PullBatch {
    /// The worker-side cursor state after producing the batch.
    pub state: PullState,
    /// The shipped rows, projected on the pull's symbols.
    pub frames: Vec<Vec<TypedValue>>,
}

impl PullBatch {
    /// A batch carrying only a state code.
    #[must_use]
    pub fn state(state: PullState) -> Self {
        Self { state, frames: Vec::new() }
    }
}

/// The pool of remote-pull clients, one per peer worker.
pub trait PullClients: Send + Sync {
    /// Returns every cluster member's id, including the caller's.
    fn worker_ids(&self) -> Vec<WorkerId>;

    /// Starts (or continues) pulling the worker-side cursor of
    /// `(transaction, plan_id)`. With `accumulate`, the worker drains
    /// its plan into a worker-held buffer and reports `Exhausted`;
    /// plain pulls then stream the buffer in batches of `batch_size`.
    #[allow(clippy::too_many_arguments)]
    fn pull(
        &self,
        transaction: u64,
        worker: WorkerId,
        plan_id: PlanId,
        parameters: &Parameters,
        symbols: &[Symbol],
        accumulate: bool,
        batch_size: usize,
    ) -> TaskHandle<PullBatch>;

    /// Tells every peer the transaction's command advanced, so
    /// worker-side cursors refresh their view.
    fn notify_command_advanced(&self, transaction: u64) -> Vec<TaskHandle<()>>;
}

/// The pool of remote-update clients.
pub trait UpdateClients: Send + Sync {
    /// Broadcasts apply-all for the transaction to every worker except
    /// `skip` (the caller, which applies its own server directly).
    fn apply_all(&self, skip: WorkerId, transaction: u64) -> Vec<TaskHandle<UpdateResult>>;
}

/// Ships worker-side plans to the cluster and tears them down.
pub trait PlanDispatcher: Send + Sync {
    /// Registers a plan under an id on every worker.
    fn dispatch(&self, plan_id: PlanId, plan: PlanRef, table: SymbolTable) -> EngineResult<()>;

    /// Removes a dispatched plan from every worker.
    fn remove(&self, plan_id: PlanId) -> EngineResult<()>;
}

/// Everything the distributed operators need from the cluster, bundled
/// into the execution context.
pub struct DistributedRuntime {
    /// The remote-pull client pool.
    pub pull_clients: Arc<dyn PullClients>,
    /// The remote-update client pool.
    pub update_clients: Arc<dyn UpdateClients>,
    /// This worker's own deferred-update server.
    pub update_server: Arc<UpdateServer>,
    /// The shared remote-record cache.
    pub data_manager: Arc<DataManager>,
}
