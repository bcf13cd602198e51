//! The `PullRemote` operator.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::trace;

use quiver_core::{EngineError, EngineResult, WorkerId};

use crate::distributed::future::TaskHandle;
use crate::distributed::rpc::{PullBatch, PullState};
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::PullRemoteNode;
use crate::value::TypedValue;

/// Streams the rows of every worker's dispatched plan.
///
/// One pull is kept in flight per worker; completed batches are parked
/// per worker and served round-robin, starting after the worker served
/// last. Whenever no batch is ready, one local row is attempted from the
/// optional input; when neither side has anything, the cursor sleeps
/// between polls. Workers leave the rotation once their batches are
/// drained and no pull is outstanding.
pub struct PullRemoteCursor {
    node: PullRemoteNode,
    input: Option<BoxedCursor>,
    workers: Vec<WorkerId>,
    pulls: HashMap<WorkerId, TaskHandle<PullBatch>>,
    results: HashMap<WorkerId, VecDeque<Vec<TypedValue>>>,
    last_index: usize,
    initialized: bool,
}

impl PullRemoteCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: PullRemoteNode, input: Option<BoxedCursor>) -> Self {
        Self {
            node,
            input,
            workers: Vec::new(),
            pulls: HashMap::new(),
            results: HashMap::new(),
            last_index: 0,
            initialized: false,
        }
    }

    fn start_pull(&mut self, worker: WorkerId, ctx: &ExecutionContext) {
        let runtime = ctx.distributed.as_ref().expect("pulls start only with a cluster runtime");
        let handle = runtime.pull_clients.pull(
            ctx.tx.transaction_id(),
            worker,
            self.node.plan_id,
            &ctx.parameters,
            &self.node.symbols,
            false,
            ctx.config.batch_size,
        );
        self.pulls.insert(worker, handle);
    }

    /// Collects every completed batch, translating error states.
    fn harvest_completed(&mut self, ctx: &ExecutionContext) -> EngineResult<()> {
        for worker in self.workers.clone() {
            if self.results.get(&worker).is_some_and(|batch| !batch.is_empty()) {
                continue;
            }
            let Some(handle) = self.pulls.get_mut(&worker) else { continue };
            let Some(batch) = handle.try_take() else { continue };
            self.pulls.remove(&worker);

            batch.state.into_result("perform remote pull")?;
            trace!(%worker, rows = batch.frames.len(), state = ?batch.state, "remote batch");
            self.results.entry(worker).or_default().extend(batch.frames);
            if batch.state == PullState::InProgress {
                self.start_pull(worker, ctx);
            }
        }
        Ok(())
    }

    /// Picks the next worker with a parked batch, round-robin after the
    /// last served one.
    fn pick_worker(&mut self) -> bool {
        let count = self.workers.len();
        for offset in 0..count {
            let index = (self.last_index + offset + 1) % count;
            let worker = self.workers[index];
            if self.results.get(&worker).is_some_and(|batch| !batch.is_empty()) {
                self.last_index = index;
                return true;
            }
        }
        false
    }
}

impl Cursor for PullRemoteCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if ctx.distributed.is_none() {
            // Without a cluster the operator degrades to its local input.
            return match &mut self.input {
                Some(input) => input.pull(frame, ctx),
                None => Ok(false),
            };
        }

        if !self.initialized {
            let runtime = ctx.distributed.as_ref().expect("checked above");
            let own = ctx.tx.worker_id();
            self.workers =
                runtime.pull_clients.worker_ids().into_iter().filter(|w| *w != own).collect();
            for worker in self.workers.clone() {
                self.start_pull(worker, ctx);
            }
            self.initialized = true;
        }

        let mut have_remote = false;
        while !have_remote && !self.workers.is_empty() {
            ctx.check_abort()?;
            self.harvest_completed(ctx)?;

            if self.pick_worker() {
                have_remote = true;
                break;
            }

            if self.pulls.is_empty() {
                // Every worker is drained.
                self.workers.clear();
                break;
            }

            // Nothing remote is ready; try to make local progress, then
            // back off.
            if let Some(input) = &mut self.input {
                if input.pull(frame, ctx)? {
                    return Ok(true);
                }
            }
            std::thread::sleep(Duration::from_millis(ctx.config.remote_pull_sleep_ms));
        }

        if !have_remote {
            return match &mut self.input {
                Some(input) => input.pull(frame, ctx),
                None => Ok(false),
            };
        }

        let worker = self.workers[self.last_index];
        let row = self
            .results
            .get_mut(&worker)
            .and_then(VecDeque::pop_front)
            .expect("the picked worker holds a parked batch");
        for (symbol, value) in self.node.symbols.iter().zip(row) {
            frame[symbol] = value;
        }

        // Retire the worker once nothing is parked or in flight for it.
        if self.results.get(&worker).map_or(true, VecDeque::is_empty)
            && !self.pulls.contains_key(&worker)
        {
            self.workers.remove(self.last_index);
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        Err(EngineError::query("a remote pull cursor cannot be reset"))
    }
}
