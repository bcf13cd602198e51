//! The `Synchronize` barrier.

use tracing::debug;

use quiver_core::{EngineError, EngineResult};

use crate::distributed::rpc::PullState;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::{PullRemoteNode, SynchronizeNode};
use crate::value::TypedValue;

/// The two-phase accumulation barrier placed before reads that must see
/// writes.
///
/// Phase one drains the pipeline everywhere: every peer is told to
/// accumulate its side of the dispatched plan, while the local input is
/// drained into a buffer. Phase two optionally advances the command,
/// then replays the deferred updates on every update server. Only then
/// are rows streamed: the local buffer first, the remote stream after.
/// With a command advance, streamed values are reconstructed into their
/// new-view form and workers are notified so their shards advance too.
pub struct SynchronizeCursor {
    node: SynchronizeNode,
    pull_remote_node: Option<PullRemoteNode>,
    input: BoxedCursor,
    pull_remote: Option<BoxedCursor>,
    local_frames: Vec<Vec<TypedValue>>,
    initial_done: bool,
}

impl SynchronizeCursor {
    /// Creates the cursor. A present remote stream must be a
    /// `PullRemote` plan.
    pub fn new(
        node: SynchronizeNode,
        input: BoxedCursor,
        pull_remote: Option<BoxedCursor>,
    ) -> EngineResult<Self> {
        let pull_remote_node = match node.pull_remote.as_deref() {
            Some(crate::plan::PlanNode::PullRemote(n)) => Some(n.clone()),
            Some(other) => {
                return Err(EngineError::query(format!(
                    "synchronize expects a remote pull stream, got {}",
                    other.name()
                )))
            }
            None => None,
        };
        Ok(Self {
            node,
            pull_remote_node,
            input,
            pull_remote,
            local_frames: Vec::new(),
            initial_done: false,
        })
    }

    fn initial_pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<()> {
        let runtime = ctx.distributed.clone();
        let transaction = ctx.tx.transaction_id();

        // Phase one: every peer accumulates its side of the plan while
        // the local input drains.
        let mut accumulations = Vec::new();
        if let (Some(runtime), Some(remote_plan)) = (&runtime, &self.pull_remote_node) {
            let own = ctx.tx.worker_id();
            for worker in runtime.pull_clients.worker_ids() {
                if worker == own {
                    continue;
                }
                accumulations.push(runtime.pull_clients.pull(
                    transaction,
                    worker,
                    remote_plan.plan_id,
                    &ctx.parameters,
                    &remote_plan.symbols,
                    true,
                    0,
                ));
            }
        }

        while self.input.pull(frame, ctx)? {
            self.local_frames.push(frame.take());
        }

        for handle in accumulations {
            let batch = handle.wait();
            match batch.state {
                PullState::Exhausted => {}
                PullState::InProgress => {
                    return Err(EngineError::query(
                        "expected an exhausted cursor after remote accumulation",
                    ))
                }
                other => other.into_result("perform remote accumulation")?,
            }
        }
        debug!(local_rows = self.local_frames.len(), "accumulation complete");

        // Phase two: make the barrier's writes readable.
        if self.node.advance_command {
            ctx.tx.advance_command();
        }

        if let Some(runtime) = &runtime {
            let apply_handles =
                runtime.update_clients.apply_all(ctx.tx.worker_id(), transaction);
            runtime.update_server.apply(transaction).into_result("apply deferred updates")?;
            for handle in apply_handles {
                handle.wait().into_result("apply deferred updates")?;
            }
        }

        if self.node.advance_command {
            if let Some(runtime) = &runtime {
                for handle in runtime.pull_clients.notify_command_advanced(transaction) {
                    handle.wait();
                }
                // Cached remote records predate the advance.
                runtime.data_manager.invalidate();
            }
        }
        Ok(())
    }
}

impl Cursor for SynchronizeCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.initial_done {
            self.initial_pull(frame, ctx)?;
            self.initial_done = true;
        }

        if let Some(mut row) = self.local_frames.pop() {
            if self.node.advance_command {
                for value in &mut row {
                    value.reconstruct()?;
                }
            }
            frame.replace(row);
            return Ok(true);
        }

        if let Some(pull_remote) = &mut self.pull_remote {
            return pull_remote.pull(frame, ctx);
        }
        Ok(false)
    }

    fn reset(&mut self) -> EngineResult<()> {
        Err(EngineError::query("a synchronize cursor cannot be reset"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::operators::scan::ScanAllCursor;
    use crate::exec::tests::{seeded_context, symbol};
    use crate::plan::ScanAllNode;
    use quiver_core::{PropertyKey, PropertyValue};
    use quiver_graph::View;

    #[test]
    fn single_node_barrier_accumulates_and_advances() {
        let mut ctx = seeded_context(|tx| {
            let v = tx.insert_vertex();
            v.set_property(PropertyKey::new("p"), PropertyValue::Int(1)).unwrap();
        });
        let n = symbol(0);
        let scan = ScanAllCursor::all(
            ScanAllNode {
                input: crate::plan::PlanNode::once(),
                output: n.clone(),
                view: View::New,
            },
            Box::new(OnceCursor::new()),
        );
        let node = SynchronizeNode {
            input: crate::plan::PlanNode::once(),
            pull_remote: None,
            advance_command: true,
        };
        let mut cursor = SynchronizeCursor::new(node, Box::new(scan), None).unwrap();
        let mut frame = Frame::new(1);

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        // The streamed accessor is in its new-view form.
        let vertex = frame[&n].as_vertex().unwrap().clone();
        assert_eq!(vertex.current_view(), View::New);
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());

        // The command advanced: the write is old-view visible now.
        let mut old_side = vertex.clone();
        old_side.switch_old();
        assert_eq!(old_side.property(&PropertyKey::new("p")).unwrap(), PropertyValue::Int(1));
    }

    #[test]
    fn rejects_a_non_pull_remote_stream() {
        let node = SynchronizeNode {
            input: crate::plan::PlanNode::once(),
            pull_remote: Some(crate::plan::PlanNode::once()),
            advance_command: false,
        };
        let result =
            SynchronizeCursor::new(node, Box::new(OnceCursor::new()), None);
        assert!(result.is_err());
    }

    #[test]
    fn reset_is_unsupported() {
        let node = SynchronizeNode {
            input: crate::plan::PlanNode::once(),
            pull_remote: None,
            advance_command: false,
        };
        let mut cursor = SynchronizeCursor::new(node, Box::new(OnceCursor::new()), None).unwrap();
        assert!(cursor.reset().is_err());
    }
}
