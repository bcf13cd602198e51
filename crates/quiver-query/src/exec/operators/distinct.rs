//! The `Distinct` operator.

use std::collections::HashSet;

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::DistinctNode;
use crate::value::RowKey;

/// Forwards the first row of every distinct projection, under
/// null-aware equality.
pub struct DistinctCursor {
    node: DistinctNode,
    input: BoxedCursor,
    seen: HashSet<RowKey>,
}

impl DistinctCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: DistinctNode, input: BoxedCursor) -> Self {
        Self { node, input, seen: HashSet::new() }
    }
}

impl Cursor for DistinctCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            let row = RowKey(
                self.node.value_symbols.iter().map(|symbol| frame[symbol].clone()).collect(),
            );
            if self.seen.insert(row) {
                return Ok(true);
            }
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.seen.clear();
        Ok(())
    }
}
