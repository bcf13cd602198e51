//! The `Merge` operator.

use quiver_core::{EngineError, EngineResult};

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;

/// `MERGE`: for each input row, forwards every row of the match branch;
/// when the match yields nothing, pulls the create branch exactly once
/// and forwards its row. The create branch must always succeed.
pub struct MergeCursor {
    input: BoxedCursor,
    merge_match: BoxedCursor,
    merge_create: BoxedCursor,
    pull_input: bool,
}

impl MergeCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(input: BoxedCursor, merge_match: BoxedCursor, merge_create: BoxedCursor) -> Self {
        Self { input, merge_match, merge_create, pull_input: true }
    }
}

impl Cursor for MergeCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;
            if self.pull_input {
                if !self.input.pull(frame, ctx)? {
                    return Ok(false);
                }
                // Both branches keep per-row state: the match branch's
                // expansions, and a possible `Once` at the bottom of the
                // create branch.
                self.merge_match.reset()?;
                self.merge_create.reset()?;
            }

            if self.merge_match.pull(frame, ctx)? {
                self.pull_input = false;
                return Ok(true);
            }

            if self.pull_input {
                // A fresh input row with zero matches: create.
                if !self.merge_create.pull(frame, ctx)? {
                    return Err(EngineError::query("merge create branch produced no row"));
                }
                return Ok(true);
            }

            // The match branch ran dry after at least one row; next
            // input row.
            self.pull_input = true;
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.merge_match.reset()?;
        self.merge_create.reset()?;
        self.pull_input = true;
        Ok(())
    }
}
