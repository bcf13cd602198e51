//! The `Accumulate` operator.

use std::collections::VecDeque;

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::AccumulateNode;
use crate::value::TypedValue;

/// Buffers the whole input before streaming it.
///
/// An `advance_command` accumulation additionally advances the
/// transaction's command once the input is drained and reconstructs the
/// buffered values into their new-view form, so everything written
/// upstream is observable downstream.
pub struct AccumulateCursor {
    node: AccumulateNode,
    input: BoxedCursor,
    cache: VecDeque<Vec<TypedValue>>,
    pulled_all: bool,
}

impl AccumulateCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: AccumulateNode, input: BoxedCursor) -> Self {
        Self { node, input, cache: VecDeque::new(), pulled_all: false }
    }
}

impl Cursor for AccumulateCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.pulled_all {
            while self.input.pull(frame, ctx)? {
                ctx.check_abort()?;
                let row =
                    self.node.symbols.iter().map(|symbol| frame[symbol].clone()).collect();
                self.cache.push_back(row);
            }
            self.pulled_all = true;

            if self.node.advance_command {
                ctx.tx.advance_command();
                for row in &mut self.cache {
                    for value in row {
                        value.reconstruct()?;
                    }
                }
            }
        }

        let Some(row) = self.cache.pop_front() else { return Ok(false) };
        for (symbol, value) in self.node.symbols.iter().zip(row) {
            frame[symbol] = value;
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.cache.clear();
        self.pulled_all = false;
        Ok(())
    }
}
