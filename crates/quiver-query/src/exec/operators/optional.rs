//! The `Optional` operator.

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::OptionalNode;
use crate::value::TypedValue;

/// `OPTIONAL MATCH`: forwards every row the optional branch yields for
/// an input row; when the branch yields nothing, forwards one row with
/// the optional symbols set to null. Every input row thus produces at
/// least one output row.
pub struct OptionalCursor {
    node: OptionalNode,
    input: BoxedCursor,
    optional: BoxedCursor,
    pull_input: bool,
}

impl OptionalCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: OptionalNode, input: BoxedCursor, optional: BoxedCursor) -> Self {
        Self { node, input, optional, pull_input: true }
    }
}

impl Cursor for OptionalCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;
            if self.pull_input {
                if !self.input.pull(frame, ctx)? {
                    return Ok(false);
                }
                // The branch's expansion cursors keep state per input
                // row.
                self.optional.reset()?;
            }

            if self.optional.pull(frame, ctx)? {
                self.pull_input = false;
                return Ok(true);
            }

            if self.pull_input {
                // The branch yielded nothing for a fresh input row:
                // null the optional symbols and move on.
                for symbol in &self.node.optional_symbols {
                    frame[symbol] = TypedValue::Null;
                }
                return Ok(true);
            }

            // The branch ran dry after one or more rows; fetch the next
            // input row.
            self.pull_input = true;
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.optional.reset()?;
        self.pull_input = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::operators::unwind::UnwindCursor;
    use crate::exec::tests::{symbol, test_context};
    use crate::expr::Expr;
    use crate::plan::UnwindNode;

    #[test]
    fn empty_branch_yields_one_null_row() {
        let mut ctx = test_context();
        let out = symbol(0);
        let branch = UnwindCursor::new(
            UnwindNode {
                input: crate::plan::PlanNode::once(),
                input_expression: Expr::List(vec![]),
                output_symbol: out.clone(),
            },
            Box::new(OnceCursor::new()),
        );
        let node = OptionalNode {
            input: crate::plan::PlanNode::once(),
            optional: crate::plan::PlanNode::once(),
            optional_symbols: vec![out.clone()],
        };
        let mut cursor =
            OptionalCursor::new(node, Box::new(OnceCursor::new()), Box::new(branch));
        let mut frame = Frame::new(1);

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        assert!(frame[&out].is_null());
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
    }

    #[test]
    fn non_empty_branch_forwards_all_rows() {
        let mut ctx = test_context();
        let out = symbol(0);
        let branch = UnwindCursor::new(
            UnwindNode {
                input: crate::plan::PlanNode::once(),
                input_expression: Expr::List(vec![Expr::integer(1), Expr::integer(2)]),
                output_symbol: out.clone(),
            },
            Box::new(OnceCursor::new()),
        );
        let node = OptionalNode {
            input: crate::plan::PlanNode::once(),
            optional: crate::plan::PlanNode::once(),
            optional_symbols: vec![out.clone()],
        };
        let mut cursor =
            OptionalCursor::new(node, Box::new(OnceCursor::new()), Box::new(branch));
        let mut frame = Frame::new(1);

        let mut seen = Vec::new();
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            seen.push(frame[&out].as_int().unwrap());
        }
        assert_eq!(seen, vec![1, 2]);
    }
}
