//! The `Filter` operator.

use quiver_core::EngineResult;
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::FilterNode;

/// Keeps rows whose predicate evaluates to true; null counts as false.
///
/// The predicate sees the old view: newly set values must not affect
/// filtering within the same command.
pub struct FilterCursor {
    node: FilterNode,
    input: BoxedCursor,
}

impl FilterCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: FilterNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for FilterCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        while self.input.pull(frame, ctx)? {
            ctx.check_abort()?;
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::Old);
            if evaluator.eval_filter(&self.node.expression)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::operators::unwind::UnwindCursor;
    use crate::exec::tests::{symbol, test_context};
    use crate::expr::{CmpOp, Expr};
    use crate::plan::UnwindNode;

    #[test]
    fn keeps_matching_rows_only() {
        let mut ctx = test_context();
        let x = symbol(0);
        let unwind = UnwindCursor::new(
            UnwindNode {
                input: crate::plan::PlanNode::once(),
                input_expression: Expr::List(vec![
                    Expr::integer(1),
                    Expr::integer(2),
                    Expr::integer(3),
                ]),
                output_symbol: x.clone(),
            },
            Box::new(OnceCursor::new()),
        );
        let node = FilterNode {
            input: crate::plan::PlanNode::once(),
            expression: Expr::compare(CmpOp::Gt, Expr::ident(x.clone()), Expr::integer(1)),
        };
        let mut cursor = FilterCursor::new(node, Box::new(unwind));

        let mut frame = Frame::new(1);
        let mut seen = Vec::new();
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            seen.push(frame[&x].as_int().unwrap());
        }
        assert_eq!(seen, vec![2, 3]);
    }
}
