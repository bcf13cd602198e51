//! The `Unwind` operator.

use quiver_core::{EngineError, EngineResult};
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::UnwindNode;
use crate::value::TypedValue;

/// Yields one row per element of a list expression, evaluated once per
/// input row.
pub struct UnwindCursor {
    node: UnwindNode,
    input: BoxedCursor,
    items: Option<std::vec::IntoIter<TypedValue>>,
}

impl UnwindCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: UnwindNode, input: BoxedCursor) -> Self {
        Self { node, input, items: None }
    }
}

impl Cursor for UnwindCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;
            if let Some(iter) = &mut self.items {
                if let Some(value) = iter.next() {
                    frame[&self.node.output_symbol] = value;
                    return Ok(true);
                }
                self.items = None;
            }
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::Old);
            match evaluator.eval(&self.node.input_expression)? {
                TypedValue::List(items) => self.items = Some(items.into_iter()),
                other => {
                    return Err(EngineError::type_mismatch("list", other.type_name()));
                }
            }
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.items = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::tests::{symbol, test_context};
    use crate::expr::Expr;
    use quiver_core::PropertyValue;

    #[test]
    fn yields_one_row_per_element() {
        let mut ctx = test_context();
        let out = symbol(0);
        let node = UnwindNode {
            input: crate::plan::PlanNode::once(),
            input_expression: Expr::List(vec![Expr::integer(1), Expr::integer(2)]),
            output_symbol: out.clone(),
        };
        let mut cursor = UnwindCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(1);

        let mut seen = Vec::new();
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            seen.push(frame[&out].as_int().unwrap());
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn empty_list_yields_nothing() {
        let mut ctx = test_context();
        let node = UnwindNode {
            input: crate::plan::PlanNode::once(),
            input_expression: Expr::List(vec![]),
            output_symbol: symbol(0),
        };
        let mut cursor = UnwindCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(1);
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
    }

    #[test]
    fn non_list_is_a_type_error() {
        let mut ctx = test_context();
        let node = UnwindNode {
            input: crate::plan::PlanNode::once(),
            input_expression: Expr::Literal(PropertyValue::Int(1)),
            output_symbol: symbol(0),
        };
        let mut cursor = UnwindCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(1);
        let err = cursor.pull(&mut frame, &mut ctx).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }
}
