//! The `Produce` operator.

use quiver_core::EngineResult;
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::ProduceNode;

/// Evaluates the projection per row and writes it onto the output
/// symbols. Projections always observe the latest (new-view) state.
pub struct ProduceCursor {
    node: ProduceNode,
    input: BoxedCursor,
}

impl ProduceCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: ProduceNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for ProduceCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        let values = {
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
            self.node
                .named_expressions
                .iter()
                .map(|ne| evaluator.eval(&ne.expression))
                .collect::<EngineResult<Vec<_>>>()?
        };
        for (ne, value) in self.node.named_expressions.iter().zip(values) {
            frame[&ne.symbol] = value;
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::tests::{symbol, test_context};
    use crate::expr::Expr;
    use crate::plan::NamedExpr;

    #[test]
    fn writes_projection_symbols() {
        let mut ctx = test_context();
        let out = symbol(0);
        let node = ProduceNode {
            input: crate::plan::PlanNode::once(),
            named_expressions: vec![NamedExpr {
                symbol: out.clone(),
                expression: Expr::add(Expr::integer(1), Expr::integer(2)),
            }],
        };
        let mut cursor = ProduceCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(1);

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        assert_eq!(frame[&out].as_int().unwrap(), 3);
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
    }
}
