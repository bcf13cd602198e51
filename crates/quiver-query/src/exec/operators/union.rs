//! The `Union` operator.

use std::collections::HashMap;

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::UnionNode;
use crate::value::TypedValue;

/// Drains the left input, then the right, mapping each side's columns
/// onto the shared union symbols *by name*. Deduplication for `UNION`
/// without `ALL` is the planner's responsibility (an outer `Distinct`).
pub struct UnionCursor {
    node: UnionNode,
    left: BoxedCursor,
    right: BoxedCursor,
}

impl UnionCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: UnionNode, left: BoxedCursor, right: BoxedCursor) -> Self {
        Self { node, left, right }
    }
}

impl Cursor for UnionCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        let mut results: HashMap<&str, TypedValue> = HashMap::new();
        if self.left.pull(frame, ctx)? {
            for symbol in &self.node.left_symbols {
                results.insert(symbol.name(), frame[symbol].clone());
            }
        } else if self.right.pull(frame, ctx)? {
            for symbol in &self.node.right_symbols {
                results.insert(symbol.name(), frame[symbol].clone());
            }
        } else {
            return Ok(false);
        }

        for symbol in &self.node.union_symbols {
            let value = results.remove(symbol.name()).unwrap_or(TypedValue::Null);
            frame[symbol] = value;
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.left.reset()?;
        self.right.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::operators::produce::ProduceCursor;
    use crate::exec::tests::test_context;
    use crate::expr::Expr;
    use crate::plan::{NamedExpr, ProduceNode};
    use quiver_core::{Symbol, SymbolKind};

    #[test]
    fn maps_columns_by_name() {
        let mut ctx = test_context();
        // Left binds "x" at position 0, right binds "x" at position 1;
        // the union symbol "x" sits at position 2.
        let left_x = Symbol::new("x", 0, SymbolKind::Any);
        let right_x = Symbol::new("x", 1, SymbolKind::Any);
        let union_x = Symbol::new("x", 2, SymbolKind::Any);

        let left = ProduceCursor::new(
            ProduceNode {
                input: crate::plan::PlanNode::once(),
                named_expressions: vec![NamedExpr {
                    symbol: left_x.clone(),
                    expression: Expr::integer(1),
                }],
            },
            Box::new(OnceCursor::new()),
        );
        let right = ProduceCursor::new(
            ProduceNode {
                input: crate::plan::PlanNode::once(),
                named_expressions: vec![NamedExpr {
                    symbol: right_x.clone(),
                    expression: Expr::integer(2),
                }],
            },
            Box::new(OnceCursor::new()),
        );

        let node = UnionNode {
            left: crate::plan::PlanNode::once(),
            right: crate::plan::PlanNode::once(),
            union_symbols: vec![union_x.clone()],
            left_symbols: vec![left_x],
            right_symbols: vec![right_x],
        };
        let mut cursor = UnionCursor::new(node, Box::new(left), Box::new(right));
        let mut frame = Frame::new(3);

        let mut seen = Vec::new();
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            seen.push(frame[&union_x].as_int().unwrap());
        }
        assert_eq!(seen, vec![1, 2]);
    }
}
