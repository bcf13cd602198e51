//! The `Cartesian` operator.

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::CartesianNode;
use crate::value::TypedValue;

/// The cross product of two inputs.
///
/// The left input is materialised on the first pull; the right input
/// then streams, and for each of its rows the left buffer is replayed.
/// An empty left side produces nothing (the right input is still pulled
/// once to discover that).
pub struct CartesianCursor {
    node: CartesianNode,
    left: BoxedCursor,
    right: BoxedCursor,
    left_frames: Vec<Vec<TypedValue>>,
    right_frame: Vec<TypedValue>,
    left_index: usize,
    initialized: bool,
}

impl CartesianCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: CartesianNode, left: BoxedCursor, right: BoxedCursor) -> Self {
        Self {
            node,
            left,
            right,
            left_frames: Vec::new(),
            right_frame: Vec::new(),
            left_index: 0,
            initialized: false,
        }
    }
}

fn restore(frame: &mut Frame, symbols: &[quiver_core::Symbol], source: &[TypedValue]) {
    for symbol in symbols {
        frame[symbol] = source[symbol.position()].clone();
    }
}

impl Cursor for CartesianCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.initialized {
            while self.left.pull(frame, ctx)? {
                ctx.check_abort()?;
                self.left_frames.push(frame.snapshot());
            }
            // Start at the end so the first pull advances the right side.
            self.left_index = self.left_frames.len();
            self.initialized = true;
        }

        if self.left_frames.is_empty() {
            return Ok(false);
        }

        if self.left_index >= self.left_frames.len() {
            if !self.right.pull(frame, ctx)? {
                return Ok(false);
            }
            self.right_frame = frame.snapshot();
            self.left_index = 0;
        } else {
            // Keep the right side's last row on the frame.
            restore(frame, &self.node.right_symbols, &self.right_frame);
        }

        restore(frame, &self.node.left_symbols, &self.left_frames[self.left_index]);
        self.left_index += 1;
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.left.reset()?;
        self.right.reset()?;
        self.left_frames.clear();
        self.right_frame.clear();
        self.left_index = 0;
        self.initialized = false;
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

    fn unwind(values: &[i64], out: quiver_core::Symbol) -> BoxedCursor {
        Box::new(UnwindCursor::new(
            UnwindNode {
                input: crate::plan::PlanNode::once(),
                input_expression: Expr::List(values.iter().copied().map(Expr::integer).collect()),
                output_symbol: out,
            },
            Box::new(OnceCursor::new()),
        ))
    }

    #[test]
    fn produces_all_pairs() {
        let mut ctx = test_context();
        let x = symbol(0);
        let y = symbol(1);
        let node = CartesianNode {
            left: crate::plan::PlanNode::once(),
            right: crate::plan::PlanNode::once(),
            left_symbols: vec![x.clone()],
            right_symbols: vec![y.clone()],
        };
        let mut cursor =
            CartesianCursor::new(node, unwind(&[1, 2], x.clone()), unwind(&[10, 20], y.clone()));
        let mut frame = Frame::new(2);

        let mut pairs = Vec::new();
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            pairs.push((frame[&x].as_int().unwrap(), frame[&y].as_int().unwrap()));
        }
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(1, 10), (1, 20), (2, 10), (2, 20)]);
    }

    #[test]
    fn empty_left_side_yields_nothing() {
        let mut ctx = test_context();
        let x = symbol(0);
        let y = symbol(1);
        let node = CartesianNode {
            left: crate::plan::PlanNode::once(),
            right: crate::plan::PlanNode::once(),
            left_symbols: vec![x.clone()],
            right_symbols: vec![y.clone()],
        };
        let mut cursor = CartesianCursor::new(node, unwind(&[], x), unwind(&[10], y));
        let mut frame = Frame::new(2);
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
    }
}
