//! The `OrderBy` operator.

use std::cmp::Ordering;

use quiver_core::{EngineError, EngineResult};
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::{OrderByNode, SortDirection};
use crate::value::{order_less, TypedValue};

/// Materialises the whole input, sorts it by the key expressions, then
/// streams. Only the declared output symbols survive the sort.
pub struct OrderByCursor {
    node: OrderByNode,
    input: BoxedCursor,
    cache: Vec<(Vec<TypedValue>, Vec<TypedValue>)>,
    index: usize,
    did_pull_all: bool,
}

impl OrderByCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: OrderByNode, input: BoxedCursor) -> Self {
        Self { node, input, cache: Vec::new(), index: 0, did_pull_all: false }
    }
}

/// Lexicographic comparison of two key vectors, honoring per-key sort
/// direction, with null ordered after everything.
fn compare_keys(
    order: &[(SortDirection, crate::expr::Expr)],
    a: &[TypedValue],
    b: &[TypedValue],
) -> EngineResult<Ordering> {
    for (index, (direction, _)) in order.iter().enumerate() {
        let (x, y) = (&a[index], &b[index]);
        if order_less(x, y)? {
            return Ok(match direction {
                SortDirection::Ascending => Ordering::Less,
                SortDirection::Descending => Ordering::Greater,
            });
        }
        if order_less(y, x)? {
            return Ok(match direction {
                SortDirection::Ascending => Ordering::Greater,
                SortDirection::Descending => Ordering::Less,
            });
        }
    }
    Ok(Ordering::Equal)
}

impl Cursor for OrderByCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.did_pull_all {
            while self.input.pull(frame, ctx)? {
                ctx.check_abort()?;
                let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::Old);
                let keys = self
                    .node
                    .order_by
                    .iter()
                    .map(|(_, expression)| evaluator.eval(expression))
                    .collect::<EngineResult<Vec<_>>>()?;
                let outputs = self
                    .node
                    .output_symbols
                    .iter()
                    .map(|symbol| frame[symbol].clone())
                    .collect();
                self.cache.push((keys, outputs));
            }

            // The comparator is fallible but `sort_by` is not; park the
            // first failure and surface it after the sort.
            let mut failure: Option<EngineError> = None;
            self.cache.sort_by(|a, b| {
                if failure.is_some() {
                    return Ordering::Equal;
                }
                match compare_keys(&self.node.order_by, &a.0, &b.0) {
                    Ok(ordering) => ordering,
                    Err(error) => {
                        failure = Some(error);
                        Ordering::Equal
                    }
                }
            });
            if let Some(error) = failure {
                return Err(error);
            }
            self.did_pull_all = true;
            self.index = 0;
        }

        if self.index >= self.cache.len() {
            return Ok(false);
        }
        let (_, outputs) = &self.cache[self.index];
        for (symbol, value) in self.node.output_symbols.iter().zip(outputs) {
            frame[symbol] = value.clone();
        }
        self.index += 1;
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.cache.clear();
        self.index = 0;
        self.did_pull_all = false;
        Ok(())
    }
}
