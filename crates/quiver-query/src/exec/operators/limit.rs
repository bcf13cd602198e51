//! The `Skip` and `Limit` operators.
//!
//! Both evaluate their bound exactly once: `Skip` on the first
//! successful input pull, `Limit` before pulling the input at all — a
//! limit of zero must not pull anything. Neither bound may reference
//! frame symbols.

use quiver_core::{EngineError, EngineResult};
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::{LimitNode, SkipNode};
use crate::value::TypedValue;

fn eval_bound(
    expression: &crate::expr::Expr,
    what: &str,
    frame: &Frame,
    ctx: &ExecutionContext,
) -> EngineResult<i64> {
    let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::Old);
    let bound = match evaluator.eval(expression)? {
        TypedValue::Int(v) => v,
        _ => return Err(EngineError::query(format!("result of {what} expression must be an int"))),
    };
    if bound < 0 {
        return Err(EngineError::query(format!(
            "result of {what} expression must be greater than or equal to zero"
        )));
    }
    Ok(bound)
}

/// Discards the first `n` input rows.
pub struct SkipCursor {
    node: SkipNode,
    input: BoxedCursor,
    to_skip: Option<i64>,
    skipped: i64,
}

impl SkipCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: SkipNode, input: BoxedCursor) -> Self {
        Self { node, input, to_skip: None, skipped: 0 }
    }
}

impl Cursor for SkipCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        while self.input.pull(frame, ctx)? {
            let to_skip = match self.to_skip {
                Some(bound) => bound,
                None => {
                    let bound = eval_bound(&self.node.expression, "SKIP", frame, ctx)?;
                    self.to_skip = Some(bound);
                    bound
                }
            };
            if self.skipped < to_skip {
                self.skipped += 1;
                continue;
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.to_skip = None;
        self.skipped = 0;
        Ok(())
    }
}

/// Stops after `n` rows.
pub struct LimitCursor {
    node: LimitNode,
    input: BoxedCursor,
    limit: Option<i64>,
    pulled: i64,
}

impl LimitCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: LimitNode, input: BoxedCursor) -> Self {
        Self { node, input, limit: None, pulled: 0 }
    }
}

impl Cursor for LimitCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        let limit = match self.limit {
            Some(bound) => bound,
            None => {
                let bound = eval_bound(&self.node.expression, "LIMIT", frame, ctx)?;
                self.limit = Some(bound);
                bound
            }
        };
        if self.pulled >= limit {
            return Ok(false);
        }
        self.pulled += 1;
        self.input.pull(frame, ctx)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.limit = None;
        self.pulled = 0;
        Ok(())
    }
}
