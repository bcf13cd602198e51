//! Vertex scan operators.
//!
//! All four scans share one cursor: they differ only in how a batch of
//! vertices is produced for the current input row. A fresh batch is
//! materialised per input pull — batch iterators are not restartable.

use quiver_core::EngineResult;
use quiver_graph::{PropertyBound, VertexAccessor};

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::{
    Bound, ScanAllByLabelNode, ScanAllByLabelPropertyRangeNode, ScanAllByLabelPropertyValueNode,
    ScanAllNode,
};
use crate::value::TypedValue;

/// How the scan produces its vertex batches.
enum ScanKind {
    All(ScanAllNode),
    ByLabel(ScanAllByLabelNode),
    ByRange(ScanAllByLabelPropertyRangeNode),
    ByValue(ScanAllByLabelPropertyValueNode),
}

impl ScanKind {
    fn output(&self) -> &quiver_core::Symbol {
        match self {
            Self::All(n) => &n.output,
            Self::ByLabel(n) => &n.output,
            Self::ByRange(n) => &n.output,
            Self::ByValue(n) => &n.output,
        }
    }
}

/// Enumerates vertices per input row.
pub struct ScanAllCursor {
    kind: ScanKind,
    input: BoxedCursor,
    vertices: Option<std::vec::IntoIter<VertexAccessor>>,
}

impl ScanAllCursor {
    /// A full scan.
    #[must_use]
    pub fn all(node: ScanAllNode, input: BoxedCursor) -> Self {
        Self { kind: ScanKind::All(node), input, vertices: None }
    }

    /// A label scan.
    #[must_use]
    pub fn by_label(node: ScanAllByLabelNode, input: BoxedCursor) -> Self {
        Self { kind: ScanKind::ByLabel(node), input, vertices: None }
    }

    /// A label+property range scan.
    #[must_use]
    pub fn by_range(node: ScanAllByLabelPropertyRangeNode, input: BoxedCursor) -> Self {
        Self { kind: ScanKind::ByRange(node), input, vertices: None }
    }

    /// A label+property value scan.
    #[must_use]
    pub fn by_value(node: ScanAllByLabelPropertyValueNode, input: BoxedCursor) -> Self {
        Self { kind: ScanKind::ByValue(node), input, vertices: None }
    }

    /// Produces the batch for the current input row, or `None` when a
    /// scan expression evaluated to null and the row yields nothing.
    fn batch(
        &self,
        frame: &Frame,
        ctx: &ExecutionContext,
    ) -> EngineResult<Option<Vec<VertexAccessor>>> {
        match &self.kind {
            ScanKind::All(n) => Ok(Some(ctx.tx.vertices(n.view))),
            ScanKind::ByLabel(n) => Ok(Some(ctx.tx.vertices_by_label(&n.label, n.view))),
            ScanKind::ByValue(n) => {
                let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, n.view);
                let value = evaluator.eval(&n.expression)?;
                if value.is_null() {
                    return Ok(None);
                }
                let value = value.to_property()?;
                Ok(Some(ctx.tx.vertices_by_label_property_value(
                    &n.label,
                    &n.property,
                    &value,
                    n.view,
                )))
            }
            ScanKind::ByRange(n) => {
                let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, n.view);
                let eval_bound = |bound: &Option<Bound>| -> EngineResult<Option<Option<PropertyBound>>> {
                    let Some(bound) = bound else { return Ok(Some(None)) };
                    let value = evaluator.eval(&bound.value)?;
                    if value.is_null() {
                        // A null bound short-circuits the input row.
                        return Ok(None);
                    }
                    Ok(Some(Some(PropertyBound {
                        value: value.to_property()?,
                        inclusive: bound.inclusive,
                    })))
                };
                let Some(lower) = eval_bound(&n.lower)? else { return Ok(None) };
                let Some(upper) = eval_bound(&n.upper)? else { return Ok(None) };
                Ok(Some(ctx.tx.vertices_by_label_property_range(
                    &n.label,
                    &n.property,
                    lower.as_ref(),
                    upper.as_ref(),
                    n.view,
                )))
            }
        }
    }
}

impl Cursor for ScanAllCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;
            if let Some(iter) = &mut self.vertices {
                if let Some(vertex) = iter.next() {
                    frame[self.kind.output()] = TypedValue::Vertex(vertex);
                    return Ok(true);
                }
                self.vertices = None;
            }
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            if let Some(batch) = self.batch(frame, ctx)? {
                self.vertices = Some(batch.into_iter());
            }
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.vertices = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::tests::{seeded_context, symbol};
    use crate::expr::Expr;
    use quiver_core::{EngineError, Label, PropertyKey, PropertyValue};
    use quiver_graph::View;

    fn scan_output(cursor: &mut ScanAllCursor, ctx: &mut ExecutionContext) -> Vec<TypedValue> {
        let n = symbol(0);
        let mut frame = Frame::new(1);
        let mut rows = Vec::new();
        while cursor.pull(&mut frame, ctx).unwrap() {
            rows.push(frame[&n].clone());
        }
        rows
    }

    #[test]
    fn scan_all_yields_every_vertex() {
        let mut ctx = seeded_context(|tx| {
            for _ in 0..3 {
                tx.insert_vertex();
            }
        });
        let node = ScanAllNode { input: crate::plan::PlanNode::once(), output: symbol(0), view: View::New };
        let mut cursor = ScanAllCursor::all(node, Box::new(OnceCursor::new()));
        assert_eq!(scan_output(&mut cursor, &mut ctx).len(), 3);

        // Exhaustion is stable.
        let mut frame = Frame::new(1);
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
    }

    #[test]
    fn by_value_matches_with_promotion() {
        let mut ctx = seeded_context(|tx| {
            for value in [10, 20, 30] {
                let v = tx.insert_vertex();
                v.add_label(Label::new("L")).unwrap();
                v.set_property(PropertyKey::new("p"), PropertyValue::Int(value)).unwrap();
            }
        });
        let node = ScanAllByLabelPropertyValueNode {
            input: crate::plan::PlanNode::once(),
            output: symbol(0),
            label: Label::new("L"),
            property: PropertyKey::new("p"),
            expression: Expr::literal(20.0),
            view: View::New,
        };
        let mut cursor = ScanAllCursor::by_value(node, Box::new(OnceCursor::new()));
        let rows = scan_output(&mut cursor, &mut ctx);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn by_value_null_yields_nothing() {
        let mut ctx = seeded_context(|tx| {
            let v = tx.insert_vertex();
            v.add_label(Label::new("L")).unwrap();
            v.set_property(PropertyKey::new("p"), PropertyValue::Int(1)).unwrap();
        });
        let node = ScanAllByLabelPropertyValueNode {
            input: crate::plan::PlanNode::once(),
            output: symbol(0),
            label: Label::new("L"),
            property: PropertyKey::new("p"),
            expression: Expr::Literal(PropertyValue::Null),
            view: View::New,
        };
        let mut cursor = ScanAllCursor::by_value(node, Box::new(OnceCursor::new()));
        assert!(scan_output(&mut cursor, &mut ctx).is_empty());
    }

    #[test]
    fn by_value_rejects_illegal_property_values() {
        let mut ctx = seeded_context(|tx| {
            let v = tx.insert_vertex();
            v.add_label(Label::new("L")).unwrap();
        });
        // A map with a non-storable member cannot happen via literals, so
        // use an identifier bound to a vertex.
        let v_sym = symbol(0);
        let node = ScanAllByLabelPropertyValueNode {
            input: crate::plan::PlanNode::once(),
            output: symbol(1),
            label: Label::new("L"),
            property: PropertyKey::new("p"),
            expression: Expr::ident(v_sym.clone()),
            view: View::New,
        };
        let mut cursor = ScanAllCursor::by_value(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(2);
        let vertex = ctx.tx.insert_vertex();
        frame[&v_sym] = TypedValue::Vertex(vertex);
        let err = cursor.pull(&mut frame, &mut ctx).unwrap_err();
        assert!(matches!(err, EngineError::PropertyValueType(_)));
    }

    #[test]
    fn range_scan_bounds_are_evaluated_per_row() {
        let mut ctx = seeded_context(|tx| {
            for value in [10, 20, 30] {
                let v = tx.insert_vertex();
                v.add_label(Label::new("L")).unwrap();
                v.set_property(PropertyKey::new("p"), PropertyValue::Int(value)).unwrap();
            }
        });
        let node = ScanAllByLabelPropertyRangeNode {
            input: crate::plan::PlanNode::once(),
            output: symbol(0),
            label: Label::new("L"),
            property: PropertyKey::new("p"),
            lower: Some(Bound { value: Expr::integer(10), inclusive: false }),
            upper: Some(Bound { value: Expr::integer(30), inclusive: true }),
            view: View::New,
        };
        let mut cursor = ScanAllCursor::by_range(node, Box::new(OnceCursor::new()));
        assert_eq!(scan_output(&mut cursor, &mut ctx).len(), 2);
    }
}
