//! The expansion-uniqueness filter.

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::{ExpandUniquenessFilterNode, UniquenessKind};
use crate::value::TypedValue;

/// Filters out rows where the just-expanded value collides with any of
/// the previously bound pattern values: vertex identity for the vertex
/// kind; edge identity, including membership in edge lists, for the
/// edge kind.
pub struct ExpandUniquenessFilterCursor {
    node: ExpandUniquenessFilterNode,
    input: BoxedCursor,
}

impl ExpandUniquenessFilterCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: ExpandUniquenessFilterNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

fn contains_same_vertex(a: &TypedValue, b: &TypedValue) -> EngineResult<bool> {
    Ok(a.as_vertex()? == b.as_vertex()?)
}

fn contains_same_edge(a: &TypedValue, b: &TypedValue) -> EngineResult<bool> {
    if let TypedValue::List(items) = a {
        for item in items {
            if contains_same_edge(item, b)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    if let TypedValue::List(items) = b {
        for item in items {
            if contains_same_edge(a, item)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    Ok(a.as_edge()? == b.as_edge()?)
}

impl Cursor for ExpandUniquenessFilterCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        'rows: while self.input.pull(frame, ctx)? {
            ctx.check_abort()?;
            let expand_value = &frame[&self.node.expand_symbol];
            for previous in &self.node.previous_symbols {
                let previous_value = &frame[previous];
                let collides = match self.node.kind {
                    UniquenessKind::Vertex => contains_same_vertex(previous_value, expand_value)?,
                    UniquenessKind::Edge => contains_same_edge(previous_value, expand_value)?,
                };
                if collides {
                    continue 'rows;
                }
            }
            return Ok(true);
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
    use crate::exec::tests::{symbol, test_context};
    use quiver_core::EdgeTypeName;

    /// Serves pre-baked frames.
    struct FrameSource {
        rows: std::vec::IntoIter<Vec<TypedValue>>,
    }

    impl Cursor for FrameSource {
        fn pull(&mut self, frame: &mut Frame, _ctx: &mut ExecutionContext) -> EngineResult<bool> {
            match self.rows.next() {
                Some(row) => {
                    frame.replace(row);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn reset(&mut self) -> EngineResult<()> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_vertices_are_filtered() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();

        let prev = symbol(0);
        let cur = symbol(1);
        let rows = vec![
            vec![TypedValue::Vertex(a.clone()), TypedValue::Vertex(a.clone())],
            vec![TypedValue::Vertex(a), TypedValue::Vertex(b)],
        ];
        let source = FrameSource { rows: rows.into_iter() };
        let node = ExpandUniquenessFilterNode {
            input: crate::plan::PlanNode::once(),
            kind: UniquenessKind::Vertex,
            expand_symbol: cur,
            previous_symbols: vec![prev],
        };
        let mut cursor = ExpandUniquenessFilterCursor::new(node, Box::new(source));
        let mut frame = Frame::new(2);

        let mut produced = 0;
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            produced += 1;
        }
        assert_eq!(produced, 1);
    }

    #[test]
    fn edge_lists_are_checked_for_membership() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        let e1 = ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
        let e2 = ctx.tx.insert_edge(&b, &a, EdgeTypeName::new("E")).unwrap();

        let prev = symbol(0);
        let cur = symbol(1);
        let rows = vec![
            // e1 collides with the [e1] list.
            vec![
                TypedValue::List(vec![TypedValue::Edge(e1.clone())]),
                TypedValue::Edge(e1.clone()),
            ],
            // e2 does not.
            vec![TypedValue::List(vec![TypedValue::Edge(e1)]), TypedValue::Edge(e2)],
        ];
        let source = FrameSource { rows: rows.into_iter() };
        let node = ExpandUniquenessFilterNode {
            input: crate::plan::PlanNode::once(),
            kind: UniquenessKind::Edge,
            expand_symbol: cur,
            previous_symbols: vec![prev],
        };
        let mut cursor = ExpandUniquenessFilterCursor::new(node, Box::new(source));
        let mut frame = Frame::new(2);

        let mut produced = 0;
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            produced += 1;
        }
        assert_eq!(produced, 1);
    }
}
