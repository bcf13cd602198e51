//! The `ConstructNamedPath` operator.

use quiver_core::{EngineError, EngineResult};

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::path::Path;
use crate::plan::ConstructNamedPathNode;
use crate::value::TypedValue;

/// Builds a path from the alternating pattern symbols already bound on
/// the frame. Edge-list symbols (from variable expansions) contribute
/// their edges plus the intermediate vertices. Any null element makes
/// the whole path null, as in a failed optional match.
pub struct ConstructNamedPathCursor {
    node: ConstructNamedPathNode,
    input: BoxedCursor,
}

impl ConstructNamedPathCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: ConstructNamedPathNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for ConstructNamedPathCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }

        let mut elements = self.node.path_elements.iter();
        let start_symbol = elements
            .next()
            .ok_or_else(|| EngineError::query("a named path needs at least one element"))?;

        let start = match &frame[start_symbol] {
            TypedValue::Null => {
                frame[&self.node.path_symbol] = TypedValue::Null;
                return Ok(true);
            }
            TypedValue::Vertex(vertex) => vertex.clone(),
            other => {
                return Err(EngineError::type_mismatch(
                    "a vertex as the first named path element",
                    other.type_name(),
                ))
            }
        };
        let mut path = Path::new(start);

        for symbol in elements {
            match &frame[symbol] {
                TypedValue::Null => {
                    frame[&self.node.path_symbol] = TypedValue::Null;
                    return Ok(true);
                }
                // Expanding an edge appends the connecting vertex too,
                // so vertex elements are already on the path.
                TypedValue::Vertex(_) => {}
                TypedValue::Edge(edge) => path.expand(edge.clone())?,
                TypedValue::List(edges) => {
                    for edge_value in edges {
                        path.expand(edge_value.as_edge()?.clone())?;
                    }
                }
                other => {
                    return Err(EngineError::type_mismatch(
                        "a vertex, edge or edge list in a named path",
                        other.type_name(),
                    ))
                }
            }
        }

        frame[&self.node.path_symbol] = TypedValue::Path(path);
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
    use quiver_core::EdgeTypeName;

    #[test]
    fn builds_connected_path() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        let c = ctx.tx.insert_vertex();
        let ab = ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
        let cb = ctx.tx.insert_edge(&c, &b, EdgeTypeName::new("E")).unwrap();

        let (sa, se1, sb, se2, sc, sp) =
            (symbol(0), symbol(1), symbol(2), symbol(3), symbol(4), symbol(5));
        let node = ConstructNamedPathNode {
            input: crate::plan::PlanNode::once(),
            path_symbol: sp.clone(),
            path_elements: vec![sa.clone(), se1.clone(), sb.clone(), se2.clone(), sc.clone()],
        };
        let mut cursor = ConstructNamedPathCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(6);
        frame[&sa] = TypedValue::Vertex(a.clone());
        frame[&se1] = TypedValue::Edge(ab);
        frame[&sb] = TypedValue::Vertex(b.clone());
        // The second edge points against the walk direction.
        frame[&se2] = TypedValue::Edge(cb);
        frame[&sc] = TypedValue::Vertex(c.clone());

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        let TypedValue::Path(path) = &frame[&sp] else { panic!("expected a path") };
        assert_eq!(path.vertices(), &[a, b, c]);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn edge_list_expands_with_intermediate_vertices() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        let c = ctx.tx.insert_vertex();
        let ab = ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
        let bc = ctx.tx.insert_edge(&b, &c, EdgeTypeName::new("E")).unwrap();

        let (sa, selist, sc, sp) = (symbol(0), symbol(1), symbol(2), symbol(3));
        let node = ConstructNamedPathNode {
            input: crate::plan::PlanNode::once(),
            path_symbol: sp.clone(),
            path_elements: vec![sa.clone(), selist.clone(), sc.clone()],
        };
        let mut cursor = ConstructNamedPathCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(4);
        frame[&sa] = TypedValue::Vertex(a.clone());
        frame[&selist] =
            TypedValue::List(vec![TypedValue::Edge(ab), TypedValue::Edge(bc)]);
        frame[&sc] = TypedValue::Vertex(c.clone());

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        let TypedValue::Path(path) = &frame[&sp] else { panic!("expected a path") };
        assert_eq!(path.vertices(), &[a, b, c]);
    }

    #[test]
    fn null_element_nulls_the_path() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();

        let (sa, se, sb, sp) = (symbol(0), symbol(1), symbol(2), symbol(3));
        let node = ConstructNamedPathNode {
            input: crate::plan::PlanNode::once(),
            path_symbol: sp.clone(),
            path_elements: vec![sa.clone(), se, sb],
        };
        let mut cursor = ConstructNamedPathCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(4);
        frame[&sa] = TypedValue::Vertex(a);

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        assert!(frame[&sp].is_null());
    }
}
