//! The breadth-first variable-length expansion.

use std::collections::{HashMap, VecDeque};

use quiver_core::{EngineError, EngineResult};
use quiver_graph::{EdgeAccessor, VertexAccessor, View};

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::exec::operators::expect_vertex;
use crate::frame::Frame;
use crate::plan::{Direction, ExpandVariableNode};
use crate::value::TypedValue;

/// Layered breadth-first expansion.
///
/// Discovered vertices map to the edge they were first reached through;
/// each vertex is visited at most once per input row, which makes every
/// produced path a shortest one. Paths are reconstructed by walking the
/// predecessor map backwards.
pub struct ExpandBreadthFirstCursor {
    node: ExpandVariableNode,
    input: BoxedCursor,
    lower: i64,
    upper: i64,
    processed: HashMap<VertexAccessor, Option<EdgeAccessor>>,
    to_visit_current: VecDeque<(EdgeAccessor, VertexAccessor)>,
    to_visit_next: VecDeque<(EdgeAccessor, VertexAccessor)>,
}

impl ExpandBreadthFirstCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: ExpandVariableNode, input: BoxedCursor) -> Self {
        Self {
            node,
            input,
            lower: -1,
            upper: -1,
            processed: HashMap::new(),
            to_visit_current: VecDeque::new(),
            to_visit_next: VecDeque::new(),
        }
    }

    /// Schedules an `(edge, vertex)` pair for the next layer if the
    /// vertex is undiscovered and the filter admits it.
    fn expand_pair(
        &mut self,
        edge: EdgeAccessor,
        vertex: VertexAccessor,
        frame: &mut Frame,
        ctx: &ExecutionContext,
    ) -> EngineResult<()> {
        if self.processed.contains_key(&vertex) {
            return Ok(());
        }
        let mut edge = edge;
        let mut vertex = vertex;
        edge.switch(self.node.view);
        vertex.switch(self.node.view);

        if let Some(expression) = &self.node.filter.expression {
            frame[&self.node.filter.inner_edge] = TypedValue::Edge(edge.clone());
            frame[&self.node.filter.inner_node] = TypedValue::Vertex(vertex.clone());
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, self.node.view);
            match evaluator.eval(expression)? {
                TypedValue::Null | TypedValue::Bool(false) => return Ok(()),
                TypedValue::Bool(true) => {}
                other => {
                    return Err(EngineError::type_mismatch("bool or null", other.type_name()))
                }
            }
        }
        self.processed.insert(vertex.clone(), Some(edge.clone()));
        self.to_visit_next.push_back((edge, vertex));
        Ok(())
    }

    /// Schedules every admissible expansion from a vertex.
    fn expand_from_vertex(
        &mut self,
        vertex: &VertexAccessor,
        frame: &mut Frame,
        ctx: &ExecutionContext,
    ) -> EngineResult<()> {
        if self.node.direction != Direction::In {
            for edge in vertex.out_edges(&self.node.edge_types)? {
                let to = edge.to_vertex()?;
                self.expand_pair(edge, to, frame, ctx)?;
            }
        }
        if self.node.direction != Direction::Out {
            for edge in vertex.in_edges(&self.node.edge_types)? {
                let from = edge.from_vertex()?;
                self.expand_pair(edge, from, frame, ctx)?;
            }
        }
        Ok(())
    }

    /// Walks the predecessor map back to the source, returning the edge
    /// list ending in `expansion_edge`.
    fn reconstruct_path(
        &self,
        expansion_edge: &EdgeAccessor,
        expansion_vertex: &VertexAccessor,
    ) -> EngineResult<Vec<TypedValue>> {
        let mut edges = vec![expansion_edge.clone()];
        let mut last_vertex = expansion_vertex.clone();
        loop {
            let last_edge = edges.last().expect("the path always holds its expansion edge");
            last_vertex = if last_edge.from_vertex()? == last_vertex {
                last_edge.to_vertex()?
            } else {
                last_edge.from_vertex()?
            };
            match self.processed.get(&last_vertex) {
                Some(Some(previous)) => edges.push(previous.clone()),
                // The source vertex has no predecessor edge.
                _ => break,
            }
        }
        edges.reverse();
        Ok(edges.into_iter().map(TypedValue::Edge).collect())
    }
}

impl Cursor for ExpandBreadthFirstCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;

            // Current layer drained: move to the next one.
            if self.to_visit_current.is_empty() {
                std::mem::swap(&mut self.to_visit_current, &mut self.to_visit_next);
            }

            // Both layers drained: a fresh input row seeds the search.
            if self.to_visit_current.is_empty() {
                if !self.input.pull(frame, ctx)? {
                    return Ok(false);
                }
                self.processed.clear();

                if frame[&self.node.input_symbol].is_null() {
                    continue;
                }
                let mut vertex = expect_vertex(frame, &self.node.input_symbol)?;
                vertex.switch(self.node.view);
                self.processed.insert(vertex.clone(), None);
                self.expand_from_vertex(&vertex, frame, ctx)?;

                let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::Old);
                self.lower = match &self.node.lower_bound {
                    Some(bound) => {
                        evaluator.eval_int(bound, "min depth in breadth-first expansion")?
                    }
                    None => 1,
                };
                self.upper = match &self.node.upper_bound {
                    Some(bound) => {
                        evaluator.eval_int(bound, "max depth in breadth-first expansion")?
                    }
                    None => i64::MAX,
                };
                if self.upper < 1 {
                    return Err(EngineError::query(
                        "max depth in breadth-first expansion must be greater than zero",
                    ));
                }
                continue;
            }

            let (edge, vertex) = self
                .to_visit_current
                .pop_front()
                .expect("the current layer was just checked to be non-empty");

            let edge_list = self.reconstruct_path(&edge, &vertex)?;

            // Expand further only below the depth cap.
            if (edge_list.len() as i64) < self.upper {
                self.expand_from_vertex(&vertex, frame, ctx)?;
            }

            if (edge_list.len() as i64) < self.lower {
                continue;
            }

            if self.node.existing_node {
                let bound = &frame[&self.node.node_symbol];
                if bound.is_null() || bound.as_vertex()? != &vertex {
                    continue;
                }
            } else {
                frame[&self.node.node_symbol] = TypedValue::Vertex(vertex);
            }

            frame[&self.node.edge_symbol] = TypedValue::List(edge_list);
            return Ok(true);
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.processed.clear();
        self.to_visit_current.clear();
        self.to_visit_next.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::tests::{symbol, test_context};
    use crate::expr::Expr;
    use crate::plan::{ExpansionKind, Lambda};
    use quiver_core::{EdgeTypeName, Symbol};

    fn bfs_node(
        input_symbol: Symbol,
        edge_symbol: Symbol,
        node_symbol: Symbol,
        lower: i64,
        upper: i64,
    ) -> ExpandVariableNode {
        ExpandVariableNode {
            input: crate::plan::PlanNode::once(),
            input_symbol,
            node_symbol,
            edge_symbol,
            kind: ExpansionKind::BreadthFirst,
            direction: Direction::Out,
            edge_types: vec![],
            is_reverse: false,
            lower_bound: Some(Expr::integer(lower)),
            upper_bound: Some(Expr::integer(upper)),
            filter: Lambda { inner_edge: symbol(10), inner_node: symbol(11), expression: None },
            weight: None,
            total_weight: None,
            existing_node: false,
            view: View::New,
        }
    }

    #[test]
    fn bounded_layers_on_a_chain() {
        let mut ctx = test_context();
        // a -> b -> c -> d
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        let c = ctx.tx.insert_vertex();
        let d = ctx.tx.insert_vertex();
        ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
        ctx.tx.insert_edge(&b, &c, EdgeTypeName::new("E")).unwrap();
        ctx.tx.insert_edge(&c, &d, EdgeTypeName::new("E")).unwrap();

        let (sa, se, sn) = (symbol(0), symbol(1), symbol(2));
        let node = bfs_node(sa.clone(), se.clone(), sn.clone(), 2, 3);
        let mut cursor = ExpandBreadthFirstCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(12);
        frame[&sa] = TypedValue::Vertex(a);

        let mut rows = Vec::new();
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            rows.push((
                frame[&se].as_list().unwrap().len(),
                frame[&sn].as_vertex().unwrap().clone(),
            ));
        }
        rows.sort_by_key(|(len, _)| *len);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (2, c));
        assert_eq!(rows[1], (3, d));
    }

    #[test]
    fn each_vertex_is_reached_by_a_shortest_path() {
        let mut ctx = test_context();
        // A diamond plus a long way around: a->b->d, a->c->d, a->e,
        // e->f, f->d. The shortest a..d distance is 2.
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        let c = ctx.tx.insert_vertex();
        let d = ctx.tx.insert_vertex();
        let e = ctx.tx.insert_vertex();
        let f = ctx.tx.insert_vertex();
        for (from, to) in [(&a, &b), (&b, &d), (&a, &c), (&c, &d), (&a, &e), (&e, &f), (&f, &d)] {
            ctx.tx.insert_edge(from, to, EdgeTypeName::new("E")).unwrap();
        }

        let (sa, se, sn) = (symbol(0), symbol(1), symbol(2));
        let node = bfs_node(sa.clone(), se.clone(), sn.clone(), 1, 10);
        let mut cursor = ExpandBreadthFirstCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(12);
        frame[&sa] = TypedValue::Vertex(a);

        let mut depth_of_d = None;
        let mut rows = 0;
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            rows += 1;
            if frame[&sn].as_vertex().unwrap() == &d {
                assert!(depth_of_d.is_none(), "each vertex is visited once");
                depth_of_d = Some(frame[&se].as_list().unwrap().len());
            }
        }
        // b, c, d, e, f each exactly once.
        assert_eq!(rows, 5);
        assert_eq!(depth_of_d, Some(2));
    }

    #[test]
    fn upper_bound_below_one_is_rejected() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let (sa, se, sn) = (symbol(0), symbol(1), symbol(2));
        let node = bfs_node(sa.clone(), se, sn, 1, 0);
        let mut cursor = ExpandBreadthFirstCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(12);
        frame[&sa] = TypedValue::Vertex(a);
        assert!(cursor.pull(&mut frame, &mut ctx).is_err());
    }
}
