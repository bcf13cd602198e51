//! The single-step `Expand` operator.

use std::time::Duration;

use quiver_core::{EngineResult, Symbol};
use quiver_graph::{EdgeAccessor, VertexAccessor};

use crate::distributed::future::{spawn, TaskHandle};
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::exec::operators::expect_vertex;
use crate::frame::Frame;
use crate::plan::{Direction, ExpandNode};
use crate::value::TypedValue;

/// The side of the input vertex an edge was found on.
#[derive(Clone, Copy)]
enum Side {
    In,
    Out,
}

/// An in-flight remote endpoint resolution, together with the snapshot
/// of the frame it belongs to.
struct FutureExpand {
    handle: TaskHandle<EngineResult<(EdgeAccessor, VertexAccessor)>>,
    frame: Vec<TypedValue>,
}

/// Expands one edge step per produced row.
///
/// Edges whose record lives on another worker are not resolved inline:
/// a task fetches the far endpoint while the cursor keeps producing
/// local edges. Ready tasks are served (with their frame snapshots)
/// before local iteration continues; only when local edges and input
/// are exhausted does the cursor sleep-poll the stragglers.
pub struct ExpandCursor {
    node: ExpandNode,
    input: BoxedCursor,
    in_edges: Option<std::vec::IntoIter<EdgeAccessor>>,
    out_edges: Option<std::vec::IntoIter<EdgeAccessor>>,
    future_expands: Vec<FutureExpand>,
    // The live frame is parked here while future rows overwrite it, and
    // restored before local iteration resumes.
    last_frame: Option<Vec<TypedValue>>,
}

impl ExpandCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: ExpandNode, input: BoxedCursor) -> Self {
        Self {
            node,
            input,
            in_edges: None,
            out_edges: None,
            future_expands: Vec::new(),
            last_frame: None,
        }
    }

    /// Binds the reached vertex, or filters the row against an existing
    /// binding. A null existing binding admits nothing (failed optional
    /// match).
    fn handle_existing(
        node_symbol: &Symbol,
        existing_node: bool,
        vertex: &VertexAccessor,
        frame: &mut Frame,
    ) -> EngineResult<bool> {
        if existing_node {
            let bound = &frame[node_symbol];
            if bound.is_null() {
                return Ok(false);
            }
            Ok(bound.as_vertex()? == vertex)
        } else {
            frame[node_symbol] = TypedValue::Vertex(vertex.clone());
            Ok(true)
        }
    }

    /// Serves one local edge, or schedules its endpoint resolution when
    /// the edge record is remote. Returns true if a row was produced.
    fn serve_edge(
        &mut self,
        edge: EdgeAccessor,
        side: Side,
        frame: &mut Frame,
    ) -> EngineResult<bool> {
        if edge.is_local() || self.node.existing_node {
            let other = match side {
                Side::In => edge.from_vertex()?,
                Side::Out => edge.to_vertex()?,
            };
            if !Self::handle_existing(
                &self.node.node_symbol,
                self.node.existing_node,
                &other,
                frame,
            )? {
                return Ok(false);
            }
            frame[&self.node.edge_symbol] = TypedValue::Edge(edge);
            Ok(true)
        } else {
            // Remote edge record: resolve the endpoint off-thread and
            // snapshot the frame it belongs to.
            let view = self.node.view;
            let task_edge = edge.clone();
            let handle = spawn(move || {
                let mut other = match side {
                    Side::In => task_edge.from_vertex()?,
                    Side::Out => task_edge.to_vertex()?,
                };
                other.switch(view);
                // Warm the record cache so the consumer never blocks.
                other.record()?;
                Ok((task_edge, other))
            });
            self.future_expands.push(FutureExpand { handle, frame: frame.snapshot() });
            Ok(false)
        }
    }

    /// Serves the first completed endpoint resolution, if any.
    fn serve_ready_future(&mut self, frame: &mut Frame) -> EngineResult<bool> {
        let Some(index) = self.future_expands.iter().position(|f| f.handle.is_ready()) else {
            return Ok(false);
        };
        if self.last_frame.is_none() {
            self.last_frame = Some(frame.snapshot());
        }
        let mut future = self.future_expands.remove(index);
        let (edge, vertex) = future
            .handle
            .try_take()
            .expect("a ready task handle yields its value")?;
        frame.replace(future.frame);
        frame[&self.node.edge_symbol] = TypedValue::Edge(edge);
        frame[&self.node.node_symbol] = TypedValue::Vertex(vertex);
        Ok(true)
    }

    /// Pulls input rows until one provides a vertex and initialises the
    /// edge iterators for it.
    fn init_edges(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            // A failed optional match leaves a null input vertex.
            if frame[&self.node.input_symbol].is_null() {
                continue;
            }
            let mut vertex = expect_vertex(frame, &self.node.input_symbol)?;
            vertex.switch(self.node.view);

            if matches!(self.node.direction, Direction::In | Direction::Both) {
                self.in_edges = Some(vertex.in_edges(&self.node.edge_types)?.into_iter());
            }
            if matches!(self.node.direction, Direction::Out | Direction::Both) {
                self.out_edges = Some(vertex.out_edges(&self.node.edge_types)?.into_iter());
            }
            return Ok(true);
        }
    }
}

impl Cursor for ExpandCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;

            // Remote endpoints first: yielding all local edges before
            // them would pile up completed tasks.
            if self.serve_ready_future(frame)? {
                return Ok(true);
            }
            if let Some(saved) = self.last_frame.take() {
                frame.replace(saved);
            }

            if let Some(edge) = self.in_edges.as_mut().and_then(Iterator::next) {
                if self.serve_edge(edge, Side::In, frame)? {
                    return Ok(true);
                }
                continue;
            }

            if let Some(edge) = self.out_edges.as_mut().and_then(Iterator::next) {
                // An undirected expansion sees a self-loop once; it was
                // already yielded from the in-side.
                if self.node.direction == Direction::Both && edge.is_cycle()? {
                    continue;
                }
                if self.serve_edge(edge, Side::Out, frame)? {
                    return Ok(true);
                }
                continue;
            }

            if !self.init_edges(frame, ctx)? {
                if self.future_expands.is_empty() {
                    return Ok(false);
                }
                // Input and local edges are exhausted; wait for the
                // remaining endpoint resolutions.
                std::thread::sleep(Duration::from_millis(ctx.config.remote_pull_sleep_ms));
            }
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.in_edges = None;
        self.out_edges = None;
        self.future_expands.clear();
        self.last_frame = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::once::OnceCursor;
    use crate::exec::tests::{symbol, test_context};
    use quiver_core::EdgeTypeName;
    use quiver_graph::View;

    fn expand_node(
        input_symbol: Symbol,
        edge_symbol: Symbol,
        node_symbol: Symbol,
        direction: Direction,
    ) -> ExpandNode {
        ExpandNode {
            input: crate::plan::PlanNode::once(),
            input_symbol,
            node_symbol,
            edge_symbol,
            direction,
            edge_types: vec![],
            existing_node: false,
            view: View::New,
        }
    }

    #[test]
    fn expands_out_edges() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        let c = ctx.tx.insert_vertex();
        ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
        ctx.tx.insert_edge(&a, &c, EdgeTypeName::new("E")).unwrap();

        let (sa, se, sb) = (symbol(0), symbol(1), symbol(2));
        let node = expand_node(sa.clone(), se, sb.clone(), Direction::Out);
        let mut cursor = ExpandCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(3);
        frame[&sa] = TypedValue::Vertex(a);

        let mut reached = Vec::new();
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            reached.push(frame[&sb].as_vertex().unwrap().clone());
        }
        assert_eq!(reached.len(), 2);
        assert!(reached.contains(&b));
        assert!(reached.contains(&c));
    }

    #[test]
    fn self_loop_yields_once_for_both() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        ctx.tx.insert_edge(&a, &a, EdgeTypeName::new("E")).unwrap();

        let (sa, se, sb) = (symbol(0), symbol(1), symbol(2));
        let node = expand_node(sa.clone(), se, sb, Direction::Both);
        let mut cursor = ExpandCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(3);
        frame[&sa] = TypedValue::Vertex(a);

        let mut rows = 0;
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            rows += 1;
        }
        assert_eq!(rows, 1);
    }

    #[test]
    fn existing_node_filters_mismatches() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        let c = ctx.tx.insert_vertex();
        ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
        ctx.tx.insert_edge(&a, &c, EdgeTypeName::new("E")).unwrap();

        let (sa, se, sb) = (symbol(0), symbol(1), symbol(2));
        let mut node = expand_node(sa.clone(), se, sb.clone(), Direction::Out);
        node.existing_node = true;
        let mut cursor = ExpandCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(3);
        frame[&sa] = TypedValue::Vertex(a);
        frame[&sb] = TypedValue::Vertex(c.clone());

        let mut rows = 0;
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            assert_eq!(frame[&sb].as_vertex().unwrap(), &c);
            rows += 1;
        }
        assert_eq!(rows, 1);
    }

    #[test]
    fn null_input_vertex_is_skipped() {
        let mut ctx = test_context();
        let (sa, se, sb) = (symbol(0), symbol(1), symbol(2));
        let node = expand_node(sa, se, sb, Direction::Out);
        let mut cursor = ExpandCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(3);
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
    }

    #[test]
    fn edge_type_filter_is_applied() {
        let mut ctx = test_context();
        let a = ctx.tx.insert_vertex();
        let b = ctx.tx.insert_vertex();
        ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("KNOWS")).unwrap();
        ctx.tx.insert_edge(&a, &b, EdgeTypeName::new("LIKES")).unwrap();

        let (sa, se, sb) = (symbol(0), symbol(1), symbol(2));
        let mut node = expand_node(sa.clone(), se.clone(), sb, Direction::Out);
        node.edge_types = vec![EdgeTypeName::new("LIKES")];
        let mut cursor = ExpandCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(3);
        frame[&sa] = TypedValue::Vertex(a);

        let mut rows = 0;
        while cursor.pull(&mut frame, &mut ctx).unwrap() {
            assert_eq!(
                frame[&se].as_edge().unwrap().edge_type().unwrap(),
                EdgeTypeName::new("LIKES")
            );
            rows += 1;
        }
        assert_eq!(rows, 1);
    }
}
