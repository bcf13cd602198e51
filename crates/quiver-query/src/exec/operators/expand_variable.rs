//! The depth-first variable-length expansion.

use std::iter::Peekable;

use quiver_core::{EngineResult, Symbol};
use quiver_graph::{EdgeAccessor, VertexAccessor, View};

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::exec::operators::expect_vertex;
use crate::frame::Frame;
use crate::plan::{Direction, ExpandVariableNode};
use crate::value::TypedValue;

type EdgeLevel = Peekable<std::vec::IntoIter<(EdgeAccessor, Direction)>>;

/// Enumerates the incident edges of a vertex as `(edge, direction)`
/// pairs, in-side first, filtered by direction and type.
pub(crate) fn expand_from_vertex(
    vertex: &VertexAccessor,
    direction: Direction,
    edge_types: &[quiver_core::EdgeTypeName],
) -> EngineResult<Vec<(EdgeAccessor, Direction)>> {
    let mut edges = Vec::new();
    if direction != Direction::Out {
        edges.extend(vertex.in_edges(edge_types)?.into_iter().map(|e| (e, Direction::In)));
    }
    if direction != Direction::In {
        edges.extend(vertex.out_edges(edge_types)?.into_iter().map(|e| (e, Direction::Out)));
    }
    Ok(edges)
}

/// Binds the reached vertex, or filters against an existing binding.
pub(crate) fn handle_existing_node(
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

/// Depth-first bounded expansion.
///
/// Maintains a stack of edge iterators, one per current path depth; the
/// edge list on the frame mirrors the stack as it grows and shrinks. An
/// edge may appear at most once within a path. Rows are produced for
/// every path whose length is at least the lower bound; expansion stops
/// at the upper bound. A negative bound yields nothing for that input
/// row.
pub struct ExpandVariableCursor {
    node: ExpandVariableNode,
    input: BoxedCursor,
    lower: i64,
    upper: i64,
    stack: Vec<EdgeLevel>,
}

impl ExpandVariableCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: ExpandVariableNode, input: BoxedCursor) -> Self {
        Self { node, input, lower: -1, upper: -1, stack: Vec::new() }
    }

    /// Pulls the next usable input row and primes the stack. Bounds are
    /// evaluated per input row.
    fn pull_input(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            if frame[&self.node.input_symbol].is_null() {
                continue;
            }
            let mut vertex = expect_vertex(frame, &self.node.input_symbol)?;
            vertex.switch(self.node.view);

            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::Old);
            self.lower = match &self.node.lower_bound {
                Some(bound) => evaluator.eval_int(bound, "variable expansion bound")?,
                None => 1,
            };
            self.upper = match &self.node.upper_bound {
                Some(bound) => evaluator.eval_int(bound, "variable expansion bound")?,
                None => i64::MAX,
            };
            if self.lower < 0 || self.upper < 0 {
                // Negative bounds produce the empty expansion.
                continue;
            }

            if self.upper > 0 {
                let edges =
                    expand_from_vertex(&vertex, self.node.direction, &self.node.edge_types)?;
                self.stack.push(edges.into_iter().peekable());
            }
            frame[&self.node.edge_symbol] = TypedValue::List(Vec::new());
            return Ok(true);
        }
    }

    /// Places an edge at the current depth of the frame's edge list.
    /// Uniqueness filtering can leave stale deeper entries, so the list
    /// is first trimmed to the depth above this one.
    fn append_edge(&self, edge: EdgeAccessor, edges_on_frame: &mut Vec<TypedValue>) {
        let depth = self.stack.len() - 1;
        if self.node.is_reverse {
            let excess = edges_on_frame.len().saturating_sub(depth);
            edges_on_frame.drain(..excess);
            edges_on_frame.insert(0, TypedValue::Edge(edge));
        } else {
            edges_on_frame.truncate(depth);
            edges_on_frame.push(TypedValue::Edge(edge));
        }
    }

    /// Performs expansions until one is producible or the current input
    /// vertex is exhausted.
    fn expand(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;
            // Drop exhausted levels.
            while self.stack.last_mut().is_some_and(|level| level.peek().is_none()) {
                self.stack.pop();
            }
            if self.stack.is_empty() {
                return Ok(false);
            }

            // Trim the frame's edge list to the current depth.
            {
                let edges_on_frame = frame[&self.node.edge_symbol].as_list_mut()?;
                if self.node.is_reverse {
                    let excess = edges_on_frame.len().saturating_sub(self.stack.len());
                    edges_on_frame.drain(..excess);
                } else {
                    edges_on_frame.truncate(self.stack.len());
                }
            }

            let (edge, direction) = self
                .stack
                .last_mut()
                .and_then(Iterator::next)
                .expect("the top level was just checked to be non-empty");

            // An edge may appear only once within a path.
            let duplicate = frame[&self.node.edge_symbol]
                .as_list()?
                .iter()
                .any(|value| matches!(value, TypedValue::Edge(e) if *e == edge));
            if duplicate {
                continue;
            }

            {
                let edges_on_frame = frame[&self.node.edge_symbol].as_list_mut()?;
                self.append_edge(edge.clone(), edges_on_frame);
            }

            let mut vertex = match direction {
                Direction::In => edge.from_vertex()?,
                _ => edge.to_vertex()?,
            };
            if !handle_existing_node(
                &self.node.node_symbol,
                self.node.existing_node,
                &vertex,
                frame,
            )? {
                continue;
            }

            // The filter lambda decides whether to expand through this
            // edge at all.
            frame[&self.node.filter.inner_edge] = TypedValue::Edge(edge);
            frame[&self.node.filter.inner_node] = TypedValue::Vertex(vertex.clone());
            if let Some(expression) = &self.node.filter.expression {
                let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, self.node.view);
                if !evaluator.eval_filter(expression)? {
                    continue;
                }
            }

            if self.upper > self.stack.len() as i64 {
                vertex.switch(self.node.view);
                let edges =
                    expand_from_vertex(&vertex, self.node.direction, &self.node.edge_types)?;
                self.stack.push(edges.into_iter().peekable());
            }

            if frame[&self.node.edge_symbol].as_list()?.len() as i64 >= self.lower {
                return Ok(true);
            }
        }
    }
}

impl Cursor for ExpandVariableCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            if self.expand(frame, ctx)? {
                return Ok(true);
            }
            if !self.pull_input(frame, ctx)? {
                return Ok(false);
            }
            // A zero lower bound also yields the empty path.
            if self.lower == 0 {
                let start = expect_vertex(frame, &self.node.input_symbol)?;
                if handle_existing_node(
                    &self.node.node_symbol,
                    self.node.existing_node,
                    &start,
                    frame,
                )? {
                    return Ok(true);
                }
            }
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.stack.clear();
        Ok(())
    }
}
