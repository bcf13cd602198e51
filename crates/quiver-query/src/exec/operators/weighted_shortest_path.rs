//! The weighted-shortest-path expansion.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use quiver_core::{EngineError, EngineResult};
use quiver_graph::{EdgeAccessor, VertexAccessor, View};

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::exec::operators::expect_vertex;
use crate::frame::Frame;
use crate::plan::{Direction, ExpandVariableNode, Lambda};
use crate::value::TypedValue;

/// A heap entry; ordered by weight, smallest first.
struct HeapItem {
    weight: f64,
    vertex: VertexAccessor,
    edge: Option<EdgeAccessor>,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; weights are validated non-negative
        // and never NaN.
        other.weight.partial_cmp(&self.weight).unwrap_or(Ordering::Equal)
    }
}

/// Dijkstra expansion.
///
/// The weight lambda must evaluate to a non-negative number per
/// traversed edge. Vertices are finalised in cost order; relaxation
/// skips finalised vertices. When the target is fixed (`existing_node`)
/// the heap is cleared on reaching it. The cumulative weight binds to
/// the total-weight symbol.
pub struct ExpandWeightedShortestPathCursor {
    node: ExpandVariableNode,
    weight_lambda: Lambda,
    total_weight: quiver_core::Symbol,
    input: BoxedCursor,
    upper: i64,
    weights: HashMap<VertexAccessor, f64>,
    previous: HashMap<VertexAccessor, Option<EdgeAccessor>>,
    heap: BinaryHeap<HeapItem>,
}

impl ExpandWeightedShortestPathCursor {
    /// Creates the cursor. The node must carry a weight lambda and a
    /// total-weight symbol.
    pub fn new(node: ExpandVariableNode, input: BoxedCursor) -> EngineResult<Self> {
        let weight_lambda = node
            .weight
            .clone()
            .ok_or_else(|| EngineError::query("weighted shortest path needs a weight lambda"))?;
        let total_weight = node.total_weight.clone().ok_or_else(|| {
            EngineError::query("weighted shortest path needs a total weight symbol")
        })?;
        Ok(Self {
            node,
            weight_lambda,
            total_weight,
            input,
            upper: -1,
            weights: HashMap::new(),
            previous: HashMap::new(),
            heap: BinaryHeap::new(),
        })
    }

    /// Relaxes one `(from, edge, vertex)` candidate.
    fn expand_pair(
        &mut self,
        from: &VertexAccessor,
        edge: EdgeAccessor,
        vertex: VertexAccessor,
        frame: &mut Frame,
        ctx: &ExecutionContext,
    ) -> EngineResult<()> {
        let mut edge = edge;
        let mut vertex = vertex;
        edge.switch(self.node.view);
        vertex.switch(self.node.view);

        if let Some(expression) = &self.node.filter.expression {
            frame[&self.node.filter.inner_edge] = TypedValue::Edge(edge.clone());
            frame[&self.node.filter.inner_node] = TypedValue::Vertex(vertex.clone());
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, self.node.view);
            if !evaluator.eval_filter(expression)? {
                return Ok(());
            }
        }

        frame[&self.weight_lambda.inner_edge] = TypedValue::Edge(edge.clone());
        frame[&self.weight_lambda.inner_node] = TypedValue::Vertex(vertex.clone());
        let weight = {
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, self.node.view);
            let expression = self
                .weight_lambda
                .expression
                .as_ref()
                .ok_or_else(|| EngineError::query("weight lambda is missing its expression"))?;
            let value = evaluator.eval(expression)?;
            if !value.is_numeric() {
                return Err(EngineError::type_mismatch("number", value.type_name()));
            }
            value.as_double()?
        };
        if weight < 0.0 {
            return Err(EngineError::NegativeWeight);
        }

        let total = self.weights.get(from).copied().unwrap_or(0.0) + weight;
        if self.weights.get(&vertex).is_some_and(|&existing| existing <= total) {
            return Ok(());
        }
        self.heap.push(HeapItem { weight: total, vertex, edge: Some(edge) });
        Ok(())
    }

    fn expand_from_vertex(
        &mut self,
        vertex: &VertexAccessor,
        frame: &mut Frame,
        ctx: &ExecutionContext,
    ) -> EngineResult<()> {
        if self.node.direction != Direction::In {
            for edge in vertex.out_edges(&self.node.edge_types)? {
                let to = edge.to_vertex()?;
                self.expand_pair(vertex, edge, to, frame, ctx)?;
            }
        }
        if self.node.direction != Direction::Out {
            for edge in vertex.in_edges(&self.node.edge_types)? {
                let from = edge.from_vertex()?;
                self.expand_pair(vertex, edge, from, frame, ctx)?;
            }
        }
        Ok(())
    }

    /// Walks the predecessor map back to the source.
    fn reconstruct_path(&self, target: &VertexAccessor) -> EngineResult<Vec<TypedValue>> {
        let mut edges: Vec<EdgeAccessor> = Vec::new();
        let mut last_vertex = target.clone();
        loop {
            let previous = match self.previous.get(&last_vertex) {
                Some(Some(edge)) => edge.clone(),
                _ => break,
            };
            last_vertex = if previous.from_vertex()? == last_vertex {
                previous.to_vertex()?
            } else {
                previous.from_vertex()?
            };
            edges.push(previous);
        }
        Ok(edges.into_iter().map(TypedValue::Edge).collect())
    }
}

impl Cursor for ExpandWeightedShortestPathCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        loop {
            ctx.check_abort()?;

            if self.heap.is_empty() {
                if !self.input.pull(frame, ctx)? {
                    return Ok(false);
                }
                if frame[&self.node.input_symbol].is_null() {
                    continue;
                }
                if self.node.existing_node && frame[&self.node.node_symbol].is_null() {
                    // A failed optional match cannot be a target.
                    continue;
                }
                let mut vertex = expect_vertex(frame, &self.node.input_symbol)?;
                vertex.switch(self.node.view);

                let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::Old);
                self.upper = match &self.node.upper_bound {
                    Some(bound) => evaluator
                        .eval_int(bound, "max depth in weighted shortest path expansion")?,
                    None => i64::MAX,
                };
                if self.upper < 1 {
                    return Err(EngineError::query(
                        "max depth in weighted shortest path expansion must be greater than zero",
                    ));
                }

                self.previous.clear();
                self.weights.clear();
                self.heap.push(HeapItem { weight: 0.0, vertex, edge: None });
            }

            while let Some(current) = self.heap.pop() {
                // Already finalised through a cheaper path.
                if self.weights.contains_key(&current.vertex) {
                    continue;
                }
                self.previous.insert(current.vertex.clone(), current.edge.clone());
                self.weights.insert(current.vertex.clone(), current.weight);

                let edge_list = self.reconstruct_path(&current.vertex)?;

                if (edge_list.len() as i64) < self.upper {
                    let vertex = current.vertex.clone();
                    self.expand_from_vertex(&vertex, frame, ctx)?;
                }

                // The source itself is not a produced row.
                if edge_list.is_empty() {
                    continue;
                }

                if self.node.existing_node {
                    if frame[&self.node.node_symbol].as_vertex()? != &current.vertex {
                        continue;
                    }
                    // The cheapest route to the target is found; no
                    // other path can improve on it.
                    self.heap.clear();
                } else {
                    frame[&self.node.node_symbol] = TypedValue::Vertex(current.vertex.clone());
                }

                let mut edge_list = edge_list;
                if !self.node.is_reverse {
                    edge_list.reverse();
                }
                frame[&self.node.edge_symbol] = TypedValue::List(edge_list);
                frame[&self.total_weight] = TypedValue::Double(current.weight);
                return Ok(true);
            }
        }
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.weights.clear();
        self.previous.clear();
        self.heap.clear();
        Ok(())
    }
}
