//! The `CreateNode` and `CreateExpand` operators.

use std::collections::BTreeMap;

use rand::Rng;

use quiver_core::{EngineResult, PropertyKey, PropertyValue, WorkerId};
use quiver_graph::{VertexAccessor, View};

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::exec::operators::expect_vertex;
use crate::frame::Frame;
use crate::plan::{CreateExpandNode, CreateNodeNode, Direction, NodeAtom};
use crate::value::TypedValue;

/// Evaluates a node atom's properties into storable values. Creation
/// always observes the latest accessors, so properties may reference
/// records created earlier in the same command.
fn eval_properties(
    atom: &NodeAtom,
    frame: &Frame,
    ctx: &ExecutionContext,
) -> EngineResult<BTreeMap<PropertyKey, PropertyValue>> {
    let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
    let mut properties = BTreeMap::new();
    for (key, expression) in &atom.properties {
        properties.insert(key.clone(), evaluator.eval(expression)?.to_property()?);
    }
    Ok(properties)
}

fn create_local(atom: &NodeAtom, frame: &mut Frame, ctx: &ExecutionContext) -> EngineResult<VertexAccessor> {
    let properties = eval_properties(atom, frame, ctx)?;
    let vertex = ctx.tx.insert_vertex();
    for label in &atom.labels {
        vertex.add_label(label.clone())?;
    }
    for (key, value) in properties {
        vertex.set_property(key, value)?;
    }
    frame[&atom.symbol] = TypedValue::Vertex(vertex.clone());
    Ok(vertex)
}

/// Creates one vertex per input row, locally or on a uniformly chosen
/// cluster member.
pub struct CreateNodeCursor {
    node: CreateNodeNode,
    input: BoxedCursor,
}

impl CreateNodeCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: CreateNodeNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }

    fn create_on_worker(
        &self,
        worker: WorkerId,
        frame: &mut Frame,
        ctx: &ExecutionContext,
    ) -> EngineResult<()> {
        let properties = eval_properties(&self.node.node, frame, ctx)?;
        let vertex = ctx.tx.insert_vertex_into_remote(
            worker,
            self.node.node.labels.clone(),
            properties,
        )?;
        frame[&self.node.node.symbol] = TypedValue::Vertex(vertex);
        Ok(())
    }
}

impl Cursor for CreateNodeCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        ctx.check_abort()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        if self.node.on_random_worker {
            let workers = ctx.tx.worker_ids().to_vec();
            let choice = workers[rand::thread_rng().gen_range(0..workers.len())];
            if choice == ctx.tx.worker_id() {
                create_local(&self.node.node, frame, ctx)?;
            } else {
                self.create_on_worker(choice, frame, ctx)?;
            }
        } else {
            create_local(&self.node.node, frame, ctx)?;
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}

/// Creates one edge per input row, from the frame's origin vertex to
/// either an existing vertex or a newly created one.
pub struct CreateExpandCursor {
    node: CreateExpandNode,
    input: BoxedCursor,
}

impl CreateExpandCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: CreateExpandNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }

    fn other_vertex(
        &self,
        frame: &mut Frame,
        ctx: &ExecutionContext,
    ) -> EngineResult<VertexAccessor> {
        if self.node.existing_node {
            let mut vertex = expect_vertex(frame, &self.node.node.symbol)?;
            vertex.switch_new();
            Ok(vertex)
        } else {
            create_local(&self.node.node, frame, ctx)
        }
    }
}

impl Cursor for CreateExpandCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        ctx.check_abort()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }

        let mut origin = expect_vertex(frame, &self.node.input_symbol)?;
        // Created edges observe the latest state, e.g. properties of
        // vertices created by the same command.
        origin.switch_new();
        let other = self.other_vertex(frame, ctx)?;

        let (from, to) = match self.node.edge.direction {
            Direction::In => (&other, &origin),
            // An undirected create chooses an arbitrary direction; the
            // planner rejects `Both` outside of `MERGE`.
            Direction::Out | Direction::Both => (&origin, &other),
        };
        let edge = ctx.tx.insert_edge(from, to, self.node.edge.edge_type.clone())?;

        let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
        let mut properties = Vec::with_capacity(self.node.edge.properties.len());
        for (key, expression) in &self.node.edge.properties {
            properties.push((key.clone(), evaluator.eval(expression)?.to_property()?));
        }
        for (key, value) in properties {
            edge.set_property(key, value)?;
        }
        frame[&self.node.edge.symbol] = TypedValue::Edge(edge);
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
    use crate::exec::tests::{seeded_context, symbol, test_context};
    use crate::expr::Expr;
    use crate::plan::EdgeAtom;
    use quiver_core::{EdgeTypeName, EngineError, Label};

    #[test]
    fn creates_vertex_with_labels_and_properties() {
        let mut ctx = test_context();
        let n = symbol(0);
        let node = CreateNodeNode {
            input: crate::plan::PlanNode::once(),
            node: NodeAtom {
                symbol: n.clone(),
                labels: vec![Label::new("Person")],
                properties: vec![(PropertyKey::new("age"), Expr::integer(30))],
            },
            on_random_worker: false,
        };
        let mut cursor = CreateNodeCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(1);

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        let vertex = frame[&n].as_vertex().unwrap();
        assert!(vertex.has_label(&Label::new("Person")).unwrap());
        assert_eq!(vertex.property(&PropertyKey::new("age")).unwrap(), PropertyValue::Int(30));
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
    }

    #[test]
    fn non_storable_property_fails() {
        let mut ctx = test_context();
        let n = symbol(0);
        let other = symbol(1);
        let node = CreateNodeNode {
            input: crate::plan::PlanNode::once(),
            node: NodeAtom {
                symbol: n,
                labels: vec![],
                properties: vec![(PropertyKey::new("p"), Expr::ident(other.clone()))],
            },
            on_random_worker: false,
        };
        let mut cursor = CreateNodeCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(2);
        frame[&other] = TypedValue::Vertex(ctx.tx.insert_vertex());

        let err = cursor.pull(&mut frame, &mut ctx).unwrap_err();
        assert!(matches!(err, EngineError::PropertyValueType(_)));
    }

    #[test]
    fn create_expand_links_to_existing_vertex() {
        let mut ctx = seeded_context(|_| {});
        let origin_sym = symbol(0);
        let dest_sym = symbol(1);
        let edge_sym = symbol(2);

        let origin = ctx.tx.insert_vertex();
        let dest = ctx.tx.insert_vertex();

        let node = CreateExpandNode {
            input: crate::plan::PlanNode::once(),
            input_symbol: origin_sym.clone(),
            node: NodeAtom { symbol: dest_sym.clone(), labels: vec![], properties: vec![] },
            edge: EdgeAtom {
                symbol: edge_sym.clone(),
                edge_type: EdgeTypeName::new("KNOWS"),
                direction: Direction::Out,
                properties: vec![(PropertyKey::new("since"), Expr::integer(2020))],
            },
            existing_node: true,
        };
        let mut cursor = CreateExpandCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(3);
        frame[&origin_sym] = TypedValue::Vertex(origin.clone());
        frame[&dest_sym] = TypedValue::Vertex(dest.clone());

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        let edge = frame[&edge_sym].as_edge().unwrap();
        assert_eq!(edge.from_vertex().unwrap(), origin);
        assert_eq!(edge.to_vertex().unwrap(), dest);
        assert_eq!(
            edge.property(&PropertyKey::new("since")).unwrap(),
            PropertyValue::Int(2020)
        );
    }

    #[test]
    fn create_expand_creates_missing_vertex() {
        let mut ctx = seeded_context(|_| {});
        let origin_sym = symbol(0);
        let dest_sym = symbol(1);
        let edge_sym = symbol(2);

        let origin = ctx.tx.insert_vertex();

        let node = CreateExpandNode {
            input: crate::plan::PlanNode::once(),
            input_symbol: origin_sym.clone(),
            node: NodeAtom {
                symbol: dest_sym.clone(),
                labels: vec![Label::new("L")],
                properties: vec![],
            },
            edge: EdgeAtom {
                symbol: edge_sym,
                edge_type: EdgeTypeName::new("E"),
                direction: Direction::Both,
                properties: vec![],
            },
            existing_node: false,
        };
        let mut cursor = CreateExpandCursor::new(node, Box::new(OnceCursor::new()));
        let mut frame = Frame::new(3);
        frame[&origin_sym] = TypedValue::Vertex(origin.clone());

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        // `Both` creates as `Out`.
        let created = frame[&dest_sym].as_vertex().unwrap().clone();
        let out = {
            let mut v = origin.clone();
            v.switch_new();
            v.out_edges(&[]).unwrap()
        };
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_vertex().unwrap(), created);
    }
}
