//! The property and label mutation operators.

use quiver_core::{EngineError, EngineResult, PropertyKey};
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::exec::operators::expect_vertex;
use crate::frame::Frame;
use crate::plan::{
    PropertiesOp, RemoveLabelsNode, RemovePropertyNode, SetLabelsNode, SetPropertiesNode,
    SetPropertyNode,
};
use crate::value::TypedValue;

/// Sets one property on a vertex or edge. Mutations observe the latest
/// state; operating on null is a no-op.
pub struct SetPropertyCursor {
    node: SetPropertyNode,
    input: BoxedCursor,
}

impl SetPropertyCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: SetPropertyNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for SetPropertyCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
        let target = evaluator.eval(&self.node.object)?;
        let value = evaluator.eval(&self.node.value)?.to_property()?;

        match target {
            TypedValue::Vertex(mut vertex) => {
                vertex.switch_new();
                vertex.set_property(self.node.key.clone(), value)?;
            }
            TypedValue::Edge(mut edge) => {
                edge.switch_new();
                edge.set_property(self.node.key.clone(), value)?;
            }
            TypedValue::Null => {}
            other => {
                return Err(EngineError::query(format!(
                    "properties can only be set on vertices and edges, got {}",
                    other.type_name()
                )))
            }
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}

/// Replaces or updates all properties on a record from a map, vertex,
/// or edge.
pub struct SetPropertiesCursor {
    node: SetPropertiesNode,
    input: BoxedCursor,
}

impl SetPropertiesCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: SetPropertiesNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }

    fn apply(&self, target: &Target, rhs: TypedValue) -> EngineResult<()> {
        if self.node.op == PropertiesOp::Replace {
            target.clear_properties()?;
        }
        match rhs {
            TypedValue::Vertex(source) => {
                for (key, value) in source.properties()? {
                    target.set_property(key, value)?;
                }
            }
            TypedValue::Edge(source) => {
                for (key, value) in source.properties()? {
                    target.set_property(key, value)?;
                }
            }
            TypedValue::Map(entries) => {
                for (key, value) in entries {
                    target.set_property(PropertyKey::new(key), value.to_property()?)?;
                }
            }
            other => {
                return Err(EngineError::query(format!(
                    "only vertices, edges and maps can be set as properties, got {}",
                    other.type_name()
                )))
            }
        }
        Ok(())
    }
}

/// A mutable vertex or edge target, switched to the new view.
enum Target {
    Vertex(quiver_graph::VertexAccessor),
    Edge(quiver_graph::EdgeAccessor),
}

impl Target {
    fn clear_properties(&self) -> EngineResult<()> {
        match self {
            Self::Vertex(v) => v.clear_properties(),
            Self::Edge(e) => e.clear_properties(),
        }
    }

    fn set_property(&self, key: PropertyKey, value: quiver_core::PropertyValue) -> EngineResult<()> {
        match self {
            Self::Vertex(v) => v.set_property(key, value),
            Self::Edge(e) => e.set_property(key, value),
        }
    }
}

impl Cursor for SetPropertiesCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        let rhs = {
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
            evaluator.eval(&self.node.rhs)?
        };
        let target = match &frame[&self.node.input_symbol] {
            TypedValue::Vertex(v) => {
                let mut v = v.clone();
                v.switch_new();
                Target::Vertex(v)
            }
            TypedValue::Edge(e) => {
                let mut e = e.clone();
                e.switch_new();
                Target::Edge(e)
            }
            TypedValue::Null => return Ok(true),
            other => {
                return Err(EngineError::query(format!(
                    "properties can only be set on vertices and edges, got {}",
                    other.type_name()
                )))
            }
        };
        self.apply(&target, rhs)?;
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}

/// Adds labels to a vertex; operating on null is a no-op.
pub struct SetLabelsCursor {
    node: SetLabelsNode,
    input: BoxedCursor,
}

impl SetLabelsCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: SetLabelsNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for SetLabelsCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        if frame[&self.node.input_symbol].is_null() {
            return Ok(true);
        }
        let mut vertex = expect_vertex(frame, &self.node.input_symbol)?;
        vertex.switch_new();
        for label in &self.node.labels {
            vertex.add_label(label.clone())?;
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}

/// Removes one property from a vertex or edge; null is a no-op.
pub struct RemovePropertyCursor {
    node: RemovePropertyNode,
    input: BoxedCursor,
}

impl RemovePropertyCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: RemovePropertyNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for RemovePropertyCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
        match evaluator.eval(&self.node.object)? {
            TypedValue::Vertex(mut vertex) => {
                vertex.switch_new();
                vertex.remove_property(&self.node.key)?;
            }
            TypedValue::Edge(mut edge) => {
                edge.switch_new();
                edge.remove_property(&self.node.key)?;
            }
            TypedValue::Null => {}
            other => {
                return Err(EngineError::query(format!(
                    "properties can only be removed from vertices and edges, got {}",
                    other.type_name()
                )))
            }
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}

/// Removes labels from a vertex; null is a no-op.
pub struct RemoveLabelsCursor {
    node: RemoveLabelsNode,
    input: BoxedCursor,
}

impl RemoveLabelsCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: RemoveLabelsNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for RemoveLabelsCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        if frame[&self.node.input_symbol].is_null() {
            return Ok(true);
        }
        let mut vertex = expect_vertex(frame, &self.node.input_symbol)?;
        vertex.switch_new();
        for label in &self.node.labels {
            vertex.remove_label(label)?;
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}
