//! The `Delete` operator.

use quiver_core::{EngineError, EngineResult};
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::DeleteNode;
use crate::value::TypedValue;

/// Deletes the vertices and edges the expressions evaluate to.
///
/// All expressions are evaluated first, then edges are deleted before
/// vertices — an edge deletion can be what makes a vertex deletable.
/// Without `detach`, deleting a vertex that still has edges fails.
pub struct DeleteCursor {
    node: DeleteNode,
    input: BoxedCursor,
}

impl DeleteCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: DeleteNode, input: BoxedCursor) -> Self {
        Self { node, input }
    }
}

impl Cursor for DeleteCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }

        // Deletion observes the latest state, so records created by this
        // command can be deleted too.
        let results = {
            let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
            self.node
                .expressions
                .iter()
                .map(|expression| evaluator.eval(expression))
                .collect::<EngineResult<Vec<_>>>()?
        };

        for value in &results {
            if let TypedValue::Edge(edge) = value {
                ctx.tx.remove_edge(edge)?;
            }
        }

        for value in results {
            match value {
                TypedValue::Vertex(mut vertex) => {
                    // An edge deletion above may have updated the record.
                    vertex.switch_new();
                    if self.node.detach {
                        ctx.tx.detach_remove_vertex(&vertex)?;
                    } else if !ctx.tx.remove_vertex(&vertex)? {
                        return Err(EngineError::ConnectedVertexDeletion);
                    }
                }
                // Edges were handled above; nulls occur in optional
                // matches.
                TypedValue::Edge(_) | TypedValue::Null => {}
                other => {
                    return Err(EngineError::query(format!(
                        "only vertices and edges can be deleted, got {}",
                        other.type_name()
                    )))
                }
            }
        }
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()
    }
}
