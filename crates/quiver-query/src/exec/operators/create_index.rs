//! The `CreateIndex` operator.

use quiver_core::{EngineError, EngineResult};

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::Cursor;
use crate::frame::Frame;
use crate::plan::CreateIndexNode;

/// Builds a label+property index, once. Building an index that already
/// exists is a no-op; building one inside an explicit transaction is an
/// error. The context's `index_created` flag tells the caller to flush
/// its plan cache.
pub struct CreateIndexCursor {
    node: CreateIndexNode,
    did_create: bool,
}

impl CreateIndexCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: CreateIndexNode) -> Self {
        Self { node, did_create: false }
    }
}

impl Cursor for CreateIndexCursor {
    fn pull(&mut self, _frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if self.did_create {
            return Ok(false);
        }
        if ctx.in_explicit_transaction {
            return Err(EngineError::IndexInMulticommand);
        }
        ctx.tx.build_index(self.node.label.clone(), self.node.property.clone());
        ctx.index_created = true;
        self.did_create = true;
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.did_create = false;
        Ok(())
    }
}
