//! The `Once` source.

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::exec::cursor::Cursor;
use crate::frame::Frame;

/// Yields exactly one empty row, then exhausts. The implicit source of
/// mutation-only plans.
#[derive(Debug, Default)]
pub struct OnceCursor {
    did_pull: bool,
}

impl OnceCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cursor for OnceCursor {
    fn pull(&mut self, _frame: &mut Frame, _ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if self.did_pull {
            return Ok(false);
        }
        self.did_pull = true;
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.did_pull = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::tests::test_context;

    #[test]
    fn yields_once_then_exhausts() {
        let mut ctx = test_context();
        let mut frame = Frame::new(0);
        let mut cursor = OnceCursor::new();

        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());

        cursor.reset().unwrap();
        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
    }
}
