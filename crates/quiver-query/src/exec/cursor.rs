//! The pull protocol.

use quiver_core::EngineResult;

use crate::exec::context::ExecutionContext;
use crate::frame::Frame;

/// A pull iterator bound to one operator instance.
///
/// # Contract
///
/// - `pull` returning `Ok(true)` means the frame holds a consistent row;
///   `Ok(false)` means the cursor is exhausted and the frame contents
///   are unspecified; `Err` aborts the pull chain.
/// - After exhaustion, further pulls keep returning `Ok(false)` unless
///   `reset` intervenes.
/// - Cursors honor the context's cooperative abort hint and fail with
///   `AbortRequested` when it is set.
///
/// Cursors are `Send` so worker pull sessions can migrate between
/// service threads, but a single cursor is only ever pulled from one
/// thread at a time.
pub trait Cursor: Send {
    /// Produces the next row into the frame.
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool>;

    /// Restores the cursor to its pre-first-pull state. Cursors that
    /// cannot restart (the distributed stream operators) fail instead.
    fn reset(&mut self) -> EngineResult<()>;
}

/// A boxed cursor for dynamic dispatch.
pub type BoxedCursor = Box<dyn Cursor>;
