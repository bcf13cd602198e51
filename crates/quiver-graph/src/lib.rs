//! Quiver Graph
//!
//! The per-worker graph shard and its access layer.
//!
//! Each worker of a Quiver cluster owns one [`GraphStore`]: an in-memory
//! shard holding vertex and edge records with *old*/*new* command
//! visibility ([`View`]). Records are addressed cluster-wide by a
//! [`GlobalAddress`](quiver_core::GlobalAddress); [`VertexAccessor`] and
//! [`EdgeAccessor`] are the switchable handles the query engine operates
//! on, and [`GraphTx`] is the transaction-scoped accessor it consumes.
//!
//! Mutations of records owned by *another* worker are not applied
//! directly: they are buffered as [`GraphUpdate`]s on the owning worker's
//! [`UpdateServer`] and replayed when the engine's synchronization barrier
//! broadcasts apply-all. The [`RemoteGraph`] trait is the seam through
//! which remote reads, remote inserts and update routing reach the rest
//! of the cluster.
//!
//! # Modules
//!
//! - [`store`] - The versioned shard ([`GraphStore`], [`View`])
//! - [`record`] - Vertex and edge records
//! - [`accessor`] - Switchable record handles
//! - [`tx`] - The transactional graph accessor ([`GraphTx`])
//! - [`updates`] - Deferred-update buffering and replay
//! - [`remote`] - The cross-shard operation trait ([`RemoteGraph`])

pub mod accessor;
pub mod record;
pub mod remote;
pub mod store;
pub mod tx;
pub mod updates;

pub use accessor::{EdgeAccessor, GraphHandle, VertexAccessor};
pub use record::{EdgeRecord, EdgeRef, VertexRecord};
pub use remote::RemoteGraph;
pub use store::{GraphStore, PropertyBound, View};
pub use tx::GraphTx;
pub use updates::{GraphUpdate, UpdateResult, UpdateServer};
