//! Cross-shard graph operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use quiver_core::{
    EdgeTypeName, EngineResult, GlobalAddress, Label, PropertyKey, PropertyValue, WorkerId,
};

use crate::record::{EdgeRecord, VertexRecord};
use crate::store::View;
use crate::updates::GraphUpdate;

/// The seam through which a worker reaches the rest of the cluster.
///
/// Reads fetch records from the owning worker (implementations are
/// expected to cache); inserts are synchronous RPCs returning the new
/// record's address; mutations of remote records are buffered on the
/// owning worker's update server and replayed at the synchronization
/// barrier.
pub trait RemoteGraph: Send + Sync {
    /// Fetches a vertex record from its owning worker.
    fn fetch_vertex(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<VertexRecord>>;

    /// Fetches an edge record from its owning worker.
    fn fetch_edge(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<EdgeRecord>>;

    /// Creates a vertex on the given worker with pre-evaluated labels and
    /// properties. Returns the new record's address.
    fn insert_vertex_into(
        &self,
        worker: WorkerId,
        labels: Vec<Label>,
        properties: BTreeMap<PropertyKey, PropertyValue>,
    ) -> EngineResult<GlobalAddress>;

    /// Creates an edge on the worker owning the *from* endpoint. Returns
    /// the new record's address.
    fn insert_edge_into(
        &self,
        from: GlobalAddress,
        to: GlobalAddress,
        edge_type: EdgeTypeName,
    ) -> EngineResult<GlobalAddress>;

    /// Buffers a deferred update on the owning worker's update server.
    fn buffer_update(
        &self,
        transaction: u64,
        owner: WorkerId,
        update: GraphUpdate,
    ) -> EngineResult<()>;
}
