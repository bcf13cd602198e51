//! The transactional graph accessor.
//!
//! A [`GraphTx`] is the handle a single query executes against: it scopes
//! every read and write to one transaction on one worker, routes
//! cross-shard operations through the [`RemoteGraph`] hook, carries the
//! cooperative abort hint, and knows the cluster membership.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quiver_core::{
    EdgeTypeName, EngineError, EngineResult, Label, PropertyKey, PropertyValue, WorkerId,
};

use crate::accessor::{EdgeAccessor, GraphHandle, VertexAccessor};
use crate::record::EdgeRef;
use crate::remote::RemoteGraph;
use crate::store::{GraphStore, PropertyBound, View};
use crate::updates::GraphUpdate;

/// Transaction-scoped access to the graph.
pub struct GraphTx {
    handle: GraphHandle,
    abort: Arc<AtomicBool>,
    worker_ids: Vec<WorkerId>,
}

impl GraphTx {
    /// Creates a transaction over a single-node store, without remote
    /// access.
    #[must_use]
    pub fn single_node(store: Arc<GraphStore>) -> Self {
        let worker_ids = vec![store.worker_id()];
        Self { handle: GraphHandle::single(store), abort: Arc::new(AtomicBool::new(false)), worker_ids }
    }

    /// Creates a transaction over one cluster member's shard.
    #[must_use]
    pub fn new(
        store: Arc<GraphStore>,
        remote: Option<Arc<dyn RemoteGraph>>,
        transaction_id: u64,
        worker_ids: Vec<WorkerId>,
    ) -> Self {
        Self {
            handle: GraphHandle { store, remote, transaction_id },
            abort: Arc::new(AtomicBool::new(false)),
            worker_ids,
        }
    }

    /// Returns the handle accessors resolve through.
    #[must_use]
    pub fn handle(&self) -> &GraphHandle {
        &self.handle
    }

    /// Returns this worker's id.
    #[must_use]
    pub fn worker_id(&self) -> WorkerId {
        self.handle.store.worker_id()
    }

    /// Returns every cluster member's id.
    #[must_use]
    pub fn worker_ids(&self) -> &[WorkerId] {
        &self.worker_ids
    }

    /// Returns the transaction id.
    #[must_use]
    pub const fn transaction_id(&self) -> u64 {
        self.handle.transaction_id
    }

    /// Returns the shared abort hint.
    #[must_use]
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Requests cooperative abortion of the running query.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Returns true once abortion was requested.
    #[must_use]
    pub fn should_abort(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Makes the current command's writes visible to subsequent reads on
    /// this worker's shard.
    pub fn advance_command(&self) {
        self.handle.store.advance_command();
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    fn vertex_accessor(&self, gid: quiver_core::Gid, view: View) -> VertexAccessor {
        VertexAccessor::with_view(self.handle.store.address(gid), self.handle.clone(), view)
    }

    /// Returns all local vertices visible in the view.
    #[must_use]
    pub fn vertices(&self, view: View) -> Vec<VertexAccessor> {
        self.handle
            .store
            .vertices(view)
            .into_iter()
            .map(|gid| self.vertex_accessor(gid, view))
            .collect()
    }

    /// Returns local vertices carrying the label.
    #[must_use]
    pub fn vertices_by_label(&self, label: &Label, view: View) -> Vec<VertexAccessor> {
        self.handle
            .store
            .vertices_by_label(label, view)
            .into_iter()
            .map(|gid| self.vertex_accessor(gid, view))
            .collect()
    }

    /// Returns local vertices carrying the label whose property equals
    /// the value.
    #[must_use]
    pub fn vertices_by_label_property_value(
        &self,
        label: &Label,
        key: &PropertyKey,
        value: &PropertyValue,
        view: View,
    ) -> Vec<VertexAccessor> {
        self.handle
            .store
            .vertices_by_label_property_value(label, key, value, view)
            .into_iter()
            .map(|gid| self.vertex_accessor(gid, view))
            .collect()
    }

    /// Returns local vertices carrying the label whose property falls in
    /// the range.
    #[must_use]
    pub fn vertices_by_label_property_range(
        &self,
        label: &Label,
        key: &PropertyKey,
        lower: Option<&PropertyBound>,
        upper: Option<&PropertyBound>,
        view: View,
    ) -> Vec<VertexAccessor> {
        self.handle
            .store
            .vertices_by_label_property_range(label, key, lower, upper, view)
            .into_iter()
            .map(|gid| self.vertex_accessor(gid, view))
            .collect()
    }

    /// Returns true if a label+property index exists on this shard.
    #[must_use]
    pub fn has_index(&self, label: &Label, key: &PropertyKey) -> bool {
        self.handle.store.has_index(label, key)
    }

    /// Builds a label+property index on this shard. Returns false if it
    /// already existed.
    pub fn build_index(&self, label: Label, key: PropertyKey) -> bool {
        self.handle.store.build_index(label, key)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Creates a local vertex, visible in the new view.
    pub fn insert_vertex(&self) -> VertexAccessor {
        let gid = self.handle.store.create_vertex(Vec::new(), BTreeMap::new());
        self.vertex_accessor(gid, View::New)
    }

    /// Creates a vertex on a *remote* worker with pre-evaluated labels
    /// and properties. The local worker must use
    /// [`insert_vertex`](Self::insert_vertex) instead.
    pub fn insert_vertex_into_remote(
        &self,
        worker: WorkerId,
        labels: Vec<Label>,
        properties: BTreeMap<PropertyKey, PropertyValue>,
    ) -> EngineResult<VertexAccessor> {
        if worker == self.worker_id() {
            return Err(EngineError::query(
                "remote vertex insertion targeted the local worker",
            ));
        }
        let remote = self
            .handle
            .remote
            .as_ref()
            .ok_or_else(|| EngineError::query("no remote graph access configured"))?;
        let address = remote.insert_vertex_into(worker, labels, properties)?;
        Ok(VertexAccessor::with_view(address, self.handle.clone(), View::New))
    }

    /// Creates an edge between two vertices. The record lands on the
    /// worker owning `from`; registration on a differently-sharded `to`
    /// endpoint is deferred to the synchronization barrier.
    pub fn insert_edge(
        &self,
        from: &VertexAccessor,
        to: &VertexAccessor,
        edge_type: EdgeTypeName,
    ) -> EngineResult<EdgeAccessor> {
        let from_address = from.address();
        let to_address = to.address();
        let local = self.worker_id();

        let edge_address = if from_address.is_local_to(local) {
            let gid = self.handle.store.create_edge(from_address, to_address, edge_type.clone())?;
            self.handle.store.address(gid)
        } else {
            let remote = self
                .handle
                .remote
                .as_ref()
                .ok_or_else(|| EngineError::query("no remote graph access configured"))?;
            remote.insert_edge_into(from_address, to_address, edge_type.clone())?
        };

        // The owner of `from` registered its own endpoints; a `to` on a
        // third shard learns about the edge through a deferred update.
        if !to_address.is_local_to(edge_address.worker) {
            let edge_ref = EdgeRef {
                edge: edge_address,
                other: from_address,
                edge_type: edge_type.clone(),
            };
            if to_address.is_local_to(local) {
                self.handle.store.register_in_edge(to_address.gid, edge_ref)?;
            } else {
                self.buffer_remote(
                    to_address.worker,
                    GraphUpdate::RegisterInEdge { vertex: to_address, edge: edge_ref },
                )?;
            }
        }

        Ok(EdgeAccessor::with_endpoints(
            edge_address,
            self.handle.clone(),
            View::New,
            from_address,
            to_address,
            edge_type,
        ))
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Removes an edge. Removal of a record owned by another worker, and
    /// reference cleanup on remote endpoints, are deferred updates.
    pub fn remove_edge(&self, edge: &EdgeAccessor) -> EngineResult<()> {
        let address = edge.address();
        if address.is_local_to(self.worker_id()) {
            let record = match self.handle.store.remove_edge(address.gid) {
                Ok(record) => record,
                // Removing an already-removed edge is a no-op: several
                // delete expressions may name the same edge.
                Err(EngineError::RecordDeleted(_)) => return Ok(()),
                Err(other) => return Err(other),
            };
            if !record.to.is_local_to(self.worker_id()) {
                self.buffer_remote(
                    record.to.worker,
                    GraphUpdate::UnregisterEdge { vertex: record.to, edge: address },
                )?;
            }
            Ok(())
        } else {
            self.buffer_remote(address.worker, GraphUpdate::RemoveEdge { address })
        }
    }

    /// Removes a vertex without detaching. Returns false when the vertex
    /// still has edges.
    pub fn remove_vertex(&self, vertex: &VertexAccessor) -> EngineResult<bool> {
        let address = vertex.address();
        if address.is_local_to(self.worker_id()) {
            self.handle.store.remove_vertex(address.gid, false)
        } else {
            self.buffer_remote(
                address.worker,
                GraphUpdate::RemoveVertex { address, detach: false },
            )?;
            Ok(true)
        }
    }

    /// Removes a vertex and all its incident edges.
    pub fn detach_remove_vertex(&self, vertex: &VertexAccessor) -> EngineResult<()> {
        let address = vertex.address();
        if !address.is_local_to(self.worker_id()) {
            return self.buffer_remote(
                address.worker,
                GraphUpdate::RemoveVertex { address, detach: true },
            );
        }

        // Incident edges whose records live on other workers are removed
        // there when the barrier replays updates.
        let mut accessor = vertex.clone();
        accessor.switch_new();
        if let Ok(record) = accessor.record() {
            for edge_ref in record.in_edges.iter().chain(&record.out_edges) {
                if !edge_ref.edge.is_local_to(self.worker_id()) {
                    self.buffer_remote(
                        edge_ref.edge.worker,
                        GraphUpdate::RemoveEdge { address: edge_ref.edge },
                    )?;
                }
            }
        }
        self.handle.store.remove_vertex(address.gid, true).map(|_| ())
    }

    fn buffer_remote(&self, owner: WorkerId, update: GraphUpdate) -> EngineResult<()> {
        let remote = self
            .handle
            .remote
            .as_ref()
            .ok_or_else(|| EngineError::query("no remote graph access configured"))?;
        remote.buffer_update(self.transaction_id(), owner, update)
    }
}
