//! Switchable handles over vertex and edge records.
//!
//! An accessor bundles a record's [`GlobalAddress`] with the machinery to
//! resolve it — the local [`GraphStore`] for records this worker owns, the
//! [`RemoteGraph`] hook for records owned by peers — and a current
//! [`View`]. Accessors compare and hash by address only.
//!
//! Mutations are routed the same way reads are: local records are written
//! straight into the shard, remote records become [`GraphUpdate`]s
//! buffered on the owning worker and replayed at the synchronization
//! barrier.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use quiver_core::{
    EdgeTypeName, EngineError, EngineResult, Gid, GlobalAddress, Label, PropertyKey, PropertyValue,
};

use crate::record::{EdgeRecord, EdgeRef, VertexRecord};
use crate::remote::RemoteGraph;
use crate::store::{GraphStore, View};
use crate::updates::GraphUpdate;

/// Shared resolution state for accessors created within one transaction:
/// the local shard, the optional remote hook, and the transaction id used
/// to tag buffered remote updates.
#[derive(Clone)]
pub struct GraphHandle {
    /// The local worker's shard.
    pub store: Arc<GraphStore>,
    /// Cross-shard operations; absent in single-node setups.
    pub remote: Option<Arc<dyn RemoteGraph>>,
    /// The owning transaction's id.
    pub transaction_id: u64,
}

impl GraphHandle {
    /// Creates a handle for a single-node setup without remote access.
    #[must_use]
    pub fn single(store: Arc<GraphStore>) -> Self {
        Self { store, remote: None, transaction_id: 0 }
    }

    fn remote(&self) -> EngineResult<&Arc<dyn RemoteGraph>> {
        self.remote
            .as_ref()
            .ok_or_else(|| EngineError::query("no remote graph access configured"))
    }

    fn vertex_record(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<VertexRecord>> {
        if address.is_local_to(self.store.worker_id()) {
            self.store
                .vertex(address.gid, view)
                .ok_or_else(|| EngineError::Reconstruction(format!("vertex {address}")))
        } else {
            self.remote()?.fetch_vertex(address, view)
        }
    }

    fn edge_record(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<EdgeRecord>> {
        if address.is_local_to(self.store.worker_id()) {
            self.store
                .edge(address.gid, view)
                .ok_or_else(|| EngineError::Reconstruction(format!("edge {address}")))
        } else {
            self.remote()?.fetch_edge(address, view)
        }
    }

    fn buffer(&self, owner: quiver_core::WorkerId, update: GraphUpdate) -> EngineResult<()> {
        self.remote()?.buffer_update(self.transaction_id, owner, update)
    }
}

impl fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphHandle")
            .field("worker", &self.store.worker_id())
            .field("remote", &self.remote.is_some())
            .field("transaction_id", &self.transaction_id)
            .finish()
    }
}

/// A switchable handle over a vertex record.
#[derive(Clone)]
pub struct VertexAccessor {
    address: GlobalAddress,
    handle: GraphHandle,
    view: View,
}

impl VertexAccessor {
    /// Creates an accessor observing the old view.
    #[must_use]
    pub fn new(address: GlobalAddress, handle: GraphHandle) -> Self {
        Self { address, handle, view: View::Old }
    }

    /// Creates an accessor observing the given view.
    #[must_use]
    pub fn with_view(address: GlobalAddress, handle: GraphHandle, view: View) -> Self {
        Self { address, handle, view }
    }

    /// Returns the record's cluster-wide address.
    #[must_use]
    pub const fn address(&self) -> GlobalAddress {
        self.address
    }

    /// Returns the record's gid within its owning shard.
    #[must_use]
    pub const fn gid(&self) -> Gid {
        self.address.gid
    }

    /// Returns true if the record lives on this worker.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.address.is_local_to(self.handle.store.worker_id())
    }

    /// Returns the view this accessor currently observes.
    #[must_use]
    pub const fn current_view(&self) -> View {
        self.view
    }

    /// Switches to the new view.
    pub fn switch_new(&mut self) {
        self.view = View::New;
    }

    /// Switches to the old view.
    pub fn switch_old(&mut self) {
        self.view = View::Old;
    }

    /// Switches to the given view.
    pub fn switch(&mut self, view: View) {
        self.view = view;
    }

    /// Returns the handle this accessor resolves through.
    #[must_use]
    pub fn handle(&self) -> &GraphHandle {
        &self.handle
    }

    /// Resolves the record in the current view.
    pub fn record(&self) -> EngineResult<Arc<VertexRecord>> {
        self.handle.vertex_record(self.address, self.view)
    }

    /// Returns the labels on the vertex.
    pub fn labels(&self) -> EngineResult<Vec<Label>> {
        Ok(self.record()?.labels.clone())
    }

    /// Returns true if the vertex carries the label.
    pub fn has_label(&self, label: &Label) -> EngineResult<bool> {
        Ok(self.record()?.has_label(label))
    }

    /// Returns the property value, or null if absent.
    pub fn property(&self, key: &PropertyKey) -> EngineResult<PropertyValue> {
        Ok(self.record()?.property(key))
    }

    /// Returns all properties.
    pub fn properties(&self) -> EngineResult<BTreeMap<PropertyKey, PropertyValue>> {
        Ok(self.record()?.properties.clone())
    }

    /// Returns accessors for incoming edges, filtered by type. An empty
    /// filter admits every type.
    pub fn in_edges(&self, edge_types: &[EdgeTypeName]) -> EngineResult<Vec<EdgeAccessor>> {
        let record = self.record()?;
        Ok(self.edge_accessors(&record.in_edges, edge_types, EdgeSide::Incoming))
    }

    /// Returns accessors for outgoing edges, filtered by type.
    pub fn out_edges(&self, edge_types: &[EdgeTypeName]) -> EngineResult<Vec<EdgeAccessor>> {
        let record = self.record()?;
        Ok(self.edge_accessors(&record.out_edges, edge_types, EdgeSide::Outgoing))
    }

    fn edge_accessors(
        &self,
        refs: &[EdgeRef],
        edge_types: &[EdgeTypeName],
        side: EdgeSide,
    ) -> Vec<EdgeAccessor> {
        refs.iter()
            .filter(|r| edge_types.is_empty() || edge_types.contains(&r.edge_type))
            .map(|r| {
                let (from, to) = match side {
                    EdgeSide::Incoming => (r.other, self.address),
                    EdgeSide::Outgoing => (self.address, r.other),
                };
                EdgeAccessor {
                    address: r.edge,
                    handle: self.handle.clone(),
                    view: self.view,
                    endpoints: Some(EdgeEndpoints { from, to, edge_type: r.edge_type.clone() }),
                }
            })
            .collect()
    }

    /// Sets a property, routing remote records through the update buffer.
    pub fn set_property(&self, key: PropertyKey, value: PropertyValue) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.vertex_set_property(self.gid(), key, value)
        } else {
            self.handle.buffer(
                self.address.worker,
                GraphUpdate::SetVertexProperty { address: self.address, key, value },
            )
        }
    }

    /// Removes a property.
    pub fn remove_property(&self, key: &PropertyKey) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.vertex_remove_property(self.gid(), key)
        } else {
            self.handle.buffer(
                self.address.worker,
                GraphUpdate::RemoveVertexProperty { address: self.address, key: key.clone() },
            )
        }
    }

    /// Removes all properties.
    pub fn clear_properties(&self) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.vertex_clear_properties(self.gid())
        } else {
            self.handle.buffer(
                self.address.worker,
                GraphUpdate::ClearVertexProperties { address: self.address },
            )
        }
    }

    /// Adds a label.
    pub fn add_label(&self, label: Label) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.vertex_add_label(self.gid(), label)
        } else {
            self.handle
                .buffer(self.address.worker, GraphUpdate::AddLabel { address: self.address, label })
        }
    }

    /// Removes a label.
    pub fn remove_label(&self, label: &Label) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.vertex_remove_label(self.gid(), label)
        } else {
            self.handle.buffer(
                self.address.worker,
                GraphUpdate::RemoveLabel { address: self.address, label: label.clone() },
            )
        }
    }
}

impl PartialEq for VertexAccessor {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for VertexAccessor {}

impl Hash for VertexAccessor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Debug for VertexAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vertex({}, {:?})", self.address, self.view)
    }
}

enum EdgeSide {
    Incoming,
    Outgoing,
}

#[derive(Clone)]
struct EdgeEndpoints {
    from: GlobalAddress,
    to: GlobalAddress,
    edge_type: EdgeTypeName,
}

/// A switchable handle over an edge record.
#[derive(Clone)]
pub struct EdgeAccessor {
    address: GlobalAddress,
    handle: GraphHandle,
    view: View,
    // Endpoint addresses are carried over from the edge reference the
    // accessor was created from, so direction checks and cycle detection
    // never touch a remote edge record.
    endpoints: Option<EdgeEndpoints>,
}

impl EdgeAccessor {
    /// Creates an accessor observing the old view. Endpoints are
    /// resolved from the record on demand.
    #[must_use]
    pub fn new(address: GlobalAddress, handle: GraphHandle) -> Self {
        Self { address, handle, view: View::Old, endpoints: None }
    }

    /// Creates an accessor with known endpoints and view.
    #[must_use]
    pub fn with_endpoints(
        address: GlobalAddress,
        handle: GraphHandle,
        view: View,
        from: GlobalAddress,
        to: GlobalAddress,
        edge_type: EdgeTypeName,
    ) -> Self {
        Self { address, handle, view, endpoints: Some(EdgeEndpoints { from, to, edge_type }) }
    }

    /// Returns the record's cluster-wide address.
    #[must_use]
    pub const fn address(&self) -> GlobalAddress {
        self.address
    }

    /// Returns the record's gid within its owning shard.
    #[must_use]
    pub const fn gid(&self) -> Gid {
        self.address.gid
    }

    /// Returns true if the record lives on this worker.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.address.is_local_to(self.handle.store.worker_id())
    }

    /// Returns the view this accessor currently observes.
    #[must_use]
    pub const fn current_view(&self) -> View {
        self.view
    }

    /// Switches to the new view.
    pub fn switch_new(&mut self) {
        self.view = View::New;
    }

    /// Switches to the old view.
    pub fn switch_old(&mut self) {
        self.view = View::Old;
    }

    /// Switches to the given view.
    pub fn switch(&mut self, view: View) {
        self.view = view;
    }

    /// Resolves the record in the current view.
    pub fn record(&self) -> EngineResult<Arc<EdgeRecord>> {
        self.handle.edge_record(self.address, self.view)
    }

    /// Returns the *from* endpoint's address.
    pub fn from_address(&self) -> EngineResult<GlobalAddress> {
        match &self.endpoints {
            Some(endpoints) => Ok(endpoints.from),
            None => Ok(self.record()?.from),
        }
    }

    /// Returns the *to* endpoint's address.
    pub fn to_address(&self) -> EngineResult<GlobalAddress> {
        match &self.endpoints {
            Some(endpoints) => Ok(endpoints.to),
            None => Ok(self.record()?.to),
        }
    }

    /// Returns an accessor for the *from* endpoint, in this view.
    pub fn from_vertex(&self) -> EngineResult<VertexAccessor> {
        Ok(VertexAccessor::with_view(self.from_address()?, self.handle.clone(), self.view))
    }

    /// Returns an accessor for the *to* endpoint, in this view.
    pub fn to_vertex(&self) -> EngineResult<VertexAccessor> {
        Ok(VertexAccessor::with_view(self.to_address()?, self.handle.clone(), self.view))
    }

    /// Returns the edge's type.
    pub fn edge_type(&self) -> EngineResult<EdgeTypeName> {
        match &self.endpoints {
            Some(endpoints) => Ok(endpoints.edge_type.clone()),
            None => Ok(self.record()?.edge_type.clone()),
        }
    }

    /// Returns true for a self-loop.
    pub fn is_cycle(&self) -> EngineResult<bool> {
        Ok(self.from_address()? == self.to_address()?)
    }

    /// Returns the property value, or null if absent.
    pub fn property(&self, key: &PropertyKey) -> EngineResult<PropertyValue> {
        Ok(self.record()?.property(key))
    }

    /// Returns all properties.
    pub fn properties(&self) -> EngineResult<BTreeMap<PropertyKey, PropertyValue>> {
        Ok(self.record()?.properties.clone())
    }

    /// Sets a property, routing remote records through the update buffer.
    pub fn set_property(&self, key: PropertyKey, value: PropertyValue) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.edge_set_property(self.gid(), key, value)
        } else {
            self.handle.buffer(
                self.address.worker,
                GraphUpdate::SetEdgeProperty { address: self.address, key, value },
            )
        }
    }

    /// Removes a property.
    pub fn remove_property(&self, key: &PropertyKey) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.edge_remove_property(self.gid(), key)
        } else {
            self.handle.buffer(
                self.address.worker,
                GraphUpdate::RemoveEdgeProperty { address: self.address, key: key.clone() },
            )
        }
    }

    /// Removes all properties.
    pub fn clear_properties(&self) -> EngineResult<()> {
        if self.is_local() {
            self.handle.store.edge_clear_properties(self.gid())
        } else {
            self.handle.buffer(
                self.address.worker,
                GraphUpdate::ClearEdgeProperties { address: self.address },
            )
        }
    }
}

impl PartialEq for EdgeAccessor {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for EdgeAccessor {}

impl Hash for EdgeAccessor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Debug for EdgeAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({}, {:?})", self.address, self.view)
    }
}
