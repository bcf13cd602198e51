//! The shared cache of remote records.
//!
//! Every remote read an accessor performs goes through a [`DataManager`]
//! layered over the raw transport. Fetched records are cached per
//! `(address, view)`; the cache is dropped wholesale when a command
//! advance makes cached state stale. The cache is shared across queries
//! and internally synchronised.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use quiver_core::{EdgeTypeName, EngineResult, GlobalAddress, Label, PropertyKey, PropertyValue, WorkerId};
use quiver_graph::{EdgeRecord, GraphUpdate, RemoteGraph, VertexRecord, View};

/// A caching decorator over the cluster transport.
pub struct DataManager {
    transport: Arc<dyn RemoteGraph>,
    vertices: DashMap<(GlobalAddress, View), Arc<VertexRecord>>,
    edges: DashMap<(GlobalAddress, View), Arc<EdgeRecord>>,
}

impl DataManager {
    /// Wraps a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn RemoteGraph>) -> Self {
        Self { transport, vertices: DashMap::new(), edges: DashMap::new() }
    }

    /// Drops every cached record. Called when a command advance makes
    /// remote state stale.
    pub fn invalidate(&self) {
        trace!(
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            "invalidating remote record cache"
        );
        self.vertices.clear();
        self.edges.clear();
    }
}

impl RemoteGraph for DataManager {
    fn fetch_vertex(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<VertexRecord>> {
        if let Some(record) = self.vertices.get(&(address, view)) {
            return Ok(Arc::clone(&record));
        }
        let record = self.transport.fetch_vertex(address, view)?;
        self.vertices.insert((address, view), Arc::clone(&record));
        Ok(record)
    }

    fn fetch_edge(&self, address: GlobalAddress, view: View) -> EngineResult<Arc<EdgeRecord>> {
        if let Some(record) = self.edges.get(&(address, view)) {
            return Ok(Arc::clone(&record));
        }
        let record = self.transport.fetch_edge(address, view)?;
        self.edges.insert((address, view), Arc::clone(&record));
        Ok(record)
    }

    fn insert_vertex_into(
        &self,
        worker: WorkerId,
        labels: Vec<Label>,
        properties: BTreeMap<PropertyKey, PropertyValue>,
    ) -> EngineResult<GlobalAddress> {
        self.transport.insert_vertex_into(worker, labels, properties)
    }

    fn insert_edge_into(
        &self,
        from: GlobalAddress,
        to: GlobalAddress,
        edge_type: EdgeTypeName,
    ) -> EngineResult<GlobalAddress> {
        self.transport.insert_edge_into(from, to, edge_type)
    }

    fn buffer_update(
        &self,
        transaction: u64,
        owner: WorkerId,
        update: GraphUpdate,
    ) -> EngineResult<()> {
        self.transport.buffer_update(transaction, owner, update)
    }
}
