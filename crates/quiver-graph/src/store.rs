//! The versioned in-memory shard.
//!
//! A [`GraphStore`] holds the records owned by one worker. Every record is
//! versioned against the transaction's current *command*: the `Old` view
//! exposes the state before the current command, the `New` view exposes it
//! including the current command's writes. Advancing the command folds the
//! new view into the old one, making buffered writes visible to
//! subsequent reads.
//!
//! Vertices are indexed by label automatically; label+property indexes
//! are built on demand. Index sets are add-only within a command
//! (visibility and membership are re-checked at scan time) and pruned
//! when the command advances.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use quiver_core::{
    EdgeTypeName, EngineError, EngineResult, Gid, GlobalAddress, Label, PropertyKey, PropertyValue,
    WorkerId,
};

use crate::record::{EdgeRecord, EdgeRef, VertexRecord};

/// Selects which side of the current command a read observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    /// State before the current command.
    Old,
    /// State including the current command's writes.
    New,
}

/// An inclusive or exclusive bound for a property range scan.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBound {
    /// The bound value.
    pub value: PropertyValue,
    /// Whether the bound itself is part of the range.
    pub inclusive: bool,
}

impl PropertyBound {
    /// Creates an inclusive bound.
    #[must_use]
    pub fn inclusive(value: PropertyValue) -> Self {
        Self { value, inclusive: true }
    }

    /// Creates an exclusive bound.
    #[must_use]
    pub fn exclusive(value: PropertyValue) -> Self {
        Self { value, inclusive: false }
    }
}

/// The current command's change to one record.
#[derive(Debug)]
enum Delta<R> {
    /// No change; reads fall through to the stable record.
    Unchanged,
    /// The record as written by the current command.
    Set(Arc<R>),
    /// The record was deleted by the current command.
    Removed,
}

/// A record plus its current-command delta.
#[derive(Debug)]
struct Versioned<R> {
    stable: Option<Arc<R>>,
    delta: Delta<R>,
}

impl<R: Clone> Versioned<R> {
    fn created(record: R) -> Self {
        Self { stable: None, delta: Delta::Set(Arc::new(record)) }
    }

    fn view(&self, view: View) -> Option<Arc<R>> {
        match view {
            View::Old => self.stable.clone(),
            View::New => match &self.delta {
                Delta::Unchanged => self.stable.clone(),
                Delta::Set(record) => Some(Arc::clone(record)),
                Delta::Removed => None,
            },
        }
    }

    /// Returns a mutable new-view record, materializing the delta on
    /// first write within the command.
    fn new_mut(&mut self) -> Result<&mut R, DeltaError> {
        if matches!(self.delta, Delta::Unchanged) {
            let stable = self.stable.as_ref().ok_or(DeltaError::Missing)?;
            self.delta = Delta::Set(Arc::new(R::clone(stable)));
        }
        match &mut self.delta {
            Delta::Removed => Err(DeltaError::Removed),
            Delta::Set(record) => Ok(Arc::make_mut(record)),
            Delta::Unchanged => unreachable!(),
        }
    }

    fn remove(&mut self) {
        self.delta = Delta::Removed;
    }

    /// Folds the delta into the stable record. Returns false when the
    /// record is gone in both views and the entry can be dropped.
    fn advance(&mut self) -> bool {
        self.stable = self.view(View::New);
        self.delta = Delta::Unchanged;
        self.stable.is_some()
    }
}

enum DeltaError {
    Removed,
    Missing,
}

struct StoreInner {
    next_gid: u64,
    vertices: HashMap<Gid, Versioned<VertexRecord>>,
    edges: HashMap<Gid, Versioned<EdgeRecord>>,
    label_index: HashMap<Label, BTreeSet<Gid>>,
    property_indexes: HashMap<(Label, PropertyKey), BTreeSet<Gid>>,
    command: u64,
}

impl StoreInner {
    fn allocate(&mut self) -> Gid {
        let gid = Gid::new(self.next_gid);
        self.next_gid += 1;
        gid
    }

    fn index_vertex(&mut self, gid: Gid, record: &VertexRecord) {
        for label in &record.labels {
            self.label_index.entry(label.clone()).or_default().insert(gid);
            for key in record.properties.keys() {
                if let Some(set) = self.property_indexes.get_mut(&(label.clone(), key.clone())) {
                    set.insert(gid);
                }
            }
        }
    }

    fn vertex_new_mut(&mut self, gid: Gid) -> EngineResult<&mut VertexRecord> {
        let versioned = self
            .vertices
            .get_mut(&gid)
            .ok_or_else(|| EngineError::Reconstruction(format!("vertex {gid}")))?;
        versioned.new_mut().map_err(|e| match e {
            DeltaError::Removed => EngineError::RecordDeleted(format!("vertex {gid}")),
            DeltaError::Missing => EngineError::Reconstruction(format!("vertex {gid}")),
        })
    }

    fn edge_new_mut(&mut self, gid: Gid) -> EngineResult<&mut EdgeRecord> {
        let versioned = self
            .edges
            .get_mut(&gid)
            .ok_or_else(|| EngineError::Reconstruction(format!("edge {gid}")))?;
        versioned.new_mut().map_err(|e| match e {
            DeltaError::Removed => EngineError::RecordDeleted(format!("edge {gid}")),
            DeltaError::Missing => EngineError::Reconstruction(format!("edge {gid}")),
        })
    }
}

/// The shard of the graph owned by one worker.
pub struct GraphStore {
    worker_id: WorkerId,
    inner: RwLock<StoreInner>,
}

impl GraphStore {
    /// Creates an empty shard for the given worker.
    #[must_use]
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            inner: RwLock::new(StoreInner {
                next_gid: 0,
                vertices: HashMap::new(),
                edges: HashMap::new(),
                label_index: HashMap::new(),
                property_indexes: HashMap::new(),
                command: 0,
            }),
        }
    }

    /// Returns the owning worker's id.
    #[must_use]
    pub const fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Returns the current command index.
    #[must_use]
    pub fn command(&self) -> u64 {
        self.inner.read().command
    }

    /// Makes the current command's writes visible to old-view reads and
    /// starts a fresh command.
    pub fn advance_command(&self) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.vertices.retain(|_, versioned| versioned.advance());
        inner.edges.retain(|_, versioned| versioned.advance());

        let vertices = &inner.vertices;
        inner.label_index.retain(|_, set| {
            set.retain(|gid| vertices.contains_key(gid));
            !set.is_empty()
        });
        inner.property_indexes.retain(|_, set| {
            set.retain(|gid| vertices.contains_key(gid));
            true
        });
        inner.command += 1;
    }

    /// Turns a gid into this shard's global address.
    #[must_use]
    pub const fn address(&self, gid: Gid) -> GlobalAddress {
        GlobalAddress::new(gid, self.worker_id)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Creates a vertex visible only in the new view.
    pub fn create_vertex(
        &self,
        labels: Vec<Label>,
        properties: BTreeMap<PropertyKey, PropertyValue>,
    ) -> Gid {
        let mut inner = self.inner.write();
        let gid = inner.allocate();
        let record = VertexRecord::new(labels, properties);
        inner.index_vertex(gid, &record);
        inner.vertices.insert(gid, Versioned::created(record));
        gid
    }

    /// Creates an edge whose *from* endpoint lives on this shard and
    /// registers it with both local endpoints. Registration of a remote
    /// *to* endpoint is the caller's responsibility (a deferred update).
    pub fn create_edge(
        &self,
        from: GlobalAddress,
        to: GlobalAddress,
        edge_type: EdgeTypeName,
    ) -> EngineResult<Gid> {
        if !from.is_local_to(self.worker_id) {
            return Err(EngineError::query(format!(
                "edge origin {from} does not live on worker {}",
                self.worker_id
            )));
        }
        let mut inner = self.inner.write();
        let gid = inner.allocate();
        let address = GlobalAddress::new(gid, self.worker_id);
        inner.edges.insert(gid, Versioned::created(EdgeRecord::new(from, to, edge_type.clone())));

        inner.vertex_new_mut(from.gid)?.out_edges.push(EdgeRef {
            edge: address,
            other: to,
            edge_type: edge_type.clone(),
        });
        if to.is_local_to(self.worker_id) && to != from {
            inner.vertex_new_mut(to.gid)?.in_edges.push(EdgeRef {
                edge: address,
                other: from,
                edge_type: edge_type.clone(),
            });
        } else if to == from {
            // Self-loop: one record, both edge lists.
            inner.vertex_new_mut(from.gid)?.in_edges.push(EdgeRef {
                edge: address,
                other: from,
                edge_type,
            });
        }
        Ok(gid)
    }

    /// Registers an incoming edge reference on a local vertex. Used when
    /// the edge record was created on another worker.
    pub fn register_in_edge(&self, vertex: Gid, edge: EdgeRef) -> EngineResult<()> {
        let mut inner = self.inner.write();
        let record = inner.vertex_new_mut(vertex)?;
        if !record.in_edges.contains(&edge) {
            record.in_edges.push(edge);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns the vertex record visible in the view.
    #[must_use]
    pub fn vertex(&self, gid: Gid, view: View) -> Option<Arc<VertexRecord>> {
        self.inner.read().vertices.get(&gid).and_then(|versioned| versioned.view(view))
    }

    /// Returns the edge record visible in the view.
    #[must_use]
    pub fn edge(&self, gid: Gid, view: View) -> Option<Arc<EdgeRecord>> {
        self.inner.read().edges.get(&gid).and_then(|versioned| versioned.view(view))
    }

    /// Returns all vertices visible in the view, in gid order.
    #[must_use]
    pub fn vertices(&self, view: View) -> Vec<Gid> {
        let inner = self.inner.read();
        let mut gids: Vec<_> = inner
            .vertices
            .iter()
            .filter(|(_, versioned)| versioned.view(view).is_some())
            .map(|(gid, _)| *gid)
            .collect();
        gids.sort_unstable();
        gids
    }

    /// Returns vertices carrying the label, visible in the view.
    #[must_use]
    pub fn vertices_by_label(&self, label: &Label, view: View) -> Vec<Gid> {
        let inner = self.inner.read();
        let Some(candidates) = inner.label_index.get(label) else {
            return Vec::new();
        };
        candidates
            .iter()
            .copied()
            .filter(|gid| {
                inner
                    .vertices
                    .get(gid)
                    .and_then(|versioned| versioned.view(view))
                    .is_some_and(|record| record.has_label(label))
            })
            .collect()
    }

    /// Returns vertices carrying the label whose property equals the
    /// value (with numeric promotion), visible in the view.
    #[must_use]
    pub fn vertices_by_label_property_value(
        &self,
        label: &Label,
        key: &PropertyKey,
        value: &PropertyValue,
        view: View,
    ) -> Vec<Gid> {
        self.scan_label_property(label, key, view, |candidate| {
            candidate.compare(value) == Some(std::cmp::Ordering::Equal)
        })
    }

    /// Returns vertices carrying the label whose property falls in the
    /// range, visible in the view. At least one bound must be present.
    #[must_use]
    pub fn vertices_by_label_property_range(
        &self,
        label: &Label,
        key: &PropertyKey,
        lower: Option<&PropertyBound>,
        upper: Option<&PropertyBound>,
        view: View,
    ) -> Vec<Gid> {
        self.scan_label_property(label, key, view, |candidate| {
            let above = lower.map_or(true, |bound| {
                match candidate.compare(&bound.value) {
                    Some(std::cmp::Ordering::Greater) => true,
                    Some(std::cmp::Ordering::Equal) => bound.inclusive,
                    _ => false,
                }
            });
            let below = upper.map_or(true, |bound| {
                match candidate.compare(&bound.value) {
                    Some(std::cmp::Ordering::Less) => true,
                    Some(std::cmp::Ordering::Equal) => bound.inclusive,
                    _ => false,
                }
            });
            above && below
        })
    }

    fn scan_label_property(
        &self,
        label: &Label,
        key: &PropertyKey,
        view: View,
        predicate: impl Fn(&PropertyValue) -> bool,
    ) -> Vec<Gid> {
        let inner = self.inner.read();
        // Use the label+property index if one was built, otherwise
        // degrade to the label index.
        let candidates = inner
            .property_indexes
            .get(&(label.clone(), key.clone()))
            .or_else(|| inner.label_index.get(label));
        let Some(candidates) = candidates else {
            return Vec::new();
        };
        candidates
            .iter()
            .copied()
            .filter(|gid| {
                inner.vertices.get(gid).and_then(|versioned| versioned.view(view)).is_some_and(
                    |record| {
                        record.has_label(label)
                            && record.properties.get(key).is_some_and(&predicate)
                    },
                )
            })
            .collect()
    }

    /// Returns true if a label+property index exists.
    #[must_use]
    pub fn has_index(&self, label: &Label, key: &PropertyKey) -> bool {
        self.inner.read().property_indexes.contains_key(&(label.clone(), key.clone()))
    }

    /// Builds a label+property index over the existing shard. Returns
    /// false if the index already existed.
    pub fn build_index(&self, label: Label, key: PropertyKey) -> bool {
        let mut inner = self.inner.write();
        if inner.property_indexes.contains_key(&(label.clone(), key.clone())) {
            return false;
        }
        let members: BTreeSet<Gid> = inner
            .vertices
            .iter()
            .filter(|(_, versioned)| {
                versioned.view(View::New).is_some_and(|record| {
                    record.has_label(&label) && record.properties.contains_key(&key)
                })
            })
            .map(|(gid, _)| *gid)
            .collect();
        debug!(label = %label, property = %key, entries = members.len(), "built label+property index");
        inner.property_indexes.insert((label, key), members);
        true
    }

    // ------------------------------------------------------------------
    // Vertex mutation
    // ------------------------------------------------------------------

    /// Sets a property on a vertex. A null value removes the key.
    pub fn vertex_set_property(
        &self,
        gid: Gid,
        key: PropertyKey,
        value: PropertyValue,
    ) -> EngineResult<()> {
        let mut inner = self.inner.write();
        let record = inner.vertex_new_mut(gid)?;
        if value.is_null() {
            record.properties.remove(&key);
        } else {
            record.properties.insert(key, value);
        }
        let record = record.clone();
        inner.index_vertex(gid, &record);
        Ok(())
    }

    /// Removes a property from a vertex.
    pub fn vertex_remove_property(&self, gid: Gid, key: &PropertyKey) -> EngineResult<()> {
        self.inner.write().vertex_new_mut(gid)?.properties.remove(key);
        Ok(())
    }

    /// Removes all properties from a vertex.
    pub fn vertex_clear_properties(&self, gid: Gid) -> EngineResult<()> {
        self.inner.write().vertex_new_mut(gid)?.properties.clear();
        Ok(())
    }

    /// Adds a label to a vertex.
    pub fn vertex_add_label(&self, gid: Gid, label: Label) -> EngineResult<()> {
        let mut inner = self.inner.write();
        let record = inner.vertex_new_mut(gid)?;
        if !record.has_label(&label) {
            record.labels.push(label);
        }
        let record = record.clone();
        inner.index_vertex(gid, &record);
        Ok(())
    }

    /// Removes a label from a vertex.
    pub fn vertex_remove_label(&self, gid: Gid, label: &Label) -> EngineResult<()> {
        self.inner.write().vertex_new_mut(gid)?.labels.retain(|l| l != label);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edge mutation
    // ------------------------------------------------------------------

    /// Sets a property on an edge. A null value removes the key.
    pub fn edge_set_property(
        &self,
        gid: Gid,
        key: PropertyKey,
        value: PropertyValue,
    ) -> EngineResult<()> {
        let mut inner = self.inner.write();
        let record = inner.edge_new_mut(gid)?;
        if value.is_null() {
            record.properties.remove(&key);
        } else {
            record.properties.insert(key, value);
        }
        Ok(())
    }

    /// Removes a property from an edge.
    pub fn edge_remove_property(&self, gid: Gid, key: &PropertyKey) -> EngineResult<()> {
        self.inner.write().edge_new_mut(gid)?.properties.remove(key);
        Ok(())
    }

    /// Removes all properties from an edge.
    pub fn edge_clear_properties(&self, gid: Gid) -> EngineResult<()> {
        self.inner.write().edge_new_mut(gid)?.properties.clear();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Removes an edge and unregisters it from both local endpoints.
    /// Returns the removed record so the caller can route unregistration
    /// for remote endpoints.
    pub fn remove_edge(&self, gid: Gid) -> EngineResult<Arc<EdgeRecord>> {
        let mut inner = self.inner.write();
        let versioned = inner
            .edges
            .get_mut(&gid)
            .ok_or_else(|| EngineError::Reconstruction(format!("edge {gid}")))?;
        let Some(record) = versioned.view(View::New) else {
            // Deleting an already-deleted edge is a no-op.
            return Err(EngineError::RecordDeleted(format!("edge {gid}")));
        };
        versioned.remove();

        let address = GlobalAddress::new(gid, self.worker_id);
        for endpoint in [record.from, record.to] {
            if endpoint.is_local_to(self.worker_id) {
                if let Ok(vertex) = inner.vertex_new_mut(endpoint.gid) {
                    vertex.in_edges.retain(|r| r.edge != address);
                    vertex.out_edges.retain(|r| r.edge != address);
                }
            }
        }
        Ok(record)
    }

    /// Unregisters an edge reference from a local vertex. Used when the
    /// edge record lives on another worker.
    pub fn unregister_edge(&self, vertex: Gid, edge: GlobalAddress) -> EngineResult<()> {
        let mut inner = self.inner.write();
        let record = inner.vertex_new_mut(vertex)?;
        record.in_edges.retain(|r| r.edge != edge);
        record.out_edges.retain(|r| r.edge != edge);
        Ok(())
    }

    /// Removes a vertex. Without `detach`, returns `Ok(false)` when the
    /// vertex still has edges in the new view. With `detach`, removes all
    /// locally stored incident edges first; references to remote edge
    /// records must be routed by the caller.
    pub fn remove_vertex(&self, gid: Gid, detach: bool) -> EngineResult<bool> {
        let record = {
            let inner = self.inner.read();
            let versioned = inner
                .vertices
                .get(&gid)
                .ok_or_else(|| EngineError::Reconstruction(format!("vertex {gid}")))?;
            match versioned.view(View::New) {
                Some(record) => record,
                None => return Err(EngineError::RecordDeleted(format!("vertex {gid}"))),
            }
        };

        if record.has_edges() {
            if !detach {
                return Ok(false);
            }
            for edge_ref in record.in_edges.iter().chain(&record.out_edges) {
                if edge_ref.edge.is_local_to(self.worker_id) {
                    match self.remove_edge(edge_ref.edge.gid) {
                        Ok(_) | Err(EngineError::RecordDeleted(_)) => {}
                        Err(other) => return Err(other),
                    }
                }
            }
        }

        if let Some(versioned) = self.inner.write().vertices.get_mut(&gid) {
            versioned.remove();
        }
        Ok(true)
    }
}
