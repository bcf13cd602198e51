//! Deferred-update buffering and replay.
//!
//! Mutations that target a record owned by another worker are not applied
//! in place: they are shipped to the owning worker and buffered in its
//! [`UpdateServer`], keyed by transaction. The synchronization barrier
//! broadcasts *apply-all*, at which point each worker replays its buffer
//! in arrival order. Apply outcomes are reported as [`UpdateResult`]
//! state codes rather than errors so they can cross the RPC boundary.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use quiver_core::{EngineError, EngineResult, GlobalAddress, Label, PropertyKey, PropertyValue};

use crate::record::EdgeRef;
use crate::store::GraphStore;

/// A buffered mutation of a record.
#[derive(Debug, Clone)]
pub enum GraphUpdate {
    /// Set (or, for null, remove) a vertex property.
    SetVertexProperty {
        /// The vertex.
        address: GlobalAddress,
        /// The property key.
        key: PropertyKey,
        /// The value.
        value: PropertyValue,
    },
    /// Remove a vertex property.
    RemoveVertexProperty {
        /// The vertex.
        address: GlobalAddress,
        /// The property key.
        key: PropertyKey,
    },
    /// Remove all vertex properties.
    ClearVertexProperties {
        /// The vertex.
        address: GlobalAddress,
    },
    /// Add a label to a vertex.
    AddLabel {
        /// The vertex.
        address: GlobalAddress,
        /// The label.
        label: Label,
    },
    /// Remove a label from a vertex.
    RemoveLabel {
        /// The vertex.
        address: GlobalAddress,
        /// The label.
        label: Label,
    },
    /// Set (or, for null, remove) an edge property.
    SetEdgeProperty {
        /// The edge.
        address: GlobalAddress,
        /// The property key.
        key: PropertyKey,
        /// The value.
        value: PropertyValue,
    },
    /// Remove an edge property.
    RemoveEdgeProperty {
        /// The edge.
        address: GlobalAddress,
        /// The property key.
        key: PropertyKey,
    },
    /// Remove all edge properties.
    ClearEdgeProperties {
        /// The edge.
        address: GlobalAddress,
    },
    /// Register an incoming edge reference on a vertex whose edge record
    /// was created on another worker.
    RegisterInEdge {
        /// The vertex gaining the reference.
        vertex: GlobalAddress,
        /// The reference.
        edge: EdgeRef,
    },
    /// Drop an edge reference from a vertex after the edge record was
    /// removed on another worker.
    UnregisterEdge {
        /// The vertex losing the reference.
        vertex: GlobalAddress,
        /// The removed edge's address.
        edge: GlobalAddress,
    },
    /// Remove an edge record.
    RemoveEdge {
        /// The edge.
        address: GlobalAddress,
    },
    /// Remove a vertex record.
    RemoveVertex {
        /// The vertex.
        address: GlobalAddress,
        /// Whether incident edges are removed too.
        detach: bool,
    },
}

/// Outcome of replaying one transaction's buffered updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// All updates applied.
    Done,
    /// A serialization conflict; retryable.
    SerializationFailure,
    /// An update targeted a deleted record.
    RecordDeleted,
    /// A lock could not be acquired in time; retryable.
    LockTimeout,
}

impl UpdateResult {
    /// Maps an apply error onto the state code crossing the RPC boundary.
    #[must_use]
    pub fn from_error(error: &EngineError) -> Self {
        match error {
            EngineError::Serialization(_) => Self::SerializationFailure,
            EngineError::LockTimeout(_) => Self::LockTimeout,
            _ => Self::RecordDeleted,
        }
    }

    /// Converts the state code back into an engine error, tagging it with
    /// the failing phase for the user-visible message.
    pub fn into_result(self, phase: &str) -> EngineResult<()> {
        match self {
            Self::Done => Ok(()),
            Self::SerializationFailure => {
                Err(EngineError::Serialization(format!("failed to {phase}")))
            }
            Self::RecordDeleted => Err(EngineError::RecordDeleted(format!("failed to {phase}"))),
            Self::LockTimeout => Err(EngineError::LockTimeout(format!("failed to {phase}"))),
        }
    }
}

/// Per-worker buffer of deferred updates.
pub struct UpdateServer {
    store: Arc<GraphStore>,
    pending: Mutex<HashMap<u64, Vec<GraphUpdate>>>,
}

impl UpdateServer {
    /// Creates an update server over the worker's shard.
    #[must_use]
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store, pending: Mutex::new(HashMap::new()) }
    }

    /// Buffers an update for later replay.
    pub fn buffer(&self, transaction: u64, update: GraphUpdate) {
        trace!(worker = %self.store.worker_id(), transaction, ?update, "buffering deferred update");
        self.pending.lock().entry(transaction).or_default().push(update);
    }

    /// Returns the number of updates buffered for a transaction.
    #[must_use]
    pub fn pending(&self, transaction: u64) -> usize {
        self.pending.lock().get(&transaction).map_or(0, Vec::len)
    }

    /// Replays the transaction's buffered updates in arrival order. The
    /// first failure decides the result; remaining updates of the
    /// transaction are dropped either way.
    pub fn apply(&self, transaction: u64) -> UpdateResult {
        let updates = self.pending.lock().remove(&transaction).unwrap_or_default();
        trace!(worker = %self.store.worker_id(), transaction, count = updates.len(), "applying deferred updates");
        for update in updates {
            if let Err(error) = self.apply_one(update) {
                return UpdateResult::from_error(&error);
            }
        }
        UpdateResult::Done
    }

    fn apply_one(&self, update: GraphUpdate) -> EngineResult<()> {
        let store = &self.store;
        match update {
            GraphUpdate::SetVertexProperty { address, key, value } => {
                store.vertex_set_property(address.gid, key, value)
            }
            GraphUpdate::RemoveVertexProperty { address, key } => {
                store.vertex_remove_property(address.gid, &key)
            }
            GraphUpdate::ClearVertexProperties { address } => {
                store.vertex_clear_properties(address.gid)
            }
            GraphUpdate::AddLabel { address, label } => store.vertex_add_label(address.gid, label),
            GraphUpdate::RemoveLabel { address, label } => {
                store.vertex_remove_label(address.gid, &label)
            }
            GraphUpdate::SetEdgeProperty { address, key, value } => {
                store.edge_set_property(address.gid, key, value)
            }
            GraphUpdate::RemoveEdgeProperty { address, key } => {
                store.edge_remove_property(address.gid, &key)
            }
            GraphUpdate::ClearEdgeProperties { address } => {
                store.edge_clear_properties(address.gid)
            }
            GraphUpdate::RegisterInEdge { vertex, edge } => {
                store.register_in_edge(vertex.gid, edge)
            }
            GraphUpdate::UnregisterEdge { vertex, edge } => {
                store.unregister_edge(vertex.gid, edge)
            }
            GraphUpdate::RemoveEdge { address } => store.remove_edge(address.gid).map(|_| ()),
            GraphUpdate::RemoveVertex { address, detach } => {
                match store.remove_vertex(address.gid, detach)? {
                    true => Ok(()),
                    false => Err(EngineError::ConnectedVertexDeletion),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::View;
    use quiver_core::WorkerId;
    use std::collections::BTreeMap;

    #[test]
    fn buffered_updates_apply_in_order() {
        let store = Arc::new(GraphStore::new(WorkerId::new(1)));
        let gid = store.create_vertex(vec![], BTreeMap::new());
        let address = store.address(gid);
        let server = UpdateServer::new(Arc::clone(&store));

        let key = PropertyKey::new("p");
        server.buffer(
            7,
            GraphUpdate::SetVertexProperty {
                address,
                key: key.clone(),
                value: PropertyValue::Int(1),
            },
        );
        server.buffer(
            7,
            GraphUpdate::SetVertexProperty {
                address,
                key: key.clone(),
                value: PropertyValue::Int(2),
            },
        );
        assert_eq!(server.pending(7), 2);

        assert_eq!(server.apply(7), UpdateResult::Done);
        assert_eq!(server.pending(7), 0);
        assert_eq!(store.vertex(gid, View::New).unwrap().property(&key), PropertyValue::Int(2));
    }

    #[test]
    fn apply_reports_deleted_records() {
        let store = Arc::new(GraphStore::new(WorkerId::new(1)));
        let gid = store.create_vertex(vec![], BTreeMap::new());
        let address = store.address(gid);
        store.remove_vertex(gid, false).unwrap();

        let server = UpdateServer::new(Arc::clone(&store));
        server.buffer(
            3,
            GraphUpdate::SetVertexProperty {
                address,
                key: PropertyKey::new("p"),
                value: PropertyValue::Int(1),
            },
        );
        assert_eq!(server.apply(3), UpdateResult::RecordDeleted);
    }

    #[test]
    fn apply_is_scoped_to_one_transaction() {
        let store = Arc::new(GraphStore::new(WorkerId::new(1)));
        let gid = store.create_vertex(vec![], BTreeMap::new());
        let address = store.address(gid);
        let server = UpdateServer::new(Arc::clone(&store));

        server.buffer(1, GraphUpdate::AddLabel { address, label: Label::new("A") });
        server.buffer(2, GraphUpdate::AddLabel { address, label: Label::new("B") });

        assert_eq!(server.apply(1), UpdateResult::Done);
        assert_eq!(server.pending(2), 1);

        let record = store.vertex(gid, View::New).unwrap();
        assert!(record.has_label(&Label::new("A")));
        assert!(!record.has_label(&Label::new("B")));
    }
}
