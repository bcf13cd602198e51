//! Vertex and edge records.
//!
//! Records are the versioned payloads stored in a [`GraphStore`]
//! (crate::store::GraphStore). A vertex record carries its incident edge
//! references inline, including references to edges whose records live on
//! other workers; an edge record always lives on the worker owning the
//! *from* endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use quiver_core::{EdgeTypeName, GlobalAddress, Label, PropertyKey, PropertyValue};

/// A reference from a vertex to one of its incident edges.
///
/// Carries the other endpoint's address and the edge type so that
/// direction/type filtering and cycle detection never require fetching
/// the (possibly remote) edge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    /// Address of the edge record.
    pub edge: GlobalAddress,
    /// Address of the endpoint on the far side of the edge.
    pub other: GlobalAddress,
    /// The edge's type.
    pub edge_type: EdgeTypeName,
}

/// A vertex record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    /// Labels on the vertex.
    pub labels: Vec<Label>,
    /// Properties on the vertex.
    pub properties: BTreeMap<PropertyKey, PropertyValue>,
    /// Incoming edges (this vertex is the *to* endpoint).
    pub in_edges: Vec<EdgeRef>,
    /// Outgoing edges (this vertex is the *from* endpoint).
    pub out_edges: Vec<EdgeRef>,
}

impl VertexRecord {
    /// Creates a record with the given labels and properties.
    #[must_use]
    pub fn new(labels: Vec<Label>, properties: BTreeMap<PropertyKey, PropertyValue>) -> Self {
        Self { labels, properties, in_edges: Vec::new(), out_edges: Vec::new() }
    }

    /// Returns true if the vertex carries the label.
    #[must_use]
    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    /// Returns the property value, or null if absent.
    #[must_use]
    pub fn property(&self, key: &PropertyKey) -> PropertyValue {
        self.properties.get(key).cloned().unwrap_or(PropertyValue::Null)
    }

    /// Returns true if the vertex has any incident edges.
    #[must_use]
    pub fn has_edges(&self) -> bool {
        !self.in_edges.is_empty() || !self.out_edges.is_empty()
    }
}

/// An edge record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// The *from* endpoint. Always local to the worker storing the record.
    pub from: GlobalAddress,
    /// The *to* endpoint; may live on another worker.
    pub to: GlobalAddress,
    /// The edge's type.
    pub edge_type: EdgeTypeName,
    /// Properties on the edge.
    pub properties: BTreeMap<PropertyKey, PropertyValue>,
}

impl EdgeRecord {
    /// Creates an edge record with no properties.
    #[must_use]
    pub fn new(from: GlobalAddress, to: GlobalAddress, edge_type: EdgeTypeName) -> Self {
        Self { from, to, edge_type, properties: BTreeMap::new() }
    }

    /// Returns the property value, or null if absent.
    #[must_use]
    pub fn property(&self, key: &PropertyKey) -> PropertyValue {
        self.properties.get(key).cloned().unwrap_or(PropertyValue::Null)
    }
}
