//! Graph paths.

use std::hash::{Hash, Hasher};

use quiver_core::{EngineError, EngineResult};
use quiver_graph::{EdgeAccessor, VertexAccessor, View};

/// An alternating sequence of vertices and edges.
///
/// Invariant: the path holds `n + 1` vertices and `n` edges, and edge
/// `i` connects vertices `i` and `i + 1` in either direction.
#[derive(Debug, Clone)]
pub struct Path {
    vertices: Vec<VertexAccessor>,
    edges: Vec<EdgeAccessor>,
}

impl Path {
    /// Creates a single-vertex path.
    #[must_use]
    pub fn new(start: VertexAccessor) -> Self {
        Self { vertices: vec![start], edges: Vec::new() }
    }

    /// Appends an edge and the endpoint it leads to. The edge must
    /// connect to the current tail vertex; its orientation is derived
    /// from the tail.
    pub fn expand(&mut self, edge: EdgeAccessor) -> EngineResult<()> {
        let tail = self.tail().address();
        let from = edge.from_address()?;
        let to = edge.to_address()?;
        let next = if from == tail {
            edge.to_vertex()?
        } else if to == tail {
            edge.from_vertex()?
        } else {
            return Err(EngineError::query(format!(
                "edge {from}->{to} does not connect to path tail {tail}"
            )));
        };
        self.edges.push(edge);
        self.vertices.push(next);
        Ok(())
    }

    /// Returns the last vertex.
    #[must_use]
    pub fn tail(&self) -> &VertexAccessor {
        self.vertices.last().expect("a path always holds at least one vertex")
    }

    /// Returns the vertices in order.
    #[must_use]
    pub fn vertices(&self) -> &[VertexAccessor] {
        &self.vertices
    }

    /// Returns the edges in order.
    #[must_use]
    pub fn edges(&self) -> &[EdgeAccessor] {
        &self.edges
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true for a single-vertex path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Switches every element to the new view and verifies it still
    /// resolves.
    pub fn reconstruct(&mut self) -> EngineResult<()> {
        for vertex in &mut self.vertices {
            vertex.switch(View::New);
            vertex.record()?;
        }
        for edge in &mut self.edges {
            edge.switch(View::New);
            edge.record()?;
        }
        Ok(())
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.edges == other.edges
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.vertices.hash(state);
        self.edges.hash(state);
    }
}
