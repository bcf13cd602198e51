//! Planner symbols and the symbol table.
//!
//! A [`Symbol`] is a planner-assigned identifier for a logical value slot.
//! Its dense `position` indexes directly into the execution frame; two
//! symbols are equal iff their positions match. Positions are assigned by
//! the planner through a [`SymbolTable`] and remain stable for the
//! lifetime of the plan, including after the plan is shipped to workers.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// The kind of value a symbol holds, as inferred by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SymbolKind {
    /// No type information.
    #[default]
    Any,
    /// A vertex accessor.
    Vertex,
    /// An edge accessor.
    Edge,
    /// A number.
    Number,
    /// A list (variable-length expansions bind edge lists).
    EdgeList,
    /// A named path.
    Path,
}

/// A planner-assigned identifier for a frame slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    name: String,
    position: usize,
    kind: SymbolKind,
}

impl Symbol {
    /// Creates a symbol. Callers outside the planner should obtain
    /// symbols through [`SymbolTable::create`] so positions stay dense.
    #[must_use]
    pub fn new(name: impl Into<String>, position: usize, kind: SymbolKind) -> Self {
        Self { name: name.into(), position, kind }
    }

    /// Returns the user-visible name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the frame slot this symbol occupies.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the planner-inferred kind.
    #[must_use]
    pub const fn kind(&self) -> SymbolKind {
        self.kind
    }
}

// Symbols compare and hash by position only; the planner guarantees one
// name per position, but anonymous symbols may share names.
impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.position)
    }
}

/// Owns the dense symbol assignment for one plan.
///
/// The table's length is the width of every frame executing the plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new symbol at the next free position.
    pub fn create(&mut self, name: impl Into<String>, kind: SymbolKind) -> Symbol {
        let symbol = Symbol::new(name, self.symbols.len(), kind);
        self.symbols.push(symbol.clone());
        symbol
    }

    /// Returns the symbol at a position.
    #[must_use]
    pub fn at(&self, position: usize) -> Option<&Symbol> {
        self.symbols.get(position)
    }

    /// Returns the number of symbols, i.e. the frame width.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if no symbols were created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_by_position() {
        let a = Symbol::new("n", 0, SymbolKind::Vertex);
        let b = Symbol::new("renamed", 0, SymbolKind::Any);
        let c = Symbol::new("n", 1, SymbolKind::Vertex);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn table_assigns_dense_positions() {
        let mut table = SymbolTable::new();
        let n = table.create("n", SymbolKind::Vertex);
        let e = table.create("e", SymbolKind::Edge);

        assert_eq!(n.position(), 0);
        assert_eq!(e.position(), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.at(1).map(Symbol::name), Some("e"));
    }
}
