//! The runtime value of the query engine.
//!
//! [`TypedValue`] is a tagged union over everything a frame slot can
//! hold. It is wider than the storage value: graph elements and paths
//! flow through frames but cannot be stored as properties.
//!
//! Three comparison regimes coexist and must not be conflated:
//!
//! - *logical* equality and ordering ([`TypedValue::logical_eq`] and
//!   friends) follow SQL three-valued logic — null poisons the result;
//! - *bool* equality ([`bool_equal`], [`RowKey`]) is the null-aware
//!   variant used for `DISTINCT` and aggregation group keys, where two
//!   nulls are the same key;
//! - *ordering* ([`order_less`]) is the `ORDER BY` comparator, where
//!   null sorts after everything else.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use quiver_core::{EngineError, EngineResult, PropertyValue};
use quiver_graph::{EdgeAccessor, VertexAccessor, View};

use crate::path::Path;

/// A value flowing through the operator pipeline.
#[derive(Debug, Clone)]
pub enum TypedValue {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Double(f64),
    /// A string.
    String(String),
    /// A list of values.
    List(Vec<TypedValue>),
    /// A map from string keys to values.
    Map(BTreeMap<String, TypedValue>),
    /// A vertex accessor.
    Vertex(VertexAccessor),
    /// An edge accessor.
    Edge(EdgeAccessor),
    /// A named path.
    Path(Path),
}

impl TypedValue {
    /// Returns true for [`TypedValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for ints and doubles.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Double(_))
    }

    /// Returns a short name for the value's type, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Vertex(_) => "vertex",
            Self::Edge(_) => "edge",
            Self::Path(_) => "path",
        }
    }

    /// Lifts a storage value into the runtime domain.
    #[must_use]
    pub fn from_property(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Self::Null,
            PropertyValue::Bool(v) => Self::Bool(v),
            PropertyValue::Int(v) => Self::Int(v),
            PropertyValue::Double(v) => Self::Double(v),
            PropertyValue::String(v) => Self::String(v),
            PropertyValue::List(items) => {
                Self::List(items.into_iter().map(Self::from_property).collect())
            }
            PropertyValue::Map(entries) => Self::Map(
                entries.into_iter().map(|(k, v)| (k, Self::from_property(v))).collect(),
            ),
        }
    }

    /// Lowers the value into the storage domain, or fails with
    /// `PropertyValueType` when the value is not storable.
    pub fn to_property(&self) -> EngineResult<PropertyValue> {
        match self {
            Self::Null => Ok(PropertyValue::Null),
            Self::Bool(v) => Ok(PropertyValue::Bool(*v)),
            Self::Int(v) => Ok(PropertyValue::Int(*v)),
            Self::Double(v) => Ok(PropertyValue::Double(*v)),
            Self::String(v) => Ok(PropertyValue::String(v.clone())),
            Self::List(items) => Ok(PropertyValue::List(
                items.iter().map(Self::to_property).collect::<EngineResult<_>>()?,
            )),
            Self::Map(entries) => Ok(PropertyValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_property()?)))
                    .collect::<EngineResult<_>>()?,
            )),
            other => Err(EngineError::PropertyValueType(other.type_name().to_owned())),
        }
    }

    /// Returns the boolean, or fails with a type mismatch.
    pub fn as_bool(&self) -> EngineResult<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(EngineError::type_mismatch("bool", other.type_name())),
        }
    }

    /// Returns the integer, or fails with a type mismatch.
    pub fn as_int(&self) -> EngineResult<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(EngineError::type_mismatch("int", other.type_name())),
        }
    }

    /// Returns the numeric value widened to a double.
    pub fn as_double(&self) -> EngineResult<f64> {
        match self {
            Self::Int(v) => Ok(*v as f64),
            Self::Double(v) => Ok(*v),
            other => Err(EngineError::type_mismatch("number", other.type_name())),
        }
    }

    /// Returns the vertex accessor, or fails with a type mismatch.
    pub fn as_vertex(&self) -> EngineResult<&VertexAccessor> {
        match self {
            Self::Vertex(v) => Ok(v),
            other => Err(EngineError::type_mismatch("vertex", other.type_name())),
        }
    }

    /// Returns the edge accessor, or fails with a type mismatch.
    pub fn as_edge(&self) -> EngineResult<&EdgeAccessor> {
        match self {
            Self::Edge(e) => Ok(e),
            other => Err(EngineError::type_mismatch("edge", other.type_name())),
        }
    }

    /// Returns the list, or fails with a type mismatch.
    pub fn as_list(&self) -> EngineResult<&Vec<TypedValue>> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(EngineError::type_mismatch("list", other.type_name())),
        }
    }

    /// Returns the list mutably, or fails with a type mismatch.
    pub fn as_list_mut(&mut self) -> EngineResult<&mut Vec<TypedValue>> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(EngineError::type_mismatch("list", other.type_name())),
        }
    }

    // ------------------------------------------------------------------
    // Arithmetic (SQL three-valued logic: null poisons the result)
    // ------------------------------------------------------------------

    /// Addition: numbers, string concatenation, list concatenation.
    pub fn add(&self, other: &Self) -> EngineResult<Self> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(Self::Null),
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(a.wrapping_add(*b))),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                Ok(Self::Double(a.as_double()? + b.as_double()?))
            }
            (Self::String(a), Self::String(b)) => Ok(Self::String(format!("{a}{b}"))),
            (Self::List(a), Self::List(b)) => {
                let mut items = a.clone();
                items.extend(b.iter().cloned());
                Ok(Self::List(items))
            }
            (a, b) => Err(arithmetic_error("+", a, b)),
        }
    }

    /// Subtraction over numbers.
    pub fn subtract(&self, other: &Self) -> EngineResult<Self> {
        self.numeric_op(other, "-", i64::wrapping_sub, |a, b| a - b)
    }

    /// Multiplication over numbers.
    pub fn multiply(&self, other: &Self) -> EngineResult<Self> {
        self.numeric_op(other, "*", i64::wrapping_mul, |a, b| a * b)
    }

    /// Division over numbers; integer division truncates, integer
    /// division by zero is a query error.
    pub fn divide(&self, other: &Self) -> EngineResult<Self> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(Self::Null),
            (Self::Int(_), Self::Int(0)) => Err(EngineError::query("division by zero")),
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(a / b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                Ok(Self::Double(a.as_double()? / b.as_double()?))
            }
            (a, b) => Err(arithmetic_error("/", a, b)),
        }
    }

    /// Remainder over numbers; integer remainder by zero is a query
    /// error.
    pub fn modulo(&self, other: &Self) -> EngineResult<Self> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(Self::Null),
            (Self::Int(_), Self::Int(0)) => Err(EngineError::query("division by zero")),
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(a % b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                Ok(Self::Double(a.as_double()? % b.as_double()?))
            }
            (a, b) => Err(arithmetic_error("%", a, b)),
        }
    }

    /// Unary negation over numbers.
    pub fn negate(&self) -> EngineResult<Self> {
        match self {
            Self::Null => Ok(Self::Null),
            Self::Int(v) => Ok(Self::Int(v.wrapping_neg())),
            Self::Double(v) => Ok(Self::Double(-v)),
            other => Err(EngineError::type_mismatch("number", other.type_name())),
        }
    }

    fn numeric_op(
        &self,
        other: &Self,
        op: &str,
        int_op: fn(i64, i64) -> i64,
        double_op: fn(f64, f64) -> f64,
    ) -> EngineResult<Self> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(Self::Null),
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(int_op(*a, *b))),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                Ok(Self::Double(double_op(a.as_double()?, b.as_double()?)))
            }
            (a, b) => Err(arithmetic_error(op, a, b)),
        }
    }

    // ------------------------------------------------------------------
    // Logical comparison (three-valued)
    // ------------------------------------------------------------------

    /// Equality under three-valued logic: null if either side is null,
    /// false for values of unrelated types.
    #[must_use]
    pub fn logical_eq(&self, other: &Self) -> Self {
        if self.is_null() || other.is_null() {
            return Self::Null;
        }
        Self::Bool(bool_equal_non_null(self, other))
    }

    /// Less-than under three-valued logic; comparing values without a
    /// defined order is an error.
    pub fn logical_lt(&self, other: &Self) -> EngineResult<Self> {
        if self.is_null() || other.is_null() {
            return Ok(Self::Null);
        }
        match ordered_compare(self, other)? {
            Ordering::Less => Ok(Self::Bool(true)),
            _ => Ok(Self::Bool(false)),
        }
    }

    // ------------------------------------------------------------------
    // Reconstruction
    // ------------------------------------------------------------------

    /// Re-resolves every graph element in the value against the new
    /// view. Used after a command advance so buffered rows observe the
    /// writes the barrier made visible.
    pub fn reconstruct(&mut self) -> EngineResult<()> {
        match self {
            Self::Vertex(vertex) => {
                vertex.switch(View::New);
                vertex.record().map(|_| ())
            }
            Self::Edge(edge) => {
                edge.switch(View::New);
                edge.record().map(|_| ())
            }
            Self::List(items) => items.iter_mut().try_for_each(Self::reconstruct),
            Self::Map(entries) => entries.values_mut().try_for_each(Self::reconstruct),
            Self::Path(path) => path.reconstruct(),
            _ => Ok(()),
        }
    }
}

fn arithmetic_error(op: &str, a: &TypedValue, b: &TypedValue) -> EngineError {
    EngineError::query(format!(
        "'{op}' is not defined for {} and {}",
        a.type_name(),
        b.type_name()
    ))
}

/// Compares two non-null values with a defined order: numbers (with
/// promotion), strings, and bools.
pub fn ordered_compare(a: &TypedValue, b: &TypedValue) -> EngineResult<Ordering> {
    match (a, b) {
        (TypedValue::Bool(x), TypedValue::Bool(y)) => Ok(x.cmp(y)),
        (TypedValue::Int(x), TypedValue::Int(y)) => Ok(x.cmp(y)),
        (TypedValue::String(x), TypedValue::String(y)) => Ok(x.cmp(y)),
        (x, y) if x.is_numeric() && y.is_numeric() => x
            .as_double()?
            .partial_cmp(&y.as_double()?)
            .ok_or_else(|| EngineError::query("comparison of NaN values")),
        (x, y) => Err(EngineError::query(format!(
            "comparison is not defined for {} and {}",
            x.type_name(),
            y.type_name()
        ))),
    }
}

/// The `ORDER BY` comparator: null sorts after every other value, and
/// comparing values of unrelated non-null types is an error.
pub fn order_less(a: &TypedValue, b: &TypedValue) -> EngineResult<bool> {
    // Null is not less than anything, and everything is less than null.
    if a.is_null() {
        return Ok(false);
    }
    if b.is_null() {
        return Ok(true);
    }
    Ok(ordered_compare(a, b)? == Ordering::Less)
}

/// Null-aware equality: two nulls are equal, numerics promote, graph
/// elements compare by address, containers compare element-wise.
#[must_use]
pub fn bool_equal(a: &TypedValue, b: &TypedValue) -> bool {
    match (a, b) {
        (TypedValue::Null, TypedValue::Null) => true,
        (TypedValue::Null, _) | (_, TypedValue::Null) => false,
        _ => bool_equal_non_null(a, b),
    }
}

fn bool_equal_non_null(a: &TypedValue, b: &TypedValue) -> bool {
    match (a, b) {
        (TypedValue::Bool(x), TypedValue::Bool(y)) => x == y,
        (TypedValue::String(x), TypedValue::String(y)) => x == y,
        (x, y) if x.is_numeric() && y.is_numeric() => match (x, y) {
            (TypedValue::Int(i), TypedValue::Int(j)) => i == j,
            _ => x.as_double().ok() == y.as_double().ok(),
        },
        (TypedValue::List(x), TypedValue::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(i, j)| bool_equal(i, j))
        }
        (TypedValue::Map(x), TypedValue::Map(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| bool_equal(v, w)))
        }
        (TypedValue::Vertex(x), TypedValue::Vertex(y)) => x == y,
        (TypedValue::Edge(x), TypedValue::Edge(y)) => x == y,
        (TypedValue::Path(x), TypedValue::Path(y)) => x == y,
        _ => false,
    }
}

/// A projected row usable as a hash-map key under [`bool_equal`]
/// semantics. `DISTINCT` and aggregation group keys are `RowKey`s.
#[derive(Debug, Clone)]
pub struct RowKey(pub Vec<TypedValue>);

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| bool_equal(a, b))
    }
}

impl Eq for RowKey {}

impl Hash for RowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            hash_value(value, state);
        }
    }
}

fn hash_value<H: Hasher>(value: &TypedValue, state: &mut H) {
    match value {
        TypedValue::Null => state.write_u8(0),
        TypedValue::Bool(v) => {
            state.write_u8(1);
            v.hash(state);
        }
        // Ints and fraction-free doubles must land in the same bucket,
        // since bool_equal promotes them.
        TypedValue::Int(v) => {
            state.write_u8(2);
            v.hash(state);
        }
        TypedValue::Double(v) => {
            if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 {
                state.write_u8(2);
                (*v as i64).hash(state);
            } else {
                state.write_u8(3);
                v.to_bits().hash(state);
            }
        }
        TypedValue::String(v) => {
            state.write_u8(4);
            v.hash(state);
        }
        TypedValue::List(items) => {
            state.write_u8(5);
            state.write_usize(items.len());
            for item in items {
                hash_value(item, state);
            }
        }
        TypedValue::Map(entries) => {
            state.write_u8(6);
            state.write_usize(entries.len());
            for (key, item) in entries {
                key.hash(state);
                hash_value(item, state);
            }
        }
        TypedValue::Vertex(v) => {
            state.write_u8(7);
            v.hash(state);
        }
        TypedValue::Edge(e) => {
            state.write_u8(8);
            e.hash(state);
        }
        TypedValue::Path(p) => {
            state.write_u8(9);
            p.hash(state);
        }
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                f.write_str("}")
            }
            Self::Vertex(v) => write!(f, "{v:?}"),
            Self::Edge(e) => write!(f, "{e:?}"),
            Self::Path(p) => write!(f, "{p:?}"),
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<VertexAccessor> for TypedValue {
    fn from(v: VertexAccessor) -> Self {
        Self::Vertex(v)
    }
}

impl From<EdgeAccessor> for TypedValue {
    fn from(e: EdgeAccessor) -> Self {
        Self::Edge(e)
    }
}

impl From<Vec<TypedValue>> for TypedValue {
    fn from(v: Vec<TypedValue>) -> Self {
        Self::List(v)
    }
}
