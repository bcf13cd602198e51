//! Storage-legal property values.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value that can be stored as a vertex or edge property.
///
/// This is deliberately narrower than the runtime value of the query
/// engine: graph elements and paths are not storable. The query layer
/// checks convertibility and surfaces a `PropertyValueType` error when a
/// runtime value cannot be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
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
    /// A list of property values.
    List(Vec<PropertyValue>),
    /// A map from string keys to property values.
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Returns true for [`PropertyValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
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
        }
    }

    /// Compares two values the way an index scan does: ints and doubles
    /// promote to a common numeric domain, equal types compare naturally,
    /// and anything else is incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Double(b)) => (*a as f64).partial_cmp(b),
            (Self::Double(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for PropertyValue {
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
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        Self::List(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numeric_promotion() {
        assert_eq!(
            PropertyValue::Int(1).compare(&PropertyValue::Double(1.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            PropertyValue::Double(0.5).compare(&PropertyValue::Int(1)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn mixed_types_incomparable() {
        assert_eq!(PropertyValue::Int(1).compare(&PropertyValue::from("1")), None);
        assert_eq!(PropertyValue::Null.compare(&PropertyValue::Null), None);
        assert_eq!(PropertyValue::Bool(true).compare(&PropertyValue::Int(1)), None);
    }

    fn scalar() -> impl Strategy<Value = PropertyValue> {
        prop_oneof![
            any::<bool>().prop_map(PropertyValue::Bool),
            any::<i64>().prop_map(PropertyValue::Int),
            (-1.0e9f64..1.0e9).prop_map(PropertyValue::Double),
            "[a-z]{0,8}".prop_map(PropertyValue::from),
        ]
    }

    proptest! {
        #[test]
        fn compare_is_antisymmetric(a in scalar(), b in scalar()) {
            if let (Some(ab), Some(ba)) = (a.compare(&b), b.compare(&a)) {
                prop_assert_eq!(ab, ba.reverse());
            }
        }

        #[test]
        fn compare_is_reflexive_on_comparables(a in scalar()) {
            if let Some(ord) = a.compare(&a) {
                prop_assert_eq!(ord, Ordering::Equal);
            }
        }
    }
}
