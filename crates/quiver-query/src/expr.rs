//! The expression tree the planner hands to the engine.
//!
//! Expressions reference frame slots through [`Symbol`]s whose positions
//! the planner has already assigned, so evaluation never consults name
//! scopes. The tree is immutable and ships to workers together with the
//! plan.

use serde::{Deserialize, Serialize};

use quiver_core::{Label, PropertyKey, PropertyValue, Symbol};

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    /// Addition (also string and list concatenation).
    Add,
    /// Subtraction.
    Subtract,
    /// Multiplication.
    Multiply,
    /// Division.
    Divide,
    /// Remainder.
    Modulo,
}

/// A binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

/// An expression over a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// A constant.
    Literal(PropertyValue),
    /// A named query parameter.
    Parameter(String),
    /// The value of a frame slot.
    Ident(Symbol),
    /// A property lookup on a vertex, edge, or map.
    Property {
        /// The looked-up object.
        object: Box<Expr>,
        /// The property key.
        key: PropertyKey,
    },
    /// A label test on a vertex.
    HasLabels {
        /// The tested object.
        object: Box<Expr>,
        /// Labels that must all be present.
        labels: Vec<Label>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Arithmetic negation.
    Negate(Box<Expr>),
    /// Null test; never returns null itself.
    IsNull(Box<Expr>),
    /// Kleene conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Kleene disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Binary arithmetic.
    Arithmetic {
        /// The operator.
        op: ArithOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Binary comparison.
    Comparison {
        /// The operator.
        op: CmpOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// A list constructor.
    List(Vec<Expr>),
    /// A map constructor.
    Map(Vec<(String, Expr)>),
}

impl Expr {
    /// A literal integer.
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::Literal(PropertyValue::Int(value))
    }

    /// A literal value.
    #[must_use]
    pub fn literal(value: impl Into<PropertyValue>) -> Self {
        Self::Literal(value.into())
    }

    /// A frame slot reference.
    #[must_use]
    pub fn ident(symbol: Symbol) -> Self {
        Self::Ident(symbol)
    }

    /// A named parameter reference.
    #[must_use]
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter(name.into())
    }

    /// A property lookup on a frame slot.
    #[must_use]
    pub fn property(symbol: Symbol, key: impl Into<PropertyKey>) -> Self {
        Self::Property { object: Box::new(Self::Ident(symbol)), key: key.into() }
    }

    /// A label test on a frame slot.
    #[must_use]
    pub fn has_label(symbol: Symbol, label: impl Into<Label>) -> Self {
        Self::HasLabels { object: Box::new(Self::Ident(symbol)), labels: vec![label.into()] }
    }

    /// A comparison.
    #[must_use]
    pub fn compare(op: CmpOp, lhs: Self, rhs: Self) -> Self {
        Self::Comparison { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    /// An equality comparison.
    #[must_use]
    pub fn eq(lhs: Self, rhs: Self) -> Self {
        Self::compare(CmpOp::Eq, lhs, rhs)
    }

    /// An arithmetic expression.
    #[must_use]
    pub fn arithmetic(op: ArithOp, lhs: Self, rhs: Self) -> Self {
        Self::Arithmetic { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    /// An addition.
    #[must_use]
    pub fn add(lhs: Self, rhs: Self) -> Self {
        Self::arithmetic(ArithOp::Add, lhs, rhs)
    }

    /// A conjunction.
    #[must_use]
    pub fn and(lhs: Self, rhs: Self) -> Self {
        Self::And(Box::new(lhs), Box::new(rhs))
    }
}
