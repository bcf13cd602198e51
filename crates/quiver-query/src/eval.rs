//! Expression evaluation over a frame.

use std::collections::BTreeMap;
use std::collections::HashMap;

use quiver_core::{EngineError, EngineResult, PropertyValue};
use quiver_graph::{GraphTx, View};

use crate::expr::{ArithOp, CmpOp, Expr};
use crate::frame::Frame;
use crate::value::{ordered_compare, TypedValue};

/// Named query parameter bindings.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: HashMap<String, PropertyValue>,
}

impl Parameters {
    /// Creates an empty binding set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Looks up a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }
}

/// Evaluates expressions against one frame.
///
/// The `view` selects which side of the current command property lookups
/// on graph elements observe; it mirrors the view the constructing
/// operator works in.
pub struct Evaluator<'a> {
    frame: &'a Frame,
    parameters: &'a Parameters,
    tx: &'a GraphTx,
    view: View,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator.
    #[must_use]
    pub fn new(frame: &'a Frame, parameters: &'a Parameters, tx: &'a GraphTx, view: View) -> Self {
        Self { frame, parameters, tx, view }
    }

    /// Evaluates an expression.
    pub fn eval(&self, expr: &Expr) -> EngineResult<TypedValue> {
        match expr {
            Expr::Literal(value) => Ok(TypedValue::from_property(value.clone())),
            Expr::Parameter(name) => match self.parameters.get(name) {
                Some(value) => Ok(TypedValue::from_property(value.clone())),
                None => Err(EngineError::query(format!("parameter '${name}' was not provided"))),
            },
            Expr::Ident(symbol) => Ok(self.frame[symbol].clone()),
            Expr::Property { object, key } => match self.eval(object)? {
                TypedValue::Null => Ok(TypedValue::Null),
                TypedValue::Vertex(mut vertex) => {
                    vertex.switch(self.view);
                    Ok(TypedValue::from_property(vertex.property(key)?))
                }
                TypedValue::Edge(mut edge) => {
                    edge.switch(self.view);
                    Ok(TypedValue::from_property(edge.property(key)?))
                }
                TypedValue::Map(entries) => {
                    Ok(entries.get(key.as_str()).cloned().unwrap_or(TypedValue::Null))
                }
                other => Err(EngineError::type_mismatch("vertex, edge or map", other.type_name())),
            },
            Expr::HasLabels { object, labels } => match self.eval(object)? {
                TypedValue::Null => Ok(TypedValue::Null),
                TypedValue::Vertex(mut vertex) => {
                    vertex.switch(self.view);
                    for label in labels {
                        if !vertex.has_label(label)? {
                            return Ok(TypedValue::Bool(false));
                        }
                    }
                    Ok(TypedValue::Bool(true))
                }
                other => Err(EngineError::type_mismatch("vertex", other.type_name())),
            },
            Expr::Not(operand) => match self.eval(operand)? {
                TypedValue::Null => Ok(TypedValue::Null),
                TypedValue::Bool(v) => Ok(TypedValue::Bool(!v)),
                other => Err(EngineError::type_mismatch("bool", other.type_name())),
            },
            Expr::Negate(operand) => self.eval(operand)?.negate(),
            Expr::IsNull(operand) => Ok(TypedValue::Bool(self.eval(operand)?.is_null())),
            Expr::And(lhs, rhs) => kleene_and(self.eval(lhs)?, self.eval(rhs)?),
            Expr::Or(lhs, rhs) => kleene_or(self.eval(lhs)?, self.eval(rhs)?),
            Expr::Arithmetic { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                match op {
                    ArithOp::Add => lhs.add(&rhs),
                    ArithOp::Subtract => lhs.subtract(&rhs),
                    ArithOp::Multiply => lhs.multiply(&rhs),
                    ArithOp::Divide => lhs.divide(&rhs),
                    ArithOp::Modulo => lhs.modulo(&rhs),
                }
            }
            Expr::Comparison { op, lhs, rhs } => {
                compare(*op, &self.eval(lhs)?, &self.eval(rhs)?)
            }
            Expr::List(items) => {
                Ok(TypedValue::List(items.iter().map(|e| self.eval(e)).collect::<EngineResult<_>>()?))
            }
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(TypedValue::Map(map))
            }
        }
    }

    /// Evaluates a filter condition: null is false, non-bool results are
    /// a type error.
    pub fn eval_filter(&self, expr: &Expr) -> EngineResult<bool> {
        match self.eval(expr)? {
            TypedValue::Null => Ok(false),
            TypedValue::Bool(v) => Ok(v),
            other => Err(EngineError::type_mismatch("bool or null", other.type_name())),
        }
    }

    /// Evaluates an expression that must produce an int; `what` names it
    /// in the error message.
    pub fn eval_int(&self, expr: &Expr, what: &str) -> EngineResult<i64> {
        match self.eval(expr)? {
            TypedValue::Int(v) => Ok(v),
            _ => Err(EngineError::query(format!("{what} must be an int"))),
        }
    }

    /// Returns the transaction this evaluator reads through.
    #[must_use]
    pub fn tx(&self) -> &GraphTx {
        self.tx
    }
}

fn kleene_and(lhs: TypedValue, rhs: TypedValue) -> EngineResult<TypedValue> {
    match (&lhs, &rhs) {
        (TypedValue::Bool(false), _) | (_, TypedValue::Bool(false)) => Ok(TypedValue::Bool(false)),
        (TypedValue::Null, other) | (other, TypedValue::Null) => match other {
            TypedValue::Null | TypedValue::Bool(_) => Ok(TypedValue::Null),
            other => Err(EngineError::type_mismatch("bool", other.type_name())),
        },
        (TypedValue::Bool(true), TypedValue::Bool(true)) => Ok(TypedValue::Bool(true)),
        (TypedValue::Bool(_), other) | (other, _) => {
            Err(EngineError::type_mismatch("bool", other.type_name()))
        }
    }
}

fn kleene_or(lhs: TypedValue, rhs: TypedValue) -> EngineResult<TypedValue> {
    match (&lhs, &rhs) {
        (TypedValue::Bool(true), _) | (_, TypedValue::Bool(true)) => Ok(TypedValue::Bool(true)),
        (TypedValue::Null, other) | (other, TypedValue::Null) => match other {
            TypedValue::Null | TypedValue::Bool(_) => Ok(TypedValue::Null),
            other => Err(EngineError::type_mismatch("bool", other.type_name())),
        },
        (TypedValue::Bool(false), TypedValue::Bool(false)) => Ok(TypedValue::Bool(false)),
        (TypedValue::Bool(_), other) | (other, _) => {
            Err(EngineError::type_mismatch("bool", other.type_name()))
        }
    }
}

fn compare(op: CmpOp, lhs: &TypedValue, rhs: &TypedValue) -> EngineResult<TypedValue> {
    match op {
        CmpOp::Eq => Ok(lhs.logical_eq(rhs)),
        CmpOp::Ne => match lhs.logical_eq(rhs) {
            TypedValue::Bool(v) => Ok(TypedValue::Bool(!v)),
            other => Ok(other),
        },
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            if lhs.is_null() || rhs.is_null() {
                return Ok(TypedValue::Null);
            }
            let ordering = ordered_compare(lhs, rhs)?;
            let holds = match op {
                CmpOp::Lt => ordering == std::cmp::Ordering::Less,
                CmpOp::Le => ordering != std::cmp::Ordering::Greater,
                CmpOp::Gt => ordering == std::cmp::Ordering::Greater,
                CmpOp::Ge => ordering != std::cmp::Ordering::Less,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            };
            Ok(TypedValue::Bool(holds))
        }
    }
}
