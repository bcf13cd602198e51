//! The `Aggregate` operator.

use std::collections::HashMap;

use quiver_core::{EngineError, EngineResult};
use quiver_graph::View;

use crate::eval::Evaluator;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{BoxedCursor, Cursor};
use crate::frame::Frame;
use crate::plan::{AggregateNode, AggregationElement, AggregationOp};
use crate::value::{ordered_compare, RowKey, TypedValue};

/// One group's accumulation state.
struct Group {
    values: Vec<TypedValue>,
    counts: Vec<i64>,
    remember: Vec<TypedValue>,
}

/// Hash aggregation keyed by the group-by expressions under null-aware
/// equality.
///
/// Null inputs are skipped (except for `count(*)`, which has no input
/// expression). With no input rows and no group-by, a single row of
/// default values is produced: zero for `count`, null for the numeric
/// aggregates, empty containers for `collect`.
pub struct AggregateCursor {
    node: AggregateNode,
    input: BoxedCursor,
    group_index: HashMap<RowKey, usize>,
    groups: Vec<Group>,
    pulled_all: bool,
    produced_default: bool,
    out_index: usize,
}

impl AggregateCursor {
    /// Creates the cursor.
    #[must_use]
    pub fn new(node: AggregateNode, input: BoxedCursor) -> Self {
        Self {
            node,
            input,
            group_index: HashMap::new(),
            groups: Vec::new(),
            pulled_all: false,
            produced_default: false,
            out_index: 0,
        }
    }

    fn process_all(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<()> {
        while self.input.pull(frame, ctx)? {
            ctx.check_abort()?;
            self.process_one(frame, ctx)?;
        }

        // Averages were summed so far; divide at finalisation.
        for (index, element) in self.node.aggregations.iter().enumerate() {
            if element.op != AggregationOp::Avg {
                continue;
            }
            for group in &mut self.groups {
                let count = group.counts[index];
                if count > 0 {
                    group.values[index] =
                        group.values[index].divide(&TypedValue::Double(count as f64))?;
                }
            }
        }
        Ok(())
    }

    fn process_one(&mut self, frame: &Frame, ctx: &ExecutionContext) -> EngineResult<()> {
        let evaluator = Evaluator::new(frame, &ctx.parameters, &ctx.tx, View::New);
        let key = RowKey(
            self.node
                .group_by
                .iter()
                .map(|expression| evaluator.eval(expression))
                .collect::<EngineResult<_>>()?,
        );

        let index = match self.group_index.get(&key) {
            Some(index) => *index,
            None => {
                let group = Group {
                    values: self.node.aggregations.iter().map(default_value).collect(),
                    counts: vec![0; self.node.aggregations.len()],
                    remember: self
                        .node
                        .remember
                        .iter()
                        .map(|symbol| frame[symbol].clone())
                        .collect(),
                };
                self.groups.push(group);
                let index = self.groups.len() - 1;
                self.group_index.insert(key, index);
                index
            }
        };

        let group = &mut self.groups[index];
        for (position, element) in self.node.aggregations.iter().enumerate() {
            update_element(group, position, element, &evaluator)?;
        }
        Ok(())
    }
}

/// The default result of an aggregation: valid both as the zero-input
/// answer and as the starting accumulator.
fn default_value(element: &AggregationElement) -> TypedValue {
    match element.op {
        AggregationOp::Count => TypedValue::Int(0),
        AggregationOp::Sum | AggregationOp::Avg | AggregationOp::Min | AggregationOp::Max => {
            TypedValue::Null
        }
        AggregationOp::CollectList => TypedValue::List(Vec::new()),
        AggregationOp::CollectMap => TypedValue::Map(Default::default()),
    }
}

fn update_element(
    group: &mut Group,
    position: usize,
    element: &AggregationElement,
    evaluator: &Evaluator<'_>,
) -> EngineResult<()> {
    // count(*) is the only aggregation without an input expression.
    let Some(expression) = &element.value else {
        group.counts[position] += 1;
        group.values[position] = TypedValue::Int(group.counts[position]);
        return Ok(());
    };

    let input = evaluator.eval(expression)?;
    if input.is_null() {
        return Ok(());
    }
    group.counts[position] += 1;

    if group.counts[position] == 1 {
        match element.op {
            AggregationOp::Min | AggregationOp::Max => {
                ensure_min_max(&input)?;
                group.values[position] = input;
            }
            AggregationOp::Sum | AggregationOp::Avg => {
                ensure_sum_avg(&input)?;
                group.values[position] = input;
            }
            AggregationOp::Count => group.values[position] = TypedValue::Int(1),
            AggregationOp::CollectList => group.values[position].as_list_mut()?.push(input),
            AggregationOp::CollectMap => {
                let key = collect_map_key(element, evaluator)?;
                if let TypedValue::Map(entries) = &mut group.values[position] {
                    entries.insert(key, input);
                }
            }
        }
        return Ok(());
    }

    match element.op {
        AggregationOp::Count => group.values[position] = TypedValue::Int(group.counts[position]),
        AggregationOp::Min => {
            ensure_min_max(&input)?;
            let current = &group.values[position];
            let replace = ordered_compare(&input, current).map_err(|_| min_max_error("MIN", &input, current))?;
            if replace == std::cmp::Ordering::Less {
                group.values[position] = input;
            }
        }
        AggregationOp::Max => {
            ensure_min_max(&input)?;
            let current = &group.values[position];
            let replace = ordered_compare(&input, current).map_err(|_| min_max_error("MAX", &input, current))?;
            if replace == std::cmp::Ordering::Greater {
                group.values[position] = input;
            }
        }
        AggregationOp::Sum | AggregationOp::Avg => {
            ensure_sum_avg(&input)?;
            group.values[position] = group.values[position].add(&input)?;
        }
        AggregationOp::CollectList => group.values[position].as_list_mut()?.push(input),
        AggregationOp::CollectMap => {
            let key = collect_map_key(element, evaluator)?;
            if let TypedValue::Map(entries) = &mut group.values[position] {
                entries.insert(key, input);
            }
        }
    }
    Ok(())
}

fn collect_map_key(
    element: &AggregationElement,
    evaluator: &Evaluator<'_>,
) -> EngineResult<String> {
    let expression = element
        .key
        .as_ref()
        .ok_or_else(|| EngineError::query("collect-map aggregation is missing its key"))?;
    match evaluator.eval(expression)? {
        TypedValue::String(key) => Ok(key),
        other => Err(EngineError::query(format!("map key must be a string, got {}", other.type_name()))),
    }
}

fn ensure_min_max(value: &TypedValue) -> EngineResult<()> {
    match value {
        TypedValue::Bool(_) | TypedValue::Int(_) | TypedValue::Double(_)
        | TypedValue::String(_) => Ok(()),
        other => Err(EngineError::query(format!(
            "only bool, int, double and string values are allowed in MIN and MAX aggregations, got {}",
            other.type_name()
        ))),
    }
}

fn ensure_sum_avg(value: &TypedValue) -> EngineResult<()> {
    if value.is_numeric() {
        Ok(())
    } else {
        Err(EngineError::query(format!(
            "only numeric values are allowed in SUM and AVG aggregations, got {}",
            value.type_name()
        )))
    }
}

fn min_max_error(what: &str, input: &TypedValue, current: &TypedValue) -> EngineError {
    EngineError::query(format!(
        "unable to get {what} of {} and {}",
        input.type_name(),
        current.type_name()
    ))
}

impl Cursor for AggregateCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &mut ExecutionContext) -> EngineResult<bool> {
        if !self.pulled_all {
            self.process_all(frame, ctx)?;
            self.pulled_all = true;
            self.out_index = 0;

            // No input and no grouping still answers: one row of
            // defaults, remember symbols null.
            if self.groups.is_empty() && self.node.group_by.is_empty() && !self.produced_default {
                self.produced_default = true;
                for element in &self.node.aggregations {
                    frame[&element.output] = default_value(element);
                }
                for symbol in &self.node.remember {
                    frame[symbol] = TypedValue::Null;
                }
                return Ok(true);
            }
        }

        if self.out_index >= self.groups.len() {
            return Ok(false);
        }
        let group = &self.groups[self.out_index];
        for (element, value) in self.node.aggregations.iter().zip(&group.values) {
            frame[&element.output] = value.clone();
        }
        for (symbol, value) in self.node.remember.iter().zip(&group.remember) {
            frame[symbol] = value.clone();
        }
        self.out_index += 1;
        Ok(true)
    }

    fn reset(&mut self) -> EngineResult<()> {
        self.input.reset()?;
        self.group_index.clear();
        self.groups.clear();
        self.pulled_all = false;
        self.produced_default = false;
        self.out_index = 0;
        Ok(())
    }
}
