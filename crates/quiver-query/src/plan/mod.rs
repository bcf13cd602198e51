//! The immutable operator tree.
//!
//! A plan is a tree of [`PlanNode`]s produced by the (external) planner.
//! Each variant carries a configuration struct with public fields;
//! children are shared [`PlanRef`]s so that subtrees can be shipped to
//! workers under a [`PlanId`] without copying.
//!
//! The tree knows which symbols its operators write
//! ([`modified_symbols`](PlanNode::modified_symbols)) and which symbols
//! its rows expose ([`output_symbols`](PlanNode::output_symbols)); the
//! cursor factory lives in [`exec`](crate::exec).

pub mod visitor;

pub use visitor::{collect_plan_ids, PlanVisitor};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quiver_core::{EdgeTypeName, Label, PlanId, PropertyKey, Symbol};
use quiver_graph::View;

use crate::expr::Expr;

/// A shared reference to a plan subtree.
pub type PlanRef = Arc<PlanNode>;

/// The direction of an edge expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Follow incoming edges.
    In,
    /// Follow outgoing edges.
    Out,
    /// Follow both.
    Both,
}

/// The traversal algorithm of a variable-length expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpansionKind {
    /// Bounded depth-first enumeration of all paths.
    DepthFirst,
    /// Layered breadth-first search, each vertex visited once.
    BreadthFirst,
    /// Dijkstra; requires a weight lambda and a total-weight symbol.
    WeightedShortestPath,
}

/// Which accessor kind an expansion-uniqueness filter compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniquenessKind {
    /// Vertex identity.
    Vertex,
    /// Edge identity, including membership in edge lists.
    Edge,
}

/// How `SetProperties` treats properties already on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertiesOp {
    /// Clear existing properties first.
    Replace,
    /// Keep existing properties.
    Update,
}

/// Sort direction of one `ORDER BY` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// An aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationOp {
    /// Row or value count.
    Count,
    /// Numeric sum.
    Sum,
    /// Numeric average.
    Avg,
    /// Minimum over bool, int, double, string.
    Min,
    /// Maximum over bool, int, double, string.
    Max,
    /// Collect values into a list.
    CollectList,
    /// Collect values into a map keyed by a string expression.
    CollectMap,
}

/// One aggregation of an [`AggregateNode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationElement {
    /// The aggregated expression; absent only for `count(*)`.
    pub value: Option<Expr>,
    /// The map key expression of `CollectMap`.
    pub key: Option<Expr>,
    /// The aggregation function.
    pub op: AggregationOp,
    /// The symbol the result binds to.
    pub output: Symbol,
}

/// A vertex pattern of a `CREATE` or `MERGE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAtom {
    /// The symbol the created vertex binds to.
    pub symbol: Symbol,
    /// Labels set on creation.
    pub labels: Vec<Label>,
    /// Properties set on creation, evaluated per row.
    pub properties: Vec<(PropertyKey, Expr)>,
}

/// An edge pattern of a `CREATE` or `MERGE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeAtom {
    /// The symbol the created edge binds to.
    pub symbol: Symbol,
    /// The single edge type a created edge carries.
    pub edge_type: EdgeTypeName,
    /// Creation direction; `Both` is treated as `Out`.
    pub direction: Direction,
    /// Properties set on creation, evaluated per row.
    pub properties: Vec<(PropertyKey, Expr)>,
}

/// An inclusive or exclusive range bound, evaluated per input row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bound {
    /// The bound expression.
    pub value: Expr,
    /// Whether the bound itself is part of the range.
    pub inclusive: bool,
}

/// A lambda binding `(inner_edge, inner_node)` during expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lambda {
    /// The symbol the candidate edge binds to.
    pub inner_edge: Symbol,
    /// The symbol the candidate vertex binds to.
    pub inner_node: Symbol,
    /// The lambda body; an absent filter body accepts everything.
    pub expression: Option<Expr>,
}

/// One projected column of a [`ProduceNode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedExpr {
    /// The output symbol the value binds to.
    pub symbol: Symbol,
    /// The projected expression.
    pub expression: Expr,
}

/// Creates one vertex per input row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeNode {
    /// The input plan.
    pub input: PlanRef,
    /// The vertex pattern.
    pub node: NodeAtom,
    /// Place the vertex on a uniformly chosen cluster member.
    pub on_random_worker: bool,
}

/// Creates an edge (and possibly its far endpoint) per input row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExpandNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol holding the origin vertex.
    pub input_symbol: Symbol,
    /// The far endpoint's pattern.
    pub node: NodeAtom,
    /// The created edge's pattern.
    pub edge: EdgeAtom,
    /// The far endpoint already exists on the frame.
    pub existing_node: bool,
}

/// Enumerates all vertices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAllNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol each vertex binds to.
    pub output: Symbol,
    /// The command view scanned.
    pub view: View,
}

/// Enumerates vertices carrying a label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAllByLabelNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol each vertex binds to.
    pub output: Symbol,
    /// The required label.
    pub label: Label,
    /// The command view scanned.
    pub view: View,
}

/// Enumerates vertices in a property range. At least one bound is
/// present; a bound evaluating to null short-circuits the input row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAllByLabelPropertyRangeNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol each vertex binds to.
    pub output: Symbol,
    /// The required label.
    pub label: Label,
    /// The filtered property.
    pub property: PropertyKey,
    /// The lower bound.
    pub lower: Option<Bound>,
    /// The upper bound.
    pub upper: Option<Bound>,
    /// The command view scanned.
    pub view: View,
}

/// Enumerates vertices whose property equals an expression, evaluated
/// per input row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAllByLabelPropertyValueNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol each vertex binds to.
    pub output: Symbol,
    /// The required label.
    pub label: Label,
    /// The filtered property.
    pub property: PropertyKey,
    /// The matched value.
    pub expression: Expr,
    /// The command view scanned.
    pub view: View,
}

/// Single-step edge expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol holding the vertex expanded from.
    pub input_symbol: Symbol,
    /// The symbol the reached vertex binds to.
    pub node_symbol: Symbol,
    /// The symbol the traversed edge binds to.
    pub edge_symbol: Symbol,
    /// The expansion direction.
    pub direction: Direction,
    /// Admitted edge types; empty admits all.
    pub edge_types: Vec<EdgeTypeName>,
    /// The reached vertex must equal the value already on the frame.
    pub existing_node: bool,
    /// The command view traversed.
    pub view: View,
}

/// Variable-length expansion (depth-first, breadth-first, or weighted
/// shortest path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandVariableNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol holding the vertex expanded from.
    pub input_symbol: Symbol,
    /// The symbol the reached vertex binds to.
    pub node_symbol: Symbol,
    /// The symbol the traversed edge *list* binds to.
    pub edge_symbol: Symbol,
    /// The traversal algorithm.
    pub kind: ExpansionKind,
    /// The expansion direction.
    pub direction: Direction,
    /// Admitted edge types; empty admits all.
    pub edge_types: Vec<EdgeTypeName>,
    /// Maintain the edge list back-to-front (depth-first only).
    pub is_reverse: bool,
    /// Minimum path length; defaults to 1.
    pub lower_bound: Option<Expr>,
    /// Maximum path length; defaults to unbounded.
    pub upper_bound: Option<Expr>,
    /// The expansion filter lambda.
    pub filter: Lambda,
    /// The weight lambda (weighted shortest path only).
    pub weight: Option<Lambda>,
    /// The symbol the cumulative weight binds to.
    pub total_weight: Option<Symbol>,
    /// The reached vertex must equal the value already on the frame.
    pub existing_node: bool,
    /// The command view traversed.
    pub view: View,
}

/// Builds a named path from previously bound pattern symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructNamedPathNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol the path binds to.
    pub path_symbol: Symbol,
    /// The alternating pattern symbols, starting with a vertex.
    pub path_elements: Vec<Symbol>,
}

/// Filters rows where the expansion value collides with earlier pattern
/// values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandUniquenessFilterNode {
    /// The input plan.
    pub input: PlanRef,
    /// The compared accessor kind.
    pub kind: UniquenessKind,
    /// The just-expanded symbol.
    pub expand_symbol: Symbol,
    /// Earlier symbols it must not collide with.
    pub previous_symbols: Vec<Symbol>,
}

/// Keeps rows whose predicate holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterNode {
    /// The input plan.
    pub input: PlanRef,
    /// The predicate, evaluated in the old view; null is false.
    pub expression: Expr,
}

/// Projects named expressions onto output symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduceNode {
    /// The input plan.
    pub input: PlanRef,
    /// The projection, evaluated in the new view.
    pub named_expressions: Vec<NamedExpr>,
}

/// Deletes the vertices and edges the expressions evaluate to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNode {
    /// The input plan.
    pub input: PlanRef,
    /// The deleted values; edges are deleted before vertices.
    pub expressions: Vec<Expr>,
    /// Also delete the incident edges of deleted vertices.
    pub detach: bool,
}

/// Sets one property on the record an expression evaluates to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPropertyNode {
    /// The input plan.
    pub input: PlanRef,
    /// The record holding the property.
    pub object: Expr,
    /// The property key.
    pub key: PropertyKey,
    /// The assigned value.
    pub value: Expr,
}

/// Replaces or updates all properties on a record from a map, vertex,
/// or edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPropertiesNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol holding the mutated record.
    pub input_symbol: Symbol,
    /// The source of the new properties.
    pub rhs: Expr,
    /// Replace or update.
    pub op: PropertiesOp,
}

/// Adds labels to a vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLabelsNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol holding the vertex.
    pub input_symbol: Symbol,
    /// The added labels.
    pub labels: Vec<Label>,
}

/// Removes one property from the record an expression evaluates to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovePropertyNode {
    /// The input plan.
    pub input: PlanRef,
    /// The record holding the property.
    pub object: Expr,
    /// The property key.
    pub key: PropertyKey,
}

/// Removes labels from a vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveLabelsNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbol holding the vertex.
    pub input_symbol: Symbol,
    /// The removed labels.
    pub labels: Vec<Label>,
}

/// Buffers the whole input, optionally advancing the command before
/// streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulateNode {
    /// The input plan.
    pub input: PlanRef,
    /// The symbols whose values are buffered.
    pub symbols: Vec<Symbol>,
    /// Advance the command and reconstruct buffered values before
    /// streaming.
    pub advance_command: bool,
}

/// Hash aggregation with optional grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateNode {
    /// The input plan.
    pub input: PlanRef,
    /// The computed aggregations.
    pub aggregations: Vec<AggregationElement>,
    /// The group-by key expressions.
    pub group_by: Vec<Expr>,
    /// Symbols captured from each group's first row.
    pub remember: Vec<Symbol>,
}

/// Skips the first `n` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipNode {
    /// The input plan.
    pub input: PlanRef,
    /// The skip count, evaluated once on first pull.
    pub expression: Expr,
}

/// Stops after `n` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitNode {
    /// The input plan.
    pub input: PlanRef,
    /// The limit, evaluated once before the first input pull.
    pub expression: Expr,
}

/// Materialises and sorts the whole input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderByNode {
    /// The input plan.
    pub input: PlanRef,
    /// The sort keys, most significant first.
    pub order_by: Vec<(SortDirection, Expr)>,
    /// The symbols carried through the sort.
    pub output_symbols: Vec<Symbol>,
}

/// `MERGE`: forwards matched rows, creating exactly once when the match
/// is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeNode {
    /// The input plan.
    pub input: PlanRef,
    /// The match branch, reset per input row.
    pub merge_match: PlanRef,
    /// The create branch; must always produce exactly one row.
    pub merge_create: PlanRef,
}

/// `OPTIONAL MATCH`: forwards inner rows, or one row of nulls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionalNode {
    /// The input plan.
    pub input: PlanRef,
    /// The optional branch, reset per input row.
    pub optional: PlanRef,
    /// Symbols nulled when the branch yields nothing.
    pub optional_symbols: Vec<Symbol>,
}

/// Yields one row per element of a list expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnwindNode {
    /// The input plan.
    pub input: PlanRef,
    /// The list expression, evaluated once per input row.
    pub input_expression: Expr,
    /// The symbol each element binds to.
    pub output_symbol: Symbol,
}

/// Keeps the first row of every distinct projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistinctNode {
    /// The input plan.
    pub input: PlanRef,
    /// The projected symbols.
    pub value_symbols: Vec<Symbol>,
}

/// Builds a label+property index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndexNode {
    /// The indexed label.
    pub label: Label,
    /// The indexed property.
    pub property: PropertyKey,
}

/// Concatenates two inputs, mapping their columns onto shared output
/// symbols by name.
///
/// The operator never deduplicates; the planner wraps a `UNION` without
/// `ALL` in an outer `Distinct` over the union symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionNode {
    /// The left input, drained first.
    pub left: PlanRef,
    /// The right input.
    pub right: PlanRef,
    /// The shared output symbols.
    pub union_symbols: Vec<Symbol>,
    /// The left input's columns.
    pub left_symbols: Vec<Symbol>,
    /// The right input's columns.
    pub right_symbols: Vec<Symbol>,
}

/// The cross product of two inputs; the left side is materialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesianNode {
    /// The materialised input.
    pub left: PlanRef,
    /// The streamed input.
    pub right: PlanRef,
    /// The left input's symbols, restored per output row.
    pub left_symbols: Vec<Symbol>,
    /// The right input's symbols, restored per output row.
    pub right_symbols: Vec<Symbol>,
}

/// Streams rows produced by every worker's dispatched plan, round-robin,
/// interleaved with local rows from `input`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRemoteNode {
    /// The master-local part of the plan, if any.
    pub input: Option<PlanRef>,
    /// The id the worker-side plan was dispatched under.
    pub plan_id: PlanId,
    /// The symbols shipped back per row.
    pub symbols: Vec<Symbol>,
}

/// The accumulation barrier: drains the pipeline on every worker,
/// replays deferred updates, then streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizeNode {
    /// The master-local part of the plan.
    pub input: PlanRef,
    /// The remote stream drained and later forwarded; must be a
    /// [`PullRemoteNode`] when present.
    pub pull_remote: Option<PlanRef>,
    /// Advance the command after accumulation so the barrier's writes
    /// become readable.
    pub advance_command: bool,
}

/// One operator of the immutable plan tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanNode {
    /// Yields exactly one empty row; the implicit source of
    /// mutation-only plans.
    Once,
    /// See [`CreateNodeNode`].
    CreateNode(CreateNodeNode),
    /// See [`CreateExpandNode`].
    CreateExpand(CreateExpandNode),
    /// See [`ScanAllNode`].
    ScanAll(ScanAllNode),
    /// See [`ScanAllByLabelNode`].
    ScanAllByLabel(ScanAllByLabelNode),
    /// See [`ScanAllByLabelPropertyRangeNode`].
    ScanAllByLabelPropertyRange(ScanAllByLabelPropertyRangeNode),
    /// See [`ScanAllByLabelPropertyValueNode`].
    ScanAllByLabelPropertyValue(ScanAllByLabelPropertyValueNode),
    /// See [`ExpandNode`].
    Expand(ExpandNode),
    /// See [`ExpandVariableNode`].
    ExpandVariable(ExpandVariableNode),
    /// See [`ConstructNamedPathNode`].
    ConstructNamedPath(ConstructNamedPathNode),
    /// See [`ExpandUniquenessFilterNode`].
    ExpandUniquenessFilter(ExpandUniquenessFilterNode),
    /// See [`FilterNode`].
    Filter(FilterNode),
    /// See [`ProduceNode`].
    Produce(ProduceNode),
    /// See [`DeleteNode`].
    Delete(DeleteNode),
    /// See [`SetPropertyNode`].
    SetProperty(SetPropertyNode),
    /// See [`SetPropertiesNode`].
    SetProperties(SetPropertiesNode),
    /// See [`SetLabelsNode`].
    SetLabels(SetLabelsNode),
    /// See [`RemovePropertyNode`].
    RemoveProperty(RemovePropertyNode),
    /// See [`RemoveLabelsNode`].
    RemoveLabels(RemoveLabelsNode),
    /// See [`AccumulateNode`].
    Accumulate(AccumulateNode),
    /// See [`AggregateNode`].
    Aggregate(AggregateNode),
    /// See [`SkipNode`].
    Skip(SkipNode),
    /// See [`LimitNode`].
    Limit(LimitNode),
    /// See [`OrderByNode`].
    OrderBy(OrderByNode),
    /// See [`MergeNode`].
    Merge(MergeNode),
    /// See [`OptionalNode`].
    Optional(OptionalNode),
    /// See [`UnwindNode`].
    Unwind(UnwindNode),
    /// See [`DistinctNode`].
    Distinct(DistinctNode),
    /// See [`CreateIndexNode`].
    CreateIndex(CreateIndexNode),
    /// See [`UnionNode`].
    Union(UnionNode),
    /// See [`CartesianNode`].
    Cartesian(CartesianNode),
    /// See [`PullRemoteNode`].
    PullRemote(PullRemoteNode),
    /// See [`SynchronizeNode`].
    Synchronize(SynchronizeNode),
}

impl PlanNode {
    /// A shared `Once` leaf, the default input of source-less operators.
    #[must_use]
    pub fn once() -> PlanRef {
        Arc::new(Self::Once)
    }

    /// Returns the operator's display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Once => "Once",
            Self::CreateNode(_) => "CreateNode",
            Self::CreateExpand(_) => "CreateExpand",
            Self::ScanAll(_) => "ScanAll",
            Self::ScanAllByLabel(_) => "ScanAllByLabel",
            Self::ScanAllByLabelPropertyRange(_) => "ScanAllByLabelPropertyRange",
            Self::ScanAllByLabelPropertyValue(_) => "ScanAllByLabelPropertyValue",
            Self::Expand(_) => "Expand",
            Self::ExpandVariable(_) => "ExpandVariable",
            Self::ConstructNamedPath(_) => "ConstructNamedPath",
            Self::ExpandUniquenessFilter(_) => "ExpandUniquenessFilter",
            Self::Filter(_) => "Filter",
            Self::Produce(_) => "Produce",
            Self::Delete(_) => "Delete",
            Self::SetProperty(_) => "SetProperty",
            Self::SetProperties(_) => "SetProperties",
            Self::SetLabels(_) => "SetLabels",
            Self::RemoveProperty(_) => "RemoveProperty",
            Self::RemoveLabels(_) => "RemoveLabels",
            Self::Accumulate(_) => "Accumulate",
            Self::Aggregate(_) => "Aggregate",
            Self::Skip(_) => "Skip",
            Self::Limit(_) => "Limit",
            Self::OrderBy(_) => "OrderBy",
            Self::Merge(_) => "Merge",
            Self::Optional(_) => "Optional",
            Self::Unwind(_) => "Unwind",
            Self::Distinct(_) => "Distinct",
            Self::CreateIndex(_) => "CreateIndex",
            Self::Union(_) => "Union",
            Self::Cartesian(_) => "Cartesian",
            Self::PullRemote(_) => "PullRemote",
            Self::Synchronize(_) => "Synchronize",
        }
    }

    /// Returns the operator's children in visiting order.
    #[must_use]
    pub fn children(&self) -> Vec<&PlanRef> {
        match self {
            Self::Once | Self::CreateIndex(_) => Vec::new(),
            Self::CreateNode(n) => vec![&n.input],
            Self::CreateExpand(n) => vec![&n.input],
            Self::ScanAll(n) => vec![&n.input],
            Self::ScanAllByLabel(n) => vec![&n.input],
            Self::ScanAllByLabelPropertyRange(n) => vec![&n.input],
            Self::ScanAllByLabelPropertyValue(n) => vec![&n.input],
            Self::Expand(n) => vec![&n.input],
            Self::ExpandVariable(n) => vec![&n.input],
            Self::ConstructNamedPath(n) => vec![&n.input],
            Self::ExpandUniquenessFilter(n) => vec![&n.input],
            Self::Filter(n) => vec![&n.input],
            Self::Produce(n) => vec![&n.input],
            Self::Delete(n) => vec![&n.input],
            Self::SetProperty(n) => vec![&n.input],
            Self::SetProperties(n) => vec![&n.input],
            Self::SetLabels(n) => vec![&n.input],
            Self::RemoveProperty(n) => vec![&n.input],
            Self::RemoveLabels(n) => vec![&n.input],
            Self::Accumulate(n) => vec![&n.input],
            Self::Aggregate(n) => vec![&n.input],
            Self::Skip(n) => vec![&n.input],
            Self::Limit(n) => vec![&n.input],
            Self::OrderBy(n) => vec![&n.input],
            Self::Merge(n) => vec![&n.input, &n.merge_match, &n.merge_create],
            Self::Optional(n) => vec![&n.input, &n.optional],
            Self::Unwind(n) => vec![&n.input],
            Self::Distinct(n) => vec![&n.input],
            Self::Union(n) => vec![&n.left, &n.right],
            Self::Cartesian(n) => vec![&n.left, &n.right],
            Self::PullRemote(n) => n.input.iter().collect(),
            Self::Synchronize(n) => {
                let mut children = vec![&n.input];
                children.extend(n.pull_remote.iter());
                children
            }
        }
    }

    /// Returns the symbols this operator (and its inputs) write.
    #[must_use]
    pub fn modified_symbols(&self) -> Vec<Symbol> {
        match self {
            Self::Once | Self::CreateIndex(_) => Vec::new(),
            Self::CreateNode(n) => {
                with_input(&n.input, [n.node.symbol.clone()])
            }
            Self::CreateExpand(n) => {
                with_input(&n.input, [n.node.symbol.clone(), n.edge.symbol.clone()])
            }
            Self::ScanAll(n) => with_input(&n.input, [n.output.clone()]),
            Self::ScanAllByLabel(n) => with_input(&n.input, [n.output.clone()]),
            Self::ScanAllByLabelPropertyRange(n) => with_input(&n.input, [n.output.clone()]),
            Self::ScanAllByLabelPropertyValue(n) => with_input(&n.input, [n.output.clone()]),
            Self::Expand(n) => {
                with_input(&n.input, [n.node_symbol.clone(), n.edge_symbol.clone()])
            }
            Self::ExpandVariable(n) => {
                let mut symbols =
                    with_input(&n.input, [n.node_symbol.clone(), n.edge_symbol.clone()]);
                symbols.extend(n.total_weight.clone());
                symbols
            }
            Self::ConstructNamedPath(n) => with_input(&n.input, [n.path_symbol.clone()]),
            Self::ExpandUniquenessFilter(n) => n.input.modified_symbols(),
            Self::Filter(n) => n.input.modified_symbols(),
            Self::Produce(n) => {
                n.named_expressions.iter().map(|ne| ne.symbol.clone()).collect()
            }
            Self::Delete(n) => n.input.modified_symbols(),
            Self::SetProperty(n) => n.input.modified_symbols(),
            Self::SetProperties(n) => n.input.modified_symbols(),
            Self::SetLabels(n) => n.input.modified_symbols(),
            Self::RemoveProperty(n) => n.input.modified_symbols(),
            Self::RemoveLabels(n) => n.input.modified_symbols(),
            Self::Accumulate(n) => n.symbols.clone(),
            Self::Aggregate(n) => {
                let mut symbols = n.remember.clone();
                symbols.extend(n.aggregations.iter().map(|a| a.output.clone()));
                symbols
            }
            Self::Skip(n) => n.input.modified_symbols(),
            Self::Limit(n) => n.input.modified_symbols(),
            Self::OrderBy(n) => n.input.modified_symbols(),
            Self::Merge(n) => {
                let mut symbols = n.input.modified_symbols();
                symbols.extend(n.merge_match.modified_symbols());
                symbols
            }
            Self::Optional(n) => {
                let mut symbols = n.input.modified_symbols();
                symbols.extend(n.optional.modified_symbols());
                symbols
            }
            Self::Unwind(n) => with_input(&n.input, [n.output_symbol.clone()]),
            Self::Distinct(n) => n.input.modified_symbols(),
            Self::Union(n) => n.union_symbols.clone(),
            Self::Cartesian(n) => {
                let mut symbols = n.left.modified_symbols();
                symbols.extend(n.right.modified_symbols());
                symbols
            }
            Self::PullRemote(n) => {
                let mut symbols = n.symbols.clone();
                if let Some(input) = &n.input {
                    symbols.extend(input.modified_symbols());
                }
                symbols
            }
            Self::Synchronize(n) => {
                let mut symbols = n.input.modified_symbols();
                if let Some(pull) = &n.pull_remote {
                    symbols.extend(pull.modified_symbols());
                }
                symbols
            }
        }
    }

    /// Returns the symbols this operator's rows expose as the plan's
    /// projection.
    #[must_use]
    pub fn output_symbols(&self) -> Vec<Symbol> {
        match self {
            Self::Produce(n) => n.named_expressions.iter().map(|ne| ne.symbol.clone()).collect(),
            Self::Union(n) => n.union_symbols.clone(),
            Self::Aggregate(n) => {
                let mut symbols: Vec<_> =
                    n.aggregations.iter().map(|a| a.output.clone()).collect();
                symbols.extend(n.remember.clone());
                symbols
            }
            Self::Skip(n) => n.input.output_symbols(),
            Self::Limit(n) => n.input.output_symbols(),
            Self::OrderBy(n) => n.input.output_symbols(),
            Self::Distinct(n) => n.input.output_symbols(),
            Self::Accumulate(n) => n.input.output_symbols(),
            Self::Synchronize(n) => n.input.output_symbols(),
            Self::PullRemote(n) => match &n.input {
                Some(input) => input.output_symbols(),
                None => n.symbols.clone(),
            },
            _ => Vec::new(),
        }
    }

    /// Walks the tree: `pre_visit`, then (unless it returned false) the
    /// children, then `post_visit`. Returns `post_visit`'s verdict.
    pub fn accept<V: PlanVisitor>(&self, visitor: &mut V) -> bool {
        if visitor.pre_visit(self) {
            for child in self.children() {
                child.accept(visitor);
            }
        }
        visitor.post_visit(self)
    }
}

fn with_input(input: &PlanRef, extra: impl IntoIterator<Item = Symbol>) -> Vec<Symbol> {
    let mut symbols = input.modified_symbols();
    symbols.extend(extra);
    symbols
}
