//! The cursor factory.
//!
//! Folds the immutable plan tree into a matching tree of cursors. The
//! fold clones each node's configuration into its cursor; subtrees
//! behind `Arc`s stay shared with dispatched copies of the plan.

use quiver_core::EngineResult;

use crate::exec::cursor::BoxedCursor;
use crate::exec::operators::{
    AccumulateCursor, AggregateCursor, CartesianCursor, ConstructNamedPathCursor,
    CreateExpandCursor, CreateIndexCursor, CreateNodeCursor, DeleteCursor, DistinctCursor,
    ExpandBreadthFirstCursor, ExpandCursor, ExpandUniquenessFilterCursor, ExpandVariableCursor,
    ExpandWeightedShortestPathCursor, FilterCursor, LimitCursor, MergeCursor, OnceCursor,
    OptionalCursor, OrderByCursor, ProduceCursor, PullRemoteCursor, RemoveLabelsCursor,
    RemovePropertyCursor, ScanAllCursor, SetLabelsCursor, SetPropertiesCursor, SetPropertyCursor,
    SkipCursor, SynchronizeCursor, UnionCursor, UnwindCursor,
};
use crate::plan::{ExpansionKind, PlanNode, PlanRef};

/// Builds the cursor tree for a plan.
pub fn make_cursor(plan: &PlanRef) -> EngineResult<BoxedCursor> {
    Ok(match plan.as_ref() {
        PlanNode::Once => Box::new(OnceCursor::new()),
        PlanNode::CreateNode(n) => {
            Box::new(CreateNodeCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::CreateExpand(n) => {
            Box::new(CreateExpandCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::ScanAll(n) => Box::new(ScanAllCursor::all(n.clone(), make_cursor(&n.input)?)),
        PlanNode::ScanAllByLabel(n) => {
            Box::new(ScanAllCursor::by_label(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::ScanAllByLabelPropertyRange(n) => {
            Box::new(ScanAllCursor::by_range(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::ScanAllByLabelPropertyValue(n) => {
            Box::new(ScanAllCursor::by_value(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::Expand(n) => Box::new(ExpandCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::ExpandVariable(n) => {
            let input = make_cursor(&n.input)?;
            match n.kind {
                ExpansionKind::DepthFirst => Box::new(ExpandVariableCursor::new(n.clone(), input)),
                ExpansionKind::BreadthFirst => {
                    Box::new(ExpandBreadthFirstCursor::new(n.clone(), input))
                }
                ExpansionKind::WeightedShortestPath => {
                    Box::new(ExpandWeightedShortestPathCursor::new(n.clone(), input)?)
                }
            }
        }
        PlanNode::ConstructNamedPath(n) => {
            Box::new(ConstructNamedPathCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::ExpandUniquenessFilter(n) => {
            Box::new(ExpandUniquenessFilterCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::Filter(n) => Box::new(FilterCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::Produce(n) => Box::new(ProduceCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::Delete(n) => Box::new(DeleteCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::SetProperty(n) => {
            Box::new(SetPropertyCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::SetProperties(n) => {
            Box::new(SetPropertiesCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::SetLabels(n) => Box::new(SetLabelsCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::RemoveProperty(n) => {
            Box::new(RemovePropertyCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::RemoveLabels(n) => {
            Box::new(RemoveLabelsCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::Accumulate(n) => {
            Box::new(AccumulateCursor::new(n.clone(), make_cursor(&n.input)?))
        }
        PlanNode::Aggregate(n) => Box::new(AggregateCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::Skip(n) => Box::new(SkipCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::Limit(n) => Box::new(LimitCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::OrderBy(n) => Box::new(OrderByCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::Merge(n) => Box::new(MergeCursor::new(
            make_cursor(&n.input)?,
            make_cursor(&n.merge_match)?,
            make_cursor(&n.merge_create)?,
        )),
        PlanNode::Optional(n) => Box::new(OptionalCursor::new(
            n.clone(),
            make_cursor(&n.input)?,
            make_cursor(&n.optional)?,
        )),
        PlanNode::Unwind(n) => Box::new(UnwindCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::Distinct(n) => Box::new(DistinctCursor::new(n.clone(), make_cursor(&n.input)?)),
        PlanNode::CreateIndex(n) => Box::new(CreateIndexCursor::new(n.clone())),
        PlanNode::Union(n) => Box::new(UnionCursor::new(
            n.clone(),
            make_cursor(&n.left)?,
            make_cursor(&n.right)?,
        )),
        PlanNode::Cartesian(n) => Box::new(CartesianCursor::new(
            n.clone(),
            make_cursor(&n.left)?,
            make_cursor(&n.right)?,
        )),
        PlanNode::PullRemote(n) => {
            let input = match &n.input {
                Some(input) => Some(make_cursor(input)?),
                None => None,
            };
            Box::new(PullRemoteCursor::new(n.clone(), input))
        }
        PlanNode::Synchronize(n) => {
            let input = make_cursor(&n.input)?;
            let pull_remote = match &n.pull_remote {
                Some(plan) => Some(make_cursor(plan)?),
                None => None,
            };
            Box::new(SynchronizeCursor::new(n.clone(), input, pull_remote)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::tests::{seeded_context, symbol};
    use crate::expr::Expr;
    use crate::frame::Frame;
    use crate::plan::{
        AggregateNode, AggregationElement, AggregationOp, NamedExpr, ProduceNode, ScanAllNode,
    };
    use quiver_graph::View;
    use std::sync::Arc;

    #[test]
    fn builds_and_runs_a_composed_plan() {
        // Produce(Aggregate(count(*), ScanAll(n)))
        let mut ctx = seeded_context(|tx| {
            for _ in 0..3 {
                tx.insert_vertex();
            }
        });
        let n = symbol(0);
        let count = symbol(1);
        let out = symbol(2);

        let plan: PlanRef = Arc::new(PlanNode::Produce(ProduceNode {
            input: Arc::new(PlanNode::Aggregate(AggregateNode {
                input: Arc::new(PlanNode::ScanAll(ScanAllNode {
                    input: PlanNode::once(),
                    output: n,
                    view: View::Old,
                })),
                aggregations: vec![AggregationElement {
                    value: None,
                    key: None,
                    op: AggregationOp::Count,
                    output: count.clone(),
                }],
                group_by: vec![],
                remember: vec![],
            })),
            named_expressions: vec![NamedExpr {
                symbol: out.clone(),
                expression: Expr::ident(count),
            }],
        }));

        let mut cursor = make_cursor(&plan).unwrap();
        let mut frame = Frame::new(3);

        // The scan sees the old view: nothing is visible yet.
        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        assert_eq!(frame[&out].as_int().unwrap(), 0);
        assert!(!cursor.pull(&mut frame, &mut ctx).unwrap());

        // After an advance the same plan counts all three vertices.
        ctx.tx.advance_command();
        let mut cursor = make_cursor(&plan).unwrap();
        assert!(cursor.pull(&mut frame, &mut ctx).unwrap());
        assert_eq!(frame[&out].as_int().unwrap(), 3);
    }
}
