//! Plan tree walks.

use std::fmt;

use quiver_core::PlanId;

use super::PlanNode;

/// A pre/post-order visitor over the plan tree.
///
/// `pre_visit` returning false skips the node's children; `post_visit`'s
/// return value is forwarded by [`PlanNode::accept`] and conventionally
/// signals whether the walk should continue at the parent.
pub trait PlanVisitor {
    /// Called before a node's children.
    fn pre_visit(&mut self, _node: &PlanNode) -> bool {
        true
    }

    /// Called after a node's children.
    fn post_visit(&mut self, _node: &PlanNode) -> bool {
        true
    }
}

/// Collects the plan ids of every `PullRemote` in the tree, in visiting
/// order. Used to dispatch worker-side plans before execution and to
/// tear them down afterwards.
#[must_use]
pub fn collect_plan_ids(plan: &PlanNode) -> Vec<PlanId> {
    struct Collector(Vec<PlanId>);

    impl PlanVisitor for Collector {
        fn pre_visit(&mut self, node: &PlanNode) -> bool {
            if let PlanNode::PullRemote(n) = node {
                self.0.push(n.plan_id);
            }
            true
        }
    }

    let mut collector = Collector(Vec::new());
    plan.accept(&mut collector);
    collector.0
}

impl fmt::Display for PlanNode {
    /// Renders the plan as an indented operator tree, one operator per
    /// line, children indented below their parent.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(node: &PlanNode, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for _ in 0..depth {
                f.write_str("  ")?;
            }
            f.write_str("* ")?;
            f.write_str(node.name())?;
            match node {
                PlanNode::ScanAllByLabel(n) => write!(f, " ({})", n.label)?,
                PlanNode::ScanAllByLabelPropertyValue(n) => {
                    write!(f, " ({}.{})", n.label, n.property)?;
                }
                PlanNode::ScanAllByLabelPropertyRange(n) => {
                    write!(f, " ({}.{})", n.label, n.property)?;
                }
                PlanNode::PullRemote(n) => write!(f, " ({})", n.plan_id)?,
                _ => {}
            }
            f.write_str("\n")?;
            for child in node.children() {
                render(child, depth + 1, f)?;
            }
            Ok(())
        }
        render(self, 0, f)
    }
}
