//! End-to-end cluster scenarios: distributed pulls, the accumulation
//! barrier, and remote creation, all over the in-process cluster.

use std::collections::BTreeMap;
use std::sync::Arc;

use quiver::{DistributedPlan, EngineConfig, LocalCluster, Parameters, WorkerId};
use quiver_core::{Label, PropertyKey, PropertyValue, Symbol, SymbolKind, SymbolTable};
use quiver_graph::View;
use quiver_query::expr::Expr;
use quiver_query::plan::{
    AggregateNode, AggregationElement, AggregationOp, CreateNodeNode, NamedExpr, NodeAtom,
    PlanNode, PlanRef, ProduceNode, PullRemoteNode, ScanAllByLabelNode, ScanAllNode,
    SynchronizeNode,
};

fn produce(input: PlanRef, columns: Vec<(Symbol, Expr)>) -> PlanRef {
    Arc::new(PlanNode::Produce(ProduceNode {
        input,
        named_expressions: columns
            .into_iter()
            .map(|(symbol, expression)| NamedExpr { symbol, expression })
            .collect(),
    }))
}

/// Seeds `count` vertices with `p` in `1..=count` on a member's shard
/// and makes them visible.
fn seed_worker(cluster: &LocalCluster, worker: WorkerId, count: i64) {
    let store = cluster.store(worker).unwrap();
    for p in 1..=count {
        let mut properties = BTreeMap::new();
        properties.insert(PropertyKey::new("p"), PropertyValue::Int(p));
        store.create_vertex(vec![Label::new("L")], properties);
    }
    store.advance_command();
}

// ============================================================================
// S8: distributed aggregation
// ============================================================================

#[test]
fn distributed_sum_over_two_workers() {
    let cluster = LocalCluster::new(2, EngineConfig::new());
    seed_worker(&cluster, WorkerId::new(1), 5);
    seed_worker(&cluster, WorkerId::new(2), 5);

    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let sum = table.create("sum", SymbolKind::Number);
    let out = table.create("out", SymbolKind::Number);

    // Workers each run a plain scan; the master synchronizes, then
    // aggregates the combined stream.
    let plan_id = cluster.allocate_plan_id();
    let worker_plan: PlanRef = Arc::new(PlanNode::ScanAll(ScanAllNode {
        input: PlanNode::once(),
        output: n.clone(),
        view: View::Old,
    }));

    let master_plan = produce(
        Arc::new(PlanNode::Aggregate(AggregateNode {
            input: Arc::new(PlanNode::Synchronize(SynchronizeNode {
                input: Arc::new(PlanNode::ScanAll(ScanAllNode {
                    input: PlanNode::once(),
                    output: n.clone(),
                    view: View::Old,
                })),
                pull_remote: Some(Arc::new(PlanNode::PullRemote(PullRemoteNode {
                    input: None,
                    plan_id,
                    symbols: vec![n.clone()],
                }))),
                advance_command: false,
            })),
            aggregations: vec![AggregationElement {
                value: Some(Expr::property(n.clone(), "p")),
                key: None,
                op: AggregationOp::Sum,
                output: sum.clone(),
            }],
            group_by: vec![],
            remember: vec![],
        })),
        vec![(out, Expr::ident(sum))],
    );

    let dispatched =
        DistributedPlan::new(&cluster, master_plan, table.clone(), vec![(plan_id, worker_plan)])
            .unwrap();
    let rows = dispatched.run(Parameters::new()).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_int().unwrap(), 30);
}

// ============================================================================
// Remote pull streaming
// ============================================================================

#[test]
fn pull_remote_interleaves_local_and_remote_rows() {
    let cluster = LocalCluster::new(2, EngineConfig::new());
    seed_worker(&cluster, WorkerId::MASTER, 2);
    seed_worker(&cluster, WorkerId::new(1), 3);
    seed_worker(&cluster, WorkerId::new(2), 3);

    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let out = table.create("out", SymbolKind::Number);

    let plan_id = cluster.allocate_plan_id();
    let worker_plan: PlanRef = Arc::new(PlanNode::ScanAll(ScanAllNode {
        input: PlanNode::once(),
        output: n.clone(),
        view: View::Old,
    }));

    // The master both pulls its own shard (the PullRemote input) and
    // streams every worker's rows.
    let master_plan = produce(
        Arc::new(PlanNode::PullRemote(PullRemoteNode {
            input: Some(Arc::new(PlanNode::ScanAll(ScanAllNode {
                input: PlanNode::once(),
                output: n.clone(),
                view: View::Old,
            }))),
            plan_id,
            symbols: vec![n.clone()],
        })),
        vec![(out, Expr::property(n.clone(), "p"))],
    );

    let dispatched =
        DistributedPlan::new(&cluster, master_plan, table.clone(), vec![(plan_id, worker_plan)])
            .unwrap();
    let rows = dispatched.run(Parameters::new()).unwrap();

    // 2 local rows + 3 rows from each worker.
    assert_eq!(rows.len(), 8);
    let total: i64 = rows.iter().map(|row| row[0].as_int().unwrap()).sum();
    assert_eq!(total, (1 + 2) + (1 + 2 + 3) * 2);
}

// ============================================================================
// The accumulation barrier
// ============================================================================

#[test]
fn synchronize_makes_deferred_writes_visible_downstream() {
    let cluster = LocalCluster::new(1, EngineConfig::new());
    let worker = WorkerId::new(1);

    // A master transaction creates a vertex on the worker (synchronous)
    // and then mutates it (deferred into the worker's update buffer).
    let tx = cluster.tx_on(WorkerId::MASTER);
    let remote = tx
        .insert_vertex_into_remote(worker, vec![Label::new("L")], BTreeMap::new())
        .unwrap();
    remote.set_property(PropertyKey::new("p"), PropertyValue::Int(1)).unwrap();

    // Before the barrier the write is not applied on the worker.
    let worker_store = cluster.store(worker).unwrap();
    assert_eq!(
        worker_store.vertex(remote.gid(), View::New).unwrap().property(&PropertyKey::new("p")),
        PropertyValue::Null
    );

    // The master streams the worker's vertices through a barrier that
    // replays deferred updates; the downstream projection reads the
    // property after the apply.
    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let out = table.create("out", SymbolKind::Number);

    let plan_id = cluster.allocate_plan_id();
    let worker_plan: PlanRef = Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
        input: PlanNode::once(),
        output: n.clone(),
        label: Label::new("L"),
        view: View::New,
    }));

    let master_plan = produce(
        Arc::new(PlanNode::Synchronize(SynchronizeNode {
            input: Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
                input: PlanNode::once(),
                output: n.clone(),
                label: Label::new("L"),
                view: View::New,
            })),
            pull_remote: Some(Arc::new(PlanNode::PullRemote(PullRemoteNode {
                input: None,
                plan_id,
                symbols: vec![n.clone()],
            }))),
            advance_command: true,
        })),
        vec![(out, Expr::property(n.clone(), "p"))],
    );

    let dispatched =
        DistributedPlan::new(&cluster, master_plan, table.clone(), vec![(plan_id, worker_plan)])
            .unwrap();
    // The barrier belongs to the transaction that buffered the update.
    let rows = dispatched.run_in(tx.transaction_id(), Parameters::new()).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_int().unwrap(), 1);

    // The apply landed on the worker's shard itself.
    assert_eq!(
        worker_store.vertex(remote.gid(), View::New).unwrap().property(&PropertyKey::new("p")),
        PropertyValue::Int(1)
    );
}

// ============================================================================
// Remote edge endpoints
// ============================================================================

#[test]
fn expand_resolves_remote_edge_records_asynchronously() {
    use quiver_core::{EdgeTypeName, GlobalAddress};
    use quiver_graph::EdgeRef;
    use quiver_query::plan::{Direction, ExpandNode};

    let cluster = LocalCluster::new(1, EngineConfig::new());
    let worker = WorkerId::new(1);
    let master_store = cluster.store(WorkerId::MASTER).unwrap();
    let worker_store = cluster.store(worker).unwrap();

    // The edge record lives with its *from* endpoint on the worker; the
    // master vertex only carries the reference.
    let m = master_store.create_vertex(vec![Label::new("M")], BTreeMap::new());
    let w = worker_store.create_vertex(vec![Label::new("W")], BTreeMap::new());
    let w_address = GlobalAddress::new(w, worker);
    let m_address = GlobalAddress::new(m, WorkerId::MASTER);
    let edge_gid = worker_store.create_edge(w_address, m_address, EdgeTypeName::new("E")).unwrap();
    master_store
        .register_in_edge(
            m,
            EdgeRef {
                edge: GlobalAddress::new(edge_gid, worker),
                other: w_address,
                edge_type: EdgeTypeName::new("E"),
            },
        )
        .unwrap();
    master_store.advance_command();
    worker_store.advance_command();

    // Expanding the master vertex's in-edge crosses the shard boundary:
    // the endpoint is resolved on a task, not inline.
    let mut table = SymbolTable::new();
    let a = table.create("a", SymbolKind::Vertex);
    let r = table.create("r", SymbolKind::Edge);
    let b = table.create("b", SymbolKind::Vertex);
    let out = table.create("out", SymbolKind::Any);

    let plan = produce(
        Arc::new(PlanNode::Expand(ExpandNode {
            input: Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
                input: PlanNode::once(),
                output: a.clone(),
                label: Label::new("M"),
                view: View::Old,
            })),
            input_symbol: a,
            node_symbol: b.clone(),
            edge_symbol: r,
            direction: Direction::In,
            edge_types: vec![],
            existing_node: false,
            view: View::Old,
        })),
        vec![(out, Expr::ident(b))],
    );

    let rows = cluster.run_on_master(&plan, &table, Parameters::new()).unwrap();
    assert_eq!(rows.len(), 1);
    let reached = match &rows[0][0] {
        quiver::TypedValue::Vertex(vertex) => vertex.clone(),
        other => panic!("expected a vertex, got {other}"),
    };
    assert_eq!(reached.address(), w_address);
    assert!(reached.has_label(&Label::new("W")).unwrap());
}

// ============================================================================
// Remote vertex creation
// ============================================================================

#[test]
fn create_on_random_worker_spreads_vertices() {
    let cluster = LocalCluster::new(1, EngineConfig::new());

    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let x = table.create("x", SymbolKind::Number);

    // Forty creation rows: with two members the chance of never using
    // one of them is negligible.
    let rows: Vec<Expr> = (0..40).map(Expr::integer).collect();
    let create = Arc::new(PlanNode::CreateNode(CreateNodeNode {
        input: Arc::new(PlanNode::Unwind(quiver_query::plan::UnwindNode {
            input: PlanNode::once(),
            input_expression: Expr::List(rows),
            output_symbol: x,
        })),
        node: NodeAtom { symbol: n.clone(), labels: vec![Label::new("L")], properties: vec![] },
        on_random_worker: true,
    }));

    let rows = cluster.run_on_master(&create, &table, Parameters::new()).unwrap();
    // A mutation-only plan projects no columns.
    assert_eq!(rows.len(), 40);
    assert!(rows.iter().all(Vec::is_empty));

    let master_count =
        cluster.store(WorkerId::MASTER).unwrap().vertices(View::New).len();
    let worker_count = cluster.store(WorkerId::new(1)).unwrap().vertices(View::New).len();
    assert_eq!(master_count + worker_count, 40);
    assert!(master_count > 0, "placement uses the whole cluster");
    assert!(worker_count > 0, "placement uses the whole cluster");
}
