//! Pull-pipeline throughput: scan → filter → produce over a seeded
//! shard.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use quiver_core::{PropertyKey, PropertyValue, Symbol, SymbolKind, SymbolTable, WorkerId};
use quiver_graph::{GraphStore, GraphTx, View};
use quiver_query::expr::{CmpOp, Expr};
use quiver_query::plan::{FilterNode, NamedExpr, PlanNode, PlanRef, ProduceNode, ScanAllNode};
use quiver_query::{make_cursor, ExecutionContext, Frame};

fn seeded_store(vertices: i64) -> Arc<GraphStore> {
    let store = Arc::new(GraphStore::new(WorkerId::MASTER));
    let tx = GraphTx::single_node(Arc::clone(&store));
    for i in 0..vertices {
        let vertex = tx.insert_vertex();
        vertex.set_property(PropertyKey::new("p"), PropertyValue::Int(i)).unwrap();
    }
    tx.advance_command();
    store
}

fn filtered_scan_plan(n: Symbol, out: Symbol) -> PlanRef {
    Arc::new(PlanNode::Produce(ProduceNode {
        input: Arc::new(PlanNode::Filter(FilterNode {
            input: Arc::new(PlanNode::ScanAll(ScanAllNode {
                input: PlanNode::once(),
                output: n.clone(),
                view: View::Old,
            })),
            expression: Expr::compare(
                CmpOp::Gt,
                Expr::Property {
                    object: Box::new(Expr::ident(n.clone())),
                    key: PropertyKey::new("p"),
                },
                Expr::integer(500),
            ),
        })),
        named_expressions: vec![NamedExpr {
            symbol: out,
            expression: Expr::Property {
                object: Box::new(Expr::ident(n)),
                key: PropertyKey::new("p"),
            },
        }],
    }))
}

fn bench_pull_chain(c: &mut Criterion) {
    let store = seeded_store(1000);
    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let out = table.create("out", SymbolKind::Any);
    let plan = filtered_scan_plan(n, out);

    c.bench_function("scan_filter_produce_1k", |b| {
        b.iter(|| {
            let tx = GraphTx::single_node(Arc::clone(&store));
            let mut ctx = ExecutionContext::new(tx, table.clone());
            let mut cursor = make_cursor(&plan).unwrap();
            let mut frame = Frame::new(table.len());
            let mut rows = 0u64;
            while cursor.pull(&mut frame, &mut ctx).unwrap() {
                rows += 1;
            }
            criterion::black_box(rows)
        });
    });
}

criterion_group!(benches, bench_pull_chain);
criterion_main!(benches);
