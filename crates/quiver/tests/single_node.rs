//! End-to-end single-node scenarios: full plans, executed through the
//! database surface, checked against literal expected outputs.

use std::sync::Arc;

use quiver::{Database, Parameters};
use quiver_core::{
    EdgeTypeName, Label, PropertyKey, PropertyValue, Symbol, SymbolKind, SymbolTable,
};
use quiver_graph::{GraphTx, View};
use quiver_query::expr::Expr;
use quiver_query::plan::{
    AggregateNode, AggregationElement, AggregationOp, ConstructNamedPathNode, CreateNodeNode,
    Direction, DistinctNode, ExpandNode, ExpandVariableNode, ExpansionKind, Lambda, MergeNode,
    NamedExpr, NodeAtom, OptionalNode, PlanNode, PlanRef, ProduceNode, ScanAllByLabelNode,
    ScanAllByLabelPropertyValueNode, ScanAllNode, UnionNode,
};
use quiver_query::TypedValue;

fn produce(input: PlanRef, columns: Vec<(Symbol, Expr)>) -> PlanRef {
    Arc::new(PlanNode::Produce(ProduceNode {
        input,
        named_expressions: columns
            .into_iter()
            .map(|(symbol, expression)| NamedExpr { symbol, expression })
            .collect(),
    }))
}

fn scan_all(output: Symbol, view: View) -> PlanRef {
    Arc::new(PlanNode::ScanAll(ScanAllNode { input: PlanNode::once(), output, view }))
}

/// Seeds the database through one transaction and makes the writes
/// visible to subsequent statements.
fn seed(db: &Database, build: impl FnOnce(&GraphTx)) {
    let tx = db.tx();
    build(&tx);
    tx.advance_command();
}

// ============================================================================
// S1: scan-and-count
// ============================================================================

#[test]
fn count_all_vertices() {
    let db = Database::in_memory();
    seed(&db, |tx| {
        for _ in 0..3 {
            tx.insert_vertex();
        }
    });

    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let count = table.create("count", SymbolKind::Number);
    let out = table.create("out", SymbolKind::Number);

    let plan = produce(
        Arc::new(PlanNode::Aggregate(AggregateNode {
            input: scan_all(n, View::Old),
            aggregations: vec![AggregationElement {
                value: None,
                key: None,
                op: AggregationOp::Count,
                output: count.clone(),
            }],
            group_by: vec![],
            remember: vec![],
        })),
        vec![(out.clone(), Expr::ident(count))],
    );

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0].as_int().unwrap(), 3);
}

// ============================================================================
// S2: indexed property lookup
// ============================================================================

#[test]
fn filtered_property_index_scan() {
    let db = Database::in_memory();
    seed(&db, |tx| {
        for id in [1, 2, 3] {
            let v = tx.insert_vertex();
            v.add_label(Label::new("L")).unwrap();
            v.set_property(PropertyKey::new("id"), PropertyValue::Int(id)).unwrap();
            v.set_property(PropertyKey::new("p"), PropertyValue::Int(id * 10)).unwrap();
        }
        tx.build_index(Label::new("L"), PropertyKey::new("p"));
    });

    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let out = table.create("out", SymbolKind::Number);

    let plan = produce(
        Arc::new(PlanNode::ScanAllByLabelPropertyValue(ScanAllByLabelPropertyValueNode {
            input: PlanNode::once(),
            output: n.clone(),
            label: Label::new("L"),
            property: PropertyKey::new("p"),
            expression: Expr::integer(20),
            view: View::Old,
        })),
        vec![(out.clone(), Expr::property(n, "id"))],
    );

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0].as_int().unwrap(), 2);
}

// ============================================================================
// S3: breadth-first bounds
// ============================================================================

#[test]
fn breadth_first_expansion_bounds() {
    let db = Database::in_memory();
    seed(&db, |tx| {
        let a = tx.insert_vertex();
        a.add_label(Label::new("Start")).unwrap();
        let b = tx.insert_vertex();
        let c = tx.insert_vertex();
        let d = tx.insert_vertex();
        tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
        tx.insert_edge(&b, &c, EdgeTypeName::new("E")).unwrap();
        tx.insert_edge(&c, &d, EdgeTypeName::new("E")).unwrap();
    });

    let mut table = SymbolTable::new();
    let a = table.create("a", SymbolKind::Vertex);
    let edges = table.create("edges", SymbolKind::EdgeList);
    let target = table.create("target", SymbolKind::Vertex);
    let inner_edge = table.create("inner_e", SymbolKind::Edge);
    let inner_node = table.create("inner_n", SymbolKind::Vertex);
    let out = table.create("out", SymbolKind::Number);

    let bfs = Arc::new(PlanNode::ExpandVariable(ExpandVariableNode {
        input: Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
            input: PlanNode::once(),
            output: a.clone(),
            label: Label::new("Start"),
            view: View::Old,
        })),
        input_symbol: a,
        node_symbol: target,
        edge_symbol: edges.clone(),
        kind: ExpansionKind::BreadthFirst,
        direction: Direction::Out,
        edge_types: vec![],
        is_reverse: false,
        lower_bound: Some(Expr::integer(2)),
        upper_bound: Some(Expr::integer(3)),
        filter: Lambda { inner_edge, inner_node, expression: None },
        weight: None,
        total_weight: None,
        existing_node: false,
        view: View::Old,
    }));
    // Project the path length per row.
    let plan = produce(bfs, vec![(out.clone(), Expr::ident(edges))]);

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    let mut lengths: Vec<usize> =
        result.rows.iter().map(|row| row[0].as_list().unwrap().len()).collect();
    lengths.sort_unstable();
    assert_eq!(lengths, vec![2, 3]);
}

// ============================================================================
// S4: weighted shortest path
// ============================================================================

#[test]
fn weighted_shortest_path_takes_cheapest_route() {
    let db = Database::in_memory();
    seed(&db, |tx| {
        let a = tx.insert_vertex();
        a.add_label(Label::new("Start")).unwrap();
        let b = tx.insert_vertex();
        let c = tx.insert_vertex();
        c.add_label(Label::new("End")).unwrap();
        for (from, to, weight) in [(&a, &b, 1), (&b, &c, 1), (&a, &c, 5)] {
            let edge = tx.insert_edge(from, to, EdgeTypeName::new("E")).unwrap();
            edge.set_property(PropertyKey::new("w"), PropertyValue::Int(weight)).unwrap();
        }
    });

    let mut table = SymbolTable::new();
    let a = table.create("a", SymbolKind::Vertex);
    let c = table.create("c", SymbolKind::Vertex);
    let edges = table.create("edges", SymbolKind::EdgeList);
    let inner_edge = table.create("inner_e", SymbolKind::Edge);
    let inner_node = table.create("inner_n", SymbolKind::Vertex);
    let weight_edge = table.create("weight_e", SymbolKind::Edge);
    let weight_node = table.create("weight_n", SymbolKind::Vertex);
    let total = table.create("total", SymbolKind::Number);
    let out_len = table.create("out_len", SymbolKind::Number);
    let out_total = table.create("out_total", SymbolKind::Number);

    let wsp = Arc::new(PlanNode::ExpandVariable(ExpandVariableNode {
        input: Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
            input: Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
                input: PlanNode::once(),
                output: c.clone(),
                label: Label::new("End"),
                view: View::Old,
            })),
            output: a.clone(),
            label: Label::new("Start"),
            view: View::Old,
        })),
        input_symbol: a,
        node_symbol: c,
        edge_symbol: edges.clone(),
        kind: ExpansionKind::WeightedShortestPath,
        direction: Direction::Both,
        edge_types: vec![],
        is_reverse: false,
        lower_bound: None,
        upper_bound: None,
        filter: Lambda { inner_edge, inner_node, expression: None },
        weight: Some(Lambda {
            inner_edge: weight_edge.clone(),
            inner_node: weight_node,
            expression: Some(Expr::Property {
                object: Box::new(Expr::ident(weight_edge)),
                key: PropertyKey::new("w"),
            }),
        }),
        total_weight: Some(total.clone()),
        existing_node: true,
        view: View::Old,
    }));
    let plan = produce(
        wsp,
        vec![(out_len, Expr::ident(edges)), (out_total, Expr::ident(total))],
    );

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0].as_list().unwrap().len(), 2);
    assert!((result.rows[0][1].as_double().unwrap() - 2.0).abs() < f64::EPSILON);
}

// ============================================================================
// S5: optional-match nullability
// ============================================================================

#[test]
fn optional_match_yields_nulls_for_isolated_vertex() {
    let db = Database::in_memory();
    seed(&db, |tx| {
        tx.insert_vertex();
    });

    let mut table = SymbolTable::new();
    let a = table.create("a", SymbolKind::Vertex);
    let r = table.create("r", SymbolKind::Edge);
    let b = table.create("b", SymbolKind::Vertex);
    let out_a = table.create("out_a", SymbolKind::Any);
    let out_r = table.create("out_r", SymbolKind::Any);
    let out_b = table.create("out_b", SymbolKind::Any);

    let optional = Arc::new(PlanNode::Optional(OptionalNode {
        input: scan_all(a.clone(), View::Old),
        optional: Arc::new(PlanNode::Expand(ExpandNode {
            input: PlanNode::once(),
            input_symbol: a.clone(),
            node_symbol: b.clone(),
            edge_symbol: r.clone(),
            direction: Direction::Out,
            edge_types: vec![],
            existing_node: false,
            view: View::Old,
        })),
        optional_symbols: vec![r.clone(), b.clone()],
    }));
    let plan = produce(
        optional,
        vec![
            (out_a, Expr::ident(a)),
            (out_r, Expr::ident(r)),
            (out_b, Expr::ident(b)),
        ],
    );

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert!(matches!(result.rows[0][0], TypedValue::Vertex(_)));
    assert!(result.rows[0][1].is_null());
    assert!(result.rows[0][2].is_null());
}

// ============================================================================
// S6: merge's create branch
// ============================================================================

#[test]
fn merge_creates_on_empty_match() {
    let db = Database::in_memory();

    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let out = table.create("out", SymbolKind::Any);

    let merge = Arc::new(PlanNode::Merge(MergeNode {
        input: PlanNode::once(),
        merge_match: Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
            input: PlanNode::once(),
            output: n.clone(),
            label: Label::new("L"),
            view: View::Old,
        })),
        merge_create: Arc::new(PlanNode::CreateNode(CreateNodeNode {
            input: PlanNode::once(),
            node: NodeAtom {
                symbol: n.clone(),
                labels: vec![Label::new("L")],
                properties: vec![(PropertyKey::new("p"), Expr::integer(1))],
            },
            on_random_worker: false,
        })),
    }));
    let plan = produce(merge, vec![(out, Expr::ident(n))]);

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    assert_eq!(result.rows.len(), 1);

    // Exactly one vertex exists, labelled and with the property.
    let tx = db.tx();
    let found = tx.vertices_by_label(&Label::new("L"), View::Old);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].property(&PropertyKey::new("p")).unwrap(), PropertyValue::Int(1));
}

// ============================================================================
// S7: union all
// ============================================================================

#[test]
fn union_all_concatenates_sides() {
    let db = Database::in_memory();

    let mut table = SymbolTable::new();
    let left_x = table.create("x", SymbolKind::Number);
    let right_x = table.create("x", SymbolKind::Number);
    let union_x = table.create("x", SymbolKind::Number);

    let plan: PlanRef = Arc::new(PlanNode::Union(UnionNode {
        left: produce(PlanNode::once(), vec![(left_x.clone(), Expr::integer(1))]),
        right: produce(PlanNode::once(), vec![(right_x.clone(), Expr::integer(2))]),
        union_symbols: vec![union_x.clone()],
        left_symbols: vec![left_x],
        right_symbols: vec![right_x],
    }));

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    let values: Vec<i64> = result.rows.iter().map(|row| row[0].as_int().unwrap()).collect();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn union_composes_with_distinct_for_deduplication() {
    let db = Database::in_memory();

    let mut table = SymbolTable::new();
    let left_x = table.create("x", SymbolKind::Number);
    let right_x = table.create("x", SymbolKind::Number);
    let union_x = table.create("x", SymbolKind::Number);

    let union = Arc::new(PlanNode::Union(UnionNode {
        left: produce(PlanNode::once(), vec![(left_x.clone(), Expr::integer(1))]),
        right: produce(PlanNode::once(), vec![(right_x.clone(), Expr::integer(1))]),
        union_symbols: vec![union_x.clone()],
        left_symbols: vec![left_x],
        right_symbols: vec![right_x],
    }));
    // `UNION` without `ALL` is planned as Distinct over the union
    // columns.
    let plan: PlanRef = Arc::new(PlanNode::Distinct(DistinctNode {
        input: union,
        value_symbols: vec![union_x.clone()],
    }));

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    assert_eq!(result.rows.len(), 1);
}

// ============================================================================
// Named paths
// ============================================================================

#[test]
fn named_path_connects_all_elements() {
    let db = Database::in_memory();
    seed(&db, |tx| {
        let a = tx.insert_vertex();
        a.add_label(Label::new("Start")).unwrap();
        let b = tx.insert_vertex();
        tx.insert_edge(&a, &b, EdgeTypeName::new("E")).unwrap();
    });

    let mut table = SymbolTable::new();
    let a = table.create("a", SymbolKind::Vertex);
    let r = table.create("r", SymbolKind::Edge);
    let b = table.create("b", SymbolKind::Vertex);
    let p = table.create("p", SymbolKind::Path);
    let out = table.create("out", SymbolKind::Any);

    let path = Arc::new(PlanNode::ConstructNamedPath(ConstructNamedPathNode {
        input: Arc::new(PlanNode::Expand(ExpandNode {
            input: Arc::new(PlanNode::ScanAllByLabel(ScanAllByLabelNode {
                input: PlanNode::once(),
                output: a.clone(),
                label: Label::new("Start"),
                view: View::Old,
            })),
            input_symbol: a.clone(),
            node_symbol: b.clone(),
            edge_symbol: r.clone(),
            direction: Direction::Out,
            edge_types: vec![],
            existing_node: false,
            view: View::Old,
        })),
        path_symbol: p.clone(),
        path_elements: vec![a, r, b],
    }));
    let plan = produce(path, vec![(out, Expr::ident(p))]);

    let result = db.run_plan(&plan, &table, &Parameters::new()).unwrap();
    assert_eq!(result.rows.len(), 1);
    let TypedValue::Path(path) = &result.rows[0][0] else { panic!("expected a path") };
    assert_eq!(path.len(), 1);
    // Every edge connects its neighboring vertices.
    let edge = &path.edges()[0];
    let endpoints = [edge.from_vertex().unwrap(), edge.to_vertex().unwrap()];
    assert!(endpoints.contains(&path.vertices()[0]));
    assert!(endpoints.contains(&path.vertices()[1]));
}

// ============================================================================
// Abort and plan-cache behavior
// ============================================================================

#[test]
fn abort_hint_stops_execution() {
    let db = Database::in_memory();
    seed(&db, |tx| {
        tx.insert_vertex();
    });

    let mut table = SymbolTable::new();
    let n = table.create("n", SymbolKind::Vertex);
    let plan = scan_all(n, View::Old);

    // Run manually so the abort can be requested mid-flight.
    let tx = db.tx();
    tx.request_abort();
    let mut ctx = quiver_query::ExecutionContext::new(tx, table.clone());
    let mut cursor = quiver_query::make_cursor(&plan).unwrap();
    let mut frame = quiver_query::Frame::new(table.len());
    let err = cursor.pull(&mut frame, &mut ctx).unwrap_err();
    assert!(err.is_abort());
}

#[test]
fn index_creation_flushes_the_plan_cache() {
    let db = Database::in_memory();

    let mut table = SymbolTable::new();
    let _ = table.create("n", SymbolKind::Vertex);
    let cached_plan: PlanRef = PlanNode::once();
    db.prepare("MATCH (n) RETURN n", || (PlanRef::clone(&cached_plan), table.clone()));
    assert_eq!(db.plan_cache().len(), 1);

    let index_plan: PlanRef = Arc::new(PlanNode::CreateIndex(
        quiver_query::plan::CreateIndexNode {
            label: Label::new("L"),
            property: PropertyKey::new("p"),
        },
    ));
    db.run_plan(&index_plan, &SymbolTable::new(), &Parameters::new()).unwrap();
    assert!(db.plan_cache().is_empty());
}
