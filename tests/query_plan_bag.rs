//! Bag-shaping operators: aggregation, ordering, dedup, pagination,
//! unwinding and variable-length expansion.

mod common;

use common::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vesper::query::ast::AggregationOp;
use vesper::query::plan::{
    Aggregate, AggregateElement, Direction, ExpandVariable, ExpansionLambda, Filter, Limit,
    LogicalOperator, OrderBy, Ordering, Skip, SortItem, Unwind,
};
use vesper::query::symbol::Symbol;
use vesper::query::TypedValue;
use vesper::storage::{GraphStore, GraphView, PropertyValue};
use vesper::GraphError;

/// UNWIND over a literal list, bound to a fresh symbol.
fn unwind_list(
    ctx: &mut PlanContext,
    values: Vec<TypedValue>,
    name: &str,
) -> (Box<LogicalOperator>, Symbol) {
    let items = values
        .into_iter()
        .map(|value| ctx.ast.literal(value))
        .collect();
    let list = ctx.ast.list(items);
    let symbol = ctx.symbol_table.create_named(name);
    let op = Box::new(LogicalOperator::Unwind(Unwind::new(
        once(),
        list,
        symbol.clone(),
    )));
    (op, symbol)
}

fn ints(values: &[i64]) -> Vec<TypedValue> {
    values.iter().map(|v| TypedValue::Int(*v)).collect()
}

#[test]
fn unwind_emits_one_row_per_element() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let (unwind, x) = unwind_list(&mut ctx, ints(&[5, 6, 7]), "x");
    let plan = produce(&mut ctx, unwind, &[("x", &x)]);

    let stream = collect_produce(plan, ctx, &dba);
    assert_eq!(
        stream.rows(),
        &[
            vec![TypedValue::Int(5)],
            vec![TypedValue::Int(6)],
            vec![TypedValue::Int(7)],
        ]
    );
}

#[test]
fn unwind_of_null_emits_nothing() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let null = ctx.ast.literal(TypedValue::Null);
    let symbol = ctx.symbol_table.create_named("x");
    let unwind = Box::new(LogicalOperator::Unwind(Unwind::new(once(), null, symbol)));

    assert_eq!(0, pull_all(&unwind, &ctx, &dba));
}

#[test]
fn unwind_of_a_scalar_fails() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let scalar = ctx.ast.literal(1i64);
    let symbol = ctx.symbol_table.create_named("x");
    let unwind = Box::new(LogicalOperator::Unwind(Unwind::new(once(), scalar, symbol)));

    assert!(matches!(
        try_pull_all(&unwind, &ctx, &dba),
        Err(GraphError::TypeMismatch(_))
    ));
}

/// Attaches an ungrouped aggregation over `value` and projects it.
fn aggregate_single(
    ctx: &mut PlanContext,
    input: Box<LogicalOperator>,
    op: AggregationOp,
    value: Option<vesper::query::ast::ExprId>,
) -> Box<LogicalOperator> {
    let output = ctx.symbol_table.create_symbol("agg", false, Default::default());
    let aggregate = Box::new(LogicalOperator::Aggregate(Aggregate::new(
        input,
        Vec::new(),
        vec![AggregateElement {
            value,
            op,
            output_symbol: output.clone(),
        }],
        Vec::new(),
    )));
    let agg_expr = ctx.ast.aggregation(op, value);
    ctx.symbol_table.bind(agg_expr, &output);
    let named = ctx.ast.named_expr("agg", agg_expr);
    let out = ctx.symbol_table.create_named("agg");
    ctx.symbol_table.bind(named.id, &out);
    Box::new(LogicalOperator::Produce(vesper::query::plan::Produce::new(
        aggregate,
        vec![named],
    )))
}

#[test]
fn aggregations_skip_nulls() {
    let values = vec![
        TypedValue::Int(1),
        TypedValue::Int(2),
        TypedValue::Int(2),
        TypedValue::Null,
    ];
    let cases: Vec<(AggregationOp, TypedValue)> = vec![
        (AggregationOp::Count, TypedValue::Int(3)),
        (AggregationOp::Sum, TypedValue::Int(5)),
        (AggregationOp::Avg, TypedValue::Double(5.0 / 3.0)),
        (AggregationOp::Min, TypedValue::Int(1)),
        (AggregationOp::Max, TypedValue::Int(2)),
        (
            AggregationOp::Collect,
            TypedValue::List(ints(&[1, 2, 2])),
        ),
    ];
    for (op, expected) in cases {
        let store = GraphStore::new();
        let dba = store.access();
        let mut ctx = PlanContext::new();
        let (unwind, x) = unwind_list(&mut ctx, values.clone(), "x");
        let x_ident = ctx.ast.ident("x");
        ctx.symbol_table.bind(x_ident, &x);
        let plan = aggregate_single(&mut ctx, unwind, op, Some(x_ident));

        let stream = collect_produce(plan, ctx, &dba);
        assert_eq!(stream.rows(), &[vec![expected]], "aggregation {op:?}");
    }
}

#[test]
fn count_star_counts_null_rows() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let (unwind, _) = unwind_list(
        &mut ctx,
        vec![TypedValue::Int(1), TypedValue::Null, TypedValue::Null],
        "x",
    );
    let plan = aggregate_single(&mut ctx, unwind, AggregationOp::Count, None);

    let stream = collect_produce(plan, ctx, &dba);
    assert_eq!(stream.rows(), &[vec![TypedValue::Int(3)]]);
}

#[test]
fn empty_ungrouped_input_emits_seed_values() {
    let cases: Vec<(AggregationOp, TypedValue)> = vec![
        (AggregationOp::Count, TypedValue::Int(0)),
        (AggregationOp::Sum, TypedValue::Int(0)),
        (AggregationOp::Avg, TypedValue::Null),
        (AggregationOp::Min, TypedValue::Null),
        (AggregationOp::Max, TypedValue::Null),
        (AggregationOp::Collect, TypedValue::Null),
    ];
    for (op, expected) in cases {
        let store = GraphStore::new();
        let dba = store.access();
        let mut ctx = PlanContext::new();
        let (unwind, x) = unwind_list(&mut ctx, Vec::new(), "x");
        let x_ident = ctx.ast.ident("x");
        ctx.symbol_table.bind(x_ident, &x);
        let value = (op != AggregationOp::Count).then_some(x_ident);
        let plan = aggregate_single(&mut ctx, unwind, op, value);

        let stream = collect_produce(plan, ctx, &dba);
        assert_eq!(stream.rows(), &[vec![expected]], "aggregation {op:?}");
    }
}

#[test]
fn filtered_count_matches_predicate() {
    // six vertices with p in {0,0,0,1,1,1}: WHERE n.p = 0 counts 3
    let store = GraphStore::new();
    let dba = store.access();
    let prop = dba.property("p");
    for i in 0..6 {
        let v = dba.insert_vertex();
        dba.set_vertex_property(&v, prop, PropertyValue::Int(i % 2))
            .unwrap();
    }
    dba.advance_command();

    let mut ctx = PlanContext::new();
    let n = scan_all(&mut ctx, "n", None, GraphView::AsIs);
    let n_ident = ctx.ast.ident("n");
    ctx.symbol_table.bind(n_ident, &n.symbol);
    let lookup = ctx.ast.property_lookup(n_ident, prop);
    let zero = ctx.ast.literal(0i64);
    let predicate = ctx.ast.eq(lookup, zero);
    let filter = Box::new(LogicalOperator::Filter(Filter::new(n.op, predicate)));
    let plan = aggregate_single(&mut ctx, filter, AggregationOp::Count, None);

    let stream = collect_produce(plan, ctx, &dba);
    assert_eq!(stream.rows(), &[vec![TypedValue::Int(3)]]);
}

#[test]
fn grouping_puts_all_nulls_in_one_group() {
    // p values: 1, 1, 2, absent, absent -> three groups
    let store = GraphStore::new();
    let dba = store.access();
    let prop = dba.property("p");
    for value in [Some(1i64), Some(1), Some(2), None, None] {
        let v = dba.insert_vertex();
        if let Some(value) = value {
            dba.set_vertex_property(&v, prop, PropertyValue::Int(value))
                .unwrap();
        }
    }
    dba.advance_command();

    let mut ctx = PlanContext::new();
    let n = scan_all(&mut ctx, "n", None, GraphView::AsIs);
    let n_ident = ctx.ast.ident("n");
    ctx.symbol_table.bind(n_ident, &n.symbol);
    let group_key = ctx.ast.property_lookup(n_ident, prop);
    let count_sym = ctx.symbol_table.create_symbol("count", false, Default::default());
    let aggregate = Box::new(LogicalOperator::Aggregate(Aggregate::new(
        n.op,
        vec![group_key],
        vec![AggregateElement {
            value: None,
            op: AggregationOp::Count,
            output_symbol: count_sym.clone(),
        }],
        vec![n.symbol.clone()],
    )));

    let agg_expr = ctx.ast.aggregation(AggregationOp::Count, None);
    ctx.symbol_table.bind(agg_expr, &count_sym);
    let n_ident2 = ctx.ast.ident("n");
    ctx.symbol_table.bind(n_ident2, &n.symbol);
    let key_again = ctx.ast.property_lookup(n_ident2, prop);
    let key_named = ctx.ast.named_expr("p", key_again);
    let key_out = ctx.symbol_table.create_named("p");
    ctx.symbol_table.bind(key_named.id, &key_out);
    let count_named = ctx.ast.named_expr("count", agg_expr);
    let count_out = ctx.symbol_table.create_named("count");
    ctx.symbol_table.bind(count_named.id, &count_out);
    let plan = Box::new(LogicalOperator::Produce(vesper::query::plan::Produce::new(
        aggregate,
        vec![key_named, count_named],
    )));

    let stream = collect_produce(plan, ctx, &dba);
    let rows = stream.rows();
    assert_eq!(rows.len(), 3);
    let null_groups: Vec<_> = rows.iter().filter(|row| row[0].is_null()).collect();
    assert_eq!(null_groups.len(), 1);
    assert_eq!(null_groups[0][1], TypedValue::Int(2));
}

fn order_by_plan(
    ctx: &mut PlanContext,
    values: Vec<TypedValue>,
    ordering: Ordering,
) -> Box<LogicalOperator> {
    let (unwind, x) = unwind_list(ctx, values, "x");
    let x_ident = ctx.ast.ident("x");
    ctx.symbol_table.bind(x_ident, &x);
    let order_by = Box::new(LogicalOperator::OrderBy(OrderBy::new(
        unwind,
        vec![SortItem {
            ordering,
            expression: x_ident,
        }],
        vec![x.clone()],
    )));
    produce(ctx, order_by, &[("x", &x)])
}

#[test]
fn order_by_ascending_puts_nulls_last() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let values = vec![
        TypedValue::Int(3),
        TypedValue::Null,
        TypedValue::Int(1),
        TypedValue::Int(2),
    ];
    let plan = order_by_plan(&mut ctx, values, Ordering::Asc);

    let stream = collect_produce(plan, ctx, &dba);
    assert_eq!(
        stream.rows(),
        &[
            vec![TypedValue::Int(1)],
            vec![TypedValue::Int(2)],
            vec![TypedValue::Int(3)],
            vec![TypedValue::Null],
        ]
    );
}

#[test]
fn order_by_descending_puts_nulls_first() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let values = vec![
        TypedValue::Int(3),
        TypedValue::Null,
        TypedValue::Int(1),
        TypedValue::Int(2),
    ];
    let plan = order_by_plan(&mut ctx, values, Ordering::Desc);

    let stream = collect_produce(plan, ctx, &dba);
    assert_eq!(
        stream.rows(),
        &[
            vec![TypedValue::Null],
            vec![TypedValue::Int(3)],
            vec![TypedValue::Int(2)],
            vec![TypedValue::Int(1)],
        ]
    );
}

#[test]
fn order_by_is_stable() {
    // sorting on a constant key keeps the input order
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let (unwind, x) = unwind_list(&mut ctx, ints(&[4, 2, 9, 2]), "x");
    let constant = ctx.ast.literal(1i64);
    let order_by = Box::new(LogicalOperator::OrderBy(OrderBy::new(
        unwind,
        vec![SortItem {
            ordering: Ordering::Asc,
            expression: constant,
        }],
        vec![x.clone()],
    )));
    let plan = produce(&mut ctx, order_by, &[("x", &x)]);

    let stream = collect_produce(plan, ctx, &dba);
    let flat: Vec<_> = stream.rows().iter().map(|row| row[0].clone()).collect();
    assert_eq!(flat, ints(&[4, 2, 9, 2]));
}

#[test]
fn order_by_incomparable_values_fails() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let values = vec![TypedValue::Int(1), TypedValue::from("a")];
    let plan = order_by_plan(&mut ctx, values, Ordering::Asc);

    assert!(matches!(
        try_pull_all(&plan, &ctx, &dba),
        Err(GraphError::Evaluation(_))
    ));
}

#[test]
fn distinct_collapses_by_value_identity() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let values = vec![
        TypedValue::Int(1),
        TypedValue::Int(2),
        TypedValue::Int(1),
        TypedValue::Null,
        TypedValue::Double(2.0), // equal to Int(2) by value
        TypedValue::Null,
    ];
    let (unwind, x) = unwind_list(&mut ctx, values, "x");
    let distinct = Box::new(LogicalOperator::Distinct(
        vesper::query::plan::Distinct::new(unwind, vec![x.clone()]),
    ));
    let plan = produce(&mut ctx, distinct, &[("x", &x)]);

    let stream = collect_produce(plan, ctx, &dba);
    assert_eq!(
        stream.rows(),
        &[
            vec![TypedValue::Int(1)],
            vec![TypedValue::Int(2)],
            vec![TypedValue::Null],
        ]
    );
}

#[test]
fn skip_and_limit() {
    let store = GraphStore::new();
    let dba = store.access();

    let mut ctx = PlanContext::new();
    let (unwind, x) = unwind_list(&mut ctx, ints(&[0, 1, 2, 3, 4]), "x");
    let two = ctx.ast.literal(2i64);
    let skip = Box::new(LogicalOperator::Skip(Skip::new(unwind, two)));
    let plan = produce(&mut ctx, skip, &[("x", &x)]);
    let stream = collect_produce(plan, ctx, &dba);
    let flat: Vec<_> = stream.rows().iter().map(|row| row[0].clone()).collect();
    assert_eq!(flat, ints(&[2, 3, 4]));

    let mut ctx = PlanContext::new();
    let (unwind, _) = unwind_list(&mut ctx, ints(&[0, 1, 2, 3, 4]), "x");
    let two = ctx.ast.literal(2i64);
    let limit = Box::new(LogicalOperator::Limit(Limit::new(unwind, two)));
    assert_eq!(2, pull_all(&limit, &ctx, &dba));
}

#[test]
fn negative_limit_fails() {
    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let (unwind, _) = unwind_list(&mut ctx, ints(&[1, 2]), "x");
    let negative = ctx.ast.literal(-1i64);
    let limit = Box::new(LogicalOperator::Limit(Limit::new(unwind, negative)));

    assert!(matches!(
        try_pull_all(&limit, &ctx, &dba),
        Err(GraphError::Evaluation(_))
    ));
}

/// Chain graph (v1)->(v2)->(v3) for the variable-expansion tests.
fn chain(dba: &vesper::GraphAccessor) -> vesper::storage::PropertyId {
    let ok = dba.property("ok");
    let v1 = dba.insert_vertex();
    let v2 = dba.insert_vertex();
    let v3 = dba.insert_vertex();
    dba.set_vertex_property(&v2, ok, PropertyValue::Bool(true)).unwrap();
    dba.set_vertex_property(&v3, ok, PropertyValue::Bool(false)).unwrap();
    let t = dba.edge_type("T");
    dba.insert_edge(&v1, &v2, t).unwrap();
    dba.insert_edge(&v2, &v3, t).unwrap();
    dba.advance_command();
    ok
}

fn variable_expand_count(
    dba: &vesper::GraphAccessor,
    lower: usize,
    upper: Option<usize>,
    with_filter: bool,
) -> usize {
    let mut ctx = PlanContext::new();
    let ok = dba.property("ok");
    let n = scan_all(&mut ctx, "n", None, GraphView::AsIs);
    let edges = ctx.symbol_table.create_named("r");
    let node = ctx.symbol_table.create_named("m");
    let filter = with_filter.then(|| {
        let inner_edge = ctx.symbol_table.create_symbol("r_", false, Default::default());
        let inner_node = ctx.symbol_table.create_symbol("m_", false, Default::default());
        let node_ident = ctx.ast.ident("m_");
        ctx.symbol_table.bind(node_ident, &inner_node);
        let expression = ctx.ast.property_lookup(node_ident, ok);
        ExpansionLambda {
            inner_edge_symbol: inner_edge,
            inner_node_symbol: inner_node,
            expression,
        }
    });
    let expand = Box::new(LogicalOperator::ExpandVariable(ExpandVariable::new(
        n.op,
        n.symbol.clone(),
        edges,
        node,
        Direction::Out,
        lower,
        upper,
        filter,
        GraphView::AsIs,
    )));
    pull_all(&expand, &ctx, dba)
}

#[test]
fn variable_expansion_ranges() {
    let store = GraphStore::new();
    let dba = store.access();
    chain(&dba);

    // paths of length 1..=2: v1->v2, v1->v2->v3, v2->v3
    assert_eq!(3, variable_expand_count(&dba, 1, Some(2), false));
    // zero-length paths add one row per vertex
    assert_eq!(6, variable_expand_count(&dba, 0, Some(2), false));
    // an unbounded upper terminates on path-edge uniqueness
    assert_eq!(3, variable_expand_count(&dba, 1, None, false));
    // exactly two hops
    assert_eq!(1, variable_expand_count(&dba, 2, Some(2), false));
}

#[test]
fn variable_expansion_filter_prunes_traversal() {
    let store = GraphStore::new();
    let dba = store.access();
    chain(&dba);

    // the per-hop filter admits only the hop into v2
    assert_eq!(1, variable_expand_count(&dba, 1, Some(2), true));
}

#[test]
fn variable_expansion_binds_the_edge_list() {
    let store = GraphStore::new();
    let dba = store.access();
    chain(&dba);

    let mut ctx = PlanContext::new();
    let n = scan_all(&mut ctx, "n", None, GraphView::AsIs);
    let edges = ctx.symbol_table.create_named("r");
    let node = ctx.symbol_table.create_named("m");
    let expand = Box::new(LogicalOperator::ExpandVariable(ExpandVariable::new(
        n.op,
        n.symbol.clone(),
        edges.clone(),
        node.clone(),
        Direction::Out,
        2,
        Some(2),
        None,
        GraphView::AsIs,
    )));
    let plan = produce(&mut ctx, expand, &[("r", &edges), ("m", &node)]);

    let stream = collect_produce(plan, ctx, &dba);
    assert_eq!(stream.rows().len(), 1);
    match &stream.rows()[0][0] {
        TypedValue::List(items) => {
            assert_eq!(items.len(), 2);
            assert!(items.iter().all(|v| matches!(v, TypedValue::Edge(_))));
        }
        other => panic!("expected an edge list, got {other:?}"),
    }
}

#[test]
fn sorting_and_dedup_agree_with_the_standard_library() {
    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<i64> = (0..100).map(|_| rng.gen_range(0..20)).collect();

    let store = GraphStore::new();
    let dba = store.access();
    let mut ctx = PlanContext::new();
    let plan = order_by_plan(&mut ctx, ints(&values), Ordering::Asc);
    let stream = collect_produce(plan, ctx, &dba);
    let sorted_by_engine: Vec<_> = stream
        .rows()
        .iter()
        .map(|row| match row[0] {
            TypedValue::Int(i) => i,
            ref other => panic!("expected Int, got {other:?}"),
        })
        .collect();
    let mut expected = values.clone();
    expected.sort();
    assert_eq!(sorted_by_engine, expected);

    let mut ctx = PlanContext::new();
    let (unwind, x) = unwind_list(&mut ctx, ints(&values), "x");
    let distinct = Box::new(LogicalOperator::Distinct(
        vesper::query::plan::Distinct::new(unwind, vec![x.clone()]),
    ));
    let unique_by_engine = pull_all(&distinct, &ctx, &dba);
    let unique_expected = values.iter().collect::<std::collections::HashSet<_>>().len();
    assert_eq!(unique_by_engine, unique_expected);
}
