//! Plan-building helpers shared by the operator test suites.
#![allow(dead_code)]

use vesper::config::Config;
use vesper::query::ast::AstStorage;
use vesper::query::executor::{Executor, PreparedPlan};
use vesper::query::plan::{
    Direction, ExecutionContext, Expand, LogicalOperator, Once, Produce, ScanAll,
};
use vesper::query::stream::StreamCollector;
use vesper::query::symbol::{Symbol, SymbolTable};
use vesper::query::Frame;
use vesper::storage::{GraphAccessor, GraphView};

/// The expression arena and symbol table a test plan is built against.
#[derive(Default)]
pub struct PlanContext {
    pub ast: AstStorage,
    pub symbol_table: SymbolTable,
}

impl PlanContext {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn once() -> Box<LogicalOperator> {
    Box::new(LogicalOperator::Once(Once::new()))
}

pub struct ScanAllResult {
    pub op: Box<LogicalOperator>,
    pub symbol: Symbol,
}

/// Scan of every vertex, bound to a fresh user symbol.
pub fn scan_all(
    ctx: &mut PlanContext,
    name: &str,
    input: Option<Box<LogicalOperator>>,
    view: GraphView,
) -> ScanAllResult {
    let input = input.unwrap_or_else(once);
    let symbol = ctx.symbol_table.create_named(name);
    let op = Box::new(LogicalOperator::ScanAll(ScanAll::new(
        input,
        symbol.clone(),
        view,
    )));
    ScanAllResult { op, symbol }
}

pub struct ExpandResult {
    pub op: Box<LogicalOperator>,
    pub edge_symbol: Symbol,
    pub node_symbol: Symbol,
}

/// One-hop expansion into fresh edge and node symbols.
pub fn expand(
    ctx: &mut PlanContext,
    input: Box<LogicalOperator>,
    src: &Symbol,
    edge_name: &str,
    direction: Direction,
    node_name: &str,
    view: GraphView,
) -> ExpandResult {
    let edge_symbol = ctx.symbol_table.create_named(edge_name);
    let node_symbol = ctx.symbol_table.create_named(node_name);
    let op = Box::new(LogicalOperator::Expand(Expand::new(
        input,
        src.clone(),
        edge_symbol.clone(),
        node_symbol.clone(),
        direction,
        false,
        false,
        view,
    )));
    ExpandResult {
        op,
        edge_symbol,
        node_symbol,
    }
}

/// Expansion whose neighbor must equal an already-bound vertex symbol.
pub fn expand_to_existing(
    ctx: &mut PlanContext,
    input: Box<LogicalOperator>,
    src: &Symbol,
    edge_name: &str,
    direction: Direction,
    node: &Symbol,
    view: GraphView,
) -> ExpandResult {
    let edge_symbol = ctx.symbol_table.create_named(edge_name);
    let op = Box::new(LogicalOperator::Expand(Expand::new(
        input,
        src.clone(),
        edge_symbol.clone(),
        node.clone(),
        direction,
        false,
        true,
        view,
    )));
    ExpandResult {
        op,
        edge_symbol,
        node_symbol: node.clone(),
    }
}

/// Expansion whose edge must equal an already-bound edge symbol.
pub fn expand_with_existing_edge(
    ctx: &mut PlanContext,
    input: Box<LogicalOperator>,
    src: &Symbol,
    edge: &Symbol,
    direction: Direction,
    node_name: &str,
    view: GraphView,
) -> ExpandResult {
    let node_symbol = ctx.symbol_table.create_named(node_name);
    let op = Box::new(LogicalOperator::Expand(Expand::new(
        input,
        src.clone(),
        edge.clone(),
        node_symbol.clone(),
        direction,
        true,
        false,
        view,
    )));
    ExpandResult {
        op,
        edge_symbol: edge.clone(),
        node_symbol,
    }
}

/// Produce projecting the given bound symbols under their column names.
pub fn produce(
    ctx: &mut PlanContext,
    input: Box<LogicalOperator>,
    items: &[(&str, &Symbol)],
) -> Box<LogicalOperator> {
    let mut named_expressions = Vec::with_capacity(items.len());
    for (name, symbol) in items {
        let ident = ctx.ast.ident(name);
        ctx.symbol_table.bind(ident, symbol);
        let named = ctx.ast.named_expr(name, ident);
        let output = ctx.symbol_table.create_named(name);
        ctx.symbol_table.bind(named.id, &output);
        named_expressions.push(named);
    }
    Box::new(LogicalOperator::Produce(Produce::new(
        input,
        named_expressions,
    )))
}

/// Runs a full plan through the executor, collecting the stream.
pub fn collect_produce(
    root: Box<LogicalOperator>,
    ctx: PlanContext,
    dba: &GraphAccessor,
) -> StreamCollector {
    let plan = PreparedPlan {
        ast: ctx.ast,
        symbol_table: ctx.symbol_table,
        root: *root,
    };
    let executor = Executor::new(Config::default());
    let mut stream = StreamCollector::new();
    executor
        .execute(&plan, dba, &mut stream, None)
        .expect("plan execution failed");
    stream
}

/// Counts the rows a subtree produces, without projecting them.
pub fn pull_all(root: &LogicalOperator, ctx: &PlanContext, dba: &GraphAccessor) -> usize {
    try_pull_all(root, ctx, dba).expect("pull failed")
}

/// As [`pull_all`], surfacing the error instead of panicking.
pub fn try_pull_all(
    root: &LogicalOperator,
    ctx: &PlanContext,
    dba: &GraphAccessor,
) -> vesper::Result<usize> {
    let exec = ExecutionContext::new(&ctx.ast, &ctx.symbol_table, dba);
    let mut frame = Frame::new(ctx.symbol_table.len());
    let mut cursor = root.cursor();
    let mut count = 0;
    while cursor.pull(&mut frame, &exec)? {
        count += 1;
    }
    Ok(count)
}
