//! Single-hop and variable-length expansions.

use std::collections::VecDeque;

use crate::error::{GraphError, Result};
use crate::query::ast::ExprId;
use crate::query::frame::Frame;
use crate::query::plan::{
    BoxedCursor, Cursor, Direction, ExecutionContext, LogicalOperator,
};
use crate::query::symbol::Symbol;
use crate::query::value::TypedValue;
use crate::storage::{EdgeHandle, GraphView, VertexHandle, View};

/// Expands one hop from a bound source vertex, binding the edge and the
/// neighbor.
///
/// With `existing_node` (or `existing_edge`) the corresponding symbol is
/// already bound and the expansion filters on equality instead of
/// assigning; that is how a pattern reuses an earlier binding.
#[derive(Debug)]
pub struct Expand {
    pub input: Box<LogicalOperator>,
    pub src_symbol: Symbol,
    pub edge_symbol: Symbol,
    pub node_symbol: Symbol,
    pub direction: Direction,
    pub existing_edge: bool,
    pub existing_node: bool,
    pub view: GraphView,
}

impl Expand {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input: Box<LogicalOperator>,
        src_symbol: Symbol,
        edge_symbol: Symbol,
        node_symbol: Symbol,
        direction: Direction,
        existing_edge: bool,
        existing_node: bool,
        view: GraphView,
    ) -> Self {
        Self {
            input,
            src_symbol,
            edge_symbol,
            node_symbol,
            direction,
            existing_edge,
            existing_node,
            view,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(ExpandCursor {
            input: self.input.cursor(),
            src_symbol: self.src_symbol.clone(),
            edge_symbol: self.edge_symbol.clone(),
            node_symbol: self.node_symbol.clone(),
            direction: self.direction,
            existing_edge: self.existing_edge,
            existing_node: self.existing_node,
            view: self.view,
            pending: VecDeque::new(),
        })
    }
}

/// Collects the hop candidates from a vertex in the requested direction.
/// With BOTH, a self-loop is emitted once, through the outgoing side only.
pub(crate) fn hop_candidates(
    ctx: &ExecutionContext<'_>,
    from: &VertexHandle,
    direction: Direction,
    view: View,
) -> Vec<(EdgeHandle, VertexHandle)> {
    let mut candidates = Vec::new();
    if matches!(direction, Direction::Out | Direction::Both) {
        for edge in ctx.dba.out_edges(from, view, &[]) {
            candidates.push((edge, edge.to_vertex()));
        }
    }
    if matches!(direction, Direction::In | Direction::Both) {
        for edge in ctx.dba.in_edges(from, view, &[]) {
            if direction == Direction::Both && edge.from == edge.to {
                continue;
            }
            candidates.push((edge, edge.from_vertex()));
        }
    }
    candidates
}

struct ExpandCursor {
    input: BoxedCursor,
    src_symbol: Symbol,
    edge_symbol: Symbol,
    node_symbol: Symbol,
    direction: Direction,
    existing_edge: bool,
    existing_node: bool,
    view: GraphView,
    pending: VecDeque<(EdgeHandle, VertexHandle)>,
}

impl ExpandCursor {
    fn matches_existing(frame: &Frame, symbol: &Symbol, candidate: &TypedValue) -> bool {
        frame[symbol].eq_value(candidate).is_true()
    }
}

impl Cursor for ExpandCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        loop {
            while let Some((edge, node)) = self.pending.pop_front() {
                let edge_value = TypedValue::Edge(edge);
                let node_value = TypedValue::Vertex(node);
                if self.existing_edge
                    && !Self::matches_existing(frame, &self.edge_symbol, &edge_value)
                {
                    continue;
                }
                if self.existing_node
                    && !Self::matches_existing(frame, &self.node_symbol, &node_value)
                {
                    continue;
                }
                if !self.existing_edge {
                    frame[&self.edge_symbol] = edge_value;
                }
                if !self.existing_node {
                    frame[&self.node_symbol] = node_value;
                }
                return Ok(true);
            }
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            match &frame[&self.src_symbol] {
                // an unmatched optional source expands to nothing
                TypedValue::Null => continue,
                TypedValue::Vertex(src) => {
                    let view = self.view.resolve(src.view);
                    let mut src = *src;
                    src.switch(view);
                    self.pending = hop_candidates(ctx, &src, self.direction, view).into();
                }
                other => {
                    return Err(GraphError::TypeMismatch(format!(
                        "expansion source must be a vertex, got {}",
                        other.type_name()
                    )))
                }
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.pending.clear();
    }
}

/// Per-hop filter of a variable-length expansion; the candidate edge and
/// neighbor are bound on the frame while the expression runs.
#[derive(Debug, Clone)]
pub struct ExpansionLambda {
    pub inner_edge_symbol: Symbol,
    pub inner_node_symbol: Symbol,
    pub expression: ExprId,
}

/// Breadth-first expansion emitting one row per distinct path with a hop
/// count in `[lower, upper]`. The edge list and the final vertex are
/// bound; an edge never repeats within a single path.
#[derive(Debug)]
pub struct ExpandVariable {
    pub input: Box<LogicalOperator>,
    pub src_symbol: Symbol,
    pub edge_list_symbol: Symbol,
    pub node_symbol: Symbol,
    pub direction: Direction,
    pub lower: usize,
    pub upper: Option<usize>,
    pub filter: Option<ExpansionLambda>,
    pub view: GraphView,
}

impl ExpandVariable {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input: Box<LogicalOperator>,
        src_symbol: Symbol,
        edge_list_symbol: Symbol,
        node_symbol: Symbol,
        direction: Direction,
        lower: usize,
        upper: Option<usize>,
        filter: Option<ExpansionLambda>,
        view: GraphView,
    ) -> Self {
        Self {
            input,
            src_symbol,
            edge_list_symbol,
            node_symbol,
            direction,
            lower,
            upper,
            filter,
            view,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(ExpandVariableCursor {
            op: ExpandVariableParams {
                src_symbol: self.src_symbol.clone(),
                edge_list_symbol: self.edge_list_symbol.clone(),
                node_symbol: self.node_symbol.clone(),
                direction: self.direction,
                lower: self.lower,
                upper: self.upper,
                filter: self.filter.clone(),
                view: self.view,
            },
            input: self.input.cursor(),
            paths: VecDeque::new(),
        })
    }
}

struct ExpandVariableParams {
    src_symbol: Symbol,
    edge_list_symbol: Symbol,
    node_symbol: Symbol,
    direction: Direction,
    lower: usize,
    upper: Option<usize>,
    filter: Option<ExpansionLambda>,
    view: GraphView,
}

struct ExpandVariableCursor {
    op: ExpandVariableParams,
    input: BoxedCursor,
    paths: VecDeque<(Vec<EdgeHandle>, VertexHandle)>,
}

impl ExpandVariableCursor {
    /// Runs the whole breadth-first traversal for one source vertex,
    /// queueing every path whose length lands in range.
    fn traverse(
        &mut self,
        frame: &mut Frame,
        ctx: &ExecutionContext<'_>,
        source: VertexHandle,
        view: View,
    ) -> Result<()> {
        let mut results = VecDeque::new();
        let mut frontier = VecDeque::new();
        frontier.push_back((Vec::<EdgeHandle>::new(), source));

        while let Some((path, at)) = frontier.pop_front() {
            ctx.check_cancelled()?;
            if path.len() >= self.op.lower {
                results.push_back((path.clone(), at));
            }
            if let Some(upper) = self.op.upper {
                if path.len() >= upper {
                    continue;
                }
            }
            for (edge, node) in hop_candidates(ctx, &at, self.op.direction, view) {
                if path.iter().any(|seen| seen.id == edge.id) {
                    continue;
                }
                if let Some(lambda) = &self.op.filter {
                    frame[&lambda.inner_edge_symbol] = TypedValue::Edge(edge);
                    frame[&lambda.inner_node_symbol] = TypedValue::Vertex(node);
                    let mut evaluator = ctx.evaluator(frame);
                    if view == View::New {
                        evaluator.switch_new();
                    }
                    let verdict = evaluator.eval(lambda.expression)?;
                    if !verdict.is_true() {
                        continue;
                    }
                }
                let mut next = path.clone();
                next.push(edge);
                frontier.push_back((next, node));
            }
        }
        self.paths = results;
        Ok(())
    }
}

impl Cursor for ExpandVariableCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        loop {
            if let Some((edges, node)) = self.paths.pop_front() {
                frame[&self.op.edge_list_symbol] =
                    TypedValue::List(edges.into_iter().map(TypedValue::Edge).collect());
                frame[&self.op.node_symbol] = TypedValue::Vertex(node);
                return Ok(true);
            }
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            match &frame[&self.op.src_symbol] {
                TypedValue::Null => continue,
                TypedValue::Vertex(src) => {
                    let view = self.op.view.resolve(src.view);
                    let mut src = *src;
                    src.switch(view);
                    self.traverse(frame, ctx, src, view)?;
                }
                other => {
                    return Err(GraphError::TypeMismatch(format!(
                        "expansion source must be a vertex, got {}",
                        other.type_name()
                    )))
                }
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.paths.clear();
    }
}
