//! Row-dropping operators.

use crate::error::{GraphError, Result};
use crate::query::ast::ExprId;
use crate::query::frame::Frame;
use crate::query::plan::{BoxedCursor, Cursor, ExecutionContext, LogicalOperator};
use crate::query::symbol::Symbol;
use crate::query::value::TypedValue;
use crate::storage::{EdgeTypeId, LabelId, PropertyId};

/// Keeps rows whose expression evaluates to exactly Boolean True; False
/// and Null both drop the row.
#[derive(Debug)]
pub struct Filter {
    pub input: Box<LogicalOperator>,
    pub expression: ExprId,
}

impl Filter {
    pub fn new(input: Box<LogicalOperator>, expression: ExprId) -> Self {
        Self { input, expression }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(FilterCursor {
            input: self.input.cursor(),
            expression: self.expression,
        })
    }
}

struct FilterCursor {
    input: BoxedCursor,
    expression: ExprId,
}

impl Cursor for FilterCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        while self.input.pull(frame, ctx)? {
            if ctx.evaluator(frame).eval(self.expression)?.is_true() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Drops rows whose vertex is missing a required label or whose property
/// comparison fails. Properties compare under the OLD view, so filtering
/// is stable against writes of the current command.
#[derive(Debug)]
pub struct NodeFilter {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub labels: Vec<LabelId>,
    pub properties: Vec<(PropertyId, ExprId)>,
}

impl NodeFilter {
    pub fn new(
        input: Box<LogicalOperator>,
        symbol: Symbol,
        labels: Vec<LabelId>,
        properties: Vec<(PropertyId, ExprId)>,
    ) -> Self {
        Self {
            input,
            symbol,
            labels,
            properties,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(NodeFilterCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            labels: self.labels.clone(),
            properties: self.properties.clone(),
        })
    }
}

struct NodeFilterCursor {
    input: BoxedCursor,
    symbol: Symbol,
    labels: Vec<LabelId>,
    properties: Vec<(PropertyId, ExprId)>,
}

impl NodeFilterCursor {
    fn accepts(&self, frame: &Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        let mut vertex = match &frame[&self.symbol] {
            TypedValue::Vertex(vertex) => *vertex,
            other => {
                return Err(GraphError::TypeMismatch(format!(
                    "node filter expects a vertex, got {}",
                    other.type_name()
                )))
            }
        };
        vertex.switch_old();
        for label in &self.labels {
            if !ctx.dba.has_label(&vertex, *label)? {
                return Ok(false);
            }
        }
        for (property, expression) in &self.properties {
            let expected = ctx.evaluator(frame).switch_old().eval(*expression)?;
            let stored = TypedValue::from(ctx.dba.vertex_property(&vertex, *property)?);
            if !stored.eq_value(&expected).is_true() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Cursor for NodeFilterCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        while self.input.pull(frame, ctx)? {
            if self.accepts(frame, ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Edge counterpart of [`NodeFilter`]: the edge must carry one of the
/// listed types (empty list admits all) and satisfy every property
/// comparison, both checked under the OLD view.
#[derive(Debug)]
pub struct EdgeFilter {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub edge_types: Vec<EdgeTypeId>,
    pub properties: Vec<(PropertyId, ExprId)>,
}

impl EdgeFilter {
    pub fn new(
        input: Box<LogicalOperator>,
        symbol: Symbol,
        edge_types: Vec<EdgeTypeId>,
        properties: Vec<(PropertyId, ExprId)>,
    ) -> Self {
        Self {
            input,
            symbol,
            edge_types,
            properties,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(EdgeFilterCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            edge_types: self.edge_types.clone(),
            properties: self.properties.clone(),
        })
    }
}

struct EdgeFilterCursor {
    input: BoxedCursor,
    symbol: Symbol,
    edge_types: Vec<EdgeTypeId>,
    properties: Vec<(PropertyId, ExprId)>,
}

impl EdgeFilterCursor {
    fn accepts(&self, frame: &Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        let mut edge = match &frame[&self.symbol] {
            TypedValue::Edge(edge) => *edge,
            other => {
                return Err(GraphError::TypeMismatch(format!(
                    "edge filter expects an edge, got {}",
                    other.type_name()
                )))
            }
        };
        edge.switch_old();
        if !self.edge_types.is_empty() && !self.edge_types.contains(&edge.edge_type) {
            return Ok(false);
        }
        for (property, expression) in &self.properties {
            let expected = ctx.evaluator(frame).switch_old().eval(*expression)?;
            let stored = TypedValue::from(ctx.dba.edge_property(&edge, *property)?);
            if !stored.eq_value(&expected).is_true() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Cursor for EdgeFilterCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        while self.input.pull(frame, ctx)? {
            if self.accepts(frame, ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Enforces default edge-isomorphism on expansions: the freshly expanded
/// value must differ from every previously bound value. Works for vertex
/// and edge symbols alike, since handle equality is identity.
#[derive(Debug)]
pub struct ExpandUniquenessFilter {
    pub input: Box<LogicalOperator>,
    pub expand_symbol: Symbol,
    pub previous_symbols: Vec<Symbol>,
}

impl ExpandUniquenessFilter {
    pub fn new(
        input: Box<LogicalOperator>,
        expand_symbol: Symbol,
        previous_symbols: Vec<Symbol>,
    ) -> Self {
        Self {
            input,
            expand_symbol,
            previous_symbols,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(ExpandUniquenessFilterCursor {
            input: self.input.cursor(),
            expand_symbol: self.expand_symbol.clone(),
            previous_symbols: self.previous_symbols.clone(),
        })
    }
}

struct ExpandUniquenessFilterCursor {
    input: BoxedCursor,
    expand_symbol: Symbol,
    previous_symbols: Vec<Symbol>,
}

impl Cursor for ExpandUniquenessFilterCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        'rows: while self.input.pull(frame, ctx)? {
            let expanded = &frame[&self.expand_symbol];
            for previous in &self.previous_symbols {
                if frame[previous].eq_value(expanded).is_true() {
                    continue 'rows;
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}
