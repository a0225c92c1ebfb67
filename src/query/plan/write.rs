//! Mutating operators; every write lands under the NEW view.

use crate::error::{GraphError, Result};
use crate::query::ast::ExprId;
use crate::query::frame::Frame;
use crate::query::plan::{
    BoxedCursor, Cursor, Direction, ExecutionContext, LogicalOperator,
};
use crate::query::symbol::Symbol;
use crate::query::value::TypedValue;
use crate::storage::{
    EdgeTypeId, LabelId, PropertyId, PropertyValue, VertexHandle,
};

/// Blueprint of a vertex to create: output symbol, labels, and property
/// initializers.
#[derive(Debug, Clone)]
pub struct NodeCreationInfo {
    pub symbol: Symbol,
    pub labels: Vec<LabelId>,
    pub properties: Vec<(PropertyId, ExprId)>,
}

/// Blueprint of an edge to create.
#[derive(Debug, Clone)]
pub struct EdgeCreationInfo {
    pub symbol: Symbol,
    pub edge_type: EdgeTypeId,
    pub direction: Direction,
    pub properties: Vec<(PropertyId, ExprId)>,
}

fn create_vertex(
    info: &NodeCreationInfo,
    frame: &mut Frame,
    ctx: &ExecutionContext<'_>,
) -> Result<VertexHandle> {
    let vertex = ctx.dba.insert_vertex();
    for label in &info.labels {
        ctx.dba.add_label(&vertex, *label)?;
    }
    for (property, expression) in &info.properties {
        let value = ctx.evaluator(frame).switch_new().eval(*expression)?;
        ctx.dba
            .set_vertex_property(&vertex, *property, PropertyValue::try_from(value)?)?;
    }
    frame[&info.symbol] = TypedValue::Vertex(vertex);
    Ok(vertex)
}

/// Creates one vertex per input row.
#[derive(Debug)]
pub struct CreateNode {
    pub input: Box<LogicalOperator>,
    pub node: NodeCreationInfo,
}

impl CreateNode {
    pub fn new(input: Box<LogicalOperator>, node: NodeCreationInfo) -> Self {
        Self { input, node }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(CreateNodeCursor {
            input: self.input.cursor(),
            node: self.node.clone(),
        })
    }
}

struct CreateNodeCursor {
    input: BoxedCursor,
    node: NodeCreationInfo,
}

impl Cursor for CreateNodeCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        create_vertex(&self.node, frame, ctx)?;
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Creates the expansion of a pattern: the neighbor vertex (unless it is
/// an existing binding) and the connecting edge. CREATE requires a
/// directed pattern, so `Direction::Both` is rejected.
#[derive(Debug)]
pub struct CreateExpand {
    pub input: Box<LogicalOperator>,
    pub src_symbol: Symbol,
    pub edge: EdgeCreationInfo,
    pub node: NodeCreationInfo,
    pub existing_node: bool,
}

impl CreateExpand {
    pub fn new(
        input: Box<LogicalOperator>,
        src_symbol: Symbol,
        edge: EdgeCreationInfo,
        node: NodeCreationInfo,
        existing_node: bool,
    ) -> Self {
        Self {
            input,
            src_symbol,
            edge,
            node,
            existing_node,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(CreateExpandCursor {
            input: self.input.cursor(),
            src_symbol: self.src_symbol.clone(),
            edge: self.edge.clone(),
            node: self.node.clone(),
            existing_node: self.existing_node,
        })
    }
}

struct CreateExpandCursor {
    input: BoxedCursor,
    src_symbol: Symbol,
    edge: EdgeCreationInfo,
    node: NodeCreationInfo,
    existing_node: bool,
}

impl Cursor for CreateExpandCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        let source = match &frame[&self.src_symbol] {
            TypedValue::Vertex(vertex) => *vertex,
            other => {
                return Err(GraphError::TypeMismatch(format!(
                    "edge source must be a vertex, got {}",
                    other.type_name()
                )))
            }
        };
        let destination = if self.existing_node {
            match &frame[&self.node.symbol] {
                TypedValue::Vertex(vertex) => *vertex,
                other => {
                    return Err(GraphError::TypeMismatch(format!(
                        "existing edge destination must be a vertex, got {}",
                        other.type_name()
                    )))
                }
            }
        } else {
            create_vertex(&self.node, frame, ctx)?
        };
        let edge = match self.edge.direction {
            Direction::Out => ctx.dba.insert_edge(&source, &destination, self.edge.edge_type)?,
            Direction::In => ctx.dba.insert_edge(&destination, &source, self.edge.edge_type)?,
            Direction::Both => {
                return Err(GraphError::InvalidQuery(
                    "cannot create an undirected edge".into(),
                ))
            }
        };
        for (property, expression) in &self.edge.properties {
            let value = ctx.evaluator(frame).switch_new().eval(*expression)?;
            ctx.dba
                .set_edge_property(&edge, *property, PropertyValue::try_from(value)?)?;
        }
        frame[&self.edge.symbol] = TypedValue::Edge(edge);
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// `SET x.p = expr`; a Null value erases the property. A Null object is
/// skipped, so SET composes with optional matches.
#[derive(Debug)]
pub struct SetProperty {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub property: PropertyId,
    pub expression: ExprId,
}

impl SetProperty {
    pub fn new(
        input: Box<LogicalOperator>,
        symbol: Symbol,
        property: PropertyId,
        expression: ExprId,
    ) -> Self {
        Self {
            input,
            symbol,
            property,
            expression,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(SetPropertyCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            property: self.property,
            expression: self.expression,
        })
    }
}

struct SetPropertyCursor {
    input: BoxedCursor,
    symbol: Symbol,
    property: PropertyId,
    expression: ExprId,
}

impl Cursor for SetPropertyCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        let value = ctx.evaluator(frame).switch_new().eval(self.expression)?;
        let value = PropertyValue::try_from(value)?;
        match &frame[&self.symbol] {
            TypedValue::Vertex(vertex) => {
                ctx.dba.set_vertex_property(vertex, self.property, value)?
            }
            TypedValue::Edge(edge) => ctx.dba.set_edge_property(edge, self.property, value)?,
            TypedValue::Null => {}
            other => {
                return Err(GraphError::TypeMismatch(format!(
                    "cannot set a property on {}",
                    other.type_name()
                )))
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Adds labels to a bound vertex; Null is skipped.
#[derive(Debug)]
pub struct SetLabels {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub labels: Vec<LabelId>,
}

impl SetLabels {
    pub fn new(input: Box<LogicalOperator>, symbol: Symbol, labels: Vec<LabelId>) -> Self {
        Self {
            input,
            symbol,
            labels,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(SetLabelsCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            labels: self.labels.clone(),
        })
    }
}

struct SetLabelsCursor {
    input: BoxedCursor,
    symbol: Symbol,
    labels: Vec<LabelId>,
}

impl Cursor for SetLabelsCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        match &frame[&self.symbol] {
            TypedValue::Vertex(vertex) => {
                for label in &self.labels {
                    ctx.dba.add_label(vertex, *label)?;
                }
            }
            TypedValue::Null => {}
            other => {
                return Err(GraphError::TypeMismatch(format!(
                    "cannot set labels on {}",
                    other.type_name()
                )))
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// `REMOVE x.p`: erases the property under NEW.
#[derive(Debug)]
pub struct RemoveProperty {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub property: PropertyId,
}

impl RemoveProperty {
    pub fn new(input: Box<LogicalOperator>, symbol: Symbol, property: PropertyId) -> Self {
        Self {
            input,
            symbol,
            property,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(RemovePropertyCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            property: self.property,
        })
    }
}

struct RemovePropertyCursor {
    input: BoxedCursor,
    symbol: Symbol,
    property: PropertyId,
}

impl Cursor for RemovePropertyCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        match &frame[&self.symbol] {
            TypedValue::Vertex(vertex) => {
                ctx.dba
                    .set_vertex_property(vertex, self.property, PropertyValue::Null)?
            }
            TypedValue::Edge(edge) => {
                ctx.dba
                    .set_edge_property(edge, self.property, PropertyValue::Null)?
            }
            TypedValue::Null => {}
            other => {
                return Err(GraphError::TypeMismatch(format!(
                    "cannot remove a property from {}",
                    other.type_name()
                )))
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Removes labels from a bound vertex; Null is skipped.
#[derive(Debug)]
pub struct RemoveLabels {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub labels: Vec<LabelId>,
}

impl RemoveLabels {
    pub fn new(input: Box<LogicalOperator>, symbol: Symbol, labels: Vec<LabelId>) -> Self {
        Self {
            input,
            symbol,
            labels,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(RemoveLabelsCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            labels: self.labels.clone(),
        })
    }
}

struct RemoveLabelsCursor {
    input: BoxedCursor,
    symbol: Symbol,
    labels: Vec<LabelId>,
}

impl Cursor for RemoveLabelsCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        match &frame[&self.symbol] {
            TypedValue::Vertex(vertex) => {
                for label in &self.labels {
                    ctx.dba.remove_label(vertex, *label)?;
                }
            }
            TypedValue::Null => {}
            other => {
                return Err(GraphError::TypeMismatch(format!(
                    "cannot remove labels from {}",
                    other.type_name()
                )))
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Deletes the evaluated vertices and edges. Edges are deleted before
/// vertices, so deleting a vertex together with its edges needs no
/// detach. Without `detach`, a vertex that still has edges fails the
/// query part.
#[derive(Debug)]
pub struct Delete {
    pub input: Box<LogicalOperator>,
    pub expressions: Vec<ExprId>,
    pub detach: bool,
}

impl Delete {
    pub fn new(input: Box<LogicalOperator>, expressions: Vec<ExprId>, detach: bool) -> Self {
        Self {
            input,
            expressions,
            detach,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(DeleteCursor {
            input: self.input.cursor(),
            expressions: self.expressions.clone(),
            detach: self.detach,
        })
    }
}

struct DeleteCursor {
    input: BoxedCursor,
    expressions: Vec<ExprId>,
    detach: bool,
}

impl Cursor for DeleteCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        let mut targets = Vec::with_capacity(self.expressions.len());
        for expression in &self.expressions {
            targets.push(ctx.evaluator(frame).switch_new().eval(*expression)?);
        }
        for target in &targets {
            if let TypedValue::Edge(edge) = target {
                ctx.dba.remove_edge(edge)?;
            }
        }
        for target in targets {
            match target {
                TypedValue::Edge(_) | TypedValue::Null => {}
                TypedValue::Vertex(vertex) => {
                    if self.detach {
                        ctx.dba.detach_remove_vertex(&vertex)?;
                    } else {
                        ctx.dba.remove_vertex(&vertex)?;
                    }
                }
                other => {
                    return Err(GraphError::TypeMismatch(format!(
                        "cannot delete {}",
                        other.type_name()
                    )))
                }
            }
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// For each input row, streams the match branch; if it yields nothing,
/// pulls the create branch once. Both branches are reset per input row
/// and communicate through the shared frame.
#[derive(Debug)]
pub struct Merge {
    pub input: Box<LogicalOperator>,
    pub merge_match: Box<LogicalOperator>,
    pub merge_create: Box<LogicalOperator>,
}

impl Merge {
    pub fn new(
        input: Box<LogicalOperator>,
        merge_match: Box<LogicalOperator>,
        merge_create: Box<LogicalOperator>,
    ) -> Self {
        Self {
            input,
            merge_match,
            merge_create,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(MergeCursor {
            input: self.input.cursor(),
            merge_match: self.merge_match.cursor(),
            merge_create: self.merge_create.cursor(),
            need_input: true,
            matched: false,
        })
    }
}

struct MergeCursor {
    input: BoxedCursor,
    merge_match: BoxedCursor,
    merge_create: BoxedCursor,
    need_input: bool,
    matched: bool,
}

impl Cursor for MergeCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        loop {
            if self.need_input {
                if !self.input.pull(frame, ctx)? {
                    return Ok(false);
                }
                self.need_input = false;
                self.matched = false;
                self.merge_match.reset();
                self.merge_create.reset();
            }
            if self.merge_match.pull(frame, ctx)? {
                self.matched = true;
                return Ok(true);
            }
            self.need_input = true;
            if !self.matched && self.merge_create.pull(frame, ctx)? {
                return Ok(true);
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.merge_match.reset();
        self.merge_create.reset();
        self.need_input = true;
        self.matched = false;
    }
}

/// Issues index creation; fails if the index already exists. Produces no
/// rows.
#[derive(Debug)]
pub struct CreateIndex {
    pub label: LabelId,
    pub property: PropertyId,
}

impl CreateIndex {
    pub fn new(label: LabelId, property: PropertyId) -> Self {
        Self { label, property }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(CreateIndexCursor {
            label: self.label,
            property: self.property,
            done: false,
        })
    }
}

struct CreateIndexCursor {
    label: LabelId,
    property: PropertyId,
    done: bool,
}

impl Cursor for CreateIndexCursor {
    fn pull(&mut self, _frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if self.done {
            return Ok(false);
        }
        self.done = true;
        ctx.dba.build_index(self.label, self.property)?;
        Ok(false)
    }

    fn reset(&mut self) {
        self.done = false;
    }
}
