//! Pull-based logical operators.
//!
//! A plan is a tree of operators; executing it opens one cursor per
//! operator. `Cursor::pull` produces the next row by assigning the
//! operator's output symbols on the frame, returning false forever once
//! exhausted. Parents may `reset` children to re-stream them (Cartesian
//! re-scans, Optional right branches, Merge branches).

pub mod aggregate;
pub mod expand;
pub mod filter;
pub mod produce;
pub mod scan;
pub mod write;

pub use aggregate::{Accumulate, Aggregate, AggregateElement, OrderBy, Ordering, SortItem};
pub use expand::{Expand, ExpandVariable, ExpansionLambda};
pub use filter::{EdgeFilter, ExpandUniquenessFilter, Filter, NodeFilter};
pub use produce::{Distinct, Limit, Optional, Produce, Skip, Unwind};
pub use scan::{Once, ScanAll, ScanAllByLabel, ScanAllByLabelProperty};
pub use write::{
    CreateExpand, CreateIndex, CreateNode, Delete, EdgeCreationInfo, Merge, NodeCreationInfo,
    RemoveLabels, RemoveProperty, SetLabels, SetProperty,
};

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::query::ast::AstStorage;
use crate::query::eval::ExpressionEvaluator;
use crate::query::frame::Frame;
use crate::query::symbol::SymbolTable;
use crate::storage::{GraphAccessor, View};

/// Edge traversal direction for expansions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

/// Shared, read-only state of one execution plus the cancellation token.
pub struct ExecutionContext<'a> {
    pub ast: &'a AstStorage,
    pub symbol_table: &'a SymbolTable,
    pub dba: &'a GraphAccessor,
    cancel: Option<Arc<AtomicBool>>,
    default_view: View,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(ast: &'a AstStorage, symbol_table: &'a SymbolTable, dba: &'a GraphAccessor) -> Self {
        Self {
            ast,
            symbol_table,
            dba,
            cancel: None,
            default_view: View::Old,
        }
    }

    pub fn with_cancel_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = Some(token);
        self
    }

    /// View that scans fall back to when their selector is AS_IS; comes
    /// from the `graph_view_default` engine option.
    pub fn with_default_view(mut self, view: View) -> Self {
        self.default_view = view;
        self
    }

    pub fn default_view(&self) -> View {
        self.default_view
    }

    /// Checked at every cursor pull boundary.
    pub fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(AtomicOrdering::SeqCst) => Err(GraphError::Cancelled),
            _ => Ok(()),
        }
    }

    pub fn evaluator<'f>(&'f self, frame: &'f Frame) -> ExpressionEvaluator<'f> {
        ExpressionEvaluator::new(frame, self.symbol_table, self.ast, self.dba)
    }
}

/// Stateful pull iterator attached to one logical operator.
pub trait Cursor {
    /// Produces the next row by assigning output symbols on the frame.
    /// Returns false when exhausted; exhaustion is sticky until `reset`.
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool>;

    /// Rewinds the cursor (and its children) to stream from the start.
    fn reset(&mut self);
}

pub type BoxedCursor = Box<dyn Cursor>;

/// Sum type over every operator kind; one cursor type per variant.
#[derive(Debug)]
pub enum LogicalOperator {
    Once(Once),
    ScanAll(ScanAll),
    ScanAllByLabel(ScanAllByLabel),
    ScanAllByLabelProperty(ScanAllByLabelProperty),
    Expand(Expand),
    ExpandVariable(ExpandVariable),
    Filter(Filter),
    NodeFilter(NodeFilter),
    EdgeFilter(EdgeFilter),
    ExpandUniquenessFilter(ExpandUniquenessFilter),
    Produce(Produce),
    Optional(Optional),
    Unwind(Unwind),
    Distinct(Distinct),
    Skip(Skip),
    Limit(Limit),
    Accumulate(Accumulate),
    Aggregate(Aggregate),
    OrderBy(OrderBy),
    CreateNode(CreateNode),
    CreateExpand(CreateExpand),
    SetProperty(SetProperty),
    SetLabels(SetLabels),
    RemoveProperty(RemoveProperty),
    RemoveLabels(RemoveLabels),
    Delete(Delete),
    Merge(Merge),
    CreateIndex(CreateIndex),
}

impl LogicalOperator {
    /// Opens a fresh cursor for this operator subtree.
    pub fn cursor(&self) -> BoxedCursor {
        match self {
            LogicalOperator::Once(op) => op.cursor(),
            LogicalOperator::ScanAll(op) => op.cursor(),
            LogicalOperator::ScanAllByLabel(op) => op.cursor(),
            LogicalOperator::ScanAllByLabelProperty(op) => op.cursor(),
            LogicalOperator::Expand(op) => op.cursor(),
            LogicalOperator::ExpandVariable(op) => op.cursor(),
            LogicalOperator::Filter(op) => op.cursor(),
            LogicalOperator::NodeFilter(op) => op.cursor(),
            LogicalOperator::EdgeFilter(op) => op.cursor(),
            LogicalOperator::ExpandUniquenessFilter(op) => op.cursor(),
            LogicalOperator::Produce(op) => op.cursor(),
            LogicalOperator::Optional(op) => op.cursor(),
            LogicalOperator::Unwind(op) => op.cursor(),
            LogicalOperator::Distinct(op) => op.cursor(),
            LogicalOperator::Skip(op) => op.cursor(),
            LogicalOperator::Limit(op) => op.cursor(),
            LogicalOperator::Accumulate(op) => op.cursor(),
            LogicalOperator::Aggregate(op) => op.cursor(),
            LogicalOperator::OrderBy(op) => op.cursor(),
            LogicalOperator::CreateNode(op) => op.cursor(),
            LogicalOperator::CreateExpand(op) => op.cursor(),
            LogicalOperator::SetProperty(op) => op.cursor(),
            LogicalOperator::SetLabels(op) => op.cursor(),
            LogicalOperator::RemoveProperty(op) => op.cursor(),
            LogicalOperator::RemoveLabels(op) => op.cursor(),
            LogicalOperator::Delete(op) => op.cursor(),
            LogicalOperator::Merge(op) => op.cursor(),
            LogicalOperator::CreateIndex(op) => op.cursor(),
        }
    }

    /// The Produce at the plan root, if this is a read plan.
    pub fn as_produce(&self) -> Option<&Produce> {
        match self {
            LogicalOperator::Produce(op) => Some(op),
            _ => None,
        }
    }
}
