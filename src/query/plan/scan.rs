//! Row sources: Once and the vertex scans.

use std::vec::IntoIter;

use crate::error::{GraphError, Result};
use crate::query::ast::ExprId;
use crate::query::frame::Frame;
use crate::query::plan::{BoxedCursor, Cursor, ExecutionContext, LogicalOperator};
use crate::query::symbol::Symbol;
use crate::query::value::TypedValue;
use crate::storage::{GraphView, LabelId, PropertyId, PropertyValue, VertexHandle, View};

/// Produces exactly one empty row; the seed of every plan.
#[derive(Debug, Default)]
pub struct Once;

impl Once {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(OnceCursor { did_pull: false })
    }
}

struct OnceCursor {
    did_pull: bool,
}

impl Cursor for OnceCursor {
    fn pull(&mut self, _frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if self.did_pull {
            return Ok(false);
        }
        self.did_pull = true;
        Ok(true)
    }

    fn reset(&mut self) {
        self.did_pull = false;
    }
}

/// Emits one row per vertex in the view, for every input row.
#[derive(Debug)]
pub struct ScanAll {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub view: GraphView,
}

impl ScanAll {
    pub fn new(input: Box<LogicalOperator>, symbol: Symbol, view: GraphView) -> Self {
        Self {
            input,
            symbol,
            view,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(ScanCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            source: VertexSource::All { view: self.view },
            vertices: None,
        })
    }
}

/// ScanAll restricted to the label index.
#[derive(Debug)]
pub struct ScanAllByLabel {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub label: LabelId,
    pub view: GraphView,
}

impl ScanAllByLabel {
    pub fn new(
        input: Box<LogicalOperator>,
        symbol: Symbol,
        label: LabelId,
        view: GraphView,
    ) -> Self {
        Self {
            input,
            symbol,
            label,
            view,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(ScanCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            source: VertexSource::ByLabel {
                label: self.label,
                view: self.view,
            },
            vertices: None,
        })
    }
}

/// Equality probe into a label-property index. The probe expression is
/// re-evaluated every time the scan opens for a new input row.
#[derive(Debug)]
pub struct ScanAllByLabelProperty {
    pub input: Box<LogicalOperator>,
    pub symbol: Symbol,
    pub label: LabelId,
    pub property: PropertyId,
    pub expression: ExprId,
    pub view: GraphView,
}

impl ScanAllByLabelProperty {
    pub fn new(
        input: Box<LogicalOperator>,
        symbol: Symbol,
        label: LabelId,
        property: PropertyId,
        expression: ExprId,
        view: GraphView,
    ) -> Self {
        Self {
            input,
            symbol,
            label,
            property,
            expression,
            view,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(ScanCursor {
            input: self.input.cursor(),
            symbol: self.symbol.clone(),
            source: VertexSource::ByLabelProperty {
                label: self.label,
                property: self.property,
                expression: self.expression,
                view: self.view,
            },
            vertices: None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum VertexSource {
    All {
        view: GraphView,
    },
    ByLabel {
        label: LabelId,
        view: GraphView,
    },
    ByLabelProperty {
        label: LabelId,
        property: PropertyId,
        expression: ExprId,
        view: GraphView,
    },
}

impl VertexSource {
    /// Scans carry no inherited handle, so AS_IS falls back to the
    /// execution's default view.
    fn resolve(view: GraphView, ctx: &ExecutionContext<'_>) -> View {
        view.resolve(ctx.default_view())
    }

    fn open(&self, frame: &Frame, ctx: &ExecutionContext<'_>) -> Result<Vec<VertexHandle>> {
        match self {
            VertexSource::All { view } => Ok(ctx.dba.vertices(Self::resolve(*view, ctx))),
            VertexSource::ByLabel { label, view } => {
                Ok(ctx.dba.vertices_by_label(*label, Self::resolve(*view, ctx)))
            }
            VertexSource::ByLabelProperty {
                label,
                property,
                expression,
                view,
            } => {
                let view = Self::resolve(*view, ctx);
                let mut evaluator = ctx.evaluator(frame);
                if view == View::New {
                    evaluator.switch_new();
                }
                let probe = evaluator.eval(*expression)?;
                let probe = PropertyValue::try_from(probe).map_err(|_| {
                    GraphError::TypeMismatch(
                        "index probe value must be a property value".into(),
                    )
                })?;
                ctx.dba
                    .vertices_by_label_property(*label, *property, &probe, view)
            }
        }
    }
}

struct ScanCursor {
    input: BoxedCursor,
    symbol: Symbol,
    source: VertexSource,
    vertices: Option<IntoIter<VertexHandle>>,
}

impl Cursor for ScanCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        loop {
            if let Some(vertices) = &mut self.vertices {
                if let Some(vertex) = vertices.next() {
                    frame[&self.symbol] = TypedValue::Vertex(vertex);
                    return Ok(true);
                }
                self.vertices = None;
            }
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            self.vertices = Some(self.source.open(frame, ctx)?.into_iter());
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.vertices = None;
    }
}
