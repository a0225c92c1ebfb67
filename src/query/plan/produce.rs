//! Projection, optional matching, unwinding and row shaping.

use std::collections::HashSet;
use std::vec::IntoIter;

use crate::error::{GraphError, Result};
use crate::query::ast::{ExprId, NamedExpr};
use crate::query::frame::Frame;
use crate::query::plan::{BoxedCursor, Cursor, ExecutionContext, LogicalOperator};
use crate::query::symbol::Symbol;
use crate::query::value::{TypedValue, ValueKey};

/// Plan root of read queries: evaluates the projection expressions and
/// binds each to its output symbol, in column order. The driver reads the
/// bound symbols off the frame and writes the result stream.
#[derive(Debug)]
pub struct Produce {
    pub input: Box<LogicalOperator>,
    pub named_expressions: Vec<NamedExpr>,
}

impl Produce {
    pub fn new(input: Box<LogicalOperator>, named_expressions: Vec<NamedExpr>) -> Self {
        Self {
            input,
            named_expressions,
        }
    }

    /// Column names, in planner-specified order.
    pub fn column_names(&self) -> Vec<String> {
        self.named_expressions
            .iter()
            .map(|named| named.name.clone())
            .collect()
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(ProduceCursor {
            input: self.input.cursor(),
            named_expressions: self.named_expressions.clone(),
        })
    }
}

struct ProduceCursor {
    input: BoxedCursor,
    named_expressions: Vec<NamedExpr>,
}

impl Cursor for ProduceCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.input.pull(frame, ctx)? {
            return Ok(false);
        }
        for named in &self.named_expressions {
            // projections surface the state the query produced
            let value = ctx.evaluator(frame).switch_new().eval(named.expression)?;
            let symbol = ctx.symbol_table.at(named.id)?.clone();
            frame[&symbol] = value;
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

/// Left-outer-join operator. For every input row the optional branch is
/// reset and drained; if it yields nothing, one row is emitted with all
/// optional symbols set to Null.
#[derive(Debug)]
pub struct Optional {
    pub input: Box<LogicalOperator>,
    pub optional: Box<LogicalOperator>,
    pub optional_symbols: Vec<Symbol>,
}

impl Optional {
    pub fn new(
        input: Box<LogicalOperator>,
        optional: Box<LogicalOperator>,
        optional_symbols: Vec<Symbol>,
    ) -> Self {
        Self {
            input,
            optional,
            optional_symbols,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(OptionalCursor {
            input: self.input.cursor(),
            optional: self.optional.cursor(),
            optional_symbols: self.optional_symbols.clone(),
            have_input_row: false,
            optional_produced: false,
        })
    }
}

struct OptionalCursor {
    input: BoxedCursor,
    optional: BoxedCursor,
    optional_symbols: Vec<Symbol>,
    have_input_row: bool,
    optional_produced: bool,
}

impl Cursor for OptionalCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        loop {
            if self.have_input_row {
                if self.optional.pull(frame, ctx)? {
                    self.optional_produced = true;
                    return Ok(true);
                }
                self.have_input_row = false;
                if !self.optional_produced {
                    // the sentinel row, exactly once per unmatched input row
                    for symbol in &self.optional_symbols {
                        frame[symbol] = TypedValue::Null;
                    }
                    return Ok(true);
                }
            }
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            self.have_input_row = true;
            self.optional_produced = false;
            self.optional.reset();
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.optional.reset();
        self.have_input_row = false;
        self.optional_produced = false;
    }
}

/// Emits one row per element of a list expression; Null unwinds to zero
/// rows.
#[derive(Debug)]
pub struct Unwind {
    pub input: Box<LogicalOperator>,
    pub expression: ExprId,
    pub symbol: Symbol,
}

impl Unwind {
    pub fn new(input: Box<LogicalOperator>, expression: ExprId, symbol: Symbol) -> Self {
        Self {
            input,
            expression,
            symbol,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(UnwindCursor {
            input: self.input.cursor(),
            expression: self.expression,
            symbol: self.symbol.clone(),
            elements: None,
        })
    }
}

struct UnwindCursor {
    input: BoxedCursor,
    expression: ExprId,
    symbol: Symbol,
    elements: Option<IntoIter<TypedValue>>,
}

impl Cursor for UnwindCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        loop {
            if let Some(elements) = &mut self.elements {
                if let Some(element) = elements.next() {
                    frame[&self.symbol] = element;
                    return Ok(true);
                }
                self.elements = None;
            }
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            match ctx.evaluator(frame).eval(self.expression)? {
                TypedValue::List(items) => self.elements = Some(items.into_iter()),
                TypedValue::Null => self.elements = Some(Vec::new().into_iter()),
                other => {
                    return Err(GraphError::TypeMismatch(format!(
                        "UNWIND expects a List or Null, got {}",
                        other.type_name()
                    )))
                }
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.elements = None;
    }
}

/// Emits a row only the first time its key tuple is seen. Null equals
/// Null for dedup purposes.
#[derive(Debug)]
pub struct Distinct {
    pub input: Box<LogicalOperator>,
    pub value_symbols: Vec<Symbol>,
}

impl Distinct {
    pub fn new(input: Box<LogicalOperator>, value_symbols: Vec<Symbol>) -> Self {
        Self {
            input,
            value_symbols,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(DistinctCursor {
            input: self.input.cursor(),
            value_symbols: self.value_symbols.clone(),
            seen: HashSet::new(),
        })
    }
}

struct DistinctCursor {
    input: BoxedCursor,
    value_symbols: Vec<Symbol>,
    seen: HashSet<Vec<ValueKey>>,
}

impl Cursor for DistinctCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        while self.input.pull(frame, ctx)? {
            let key: Vec<ValueKey> = self
                .value_symbols
                .iter()
                .map(|symbol| frame[symbol].key())
                .collect();
            if self.seen.insert(key) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.seen.clear();
    }
}

fn evaluate_count(
    frame: &Frame,
    ctx: &ExecutionContext<'_>,
    expression: ExprId,
    what: &str,
) -> Result<usize> {
    match ctx.evaluator(frame).eval(expression)? {
        TypedValue::Int(n) if n >= 0 => Ok(n as usize),
        TypedValue::Int(n) => Err(GraphError::Evaluation(format!(
            "{what} count must be non-negative, got {n}"
        ))),
        other => Err(GraphError::Evaluation(format!(
            "{what} count must be an Int, got {}",
            other.type_name()
        ))),
    }
}

/// Drops the first `n` rows; `n` is evaluated once, on the first pull.
#[derive(Debug)]
pub struct Skip {
    pub input: Box<LogicalOperator>,
    pub expression: ExprId,
}

impl Skip {
    pub fn new(input: Box<LogicalOperator>, expression: ExprId) -> Self {
        Self { input, expression }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(SkipCursor {
            input: self.input.cursor(),
            expression: self.expression,
            to_skip: None,
        })
    }
}

struct SkipCursor {
    input: BoxedCursor,
    expression: ExprId,
    to_skip: Option<usize>,
}

impl Cursor for SkipCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        loop {
            if !self.input.pull(frame, ctx)? {
                return Ok(false);
            }
            let to_skip = match self.to_skip {
                Some(n) => n,
                None => {
                    let n = evaluate_count(frame, ctx, self.expression, "SKIP")?;
                    self.to_skip = Some(n);
                    n
                }
            };
            if to_skip == 0 {
                return Ok(true);
            }
            self.to_skip = Some(to_skip - 1);
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.to_skip = None;
    }
}

/// Passes at most `n` rows; `n` is evaluated once, on the first pull.
#[derive(Debug)]
pub struct Limit {
    pub input: Box<LogicalOperator>,
    pub expression: ExprId,
}

impl Limit {
    pub fn new(input: Box<LogicalOperator>, expression: ExprId) -> Self {
        Self { input, expression }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(LimitCursor {
            input: self.input.cursor(),
            expression: self.expression,
            remaining: None,
        })
    }
}

struct LimitCursor {
    input: BoxedCursor,
    expression: ExprId,
    remaining: Option<usize>,
}

impl Cursor for LimitCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        let remaining = match self.remaining {
            Some(n) => n,
            None => {
                let n = evaluate_count(frame, ctx, self.expression, "LIMIT")?;
                self.remaining = Some(n);
                n
            }
        };
        if remaining == 0 {
            return Ok(false);
        }
        if !self.input.pull(frame, ctx)? {
            self.remaining = Some(0);
            return Ok(false);
        }
        self.remaining = Some(remaining - 1);
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.remaining = None;
    }
}
