//! Materializing operators: Accumulate, Aggregate and OrderBy.

use std::cmp;
use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::query::ast::{AggregationOp, ExprId};
use crate::query::frame::Frame;
use crate::query::plan::{BoxedCursor, Cursor, ExecutionContext, LogicalOperator};
use crate::query::symbol::Symbol;
use crate::query::value::{TypedValue, ValueKey};

/// Fully drains its input into a buffer, then replays it. With
/// `advance_command` the command boundary moves between the two phases,
/// so reads issued downstream see the buffered phase's writes under OLD.
#[derive(Debug)]
pub struct Accumulate {
    pub input: Box<LogicalOperator>,
    pub symbols: Vec<Symbol>,
    pub advance_command: bool,
}

impl Accumulate {
    pub fn new(input: Box<LogicalOperator>, symbols: Vec<Symbol>, advance_command: bool) -> Self {
        Self {
            input,
            symbols,
            advance_command,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(AccumulateCursor {
            input: self.input.cursor(),
            symbols: self.symbols.clone(),
            advance_command: self.advance_command,
            buffer: Vec::new(),
            next: 0,
            materialized: false,
        })
    }
}

struct AccumulateCursor {
    input: BoxedCursor,
    symbols: Vec<Symbol>,
    advance_command: bool,
    buffer: Vec<Vec<TypedValue>>,
    next: usize,
    materialized: bool,
}

impl Cursor for AccumulateCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.materialized {
            while self.input.pull(frame, ctx)? {
                self.buffer
                    .push(self.symbols.iter().map(|s| frame[s].clone()).collect());
            }
            if self.advance_command {
                ctx.dba.advance_command();
            }
            self.materialized = true;
        }
        match self.buffer.get(self.next) {
            Some(row) => {
                for (symbol, value) in self.symbols.iter().zip(row) {
                    frame[symbol] = value.clone();
                }
                self.next += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.buffer.clear();
        self.next = 0;
        self.materialized = false;
    }
}

/// One aggregation column: the folded expression (`None` for `count(*)`),
/// the fold kind, and the symbol the result lands in.
#[derive(Debug, Clone)]
pub struct AggregateElement {
    pub value: Option<ExprId>,
    pub op: AggregationOp,
    pub output_symbol: Symbol,
}

/// Hash-groups its input by the group-by expressions and folds every
/// aggregation per group. Emits once the input is exhausted, restoring
/// the `remember` symbols from the first row of each group.
///
/// Grouping keys use value identity, so an all-Null key column forms a
/// single Null group.
#[derive(Debug)]
pub struct Aggregate {
    pub input: Box<LogicalOperator>,
    pub group_by: Vec<ExprId>,
    pub aggregations: Vec<AggregateElement>,
    pub remember: Vec<Symbol>,
}

impl Aggregate {
    pub fn new(
        input: Box<LogicalOperator>,
        group_by: Vec<ExprId>,
        aggregations: Vec<AggregateElement>,
        remember: Vec<Symbol>,
    ) -> Self {
        Self {
            input,
            group_by,
            aggregations,
            remember,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(AggregateCursor {
            input: self.input.cursor(),
            group_by: self.group_by.clone(),
            aggregations: self.aggregations.clone(),
            remember: self.remember.clone(),
            groups: Vec::new(),
            group_index: HashMap::new(),
            next: 0,
            materialized: false,
        })
    }
}

/// Running state of one aggregation within one group.
enum Fold {
    Count(i64),
    Sum(TypedValue),
    Avg { sum: f64, count: i64 },
    Min(Option<TypedValue>),
    Max(Option<TypedValue>),
    Collect(Vec<TypedValue>),
}

impl Fold {
    fn seed(op: AggregationOp) -> Self {
        match op {
            AggregationOp::Count => Fold::Count(0),
            AggregationOp::Sum => Fold::Sum(TypedValue::Int(0)),
            AggregationOp::Avg => Fold::Avg { sum: 0.0, count: 0 },
            AggregationOp::Min => Fold::Min(None),
            AggregationOp::Max => Fold::Max(None),
            AggregationOp::Collect => Fold::Collect(Vec::new()),
        }
    }

    /// Folds one input; `None` is a `count(*)` row, which always counts.
    /// Null values are excluded from every aggregation.
    fn update(&mut self, value: Option<TypedValue>) -> Result<()> {
        match self {
            Fold::Count(count) => {
                if !matches!(&value, Some(v) if v.is_null()) {
                    *count += 1;
                }
            }
            Fold::Sum(sum) => {
                if let Some(value) = value {
                    if !value.is_null() {
                        require_numeric(&value, "SUM")?;
                        *sum = sum.add(&value)?;
                    }
                }
            }
            Fold::Avg { sum, count } => {
                if let Some(value) = value {
                    match value {
                        TypedValue::Null => {}
                        TypedValue::Int(i) => {
                            *sum += i as f64;
                            *count += 1;
                        }
                        TypedValue::Double(d) => {
                            *sum += d;
                            *count += 1;
                        }
                        other => return Err(numeric_mismatch(&other, "AVG")),
                    }
                }
            }
            Fold::Min(min) => {
                if let Some(value) = value {
                    if !value.is_null() {
                        let replace = match min {
                            None => true,
                            Some(current) => {
                                matches!(value.partial_order(current)?, Some(cmp::Ordering::Less))
                            }
                        };
                        if replace {
                            *min = Some(value);
                        }
                    }
                }
            }
            Fold::Max(max) => {
                if let Some(value) = value {
                    if !value.is_null() {
                        let replace = match max {
                            None => true,
                            Some(current) => matches!(
                                value.partial_order(current)?,
                                Some(cmp::Ordering::Greater)
                            ),
                        };
                        if replace {
                            *max = Some(value);
                        }
                    }
                }
            }
            Fold::Collect(items) => {
                if let Some(value) = value {
                    if !value.is_null() {
                        items.push(value);
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> TypedValue {
        match self {
            Fold::Count(count) => TypedValue::Int(count),
            Fold::Sum(sum) => sum,
            Fold::Avg { sum, count } => {
                if count == 0 {
                    TypedValue::Null
                } else {
                    TypedValue::Double(sum / count as f64)
                }
            }
            Fold::Min(min) => min.unwrap_or(TypedValue::Null),
            Fold::Max(max) => max.unwrap_or(TypedValue::Null),
            Fold::Collect(items) => TypedValue::List(items),
        }
    }

    /// Result for the seed row on empty, ungrouped input.
    fn empty_value(op: AggregationOp) -> TypedValue {
        match op {
            AggregationOp::Count | AggregationOp::Sum => TypedValue::Int(0),
            _ => TypedValue::Null,
        }
    }
}

fn require_numeric(value: &TypedValue, what: &str) -> Result<()> {
    match value {
        TypedValue::Int(_) | TypedValue::Double(_) => Ok(()),
        other => Err(numeric_mismatch(other, what)),
    }
}

fn numeric_mismatch(value: &TypedValue, what: &str) -> GraphError {
    GraphError::TypeMismatch(format!(
        "{what} requires numeric input, got {}",
        value.type_name()
    ))
}

struct Group {
    remembered: Vec<TypedValue>,
    folds: Vec<Fold>,
}

struct AggregateCursor {
    input: BoxedCursor,
    group_by: Vec<ExprId>,
    aggregations: Vec<AggregateElement>,
    remember: Vec<Symbol>,
    groups: Vec<Group>,
    group_index: HashMap<Vec<ValueKey>, usize>,
    next: usize,
    materialized: bool,
}

impl AggregateCursor {
    fn drain(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<()> {
        while self.input.pull(frame, ctx)? {
            let mut key = Vec::with_capacity(self.group_by.len());
            for expression in &self.group_by {
                key.push(ctx.evaluator(frame).switch_new().eval(*expression)?.key());
            }
            let group_slot = match self.group_index.get(&key) {
                Some(slot) => *slot,
                None => {
                    let slot = self.groups.len();
                    self.groups.push(Group {
                        remembered: self.remember.iter().map(|s| frame[s].clone()).collect(),
                        folds: self
                            .aggregations
                            .iter()
                            .map(|a| Fold::seed(a.op))
                            .collect(),
                    });
                    self.group_index.insert(key, slot);
                    slot
                }
            };
            for (element, fold) in self
                .aggregations
                .iter()
                .zip(self.groups[group_slot].folds.iter_mut())
            {
                let value = match element.value {
                    Some(expression) => {
                        Some(ctx.evaluator(frame).switch_new().eval(expression)?)
                    }
                    None => None,
                };
                fold.update(value)?;
            }
        }
        Ok(())
    }
}

impl Cursor for AggregateCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.materialized {
            self.drain(frame, ctx)?;
            self.materialized = true;
            if self.groups.is_empty() && self.group_by.is_empty() {
                // seed row: zero for counts and sums, Null otherwise
                for element in &self.aggregations {
                    frame[&element.output_symbol] = Fold::empty_value(element.op);
                }
                for symbol in &self.remember {
                    frame[symbol] = TypedValue::Null;
                }
                self.next = usize::MAX;
                return Ok(true);
            }
        }
        if self.next >= self.groups.len() {
            return Ok(false);
        }
        let group = &mut self.groups[self.next];
        for (symbol, value) in self.remember.iter().zip(group.remembered.drain(..)) {
            frame[symbol] = value;
        }
        let folds = std::mem::take(&mut group.folds);
        for (element, fold) in self.aggregations.iter().zip(folds) {
            frame[&element.output_symbol] = fold.finish();
        }
        self.next += 1;
        Ok(true)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.groups.clear();
        self.group_index.clear();
        self.next = 0;
        self.materialized = false;
    }
}

/// Sort direction of one ORDER BY item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct SortItem {
    pub ordering: Ordering,
    pub expression: ExprId,
}

/// Buffers every input row and replays it in sorted order. The sort is
/// stable and lexicographic over the sort items; Null sorts last within
/// ascending items and first within descending ones.
#[derive(Debug)]
pub struct OrderBy {
    pub input: Box<LogicalOperator>,
    pub sort_items: Vec<SortItem>,
    pub remember: Vec<Symbol>,
}

impl OrderBy {
    pub fn new(input: Box<LogicalOperator>, sort_items: Vec<SortItem>, remember: Vec<Symbol>) -> Self {
        Self {
            input,
            sort_items,
            remember,
        }
    }

    pub(crate) fn cursor(&self) -> BoxedCursor {
        Box::new(OrderByCursor {
            input: self.input.cursor(),
            sort_items: self.sort_items.clone(),
            remember: self.remember.clone(),
            rows: Vec::new(),
            next: 0,
            materialized: false,
        })
    }
}

struct OrderByCursor {
    input: BoxedCursor,
    sort_items: Vec<SortItem>,
    remember: Vec<Symbol>,
    /// `(sort keys, remembered symbol values)` per buffered row.
    rows: Vec<(Vec<TypedValue>, Vec<TypedValue>)>,
    next: usize,
    materialized: bool,
}

fn compare_sort_keys(
    left: &[TypedValue],
    right: &[TypedValue],
    items: &[SortItem],
) -> Result<cmp::Ordering> {
    for (item, (a, b)) in items.iter().zip(left.iter().zip(right)) {
        let base = match (a.is_null(), b.is_null()) {
            (true, true) => cmp::Ordering::Equal,
            (true, false) => cmp::Ordering::Greater,
            (false, true) => cmp::Ordering::Less,
            (false, false) => a
                .partial_order(b)
                .map_err(|err| match err {
                    GraphError::TypeMismatch(message) => GraphError::Evaluation(message),
                    other => other,
                })?
                .ok_or_else(|| {
                    GraphError::Internal("non-null values compared as Null".into())
                })?,
        };
        let ordering = match item.ordering {
            Ordering::Asc => base,
            Ordering::Desc => base.reverse(),
        };
        if ordering != cmp::Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(cmp::Ordering::Equal)
}

impl Cursor for OrderByCursor {
    fn pull(&mut self, frame: &mut Frame, ctx: &ExecutionContext<'_>) -> Result<bool> {
        ctx.check_cancelled()?;
        if !self.materialized {
            while self.input.pull(frame, ctx)? {
                let mut keys = Vec::with_capacity(self.sort_items.len());
                for item in &self.sort_items {
                    keys.push(ctx.evaluator(frame).switch_new().eval(item.expression)?);
                }
                let remembered = self.remember.iter().map(|s| frame[s].clone()).collect();
                self.rows.push((keys, remembered));
            }
            let mut sort_error = None;
            let items = std::mem::take(&mut self.sort_items);
            self.rows.sort_by(|a, b| {
                if sort_error.is_some() {
                    return cmp::Ordering::Equal;
                }
                match compare_sort_keys(&a.0, &b.0, &items) {
                    Ok(ordering) => ordering,
                    Err(err) => {
                        sort_error = Some(err);
                        cmp::Ordering::Equal
                    }
                }
            });
            self.sort_items = items;
            if let Some(err) = sort_error {
                return Err(err);
            }
            self.materialized = true;
        }
        match self.rows.get(self.next) {
            Some((_, remembered)) => {
                for (symbol, value) in self.remember.iter().zip(remembered) {
                    frame[symbol] = value.clone();
                }
                self.next += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.rows.clear();
        self.next = 0;
        self.materialized = false;
    }
}
