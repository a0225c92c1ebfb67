//! Drives a plan's cursor tree and feeds the result stream.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::query::ast::AstStorage;
use crate::query::frame::Frame;
use crate::query::plan::{ExecutionContext, LogicalOperator};
use crate::query::stream::{ResultStream, StreamSummary};
use crate::query::symbol::{Symbol, SymbolTable};
use crate::storage::{GraphAccessor, GraphView, View};

const PLAN_CACHE_CAPACITY: usize = 128;

/// A plan ready to execute: the operator tree plus the expression arena
/// and symbol table it was planned against. Immutable, so concurrent
/// executions share it read-only.
#[derive(Debug)]
pub struct PreparedPlan {
    pub ast: AstStorage,
    pub symbol_table: SymbolTable,
    pub root: LogicalOperator,
}

/// Executes prepared plans against a transaction's graph accessor.
///
/// Owns the cancellation plumbing: an atomic token checked at every pull
/// boundary, armed by the caller or by the configured execution timeout.
/// The first error wins and ends the stream; the caller aborts the
/// transaction.
pub struct Executor {
    config: Config,
    plan_cache: Mutex<LruCache<String, Arc<PreparedPlan>>>,
}

impl Executor {
    pub fn new(config: Config) -> Self {
        let capacity = NonZeroUsize::new(PLAN_CACHE_CAPACITY).expect("non-zero capacity");
        Self {
            config,
            plan_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the memoized plan for a query key, building it on a miss.
    /// With the plan cache disabled, builds every time.
    pub fn prepare(
        &self,
        query_key: &str,
        build: impl FnOnce() -> Result<PreparedPlan>,
    ) -> Result<Arc<PreparedPlan>> {
        if !self.config.query_plan_cache {
            return Ok(Arc::new(build()?));
        }
        if let Some(plan) = self.plan_cache.lock().get(query_key) {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(build()?);
        self.plan_cache
            .lock()
            .put(query_key.to_owned(), Arc::clone(&plan));
        Ok(plan)
    }

    /// Runs the plan to exhaustion: header, rows, then summary.
    ///
    /// Read plans (root = Produce) stream one row per pull, reading the
    /// projection symbols off the frame. Write plans run for their side
    /// effects and produce no rows.
    pub fn execute(
        &self,
        plan: &PreparedPlan,
        dba: &GraphAccessor,
        stream: &mut dyn ResultStream,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<()> {
        let token = cancel.unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let deadline = self.config.execution_timeout().map(|t| Instant::now() + t);
        let started = Instant::now();

        let projection = match plan.root.as_produce() {
            Some(produce) => {
                stream.write_header(&produce.column_names())?;
                let mut symbols: Vec<Symbol> = Vec::with_capacity(produce.named_expressions.len());
                for named in &produce.named_expressions {
                    symbols.push(plan.symbol_table.at(named.id)?.clone());
                }
                Some(symbols)
            }
            None => None,
        };

        let default_view = match self.config.graph_view_default {
            GraphView::New => View::New,
            GraphView::AsIs | GraphView::Old => View::Old,
        };
        let ctx = ExecutionContext::new(&plan.ast, &plan.symbol_table, dba)
            .with_cancel_token(Arc::clone(&token))
            .with_default_view(default_view);
        let mut frame = Frame::new(plan.symbol_table.len());
        let mut cursor = plan.root.cursor();
        let mut row_count = 0usize;

        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    token.store(true, Ordering::SeqCst);
                }
            }
            if !cursor.pull(&mut frame, &ctx)? {
                break;
            }
            if let Some(symbols) = &projection {
                let row = symbols.iter().map(|s| frame[s].clone()).collect();
                stream.write_row(row)?;
                row_count += 1;
            }
        }

        let elapsed_micros = started.elapsed().as_micros() as u64;
        debug!(row_count, elapsed_micros, "query finished");
        stream.summary(StreamSummary {
            row_count,
            elapsed_micros,
        })
    }
}
