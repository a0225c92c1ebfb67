//! Query execution engine.
//!
//! A plan is a tree of pull-based logical operators built against an
//! expression arena and a symbol table. Executing it opens a frame (one
//! slot per symbol) and drives the root cursor; the Produce at the root
//! of read plans projects frame slots into the result stream.

pub mod ast;
pub mod eval;
pub mod executor;
pub mod frame;
pub mod plan;
pub mod stream;
pub mod symbol;
pub mod value;

pub use executor::{Executor, PreparedPlan};
pub use frame::Frame;
pub use stream::{ResultStream, StreamCollector, StreamSummary};
pub use symbol::{Symbol, SymbolTable};
pub use value::TypedValue;
