use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the storage layer and the query engine.
///
/// Operators never catch; the first failure unwinds the cursor tree and the
/// driver aborts the transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A value had the wrong type for the attempted operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Evaluation reached a state with no defined result (mandatory boolean
    /// was Null, integer division by zero, negative skip/limit count).
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    /// A write violated a graph constraint.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// Index creation or lookup inconsistency.
    #[error("schema error: {0}")]
    Schema(String),
    /// The plan itself is semantically invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The execution was cancelled cooperatively (driver token or timeout).
    #[error("query cancelled")]
    Cancelled,
    /// Invariant violation; impossible with a correct planner.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl GraphError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::TypeMismatch(_) => "TypeError",
            GraphError::Evaluation(_) => "EvaluationError",
            GraphError::Constraint(_) => "ConstraintError",
            GraphError::Schema(_) => "SchemaError",
            GraphError::InvalidQuery(_) => "QueryError",
            GraphError::Cancelled => "Cancelled",
            GraphError::Internal(_) => "InternalError",
        }
    }
}
