pub mod config;
pub mod error;
pub mod query;
pub mod storage;

pub use crate::config::Config;
pub use crate::error::{GraphError, Result};
pub use crate::query::value::TypedValue;
pub use crate::storage::{
    EdgeHandle, EdgeId, GraphAccessor, GraphStore, GraphView, PropertyValue, VertexHandle,
    VertexId, View,
};
