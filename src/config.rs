use serde::{Deserialize, Serialize};

use crate::storage::GraphView;

/// Engine options recognized by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cancellation deadline for a single query execution. Zero disables the
    /// timeout.
    pub query_execution_timeout_ms: u64,
    /// Memoize operator trees by query text.
    pub query_plan_cache: bool,
    /// View applied to scans that do not force one.
    pub graph_view_default: GraphView,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_execution_timeout_ms: 0,
            query_plan_cache: true,
            graph_view_default: GraphView::AsIs,
        }
    }
}

impl Config {
    /// Interactive preset: bounded queries, plan cache on.
    pub fn interactive() -> Self {
        Self {
            query_execution_timeout_ms: 10_000,
            ..Self::default()
        }
    }

    /// Returns the timeout as a `Duration`, or `None` when disabled.
    pub fn execution_timeout(&self) -> Option<std::time::Duration> {
        match self.query_execution_timeout_ms {
            0 => None,
            ms => Some(std::time::Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_timeout() {
        let config = Config::default();
        assert_eq!(config.execution_timeout(), None);
        assert!(config.query_plan_cache);
        assert_eq!(config.graph_view_default, GraphView::AsIs);
    }

    #[test]
    fn round_trips_through_serde() {
        let config = Config::interactive();
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: Config = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.query_execution_timeout_ms, 10_000);
        assert_eq!(decoded.graph_view_default, GraphView::AsIs);
    }
}
