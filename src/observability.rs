//! Observability module for correlation and tracing

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID for tracking one execution across components
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Create a new random correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Trace position of one operation execution
///
/// Nested executions (a handler executing another operation) share the
/// root's `trace_id` and point at their parent's `correlation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// Identifier shared by every execution in one call tree
    pub trace_id: CorrelationId,

    /// Identifier of this execution
    pub correlation_id: CorrelationId,

    /// Execution that started this one, if any
    pub parent_id: Option<CorrelationId>,

    /// Operation kind being executed
    pub operation: String,
}

impl TraceContext {
    /// Start a new call tree
    pub fn root(operation: &str) -> Self {
        let id = CorrelationId::new();
        Self {
            trace_id: id,
            correlation_id: id,
            parent_id: None,
            operation: operation.to_string(),
        }
    }

    /// Context for an execution started from within this one
    pub fn child(&self, operation: &str) -> Self {
        Self {
            trace_id: self.trace_id,
            correlation_id: CorrelationId::new(),
            parent_id: Some(self.correlation_id),
            operation: operation.to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_display_roundtrip() {
        let id = CorrelationId::new();
        let parsed = CorrelationId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(CorrelationId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_child_context_shares_trace() {
        let root = TraceContext::root("CreateAsset");
        let child = root.child("FetchAsset");

        assert!(root.is_root());
        assert!(!child.is_root());
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_id, Some(root.correlation_id));
        assert_ne!(child.correlation_id, root.correlation_id);
        assert_eq!(child.operation, "FetchAsset");
    }

    #[test]
    fn test_trace_context_serializes_for_logs() {
        let root = TraceContext::root("Ping");
        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["operation"], "Ping");
        assert_eq!(json["parent_id"], serde_json::Value::Null);

        let back: TraceContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, root);
    }
}
