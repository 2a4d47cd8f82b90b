//! Error taxonomy for the reconciliation core.
//!
//! None of these are fatal to a report. They are raised where they occur,
//! logged, and folded into [`ReportWarning`] entries so the caller receives a
//! best-effort report plus a list of what was degraded.

use serde::{Deserialize, Serialize};

/// Errors produced while loading pools or collecting allocations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("Invalid network '{cidr}': {reason}")]
    InvalidNetwork { cidr: String, reason: String },

    #[error("Invalid pool: {reason}")]
    InvalidPool { reason: String },

    #[error("Invalid address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("Allocation collection failed for cloud {cloud}: {reason}")]
    CollectionFailure { cloud: String, reason: String },
}

impl ReconcileError {
    pub fn collection(cloud: &str, reason: impl Into<String>) -> Self {
        ReconcileError::CollectionFailure {
            cloud: cloud.to_string(),
            reason: reason.into(),
        }
    }

    fn kind(&self) -> WarningKind {
        match self {
            ReconcileError::InvalidNetwork { .. } => WarningKind::InvalidNetwork,
            ReconcileError::InvalidPool { .. } => WarningKind::InvalidPool,
            ReconcileError::InvalidAddress { .. } => WarningKind::InvalidAddress,
            ReconcileError::CollectionFailure { .. } => WarningKind::CollectionFailure,
        }
    }
}

/// Category of a degraded-data condition recorded in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    InvalidNetwork,
    InvalidPool,
    InvalidAddress,
    CollectionFailure,
}

/// A non-fatal problem surfaced alongside a report
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportWarning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    pub message: String,
}

impl ReportWarning {
    /// Attach pool context to an error raised while loading that pool
    pub fn for_pool(cloud: &str, pool: &str, err: &ReconcileError) -> Self {
        ReportWarning {
            kind: err.kind(),
            cloud: Some(cloud.to_string()),
            pool: Some(pool.to_string()),
            message: err.to_string(),
        }
    }
}

impl From<&ReconcileError> for ReportWarning {
    fn from(err: &ReconcileError) -> Self {
        let cloud = match err {
            ReconcileError::CollectionFailure { cloud, .. } => Some(cloud.clone()),
            _ => None,
        };
        ReportWarning {
            kind: err.kind(),
            cloud,
            pool: None,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_for_invalid_network() {
        let err = ReconcileError::InvalidNetwork {
            cidr: "10.0.0.0/33".to_string(),
            reason: "invalid IP address syntax".to_string(),
        };

        let warning = ReportWarning::for_pool("vcd", "bad", &err);
        assert_eq!(warning.kind, WarningKind::InvalidNetwork);
        assert_eq!(warning.cloud.as_deref(), Some("vcd"));
        assert_eq!(warning.pool.as_deref(), Some("bad"));
        assert!(warning.message.contains("10.0.0.0/33"));
    }

    #[test]
    fn test_warning_from_collection_failure() {
        let err = ReconcileError::collection("vcd02", "connection refused");
        assert_eq!(
            err.to_string(),
            "Allocation collection failed for cloud vcd02: connection refused"
        );

        let warning = ReportWarning::from(&err);
        assert_eq!(warning.kind, WarningKind::CollectionFailure);
        assert_eq!(warning.cloud.as_deref(), Some("vcd02"));
        assert_eq!(warning.pool, None);
    }
}
