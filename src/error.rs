//! Error types for the tenant-master operator
//!
//! Provides structured error types for all operator components including the
//! backend API client, response classification, the provisioning state
//! machines, and the reconciler, plus the requeue policy applied when a
//! reconciliation attempt fails.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{object} has no '{field}' entry")]
    MissingField { object: String, field: String },

    // =========================================================================
    // Backend API Errors
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Backend(#[from] SdkError),

    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    #[error("No cluster named '{name}' is registered with the backend")]
    ClusterNotRegistered { name: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("{operation} of cluster({cluster}) timed out after {}s", .waited.as_secs())]
    Timeout {
        operation: &'static str,
        cluster: String,
        waited: Duration,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Backend SDK Errors
// =============================================================================

/// Error codes returned by the ASK control-plane API.
///
/// Only the codes that change the provisioner's behavior get their own
/// variant; everything else is carried verbatim in [`AskErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskErrorCode {
    /// `ErrorClusterNotFound`: the referenced cluster does not exist.
    ClusterNotFound,
    /// `ErrorCheckAcl`: the operation is not supported for the cluster.
    OperationNotSupported,
    /// `ClusterNameAlreadyExist`: a cluster with the requested name exists.
    ClusterNameAlreadyExist,
    /// Any other code, propagated as-is.
    Other(String),
}

impl AskErrorCode {
    /// Map a literal code string from a backend error body.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ErrorClusterNotFound" => AskErrorCode::ClusterNotFound,
            "ErrorCheckAcl" => AskErrorCode::OperationNotSupported,
            "ClusterNameAlreadyExist" => AskErrorCode::ClusterNameAlreadyExist,
            other => AskErrorCode::Other(other.to_string()),
        }
    }

    /// The literal code string as the backend spells it.
    pub fn as_str(&self) -> &str {
        match self {
            AskErrorCode::ClusterNotFound => "ErrorClusterNotFound",
            AskErrorCode::OperationNotSupported => "ErrorCheckAcl",
            AskErrorCode::ClusterNameAlreadyExist => "ClusterNameAlreadyExist",
            AskErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for AskErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured view of an error response returned by the backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Aliyun SDK error: errorName({name}), errorCode({code}), errorMessage({message})")]
pub struct SdkError {
    /// Error name from the head line of the response (e.g. `SDK.ServerError`)
    pub name: String,
    /// Enumerated error code from the `Message` payload
    pub code: AskErrorCode,
    /// Human-readable message from the `Message` payload
    pub message: String,
}

impl SdkError {
    /// True for codes that mean the cluster is absent or out of reach of the
    /// delete flow (`ErrorClusterNotFound` / `ErrorCheckAcl`).
    pub fn is_cluster_gone(&self) -> bool {
        matches!(
            self.code,
            AskErrorCode::ClusterNotFound | AskErrorCode::OperationNotSupported
        )
    }

    /// True when the backend rejected a create because the name is taken.
    pub fn is_name_conflict(&self) -> bool {
        self.code == AskErrorCode::ClusterNameAlreadyExist
    }
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// True for codes that mean the cluster is absent or out of reach of the
    /// delete flow; such probe failures count as "already gone".
    pub fn is_cluster_gone(&self) -> bool {
        matches!(self, Error::Backend(sdk) if sdk.is_cluster_gone())
    }

    /// True when the backend rejected a create because the name is taken.
    pub fn is_name_conflict(&self) -> bool {
        matches!(self, Error::Backend(sdk) if sdk.is_name_conflict())
    }

    /// True for the Kubernetes "already exists" conflict on object creation.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(ae)) if ae.code == 409)
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Transport(_) | Error::Kube(_) => ErrorAction::RequeueWithBackoff,

            // The bounded wait elapsed while the remote operation was still
            // in flight; re-observe once it has had time to settle.
            Error::Timeout { .. } => ErrorAction::RequeueAfter(Duration::from_secs(60)),

            // Backend business errors - create/delete are idempotent, so the
            // same call can simply run again later.
            Error::Backend(_) | Error::ClusterNotRegistered { .. } => {
                ErrorAction::RequeueWithBackoff
            }

            // Configuration/shape errors - an operator has to fix something
            Error::Configuration(_)
            | Error::MissingField { .. }
            | Error::ResponseShape(_)
            | Error::JsonParse(_) => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_err(code: &str) -> Error {
        Error::Backend(SdkError {
            name: "SDK.ServerError".into(),
            code: AskErrorCode::from_code(code),
            message: "boom".into(),
        })
    }

    #[test]
    fn test_code_mapping_round_trips() {
        for literal in [
            "ErrorClusterNotFound",
            "ErrorCheckAcl",
            "ClusterNameAlreadyExist",
        ] {
            assert_eq!(AskErrorCode::from_code(literal).as_str(), literal);
        }
        assert_eq!(
            AskErrorCode::from_code("ErrorQuotaExceed"),
            AskErrorCode::Other("ErrorQuotaExceed".into())
        );
    }

    #[test]
    fn test_cluster_gone_codes() {
        assert!(backend_err("ErrorClusterNotFound").is_cluster_gone());
        assert!(backend_err("ErrorCheckAcl").is_cluster_gone());
        assert!(!backend_err("ClusterNameAlreadyExist").is_cluster_gone());
        assert!(!backend_err("ErrorQuotaExceed").is_cluster_gone());
    }

    #[test]
    fn test_name_conflict_code() {
        assert!(backend_err("ClusterNameAlreadyExist").is_name_conflict());
        assert!(!backend_err("ErrorClusterNotFound").is_name_conflict());
    }

    #[test]
    fn test_error_actions() {
        let err = Error::Timeout {
            operation: "creation",
            cluster: "cls-1".into(),
            waited: Duration::from_secs(120),
        };
        assert_eq!(
            err.action(),
            ErrorAction::RequeueAfter(Duration::from_secs(60))
        );
        assert!(err.is_retryable());

        let err = Error::Configuration("bad config".into());
        assert_eq!(err.action(), ErrorAction::NoRequeue);
        assert!(!err.is_retryable());

        assert_eq!(
            backend_err("ErrorQuotaExceed").action(),
            ErrorAction::RequeueWithBackoff
        );
    }

    #[test]
    fn test_timeout_display_carries_wait() {
        let err = Error::Timeout {
            operation: "creation",
            cluster: "cls-123".into(),
            waited: Duration::from_secs(120),
        };
        let text = err.to_string();
        assert!(text.contains("cls-123"));
        assert!(text.contains("120s"));
    }

    #[test]
    fn test_sdk_error_display_matches_wire_format() {
        let err = SdkError {
            name: "SDK.ServerError".into(),
            code: AskErrorCode::ClusterNameAlreadyExist,
            message: "cluster name tenant-a already exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "Aliyun SDK error: errorName(SDK.ServerError), \
             errorCode(ClusterNameAlreadyExist), \
             errorMessage(cluster name tenant-a already exist)"
        );
    }
}
