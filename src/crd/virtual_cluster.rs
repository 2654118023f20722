//! VirtualCluster CRD
//!
//! Represents a tenant's request for a dedicated Kubernetes control plane.
//! The master provisioner watches these objects and materializes (or tears
//! down) the backing cluster on the configured backend.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// VirtualCluster CRD
// =============================================================================

/// VirtualCluster describes a tenant master: a dedicated control plane owned
/// by one tenant. The spec carries tenant-facing knobs; the provisioner only
/// needs the object's name, namespace, UID, and annotations to do its work.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "tenancy.x-k8s.io",
    version = "v1alpha1",
    kind = "VirtualCluster",
    plural = "virtualclusters",
    shortname = "vc",
    status = "VirtualClusterStatus",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "ClusterNamespace", "type": "string", "jsonPath": ".status.clusterNamespace"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced = true
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterSpec {
    /// Name of the ClusterVersion to build the tenant master from.
    /// Ignored by backends that manage their own control-plane images.
    #[serde(default)]
    pub cluster_version_name: String,

    /// DNS domain of the tenant cluster
    #[serde(default)]
    pub cluster_domain: Option<String>,

    /// Validity period in days for generated PKI artifacts
    #[serde(default)]
    pub pki_expire_days: Option<i64>,

    /// Label/annotation prefixes synced into the tenant master verbatim
    #[serde(default)]
    pub transparent_meta_prefixes: Vec<String>,

    /// Label/annotation prefixes kept opaque to tenant workloads
    #[serde(default)]
    pub opaque_meta_prefixes: Vec<String>,

    /// Extra metadata forwarded to the provisioning backend
    #[serde(default)]
    pub provider_metadata: BTreeMap<String, String>,
}

// =============================================================================
// Status
// =============================================================================

/// Status of the VirtualCluster
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterStatus {
    /// Current phase of the tenant master
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Human-readable detail for the current phase
    #[serde(default)]
    pub message: String,

    /// Machine-readable reason for the current phase
    #[serde(default)]
    pub reason: String,

    /// Namespace on the super cluster holding the tenant master's objects
    #[serde(default)]
    pub cluster_namespace: String,

    /// Phase transition history
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}

/// Tenant master lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ClusterPhase {
    #[default]
    Pending,
    Running,
    Error,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterPhase::Pending => write!(f, "Pending"),
            ClusterPhase::Running => write!(f, "Running"),
            ClusterPhase::Error => write!(f, "Error"),
        }
    }
}

/// One phase transition of the tenant master
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// When the transition happened
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Message
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Implementations
// =============================================================================

impl VirtualCluster {
    /// Get the current phase, defaulting to Pending before any status exists
    pub fn phase(&self) -> ClusterPhase {
        self.status
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or(ClusterPhase::Pending)
    }

    /// Check if the tenant master is up and serving
    pub fn is_running(&self) -> bool {
        self.phase() == ClusterPhase::Running
    }
}

impl VirtualClusterStatus {
    /// Move to a new phase, recording the transition in the conditions list
    pub fn enter(&mut self, phase: ClusterPhase, reason: &str, message: impl Into<String>) {
        let message = message.into();
        self.phase = phase;
        self.reason = reason.to_string();
        self.message = message.clone();
        self.conditions.push(ClusterCondition {
            last_transition_time: Some(Utc::now()),
            reason: Some(reason.to_string()),
            message: Some(message),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(format!("{}", ClusterPhase::Pending), "Pending");
        assert_eq!(format!("{}", ClusterPhase::Running), "Running");
        assert_eq!(format!("{}", ClusterPhase::Error), "Error");
    }

    #[test]
    fn test_default_phase_is_pending() {
        let status = VirtualClusterStatus::default();
        assert_eq!(status.phase, ClusterPhase::Pending);
        assert!(status.conditions.is_empty());
    }

    #[test]
    fn test_enter_records_transition() {
        let mut status = VirtualClusterStatus::default();
        status.enter(ClusterPhase::Running, "Provisioned", "tenant master is up");

        assert_eq!(status.phase, ClusterPhase::Running);
        assert_eq!(status.reason, "Provisioned");
        assert_eq!(status.message, "tenant master is up");
        assert_eq!(status.conditions.len(), 1);
        assert!(status.conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_spec_defaults_deserialize() {
        let spec: VirtualClusterSpec = serde_json::from_str("{}").unwrap();
        assert!(spec.cluster_version_name.is_empty());
        assert!(spec.cluster_domain.is_none());
        assert!(spec.provider_metadata.is_empty());
    }
}
