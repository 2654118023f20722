//! Domain Ports - Core trait definitions for the tenant-master operator
//!
//! These traits define the boundaries between the provisioning logic and
//! external systems. Adapters implement these traits to provide concrete
//! functionality; tests swap in scripted fakes.

use crate::crd::VirtualCluster;
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use std::sync::Arc;

// =============================================================================
// Master Provisioner Port
// =============================================================================

/// Port for tenant-master lifecycle operations.
///
/// A provisioner owns exactly one backend (e.g. the ASK container service)
/// and turns a `VirtualCluster` object into a running control plane there.
/// Both operations are idempotent: re-invoking them after a partial failure
/// resumes from whatever the backend already has.
#[async_trait]
pub trait MasterProvisioner: Send + Sync {
    /// Bring up the tenant master for `vc` and publish its admin kubeconfig.
    ///
    /// Returns once the backing cluster reports running and the kubeconfig
    /// secret exists in the cluster namespace on the super cluster.
    async fn create_virtual_cluster(&self, vc: &VirtualCluster) -> Result<()>;

    /// Tear down the tenant master for `vc`.
    ///
    /// Returns once the backend has begun (or already finished) deleting the
    /// backing cluster.
    async fn delete_virtual_cluster(&self, vc: &VirtualCluster) -> Result<()>;

    /// Short identifier of the backend this provisioner drives
    fn provisioner_name(&self) -> &str;
}

// =============================================================================
// Super Master Store Port
// =============================================================================

/// Port for the handful of super-cluster operations the provisioner needs.
///
/// Deliberately narrow: read credentials/config, create the cluster
/// namespace, and publish the kubeconfig secret. Conflict errors (409) are
/// surfaced untouched so callers can decide whether "already exists" is fine.
#[async_trait]
pub trait SuperMasterStore: Send + Sync {
    /// Read a secret from the super cluster
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;

    /// Read a config map from the super cluster
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap>;

    /// Create a namespace on the super cluster
    async fn create_namespace(&self, name: &str) -> Result<()>;

    /// Create a secret in the given namespace on the super cluster
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type MasterProvisionerRef = Arc<dyn MasterProvisioner>;
pub type SuperMasterStoreRef = Arc<dyn SuperMasterStore>;
