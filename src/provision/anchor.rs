//! Tenant anchor objects on the super cluster
//!
//! Each tenant master is anchored to a dedicated namespace on the super
//! cluster, named by a stable digest-qualified key. That namespace holds the
//! artifacts other components consume, today the admin kubeconfig secret.

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::crd::VirtualCluster;

/// Name of the secret carrying the tenant master's admin kubeconfig.
/// Also used as the data key inside the secret.
pub const ADMIN_KUBECONFIG_SECRET: &str = "admin-kubeconfig";

/// Annotation on the kubeconfig secret recording the backend cluster ID
pub const CLUSTER_ID_ANNOTATION: &str = "clusterID";

/// Derive the cluster namespace for a tenant.
///
/// `<namespace>-<first 6 hex chars of sha256(uid)>-<name>`: collision-free
/// across object re-creations (the UID digest changes) while staying
/// greppable by tenant name.
pub fn cluster_key(vc: &VirtualCluster) -> String {
    let uid = vc.uid().unwrap_or_default();
    let digest = Sha256::digest(uid.as_bytes());
    format!(
        "{}-{}-{}",
        vc.namespace().unwrap_or_default(),
        &hex::encode(digest)[..6],
        vc.name_any()
    )
}

/// Build the admin kubeconfig secret for the cluster namespace, annotated
/// with the backend cluster ID so operators can trace it back.
pub fn admin_kubeconfig_secret(cluster_namespace: &str, cluster_id: &str, kubeconfig: &str) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        ADMIN_KUBECONFIG_SECRET.to_string(),
        ByteString(kubeconfig.as_bytes().to_vec()),
    );
    let mut annotations = BTreeMap::new();
    annotations.insert(CLUSTER_ID_ANNOTATION.to_string(), cluster_id.to_string());

    Secret {
        metadata: ObjectMeta {
            name: Some(ADMIN_KUBECONFIG_SECRET.to_string()),
            namespace: Some(cluster_namespace.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}
