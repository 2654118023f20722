//! Credential and placement configuration for the ASK backend
//!
//! Access keys and region settings live on the super cluster next to the
//! operator (secret `aliyun-accesskey`, config map `aliyun-ask-config`).
//! They are re-read on every provisioning call, never cached, so rotated
//! keys and changed region settings take effect without a restart.

use std::path::Path;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use tracing::info;

use crate::domain::SuperMasterStore;
use crate::error::{Error, Result};

/// Namespace assumed when the in-cluster lookup cannot tell us where we run
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "vc-manager";

/// Mounted by Kubernetes into every pod
const SERVICEACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Secret holding the backend access keys
pub const ACCESS_KEY_SECRET: &str = "aliyun-accesskey";
const ACCESS_KEY_ID_FIELD: &str = "accessKeyID";
const ACCESS_KEY_SECRET_FIELD: &str = "accessKeySecret";

/// Config map holding the ASK placement settings
pub const ASK_CONFIG_MAP: &str = "aliyun-ask-config";
const REGION_ID_FIELD: &str = "askRegionID";
const ZONE_ID_FIELD: &str = "askZoneID";
const VPC_ID_FIELD: &str = "askVpcID";

/// Backend API credentials
#[derive(Debug, Clone)]
pub struct AccessKeyPair {
    pub key_id: String,
    pub key_secret: String,
}

/// Region/zone placement settings for new clusters
#[derive(Debug, Clone, Default)]
pub struct AskConfig {
    pub region_id: String,
    pub zone_id: String,
    /// When unset the backend allocates a VPC implicitly
    pub vpc_id: Option<String>,
}

/// Resolve the namespace this operator runs in.
///
/// Reads the serviceaccount mount; when that is absent or empty (running
/// out of cluster, for instance) the platform default is used instead.
pub fn operator_namespace() -> String {
    namespace_from(Path::new(SERVICEACCOUNT_NAMESPACE_FILE))
}

fn namespace_from(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let namespace = content.trim();
            if namespace.is_empty() {
                info!(
                    fallback = DEFAULT_OPERATOR_NAMESPACE,
                    "serviceaccount namespace file is empty"
                );
                DEFAULT_OPERATOR_NAMESPACE.to_string()
            } else {
                namespace.to_string()
            }
        }
        Err(err) => {
            info!(
                error = %err,
                fallback = DEFAULT_OPERATOR_NAMESPACE,
                "can't resolve namespace from inside the pod"
            );
            DEFAULT_OPERATOR_NAMESPACE.to_string()
        }
    }
}

/// Read the backend access keys from the operator namespace
pub async fn load_access_keys(
    store: &dyn SuperMasterStore,
    namespace: &str,
) -> Result<AccessKeyPair> {
    let secret = store.get_secret(namespace, ACCESS_KEY_SECRET).await?;
    Ok(AccessKeyPair {
        key_id: secret_field(&secret, ACCESS_KEY_ID_FIELD)?,
        key_secret: secret_field(&secret, ACCESS_KEY_SECRET_FIELD)?,
    })
}

/// Read the ASK placement settings from the operator namespace
pub async fn load_ask_config(store: &dyn SuperMasterStore, namespace: &str) -> Result<AskConfig> {
    let cm = store.get_config_map(namespace, ASK_CONFIG_MAP).await?;
    Ok(AskConfig {
        region_id: config_field(&cm, REGION_ID_FIELD)?,
        zone_id: config_field(&cm, ZONE_ID_FIELD)?,
        vpc_id: cm.data.as_ref().and_then(|d| d.get(VPC_ID_FIELD)).cloned(),
    })
}

fn secret_field(secret: &Secret, field: &str) -> Result<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(field))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
        .ok_or_else(|| Error::MissingField {
            object: format!("secret {ACCESS_KEY_SECRET}"),
            field: field.to_string(),
        })
}

fn config_field(cm: &ConfigMap, field: &str) -> Result<String> {
    cm.data
        .as_ref()
        .and_then(|data| data.get(field))
        .cloned()
        .ok_or_else(|| Error::MissingField {
            object: format!("config map {ASK_CONFIG_MAP}"),
            field: field.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeStore;
    use std::io::Write;

    #[test]
    fn test_namespace_from_mounted_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "platform-system").unwrap();

        assert_eq!(namespace_from(file.path()), "platform-system");
    }

    #[test]
    fn test_namespace_falls_back_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("namespace");

        assert_eq!(namespace_from(&missing), DEFAULT_OPERATOR_NAMESPACE);
    }

    #[test]
    fn test_namespace_falls_back_when_file_is_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "  \n").unwrap();

        assert_eq!(namespace_from(file.path()), DEFAULT_OPERATOR_NAMESPACE);
    }

    #[tokio::test]
    async fn test_load_access_keys() {
        let store = FakeStore::new();
        store.put_secret(
            DEFAULT_OPERATOR_NAMESPACE,
            ACCESS_KEY_SECRET,
            &[("accessKeyID", "AKID"), ("accessKeySecret", "SECRET")],
        );

        let keys = load_access_keys(&store, DEFAULT_OPERATOR_NAMESPACE)
            .await
            .unwrap();
        assert_eq!(keys.key_id, "AKID");
        assert_eq!(keys.key_secret, "SECRET");
    }

    #[tokio::test]
    async fn test_missing_key_field_is_named_in_the_error() {
        let store = FakeStore::new();
        store.put_secret(
            DEFAULT_OPERATOR_NAMESPACE,
            ACCESS_KEY_SECRET,
            &[("accessKeyID", "AKID")],
        );

        let err = load_access_keys(&store, DEFAULT_OPERATOR_NAMESPACE)
            .await
            .unwrap_err();
        match err {
            Error::MissingField { field, .. } => assert_eq!(field, "accessKeySecret"),
            other => panic!("expected MissingField, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_ask_config_with_optional_vpc() {
        let store = FakeStore::new();
        store.put_config_map(
            DEFAULT_OPERATOR_NAMESPACE,
            ASK_CONFIG_MAP,
            &[("askRegionID", "cn-hangzhou"), ("askZoneID", "cn-hangzhou-a")],
        );

        let config = load_ask_config(&store, DEFAULT_OPERATOR_NAMESPACE)
            .await
            .unwrap();
        assert_eq!(config.region_id, "cn-hangzhou");
        assert_eq!(config.zone_id, "cn-hangzhou-a");
        assert_eq!(config.vpc_id, None);

        store.put_config_map(
            DEFAULT_OPERATOR_NAMESPACE,
            ASK_CONFIG_MAP,
            &[
                ("askRegionID", "cn-hangzhou"),
                ("askZoneID", "cn-hangzhou-a"),
                ("askVpcID", "vpc-42"),
            ],
        );
        let config = load_ask_config(&store, DEFAULT_OPERATOR_NAMESPACE)
            .await
            .unwrap();
        assert_eq!(config.vpc_id.as_deref(), Some("vpc-42"));
    }

    #[tokio::test]
    async fn test_missing_region_is_named_in_the_error() {
        let store = FakeStore::new();
        store.put_config_map(
            DEFAULT_OPERATOR_NAMESPACE,
            ASK_CONFIG_MAP,
            &[("askZoneID", "cn-hangzhou-a")],
        );

        let err = load_ask_config(&store, DEFAULT_OPERATOR_NAMESPACE)
            .await
            .unwrap_err();
        match err {
            Error::MissingField { field, .. } => assert_eq!(field, "askRegionID"),
            other => panic!("expected MissingField, got {other}"),
        }
    }
}
