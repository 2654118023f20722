//! Super-cluster store adapter
//!
//! Implements the [`SuperMasterStore`] port against a live Kubernetes API
//! server, and provides an in-memory fake for tests. The adapter is a thin
//! mapping onto typed `Api` calls so the provisioning logic never touches a
//! raw client.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::debug;

use crate::domain::SuperMasterStore;
use crate::error::Result;

// =============================================================================
// Kubernetes-backed Store
// =============================================================================

/// Store adapter backed by the super cluster's API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SuperMasterStore for KubeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create_namespace(&self, name: &str) -> Result<()> {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.create(&PostParams::default(), &ns).await?;
        debug!(namespace = %name, "created namespace");
        Ok(())
    }

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), &secret).await?;
        debug!(
            namespace = %namespace,
            secret = %secret.metadata.name.as_deref().unwrap_or("<unnamed>"),
            "created secret"
        );
        Ok(())
    }
}

// =============================================================================
// In-memory Fake for Tests
// =============================================================================

#[cfg(test)]
pub mod fake {
    use super::*;
    use crate::error::Error;
    use k8s_openapi::ByteString;
    use kube::core::ErrorResponse;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory [`SuperMasterStore`] that mimics API-server conflict and
    /// not-found behavior, so "tolerate 409" paths exercise the same error
    /// shapes the real adapter produces.
    #[derive(Default)]
    pub struct FakeStore {
        secrets: Mutex<BTreeMap<(String, String), Secret>>,
        config_maps: Mutex<BTreeMap<(String, String), ConfigMap>>,
        namespaces: Mutex<Vec<String>>,
    }

    fn api_error(code: u16, reason: &str, message: String) -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message,
            reason: reason.to_string(),
            code,
        }))
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a secret whose data entries are the given UTF-8 pairs
        pub fn put_secret(&self, namespace: &str, name: &str, entries: &[(&str, &str)]) {
            let data: BTreeMap<String, ByteString> = entries
                .iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect();
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            };
            self.secrets
                .lock()
                .unwrap()
                .insert((namespace.to_string(), name.to_string()), secret);
        }

        /// Seed a config map with the given string pairs
        pub fn put_config_map(&self, namespace: &str, name: &str, entries: &[(&str, &str)]) {
            let data: BTreeMap<String, String> = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let cm = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            };
            self.config_maps
                .lock()
                .unwrap()
                .insert((namespace.to_string(), name.to_string()), cm);
        }

        /// Pre-create a namespace so a later create_namespace conflicts
        pub fn put_namespace(&self, name: &str) {
            self.namespaces.lock().unwrap().push(name.to_string());
        }

        pub fn namespace_exists(&self, name: &str) -> bool {
            self.namespaces.lock().unwrap().iter().any(|n| n == name)
        }

        /// Fetch a secret previously written through the port
        pub fn stored_secret(&self, namespace: &str, name: &str) -> Option<Secret> {
            self.secrets
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
        }
    }

    #[async_trait]
    impl SuperMasterStore for FakeStore {
        async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
            self.secrets
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| {
                    api_error(
                        404,
                        "NotFound",
                        format!("secrets \"{name}\" not found"),
                    )
                })
        }

        async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
            self.config_maps
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| {
                    api_error(
                        404,
                        "NotFound",
                        format!("configmaps \"{name}\" not found"),
                    )
                })
        }

        async fn create_namespace(&self, name: &str) -> Result<()> {
            let mut namespaces = self.namespaces.lock().unwrap();
            if namespaces.iter().any(|n| n == name) {
                return Err(api_error(
                    409,
                    "AlreadyExists",
                    format!("namespaces \"{name}\" already exists"),
                ));
            }
            namespaces.push(name.to_string());
            Ok(())
        }

        async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<()> {
            let name = secret.metadata.name.clone().unwrap_or_default();
            let key = (namespace.to_string(), name.clone());
            let mut secrets = self.secrets.lock().unwrap();
            if secrets.contains_key(&key) {
                return Err(api_error(
                    409,
                    "AlreadyExists",
                    format!("secrets \"{name}\" already exists"),
                ));
            }
            secrets.insert(key, secret);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeStore;
    use super::*;

    #[tokio::test]
    async fn test_fake_store_serves_seeded_objects() {
        let store = FakeStore::new();
        store.put_secret("vc-manager", "aliyun-accesskey", &[("accessKeyID", "AKID")]);
        store.put_config_map("vc-manager", "aliyun-ask-config", &[("askRegionID", "cn-hangzhou")]);

        let secret = store.get_secret("vc-manager", "aliyun-accesskey").await.unwrap();
        let data = secret.data.unwrap();
        assert_eq!(data["accessKeyID"].0, b"AKID");

        let cm = store.get_config_map("vc-manager", "aliyun-ask-config").await.unwrap();
        assert_eq!(cm.data.unwrap()["askRegionID"], "cn-hangzhou");
    }

    #[tokio::test]
    async fn test_fake_store_missing_objects_are_not_found() {
        let store = FakeStore::new();
        let err = store.get_secret("vc-manager", "nope").await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Kube(_)));
        assert!(!err.is_already_exists());
    }

    #[tokio::test]
    async fn test_fake_store_duplicate_creates_conflict() {
        let store = FakeStore::new();
        store.create_namespace("tenant-ns").await.unwrap();

        let err = store.create_namespace("tenant-ns").await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(store.namespace_exists("tenant-ns"));
    }
}
