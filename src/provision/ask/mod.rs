//! ASK backend: serverless managed control planes
//!
//! Provisions tenant masters on the ASK container service. Creation and
//! deletion are accepted immediately by the backend and finish minutes
//! later, so both flows share the same shape: send the request, classify
//! the answer, then poll the cluster state on a fixed cadence until it
//! reaches the terminal condition or a deadline elapses.

pub mod api;
pub mod classify;
pub mod config;

use std::time::Duration;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::info;

use crate::crd::VirtualCluster;
use crate::domain::{MasterProvisioner, SuperMasterStoreRef};
use crate::error::{Error, Result};
use crate::provision::{anchor, poll, poll::Probe};

use api::{AskApi, RequestDispatcherRef};
use config::{load_access_keys, load_ask_config, operator_namespace, AskConfig};

/// Creation settles slowly; probe sparsely against a generous deadline.
const CREATE_POLL_CADENCE: Duration = Duration::from_secs(10);
const CREATE_DEADLINE: Duration = Duration::from_secs(120);

/// Deletion acceptance shows up fast; probe tightly.
const DELETE_POLL_CADENCE: Duration = Duration::from_secs(2);
const DELETE_DEADLINE: Duration = Duration::from_secs(100);

/// Backend lifecycle states this provisioner watches for
const STATE_RUNNING: &str = "running";
const STATE_DELETING: &str = "deleting";

/// Provisions tenant masters on the ASK container service
pub struct AskProvisioner {
    store: SuperMasterStoreRef,
    dispatcher: RequestDispatcherRef,
}

impl AskProvisioner {
    pub fn new(store: SuperMasterStoreRef, dispatcher: RequestDispatcherRef) -> Self {
        Self { store, dispatcher }
    }

    /// Build a per-call API client with freshly loaded credentials.
    /// Re-read every call so key rotation and region changes take effect
    /// without a restart.
    async fn backend_api(&self) -> Result<(AskApi, AskConfig)> {
        let namespace = operator_namespace();
        let keys = load_access_keys(self.store.as_ref(), &namespace).await?;
        let config = load_ask_config(self.store.as_ref(), &namespace).await?;
        let api = AskApi::new(self.dispatcher.clone(), keys, config.region_id.clone());
        Ok((api, config))
    }
}

#[async_trait]
impl MasterProvisioner for AskProvisioner {
    async fn create_virtual_cluster(&self, vc: &VirtualCluster) -> Result<()> {
        let cluster_name = vc.name_any();
        info!(vc = %cluster_name, "setting up control plane for the tenant");

        let (api, ask_config) = self.backend_api().await?;
        let cluster_id = api.create_cluster(&cluster_name, &ask_config).await?;
        info!(cluster = %cluster_id, "cluster is creating");

        let probe_api = api.clone();
        let probe_id = cluster_id.clone();
        let running = poll::until(CREATE_POLL_CADENCE, CREATE_DEADLINE, move || {
            let api = probe_api.clone();
            let id = probe_id.clone();
            async move {
                if api.cluster_state(&id).await? == STATE_RUNNING {
                    Ok(Probe::Ready(()))
                } else {
                    Ok(Probe::Pending)
                }
            }
        })
        .await?;
        if running.is_none() {
            // The backend keeps working on the cluster; nothing is rolled
            // back here.
            return Err(Error::Timeout {
                operation: "creation",
                cluster: cluster_id,
                waited: CREATE_DEADLINE,
            });
        }
        info!(cluster = %cluster_id, "cluster is up and running");

        let cluster_namespace = anchor::cluster_key(vc);
        match self.store.create_namespace(&cluster_namespace).await {
            Ok(()) => info!(namespace = %cluster_namespace, "cluster namespace is created"),
            Err(err) if err.is_already_exists() => {}
            Err(err) => return Err(err),
        }

        let kubeconfig = api.user_config(&cluster_id).await?;
        info!(cluster = %cluster_id, "got kubeconfig of cluster");

        let secret = anchor::admin_kubeconfig_secret(&cluster_namespace, &cluster_id, &kubeconfig);
        match self.store.create_secret(&cluster_namespace, secret).await {
            Ok(()) => {}
            Err(err) if err.is_already_exists() => {}
            Err(err) => return Err(err),
        }

        info!(vc = %cluster_name, "admin kubeconfig is in place");
        Ok(())
    }

    async fn delete_virtual_cluster(&self, vc: &VirtualCluster) -> Result<()> {
        let cluster_name = vc.name_any();
        info!(vc = %cluster_name, "tearing down the cluster of the tenant");

        let (api, _) = self.backend_api().await?;
        let cluster_id = api.lookup_cluster_id(&cluster_name).await?;
        api.delete_cluster(&cluster_id).await?;

        let probe_api = api.clone();
        let probe_id = cluster_id.clone();
        let accepted = poll::until(DELETE_POLL_CADENCE, DELETE_DEADLINE, move || {
            let api = probe_api.clone();
            let id = probe_id.clone();
            async move {
                match api.cluster_state(&id).await {
                    Ok(state) if state == STATE_DELETING => Ok(Probe::Ready(())),
                    Ok(_) => Ok(Probe::Pending),
                    // Already gone counts as deletion finished.
                    Err(err) if err.is_cluster_gone() => Ok(Probe::Ready(())),
                    Err(err) => Err(err),
                }
            }
        })
        .await?;
        if accepted.is_none() {
            return Err(Error::Timeout {
                operation: "deletion",
                cluster: cluster_id,
                waited: DELETE_DEADLINE,
            });
        }

        info!(vc = %cluster_name, "cluster deletion is underway");
        Ok(())
    }

    fn provisioner_name(&self) -> &str {
        "aliyun"
    }
}
