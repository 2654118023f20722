//! VirtualCluster Controller
//!
//! Watches VirtualCluster objects and drives tenant masters through their
//! lifecycle: provision on create, tear down on delete. Teardown is guarded
//! by a finalizer so the backing cluster is gone before the object is.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Client, Resource, ResourceExt};
use prometheus::{Histogram, IntCounter, IntCounterVec};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::crd::{ClusterPhase, VirtualCluster, VirtualClusterStatus};
use crate::domain::MasterProvisionerRef;
use crate::error::{Error, ErrorAction, Result};
use crate::provision::anchor::cluster_key;

/// Finalizer owned by this controller
pub const FINALIZER: &str = "tenancy.x-k8s.io/master-provisioner";

/// Flat requeue delay for retryable errors
const ERROR_REQUEUE: Duration = Duration::from_secs(15);

// =============================================================================
// Metrics
// =============================================================================

/// Controller metrics, registered with the default prometheus registry
pub struct Metrics {
    provisions_total: IntCounter,
    deprovisions_total: IntCounter,
    failures_total: IntCounterVec,
    timeouts_total: IntCounter,
    provision_duration: Histogram,
}

fn metrics_error(err: prometheus::Error) -> Error {
    Error::Internal(format!("metrics registration failed: {}", err))
}

impl Metrics {
    /// Register the controller metrics with the default registry
    pub fn register() -> Result<Self> {
        let provisions_total = prometheus::register_int_counter!(
            "tenant_master_provisions_total",
            "Tenant masters provisioned to completion"
        )
        .map_err(metrics_error)?;
        let deprovisions_total = prometheus::register_int_counter!(
            "tenant_master_deprovisions_total",
            "Tenant masters torn down to completion"
        )
        .map_err(metrics_error)?;
        let failures_total = prometheus::register_int_counter_vec!(
            "tenant_master_reconcile_failures_total",
            "Reconcile failures by operation",
            &["operation"]
        )
        .map_err(metrics_error)?;
        let timeouts_total = prometheus::register_int_counter!(
            "tenant_master_timeouts_total",
            "Bounded waits that elapsed before the backend settled"
        )
        .map_err(metrics_error)?;
        let provision_duration = prometheus::register_histogram!(
            "tenant_master_provision_duration_seconds",
            "Wall-clock duration of successful provisions",
            vec![10.0, 30.0, 60.0, 90.0, 120.0, 180.0, 300.0]
        )
        .map_err(metrics_error)?;

        Ok(Self {
            provisions_total,
            deprovisions_total,
            failures_total,
            timeouts_total,
            provision_duration,
        })
    }

    fn record_failure(&self, operation: &str, err: &Error) {
        self.failures_total.with_label_values(&[operation]).inc();
        if matches!(err, Error::Timeout { .. }) {
            self.timeouts_total.inc();
        }
    }
}

// =============================================================================
// Controller Context
// =============================================================================

/// Shared state passed to every reconcile invocation
pub struct Context {
    client: Client,
    provisioner: MasterProvisionerRef,
    metrics: Metrics,
}

/// Run the VirtualCluster controller until the watch stream ends.
pub async fn run(client: Client, provisioner: MasterProvisionerRef) -> Result<()> {
    let clusters: Api<VirtualCluster> = Api::all(client.clone());
    let metrics = Metrics::register()?;
    let context = Arc::new(Context {
        client,
        provisioner,
        metrics,
    });

    info!(
        "starting virtual cluster controller (backend: {})",
        context.provisioner.provisioner_name()
    );

    Controller::new(clusters, watcher::Config::default())
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok(obj) => debug!("reconciled {:?}", obj),
                Err(err) => warn!("reconcile failed: {}", err),
            }
        })
        .await;

    Ok(())
}

// =============================================================================
// Reconciliation
// =============================================================================

async fn reconcile(vc: Arc<VirtualCluster>, ctx: Arc<Context>) -> Result<Action> {
    let ns = vc.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<VirtualCluster> = Api::namespaced(ctx.client.clone(), &ns);

    if vc.meta().deletion_timestamp.is_some() {
        return cleanup(&vc, &ctx, &api).await;
    }

    ensure_finalizer(&vc, &api).await?;

    if vc.is_running() {
        debug!("{}/{} already running; nothing to do", ns, vc.name_any());
        return Ok(Action::await_change());
    }

    provision(&vc, &ctx, &api).await
}

/// Provision the tenant master and publish the outcome on the status.
async fn provision(
    vc: &VirtualCluster,
    ctx: &Context,
    api: &Api<VirtualCluster>,
) -> Result<Action> {
    let ns = vc.namespace().unwrap_or_else(|| "default".to_string());
    let name = vc.name_any();

    info!("provisioning tenant master for {}/{}", ns, name);
    let timer = ctx.metrics.provision_duration.start_timer();
    match ctx.provisioner.create_virtual_cluster(vc).await {
        Ok(()) => {
            timer.observe_duration();
            ctx.metrics.provisions_total.inc();
            update_status(api, vc, running_status(vc)).await?;
            info!("tenant master for {}/{} is running", ns, name);
            Ok(Action::await_change())
        }
        Err(err) => {
            timer.stop_and_discard();
            ctx.metrics.record_failure("provision", &err);
            // Record the failure on the object; the requeue decision stays
            // with error_policy, so the original error propagates.
            if let Err(patch_err) = update_status(api, vc, failed_status(vc, &err)).await {
                warn!(
                    "failed to record error status for {}/{}: {}",
                    ns, name, patch_err
                );
            }
            Err(err)
        }
    }
}

/// Tear down the tenant master, then release the finalizer.
async fn cleanup(vc: &VirtualCluster, ctx: &Context, api: &Api<VirtualCluster>) -> Result<Action> {
    let ns = vc.namespace().unwrap_or_else(|| "default".to_string());
    let name = vc.name_any();

    if !has_finalizer(vc) {
        return Ok(Action::await_change());
    }

    info!("tearing down tenant master for {}/{}", ns, name);
    match ctx.provisioner.delete_virtual_cluster(vc).await {
        Ok(()) => {
            ctx.metrics.deprovisions_total.inc();
        }
        // Nothing is registered under this name upstream, so there is
        // nothing left to tear down.
        Err(Error::ClusterNotRegistered { .. }) => {
            info!("tenant master for {}/{} already gone", ns, name);
        }
        Err(err) => {
            ctx.metrics.record_failure("deprovision", &err);
            return Err(err);
        }
    }

    remove_finalizer(vc, api).await?;
    info!("released finalizer on {}/{}", ns, name);
    Ok(Action::await_change())
}

fn error_policy(vc: Arc<VirtualCluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    warn!("reconcile of {} failed: {}", vc.name_any(), error);
    requeue_action(error)
}

/// Map an error to the controller action its class calls for.
fn requeue_action(error: &Error) -> Action {
    match error.action() {
        ErrorAction::RequeueWithBackoff => Action::requeue(ERROR_REQUEUE),
        ErrorAction::RequeueAfter(after) => Action::requeue(after),
        ErrorAction::NoRequeue => Action::await_change(),
    }
}

// =============================================================================
// Status Handling
// =============================================================================

fn running_status(vc: &VirtualCluster) -> VirtualClusterStatus {
    let mut status = vc.status.clone().unwrap_or_default();
    status.cluster_namespace = cluster_key(vc);
    status.enter(
        ClusterPhase::Running,
        "Provisioned",
        "tenant master is up and serving",
    );
    status
}

fn failed_status(vc: &VirtualCluster, err: &Error) -> VirtualClusterStatus {
    let mut status = vc.status.clone().unwrap_or_default();
    status.enter(ClusterPhase::Error, "ProvisionFailed", err.to_string());
    status
}

/// Compare statuses on their material fields. Conditions carry transition
/// timestamps and would otherwise report a change on every pass.
fn should_update_status(current: Option<&VirtualClusterStatus>, desired: &VirtualClusterStatus) -> bool {
    match current {
        None => true,
        Some(cur) => {
            cur.phase != desired.phase
                || cur.reason != desired.reason
                || cur.message != desired.message
                || cur.cluster_namespace != desired.cluster_namespace
        }
    }
}

async fn update_status(
    api: &Api<VirtualCluster>,
    vc: &VirtualCluster,
    desired: VirtualClusterStatus,
) -> Result<()> {
    if !should_update_status(vc.status.as_ref(), &desired) {
        debug!("status of {} unchanged; skipping patch", vc.name_any());
        return Ok(());
    }
    let patch = json!({ "status": desired });
    api.patch_status(&vc.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

// =============================================================================
// Finalizer Handling
// =============================================================================

fn has_finalizer(vc: &VirtualCluster) -> bool {
    vc.finalizers().iter().any(|f| f == FINALIZER)
}

async fn ensure_finalizer(vc: &VirtualCluster, api: &Api<VirtualCluster>) -> Result<()> {
    if has_finalizer(vc) {
        return Ok(());
    }
    let mut finalizers = vc.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(FINALIZER.to_string());
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(&vc.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

async fn remove_finalizer(vc: &VirtualCluster, api: &Api<VirtualCluster>) -> Result<()> {
    let finalizers: Vec<String> = vc
        .meta()
        .finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != FINALIZER)
        .collect();
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(&vc.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
