//! Tenant Master Operator
//!
//! A Kubernetes operator that provisions dedicated tenant control planes
//! ("tenant masters") on a managed cluster backend. Each VirtualCluster
//! object on the super cluster is materialized as a serverless Kubernetes
//! cluster on the backend, and its admin kubeconfig is published as a
//! Secret in a per-tenant namespace.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Tenant Master Operator                     │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐      ┌───────────────────────────────────┐  │
//! │  │  VirtualCluster │      │        Master Provisioner         │  │
//! │  │  Controller     │─────▶│  (create / delete state machines) │  │
//! │  └─────────────────┘      └────────────────┬──────────────────┘  │
//! │                                            │                     │
//! │                           ┌────────────────┴──────────────────┐  │
//! │                           │         Aliyun ASK Backend        │  │
//! │                           │  (signed REST calls + classifier) │  │
//! │                           └───────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controller`]: VirtualCluster reconciler and finalizer handling
//! - [`provision`]: Provisioner backends and their state machines
//! - [`store`]: Access to Secrets, ConfigMaps, and Namespaces on the super cluster
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Core domain ports
//! - [`error`]: Error types and handling

pub mod controller;
pub mod crd;
pub mod domain;
pub mod error;
pub mod provision;
pub mod store;

// Re-export commonly used types
pub use crd::{
    ClusterCondition, ClusterPhase, VirtualCluster, VirtualClusterSpec, VirtualClusterStatus,
};

pub use domain::{
    MasterProvisioner, MasterProvisionerRef, SuperMasterStore, SuperMasterStoreRef,
};

pub use error::{Error, ErrorAction, Result};

pub use provision::ask::api::{AskApi, HttpDispatcher, RequestDispatcher, RequestDispatcherRef};
pub use provision::ask::AskProvisioner;
pub use provision::ProvisionerFactory;

pub use store::KubeStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
