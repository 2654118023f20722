//! Custom Resource Definitions for the tenancy control plane
//!
//! This module contains all CRD types:
//! - VirtualCluster: a tenant's request for a dedicated control plane

pub mod virtual_cluster;

pub use virtual_cluster::*;

// Re-export common types for convenience
pub use chrono::{DateTime, Utc};
pub use std::collections::BTreeMap;
