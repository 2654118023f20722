//! Master provisioning
//!
//! Backend implementations of the [`MasterProvisioner`] port together with
//! the plumbing they share:
//! - ask: the ASK container-service backend
//! - poll: bounded polling for slow backend transitions
//! - anchor: per-tenant namespace and credential artifacts
//!
//! [`MasterProvisioner`]: crate::domain::MasterProvisioner

pub mod anchor;
pub mod ask;
pub mod poll;

use std::sync::Arc;

use crate::domain::{MasterProvisionerRef, SuperMasterStoreRef};
use crate::error::{Error, Result};

use ask::api::RequestDispatcherRef;
use ask::AskProvisioner;

/// Factory selecting a provisioner backend by name
pub struct ProvisionerFactory;

impl ProvisionerFactory {
    /// Create a provisioner by backend name
    pub fn create(
        name: &str,
        store: SuperMasterStoreRef,
        dispatcher: RequestDispatcherRef,
    ) -> Result<MasterProvisionerRef> {
        match name.to_lowercase().as_str() {
            "aliyun" | "ask" => Ok(Arc::new(AskProvisioner::new(store, dispatcher))),
            _ => Err(Error::Configuration(format!(
                "unknown master provisioner '{name}', expected 'aliyun' or 'ask'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ask::api::testing::FakeDispatcher;
    use super::*;
    use crate::store::fake::FakeStore;
    use assert_matches::assert_matches;

    #[test]
    fn test_factory_selects_the_ask_backend() {
        for name in ["Aliyun", "ask"] {
            let provisioner = ProvisionerFactory::create(
                name,
                Arc::new(FakeStore::new()),
                Arc::new(FakeDispatcher::new()),
            )
            .unwrap();
            assert_eq!(provisioner.provisioner_name(), "aliyun");
        }
    }

    #[test]
    fn test_factory_rejects_unknown_backends() {
        let err = ProvisionerFactory::create(
            "gke",
            Arc::new(FakeStore::new()),
            Arc::new(FakeDispatcher::new()),
        )
        .err()
        .expect("an unknown backend name must be rejected");
        assert_matches!(
            err,
            Error::Configuration(msg) if msg.contains("aliyun") && msg.contains("ask")
        );
    }
}
