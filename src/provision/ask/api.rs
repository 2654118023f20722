//! Thin client for the ASK control-plane REST API
//!
//! One method per remote operation, each built in the same fixed frame
//! (scheme, domain, API version, region query parameter) the backend
//! expects. Responses come back as raw text; classification decides
//! success or failure before any field is read. No retries here: callers
//! own their own retry policy.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::classify::classify;
use super::config::{AccessKeyPair, AskConfig};
use crate::error::{Error, Result};

pub const API_DOMAIN: &str = "cs.aliyuncs.com";
pub const API_VERSION: &str = "2015-12-15";
const API_SCHEME: &str = "https";

// =============================================================================
// Request Frame
// =============================================================================

/// One fully-specified call to the backend
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, region_id: &str) -> Self {
        Self {
            method,
            path: path.into(),
            query: vec![("RegionId".to_string(), region_id.to_string())],
            body: None,
        }
    }

    fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Absolute URL for this request
    pub fn url(&self) -> String {
        format!("{API_SCHEME}://{API_DOMAIN}{}", self.path)
    }
}

// =============================================================================
// Dispatcher Port
// =============================================================================

/// Port for moving one request to the backend and returning the raw body.
///
/// Transport failures (connect, TLS, timeout) surface as errors. HTTP
/// responses of any status return their body untouched, because business
/// errors arrive as textual bodies that the caller classifies.
#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    async fn dispatch(&self, keys: &AccessKeyPair, request: &ApiRequest) -> Result<String>;
}

pub type RequestDispatcherRef = Arc<dyn RequestDispatcher>;

/// Dispatcher backed by a shared HTTP client, signing every request with
/// the caller's access keys
pub struct HttpDispatcher {
    http: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestDispatcher for HttpDispatcher {
    async fn dispatch(&self, keys: &AccessKeyPair, request: &ApiRequest) -> Result<String> {
        let date = chrono::Utc::now().to_rfc2822();
        let mut builder = self
            .http
            .request(request.method.clone(), request.url())
            .query(&request.query)
            .header("Content-Type", "application/json")
            .header("x-acs-version", API_VERSION)
            .header("Date", date.clone())
            .header("Authorization", authorization(keys, request, &date));
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, path = %request.path, "dispatching backend request");
        let response = builder.send().await?;
        Ok(response.text().await?)
    }
}

/// Keyed digest over the request frame, in the `acs <keyID>:<signature>`
/// shape the backend gateway verifies
fn authorization(keys: &AccessKeyPair, request: &ApiRequest, date: &str) -> String {
    let mut canonical = format!("{}\n{}\n{date}", request.method, request.path);
    for (key, value) in &request.query {
        canonical.push('\n');
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
    }

    let mut hasher = Sha256::new();
    hasher.update(keys.key_secret.as_bytes());
    hasher.update(canonical.as_bytes());
    format!("acs {}:{}", keys.key_id, hex::encode(hasher.finalize()))
}

// =============================================================================
// Typed Operations
// =============================================================================

/// Typed operations over the raw dispatcher.
///
/// Built once per provisioning call with freshly loaded credentials.
/// Cheap to clone; clones share the dispatcher.
#[derive(Clone)]
pub struct AskApi {
    dispatcher: RequestDispatcherRef,
    keys: AccessKeyPair,
    region_id: String,
}

impl AskApi {
    pub fn new(
        dispatcher: RequestDispatcherRef,
        keys: AccessKeyPair,
        region_id: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            keys,
            region_id: region_id.into(),
        }
    }

    /// Dispatch and classify: a backend error body becomes an `Err`
    async fn send(&self, request: ApiRequest) -> Result<String> {
        let body = self.dispatcher.dispatch(&self.keys, &request).await?;
        match classify(&body)? {
            Some(sdk_error) => Err(Error::Backend(sdk_error)),
            None => Ok(body),
        }
    }

    /// Resolve a cluster name to its id by scanning the regional listing
    pub async fn lookup_cluster_id(&self, cluster_name: &str) -> Result<String> {
        let body = self
            .send(ApiRequest::new(Method::GET, "/clusters", &self.region_id))
            .await?;
        let listing: Vec<Value> = serde_json::from_str(&body)
            .map_err(|_| Error::ResponseShape("cluster listing is not a JSON array".into()))?;

        for entry in &listing {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::ResponseShape("cluster entry has no 'name' field".into()))?;
            if name == cluster_name {
                return entry
                    .get("cluster_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::ResponseShape("cluster entry has no 'cluster_id' field".into())
                    });
            }
        }
        Err(Error::ClusterNotRegistered {
            name: cluster_name.to_string(),
        })
    }

    /// Request a new cluster, reusing an existing one when the name is
    /// already taken. Returns the cluster id either way.
    pub async fn create_cluster(&self, cluster_name: &str, config: &AskConfig) -> Result<String> {
        let request = ApiRequest::new(Method::POST, "/clusters", &self.region_id)
            .with_body(creation_body(cluster_name, config));

        match self.send(request).await {
            Ok(body) => {
                let info: Value = serde_json::from_str(&body)?;
                info.get("cluster_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::ResponseShape("creation response has no 'cluster_id' field".into())
                    })
            }
            Err(err) if err.is_name_conflict() => {
                info!(cluster = %cluster_name, "cluster name already exists, reusing it");
                self.lookup_cluster_id(cluster_name).await
            }
            Err(err) => Err(err),
        }
    }

    /// Latest lifecycle state of the cluster, verified against the id asked
    /// about
    pub async fn cluster_state(&self, cluster_id: &str) -> Result<String> {
        let body = self
            .send(ApiRequest::new(
                Method::GET,
                format!("/clusters/{cluster_id}"),
                &self.region_id,
            ))
            .await?;
        let info: Value = serde_json::from_str(&body)?;

        let reported_id = info
            .get("cluster_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ResponseShape("cluster info has no 'cluster_id' field".into()))?;
        if reported_id != cluster_id {
            return Err(Error::ResponseShape(format!(
                "cluster id does not match: got {reported_id} want {cluster_id}"
            )));
        }

        info.get("state")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::ResponseShape(format!("fail to get 'state' of cluster({cluster_id})"))
            })
    }

    /// Admin kubeconfig of the cluster
    pub async fn user_config(&self, cluster_id: &str) -> Result<String> {
        let body = self
            .send(ApiRequest::new(
                Method::GET,
                format!("/k8s/{cluster_id}/user_config"),
                &self.region_id,
            ))
            .await?;
        let payload: Value = serde_json::from_str(&body)?;

        payload
            .get("config")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::ResponseShape(format!("kubeconfig of cluster({cluster_id}) is not found"))
            })
    }

    /// Ask the backend to delete the cluster. This is acceptance only; the
    /// backend finishes asynchronously.
    pub async fn delete_cluster(&self, cluster_id: &str) -> Result<()> {
        self.send(ApiRequest::new(
            Method::DELETE,
            format!("/clusters/{cluster_id}"),
            &self.region_id,
        ))
        .await?;
        Ok(())
    }
}

/// Fixed JSON shape the backend expects for creation. `vpc_id` appears only
/// when configured; otherwise the backend allocates a VPC itself.
fn creation_body(cluster_name: &str, config: &AskConfig) -> String {
    let mut body = serde_json::json!({
        "cluster_type": "Ask",
        "name": cluster_name,
        "region_id": config.region_id,
        "zoneid": config.zone_id,
        "nat_gateway": true,
        "private_zone": true,
    });
    if let Some(vpc_id) = &config.vpc_id {
        body["vpc_id"] = Value::String(vpc_id.clone());
    } else {
        info!("no vpc configured, a new one will be created");
    }
    body.to_string()
}

// =============================================================================
// Scripted Dispatcher for Tests
// =============================================================================
