//! Per-cluster resource access behind the `ResourceReader` capability.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{Api, ListParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::specs::ResourceSpec;

/// Classified failure from one cluster call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ListError {
    /// Connection/transport failure (cluster unreachable, timeout).
    #[error("transport: {0}")]
    Transport(String),
    /// Resource kind not installed or not served; equivalent to absence.
    #[error("resource kind not supported")]
    Unsupported,
    /// RBAC denied the call.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Any other API failure.
    #[error("api: {0}")]
    Api(String),
}

impl ListError {
    pub fn timeout() -> Self {
        ListError::Transport("deadline exceeded".to_string())
    }
}

/// Replica counts of one Deployment, as needed by the control-plane probes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentBrief {
    pub name: String,
    pub replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
}

/// Capability one cluster handle exposes: list loose objects of a kind,
/// fetch deployment replica counts, probe liveness.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn list(
        &self,
        spec: &ResourceSpec,
        namespace: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, ListError>;

    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<DeploymentBrief, ListError>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<DeploymentBrief>, ListError>;

    async fn server_version(&self) -> Result<String, ListError>;
}

/// kube-rs backed reader for one cluster.
pub struct KubeReader {
    client: Client,
}

impl KubeReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, spec: &ResourceSpec, namespace: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(spec.group, spec.version, spec.kind);
        let ar = ApiResource::from_gvk_with_plural(&gvk, spec.plural);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

fn classify(e: kube::Error) -> ListError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 || ae.code == 405 => ListError::Unsupported,
        kube::Error::Api(ae) if ae.code == 403 => ListError::Forbidden(ae.message),
        kube::Error::Api(ae) => ListError::Api(format!("{} (code {})", ae.message, ae.code)),
        kube::Error::HyperError(e) => ListError::Transport(e.to_string()),
        kube::Error::Service(e) => ListError::Transport(e.to_string()),
        other => ListError::Api(other.to_string()),
    }
}

fn brief_from(d: &Deployment) -> DeploymentBrief {
    let status = d.status.as_ref();
    DeploymentBrief {
        name: d.metadata.name.clone().unwrap_or_default(),
        replicas: status.and_then(|s| s.replicas).unwrap_or(0),
        ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        available_replicas: status.and_then(|s| s.available_replicas).unwrap_or(0),
    }
}

#[async_trait]
impl ResourceReader for KubeReader {
    async fn list(
        &self,
        spec: &ResourceSpec,
        namespace: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, ListError> {
        let api = self.dynamic_api(spec, namespace);
        let mut lp = ListParams::default();
        if let Some(n) = limit {
            lp = lp.limit(n);
        }
        let list = api.list(&lp).await.map_err(classify)?;
        let mut out = Vec::with_capacity(list.items.len());
        for obj in list.items {
            match serde_json::to_value(&obj) {
                Ok(v) => out.push(v),
                // Skip the one item; the rest of the page still counts.
                Err(e) => warn!(spec = %spec, error = %e, "skipping unserializable item"),
            }
        }
        Ok(out)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeploymentBrief, ListError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let d = api.get(name).await.map_err(classify)?;
        Ok(brief_from(&d))
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<DeploymentBrief>, ListError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await.map_err(classify)?;
        Ok(list.items.iter().map(brief_from).collect())
    }

    async fn server_version(&self) -> Result<String, ListError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(classify)?;
        Ok(info.git_version)
    }
}
