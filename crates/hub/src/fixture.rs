//! In-memory `ResourceReader` used as a test fixture across the workspace.

use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::reader::{DeploymentBrief, ListError, ResourceReader};
use crate::specs::ResourceSpec;

/// Fake cluster: objects keyed by `ResourceSpec::key()`, deployments keyed by
/// namespace. Kinds with no entry report `Unsupported`, like a cluster
/// without that CRD installed.
#[derive(Default)]
pub struct StaticReader {
    pub objects: FxHashMap<String, Vec<Value>>,
    pub errors: FxHashMap<String, ListError>,
    pub deployments: FxHashMap<String, Vec<DeploymentBrief>>,
    pub version: String,
    /// Artificial latency applied to every call.
    pub delay: Option<Duration>,
    /// Every call fails with a transport error.
    pub offline: bool,
}

impl StaticReader {
    pub fn new() -> Self {
        Self { version: "v1.30.0".to_string(), ..Default::default() }
    }

    pub fn offline() -> Self {
        Self { offline: true, ..Self::new() }
    }

    pub fn with_objects(mut self, spec: &ResourceSpec, items: Vec<Value>) -> Self {
        self.objects.insert(spec.key(), items);
        self
    }

    pub fn with_error(mut self, spec: &ResourceSpec, err: ListError) -> Self {
        self.errors.insert(spec.key(), err);
        self
    }

    pub fn with_deployment(mut self, namespace: &str, brief: DeploymentBrief) -> Self {
        self.deployments.entry(namespace.to_string()).or_default().push(brief);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) -> Result<(), ListError> {
        if self.offline {
            return Err(ListError::Transport("connection refused".to_string()));
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceReader for StaticReader {
    async fn list(
        &self,
        spec: &ResourceSpec,
        namespace: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, ListError> {
        self.pause().await?;
        if let Some(err) = self.errors.get(&spec.key()) {
            return Err(err.clone());
        }
        let Some(items) = self.objects.get(&spec.key()) else {
            return Err(ListError::Unsupported);
        };
        let mut out: Vec<Value> = items
            .iter()
            .filter(|o| match namespace {
                Some(ns) => {
                    o.get("metadata")
                        .and_then(|m| m.get("namespace"))
                        .and_then(|v| v.as_str())
                        == Some(ns)
                }
                None => true,
            })
            .cloned()
            .collect();
        if let Some(n) = limit {
            out.truncate(n as usize);
        }
        Ok(out)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeploymentBrief, ListError> {
        self.pause().await?;
        self.deployments
            .get(namespace)
            .and_then(|ds| ds.iter().find(|d| d.name == name))
            .cloned()
            .ok_or(ListError::Unsupported)
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<DeploymentBrief>, ListError> {
        self.pause().await?;
        Ok(self.deployments.get(namespace).cloned().unwrap_or_default())
    }

    async fn server_version(&self) -> Result<String, ListError> {
        self.pause().await?;
        Ok(self.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::DEPLOYMENTS;
    use serde_json::json;

    #[tokio::test]
    async fn missing_kind_is_unsupported() {
        let r = StaticReader::new();
        assert_eq!(r.list(&DEPLOYMENTS, None, None).await, Err(ListError::Unsupported));
    }

    #[tokio::test]
    async fn namespace_filter_applies() {
        let r = StaticReader::new().with_objects(
            &DEPLOYMENTS,
            vec![
                json!({"metadata": {"name": "a", "namespace": "one"}}),
                json!({"metadata": {"name": "b", "namespace": "two"}}),
            ],
        );
        let items = r.list(&DEPLOYMENTS, Some("two"), None).await.expect("listed");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["metadata"]["name"], "b");
    }

    #[tokio::test]
    async fn offline_reader_fails_transport() {
        let r = StaticReader::offline();
        assert!(matches!(
            r.server_version().await,
            Err(ListError::Transport(_))
        ));
    }
}
