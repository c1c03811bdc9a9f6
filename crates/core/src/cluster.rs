//! Cluster registration and control-plane records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClusterRegistrationStatus {
    Ready,
    Pending,
    Syncing,
    Degraded,
    Offline,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClusterType {
    Control,
    Workload,
    Unknown,
}

/// One registered cluster as seen from this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistration {
    pub name: String,
    pub cluster_type: ClusterType,
    pub status: ClusterRegistrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<i64>,
    pub registered_at: i64,
}

/// Readiness of one control-plane controller deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerState {
    pub ready: bool,
    pub replicas: i32,
    pub available: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlClusterInfo {
    pub name: String,
    pub is_control_cluster: bool,
    pub controller_status: BTreeMap<String, ControllerState>,
    pub managed_clusters: usize,
    pub total_bindings: usize,
    pub last_updated: i64,
}

impl ControlClusterInfo {
    pub fn workload(name: &str, now: i64) -> Self {
        ControlClusterInfo {
            name: name.to_string(),
            is_control_cluster: false,
            controller_status: BTreeMap::new(),
            managed_clusters: 0,
            total_bindings: 0,
            last_updated: now,
        }
    }
}

/// Best-effort platform detection from node labels.
pub fn platform_from_node_labels(node: &Value) -> Option<&'static str> {
    let labels = node.get("metadata")?.get("labels")?.as_object()?;
    let has = |k: &str| labels.contains_key(k);
    if labels
        .get("node.kubernetes.io/instance-type")
        .and_then(|v| v.as_str())
        .map(|v| v.contains("eks"))
        .unwrap_or(false)
        || has("eks.amazonaws.com/nodegroup")
    {
        return Some("EKS");
    }
    if has("cloud.google.com/gke-nodepool") {
        return Some("GKE");
    }
    if has("kubernetes.azure.com/cluster") {
        return Some("AKS");
    }
    if has("node.openshift.io/os_id") {
        return Some("OpenShift");
    }
    None
}

/// Region from topology labels, with the legacy failure-domain fallback.
pub fn region_from_node_labels(node: &Value) -> Option<String> {
    let labels = node.get("metadata")?.get("labels")?.as_object()?;
    for key in ["topology.kubernetes.io/region", "failure-domain.beta.kubernetes.io/region"] {
        if let Some(r) = labels.get(key).and_then(|v| v.as_str()) {
            if !r.is_empty() {
                return Some(r.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(labels: Value) -> Value {
        json!({"metadata": {"name": "node-1", "labels": labels}})
    }

    #[test]
    fn platform_detection_by_label() {
        assert_eq!(
            platform_from_node_labels(&node(json!({"cloud.google.com/gke-nodepool": "default"}))),
            Some("GKE")
        );
        assert_eq!(
            platform_from_node_labels(&node(json!({"kubernetes.azure.com/cluster": "aks1"}))),
            Some("AKS")
        );
        assert_eq!(
            platform_from_node_labels(&node(json!({"node.openshift.io/os_id": "rhcos"}))),
            Some("OpenShift")
        );
        assert_eq!(
            platform_from_node_labels(&node(json!({"node.kubernetes.io/instance-type": "eks.large"}))),
            Some("EKS")
        );
        assert_eq!(platform_from_node_labels(&node(json!({"foo": "bar"}))), None);
        assert_eq!(platform_from_node_labels(&json!({})), None);
    }

    #[test]
    fn region_prefers_topology_label() {
        let n = node(json!({
            "topology.kubernetes.io/region": "eu-west-1",
            "failure-domain.beta.kubernetes.io/region": "legacy",
        }));
        assert_eq!(region_from_node_labels(&n), Some("eu-west-1".to_string()));
        let legacy = node(json!({"failure-domain.beta.kubernetes.io/region": "us-east-1"}));
        assert_eq!(region_from_node_labels(&legacy), Some("us-east-1".to_string()));
        assert_eq!(region_from_node_labels(&node(json!({}))), None);
    }
}
