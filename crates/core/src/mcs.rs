//! Multi-cluster service records (ServiceExport / ServiceImport).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::{
    meta_creation_ts, meta_label_or_annotation, meta_name, meta_namespace, status_conditions,
    Conditions,
};

/// Label (annotation fallback) naming the cluster a service was exported from.
pub const SOURCE_CLUSTER_KEY: &str = "multicluster.x-k8s.io/source-cluster";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceExportStatus {
    Ready,
    Pending,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExport {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    /// Name of the exported Service; same as `name` unless overridden.
    pub service_name: String,
    pub status: ServiceExportStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub creation_ts: i64,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

impl ServiceExport {
    pub fn from_object(obj: &Value, cluster: &str) -> Option<Self> {
        let name = meta_name(obj)?.to_string();
        let conditions = status_conditions(obj);
        let (status, message) = export_status(&conditions);
        Some(ServiceExport {
            service_name: name.clone(),
            name,
            namespace: meta_namespace(obj),
            cluster: cluster.to_string(),
            status,
            message,
            creation_ts: meta_creation_ts(obj),
            conditions,
        })
    }
}

/// Derive export status from MCS conditions: a True `Conflict` or a False
/// `Valid` is a failure, a True `Valid` is ready, anything else is pending.
fn export_status(conditions: &Conditions) -> (ServiceExportStatus, String) {
    for c in conditions {
        if c.kind == "Conflict" && c.is_true() {
            return (ServiceExportStatus::Failed, c.message.clone());
        }
    }
    for c in conditions {
        if c.kind == "Valid" {
            return if c.is_true() {
                (ServiceExportStatus::Ready, String::new())
            } else {
                (ServiceExportStatus::Failed, c.message.clone())
            };
        }
    }
    (ServiceExportStatus::Pending, String::new())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceImportType {
    ClusterSetIP,
    Headless,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub protocol: String,
    pub port: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImport {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    /// Exporting cluster, when the record declares one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_cluster: String,
    #[serde(rename = "type")]
    pub import_type: ServiceImportType,
    pub dns_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_set_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub ports: SmallVec<[ServicePort; 4]>,
    /// Reachable endpoint count behind the import.
    pub endpoints: i32,
    pub creation_ts: i64,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

impl ServiceImport {
    pub fn from_object(obj: &Value, cluster: &str) -> Option<Self> {
        let name = meta_name(obj)?.to_string();
        let namespace = meta_namespace(obj);
        let spec = obj.get("spec");

        let import_type = match spec.and_then(|s| s.get("type")).and_then(|v| v.as_str()) {
            Some("Headless") => ServiceImportType::Headless,
            _ => ServiceImportType::ClusterSetIP,
        };

        let cluster_set_ips: Vec<String> = spec
            .and_then(|s| s.get("ips"))
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default();

        let mut ports = SmallVec::new();
        if let Some(arr) = spec.and_then(|s| s.get("ports")).and_then(|v| v.as_array()) {
            for p in arr {
                ports.push(ServicePort {
                    name: p.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    protocol: p.get("protocol").and_then(|v| v.as_str()).unwrap_or("TCP").to_string(),
                    port: p.get("port").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
                });
            }
        }

        // Endpoint count: a populated status wins, else the set IPs stand in.
        let endpoints = obj
            .get("status")
            .and_then(|s| s.get("endpoints"))
            .and_then(|v| v.as_i64())
            .map(|n| n as i32)
            .unwrap_or(cluster_set_ips.len() as i32);

        Some(ServiceImport {
            dns_name: format!("{}.{}.svc.clusterset.local", name, namespace),
            source_cluster: meta_label_or_annotation(obj, SOURCE_CLUSTER_KEY)
                .unwrap_or("")
                .to_string(),
            name,
            namespace,
            cluster: cluster.to_string(),
            import_type,
            cluster_set_ips,
            ports,
            endpoints,
            creation_ts: meta_creation_ts(obj),
            conditions: status_conditions(obj),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_status_from_conditions() {
        let ready = json!({
            "metadata": {"name": "svc-a", "namespace": "default"},
            "status": {"conditions": [{"type": "Valid", "status": "True"}]},
        });
        let e = ServiceExport::from_object(&ready, "alpha").expect("parses");
        assert_eq!(e.status, ServiceExportStatus::Ready);

        let conflicted = json!({
            "metadata": {"name": "svc-a", "namespace": "default"},
            "status": {"conditions": [
                {"type": "Valid", "status": "True"},
                {"type": "Conflict", "status": "True", "message": "port clash"},
            ]},
        });
        let e = ServiceExport::from_object(&conflicted, "alpha").expect("parses");
        assert_eq!(e.status, ServiceExportStatus::Failed);
        assert_eq!(e.message, "port clash");

        let bare = json!({"metadata": {"name": "svc-a"}});
        let e = ServiceExport::from_object(&bare, "alpha").expect("parses");
        assert_eq!(e.status, ServiceExportStatus::Pending);
    }

    #[test]
    fn import_endpoints_prefer_status_over_ips() {
        let obj = json!({
            "metadata": {"name": "svc-a", "namespace": "default"},
            "spec": {"type": "ClusterSetIP", "ips": ["10.0.0.1", "10.0.0.2"]},
            "status": {"endpoints": 3},
        });
        let i = ServiceImport::from_object(&obj, "beta").expect("parses");
        assert_eq!(i.endpoints, 3);

        let no_status = json!({
            "metadata": {"name": "svc-a", "namespace": "default"},
            "spec": {"ips": ["10.0.0.1", "10.0.0.2"]},
        });
        let i = ServiceImport::from_object(&no_status, "beta").expect("parses");
        assert_eq!(i.endpoints, 2);
    }

    #[test]
    fn import_source_cluster_from_label_then_annotation() {
        let labeled = json!({"metadata": {
            "name": "svc-a", "namespace": "default",
            "labels": {SOURCE_CLUSTER_KEY: "alpha"},
        }});
        let i = ServiceImport::from_object(&labeled, "beta").expect("parses");
        assert_eq!(i.source_cluster, "alpha");

        let annotated = json!({"metadata": {
            "name": "svc-a", "namespace": "default",
            "annotations": {SOURCE_CLUSTER_KEY: "gamma"},
        }});
        let i = ServiceImport::from_object(&annotated, "beta").expect("parses");
        assert_eq!(i.source_cluster, "gamma");

        let bare = json!({"metadata": {"name": "svc-a", "namespace": "default"}});
        let i = ServiceImport::from_object(&bare, "beta").expect("parses");
        assert_eq!(i.source_cluster, "");
    }

    #[test]
    fn import_dns_name_is_clusterset_local() {
        let obj = json!({"metadata": {"name": "svc-a", "namespace": "prod"}});
        let i = ServiceImport::from_object(&obj, "beta").expect("parses");
        assert_eq!(i.dns_name, "svc-a.prod.svc.clusterset.local");
        assert_eq!(i.import_type, ServiceImportType::ClusterSetIP);
    }
}
