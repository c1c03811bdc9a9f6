//! Fleet core types – normalized records for multi-cluster state

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

mod cluster;
mod gateway;
mod mcs;
mod workload;

pub use cluster::{
    platform_from_node_labels, region_from_node_labels, ClusterRegistration,
    ClusterRegistrationStatus, ClusterType, ControlClusterInfo, ControllerState,
};
pub use gateway::{Gateway, GatewayStatus, HttpRoute, Listener, ParentRef, RouteStatus};
pub use mcs::{ServiceExport, ServiceExportStatus, ServiceImport, ServiceImportType, ServicePort};
pub use workload::{Workload, WorkloadKind, WorkloadStatus};

/// A status condition attached to a cluster resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

pub type Conditions = SmallVec<[Condition; 4]>;

/// Label key/value pairs in upstream iteration order.
pub type Labels = SmallVec<[(String, String); 8]>;

// ---- shared extraction helpers over loose objects ----

pub(crate) fn meta_name(obj: &Value) -> Option<&str> {
    obj.get("metadata")?.get("name")?.as_str().filter(|s| !s.is_empty())
}

pub(crate) fn meta_namespace(obj: &Value) -> String {
    obj.get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Creation timestamp as unix seconds; 0 when absent or unparsable.
pub(crate) fn meta_creation_ts(obj: &Value) -> i64 {
    obj.get("metadata")
        .and_then(|m| m.get("creationTimestamp"))
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

pub(crate) fn meta_labels(obj: &Value) -> Labels {
    let mut out = Labels::new();
    if let Some(map) = obj
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(|v| v.as_object())
    {
        for (k, v) in map {
            if let Some(val) = v.as_str() {
                out.push((k.clone(), val.to_string()));
            }
        }
    }
    out
}

/// Look up a key first in metadata.labels, then metadata.annotations.
pub(crate) fn meta_label_or_annotation<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    let meta = obj.get("metadata")?;
    for field in ["labels", "annotations"] {
        if let Some(v) = meta.get(field).and_then(|m| m.get(key)).and_then(|v| v.as_str()) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

pub(crate) fn parse_conditions(raw: Option<&Value>) -> Conditions {
    let mut out = Conditions::new();
    if let Some(arr) = raw.and_then(|v| v.as_array()) {
        for c in arr {
            let kind = c.get("type").and_then(|v| v.as_str()).unwrap_or("");
            if kind.is_empty() {
                continue;
            }
            out.push(Condition {
                kind: kind.to_string(),
                status: c.get("status").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string(),
                reason: c.get("reason").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                message: c.get("message").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            });
        }
    }
    out
}

pub(crate) fn status_conditions(obj: &Value) -> Conditions {
    parse_conditions(obj.get("status").and_then(|s| s.get("conditions")))
}

pub(crate) fn as_i32(v: Option<&Value>) -> i32 {
    v.and_then(|v| v.as_i64()).unwrap_or(0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meta_name_requires_nonempty() {
        assert_eq!(meta_name(&json!({"metadata": {"name": "web"}})), Some("web"));
        assert_eq!(meta_name(&json!({"metadata": {"name": ""}})), None);
        assert_eq!(meta_name(&json!({"metadata": {}})), None);
        assert_eq!(meta_name(&json!({})), None);
    }

    #[test]
    fn creation_ts_parses_rfc3339() {
        let obj = json!({"metadata": {"creationTimestamp": "2024-05-01T00:00:00Z"}});
        assert_eq!(meta_creation_ts(&obj), 1_714_521_600);
        assert_eq!(meta_creation_ts(&json!({"metadata": {"creationTimestamp": "bogus"}})), 0);
        assert_eq!(meta_creation_ts(&json!({})), 0);
    }

    #[test]
    fn label_or_annotation_prefers_label() {
        let obj = json!({"metadata": {
            "labels": {"k": "from-label"},
            "annotations": {"k": "from-anno", "only": "anno"},
        }});
        assert_eq!(meta_label_or_annotation(&obj, "k"), Some("from-label"));
        assert_eq!(meta_label_or_annotation(&obj, "only"), Some("anno"));
        assert_eq!(meta_label_or_annotation(&obj, "missing"), None);
    }

    #[test]
    fn conditions_skip_untyped_entries() {
        let obj = json!({"status": {"conditions": [
            {"type": "Ready", "status": "True", "reason": "Up"},
            {"status": "False"},
        ]}});
        let conds = status_conditions(&obj);
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].kind, "Ready");
        assert!(conds[0].is_true());
    }
}
