//! Workload records (Deployments, StatefulSets, DaemonSets).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{as_i32, meta_creation_ts, meta_labels, meta_name, meta_namespace, Labels};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 3] =
        [WorkloadKind::Deployment, WorkloadKind::StatefulSet, WorkloadKind::DaemonSet];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
        }
    }
}

impl std::str::FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deployment" => Ok(WorkloadKind::Deployment),
            "StatefulSet" => Ok(WorkloadKind::StatefulSet),
            "DaemonSet" => Ok(WorkloadKind::DaemonSet),
            other => Err(format!("unknown workload kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkloadStatus {
    Running,
    Degraded,
    Pending,
    Unknown,
}

/// One workload on one cluster, shaped from the loose apps/v1 object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    pub kind: WorkloadKind,
    pub status: WorkloadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub replicas: i32,
    pub ready_replicas: i32,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    pub creation_ts: i64,
}

impl Workload {
    /// Shape a workload from a raw list item. Returns `None` when the object
    /// lacks a name; all other missing fields fall back to defaults
    /// (zero replicas, `Pending`/`Unknown` status, no image).
    pub fn from_object(obj: &Value, kind: WorkloadKind, cluster: &str) -> Option<Self> {
        let name = meta_name(obj)?.to_string();
        let spec = obj.get("spec");
        let status = obj.get("status");

        let (replicas, ready_replicas, derived) = match kind {
            WorkloadKind::Deployment => {
                let replicas = as_i32(spec.and_then(|s| s.get("replicas")));
                let ready = as_i32(status.and_then(|s| s.get("readyReplicas")));
                let derived = match status.and_then(|s| s.get("availableReplicas")).and_then(|v| v.as_i64()) {
                    Some(avail) if avail as i32 == replicas && replicas > 0 => WorkloadStatus::Running,
                    Some(avail) if avail > 0 => WorkloadStatus::Degraded,
                    Some(_) => WorkloadStatus::Pending,
                    None => WorkloadStatus::Pending,
                };
                (replicas, ready, derived)
            }
            WorkloadKind::StatefulSet => {
                let replicas = as_i32(spec.and_then(|s| s.get("replicas")));
                let ready = as_i32(status.and_then(|s| s.get("readyReplicas")));
                (replicas, ready, ready_based_status(replicas, ready, status.is_some()))
            }
            WorkloadKind::DaemonSet => {
                let replicas = as_i32(status.and_then(|s| s.get("desiredNumberScheduled")));
                let ready = as_i32(status.and_then(|s| s.get("numberReady")));
                (replicas, ready, ready_based_status(replicas, ready, status.is_some()))
            }
        };

        Some(Workload {
            name,
            namespace: meta_namespace(obj),
            cluster: cluster.to_string(),
            kind,
            status: derived,
            image: first_container_image(spec),
            replicas,
            ready_replicas,
            labels: meta_labels(obj),
            creation_ts: meta_creation_ts(obj),
        })
    }
}

fn ready_based_status(replicas: i32, ready: i32, has_status: bool) -> WorkloadStatus {
    if !has_status {
        return WorkloadStatus::Unknown;
    }
    if ready == replicas && replicas > 0 {
        WorkloadStatus::Running
    } else if ready > 0 {
        WorkloadStatus::Degraded
    } else {
        WorkloadStatus::Pending
    }
}

fn first_container_image(spec: Option<&Value>) -> Option<String> {
    spec?
        .get("template")?
        .get("spec")?
        .get("containers")?
        .as_array()?
        .first()?
        .get("image")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment(replicas: i64, ready: i64, available: Option<i64>) -> Value {
        let mut status = json!({"readyReplicas": ready});
        if let Some(a) = available {
            status["availableReplicas"] = json!(a);
        }
        json!({
            "metadata": {"name": "web", "namespace": "default", "labels": {"app": "web"}},
            "spec": {
                "replicas": replicas,
                "template": {"spec": {"containers": [{"image": "nginx:1.27"}]}},
            },
            "status": status,
        })
    }

    #[test]
    fn deployment_running_when_all_available() {
        let w = Workload::from_object(&deployment(3, 3, Some(3)), WorkloadKind::Deployment, "alpha")
            .expect("parses");
        assert_eq!(w.status, WorkloadStatus::Running);
        assert_eq!(w.replicas, 3);
        assert_eq!(w.ready_replicas, 3);
        assert_eq!(w.image.as_deref(), Some("nginx:1.27"));
        assert_eq!(w.cluster, "alpha");
    }

    #[test]
    fn deployment_degraded_when_partially_available() {
        let w = Workload::from_object(&deployment(3, 1, Some(1)), WorkloadKind::Deployment, "alpha")
            .expect("parses");
        assert_eq!(w.status, WorkloadStatus::Degraded);
    }

    #[test]
    fn deployment_pending_without_availability() {
        let w = Workload::from_object(&deployment(3, 0, None), WorkloadKind::Deployment, "alpha")
            .expect("parses");
        assert_eq!(w.status, WorkloadStatus::Pending);
        let w = Workload::from_object(&deployment(3, 0, Some(0)), WorkloadKind::Deployment, "alpha")
            .expect("parses");
        assert_eq!(w.status, WorkloadStatus::Pending);
    }

    #[test]
    fn daemonset_counts_come_from_status() {
        let obj = json!({
            "metadata": {"name": "agent", "namespace": "kube-system"},
            "status": {"desiredNumberScheduled": 4, "numberReady": 4},
        });
        let w = Workload::from_object(&obj, WorkloadKind::DaemonSet, "beta").expect("parses");
        assert_eq!(w.replicas, 4);
        assert_eq!(w.status, WorkloadStatus::Running);
    }

    #[test]
    fn statefulset_without_status_is_unknown() {
        let obj = json!({
            "metadata": {"name": "db", "namespace": "data"},
            "spec": {"replicas": 2},
        });
        let w = Workload::from_object(&obj, WorkloadKind::StatefulSet, "beta").expect("parses");
        assert_eq!(w.status, WorkloadStatus::Unknown);
    }

    #[test]
    fn nameless_object_is_skipped() {
        assert!(Workload::from_object(&json!({"metadata": {}}), WorkloadKind::Deployment, "a").is_none());
    }
}
