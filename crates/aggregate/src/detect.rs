//! Control-cluster detection heuristics.
//!
//! Structural, best-effort classification: a cluster is "control" when it
//! serves the binding-policy CRD or runs one of the well-known control-plane
//! controllers. The probe lists are data so new deployments can be added
//! without touching the flow. Nothing here mutates cluster state.

use fleet_core::{ControlClusterInfo, ControllerState};
use fleet_hub::{specs, ClusterHandle};
use tracing::debug;

/// Namespaces the control plane is known to install into, in probe order.
pub const CONTROL_NAMESPACES: &[&str] = &["kubestellar-system", "ks-system", "kubestellar"];

/// Controller deployment names that identify a control plane.
pub const CONTROL_CONTROLLERS: &[&str] = &[
    "kubestellar-controller-manager",
    "ks-controller-manager",
    "transport-controller",
    "placement-translator",
];

fn probe_pairs() -> impl Iterator<Item = (&'static str, &'static str)> {
    CONTROL_NAMESPACES
        .iter()
        .flat_map(|ns| CONTROL_CONTROLLERS.iter().map(move |c| (*ns, *c)))
}

fn is_controller_name(name: &str) -> bool {
    CONTROL_CONTROLLERS.iter().any(|c| name.contains(c)) || name.starts_with("ks-")
}

/// Two-tier heuristic. Tier 1: listing the binding-policy CRD with a page
/// limit of one; any success, even an empty page, classifies control. Tier 2:
/// probing the well-known controller deployments. Every error, forbidden
/// included, falls through to the next probe.
pub async fn is_control_cluster(handle: &ClusterHandle) -> bool {
    match handle.reader.list(&specs::BINDING_POLICIES, None, Some(1)).await {
        Ok(_) => return true,
        Err(e) => debug!(cluster = %handle.name, error = %e, "binding-policy probe missed"),
    }
    for (ns, name) in probe_pairs() {
        if handle.reader.get_deployment(ns, name).await.is_ok() {
            return true;
        }
    }
    false
}

/// Scan clusters in registry order; first control cluster wins.
pub async fn detect_control_cluster(handles: &[ClusterHandle]) -> Option<String> {
    for handle in handles {
        if is_control_cluster(handle).await {
            return Some(handle.name.clone());
        }
    }
    None
}

/// Detailed control-plane state for one cluster: per-controller readiness,
/// binding-policy count, and managed-cluster count.
pub async fn control_cluster_info(handle: &ClusterHandle) -> ControlClusterInfo {
    let now = chrono::Utc::now().timestamp();
    let mut info = ControlClusterInfo::workload(&handle.name, now);
    if !is_control_cluster(handle).await {
        return info;
    }
    info.is_control_cluster = true;

    for ns in CONTROL_NAMESPACES {
        let Ok(deployments) = handle.reader.list_deployments(ns).await else {
            continue;
        };
        for d in deployments {
            if !is_controller_name(&d.name) {
                continue;
            }
            let message = if d.ready_replicas < d.replicas {
                Some("Not all replicas ready".to_string())
            } else {
                None
            };
            info.controller_status.insert(
                d.name,
                ControllerState {
                    ready: d.ready_replicas > 0,
                    replicas: d.replicas,
                    available: d.available_replicas,
                    message,
                },
            );
        }
    }

    if let Ok(bindings) = handle.reader.list(&specs::BINDING_POLICIES, None, None).await {
        info.total_bindings = bindings.len();
    }
    info.managed_clusters = managed_cluster_count(handle).await;
    info
}

/// Managed clusters are represented by sync targets, or by locations on
/// older installs; tried in that priority order, first non-empty wins.
async fn managed_cluster_count(handle: &ClusterHandle) -> usize {
    for spec in [&specs::SYNC_TARGETS, &specs::LOCATIONS] {
        if let Ok(items) = handle.reader.list(spec, None, None).await {
            if !items.is_empty() {
                return items.len();
            }
        }
    }
    0
}
