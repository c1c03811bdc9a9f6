//! Aggregation operations built on the fan-out primitive.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use fleet_core::{
    platform_from_node_labels, region_from_node_labels, ClusterRegistration,
    ClusterRegistrationStatus, ClusterType, Gateway, HttpRoute, ServiceExport, ServiceImport,
    Workload, WorkloadKind,
};
use fleet_hub::{specs, ClusterHandle, ListError, ResourceSpec};

use crate::{detect, fan_out, AggregateResult};

/// Optional narrowing of a workload aggregation.
#[derive(Debug, Clone, Default)]
pub struct WorkloadFilter {
    pub cluster: Option<String>,
    pub namespace: Option<String>,
    pub kind: Option<WorkloadKind>,
}

fn spec_for(kind: WorkloadKind) -> ResourceSpec {
    match kind {
        WorkloadKind::Deployment => specs::DEPLOYMENTS,
        WorkloadKind::StatefulSet => specs::STATEFULSETS,
        WorkloadKind::DaemonSet => specs::DAEMONSETS,
    }
}

/// Workload inventory across clusters, optionally narrowed by cluster,
/// namespace, and kind.
pub async fn workloads(
    handles: &[ClusterHandle],
    filter: &WorkloadFilter,
    budget: Duration,
) -> AggregateResult<Workload> {
    let narrowed: Vec<ClusterHandle> = match &filter.cluster {
        Some(c) => handles.iter().filter(|h| &h.name == c).cloned().collect(),
        None => handles.to_vec(),
    };
    let kinds: Vec<WorkloadKind> = match filter.kind {
        Some(k) => vec![k],
        None => WorkloadKind::ALL.to_vec(),
    };
    let namespace = filter.namespace.clone();
    fan_out(&narrowed, budget, move |h| {
        let kinds = kinds.clone();
        let namespace = namespace.clone();
        async move { cluster_workloads(h, kinds, namespace).await }
    })
    .await
}

/// One cluster's workloads across the requested kinds. A kind that errors is
/// tolerated as long as another kind listed successfully: partial results
/// beat an all-or-nothing failure.
async fn cluster_workloads(
    handle: ClusterHandle,
    kinds: Vec<WorkloadKind>,
    namespace: Option<String>,
) -> Result<Vec<Workload>, ListError> {
    let mut out = Vec::new();
    let mut any_ok = false;
    let mut last_err = None;
    for kind in kinds {
        match handle.reader.list(&spec_for(kind), namespace.as_deref(), None).await {
            Ok(objs) => {
                any_ok = true;
                out.extend(objs.iter().filter_map(|o| Workload::from_object(o, kind, &handle.name)));
            }
            Err(ListError::Unsupported) => {}
            Err(e) => {
                debug!(cluster = %handle.name, kind = kind.as_str(), error = %e, "kind listing failed");
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) if !any_ok => Err(e),
        _ => Ok(out),
    }
}

pub async fn service_exports(
    handles: &[ClusterHandle],
    budget: Duration,
) -> AggregateResult<ServiceExport> {
    fan_out(handles, budget, |h| async move {
        let objs = h.reader.list(&specs::SERVICE_EXPORTS, None, None).await?;
        Ok(objs.iter().filter_map(|o| ServiceExport::from_object(o, &h.name)).collect())
    })
    .await
}

pub async fn service_imports(
    handles: &[ClusterHandle],
    budget: Duration,
) -> AggregateResult<ServiceImport> {
    fan_out(handles, budget, |h| async move {
        let objs = h.reader.list(&specs::SERVICE_IMPORTS, None, None).await?;
        Ok(objs.iter().filter_map(|o| ServiceImport::from_object(o, &h.name)).collect())
    })
    .await
}

/// Gateway API kinds moved from v1beta1 to v1; clusters still on the old
/// channel answer the fallback spec.
async fn list_with_fallback(
    handle: &ClusterHandle,
    primary: &ResourceSpec,
    fallback: &ResourceSpec,
) -> Result<Vec<Value>, ListError> {
    match handle.reader.list(primary, None, None).await {
        Err(ListError::Unsupported) => handle.reader.list(fallback, None, None).await,
        other => other,
    }
}

pub async fn gateways(handles: &[ClusterHandle], budget: Duration) -> AggregateResult<Gateway> {
    fan_out(handles, budget, |h| async move {
        let objs = list_with_fallback(&h, &specs::GATEWAYS, &specs::GATEWAYS_V1BETA1).await?;
        Ok(objs.iter().filter_map(|o| Gateway::from_object(o, &h.name)).collect())
    })
    .await
}

pub async fn http_routes(handles: &[ClusterHandle], budget: Duration) -> AggregateResult<HttpRoute> {
    fan_out(handles, budget, |h| async move {
        let objs = list_with_fallback(&h, &specs::HTTP_ROUTES, &specs::HTTP_ROUTES_V1BETA1).await?;
        Ok(objs.iter().filter_map(|o| HttpRoute::from_object(o, &h.name)).collect())
    })
    .await
}

/// One registration row per registered cluster. A cluster that cannot be
/// reached reports status `Offline`; it never fails the whole call.
pub async fn registered_clusters(
    handles: &[ClusterHandle],
    budget: Duration,
) -> Vec<ClusterRegistration> {
    let mut agg =
        fan_out(handles, budget, |h| async move { Ok(vec![registration_for(&h).await]) }).await;

    // Clusters that ran out of time still get a row.
    let now = chrono::Utc::now().timestamp();
    for name in agg.errors.keys() {
        agg.items.push(ClusterRegistration {
            name: name.clone(),
            cluster_type: ClusterType::Unknown,
            status: ClusterRegistrationStatus::Offline,
            kubernetes_version: None,
            platform: None,
            region: None,
            last_heartbeat: None,
            registered_at: now,
        });
    }
    agg.items.sort_by(|a, b| a.name.cmp(&b.name));
    agg.items
}

async fn registration_for(handle: &ClusterHandle) -> ClusterRegistration {
    let now = chrono::Utc::now().timestamp();
    let cluster_type = if detect::is_control_cluster(handle).await {
        ClusterType::Control
    } else {
        ClusterType::Workload
    };
    let mut reg = ClusterRegistration {
        name: handle.name.clone(),
        cluster_type,
        status: ClusterRegistrationStatus::Unknown,
        kubernetes_version: None,
        platform: None,
        region: None,
        last_heartbeat: None,
        registered_at: now,
    };

    match handle.reader.server_version().await {
        Ok(version) => {
            reg.status = ClusterRegistrationStatus::Ready;
            reg.kubernetes_version = Some(version);
            reg.last_heartbeat = Some(now);
        }
        Err(e) => {
            debug!(cluster = %handle.name, error = %e, "liveness probe failed");
            reg.status = ClusterRegistrationStatus::Offline;
        }
    }

    if let Ok(nodes) = handle.reader.list(&specs::NODES, None, None).await {
        for node in &nodes {
            if let Some(platform) = platform_from_node_labels(node) {
                reg.platform = Some(platform.to_string());
                break;
            }
        }
        if let Some(first) = nodes.first() {
            reg.region = region_from_node_labels(first);
        }
    }
    reg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fleet_core::WorkloadStatus;
    use fleet_hub::StaticReader;
    use serde_json::json;

    fn deployment(name: &str, ns: &str, replicas: i64) -> Value {
        json!({
            "metadata": {"name": name, "namespace": ns},
            "spec": {"replicas": replicas},
            "status": {"readyReplicas": replicas, "availableReplicas": replicas},
        })
    }

    fn handle(name: &str, reader: StaticReader) -> ClusterHandle {
        ClusterHandle::new(name, Arc::new(reader))
    }

    #[tokio::test]
    async fn workloads_merge_across_clusters_with_errors_recorded() {
        let handles = vec![
            handle(
                "alpha",
                StaticReader::new().with_objects(
                    &specs::DEPLOYMENTS,
                    vec![deployment("web", "default", 2), deployment("api", "default", 1)],
                ),
            ),
            handle("beta", StaticReader::offline()),
        ];
        let res = workloads(&handles, &WorkloadFilter::default(), Duration::from_secs(1)).await;
        assert_eq!(res.items.len(), 2);
        assert!(res.items.iter().all(|w| w.cluster == "alpha"));
        assert!(res.items.iter().all(|w| w.status == WorkloadStatus::Running));
        assert_eq!(res.errors.len(), 1);
        assert!(res.errors.contains_key("beta"));
    }

    #[tokio::test]
    async fn workload_filters_narrow_cluster_namespace_and_kind() {
        let reader = StaticReader::new()
            .with_objects(
                &specs::DEPLOYMENTS,
                vec![deployment("web", "prod", 1), deployment("web", "dev", 1)],
            )
            .with_objects(
                &specs::STATEFULSETS,
                vec![json!({
                    "metadata": {"name": "db", "namespace": "prod"},
                    "spec": {"replicas": 1},
                    "status": {"readyReplicas": 1},
                })],
            );
        let handles = vec![handle("alpha", reader), handle("beta", StaticReader::new())];

        let filter = WorkloadFilter {
            cluster: Some("alpha".to_string()),
            namespace: Some("prod".to_string()),
            kind: Some(WorkloadKind::Deployment),
        };
        let res = workloads(&handles, &filter, Duration::from_secs(1)).await;
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.items[0].name, "web");
        assert_eq!(res.items[0].namespace, "prod");
        assert!(res.errors.is_empty());
    }

    #[tokio::test]
    async fn one_good_kind_outweighs_a_failing_one() {
        let reader = StaticReader::new()
            .with_objects(&specs::DEPLOYMENTS, vec![deployment("web", "default", 1)])
            .with_error(&specs::STATEFULSETS, ListError::Api("boom".into()));
        let handles = vec![handle("alpha", reader)];

        let res = workloads(&handles, &WorkloadFilter::default(), Duration::from_secs(1)).await;
        assert_eq!(res.items.len(), 1);
        assert!(res.errors.is_empty());
    }

    #[tokio::test]
    async fn all_kinds_failing_records_the_cluster() {
        let reader = StaticReader::new()
            .with_error(&specs::DEPLOYMENTS, ListError::Api("boom".into()));
        let handles = vec![handle("alpha", reader)];

        let res = workloads(&handles, &WorkloadFilter::default(), Duration::from_secs(1)).await;
        assert!(res.items.is_empty());
        assert_eq!(res.errors.get("alpha"), Some(&ListError::Api("boom".into())));
    }

    #[tokio::test]
    async fn gateways_fall_back_to_v1beta1() {
        let reader = StaticReader::new().with_objects(
            &specs::GATEWAYS_V1BETA1,
            vec![json!({"metadata": {"name": "edge", "namespace": "infra"}})],
        );
        let handles = vec![handle("alpha", reader)];

        let res = gateways(&handles, Duration::from_secs(1)).await;
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.items[0].name, "edge");
        assert!(res.errors.is_empty());
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_not_fatal() {
        let reader = StaticReader::new().with_objects(
            &specs::SERVICE_EXPORTS,
            vec![
                json!({"metadata": {}}),
                json!({"metadata": {"name": "svc-a", "namespace": "default"}}),
            ],
        );
        let handles = vec![handle("alpha", reader)];

        let res = service_exports(&handles, Duration::from_secs(1)).await;
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.items[0].name, "svc-a");
    }

    #[tokio::test]
    async fn registrations_cover_offline_clusters() {
        let ready = StaticReader::new().with_objects(
            &specs::NODES,
            vec![json!({"metadata": {"name": "n1", "labels": {
                "cloud.google.com/gke-nodepool": "default",
                "topology.kubernetes.io/region": "europe-west1",
            }}})],
        );
        let handles = vec![handle("beta", StaticReader::offline()), handle("alpha", ready)];

        let regs = registered_clusters(&handles, Duration::from_secs(1)).await;
        assert_eq!(regs.len(), 2);
        // Sorted by name.
        assert_eq!(regs[0].name, "alpha");
        assert_eq!(regs[0].status, ClusterRegistrationStatus::Ready);
        assert_eq!(regs[0].kubernetes_version.as_deref(), Some("v1.30.0"));
        assert_eq!(regs[0].platform.as_deref(), Some("GKE"));
        assert_eq!(regs[0].region.as_deref(), Some("europe-west1"));
        assert_eq!(regs[0].cluster_type, ClusterType::Workload);

        assert_eq!(regs[1].name, "beta");
        assert_eq!(regs[1].status, ClusterRegistrationStatus::Offline);
        assert_eq!(regs[1].kubernetes_version, None);
    }

    #[tokio::test]
    async fn control_cluster_is_typed_in_registrations() {
        let control = StaticReader::new().with_objects(&specs::BINDING_POLICIES, Vec::new());
        let handles = vec![handle("hub", control)];

        let regs = registered_clusters(&handles, Duration::from_secs(1)).await;
        assert_eq!(regs[0].cluster_type, ClusterType::Control);
    }
}
