//! Fleet public API façade (in-process).
//!
//! This crate defines the stable trait and types frontends depend on. The
//! in-process implementation wires the cluster registry, the fan-out
//! aggregations, and the topology builder behind coalescing caches.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use fleet_aggregate::{detect, ops, AggregateResult};
use fleet_cache::CoalescingCache;
use fleet_core::{
    ClusterRegistration, ControlClusterInfo, Gateway, HttpRoute, ServiceExport, ServiceImport,
    Workload,
};
use fleet_hub::{ClusterRegistry, ListError};
use fleet_topology::{
    build_graph, cluster_summaries, graph_stats, ClusterSummary, GraphStats, TopologyGraph,
};

pub use fleet_aggregate::WorkloadFilter;

/// API errors suitable for transport over RPC later.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum FleetError {
    /// Every source failed; distinguishable from "nothing exists".
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type FleetResult<T> = Result<T, FleetError>;

/// Aggregated workload inventory plus per-cluster errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadList {
    pub items: Vec<Workload>,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, ListError>,
}

/// The topology response: graph, per-cluster rollups, and edge stats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyView {
    pub graph: TopologyGraph,
    pub clusters: Vec<ClusterSummary>,
    pub stats: GraphStats,
}

/// Declarative Fleet API surface. Every operation runs under the caller's
/// budget and prefers partial results over all-or-nothing failure.
#[async_trait::async_trait]
pub trait FleetApi: Send + Sync {
    async fn workloads(&self, filter: WorkloadFilter, budget: Duration)
        -> FleetResult<WorkloadList>;

    /// Service topology across all clusters, coalescing-cached.
    async fn topology(&self, budget: Duration) -> FleetResult<TopologyView>;

    /// First control cluster in registry order, or `None`.
    async fn detect_control_cluster(&self, budget: Duration) -> FleetResult<Option<String>>;

    async fn control_cluster_info(
        &self,
        cluster: &str,
        budget: Duration,
    ) -> FleetResult<ControlClusterInfo>;

    /// One row per registered cluster; offline clusters report `Offline`
    /// rather than failing the call. Coalescing-cached.
    async fn registered_clusters(&self, budget: Duration)
        -> FleetResult<Vec<ClusterRegistration>>;

    async fn service_exports(&self, budget: Duration)
        -> FleetResult<AggregateResult<ServiceExport>>;
    async fn service_imports(&self, budget: Duration)
        -> FleetResult<AggregateResult<ServiceImport>>;
    async fn gateways(&self, budget: Duration) -> FleetResult<AggregateResult<Gateway>>;
    async fn http_routes(&self, budget: Duration) -> FleetResult<AggregateResult<HttpRoute>>;
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

// ----------------- In-process implementation -----------------

/// In-process implementation calling the internal crates directly.
pub struct InProcApi {
    registry: Arc<ClusterRegistry>,
    /// Budget for cache-refreshing fetches, independent of caller budgets.
    internal_budget: Duration,
    topology_cache: CoalescingCache<TopologyView>,
    registration_cache: CoalescingCache<Vec<ClusterRegistration>>,
}

impl InProcApi {
    /// Reads `FLEET_BUDGET_MS` (internal fetch budget, default 10s) and
    /// `FLEET_CACHE_TTL_SECS` (default 30s).
    pub fn new(registry: Arc<ClusterRegistry>) -> Self {
        let internal_budget = Duration::from_millis(env_u64("FLEET_BUDGET_MS", 10_000));
        let ttl = Duration::from_secs(env_u64("FLEET_CACHE_TTL_SECS", 30));
        // The cache's own guard sits past the fan-out budget + grace so the
        // fetch can finish classifying stragglers before it is cut off.
        let fetch_timeout = internal_budget + Duration::from_secs(2);
        Self {
            registry,
            internal_budget,
            topology_cache: CoalescingCache::new("topology", ttl, fetch_timeout),
            registration_cache: CoalescingCache::new("registrations", ttl, fetch_timeout),
        }
    }

    pub fn registry(&self) -> &ClusterRegistry {
        &self.registry
    }

    async fn fetch_topology(
        registry: Arc<ClusterRegistry>,
        budget: Duration,
    ) -> anyhow::Result<TopologyView> {
        let handles = registry.handles();
        let total = handles.len();
        let (exports, imports, gateways, routes) = tokio::join!(
            ops::service_exports(&handles, budget),
            ops::service_imports(&handles, budget),
            ops::gateways(&handles, budget),
            ops::http_routes(&handles, budget),
        );
        if exports.all_failed(total)
            && imports.all_failed(total)
            && gateways.all_failed(total)
            && routes.all_failed(total)
        {
            anyhow::bail!("all {} clusters failed", total);
        }
        let mut graph = build_graph(&exports.items, &imports.items, &gateways.items, &routes.items);
        graph.last_updated = chrono::Utc::now().timestamp();
        let clusters = cluster_summaries(&exports.items, &imports.items, &gateways.items);
        let stats = graph_stats(&graph);
        Ok(TopologyView { graph, clusters, stats })
    }
}

/// Run `fut` under the caller's budget, mapping expiry to `Unavailable`.
async fn under_budget<T>(
    budget: Duration,
    fut: impl std::future::Future<Output = FleetResult<T>>,
) -> FleetResult<T> {
    match tokio::time::timeout(budget, fut).await {
        Ok(res) => res,
        Err(_) => Err(FleetError::Unavailable("deadline exceeded".to_string())),
    }
}

#[async_trait::async_trait]
impl FleetApi for InProcApi {
    async fn workloads(
        &self,
        filter: WorkloadFilter,
        budget: Duration,
    ) -> FleetResult<WorkloadList> {
        let t0 = Instant::now();
        let handles = self.registry.handles();
        if let Some(cluster) = &filter.cluster {
            if !handles.iter().any(|h| &h.name == cluster) {
                return Err(FleetError::NotFound(format!("unknown cluster: {}", cluster)));
            }
        }
        let attempted = match &filter.cluster {
            Some(_) => 1,
            None => handles.len(),
        };
        let res = ops::workloads(&handles, &filter, budget).await;
        if res.all_failed(attempted) {
            return Err(FleetError::Unavailable(format!("all {} clusters failed", attempted)));
        }
        info!(items = res.items.len(), errors = res.errors.len(),
            took_ms = %t0.elapsed().as_millis(), "api: workloads ok");
        Ok(WorkloadList { total_count: res.items.len(), items: res.items, errors: res.errors })
    }

    async fn topology(&self, budget: Duration) -> FleetResult<TopologyView> {
        let t0 = Instant::now();
        let registry = self.registry.clone();
        let internal = self.internal_budget;
        let view = under_budget(budget, async {
            self.topology_cache
                .get_or_fetch(|| Self::fetch_topology(registry, internal))
                .await
                .map_err(|e| FleetError::Unavailable(e.to_string()))
        })
        .await?;
        info!(nodes = view.graph.nodes.len(), edges = view.graph.edges.len(),
            took_ms = %t0.elapsed().as_millis(), "api: topology ok");
        Ok(view)
    }

    async fn detect_control_cluster(&self, budget: Duration) -> FleetResult<Option<String>> {
        let t0 = Instant::now();
        let handles = self.registry.handles();
        let found = under_budget(budget, async {
            Ok(detect::detect_control_cluster(&handles).await)
        })
        .await?;
        info!(found = found.as_deref().unwrap_or("-"),
            took_ms = %t0.elapsed().as_millis(), "api: detect ok");
        Ok(found)
    }

    async fn control_cluster_info(
        &self,
        cluster: &str,
        budget: Duration,
    ) -> FleetResult<ControlClusterInfo> {
        let t0 = Instant::now();
        let handle = self
            .registry
            .get(cluster)
            .ok_or_else(|| FleetError::NotFound(format!("unknown cluster: {}", cluster)))?;
        let info = under_budget(budget, async {
            Ok(detect::control_cluster_info(&handle).await)
        })
        .await?;
        info!(cluster = %cluster, is_control = info.is_control_cluster,
            took_ms = %t0.elapsed().as_millis(), "api: cluster info ok");
        Ok(info)
    }

    async fn registered_clusters(
        &self,
        budget: Duration,
    ) -> FleetResult<Vec<ClusterRegistration>> {
        let t0 = Instant::now();
        let registry = self.registry.clone();
        let internal = self.internal_budget;
        let regs = under_budget(budget, async {
            self.registration_cache
                .get_or_fetch(|| async move {
                    let handles = registry.handles();
                    Ok(ops::registered_clusters(&handles, internal).await)
                })
                .await
                .map_err(|e| FleetError::Unavailable(e.to_string()))
        })
        .await?;
        info!(clusters = regs.len(), took_ms = %t0.elapsed().as_millis(), "api: clusters ok");
        Ok(regs)
    }

    async fn service_exports(
        &self,
        budget: Duration,
    ) -> FleetResult<AggregateResult<ServiceExport>> {
        let handles = self.registry.handles();
        let res = ops::service_exports(&handles, budget).await;
        if res.all_failed(handles.len()) {
            return Err(FleetError::Unavailable(format!("all {} clusters failed", handles.len())));
        }
        Ok(res)
    }

    async fn service_imports(
        &self,
        budget: Duration,
    ) -> FleetResult<AggregateResult<ServiceImport>> {
        let handles = self.registry.handles();
        let res = ops::service_imports(&handles, budget).await;
        if res.all_failed(handles.len()) {
            return Err(FleetError::Unavailable(format!("all {} clusters failed", handles.len())));
        }
        Ok(res)
    }

    async fn gateways(&self, budget: Duration) -> FleetResult<AggregateResult<Gateway>> {
        let handles = self.registry.handles();
        let res = ops::gateways(&handles, budget).await;
        if res.all_failed(handles.len()) {
            return Err(FleetError::Unavailable(format!("all {} clusters failed", handles.len())));
        }
        Ok(res)
    }

    async fn http_routes(&self, budget: Duration) -> FleetResult<AggregateResult<HttpRoute>> {
        let handles = self.registry.handles();
        let res = ops::http_routes(&handles, budget).await;
        if res.all_failed(handles.len()) {
            return Err(FleetError::Unavailable(format!("all {} clusters failed", handles.len())));
        }
        Ok(res)
    }
}

// ----------------- Mock implementation -----------------

/// Simple in-memory mock implementation for frontends' tests.
#[derive(Default)]
pub struct MockApi {
    pub workloads: Vec<Workload>,
    pub topology: Option<TopologyView>,
    pub control_cluster: Option<String>,
    pub cluster_info: Option<ControlClusterInfo>,
    pub registrations: Vec<ClusterRegistration>,
    pub exports: Vec<ServiceExport>,
    pub imports: Vec<ServiceImport>,
    pub gateways: Vec<Gateway>,
    pub routes: Vec<HttpRoute>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl FleetApi for MockApi {
    async fn workloads(
        &self,
        _filter: WorkloadFilter,
        _budget: Duration,
    ) -> FleetResult<WorkloadList> {
        Ok(WorkloadList {
            total_count: self.workloads.len(),
            items: self.workloads.clone(),
            errors: HashMap::new(),
        })
    }

    async fn topology(&self, _budget: Duration) -> FleetResult<TopologyView> {
        self.topology.clone().ok_or_else(|| FleetError::NotFound("no topology".into()))
    }

    async fn detect_control_cluster(&self, _budget: Duration) -> FleetResult<Option<String>> {
        Ok(self.control_cluster.clone())
    }

    async fn control_cluster_info(
        &self,
        cluster: &str,
        _budget: Duration,
    ) -> FleetResult<ControlClusterInfo> {
        self.cluster_info
            .clone()
            .ok_or_else(|| FleetError::NotFound(format!("unknown cluster: {}", cluster)))
    }

    async fn registered_clusters(
        &self,
        _budget: Duration,
    ) -> FleetResult<Vec<ClusterRegistration>> {
        Ok(self.registrations.clone())
    }

    async fn service_exports(
        &self,
        _budget: Duration,
    ) -> FleetResult<AggregateResult<ServiceExport>> {
        Ok(AggregateResult { items: self.exports.clone(), errors: HashMap::new() })
    }

    async fn service_imports(
        &self,
        _budget: Duration,
    ) -> FleetResult<AggregateResult<ServiceImport>> {
        Ok(AggregateResult { items: self.imports.clone(), errors: HashMap::new() })
    }

    async fn gateways(&self, _budget: Duration) -> FleetResult<AggregateResult<Gateway>> {
        Ok(AggregateResult { items: self.gateways.clone(), errors: HashMap::new() })
    }

    async fn http_routes(&self, _budget: Duration) -> FleetResult<AggregateResult<HttpRoute>> {
        Ok(AggregateResult { items: self.routes.clone(), errors: HashMap::new() })
    }
}
