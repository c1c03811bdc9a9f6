//! Fleet topology – deterministic node/edge graph over aggregated state.
//!
//! The builder is a pure function: node and edge ids are composite keys of
//! their constituent fields, so two builds over identical inputs produce
//! identical graphs, which makes polling diffs stable.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use fleet_core::{
    Gateway, GatewayStatus, HttpRoute, RouteStatus, ServiceExport, ServiceExportStatus,
    ServiceImport,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub cluster: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    pub health: Health,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    pub health: Health,
    pub animated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub clusters: Vec<String>,
    /// Stamped by the caller at serve time; the build itself is pure.
    pub last_updated: i64,
}

/// One row per cluster appearing in any input collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub name: String,
    pub node_count: usize,
    pub service_count: usize,
    pub gateway_count: usize,
    pub export_count: usize,
    pub import_count: usize,
    pub health: Health,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub healthy_connections: usize,
    pub degraded_connections: usize,
}

pub fn cluster_node_id(cluster: &str) -> String {
    format!("cluster:{}", cluster)
}

pub fn service_node_id(cluster: &str, namespace: &str, name: &str) -> String {
    format!("service:{}:{}:{}", cluster, namespace, name)
}

pub fn gateway_node_id(cluster: &str, namespace: &str, name: &str) -> String {
    format!("gateway:{}:{}:{}", cluster, namespace, name)
}

pub fn route_node_id(cluster: &str, namespace: &str, name: &str) -> String {
    format!("route:{}:{}:{}", cluster, namespace, name)
}

fn export_health(status: ServiceExportStatus) -> Health {
    match status {
        ServiceExportStatus::Failed => Health::Unhealthy,
        ServiceExportStatus::Pending => Health::Degraded,
        _ => Health::Healthy,
    }
}

fn import_health(endpoints: i32) -> Health {
    if endpoints == 0 {
        Health::Degraded
    } else {
        Health::Healthy
    }
}

fn gateway_health(status: GatewayStatus) -> Health {
    match status {
        GatewayStatus::NotAccepted => Health::Unhealthy,
        GatewayStatus::Pending => Health::Degraded,
        _ => Health::Healthy,
    }
}

/// Build the topology graph from the four aggregated collections.
///
/// Single pass in fixed order: clusters, exports, imports, gateways, routes.
/// A cross-cluster edge is emitted only when the exporting side's service
/// node already exists, so exports must be processed before the imports that
/// reference them; this function guarantees that by its own call order, not
/// by a second resolution pass.
pub fn build_graph(
    exports: &[ServiceExport],
    imports: &[ServiceImport],
    gateways: &[Gateway],
    routes: &[HttpRoute],
) -> TopologyGraph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();

    // Distinct cluster names, sorted so repeated builds emit the same order.
    let mut cluster_set: BTreeSet<&str> = BTreeSet::new();
    for e in exports {
        cluster_set.insert(&e.cluster);
    }
    for i in imports {
        cluster_set.insert(&i.cluster);
        if !i.source_cluster.is_empty() {
            cluster_set.insert(&i.source_cluster);
        }
    }
    for g in gateways {
        cluster_set.insert(&g.cluster);
    }

    for cluster in &cluster_set {
        let id = cluster_node_id(cluster);
        if seen.insert(id.clone()) {
            nodes.push(TopologyNode {
                id,
                node_type: "cluster".to_string(),
                label: cluster.to_string(),
                cluster: cluster.to_string(),
                namespace: String::new(),
                metadata: Value::Null,
                health: Health::Healthy,
            });
        }
    }

    for exp in exports {
        let service_id = service_node_id(&exp.cluster, &exp.namespace, &exp.name);
        if seen.insert(service_id.clone()) {
            nodes.push(TopologyNode {
                id: service_id.clone(),
                node_type: "service".to_string(),
                label: exp.name.clone(),
                cluster: exp.cluster.clone(),
                namespace: exp.namespace.clone(),
                metadata: json!({
                    "status": exp.status,
                    "exported": true,
                    "serviceName": exp.service_name,
                }),
                health: export_health(exp.status),
            });
        }
        // Every export gets an edge down to its owning cluster.
        let cluster_id = cluster_node_id(&exp.cluster);
        edges.push(TopologyEdge {
            id: format!("edge:{}->{}", service_id, cluster_id),
            source: service_id,
            target: cluster_id,
            edge_type: "internal".to_string(),
            label: String::new(),
            metadata: Value::Null,
            health: Health::Healthy,
            animated: false,
        });
    }

    for imp in imports {
        let service_id = service_node_id(&imp.cluster, &imp.namespace, &imp.name);
        if seen.insert(service_id.clone()) {
            nodes.push(TopologyNode {
                id: service_id.clone(),
                node_type: "service".to_string(),
                label: imp.name.clone(),
                cluster: imp.cluster.clone(),
                namespace: imp.namespace.clone(),
                metadata: json!({
                    "imported": true,
                    "sourceCluster": imp.source_cluster,
                    "dnsName": imp.dns_name,
                    "endpoints": imp.endpoints,
                    "type": imp.import_type,
                }),
                health: import_health(imp.endpoints),
            });
        }
        if !imp.source_cluster.is_empty() {
            let source_id = service_node_id(&imp.source_cluster, &imp.namespace, &imp.name);
            // Only when the exporting side was already emitted; otherwise the
            // import keeps its node but loses the cross-cluster edge.
            if seen.contains(&source_id) {
                edges.push(TopologyEdge {
                    id: format!("mcs:{}->{}", source_id, service_id),
                    source: source_id,
                    target: service_id,
                    edge_type: "mcs-export".to_string(),
                    label: "MCS".to_string(),
                    metadata: json!({
                        "endpoints": imp.endpoints,
                        "dnsName": imp.dns_name,
                    }),
                    health: import_health(imp.endpoints),
                    animated: imp.endpoints > 0,
                });
            }
        }
    }

    for gw in gateways {
        let gw_id = gateway_node_id(&gw.cluster, &gw.namespace, &gw.name);
        if seen.insert(gw_id.clone()) {
            nodes.push(TopologyNode {
                id: gw_id,
                node_type: "gateway".to_string(),
                label: gw.name.clone(),
                cluster: gw.cluster.clone(),
                namespace: gw.namespace.clone(),
                metadata: json!({
                    "gatewayClass": gw.gateway_class,
                    "status": gw.status,
                    "addresses": gw.addresses,
                    "attachedRoutes": gw.attached_routes,
                }),
                health: gateway_health(gw.status),
            });
        }
    }

    for route in routes {
        for parent in route.parent_refs.iter().filter(|p| p.is_gateway()) {
            let ns = parent.namespace.as_deref().unwrap_or(&route.namespace);
            let gw_id = gateway_node_id(&route.cluster, ns, &parent.name);
            if !seen.contains(&gw_id) {
                continue;
            }
            let route_id = route_node_id(&route.cluster, &route.namespace, &route.name);
            edges.push(TopologyEdge {
                id: format!("http:{}->{}", gw_id, route_id),
                source: gw_id,
                target: route_id,
                edge_type: "http-route".to_string(),
                label: route.name.clone(),
                metadata: json!({"hostnames": route.hostnames}),
                health: if route.status == RouteStatus::NotAccepted {
                    Health::Unhealthy
                } else {
                    Health::Healthy
                },
                animated: true,
            });
        }
    }

    TopologyGraph {
        nodes,
        edges,
        clusters: cluster_set.into_iter().map(|c| c.to_string()).collect(),
        last_updated: 0,
    }
}

/// Per-cluster rollups over the same inputs, independent of the graph.
pub fn cluster_summaries(
    exports: &[ServiceExport],
    imports: &[ServiceImport],
    gateways: &[Gateway],
) -> Vec<ClusterSummary> {
    let mut rows: BTreeMap<&str, ClusterSummary> = BTreeMap::new();
    let blank = |name: &str| ClusterSummary {
        name: name.to_string(),
        node_count: 0,
        service_count: 0,
        gateway_count: 0,
        export_count: 0,
        import_count: 0,
        health: Health::Healthy,
    };

    for e in exports {
        let row = rows.entry(&e.cluster).or_insert_with(|| blank(&e.cluster));
        row.export_count += 1;
        row.service_count += 1;
    }
    for i in imports {
        let row = rows.entry(&i.cluster).or_insert_with(|| blank(&i.cluster));
        row.import_count += 1;
    }
    for g in gateways {
        let row = rows.entry(&g.cluster).or_insert_with(|| blank(&g.cluster));
        row.gateway_count += 1;
    }

    let mut out: Vec<ClusterSummary> = rows.into_values().collect();
    for row in &mut out {
        row.node_count = row.service_count + row.gateway_count;
    }
    out
}

pub fn graph_stats(graph: &TopologyGraph) -> GraphStats {
    let mut stats = GraphStats {
        total_nodes: graph.nodes.len(),
        total_edges: graph.edges.len(),
        ..Default::default()
    };
    for edge in &graph.edges {
        match edge.health {
            Health::Healthy => stats.healthy_connections += 1,
            Health::Degraded | Health::Unhealthy => stats.degraded_connections += 1,
        }
    }
    stats
}
