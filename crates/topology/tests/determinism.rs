//! Repeated builds over identical inputs must be byte-identical.

use fleet_core::{
    Conditions, Gateway, GatewayStatus, HttpRoute, ParentRef, RouteStatus, ServiceExport,
    ServiceExportStatus, ServiceImport, ServiceImportType,
};
use fleet_topology::{build_graph, cluster_summaries, graph_stats};

fn fixtures() -> (Vec<ServiceExport>, Vec<ServiceImport>, Vec<Gateway>, Vec<HttpRoute>) {
    let exports = vec![
        ServiceExport {
            name: "svc-a".into(),
            namespace: "default".into(),
            cluster: "alpha".into(),
            service_name: "svc-a".into(),
            status: ServiceExportStatus::Ready,
            message: String::new(),
            creation_ts: 100,
            conditions: Conditions::new(),
        },
        ServiceExport {
            name: "svc-b".into(),
            namespace: "payments".into(),
            cluster: "gamma".into(),
            service_name: "svc-b".into(),
            status: ServiceExportStatus::Pending,
            message: String::new(),
            creation_ts: 200,
            conditions: Conditions::new(),
        },
    ];
    let imports = vec![
        ServiceImport {
            name: "svc-a".into(),
            namespace: "default".into(),
            cluster: "beta".into(),
            source_cluster: "alpha".into(),
            import_type: ServiceImportType::ClusterSetIP,
            dns_name: "svc-a.default.svc.clusterset.local".into(),
            cluster_set_ips: vec!["10.96.0.8".into()],
            ports: Default::default(),
            endpoints: 3,
            creation_ts: 150,
            conditions: Conditions::new(),
        },
        ServiceImport {
            name: "svc-c".into(),
            namespace: "default".into(),
            cluster: "beta".into(),
            source_cluster: "delta".into(),
            import_type: ServiceImportType::Headless,
            dns_name: "svc-c.default.svc.clusterset.local".into(),
            cluster_set_ips: Vec::new(),
            ports: Default::default(),
            endpoints: 0,
            creation_ts: 160,
            conditions: Conditions::new(),
        },
    ];
    let gateways = vec![Gateway {
        name: "edge".into(),
        namespace: "infra".into(),
        cluster: "alpha".into(),
        gateway_class: "istio".into(),
        status: GatewayStatus::Programmed,
        addresses: vec!["10.0.0.1".into()],
        listeners: Default::default(),
        attached_routes: 2,
        creation_ts: 50,
        conditions: Conditions::new(),
    }];
    let routes = vec![HttpRoute {
        name: "api".into(),
        namespace: "default".into(),
        cluster: "alpha".into(),
        hostnames: vec!["api.example.com".into()],
        parent_refs: [ParentRef {
            kind: "Gateway".into(),
            name: "edge".into(),
            namespace: Some("infra".into()),
        }]
        .into_iter()
        .collect(),
        status: RouteStatus::Accepted,
        creation_ts: 300,
        conditions: Conditions::new(),
    }];
    (exports, imports, gateways, routes)
}

#[test]
fn identical_inputs_build_identical_graphs() {
    let (exports, imports, gateways, routes) = fixtures();

    let a = build_graph(&exports, &imports, &gateways, &routes);
    let b = build_graph(&exports, &imports, &gateways, &routes);

    let a_json = serde_json::to_vec(&a).expect("serialize");
    let b_json = serde_json::to_vec(&b).expect("serialize");
    assert_eq!(a_json, b_json);

    // Ids are composite keys of their fields, not allocation order.
    let node_ids: Vec<&str> = a.nodes.iter().map(|n| n.id.as_str()).collect();
    assert!(node_ids.contains(&"service:alpha:default:svc-a"));
    assert!(node_ids.contains(&"gateway:alpha:infra:edge"));
    assert_eq!(a.clusters, vec!["alpha", "beta", "delta", "gamma"]);
}

#[test]
fn every_edge_endpoint_is_a_known_node_except_route_targets() {
    let (exports, imports, gateways, routes) = fixtures();
    let graph = build_graph(&exports, &imports, &gateways, &routes);

    let node_ids: std::collections::HashSet<&str> =
        graph.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &graph.edges {
        assert!(node_ids.contains(edge.source.as_str()), "dangling source {}", edge.source);
        if edge.edge_type != "http-route" {
            assert!(node_ids.contains(edge.target.as_str()), "dangling target {}", edge.target);
        }
    }
}

#[test]
fn summaries_and_stats_are_stable() {
    let (exports, imports, gateways, _) = fixtures();

    let a = cluster_summaries(&exports, &imports, &gateways);
    let b = cluster_summaries(&exports, &imports, &gateways);
    assert_eq!(a, b);
    assert_eq!(a.len(), 3); // alpha, beta, gamma

    let graph = build_graph(&exports, &imports, &gateways, &[]);
    let stats = graph_stats(&graph);
    assert_eq!(stats.total_edges, graph.edges.len());
    assert_eq!(
        stats.healthy_connections + stats.degraded_connections,
        stats.total_edges
    );
}
