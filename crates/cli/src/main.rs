use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use fleet_api::{FleetApi, InProcApi, WorkloadFilter};
use fleet_core::WorkloadKind;
use fleet_hub::ClusterRegistry;

#[derive(Parser, Debug)]
#[command(name = "fleetctl", version, about = "Fleet multi-cluster console CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Overall budget for one aggregation call, in milliseconds
    #[arg(long = "budget-ms", global = true, default_value_t = 10_000)]
    budget_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered clusters with liveness, platform and version
    Clusters,
    /// Aggregate workloads across clusters
    Workloads {
        /// Restrict to one cluster
        #[arg(long)]
        cluster: Option<String>,
        /// Restrict to one namespace
        #[arg(long = "ns")]
        namespace: Option<String>,
        /// Restrict to one kind (Deployment, StatefulSet, DaemonSet)
        #[arg(long)]
        kind: Option<String>,
    },
    /// Build the cross-cluster service topology
    Topology,
    /// Find the control cluster, if any
    Detect,
    /// Control-plane details for one cluster
    Info { cluster: String },
    /// Aggregate service exports
    Exports,
    /// Aggregate service imports
    Imports,
    /// Aggregate gateways
    Gateways,
    /// Aggregate HTTP routes
    Routes,
}

fn init_tracing() {
    let env = std::env::var("FLEET_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("FLEET_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid FLEET_METRICS_ADDR; expected host:port");
        }
    }
}

fn render_age(creation_ts: i64) -> String {
    if creation_ts <= 0 {
        return "-".to_string();
    }
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let mut secs = (now - creation_ts).max(0) as u64;
    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3600;
    secs %= 3600;
    let mins = secs / 60;
    secs %= 60;
    if days > 0 {
        format!("{}d{}h", days, hours)
    } else if hours > 0 {
        format!("{}h{}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

fn report_cluster_errors(errors: &std::collections::HashMap<String, fleet_hub::ListError>) {
    for (cluster, err) in errors {
        eprintln!("warning: {}: {}", cluster, err);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let budget = Duration::from_millis(cli.budget_ms);

    let registry = Arc::new(ClusterRegistry::from_kubeconfig().await?);
    info!(clusters = registry.len(), budget_ms = cli.budget_ms, "fleetctl starting");
    let api = InProcApi::new(registry);

    match cli.command {
        Commands::Clusters => {
            let regs = api.registered_clusters(budget).await?;
            match cli.output {
                Output::Human => {
                    println!(
                        "{:<24} {:<10} {:<9} {:<12} {:<10} {}",
                        "NAME", "TYPE", "STATUS", "VERSION", "PLATFORM", "REGION"
                    );
                    for r in &regs {
                        println!(
                            "{:<24} {:<10} {:<9} {:<12} {:<10} {}",
                            r.name,
                            format!("{:?}", r.cluster_type),
                            format!("{:?}", r.status),
                            r.kubernetes_version.as_deref().unwrap_or("-"),
                            r.platform.as_deref().unwrap_or("-"),
                            r.region.as_deref().unwrap_or("-"),
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&regs)?),
            }
        }
        Commands::Workloads { cluster, namespace, kind } => {
            let kind = match kind {
                Some(k) => Some(WorkloadKind::from_str(&k).map_err(anyhow::Error::msg)?),
                None => None,
            };
            let filter = WorkloadFilter { cluster, namespace, kind };
            let list = api.workloads(filter, budget).await?;
            report_cluster_errors(&list.errors);
            match cli.output {
                Output::Human => {
                    println!(
                        "{:<16} {:<14} {:<28} {:<12} {:<9} {:<7} {}",
                        "CLUSTER", "NAMESPACE", "NAME", "KIND", "STATUS", "READY", "AGE"
                    );
                    for w in &list.items {
                        println!(
                            "{:<16} {:<14} {:<28} {:<12} {:<9} {:<7} {}",
                            w.cluster,
                            w.namespace,
                            w.name,
                            w.kind.as_str(),
                            format!("{:?}", w.status),
                            format!("{}/{}", w.ready_replicas, w.replicas),
                            render_age(w.creation_ts),
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&list)?),
            }
        }
        Commands::Topology => {
            let view = api.topology(budget).await?;
            match cli.output {
                Output::Human => {
                    println!(
                        "nodes: {}  edges: {}  healthy: {}  degraded: {}",
                        view.stats.total_nodes,
                        view.stats.total_edges,
                        view.stats.healthy_connections,
                        view.stats.degraded_connections,
                    );
                    println!(
                        "{:<24} {:<8} {:<9} {:<9} {:<9} {}",
                        "CLUSTER", "NODES", "SERVICES", "EXPORTS", "IMPORTS", "GATEWAYS"
                    );
                    for c in &view.clusters {
                        println!(
                            "{:<24} {:<8} {:<9} {:<9} {:<9} {}",
                            c.name,
                            c.node_count,
                            c.service_count,
                            c.export_count,
                            c.import_count,
                            c.gateway_count,
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&view)?),
            }
        }
        Commands::Detect => {
            let found = api.detect_control_cluster(budget).await?;
            match cli.output {
                Output::Human => match found {
                    Some(name) => println!("{}", name),
                    None => println!("no control cluster found"),
                },
                Output::Json => println!("{}", serde_json::to_string_pretty(&found)?),
            }
        }
        Commands::Info { cluster } => {
            let info = api.control_cluster_info(&cluster, budget).await?;
            match cli.output {
                Output::Human => {
                    println!(
                        "{}: control={} bindings={} managed-clusters={}",
                        info.name, info.is_control_cluster, info.total_bindings,
                        info.managed_clusters,
                    );
                    for (name, state) in &info.controller_status {
                        println!(
                            "  {:<36} ready={:<5} {}/{} {}",
                            name,
                            state.ready,
                            state.available,
                            state.replicas,
                            state.message.as_deref().unwrap_or(""),
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&info)?),
            }
        }
        Commands::Exports => {
            let res = api.service_exports(budget).await?;
            report_cluster_errors(&res.errors);
            match cli.output {
                Output::Human => {
                    println!("{:<16} {:<14} {:<28} {:<8} {}", "CLUSTER", "NAMESPACE", "NAME", "STATUS", "AGE");
                    for e in &res.items {
                        println!(
                            "{:<16} {:<14} {:<28} {:<8} {}",
                            e.cluster,
                            e.namespace,
                            e.name,
                            format!("{:?}", e.status),
                            render_age(e.creation_ts),
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&res)?),
            }
        }
        Commands::Imports => {
            let res = api.service_imports(budget).await?;
            report_cluster_errors(&res.errors);
            match cli.output {
                Output::Human => {
                    println!(
                        "{:<16} {:<14} {:<28} {:<16} {:<10} {}",
                        "CLUSTER", "NAMESPACE", "NAME", "SOURCE", "ENDPOINTS", "DNS"
                    );
                    for i in &res.items {
                        println!(
                            "{:<16} {:<14} {:<28} {:<16} {:<10} {}",
                            i.cluster,
                            i.namespace,
                            i.name,
                            if i.source_cluster.is_empty() { "-" } else { &i.source_cluster },
                            i.endpoints,
                            i.dns_name,
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&res)?),
            }
        }
        Commands::Gateways => {
            let res = api.gateways(budget).await?;
            report_cluster_errors(&res.errors);
            match cli.output {
                Output::Human => {
                    println!(
                        "{:<16} {:<14} {:<24} {:<16} {:<12} {}",
                        "CLUSTER", "NAMESPACE", "NAME", "CLASS", "STATUS", "ROUTES"
                    );
                    for g in &res.items {
                        println!(
                            "{:<16} {:<14} {:<24} {:<16} {:<12} {}",
                            g.cluster,
                            g.namespace,
                            g.name,
                            g.gateway_class,
                            format!("{:?}", g.status),
                            g.attached_routes,
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&res)?),
            }
        }
        Commands::Routes => {
            let res = api.http_routes(budget).await?;
            report_cluster_errors(&res.errors);
            match cli.output {
                Output::Human => {
                    println!(
                        "{:<16} {:<14} {:<24} {:<10} {}",
                        "CLUSTER", "NAMESPACE", "NAME", "STATUS", "HOSTNAMES"
                    );
                    for r in &res.items {
                        println!(
                            "{:<16} {:<14} {:<24} {:<10} {}",
                            r.cluster,
                            r.namespace,
                            r.name,
                            format!("{:?}", r.status),
                            r.hostnames.join(","),
                        );
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&res)?),
            }
        }
    }

    Ok(())
}
