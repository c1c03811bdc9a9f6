//! Gateway API records (Gateways and HTTPRoutes).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::{
    meta_creation_ts, meta_name, meta_namespace, parse_conditions, status_conditions, Conditions,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayStatus {
    Accepted,
    Programmed,
    Pending,
    NotAccepted,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub name: String,
    pub protocol: String,
    pub port: i32,
    pub attached_routes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    pub gateway_class: String,
    pub status: GatewayStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub listeners: SmallVec<[Listener; 4]>,
    pub attached_routes: i32,
    pub creation_ts: i64,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

impl Gateway {
    pub fn from_object(obj: &Value, cluster: &str) -> Option<Self> {
        let name = meta_name(obj)?.to_string();
        let spec = obj.get("spec");
        let status = obj.get("status");
        let conditions = status_conditions(obj);

        let addresses: Vec<String> = status
            .and_then(|s| s.get("addresses"))
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|e| e.get("value").and_then(|v| v.as_str()).map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        // Attached-route counts live on status listeners, keyed by name.
        let mut listeners: SmallVec<[Listener; 4]> = SmallVec::new();
        let status_listeners = status.and_then(|s| s.get("listeners")).and_then(|v| v.as_array());
        if let Some(arr) = spec.and_then(|s| s.get("listeners")).and_then(|v| v.as_array()) {
            for l in arr {
                let lname = l.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let attached = status_listeners
                    .and_then(|sl| {
                        sl.iter()
                            .find(|s| s.get("name").and_then(|v| v.as_str()) == Some(lname.as_str()))
                    })
                    .and_then(|s| s.get("attachedRoutes"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0) as i32;
                listeners.push(Listener {
                    name: lname,
                    protocol: l.get("protocol").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    port: l.get("port").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
                    attached_routes: attached,
                });
            }
        }
        let attached_routes = listeners.iter().map(|l| l.attached_routes).sum();

        Some(Gateway {
            name,
            namespace: meta_namespace(obj),
            cluster: cluster.to_string(),
            gateway_class: spec
                .and_then(|s| s.get("gatewayClassName"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            status: gateway_status(&conditions),
            addresses,
            listeners,
            attached_routes,
            creation_ts: meta_creation_ts(obj),
            conditions,
        })
    }
}

fn gateway_status(conditions: &Conditions) -> GatewayStatus {
    let find = |kind: &str| conditions.iter().find(|c| c.kind == kind);
    if find("Programmed").map(|c| c.is_true()).unwrap_or(false) {
        return GatewayStatus::Programmed;
    }
    match find("Accepted") {
        Some(c) if c.is_true() => GatewayStatus::Accepted,
        Some(_) => GatewayStatus::NotAccepted,
        None if conditions.is_empty() => GatewayStatus::Unknown,
        None => GatewayStatus::Pending,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RouteStatus {
    Accepted,
    PartiallyValid,
    NotAccepted,
    Unknown,
}

/// Parent reference of a route. An empty kind means Gateway by convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ParentRef {
    pub fn is_gateway(&self) -> bool {
        self.kind.is_empty() || self.kind == "Gateway"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoute {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub parent_refs: SmallVec<[ParentRef; 2]>,
    pub status: RouteStatus,
    pub creation_ts: i64,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

impl HttpRoute {
    pub fn from_object(obj: &Value, cluster: &str) -> Option<Self> {
        let name = meta_name(obj)?.to_string();
        let spec = obj.get("spec");

        let hostnames: Vec<String> = spec
            .and_then(|s| s.get("hostnames"))
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default();

        let mut parent_refs = SmallVec::new();
        if let Some(arr) = spec.and_then(|s| s.get("parentRefs")).and_then(|v| v.as_array()) {
            for p in arr {
                let pname = p.get("name").and_then(|v| v.as_str()).unwrap_or("");
                if pname.is_empty() {
                    continue;
                }
                parent_refs.push(ParentRef {
                    kind: p.get("kind").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    name: pname.to_string(),
                    namespace: p
                        .get("namespace")
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string()),
                });
            }
        }

        // Route acceptance is reported per parent; fold across all of them.
        let mut conditions = Conditions::new();
        let mut accepted = 0usize;
        let mut rejected = 0usize;
        if let Some(parents) = obj
            .get("status")
            .and_then(|s| s.get("parents"))
            .and_then(|v| v.as_array())
        {
            for parent in parents {
                let conds = parse_conditions(parent.get("conditions"));
                for c in &conds {
                    if c.kind == "Accepted" {
                        if c.is_true() {
                            accepted += 1;
                        } else {
                            rejected += 1;
                        }
                    }
                }
                conditions.extend(conds);
            }
        }
        let status = match (accepted, rejected) {
            (0, 0) => RouteStatus::Unknown,
            (_, 0) => RouteStatus::Accepted,
            (0, _) => RouteStatus::NotAccepted,
            _ => RouteStatus::PartiallyValid,
        };

        Some(HttpRoute {
            name,
            namespace: meta_namespace(obj),
            cluster: cluster.to_string(),
            hostnames,
            parent_refs,
            status,
            creation_ts: meta_creation_ts(obj),
            conditions,
        })
    }
}
