//! Well-known resource specs (group/version/plural tables).

/// Addressable resource kind on a cluster API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    pub group: &'static str,
    pub version: &'static str,
    pub plural: &'static str,
    pub kind: &'static str,
}

impl ResourceSpec {
    /// Stable key for keying fixtures and error maps.
    pub fn key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.plural)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.plural)
        }
    }
}

impl std::fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

pub const DEPLOYMENTS: ResourceSpec =
    ResourceSpec { group: "apps", version: "v1", plural: "deployments", kind: "Deployment" };
pub const STATEFULSETS: ResourceSpec =
    ResourceSpec { group: "apps", version: "v1", plural: "statefulsets", kind: "StatefulSet" };
pub const DAEMONSETS: ResourceSpec =
    ResourceSpec { group: "apps", version: "v1", plural: "daemonsets", kind: "DaemonSet" };
pub const NODES: ResourceSpec =
    ResourceSpec { group: "", version: "v1", plural: "nodes", kind: "Node" };

pub const SERVICE_EXPORTS: ResourceSpec = ResourceSpec {
    group: "multicluster.x-k8s.io",
    version: "v1alpha1",
    plural: "serviceexports",
    kind: "ServiceExport",
};
pub const SERVICE_IMPORTS: ResourceSpec = ResourceSpec {
    group: "multicluster.x-k8s.io",
    version: "v1alpha1",
    plural: "serviceimports",
    kind: "ServiceImport",
};

pub const GATEWAYS: ResourceSpec = ResourceSpec {
    group: "gateway.networking.k8s.io",
    version: "v1",
    plural: "gateways",
    kind: "Gateway",
};
pub const GATEWAYS_V1BETA1: ResourceSpec = ResourceSpec {
    group: "gateway.networking.k8s.io",
    version: "v1beta1",
    plural: "gateways",
    kind: "Gateway",
};
pub const HTTP_ROUTES: ResourceSpec = ResourceSpec {
    group: "gateway.networking.k8s.io",
    version: "v1",
    plural: "httproutes",
    kind: "HTTPRoute",
};
pub const HTTP_ROUTES_V1BETA1: ResourceSpec = ResourceSpec {
    group: "gateway.networking.k8s.io",
    version: "v1beta1",
    plural: "httproutes",
    kind: "HTTPRoute",
};

pub const BINDING_POLICIES: ResourceSpec = ResourceSpec {
    group: "control.kubestellar.io",
    version: "v1alpha1",
    plural: "bindingpolicies",
    kind: "BindingPolicy",
};
pub const SYNC_TARGETS: ResourceSpec = ResourceSpec {
    group: "workload.kcp.io",
    version: "v1alpha1",
    plural: "synctargets",
    kind: "SyncTarget",
};
pub const LOCATIONS: ResourceSpec = ResourceSpec {
    group: "scheduling.kcp.io",
    version: "v1alpha1",
    plural: "locations",
    kind: "Location",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_omits_empty_group() {
        assert_eq!(NODES.key(), "v1/nodes");
        assert_eq!(DEPLOYMENTS.key(), "apps/v1/deployments");
    }
}
