//! Fleet hub – cluster registry and per-cluster resource access.

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::{info, warn};

mod fixture;
mod reader;
pub mod specs;

pub use fixture::StaticReader;
pub use reader::{DeploymentBrief, KubeReader, ListError, ResourceReader};
pub use specs::ResourceSpec;

/// One known cluster: a name and the capability to read from it.
#[derive(Clone)]
pub struct ClusterHandle {
    pub name: String,
    pub reader: Arc<dyn ResourceReader>,
}

impl ClusterHandle {
    pub fn new(name: impl Into<String>, reader: Arc<dyn ResourceReader>) -> Self {
        Self { name: name.into(), reader }
    }
}

impl std::fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterHandle").field("name", &self.name).finish()
    }
}

/// Registry of cluster handles. The handle list is an atomically swapped
/// snapshot: readers clone an `Arc` and are never blocked by a reload.
pub struct ClusterRegistry {
    handles: ArcSwap<Vec<ClusterHandle>>,
}

impl ClusterRegistry {
    pub fn new(handles: Vec<ClusterHandle>) -> Self {
        Self { handles: ArcSwap::from_pointee(handles) }
    }

    /// Build one handle per kubeconfig context. Contexts whose client cannot
    /// be constructed are skipped with a warning; liveness is discovered
    /// later, at call time.
    pub async fn from_kubeconfig() -> Result<Self> {
        let kubeconfig = match std::env::var("FLEET_KUBECONFIG") {
            Ok(path) => Kubeconfig::read_from(&path)
                .with_context(|| format!("reading kubeconfig at {}", path))?,
            Err(_) => Kubeconfig::read().context("reading default kubeconfig")?,
        };
        let mut handles = Vec::with_capacity(kubeconfig.contexts.len());
        for ctx in &kubeconfig.contexts {
            let name = ctx.name.clone();
            let opts = KubeConfigOptions { context: Some(name.clone()), ..Default::default() };
            let config = match kube::Config::from_custom_kubeconfig(kubeconfig.clone(), &opts).await
            {
                Ok(c) => c,
                Err(e) => {
                    warn!(cluster = %name, error = %e, "skipping context: bad config");
                    continue;
                }
            };
            match kube::Client::try_from(config) {
                Ok(client) => {
                    handles.push(ClusterHandle::new(name, Arc::new(KubeReader::new(client))))
                }
                Err(e) => warn!(cluster = %name, error = %e, "skipping context: no client"),
            }
        }
        info!(clusters = handles.len(), "cluster registry initialized");
        Ok(Self::new(handles))
    }

    /// Current snapshot of handles.
    pub fn handles(&self) -> Arc<Vec<ClusterHandle>> {
        self.handles.load_full()
    }

    pub fn names(&self) -> Vec<String> {
        self.handles.load().iter().map(|h| h.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<ClusterHandle> {
        self.handles.load().iter().find(|h| h.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.handles.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.load().is_empty()
    }

    /// Swap in a new handle set (configuration reload). In-flight calls keep
    /// the snapshot they started with.
    pub fn reload(&self, handles: Vec<ClusterHandle>) {
        let count = handles.len();
        self.handles.store(Arc::new(handles));
        info!(clusters = count, "cluster registry reloaded");
    }
}
