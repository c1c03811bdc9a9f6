//! Fleet aggregate – concurrent fan-out over registered clusters.
//!
//! One fresh task per cluster per call; each task reports into a bounded
//! channel and a single collector owns the merge, so accumulation needs no
//! shared-memory lock.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use fleet_hub::{ClusterHandle, ListError};

pub mod detect;
pub mod ops;

pub use ops::{
    gateways, http_routes, registered_clusters, service_exports, service_imports, workloads,
    WorkloadFilter,
};

/// Drain allowance past the overall budget: tasks that finished their network
/// call get this long to land in the collector before being counted out.
pub const FAN_OUT_GRACE: Duration = Duration::from_millis(250);

/// Merged items plus one error entry per failed cluster. A cluster missing
/// from both contributed nothing because the resource kind is absent there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult<T> {
    pub items: Vec<T>,
    pub errors: HashMap<String, ListError>,
}

impl<T> Default for AggregateResult<T> {
    fn default() -> Self {
        Self { items: Vec::new(), errors: HashMap::new() }
    }
}

impl<T> AggregateResult<T> {
    /// True when every one of `total` clusters failed; callers surface this
    /// as an error instead of an empty success.
    pub fn all_failed(&self, total: usize) -> bool {
        total > 0 && self.errors.len() == total
    }
}

/// Issue `per_cluster` once per handle, concurrently, each under the given
/// budget, and merge the results.
///
/// Guarantees: returns within budget plus [`FAN_OUT_GRACE`]; a slow cluster
/// never blocks the others; `Unsupported` is treated as absence; zero
/// handles yield an empty success. Merged order across clusters is
/// unspecified; within one cluster's contribution the upstream listing order
/// is preserved.
pub async fn fan_out<T, F, Fut>(
    handles: &[ClusterHandle],
    budget: Duration,
    per_cluster: F,
) -> AggregateResult<T>
where
    T: Send + 'static,
    F: Fn(ClusterHandle) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ListError>> + Send + 'static,
{
    let mut result = AggregateResult::default();
    if handles.is_empty() {
        return result;
    }

    let t0 = Instant::now();
    let (tx, mut rx) = mpsc::channel::<(String, Result<Vec<T>, ListError>)>(handles.len());
    let mut tasks: FxHashMap<String, tokio::task::JoinHandle<()>> = FxHashMap::default();
    for handle in handles {
        let name = handle.name.clone();
        let fut = per_cluster(handle.clone());
        let tx = tx.clone();
        let task = tokio::spawn(async move {
            let res = match tokio::time::timeout(budget, fut).await {
                Ok(r) => r,
                Err(_) => Err(ListError::timeout()),
            };
            let _ = tx.send((name, res)).await;
        });
        tasks.insert(handle.name.clone(), task);
    }
    drop(tx);

    let deadline = tokio::time::Instant::now() + budget + FAN_OUT_GRACE;
    let mut pending = handles.len();
    while pending > 0 {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some((name, res)) => {
                    pending -= 1;
                    tasks.remove(&name);
                    match res {
                        Ok(mut items) => result.items.append(&mut items),
                        Err(ListError::Unsupported) => {
                            debug!(cluster = %name, "resource kind absent");
                        }
                        Err(e) => {
                            result.errors.insert(name, e);
                        }
                    }
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    // Whatever has not reported by budget + grace is out of time.
    for (name, task) in tasks {
        task.abort();
        result.errors.insert(name, ListError::timeout());
    }

    histogram!("fanout_latency_ms", t0.elapsed().as_secs_f64() * 1_000.0);
    if !result.errors.is_empty() {
        counter!("fanout_cluster_errors", result.errors.len() as u64);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fleet_hub::StaticReader;

    fn handle(name: &str, reader: StaticReader) -> ClusterHandle {
        ClusterHandle::new(name, Arc::new(reader))
    }

    #[tokio::test]
    async fn zero_clusters_is_empty_success() {
        let res: AggregateResult<u32> = fan_out(&[], Duration::from_secs(1), |_h| async move {
            Ok(vec![1u32])
        })
        .await;
        assert!(res.items.is_empty());
        assert!(res.errors.is_empty());
        assert!(!res.all_failed(0));
    }

    #[tokio::test]
    async fn failures_collect_without_blocking_successes() {
        let handles = vec![
            handle("alpha", StaticReader::new()),
            handle("beta", StaticReader::offline()),
            handle("gamma", StaticReader::new()),
        ];
        let res = fan_out(&handles, Duration::from_secs(1), |h| async move {
            h.reader.server_version().await.map(|v| vec![(h.name.clone(), v)])
        })
        .await;
        assert_eq!(res.items.len(), 2);
        assert_eq!(res.errors.len(), 1);
        assert!(matches!(res.errors.get("beta"), Some(ListError::Transport(_))));
        assert!(!res.all_failed(3));
    }

    #[tokio::test]
    async fn slow_cluster_times_out_and_is_aborted() {
        let t0 = Instant::now();
        let handles = vec![
            handle("fast", StaticReader::new()),
            handle("slow", StaticReader::new().with_delay(Duration::from_secs(30))),
        ];
        let res = fan_out(&handles, Duration::from_millis(100), |h| async move {
            h.reader.server_version().await.map(|v| vec![v])
        })
        .await;
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.errors.get("slow"), Some(&ListError::timeout()));
        assert!(t0.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unsupported_is_absence_not_failure() {
        let handles = vec![handle("alpha", StaticReader::new())];
        let res: AggregateResult<u32> = fan_out(&handles, Duration::from_secs(1), |_h| async move {
            Err(ListError::Unsupported)
        })
        .await;
        assert!(res.items.is_empty());
        assert!(res.errors.is_empty());
    }

    #[tokio::test]
    async fn all_failed_when_every_cluster_errors() {
        let handles =
            vec![handle("alpha", StaticReader::offline()), handle("beta", StaticReader::offline())];
        let res = fan_out(&handles, Duration::from_secs(1), |h| async move {
            h.reader.server_version().await.map(|v| vec![v])
        })
        .await;
        assert!(res.all_failed(2));
    }
}
