//! Fleet cache – coalescing (single-flight) TTL cache.
//!
//! Wraps one expensive fetch so that concurrent callers against a cold or
//! expired cache trigger exactly one upstream call; everyone else waits on a
//! completion signal and re-reads the cache. Failures are never cached.

#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use metrics::{counter, histogram};
use tokio::sync::watch;
use tracing::{debug, warn};

struct State<T> {
    value: Option<T>,
    expires_at: Option<Instant>,
    /// Present while a fetch is running; waiters hold a clone of the
    /// receiver and are woken when the fetcher drops the sender.
    inflight: Option<watch::Receiver<()>>,
}

/// Single-flight TTL cache around one fetch function.
///
/// The state mutex is never held across an await; the fetch itself runs
/// under `fetch_timeout`, independent of any caller deadline.
pub struct CoalescingCache<T> {
    name: &'static str,
    ttl: Duration,
    fetch_timeout: Duration,
    state: Mutex<State<T>>,
}

impl<T: Clone> CoalescingCache<T> {
    pub fn new(name: &'static str, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            name,
            ttl,
            fetch_timeout,
            state: Mutex::new(State { value: None, expires_at: None, inflight: None }),
        }
    }

    /// Serve from cache, or wait on an in-flight fetch, or become the
    /// designated fetcher. A failed fetch is returned to its caller only;
    /// waiters re-enter the state machine and retry with their own fetch.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = loop {
            let rx = {
                let mut st = self.lock();
                if let (Some(v), Some(exp)) = (&st.value, st.expires_at) {
                    // Freshness is re-checked on every pass: a woken waiter
                    // may find the entry already expired again.
                    if Instant::now() < exp {
                        counter!("cache_hits", 1u64, "cache" => self.name);
                        return Ok(v.clone());
                    }
                }
                match &st.inflight {
                    Some(rx) => rx.clone(),
                    None => {
                        let (tx, rx) = watch::channel(());
                        st.inflight = Some(rx);
                        break InflightGuard { cache: self, _tx: tx };
                    }
                }
            };
            let mut rx = rx;
            // Err means the sender is gone, which is the wake-up signal too.
            let _ = rx.changed().await;
        };

        counter!("cache_misses", 1u64, "cache" => self.name);
        let t0 = Instant::now();
        let result = match tokio::time::timeout(self.fetch_timeout, fetch()).await {
            Ok(r) => r,
            Err(_) => Err(anyhow!("{}: fetch timed out after {:?}", self.name, self.fetch_timeout)),
        };
        histogram!("cache_fetch_ms", t0.elapsed().as_secs_f64() * 1_000.0, "cache" => self.name);

        {
            let mut st = self.lock();
            match &result {
                Ok(v) => {
                    st.value = Some(v.clone());
                    st.expires_at = Some(Instant::now() + self.ttl);
                    debug!(cache = self.name, took_ms = %t0.elapsed().as_millis(), "cache refreshed");
                }
                Err(e) => {
                    warn!(cache = self.name, error = %e, "cache fetch failed; not cached");
                }
            }
        }
        drop(guard); // clears the in-flight marker, then wakes all waiters
        result
    }

    /// Drop any cached value; the next caller fetches.
    pub fn invalidate(&self) {
        let mut st = self.lock();
        st.value = None;
        st.expires_at = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<T>> {
        // A poisoned lock only means a fetcher panicked between updates;
        // the state itself is still coherent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Held by the designated fetcher for the duration of its fetch. Dropping it
/// clears the in-flight marker and then releases the sender, waking waiters.
/// This also runs when the fetcher's future is cancelled mid-fetch, so an
/// abandoned fetch can never wedge the cache in the fetching state.
struct InflightGuard<'a, T: Clone> {
    cache: &'a CoalescingCache<T>,
    _tx: watch::Sender<()>,
}

impl<T: Clone> Drop for InflightGuard<'_, T> {
    fn drop(&mut self) {
        // The sender field drops after this body, so waiters wake only after
        // the marker is gone.
        let mut st = self.cache.lock();
        st.inflight = None;
    }
}
