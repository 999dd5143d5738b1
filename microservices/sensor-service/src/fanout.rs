//! Bounded-concurrency fan-out over partitions
//!
//! Every partition call runs under a deadline: the caller's when one is
//! given, otherwise `now + partition_timeout`. An expired call becomes
//! `UpstreamUnavailable` for that partition, as does a backend failure.

use std::future::Future;
use std::time::Duration;

use aqualog_core::{AquaError, Result};
use aqualog_telemetry::{Counter, Gauge, Histogram};
use futures_util::{stream, StreamExt, TryStreamExt};
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FanOutConfig {
    /// Partition calls in flight at once
    pub concurrency: usize,
    pub partition_timeout: Duration,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            partition_timeout: Duration::from_millis(5000),
        }
    }
}

/// Fan-out counters shared by every merge and rollup
#[derive(Clone)]
pub struct FanOutMetrics {
    pub partition_failures: Counter,
    pub omitted_partitions: Counter,
    pub inflight_calls: Gauge,
    pub latency_ms: Histogram,
}

impl Default for FanOutMetrics {
    fn default() -> Self {
        Self {
            partition_failures: Counter::new("fanout_partition_failures"),
            omitted_partitions: Counter::new("fanout_omitted_partitions"),
            inflight_calls: Gauge::new("fanout_inflight_calls"),
            latency_ms: Histogram::new("fanout_latency_ms"),
        }
    }
}

#[derive(Clone, Default)]
pub struct FanOut {
    config: FanOutConfig,
    metrics: FanOutMetrics,
}

struct InflightGuard<'a>(&'a Gauge);

impl<'a> InflightGuard<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

impl FanOut {
    pub fn new(config: FanOutConfig) -> Self {
        Self {
            config,
            metrics: FanOutMetrics::default(),
        }
    }

    pub fn config(&self) -> &FanOutConfig {
        &self.config
    }

    pub fn metrics(&self) -> &FanOutMetrics {
        &self.metrics
    }

    fn width(&self) -> usize {
        self.config.concurrency.max(1)
    }

    async fn guarded<T, Fut>(&self, partition: &str, deadline: Option<Instant>, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let deadline = deadline.unwrap_or_else(|| Instant::now() + self.config.partition_timeout);
        let _inflight = InflightGuard::enter(&self.metrics.inflight_calls);

        match tokio::time::timeout_at(deadline, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(AquaError::Database(reason))) => {
                self.metrics.partition_failures.inc();
                Err(AquaError::upstream(partition, reason))
            }
            Ok(Err(err)) => {
                self.metrics.partition_failures.inc();
                Err(err)
            }
            Err(_) => {
                self.metrics.partition_failures.inc();
                Err(AquaError::upstream(partition, "deadline exceeded"))
            }
        }
    }

    /// Call every partition and stop at the first failure to complete.
    ///
    /// Results come back in partition order. Calls still in flight when a
    /// failure surfaces are dropped, so a stalled partition never hides a
    /// later one that failed fast.
    pub async fn try_all<T, F, Fut>(
        &self,
        partitions: &[String],
        deadline: Option<Instant>,
        call: F,
    ) -> Result<Vec<(String, T)>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = std::time::Instant::now();
        let results = stream::iter(partitions.iter().cloned().enumerate())
            .map(|(idx, partition)| {
                let pending = call(partition.clone());
                async move {
                    let value = self.guarded(&partition, deadline, pending).await?;
                    Ok::<_, AquaError>((idx, partition, value))
                }
            })
            .buffer_unordered(self.width())
            .try_collect::<Vec<_>>()
            .await;
        self.metrics
            .latency_ms
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let mut settled = results?;
        settled.sort_unstable_by_key(|(idx, _, _)| *idx);
        Ok(settled
            .into_iter()
            .map(|(_, partition, value)| (partition, value))
            .collect())
    }

    /// Call every partition, keeping the successes and naming the failures.
    pub async fn settle_all<T, F, Fut>(
        &self,
        partitions: &[String],
        deadline: Option<Instant>,
        call: F,
    ) -> (Vec<(String, T)>, Vec<String>)
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = std::time::Instant::now();
        let outcomes = stream::iter(partitions.iter().cloned())
            .map(|partition| {
                let pending = call(partition.clone());
                async move {
                    let outcome = self.guarded(&partition, deadline, pending).await;
                    (partition, outcome)
                }
            })
            .buffered(self.width())
            .collect::<Vec<_>>()
            .await;
        self.metrics
            .latency_ms
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let mut settled = Vec::with_capacity(outcomes.len());
        let mut omitted = Vec::new();
        for (partition, outcome) in outcomes {
            match outcome {
                Ok(value) => settled.push((partition, value)),
                Err(e) => {
                    warn!(partition = %partition, error = %e, "Partition omitted");
                    self.metrics.omitted_partitions.inc();
                    omitted.push(partition);
                }
            }
        }
        (settled, omitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_try_all_keeps_partition_order() {
        let fanout = FanOut::new(FanOutConfig {
            concurrency: 2,
            ..FanOutConfig::default()
        });
        let out = fanout
            .try_all(&keys(&["a", "b", "c"]), None, |p| async move {
                // Later partitions finish first
                let delay = match p.as_str() {
                    "a" => 30,
                    "b" => 10,
                    _ => 0,
                };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(p.len())
            })
            .await
            .unwrap();
        let order: Vec<_> = out.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(fanout.metrics().inflight_calls.get(), 0);
    }

    #[tokio::test]
    async fn test_try_all_surfaces_backend_failure_as_upstream() {
        let fanout = FanOut::default();
        let err = fanout
            .try_all(&keys(&["ok", "bad"]), None, |p| async move {
                if p == "bad" {
                    Err(AquaError::Database("connection reset".to_string()))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err, AquaError::upstream("bad", "connection reset"));
        assert_eq!(fanout.metrics().partition_failures.get(), 1);
    }

    #[tokio::test]
    async fn test_try_all_returns_first_failure_to_complete() {
        let fanout = FanOut::new(FanOutConfig {
            concurrency: 4,
            partition_timeout: Duration::from_secs(3),
        });
        let started = std::time::Instant::now();
        let err = fanout
            .try_all(&keys(&["slow", "down"]), None, |p| async move {
                if p == "slow" {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    return Ok(());
                }
                Err(AquaError::Database("refused".to_string()))
            })
            .await
            .unwrap_err();

        assert_eq!(err, AquaError::upstream("down", "refused"));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(fanout.metrics().inflight_calls.get(), 0);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_partition_failure() {
        let fanout = FanOut::new(FanOutConfig {
            concurrency: 4,
            partition_timeout: Duration::from_millis(20),
        });
        let (settled, omitted) = fanout
            .settle_all(&keys(&["fast", "slow"]), None, |p| async move {
                if p == "slow" {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(1u8)
            })
            .await;
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].0, "fast");
        assert_eq!(omitted, vec!["slow".to_string()]);
        assert_eq!(fanout.metrics().omitted_partitions.get(), 1);
        assert_eq!(fanout.metrics().inflight_calls.get(), 0);
    }
}
