/*!
 * Metrics Collection
 * Lightweight named counters and timers with immutable snapshots
 */

use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Average-time metric
#[derive(Debug, Default)]
struct TimerMetric {
    total_nanos: AtomicU64,
    count: AtomicU64,
}

impl TimerMetric {
    fn update(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn average_nanos(&self) -> u64 {
        let count = self.count();
        if count == 0 {
            0
        } else {
            self.total_nanos.load(Ordering::Relaxed) / count
        }
    }
}

/// Metrics registry
///
/// # Performance
/// - Lookups of existing metrics take a shard read lock only
/// - Counters are plain atomics once registered
pub struct Metrics {
    counters: DashMap<String, AtomicI64, RandomState>,
    timers: DashMap<String, TimerMetric, RandomState>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: DashMap::with_hasher(RandomState::new()),
            timers: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Increment a counter by one
    #[inline]
    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    #[inline]
    pub fn decrement(&self, name: &str) {
        self.add(name, -1);
    }

    /// Add `delta` to a counter, registering it on first use
    pub fn add(&self, name: &str, delta: i64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        self.counters
            .entry(name.to_string())
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Current counter value; zero when never touched
    pub fn get(&self, name: &str) -> i64 {
        self.counters
            .get(name)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Record operation duration
    pub fn record_time(&self, name: &str, elapsed: Duration) {
        if let Some(timer) = self.timers.get(name) {
            timer.update(elapsed);
            return;
        }
        self.timers
            .entry(name.to_string())
            .or_default()
            .update(elapsed);
    }

    /// Run `f` and record how long it took
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record_time(name, start.elapsed());
        result
    }

    /// Average recorded time, if the timer exists
    pub fn average_time(&self, name: &str) -> Option<Duration> {
        self.timers
            .get(name)
            .map(|timer| Duration::from_nanos(timer.average_nanos()))
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.counters.clear();
        self.timers.clear();
    }

    /// Get snapshot of all metrics
    ///
    /// Timers appear as their average in nanoseconds plus a `.count` entry.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut values = BTreeMap::new();
        for entry in self.counters.iter() {
            values.insert(entry.key().clone(), entry.value().load(Ordering::Relaxed));
        }
        for entry in self.timers.iter() {
            let timer = entry.value();
            let average = i64::try_from(timer.average_nanos()).unwrap_or(i64::MAX);
            let count = i64::try_from(timer.count()).unwrap_or(i64::MAX);
            values.insert(entry.key().clone(), average);
            values.insert(format!("{}.count", entry.key()), count);
        }
        MetricsSnapshot { values }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("values", &self.snapshot().values)
            .finish()
    }
}

/// Immutable point-in-time view of a set of metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    values: BTreeMap<String, i64>,
}

impl MetricsSnapshot {
    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    /// Metric value, zero when absent
    pub fn value(&self, name: &str) -> i64 {
        self.get(name).unwrap_or(0)
    }

    /// Add or replace one metric
    pub fn with(mut self, name: impl Into<String>, value: i64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Merge another snapshot in; metrics already present here win
    pub fn merge(mut self, other: MetricsSnapshot) -> Self {
        for (name, value) in other.values {
            self.values.entry(name).or_insert(value);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
