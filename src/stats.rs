//! Query counters for the periodic summary.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// How many query types the summary lists.
const TOP_QUERY_TYPES: usize = 5;

/// Counters shared by every query task.
pub struct Stats {
    pub requests: AtomicU64,
    pub forwarded: AtomicU64,
    pub blocked: AtomicU64,
    pub bypassed: AtomicU64,
    pub dropped: AtomicU64,
    /// Cumulative response time in microseconds for averaging.
    total_response_time_us: AtomicU64,
    query_types: Mutex<FxHashMap<u16, u64>>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            query_types: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn record_query_type(&self, qtype: u16) {
        *self.query_types.lock().entry(qtype).or_default() += 1;
    }

    pub fn record_forwarded(&self, response_time_ms: f64) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.record_answered(response_time_ms);
    }

    pub fn record_bypassed(&self, response_time_ms: f64) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
        self.record_answered(response_time_ms);
    }

    pub fn record_blocked(&self, response_time_ms: f64) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
        self.record_answered(response_time_ms);
    }

    pub fn record_dropped(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_answered(&self, response_time_ms: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add((response_time_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let blocked = self.blocked.swap(0, Ordering::Relaxed);
        let bypassed = self.bypassed.swap(0, Ordering::Relaxed);
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let answered = requests - dropped.min(requests);
        let avg_response_ms = if answered > 0 {
            (total_us as f64 / answered as f64) / 1000.0
        } else {
            0.0
        };

        let mut top_query_types: Vec<(u16, u64)> =
            std::mem::take(&mut *self.query_types.lock()).into_iter().collect();
        top_query_types.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top_query_types.truncate(TOP_QUERY_TYPES);

        StatsSnapshot {
            requests,
            forwarded,
            blocked,
            bypassed,
            dropped,
            avg_response_ms,
            top_query_types,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub forwarded: u64,
    pub blocked: u64,
    pub bypassed: u64,
    pub dropped: u64,
    pub avg_response_ms: f64,
    /// Most frequent (query type, count) pairs, busiest first.
    pub top_query_types: Vec<(u16, u64)>,
}
