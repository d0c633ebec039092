// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free counters updated by the pipeline and the sweeper.
#[derive(Debug)]
pub struct ServiceStats {
    /// Raw messages handed to the pipeline.
    pub received: AtomicU64,

    /// Messages that failed to parse.
    pub rejected: AtomicU64,

    /// Frames on a non-fragment FPort.
    pub ignored: AtomicU64,

    /// Fragments appended to a pending set.
    pub buffered: AtomicU64,

    /// Completed sets turned into a frame.
    pub reassembled: AtomicU64,

    /// Decoder failures.
    pub decode_failures: AtomicU64,

    /// Successful deliveries, counted per sink.
    pub dispatched: AtomicU64,

    /// Failed deliveries, counted per sink.
    pub sink_failures: AtomicU64,

    /// Sets dropped for exceeding `max_chunks`.
    pub evicted_overflow: AtomicU64,

    /// Sets dropped for inactivity.
    pub evicted_stale: AtomicU64,

    started: Instant,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            buffered: AtomicU64::new(0),
            reassembled: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            evicted_overflow: AtomicU64::new(0),
            evicted_stale: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            buffered: self.buffered.load(Ordering::Relaxed),
            reassembled: self.reassembled.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            evicted_overflow: self.evicted_overflow.load(Ordering::Relaxed),
            evicted_stale: self.evicted_stale.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

/// Point-in-time copy of [`ServiceStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub rejected: u64,
    pub ignored: u64,
    pub buffered: u64,
    pub reassembled: u64,
    pub decode_failures: u64,
    pub dispatched: u64,
    pub sink_failures: u64,
    pub evicted_overflow: u64,
    pub evicted_stale: u64,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Total evicted sets.
    pub fn evicted(&self) -> u64 {
        self.evicted_overflow + self.evicted_stale
    }
}
