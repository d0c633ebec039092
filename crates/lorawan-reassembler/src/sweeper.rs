// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background eviction of stale and oversized pending sets.

use crate::stats::ServiceStats;
use crate::store::{Eviction, EvictionReason, FragmentStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Sweeper limits.
#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    /// Maximum fragments per pending set.
    pub max_chunks: usize,
    /// Maximum age of a set's last fragment.
    pub max_age: Duration,
    /// Scan period.
    pub interval: Duration,
}

/// Periodic scanner over the fragment store.
#[derive(Debug)]
pub struct Sweeper {
    store: Arc<FragmentStore>,
    stats: Arc<ServiceStats>,
    policy: SweepPolicy,
}

impl Sweeper {
    /// Create a sweeper.
    pub fn new(store: Arc<FragmentStore>, stats: Arc<ServiceStats>, policy: SweepPolicy) -> Self {
        Self {
            store,
            stats,
            policy,
        }
    }

    /// Run one scan and record its evictions.
    pub fn sweep_once(&self) -> Vec<Eviction> {
        let evicted = self
            .store
            .sweep(self.policy.max_chunks, self.policy.max_age, Utc::now());

        for eviction in &evicted {
            match eviction.reason {
                EvictionReason::TooManyChunks => {
                    warn!(
                        "Too many chunks for {} ({} > {}), dropping",
                        eviction.dev_eui, eviction.fragments, self.policy.max_chunks
                    );
                    ServiceStats::incr(&self.stats.evicted_overflow);
                }
                EvictionReason::Stale => {
                    warn!(
                        "Timeout for {}, dropping {} fragment(s)",
                        eviction.dev_eui, eviction.fragments
                    );
                    ServiceStats::incr(&self.stats.evicted_stale);
                }
            }
        }

        evicted
    }

    /// Scan every interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.policy.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }
    }
}
