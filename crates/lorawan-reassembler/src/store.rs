// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-device fragment store.
//!
//! Holds the pending fragments of every device until the last fragment
//! arrives, or until the sweeper evicts the set.
//!
//! ```text
//!             append            append (FPort 202)
//!   (none) ----------> pending ------------------> reassemble -> (none)
//!                         |
//!                         +-- sweep: too many chunks / stale --> (none)
//! ```
//!
//! The whole map sits behind a single lock. Every operation takes it once
//! and releases it before returning, so callers never hold it across
//! decoding or dispatch.

use crate::frame::{Frame, LAST_FRAGMENT_FPORT};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Why a pending set was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// More fragments than `max_chunks`.
    TooManyChunks,
    /// No new fragment within the staleness timeout.
    Stale,
}

/// A pending set removed by [`FragmentStore::sweep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// Device whose fragments were dropped.
    pub dev_eui: String,
    /// Eviction cause.
    pub reason: EvictionReason,
    /// Number of fragments lost.
    pub fragments: usize,
}

/// Concurrent map from device identity to its ordered pending fragments.
#[derive(Debug, Default)]
pub struct FragmentStore {
    pending: Mutex<HashMap<String, Vec<Frame>>>,
}

impl FragmentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to its device's pending set, creating the set if
    /// needed.
    ///
    /// Returns the number of fragments pending for the device afterwards.
    pub fn append(&self, frame: Frame) -> usize {
        let mut pending = self.pending.lock();
        let set = pending.entry(frame.dev_eui.clone()).or_default();
        set.push(frame);
        set.len()
    }

    /// True if `frame` completes its set.
    pub fn is_terminal(&self, frame: &Frame) -> bool {
        frame.f_port == LAST_FRAGMENT_FPORT
    }

    /// Concatenate and remove the pending set of `dev_eui`.
    ///
    /// Returns `None` (and leaves the store untouched) when nothing is
    /// pending, e.g. on a duplicated last fragment.
    pub fn reassemble(&self, dev_eui: &str) -> Option<Vec<u8>> {
        let frames = self.pending.lock().remove(dev_eui)?;

        let len = frames.iter().map(|f| f.payload.len()).sum();
        let mut buffer = Vec::with_capacity(len);
        for frame in &frames {
            buffer.extend_from_slice(&frame.payload);
        }
        Some(buffer)
    }

    /// Evict every pending set holding more than `max_chunks` fragments or
    /// whose last fragment is older than `max_age` at `now`.
    pub fn sweep(
        &self,
        max_chunks: usize,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Vec<Eviction> {
        let mut pending = self.pending.lock();
        let mut evicted = Vec::new();

        pending.retain(|dev_eui, frames| {
            let reason = if frames.len() > max_chunks {
                Some(EvictionReason::TooManyChunks)
            } else if frames.last().is_some_and(|last| is_stale(last, max_age, now)) {
                Some(EvictionReason::Stale)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    evicted.push(Eviction {
                        dev_eui: dev_eui.clone(),
                        reason,
                        fragments: frames.len(),
                    });
                    false
                }
                None => true,
            }
        });

        evicted
    }

    /// Consistent copy of every pending set, ordered by device.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Frame>> {
        self.pending
            .lock()
            .iter()
            .map(|(dev_eui, frames)| (dev_eui.clone(), frames.clone()))
            .collect()
    }

    /// Number of devices with pending fragments.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True if no fragment is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// True if `dev_eui` has pending fragments.
    pub fn contains(&self, dev_eui: &str) -> bool {
        self.pending.lock().contains_key(dev_eui)
    }

    /// Number of fragments pending for `dev_eui`.
    pub fn pending_count(&self, dev_eui: &str) -> usize {
        self.pending.lock().get(dev_eui).map_or(0, Vec::len)
    }
}

fn is_stale(last: &Frame, max_age: Duration, now: DateTime<Utc>) -> bool {
    // A timestamp in the future (clock step) counts as fresh.
    match (now - last.received_at).to_std() {
        Ok(age) => age > max_age,
        Err(_) => false,
    }
}
