// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingress hand-off: parse, buffer, reassemble, decode, dispatch.
//!
//! ```text
//! raw --parse--> Frame --append--> FragmentStore
//!                                      | terminal fragment
//!                                      v
//!                                 reassemble --decode--> dispatch
//! ```
//!
//! Decoding and dispatch run after the store lock is released.

use crate::decoder::{DecodedResult, DecoderGateway};
use crate::dialect::{Dialect, ParseError};
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::frame::REASSEMBLED_FPORT;
use crate::stats::ServiceStats;
use crate::store::FragmentStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one raw message.
#[derive(Debug)]
pub enum Outcome {
    /// The message could not be parsed.
    Rejected(ParseError),

    /// Valid uplink on a non-fragment FPort.
    Ignored { dev_eui: String, f_port: u8 },

    /// Fragment appended; the set is still open.
    Buffered { dev_eui: String, pending: usize },

    /// Set completed, decoded and handed to the sinks.
    Dispatched {
        dev_eui: String,
        result: DecodedResult,
        report: DispatchReport,
    },

    /// Last fragment arrived but nothing was pending (already swept or
    /// duplicated).
    Empty { dev_eui: String },

    /// Set completed but the decoder failed; the set is lost.
    DecodeFailed { dev_eui: String, error: String },
}

impl Outcome {
    /// Short label for logs and HTTP responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::Ignored { .. } => "ignored",
            Self::Buffered { .. } => "buffered",
            Self::Dispatched { .. } => "dispatched",
            Self::Empty { .. } => "empty",
            Self::DecodeFailed { .. } => "decode_failed",
        }
    }
}

/// Synchronous half of the handling path.
#[derive(Debug)]
pub enum Accepted {
    /// Nothing left to do for this message.
    Done(Outcome),

    /// A set completed; pass it to [`Pipeline::complete`].
    Complete { dev_eui: String, buffer: Vec<u8> },
}

/// Shared handling path for every ingress adapter.
pub struct Pipeline {
    dialect: Dialect,
    store: Arc<FragmentStore>,
    decoder: Arc<dyn DecoderGateway>,
    dispatcher: Dispatcher,
    stats: Arc<ServiceStats>,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(
        dialect: Dialect,
        store: Arc<FragmentStore>,
        decoder: Arc<dyn DecoderGateway>,
        dispatcher: Dispatcher,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            dialect,
            store,
            decoder,
            dispatcher,
            stats,
        }
    }

    /// Configured dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Fragment store.
    pub fn store(&self) -> &Arc<FragmentStore> {
        &self.store
    }

    /// Service counters.
    pub fn stats(&self) -> &Arc<ServiceStats> {
        &self.stats
    }

    /// Handle one raw message from any ingress.
    pub async fn handle_raw(&self, raw: &[u8]) -> Outcome {
        match self.accept(raw) {
            Accepted::Done(outcome) => outcome,
            Accepted::Complete { dev_eui, buffer } => self.complete(dev_eui, buffer).await,
        }
    }

    /// Parse, filter and buffer one raw message.
    ///
    /// Never awaits. Callers that must preserve per-device arrival order
    /// run this inline, in receive order, and only defer
    /// [`complete`](Self::complete).
    pub fn accept(&self, raw: &[u8]) -> Accepted {
        ServiceStats::incr(&self.stats.received);

        let frame = match self.dialect.parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping {} message: {}", self.dialect, e);
                ServiceStats::incr(&self.stats.rejected);
                return Accepted::Done(Outcome::Rejected(e));
            }
        };

        if !frame.is_fragment() {
            debug!("Ignoring frame from {} on FPort {}", frame.dev_eui, frame.f_port);
            ServiceStats::incr(&self.stats.ignored);
            return Accepted::Done(Outcome::Ignored {
                dev_eui: frame.dev_eui,
                f_port: frame.f_port,
            });
        }

        let terminal = self.store.is_terminal(&frame);
        let dev_eui = frame.dev_eui.clone();
        debug!(
            "Fragment from {} (FPort {}, {} bytes)",
            dev_eui,
            frame.f_port,
            frame.payload.len()
        );

        let pending = self.store.append(frame);
        ServiceStats::incr(&self.stats.buffered);

        if !terminal {
            return Accepted::Done(Outcome::Buffered { dev_eui, pending });
        }

        let Some(buffer) = self.store.reassemble(&dev_eui) else {
            warn!("Last fragment from {} but nothing pending", dev_eui);
            return Accepted::Done(Outcome::Empty { dev_eui });
        };

        ServiceStats::incr(&self.stats.reassembled);
        info!(
            "Reassembled frame from {} ({} fragments, {} bytes)",
            dev_eui,
            pending,
            buffer.len()
        );
        debug!("Reassembled payload: {}", hex::encode(&buffer));

        Accepted::Complete { dev_eui, buffer }
    }

    /// Decode a reassembled buffer and hand the result to the sinks.
    pub async fn complete(&self, dev_eui: String, buffer: Vec<u8>) -> Outcome {
        let result = match self.decoder.decode(&buffer, REASSEMBLED_FPORT).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "Failed to decode frame from {} ({}): {}",
                    dev_eui,
                    hex::encode(&buffer),
                    e
                );
                ServiceStats::incr(&self.stats.decode_failures);
                return Outcome::DecodeFailed {
                    dev_eui,
                    error: e.to_string(),
                };
            }
        };

        let report = self.dispatcher.dispatch(&dev_eui, &result).await;
        ServiceStats::add(&self.stats.dispatched, report.delivered.len() as u64);
        ServiceStats::add(&self.stats.sink_failures, report.failed.len() as u64);

        Outcome::Dispatched {
            dev_eui,
            result,
            report,
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("dialect", &self.dialect)
            .field("pending", &self.store.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
