// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Normalized uplink fragment.
//!
//! Devices split payloads that do not fit a single LoRaWAN uplink into
//! chunks and mark them with reserved FPorts:
//!
//! ```text
//! FPort 138  ->  fragment in progress
//! FPort 202  ->  last fragment, the set is complete
//! other      ->  regular traffic, not handled here
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

/// FPort carried by every fragment except the last one.
pub const FRAGMENT_FPORT: u8 = 138;

/// FPort carried by the fragment that completes a set.
pub const LAST_FRAGMENT_FPORT: u8 = 202;

/// FPort handed to the decoder with a reassembled buffer, so it treats the
/// buffer as a whole data frame.
pub const REASSEMBLED_FPORT: u8 = 10;

/// One received fragment. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Device identity (DevEUI as reported by the network server).
    pub dev_eui: String,
    /// LoRaWAN FPort.
    pub f_port: u8,
    /// Raw fragment bytes.
    #[serde(serialize_with = "serialize_hex")]
    pub payload: Vec<u8>,
    /// Arrival timestamp.
    pub received_at: DateTime<Utc>,
}

impl Frame {
    /// Create a frame stamped with the current time.
    pub fn new(dev_eui: impl Into<String>, f_port: u8, payload: Vec<u8>) -> Self {
        Self::received(dev_eui, f_port, payload, Utc::now())
    }

    /// Create a frame with an explicit arrival time.
    pub fn received(
        dev_eui: impl Into<String>,
        f_port: u8,
        payload: Vec<u8>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            dev_eui: dev_eui.into(),
            f_port,
            payload,
            received_at,
        }
    }

    /// True for FPorts 138 and 202.
    pub fn is_fragment(&self) -> bool {
        matches!(self.f_port, FRAGMENT_FPORT | LAST_FRAGMENT_FPORT)
    }

    /// True if this fragment completes its set.
    pub fn is_last(&self) -> bool {
        self.f_port == LAST_FRAGMENT_FPORT
    }

    /// Payload as lowercase hex.
    pub fn payload_hex(&self) -> String {
        hex::encode(&self.payload)
    }
}

fn serialize_hex<S: serde::Serializer>(payload: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(payload))
}
