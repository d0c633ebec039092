// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lorawan_reassembler::{DecodeError, DecodedResult, DecoderGateway, Sink, SinkError};
use parking_lot::Mutex;
use std::path::PathBuf;

/// Full 75-byte payload of the two-fragment test vector.
pub const DATAFORMAT2_HEX: &str = "152f000408630b3e81000c000000060000180000000400010000\
d0001c0003c000d0001b00038000d0001a8003600142002880051800cd0019c0033c00cd0019b0033800\
cd0019a8033600";

pub const TTN_DEV_EUI: &str = "4200000000000000";
pub const LORIOT_DEV_EUI: &str = "BCAF9100004DA780";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture_path(name)).expect("read fixture")
}

pub fn decoded_fixture() -> DecodedResult {
    serde_json::from_slice(&fixture("dataformat2_decoded.json")).expect("decoded fixture")
}

/// In-process decoder knowing a single payload.
pub struct FixtureDecoder {
    known: Vec<u8>,
    result: DecodedResult,
    pub calls: Mutex<Vec<(Vec<u8>, u8)>>,
}

impl FixtureDecoder {
    pub fn dataformat2() -> Self {
        Self {
            known: hex::decode(DATAFORMAT2_HEX).expect("hex"),
            result: decoded_fixture(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DecoderGateway for FixtureDecoder {
    async fn decode(&self, payload: &[u8], f_port: u8) -> Result<DecodedResult, DecodeError> {
        self.calls.lock().push((payload.to_vec(), f_port));
        if payload == self.known.as_slice() {
            Ok(self.result.clone())
        } else {
            Err(DecodeError::Decoder(format!(
                "unknown payload {}",
                hex::encode(payload)
            )))
        }
    }
}

/// Sink recording everything it receives.
#[derive(Default)]
pub struct CaptureSink {
    pub sent: Mutex<Vec<(String, DecodedResult)>>,
}

#[async_trait]
impl Sink for CaptureSink {
    fn name(&self) -> &str {
        "capture"
    }

    async fn send(&self, dev_eui: &str, result: &DecodedResult) -> Result<(), SinkError> {
        self.sent.lock().push((dev_eui.to_string(), result.clone()));
        Ok(())
    }
}
