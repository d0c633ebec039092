// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The Things Stack uplink messages.
//!
//! Published on `v3/{application id}@{tenant id}/devices/{device id}/up`.

use super::ParseError;
use crate::frame::Frame;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TtnUplink {
    end_device_ids: EndDeviceIds,
    uplink_message: UplinkMessage,
}

#[derive(Debug, Deserialize)]
struct EndDeviceIds {
    dev_eui: String,
}

#[derive(Debug, Deserialize)]
struct UplinkMessage {
    // Absent on MAC-only uplinks.
    f_port: Option<u8>,
    frm_payload: Option<String>,
}

/// Parse a TTN uplink.
pub fn parse(value: &serde_json::Value) -> Result<Frame, ParseError> {
    let uplink = TtnUplink::deserialize(value)
        .map_err(|e| ParseError::InvalidFrame(format!("not a TTN uplink: {}", e)))?;

    let f_port = uplink
        .uplink_message
        .f_port
        .ok_or_else(|| ParseError::InvalidFrame("uplink without f_port".into()))?;
    let encoded = uplink
        .uplink_message
        .frm_payload
        .ok_or_else(|| ParseError::InvalidFrame("uplink without frm_payload".into()))?;

    let payload = general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| ParseError::InvalidFrame(format!("frm_payload is not base64: {}", e)))?;

    Ok(Frame::new(uplink.end_device_ids.dev_eui, f_port, payload))
}
