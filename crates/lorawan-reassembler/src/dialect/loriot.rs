// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loriot uplink data messages (`"cmd": "rx"`).

use super::ParseError;
use crate::frame::Frame;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LoriotMessage {
    cmd: String,
    #[serde(rename = "EUI")]
    eui: Option<String>,
    port: Option<u8>,
    // Hex string, e.g. "CAFEBABE". Absent when the application key is not
    // shared with Loriot (only `encdata` is sent).
    data: Option<String>,
}

/// Parse a Loriot uplink.
pub fn parse(value: &serde_json::Value) -> Result<Frame, ParseError> {
    let msg = LoriotMessage::deserialize(value)
        .map_err(|e| ParseError::InvalidFrame(format!("not a Loriot message: {}", e)))?;

    if msg.cmd != "rx" {
        return Err(ParseError::InvalidFrame(format!(
            "unsupported Loriot command '{}'",
            msg.cmd
        )));
    }

    let eui = msg
        .eui
        .ok_or_else(|| ParseError::InvalidFrame("rx message without EUI".into()))?;
    let port = msg
        .port
        .ok_or_else(|| ParseError::InvalidFrame("rx message without port".into()))?;
    let data = msg
        .data
        .ok_or_else(|| ParseError::InvalidFrame("rx message without data".into()))?;

    let payload = hex::decode(&data)
        .map_err(|e| ParseError::InvalidFrame(format!("data is not hex: {}", e)))?;

    Ok(Frame::new(eui, port, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    const FRAGMENT1: &str = r#"{
        "cmd": "rx",
        "seqno": 3391,
        "EUI": "BCAF9100004DA780",
        "ts": 1741772467123,
        "fcnt": 12,
        "port": 138,
        "freq": 868100000,
        "rssi": -87,
        "snr": 7.5,
        "toa": 206,
        "dr": "SF9 BW125 4/5",
        "ack": false,
        "bat": 255,
        "data": "152f000408630b3e81000c000000060000180000000400010000d0001c0003c000d0001b00038000"
    }"#;

    #[test]
    fn test_parse_loriot() {
        let frame = Dialect::Loriot.parse(FRAGMENT1.as_bytes()).expect("parse");
        assert_eq!(frame.dev_eui, "BCAF9100004DA780");
        assert_eq!(frame.f_port, 138);
        assert_eq!(frame.payload.len(), 40);
        assert_eq!(&frame.payload[..2], &[0x15, 0x2f]);
    }

    #[test]
    fn test_parse_loriot_gateway_message() {
        let raw = r#"{"cmd": "gw", "EUI": "BCAF9100004DA780", "data": "00"}"#;
        let err = Dialect::Loriot.parse(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("'gw'"));
    }

    #[test]
    fn test_parse_loriot_encrypted_only() {
        let raw = r#"{"cmd": "rx", "EUI": "BCAF9100004DA780", "port": 138, "encdata": "ab"}"#;
        let err = Dialect::Loriot.parse(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidFrame(_)));
    }

    #[test]
    fn test_parse_loriot_uppercase_hex() {
        let raw = r#"{"cmd": "rx", "EUI": "01", "port": 202, "data": "CAFEBABE"}"#;
        let frame = Dialect::Loriot.parse(raw.as_bytes()).expect("parse");
        assert_eq!(frame.payload, vec![0xca, 0xfe, 0xba, 0xbe]);
        assert!(frame.is_last());
    }
}
