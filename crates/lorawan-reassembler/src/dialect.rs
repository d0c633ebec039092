// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network server dialects.
//!
//! Each LNS integration publishes uplinks in its own JSON shape. A
//! [`Dialect`] turns one raw message into a normalized [`Frame`].
//!
//! | Dialect  | DevEUI                    | FPort                    | Payload                            |
//! |----------|---------------------------|--------------------------|------------------------------------|
//! | `ttn`    | `end_device_ids.dev_eui`  | `uplink_message.f_port`  | `uplink_message.frm_payload` (b64) |
//! | `loriot` | `EUI`                     | `port`                   | `data` (hex)                       |

pub mod loriot;
pub mod ttn;

use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Frame parsing errors.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Message is not JSON.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),

    /// JSON, but not an uplink this dialect understands.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Supported network server dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// The Things Stack (v3) MQTT/webhook uplink.
    Ttn,
    /// Loriot uplink data message.
    Loriot,
}

impl Dialect {
    /// All known dialects.
    pub const ALL: [Dialect; 2] = [Dialect::Ttn, Dialect::Loriot];

    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ttn => "ttn",
            Self::Loriot => "loriot",
        }
    }

    /// Parse a raw message into a frame stamped with the current time.
    pub fn parse(self, raw: &[u8]) -> Result<Frame, ParseError> {
        let value: serde_json::Value = serde_json::from_slice(raw)?;
        match self {
            Self::Ttn => ttn::parse(&value),
            Self::Loriot => loriot::parse(&value),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unsupported LNS '{}' (expected one of: {})",
                    s,
                    Self::ALL.map(Dialect::name).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("ttn".parse::<Dialect>(), Ok(Dialect::Ttn));
        assert_eq!("LORIOT".parse::<Dialect>(), Ok(Dialect::Loriot));

        let err = "chirpstack".parse::<Dialect>().unwrap_err();
        assert!(err.contains("chirpstack"));
        assert!(err.contains("ttn, loriot"));
    }

    #[test]
    fn test_not_json_is_invalid_envelope() {
        for dialect in Dialect::ALL {
            let err = dialect.parse(b"badformat").unwrap_err();
            assert!(matches!(err, ParseError::InvalidEnvelope(_)), "{dialect}");
        }
    }

    #[test]
    fn test_weird_json_is_invalid_frame() {
        for dialect in Dialect::ALL {
            let err = dialect.parse(br#"{"weird":"frame"}"#).unwrap_err();
            assert!(matches!(err, ParseError::InvalidFrame(_)), "{dialect}");
        }
    }

    #[test]
    fn test_dialect_deserialize() {
        let d: Dialect = serde_yaml::from_str("loriot").expect("yaml");
        assert_eq!(d, Dialect::Loriot);
        assert!(serde_yaml::from_str::<Dialect>("kerlink").is_err());
    }
}
