// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LoRaWAN Fragment Reassembler
//!
//! Collects fragmented LoRaWAN uplinks per device, rebuilds the full
//! payload when the last fragment arrives, hands it to an external decoder
//! and republishes the decoded result.
//!
//! # Features
//!
//! - **Ingress**: MQTT subscription and/or `POST /input`
//! - **Dialects**: The Things Stack (`ttn`) and Loriot (`loriot`) uplinks
//! - **Eviction**: stale and oversized pending sets are swept periodically
//! - **Egress**: MQTT publish on `<topic>/<DevEUI>` and/or HTTP POST
//! - **Monitoring**: `/monitor` HTML page and a small JSON API
//!
//! # Fragment protocol
//!
//! ```text
//! FPort 138  FPort 138  ...  FPort 202
//! [chunk 1]  [chunk 2]  ...  [last]     ->  chunk 1 || chunk 2 || ... || last
//! ```
//!
//! The reassembled buffer is decoded as a regular data frame (FPort 10).
//!
//! # Quick Start
//!
//! ```bash
//! # Write a sample configuration
//! lorawan-reassembler gen-config --output config.yaml
//!
//! # Check it
//! lorawan-reassembler validate --config config.yaml
//!
//! # Run (config.yaml, or config_dev.yaml when ENV=dev)
//! lorawan-reassembler
//! ```

pub mod broker;
pub mod config;
pub mod decoder;
pub mod dialect;
pub mod dispatch;
pub mod frame;
pub mod ingress;
pub mod monitor;
pub mod mqtt;
pub mod pipeline;
pub mod service;
pub mod stats;
pub mod store;
pub mod sweeper;

pub use config::{Config, ConfigError};
pub use decoder::{DecodeError, DecodedResult, DecoderGateway, ProcessDecoder};
pub use dialect::{Dialect, ParseError};
pub use dispatch::{DispatchReport, Dispatcher, HttpSink, MqttSink, Sink, SinkError};
pub use frame::{Frame, FRAGMENT_FPORT, LAST_FRAGMENT_FPORT, REASSEMBLED_FPORT};
pub use pipeline::{Accepted, Outcome, Pipeline};
pub use service::{Service, ServiceError, ServiceHandle};
pub use stats::{ServiceStats, StatsSnapshot};
pub use store::{Eviction, EvictionReason, FragmentStore};
pub use sweeper::{SweepPolicy, Sweeper};
