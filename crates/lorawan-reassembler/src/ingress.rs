// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingress adapters feeding raw network server messages into the
//! [`Pipeline`](crate::pipeline::Pipeline).

pub mod http;
pub mod mqtt;

pub use http::{router, HttpState};
pub use mqtt::MqttIngress;
