// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded result delivery.
//!
//! A [`Dispatcher`] fans a decoded result out to every enabled [`Sink`].
//! Sinks are independent: a failure is logged and counted, the other sinks
//! still run, and nothing is retried.

use crate::decoder::DecodedResult;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("MQTT publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP endpoint answered {0}")]
    Status(reqwest::StatusCode),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for decoded results.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver `result` decoded for `dev_eui`.
    async fn send(&self, dev_eui: &str, result: &DecodedResult) -> Result<(), SinkError>;
}

/// Publishes results on `<topic>/<dev_eui>`.
#[derive(Clone)]
pub struct MqttSink {
    client: AsyncClient,
    topic: String,
}

impl MqttSink {
    /// Wrap a connected client. Its event loop must be driven elsewhere.
    pub fn new(client: AsyncClient, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }

    /// Topic a device's results are published on.
    pub fn topic_for(&self, dev_eui: &str) -> String {
        format!("{}/{}", self.topic.trim_end_matches('/'), dev_eui)
    }
}

#[async_trait]
impl Sink for MqttSink {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn send(&self, dev_eui: &str, result: &DecodedResult) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(result)?;
        // Queued for the event loop; errors once the queue is full.
        self.client
            .try_publish(self.topic_for(dev_eui), QoS::AtMostOnce, false, payload)?;
        Ok(())
    }
}

/// POSTs `{"frame": result}` to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    /// Create a sink for `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, _dev_eui: &str, result: &DecodedResult) -> Result<(), SinkError> {
        let body = serde_json::json!({ "frame": result });
        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status));
        }
        Ok(())
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sinks that accepted the result.
    pub delivered: Vec<String>,
    /// Sinks that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    /// True if every sink accepted the result.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans results out to the configured sinks.
#[derive(Clone, Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn Sink>>,
}

impl Dispatcher {
    /// Create a dispatcher over `sinks`.
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Add a sink.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True if no sink is configured.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver `result` to every sink, in order.
    pub async fn dispatch(&self, dev_eui: &str, result: &DecodedResult) -> DispatchReport {
        let mut report = DispatchReport::default();

        for sink in &self.sinks {
            match sink.send(dev_eui, result).await {
                Ok(()) => {
                    debug!("[{}] frame from {} delivered", sink.name(), dev_eui);
                    report.delivered.push(sink.name().to_string());
                }
                Err(e) => {
                    warn!("[{}] failed to deliver frame from {}: {}", sink.name(), dev_eui, e);
                    report.failed.push((sink.name().to_string(), e.to_string()));
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("Dispatcher").field("sinks", &names).finish()
    }
}
