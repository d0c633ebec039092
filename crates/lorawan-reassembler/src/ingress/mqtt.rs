// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT subscriber.

use crate::config::MqttInputConfig;
use crate::mqtt::{self, ConnectError};
use crate::pipeline::{Accepted, Pipeline};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Outstanding requests between the client handle and its event loop.
const REQUEST_CAPACITY: usize = 64;

/// Connected subscriber, ready to [`run`](MqttIngress::run).
pub struct MqttIngress {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
}

impl MqttIngress {
    /// Connect to the broker and subscribe to the input topic.
    pub async fn connect(
        config: &MqttInputConfig,
        timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let options = mqtt::options("input", &config.host, config.port, config.auth.as_ref());
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        mqtt::wait_connected(&mut eventloop, timeout).await?;
        client.subscribe(config.topic.as_str(), QoS::AtMostOnce).await?;

        info!(
            "Input connected to MQTT broker {}:{}, topic '{}'",
            config.host, config.port, config.topic
        );

        Ok(Self {
            client,
            eventloop,
            topic: config.topic.clone(),
        })
    }

    /// Feed every publish to `pipeline` through [`handle_publish`] until
    /// `cancel` fires.
    pub async fn run(
        mut self,
        pipeline: Arc<Pipeline>,
        tracker: TaskTracker,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        handle_publish(&pipeline, &tracker, &publish.topic, &publish.payload);
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // Clean sessions lose their subscriptions on reconnect.
                        info!("Input reconnected, subscribing to '{}'", self.topic);
                        let topic = self.topic.as_str();
                        if let Err(e) = self.client.try_subscribe(topic, QoS::AtMostOnce) {
                            warn!("Failed to resubscribe to '{}': {}", self.topic, e);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Input MQTT connection error: {}", e);
                        if !mqtt::backoff(&cancel).await {
                            break;
                        }
                    }
                },
            }
        }

        // Best effort; the broker drops the session anyway.
        let _ = self.client.try_disconnect();
        debug!("MQTT input stopped");
    }
}

/// Feed one received publish to `pipeline`.
///
/// Parsing and buffering run inline so a device's fragments are appended in
/// the order the broker delivered them. Decoding and dispatch of a completed
/// set run in a task on `tracker`. A panic while buffering is logged and the
/// message dropped.
pub fn handle_publish(
    pipeline: &Arc<Pipeline>,
    tracker: &TaskTracker,
    topic: &str,
    payload: &[u8],
) {
    let accepted = match panic::catch_unwind(AssertUnwindSafe(|| pipeline.accept(payload))) {
        Ok(accepted) => accepted,
        Err(cause) => {
            error!("[{}] message handling panicked: {}", topic, panic_message(&*cause));
            return;
        }
    };

    match accepted {
        Accepted::Done(outcome) => debug!("[{}] {}", topic, outcome.label()),
        Accepted::Complete { dev_eui, buffer } => {
            let pipeline = Arc::clone(pipeline);
            let topic = topic.to_string();
            tracker.spawn(async move {
                let outcome = pipeline.complete(dev_eui, buffer).await;
                debug!("[{}] {}", topic, outcome.label());
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else {
        "non-string panic payload"
    }
}
