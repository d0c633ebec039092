// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT client plumbing shared by the subscriber and the publisher.

use crate::config::MqttAuth;
use rumqttc::{Event, EventLoop, MqttOptions, Packet};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Broker connection errors.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("no CONNACK within {0:?}")]
    Timeout(Duration),

    #[error("subscribe failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
}

/// Build client options for one broker connection.
///
/// `role` distinguishes the subscriber from the publisher in the client id
/// so both can share a broker.
pub fn options(role: &str, host: &str, port: u16, auth: Option<&MqttAuth>) -> MqttOptions {
    let client_id = format!("lorawan-reassembler-{}-{}", role, std::process::id());
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_max_packet_size(256 * 1024, 256 * 1024);

    if let Some(auth) = auth {
        options.set_credentials(auth.username.clone(), auth.password.clone());
    }

    options
}

/// Poll `eventloop` until the broker acknowledges the connection.
pub async fn wait_connected(
    eventloop: &mut EventLoop,
    timeout: Duration,
) -> Result<(), ConnectError> {
    let connack = async {
        loop {
            if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
                debug!("CONNACK: {:?}", ack.code);
                return Ok::<(), ConnectError>(());
            }
        }
    };

    match tokio::time::timeout(timeout, connack).await {
        Ok(result) => result,
        Err(_) => Err(ConnectError::Timeout(timeout)),
    }
}

/// Keep a publish-only connection alive until `cancel` fires.
///
/// rumqttc reconnects on the next poll after an error.
pub async fn drive(mut eventloop: EventLoop, name: &'static str, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            event = eventloop.poll() => {
                if let Err(e) = event {
                    warn!("{} connection error: {}", name, e);
                    if !backoff(&cancel).await {
                        break;
                    }
                }
            }
        }
    }

    debug!("{} event loop stopped", name);
}

/// Pause after a connection error, returning `false` if cancelled meanwhile.
pub async fn backoff(cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(RECONNECT_DELAY) => true,
    }
}
