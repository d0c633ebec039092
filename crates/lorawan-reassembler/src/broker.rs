// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Self-hosted MQTT broker subprocess (`mosquitto -c <config>`).

use crate::config::LocalBrokerConfig;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Time the broker gets to fail before it is considered started.
const STARTUP_GRACE: Duration = Duration::from_secs(1);

/// Broker subprocess errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("broker exited during startup ({status}): {stderr}")]
    Exited { status: String, stderr: String },

    #[error("broker I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Running broker, killed by [`stop`](LocalBroker::stop) or on drop.
#[derive(Debug)]
pub struct LocalBroker {
    child: Child,
}

impl LocalBroker {
    /// Start the configured broker and check it survives startup.
    pub async fn start(config: &LocalBrokerConfig) -> Result<Self, BrokerError> {
        let config_path = config.config.to_string_lossy().into_owned();
        Self::spawn(&config.command, &["-c", &config_path], STARTUP_GRACE).await
    }

    async fn spawn(program: &str, args: &[&str], grace: Duration) -> Result<Self, BrokerError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BrokerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        tokio::time::sleep(grace).await;

        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                pipe.read_to_string(&mut stderr).await?;
            }
            return Err(BrokerError::Exited {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        // Keep the pipe drained so the broker never blocks on stderr.
        if let Some(pipe) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "mosquitto", "{}", line);
                }
            });
        }

        info!("Self-hosted MQTT broker started (pid {:?})", child.id());
        Ok(Self { child })
    }

    /// OS process id, if still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the broker and reap it.
    pub async fn stop(mut self) {
        match self.child.kill().await {
            Ok(()) => info!("Self-hosted MQTT broker stopped"),
            Err(e) => warn!("Failed to stop self-hosted MQTT broker: {}", e),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broker_exiting_at_startup() {
        let err = LocalBroker::spawn(
            "sh",
            &["-c", "echo 'Error: Unable to open config file' >&2; exit 1"],
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

        match err {
            BrokerError::Exited { stderr, .. } => {
                assert_eq!(stderr, "Error: Unable to open config file")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_broker_missing_program() {
        let err = LocalBroker::spawn("/nonexistent/mosquitto", &[], Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_broker_start_and_stop() {
        let broker = LocalBroker::spawn("sleep", &["30"], Duration::from_millis(50))
            .await
            .expect("broker");
        assert!(broker.id().is_some());

        tokio::time::timeout(Duration::from_secs(2), broker.stop())
            .await
            .expect("stop timed out");
    }
}
