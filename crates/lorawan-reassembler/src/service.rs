// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service lifecycle.
//!
//! Startup order:
//!
//! ```text
//! local broker -> output sinks -> pipeline -> sweeper -> MQTT input -> HTTP server
//! ```
//!
//! Every long-running task is spawned on one [`TaskTracker`] and watches
//! one [`CancellationToken`]. [`ServiceHandle::shutdown`] cancels the token
//! and waits for the tracker, so in-flight decode and dispatch work
//! completes before the process exits.

use crate::broker::{BrokerError, LocalBroker};
use crate::config::Config;
use crate::decoder::{DecoderGateway, ProcessDecoder};
use crate::dispatch::{Dispatcher, HttpSink, MqttSink, Sink, SinkError};
use crate::ingress::{self, HttpState, MqttIngress};
use crate::mqtt::{self, ConnectError};
use crate::pipeline::Pipeline;
use crate::stats::{ServiceStats, StatsSnapshot};
use crate::store::FragmentStore;
use crate::sweeper::{SweepPolicy, Sweeper};
use rumqttc::AsyncClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// Time allowed for a broker to acknowledge a connection at startup.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Startup errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to bind HTTP server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: ConnectError,
    },

    #[error("Local broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Output setup failed: {0}")]
    Sink(#[from] SinkError),
}

/// Service builder.
pub struct Service {
    config: Config,
    decoder: Option<Arc<dyn DecoderGateway>>,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Service {
    /// Create a service from a configuration checked by
    /// [`Config::validate`].
    pub fn new(config: Config) -> Self {
        Self {
            config,
            decoder: None,
            sinks: Vec::new(),
        }
    }

    /// Replace the configured external decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn DecoderGateway>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Add a sink next to the configured outputs.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Start every configured component.
    ///
    /// On failure, whatever already started is stopped before returning.
    pub async fn start(self) -> Result<ServiceHandle, ServiceError> {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        match self.launch(&cancel, &tracker).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                cancel.cancel();
                tracker.close();
                tracker.wait().await;
                Err(e)
            }
        }
    }

    async fn launch(
        self,
        cancel: &CancellationToken,
        tracker: &TaskTracker,
    ) -> Result<ServiceHandle, ServiceError> {
        let config = self.config;

        let broker = if config.local_broker.enable {
            Some(LocalBroker::start(&config.local_broker).await?)
        } else {
            None
        };

        // Outputs
        let mut dispatcher = Dispatcher::default();
        let out = &config.output;
        if out.mqtt.enable {
            let auth = out.mqtt.auth.as_ref();
            let options = mqtt::options("output", &out.mqtt.host, out.mqtt.port, auth);
            let (client, mut eventloop) = AsyncClient::new(options, 64);
            mqtt::wait_connected(&mut eventloop, CONNECT_TIMEOUT)
                .await
                .map_err(|source| ServiceError::Connect {
                    target: format!("MQTT output {}:{}", out.mqtt.host, out.mqtt.port),
                    source,
                })?;
            info!(
                "Output connected to MQTT broker {}:{}",
                out.mqtt.host, out.mqtt.port
            );

            tracker.spawn(mqtt::drive(eventloop, "MQTT output", cancel.clone()));
            dispatcher = dispatcher.with_sink(Arc::new(MqttSink::new(client, &out.mqtt.topic)));
        }
        if out.http.enable {
            let url = out.http.url.clone().unwrap_or_default();
            let timeout = Duration::from_secs(out.http.timeout_secs);
            info!("Output HTTP POST to {}", url);
            dispatcher = dispatcher.with_sink(Arc::new(HttpSink::new(url, timeout)?));
        }
        for sink in self.sinks {
            dispatcher = dispatcher.with_sink(sink);
        }
        if dispatcher.is_empty() {
            info!("No output enabled, decoded frames are only logged");
        }

        let decoder: Arc<dyn DecoderGateway> = match self.decoder {
            Some(decoder) => decoder,
            None => Arc::new(ProcessDecoder::new(
                &config.decoder.command,
                config.decoder.function.clone(),
                config.decoder.timeout(),
            )),
        };

        let store = Arc::new(FragmentStore::new());
        let stats = Arc::new(ServiceStats::new());
        let pipeline = Arc::new(Pipeline::new(
            config.frame.lns,
            Arc::clone(&store),
            decoder,
            dispatcher,
            Arc::clone(&stats),
        ));

        let sweeper = Sweeper::new(
            Arc::clone(&store),
            Arc::clone(&stats),
            SweepPolicy {
                max_chunks: config.frame.max_chunks,
                max_age: config.frame.max_age(),
                interval: config.frame.sweep_interval(),
            },
        );
        tracker.spawn(sweeper.run(cancel.clone()));

        // Inputs
        let input = &config.input;
        if input.mqtt.enable {
            let ingress = MqttIngress::connect(&input.mqtt, CONNECT_TIMEOUT)
                .await
                .map_err(|source| ServiceError::Connect {
                    target: format!("MQTT input {}:{}", input.mqtt.host, input.mqtt.port),
                    source,
                })?;
            tracker.spawn(ingress.run(Arc::clone(&pipeline), tracker.clone(), cancel.clone()));
        }

        // The HTTP server also carries the monitoring pages, so it runs
        // even when HTTP input is disabled.
        let addr = format!("{}:{}", input.http.host, input.http.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServiceError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let http_addr = listener.local_addr().ok();
        info!(
            "HTTP server listening on {} (input {})",
            http_addr.map_or(addr, |a| a.to_string()),
            if input.http.enable { "enabled" } else { "disabled" }
        );

        let app = ingress::router(Arc::new(HttpState {
            pipeline: Arc::clone(&pipeline),
            input_enabled: input.http.enable,
        }));
        let shutdown = cancel.clone().cancelled_owned();
        tracker.spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("HTTP server error: {}", e);
            }
        });

        info!(
            "Service started (lns: {}, max_chunks: {}, timeout: {}h)",
            config.frame.lns, config.frame.max_chunks, config.frame.timeout
        );

        Ok(ServiceHandle {
            cancel: cancel.clone(),
            tracker: tracker.clone(),
            store,
            stats,
            http_addr,
            broker,
        })
    }
}

/// Handle to a running service.
#[derive(Debug)]
pub struct ServiceHandle {
    cancel: CancellationToken,
    tracker: TaskTracker,
    store: Arc<FragmentStore>,
    stats: Arc<ServiceStats>,
    http_addr: Option<SocketAddr>,
    broker: Option<LocalBroker>,
}

impl ServiceHandle {
    /// Address the HTTP server is bound to.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Fragment store.
    pub fn store(&self) -> &Arc<FragmentStore> {
        &self.store
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Token cancelled when the service stops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop all tasks, wait for in-flight work, then stop the broker.
    pub async fn shutdown(self) -> StatsSnapshot {
        info!("Shutting down...");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        if let Some(broker) = self.broker {
            broker.stop().await;
        }

        let stats = self.stats.snapshot();
        if !self.store.is_empty() {
            info!("Dropping {} pending fragment set(s)", self.store.len());
        }
        info!(
            "Stopped: {} received, {} reassembled, {} dispatched, {} evicted",
            stats.received,
            stats.reassembled,
            stats.dispatched,
            stats.evicted()
        );
        stats
    }
}
