// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT publish handling without a broker.
//!
//! Publishes of one poll batch are fed back to back, the way the subscriber
//! loop receives them, on a multi-thread runtime.

mod common;

use common::*;
use lorawan_reassembler::ingress::mqtt::handle_publish;
use lorawan_reassembler::{Dialect, Dispatcher, FragmentStore, Pipeline, ServiceStats};
use std::sync::Arc;
use tokio_util::task::TaskTracker;

const TOPIC: &str = "v3/reassembly@ttn/devices/vibration-sensor-1/up";

struct Harness {
    pipeline: Arc<Pipeline>,
    decoder: Arc<FixtureDecoder>,
    sink: Arc<CaptureSink>,
}

fn harness() -> Harness {
    let decoder = Arc::new(FixtureDecoder::dataformat2());
    let sink = Arc::new(CaptureSink::default());
    let pipeline = Arc::new(Pipeline::new(
        Dialect::Ttn,
        Arc::new(FragmentStore::new()),
        decoder.clone(),
        Dispatcher::default().with_sink(sink.clone()),
        Arc::new(ServiceStats::new()),
    ));

    Harness {
        pipeline,
        decoder,
        sink,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_keeps_fragment_order() {
    let first = fixture("ttn_fragment1.json");
    let last = fixture("ttn_fragment_last.json");

    for run in 0..200 {
        let h = harness();
        let tracker = TaskTracker::new();

        // Same shape as the event loop: one task receiving the whole batch.
        let pipeline = Arc::clone(&h.pipeline);
        let loop_tracker = tracker.clone();
        let (first, last) = (first.clone(), last.clone());
        tokio::spawn(async move {
            for payload in [first, last] {
                handle_publish(&pipeline, &loop_tracker, TOPIC, &payload);
            }
        })
        .await
        .expect("receive task");

        tracker.close();
        tracker.wait().await;

        assert!(h.pipeline.store().is_empty(), "run {}: fragment left pending", run);
        let calls = h.decoder.calls.lock();
        assert_eq!(calls.len(), 1, "run {}", run);
        assert_eq!(hex::encode(&calls[0].0), DATAFORMAT2_HEX, "run {}", run);
        assert_eq!(h.sink.sent.lock().len(), 1, "run {}", run);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_of_many_devices() {
    const DEVICES: usize = 16;

    let h = harness();
    let tracker = TaskTracker::new();
    let first: serde_json::Value =
        serde_json::from_slice(&fixture("ttn_fragment1.json")).expect("json");
    let last: serde_json::Value =
        serde_json::from_slice(&fixture("ttn_fragment_last.json")).expect("json");

    let with_eui = |msg: &serde_json::Value, d: usize| {
        let mut msg = msg.clone();
        msg["end_device_ids"]["dev_eui"] = format!("42{:014}", d).into();
        msg.to_string().into_bytes()
    };

    // All first fragments, then all last fragments, interleaved by device.
    for d in 0..DEVICES {
        handle_publish(&h.pipeline, &tracker, TOPIC, &with_eui(&first, d));
    }
    assert_eq!(h.pipeline.store().len(), DEVICES);
    for d in 0..DEVICES {
        handle_publish(&h.pipeline, &tracker, TOPIC, &with_eui(&last, d));
    }

    tracker.close();
    tracker.wait().await;

    assert!(h.pipeline.store().is_empty());
    assert_eq!(h.sink.sent.lock().len(), DEVICES);
    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.reassembled, DEVICES as u64);
    assert_eq!(stats.decode_failures, 0);
}

#[tokio::test]
async fn test_rejected_and_ignored_publishes_spawn_nothing() {
    let h = harness();
    let tracker = TaskTracker::new();

    handle_publish(&h.pipeline, &tracker, TOPIC, b"badformat");

    let mut data_frame: serde_json::Value =
        serde_json::from_slice(&fixture("ttn_fragment1.json")).expect("json");
    data_frame["uplink_message"]["f_port"] = 10.into();
    handle_publish(&h.pipeline, &tracker, TOPIC, data_frame.to_string().as_bytes());

    assert!(tracker.is_empty());
    assert!(h.pipeline.store().is_empty());

    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.ignored, 1);
}
