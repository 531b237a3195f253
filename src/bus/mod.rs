// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Fan-out event bus: one bounded queue per subscriber, never per topic, so
//! a slow MQTT publisher cannot starve the CAN publisher or vice versa.
//! Publishing copies the matching subscriber list onto the stack and
//! releases the subscriber-table lock before sending, so no subscriber
//! callback (the channel send) runs while holding it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::constants::{BUS_ENQUEUE_TIMEOUT, BUS_QUEUE_DEPTH};
use crate::model::{DiagnosticEntry, LiveData};

/// The channels a consumer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    BmsLiveData,
    RawFrameJson,
    DecodedFrameJson,
    MqttMetrics,
    DiagnosticLogEntry,
    RegisterUpdate,
}

/// An event carried on the bus. Each variant corresponds to exactly one
/// [`Topic`].
#[derive(Debug, Clone)]
pub enum BusEvent {
    BmsLiveData(Arc<LiveData>),
    RawFrameJson(String),
    DecodedFrameJson(String),
    MqttMetrics(String),
    DiagnosticLogEntry(Arc<DiagnosticEntry>),
    RegisterUpdate { address: u16, value: u16 },
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::BmsLiveData(_) => Topic::BmsLiveData,
            BusEvent::RawFrameJson(_) => Topic::RawFrameJson,
            BusEvent::DecodedFrameJson(_) => Topic::DecodedFrameJson,
            BusEvent::MqttMetrics(_) => Topic::MqttMetrics,
            BusEvent::DiagnosticLogEntry(_) => Topic::DiagnosticLogEntry,
            BusEvent::RegisterUpdate { .. } => Topic::RegisterUpdate,
        }
    }
}

struct Subscriber {
    topic: Topic,
    tx: mpsc::Sender<BusEvent>,
}

/// Bounded, multi-topic pub/sub fan-out used to hand decoded data and raw
/// diagnostics off to the MQTT/CAN/log consumer adapters.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    dropped_events: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Registers a new subscriber for `topic`, returning its receiving end.
    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusEvent> {
        self.subscribe_with_capacity(topic, BUS_QUEUE_DEPTH).await
    }

    /// Same as [`EventBus::subscribe`] but with an explicit queue depth,
    /// mainly useful for exercising the drop-accounting behaviour under a
    /// small, deterministic capacity.
    pub async fn subscribe_with_capacity(
        &self,
        topic: Topic,
        capacity: usize,
    ) -> mpsc::Receiver<BusEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.subscribers.lock().await.push(Subscriber { topic, tx });
        rx
    }

    /// Publishes `event` to every subscriber of its topic. A subscriber
    /// whose queue is full is given [`BUS_ENQUEUE_TIMEOUT`] to drain before
    /// its delivery is dropped and counted.
    pub async fn publish(&self, event: BusEvent) {
        let topic = event.topic();
        let targets: Vec<mpsc::Sender<BusEvent>> = {
            let subs = self.subscribers.lock().await;
            subs.iter()
                .filter(|s| s.topic == topic)
                .map(|s| s.tx.clone())
                .collect()
        };

        for tx in targets {
            let delivered = tokio::time::timeout(BUS_ENQUEUE_TIMEOUT, tx.send(event.clone()))
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false);
            if !delivered {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_only_to_subscribers_of_the_matching_topic() {
        let bus = EventBus::new();
        let mut live_rx = bus.subscribe(Topic::BmsLiveData).await;
        let mut can_rx = bus.subscribe(Topic::RegisterUpdate).await;

        bus.publish(BusEvent::RegisterUpdate {
            address: 0x0086,
            value: 0xA55A,
        })
        .await;

        assert!(live_rx.try_recv().is_err());
        let received = can_rx.try_recv().unwrap();
        assert!(matches!(received, BusEvent::RegisterUpdate { address: 0x0086, value: 0xA55A }));
    }

    #[tokio::test]
    async fn a_full_queue_is_dropped_and_counted_instead_of_blocking() {
        let bus = EventBus::new();
        let _rx = bus.subscribe(Topic::MqttMetrics).await; // never drained
        for _ in 0..(BUS_QUEUE_DEPTH + 4) {
            bus.publish(BusEvent::MqttMetrics("{}".to_string())).await;
        }
        assert!(bus.dropped_events() > 0);
    }

    #[tokio::test]
    async fn a_capacity_four_queue_drops_exactly_the_publications_past_capacity() {
        let bus = EventBus::new();
        let _rx = bus
            .subscribe_with_capacity(Topic::MqttMetrics, 4)
            .await; // never drained
        for _ in 0..10 {
            bus.publish(BusEvent::MqttMetrics("{}".to_string())).await;
        }
        assert_eq!(bus.dropped_events(), 6);
    }
}
