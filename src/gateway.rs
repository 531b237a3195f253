// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Top-level facade: wires the link, poller, snapshot register, event bus,
//! watchdog and diagnostic pipeline together and runs them as one set of
//! cooperating tasks until asked to shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::adapters::{CanPublisher, DiagnosticLogSubscriber, MqttPublisher};
use crate::bus::{EventBus, Topic};
use crate::config::GatewayConfig;
use crate::diagnostics::{DiagnosticRing, FileBackend, FlushManager, PersistenceBackend};
use crate::error::GatewayError;
use crate::link::{CollectionMode, LinkDriver};
use crate::poller::{ArbiterMessage, Poller};
use crate::snapshot::SnapshotRegister;
use crate::watchdog::Watchdog;

pub struct Gateway {
    config: GatewayConfig,
    snapshot: Arc<SnapshotRegister>,
    bus: Arc<EventBus>,
    watchdog: Arc<Watchdog>,
    diagnostic_ring: Arc<DiagnosticRing>,
    command_tx: Arc<OnceCell<mpsc::Sender<ArbiterMessage>>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            config,
            snapshot: Arc::new(SnapshotRegister::new()),
            bus: Arc::new(EventBus::new()),
            watchdog: Arc::new(Watchdog::new()),
            diagnostic_ring: Arc::new(DiagnosticRing::new()),
            command_tx: Arc::new(OnceCell::new()),
        })
    }

    pub fn snapshot(&self) -> Arc<SnapshotRegister> {
        self.snapshot.clone()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn watchdog(&self) -> Arc<Watchdog> {
        self.watchdog.clone()
    }

    /// Writes a register through the running poller's arbiter and returns
    /// the raw value read back immediately afterwards as verification.
    /// Errors with `InvalidState` if called before [`Gateway::run`] has
    /// started.
    pub async fn write_register(&self, address: u16, value: u16) -> Result<u16, GatewayError> {
        let tx = self.command_tx.get().ok_or_else(|| {
            GatewayError::InvalidState("gateway is not running".to_string())
        })?;
        let (respond_to, rx) = oneshot::channel();
        tx.send(ArbiterMessage::WriteRegister {
            address,
            value,
            respond_to,
        })
        .await
        .map_err(|_| GatewayError::InvalidState("poller task has stopped".to_string()))?;
        rx.await
            .map_err(|_| GatewayError::InvalidState("poller dropped the response".to_string()))?
    }

    pub async fn read_register(&self, address: u16) -> Result<u16, GatewayError> {
        let tx = self.command_tx.get().ok_or_else(|| {
            GatewayError::InvalidState("gateway is not running".to_string())
        })?;
        let (respond_to, rx) = oneshot::channel();
        tx.send(ArbiterMessage::ReadRegister {
            address,
            respond_to,
        })
        .await
        .map_err(|_| GatewayError::InvalidState("poller task has stopped".to_string()))?;
        rx.await
            .map_err(|_| GatewayError::InvalidState("poller dropped the response".to_string()))?
    }

    /// Runs every subsystem until `cancel` fires. Consumes `self` since the
    /// gateway only ever runs once.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), GatewayError> {
        let link = LinkDriver::open(
            &self.config.serial_port,
            self.config.baud_rate,
            CollectionMode::Polled,
        )?;
        let (poller, handle) = Poller::new(
            link,
            self.snapshot.clone(),
            self.bus.clone(),
            self.config.poll_interval(),
        );
        let _ = self.command_tx.set(handle.inbox.clone());

        self.watchdog
            .register("poller", self.config.poll_interval_ms * 4)
            .await?;

        let mut tasks = Vec::new();

        let watchdog = self.watchdog.clone();
        let watchdog_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            watchdog.run_monitor(watchdog_cancel).await;
        }));

        if let Some(path) = self.config.diagnostic_log_path.clone() {
            let backend: Arc<dyn PersistenceBackend> = Arc::new(FileBackend::new(path));
            let flush_manager = Arc::new(FlushManager::new(self.diagnostic_ring.clone(), backend));
            let flush_cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                flush_manager.run(flush_cancel).await;
            }));

            let log_rx = self.bus.subscribe(Topic::DiagnosticLogEntry).await;
            let log_cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                DiagnosticLogSubscriber::new().run(log_rx, log_cancel).await;
            }));
        }

        if let Some(mqtt_cfg) = self.config.mqtt.clone() {
            let mut options =
                rumqttc::MqttOptions::new(mqtt_cfg.client_id.clone(), mqtt_cfg.host.clone(), mqtt_cfg.port);
            options.set_keep_alive(Duration::from_secs(30));
            let (publisher, mut eventloop) = MqttPublisher::new(options, mqtt_cfg.topic, mqtt_cfg.qos);
            let mqtt_rx = self.bus.subscribe(Topic::BmsLiveData).await;
            let mqtt_cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                publisher.run(mqtt_rx, mqtt_cancel).await;
            }));

            let eventloop_cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = eventloop_cancel.cancelled() => return,
                        result = eventloop.poll() => {
                            if let Err(e) = result {
                                log::warn!("MQTT event loop error: {e}");
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                        }
                    }
                }
            }));
        }

        if let Some(iface) = self.config.can_interface.clone() {
            let publisher = CanPublisher::open(&iface)?;
            let can_rx = self.bus.subscribe(Topic::BmsLiveData).await;
            let can_cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                publisher.run(can_rx, can_cancel).await;
            }));
        }

        tasks.push(tokio::spawn(poller.run(cancel.clone())));

        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }
}
