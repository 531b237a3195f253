// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Publishes decoded live data to an MQTT broker as JSON, via `rumqttc`.

use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bus::BusEvent;
use crate::error::GatewayError;
use crate::model::{Alarms, Limits, LiveData};

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn clamp_qos(requested: u8) -> QoS {
    match requested {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// The JSON body published on every live-data cycle.
#[derive(Debug, Serialize)]
struct MqttMetricsPayload {
    timestamp_ms: u64,
    pack_voltage_v: f32,
    pack_current_a: f32,
    power_w: f32,
    state_of_charge_pct: f32,
    state_of_health_pct: f32,
    pack_temperature_min_c: f32,
    pack_temperature_max_c: f32,
    serial_number: String,
    alarms: Alarms,
    limits: Limits,
}

impl From<&LiveData> for MqttMetricsPayload {
    fn from(data: &LiveData) -> Self {
        Self {
            timestamp_ms: data.timestamp_ms,
            pack_voltage_v: sanitize(data.pack_voltage_v),
            pack_current_a: sanitize(data.pack_current_a),
            power_w: sanitize(data.power_w()),
            state_of_charge_pct: sanitize(data.state_of_charge_pct),
            state_of_health_pct: sanitize(data.state_of_health_pct),
            pack_temperature_min_c: sanitize(data.pack_temperature_min_c),
            pack_temperature_max_c: sanitize(data.pack_temperature_max_c),
            serial_number: data.serial_number.clone(),
            alarms: data.alarms(),
            limits: data.limits.clone(),
        }
    }
}

pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    qos: QoS,
}

impl MqttPublisher {
    /// Builds the client and its event loop. The caller is responsible for
    /// polling the event loop (typically on its own spawned task) — rumqttc
    /// does nothing on the wire until that happens.
    pub fn new(options: MqttOptions, topic: impl Into<String>, qos: u8) -> (Self, rumqttc::EventLoop) {
        let (client, eventloop) = AsyncClient::new(options, 64);
        (
            Self {
                client,
                topic: topic.into(),
                qos: clamp_qos(qos),
            },
            eventloop,
        )
    }

    pub async fn publish_live_data(&self, data: &LiveData) -> Result<(), GatewayError> {
        let payload = MqttMetricsPayload::from(data);
        let json = serde_json::to_vec(&payload)
            .map_err(|e| GatewayError::IoFailure(format!("serialize MQTT payload: {e}")))?;
        self.client
            .publish(&self.topic, self.qos, false, json)
            .await
            .map_err(|e| GatewayError::IoFailure(e.to_string()))
    }

    /// Drains live-data events from the bus and publishes each one, until
    /// `cancel` fires or the channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<BusEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = rx.recv() => {
                    match event {
                        Some(BusEvent::BmsLiveData(data)) => {
                            if let Err(e) = self.publish_live_data(&data).await {
                                log::warn!("MQTT publish failed: {e}");
                            }
                        }
                        Some(_) => {}
                        None => return,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegisterLog;

    #[test]
    fn sanitizes_non_finite_floats_to_zero() {
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(1.5), 1.5);
    }

    #[test]
    fn payload_carries_sanitized_values_from_a_live_data_record() {
        let mut data = sample();
        data.pack_current_a = f32::NAN;
        let payload = MqttMetricsPayload::from(&data);
        assert_eq!(payload.pack_current_a, 0.0);
    }

    fn sample() -> LiveData {
        LiveData {
            timestamp_ms: 0,
            pack_voltage_v: 48.0,
            pack_current_a: 2.0,
            cell_voltages_mv: [3700; 16],
            min_cell_mv: Some(3700),
            max_cell_mv: Some(3700),
            imbalance_mv: 0,
            state_of_charge_pct: 80.0,
            state_of_health_pct: 99.0,
            pack_temperature_min_c: 20.0,
            pack_temperature_max_c: 25.0,
            mosfet_temperature_c: 22.0,
            balancing_bits: 0,
            cell_balancing: [0; 16],
            status_code: 0,
            raw_alarm_bits: 0,
            raw_warning_bits: 0,
            charge_cutoff_voltage_v: 58.0,
            discharge_cutoff_voltage_v: 42.0,
            limits: Limits {
                max_charge_current_a: 10.0,
                max_discharge_current_a: 20.0,
                charge_overcurrent_limit_a: 15.0,
                discharge_overcurrent_limit_a: 25.0,
            },
            cycle_count: 1,
            uptime_s: 10,
            serial_number: "TB-0001".to_string(),
            register_log: RegisterLog::new(),
        }
    }
}
