// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Publishes a compact binary projection of live data onto a CAN bus via
//! `socketcan`. Two frames per cycle: pack voltage/current, and state of
//! charge/health — enough for a vehicle dashboard or BMS supervisor that
//! can't parse JSON.

use socketcan::tokio::CanSocket;
use socketcan::{CanFrame, EmbeddedFrame, Id, StandardId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bus::BusEvent;
use crate::error::GatewayError;
use crate::model::LiveData;

/// CAN ID carrying pack voltage (mV, u16 LE) and current (cA signed, i16 LE).
pub const FRAME_ID_ELECTRICAL: u16 = 0x100;
/// CAN ID carrying state of charge and state of health, both as u8 percent.
pub const FRAME_ID_CAPACITY: u16 = 0x101;

fn electrical_frame(data: &LiveData) -> Result<CanFrame, GatewayError> {
    let voltage_mv = (data.pack_voltage_v * 1000.0).clamp(0.0, u16::MAX as f32) as u16;
    let current_ca = (data.pack_current_a * 100.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    let mut payload = [0u8; 4];
    payload[0..2].copy_from_slice(&voltage_mv.to_le_bytes());
    payload[2..4].copy_from_slice(&current_ca.to_le_bytes());

    let id = StandardId::new(FRAME_ID_ELECTRICAL)
        .ok_or_else(|| GatewayError::InvalidArgument("bad CAN id".to_string()))?;
    CanFrame::new(Id::Standard(id), &payload)
        .ok_or_else(|| GatewayError::InvalidSize("CAN payload too long".to_string()))
}

fn capacity_frame(data: &LiveData) -> Result<CanFrame, GatewayError> {
    let payload = [
        data.state_of_charge_pct.clamp(0.0, 100.0) as u8,
        data.state_of_health_pct.clamp(0.0, 100.0) as u8,
    ];
    let id = StandardId::new(FRAME_ID_CAPACITY)
        .ok_or_else(|| GatewayError::InvalidArgument("bad CAN id".to_string()))?;
    CanFrame::new(Id::Standard(id), &payload)
        .ok_or_else(|| GatewayError::InvalidSize("CAN payload too long".to_string()))
}

pub struct CanPublisher {
    socket: CanSocket,
}

impl CanPublisher {
    pub fn open(interface: &str) -> Result<Self, GatewayError> {
        let socket =
            CanSocket::open(interface).map_err(|e| GatewayError::IoFailure(e.to_string()))?;
        Ok(Self { socket })
    }

    pub async fn publish_live_data(&self, data: &LiveData) -> Result<(), GatewayError> {
        self.socket
            .write_frame(electrical_frame(data)?)
            .await
            .map_err(|e| GatewayError::IoFailure(e.to_string()))?;
        self.socket
            .write_frame(capacity_frame(data)?)
            .await
            .map_err(|e| GatewayError::IoFailure(e.to_string()))?;
        Ok(())
    }

    pub async fn run(&self, mut rx: mpsc::Receiver<BusEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = rx.recv() => {
                    match event {
                        Some(BusEvent::BmsLiveData(data)) => {
                            if let Err(e) = self.publish_live_data(&data).await {
                                log::warn!("CAN publish failed: {e}");
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
    use crate::model::{Limits, RegisterLog};

    fn sample(voltage: f32, current: f32) -> LiveData {
        LiveData {
            timestamp_ms: 0,
            pack_voltage_v: voltage,
            pack_current_a: current,
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

    #[test]
    fn electrical_frame_encodes_voltage_and_current() {
        let data = sample(48.0, 2.5);
        let frame = electrical_frame(&data).unwrap();
        let payload = frame.data();
        let voltage = u16::from_le_bytes([payload[0], payload[1]]);
        let current = i16::from_le_bytes([payload[2], payload[3]]);
        assert_eq!(voltage, 48_000);
        assert_eq!(current, 250);
    }

    #[test]
    fn capacity_frame_clamps_percentages() {
        let mut data = sample(48.0, 0.0);
        data.state_of_charge_pct = 150.0;
        let frame = capacity_frame(&data).unwrap();
        assert_eq!(frame.data()[0], 100);
    }
}
