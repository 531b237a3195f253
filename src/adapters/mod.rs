// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Consumer adapters: each subscribes to the event bus and forwards
//! decoded data onward to one external sink.

pub mod can;
pub mod diagnostic_log;
pub mod mqtt;

pub use can::CanPublisher;
pub use diagnostic_log::DiagnosticLogSubscriber;
pub use mqtt::MqttPublisher;
