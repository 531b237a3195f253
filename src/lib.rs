// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! # tinybms-gateway
//!
//! A serial gateway between a TinyBMS battery management controller and
//! MQTT/CAN/diagnostic-log consumers. Polls the controller's register set
//! on a fixed cycle, decodes it into a typed `LiveData` snapshot, and fans
//! that out over a bounded event bus while a soft watchdog and a
//! compressed, persisted diagnostic ring track the gateway's own health.
//!
//! ## Usage
//!
//! ```no_run
//! use tinybms_gateway::{config::GatewayConfig, gateway::Gateway};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), tinybms_gateway::error::GatewayError> {
//! let gateway = Gateway::new(GatewayConfig::default())?;
//! let cancel = CancellationToken::new();
//! gateway.run(cancel).await
//! # }
//! ```

pub mod adapters;
pub mod bus;
pub mod clock;
pub mod codec;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod gateway;
pub mod link;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod poller;
pub mod registers;
pub mod snapshot;
pub mod util;
pub mod watchdog;

pub use crate::config::GatewayConfig;
pub use crate::error::GatewayError;
pub use crate::gateway::Gateway;
pub use crate::logging::init_logger;
pub use crate::model::LiveData;
