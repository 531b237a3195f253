// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

use clap::{Parser, Subcommand};
use tinybms_gateway::codec::vendor;
use tinybms_gateway::config::{Dialect, GatewayConfig, MqttConfig};
use tinybms_gateway::link::{CollectionMode, LinkDriver};
use tinybms_gateway::logging::{init_logger, log_error, log_info};
use tinybms_gateway::parser::decode_live_data;
use tinybms_gateway::{codec, clock, GatewayError};
use tinybms_gateway::gateway::Gateway;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "tinybms-gatewayd")]
#[command(about = "Serial gateway for a TinyBMS battery management controller")]
struct Cli {
    #[arg(long, default_value = "/dev/ttyUSB0", global = true)]
    port: String,

    #[arg(long, default_value_t = 115_200, global = true)]
    baud_rate: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the gateway until interrupted: poller, watchdog, diagnostic
    /// persister, and whichever consumer adapters are configured.
    Run {
        #[arg(long, default_value_t = 250)]
        poll_interval_ms: u64,
        #[arg(long)]
        mqtt_host: Option<String>,
        #[arg(long, default_value_t = 1883)]
        mqtt_port: u16,
        #[arg(long)]
        can_interface: Option<String>,
        #[arg(long)]
        diagnostic_log: Option<std::path::PathBuf>,
    },
    /// Issues a single poll cycle and prints the decoded live data as JSON.
    Poll,
    /// Reads one register by address (decimal or 0x-prefixed hex).
    ReadRegister { address: String },
    /// Writes one register. Only the restart command register accepts this.
    WriteRegister { address: String, value: String },
}

fn parse_u16(s: &str) -> Result<u16, GatewayError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse::<u16>()
    }
    .map_err(|e| GatewayError::InvalidArgument(format!("bad numeric argument '{s}': {e}")))
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            poll_interval_ms,
            mqtt_host,
            mqtt_port,
            can_interface,
            diagnostic_log,
        } => {
            let config = GatewayConfig {
                serial_port: cli.port,
                baud_rate: cli.baud_rate,
                dialect: Dialect::Vendor,
                modbus_slave_id: 1,
                poll_interval_ms,
                mqtt: mqtt_host.map(|host| MqttConfig {
                    host,
                    port: mqtt_port,
                    ..MqttConfig::default()
                }),
                can_interface,
                diagnostic_log_path: diagnostic_log,
            };
            let gateway = Gateway::new(config)?;
            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log_info("received shutdown signal");
                    shutdown.cancel();
                }
            });
            gateway.run(cancel).await?;
        }
        Commands::Poll => {
            let mut link = LinkDriver::open(&cli.port, cli.baud_rate, CollectionMode::Polled)?;
            let request = vendor::build_poll_request()?;
            let response = link.send_and_await(&request).await?;
            let words = codec::parse_poll_response(&response)?;
            let live = decode_live_data(&words, clock::now_ms())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&live)
                    .map_err(|e| GatewayError::IoFailure(e.to_string()))?
            );
        }
        Commands::ReadRegister { address } => {
            let address = parse_u16(&address)?;
            let mut link = LinkDriver::open(&cli.port, cli.baud_rate, CollectionMode::Polled)?;
            let frame = vendor::build_read_single(address)?;
            let response = link.send_and_await(&frame).await?;
            if response.len() < 5 {
                log_error("read-single response too short");
                return Err(GatewayError::InvalidSize(
                    "read-single response too short".to_string(),
                ));
            }
            let value = u16::from_le_bytes([response[3], response[4]]);
            println!("{address:#06x} = {value:#06x} ({value})");
        }
        Commands::WriteRegister { address, value } => {
            let address = parse_u16(&address)?;
            let value = parse_u16(&value)?;
            let entry = tinybms_gateway::registers::find(address)
                .ok_or_else(|| GatewayError::NotFound(format!("register {address:#06x}")))?;
            if !entry.writable {
                return Err(GatewayError::NotAllowed(address));
            }
            let mut link = LinkDriver::open(&cli.port, cli.baud_rate, CollectionMode::Polled)?;
            let frame = vendor::build_write_single(address, value)?;
            let response = link.send_and_await(&frame).await?;
            if response.len() >= 2 && response[1] == tinybms_gateway::constants::OP_NACK {
                return Err(GatewayError::InvalidState(
                    "controller rejected the write".to_string(),
                ));
            }
            let verify_frame = vendor::build_read_single(address)?;
            let verify_response = link.send_and_await(&verify_frame).await?;
            if verify_response.len() < 5 {
                return Err(GatewayError::InvalidSize(
                    "verification read response too short".to_string(),
                ));
            }
            let confirmed = u16::from_le_bytes([verify_response[3], verify_response[4]]);
            log_info(&format!(
                "wrote {value:#06x} to register {address:#06x}, confirmed read back {confirmed:#06x}"
            ));
        }
    }

    Ok(())
}
