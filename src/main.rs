//! # Joybus Bridge
//!
//! Poll N64 and GameCube controllers through one PIF command buffer.
//!
//! This application scans the controller ports, initializes rumble, then
//! polls every assigned port at a fixed rate and reports the normalized pad
//! records as JSON lines or log messages.

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use joybus_bridge::bus::poll::{poll_controllers, PollOutcome};
use joybus_bridge::bus::serial::SerialTransport;
use joybus_bridge::bus::status::query_status;
use joybus_bridge::bus::transport::Transport;
use joybus_bridge::bus::virtual_pif::VirtualPif;
use joybus_bridge::bus::BusState;
use joybus_bridge::config::Config;
use joybus_bridge::controller::mapper::ControllerPad;
use joybus_bridge::pif::protocol::CONT_CMD_REQUEST_STATUS;
use joybus_bridge::rumble::motor::Motor;

/// Configuration file read when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// One line of pad output
#[derive(Debug, Serialize)]
struct PollRecord<'a> {
    poll: u64,
    #[serde(flatten)]
    outcome: PollOutcome,
    pads: &'a [ControllerPad],
}

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load {}", path)),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH))
        }
        None => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

fn open_transport(config: &Config) -> Result<Box<dyn Transport>> {
    if config.bus.transport == "serial" {
        let transport = SerialTransport::open(&config.bus.serial_port, config.bus.baud_rate)?;
        return Ok(Box::new(transport));
    }

    let mut pif = VirtualPif::new();
    for (channel, device) in config.virtual_bus.devices().into_iter().enumerate() {
        pif.set_device(channel, device);
    }
    info!("Using virtual PIF with {} devices", config.virtual_bus.devices.len());
    Ok(Box::new(pif))
}

/// Rescan every port, hand out player numbers and prepare the motors
fn scan_ports(transport: &mut dyn Transport, bus: &mut BusState) -> Result<Vec<Motor>> {
    bus.begin_status_polling();
    let report = query_status(transport, bus, CONT_CMD_REQUEST_STATUS);
    bus.end_status_polling();
    let report = report?;

    let mut next_player = 0u8;
    let mut motors = Vec::new();
    for channel in 0..bus.max_controllers() {
        if !report.is_plugged(channel) {
            continue;
        }
        bus.assign_player(channel, Some(next_player));
        next_player += 1;

        let mut motor = Motor::new(channel);
        match motor.init(transport, bus) {
            Ok(()) => motors.push(motor),
            Err(e) => debug!("Port {}: no rumble ({})", channel, e),
        }
    }

    info!("Scan found {} controllers, {} with rumble", next_player, motors.len());
    Ok(motors)
}

/// Main entry point for Joybus Bridge application
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (first argument, `config/default.toml` or defaults)
///    - Open the virtual PIF or the serial bridge
///    - Scan ports and initialize rumble
///
/// 2. **Main Loop**
///    - Poll every assigned port at `poll_rate_hz`
///    - Rescan when a controller stops answering
///    - Report pad records every `log_interval_polls` polls
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop every motor
///    - Log total poll count
///
/// # Errors
///
/// Returns error if:
/// - The configuration is invalid
/// - The serial bridge cannot be opened
/// - The first port scan fails
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("Joybus Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let mut transport = open_transport(&config)?;

    let mut bus = BusState::new(config.bus.max_controllers)
        .with_analog_mode(config.input.analog_mode)
        .with_thresholds(config.input.remap_thresholds());

    let mut motors = scan_ports(transport.as_mut(), &mut bus)?;

    let period_us = 1_000_000 / config.input.poll_rate_hz as u64;
    let mut poll_interval = interval(Duration::from_micros(period_us));

    info!("Starting poll loop at {}Hz", config.input.poll_rate_hz);
    info!("Press Ctrl+C to exit");

    let mut poll_count: u64 = 0;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                let mut rescan_requested = false;
                let outcome = {
                    let mut trigger = || rescan_requested = true;
                    poll_controllers(transport.as_mut(), &mut bus, &mut trigger)
                };

                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Poll failed: {}", e);
                        continue;
                    }
                };
                poll_count += 1;

                if rescan_requested {
                    match scan_ports(transport.as_mut(), &mut bus) {
                        Ok(found) => motors = found,
                        Err(e) => warn!("Rescan failed: {}", e),
                    }
                }

                if poll_count % config.output.log_interval_polls == 0 {
                    report(&config, poll_count, outcome, bus.pads())?;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                for motor in &mut motors {
                    if let Err(e) = motor.stop(transport.as_mut(), &mut bus) {
                        debug!("Port {}: failed to stop motor: {}", motor.channel(), e);
                    }
                }
                info!("Total polls: {}", poll_count);
                break;
            }
        }
    }

    Ok(())
}

fn report(config: &Config, poll: u64, outcome: PollOutcome, pads: &[ControllerPad]) -> Result<()> {
    if config.output.format == "jsonl" {
        let record = PollRecord { poll, outcome, pads };
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    for (port, pad) in pads.iter().enumerate() {
        info!(
            "Poll {} port {}: buttons 0x{:04X} stick ({}, {}) errno {:?}",
            poll, port, pad.button.bits(), pad.stick.x, pad.stick.y, pad.errno
        );
    }
    Ok(())
}
