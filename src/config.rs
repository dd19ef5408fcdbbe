//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::bus::virtual_pif::{VirtualDevice, VirtualPak};
use crate::controller::mapper::{RemapThresholds, GCN_C_STICK_THRESHOLD, GCN_TRIGGER_THRESHOLD};
use crate::error::{JoybusError, Result};
use crate::pif::protocol::MAX_CONTROLLERS;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub virtual_bus: VirtualBusConfig,
}

/// Transport and channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    /// `"virtual"` or `"serial"`
    #[serde(default = "default_transport")]
    pub transport: String,

    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_max_controllers")]
    pub max_controllers: usize,
}

/// Polling and remap configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: u32,

    /// GameCube short poll analog mode (0-7)
    #[serde(default = "default_analog_mode")]
    pub analog_mode: u8,

    #[serde(default = "default_c_stick_threshold")]
    pub c_stick_threshold: u8,

    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: u8,
}

/// Pad record output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// `"jsonl"` (one JSON object per line on stdout) or `"log"`
    #[serde(default = "default_output_format")]
    pub format: String,

    /// Emit pad records every N polls
    #[serde(default = "default_log_interval_polls")]
    pub log_interval_polls: u64,
}

/// Devices attached to the emulated bus
#[derive(Debug, Deserialize, Clone)]
pub struct VirtualBusConfig {
    /// One entry per channel: `"n64"`, `"n64_rumble"`, `"n64_mempak"`, `"gcn"` or `"none"`
    #[serde(default = "default_virtual_devices")]
    pub devices: Vec<String>,
}

// Default value functions
fn default_transport() -> String { "virtual".to_string() }
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_max_controllers() -> usize { MAX_CONTROLLERS }

fn default_poll_rate_hz() -> u32 { 60 }
fn default_analog_mode() -> u8 { 3 }
fn default_c_stick_threshold() -> u8 { GCN_C_STICK_THRESHOLD }
fn default_trigger_threshold() -> u8 { GCN_TRIGGER_THRESHOLD }

fn default_output_format() -> String { "jsonl".to_string() }
fn default_log_interval_polls() -> u64 { 60 }

fn default_virtual_devices() -> Vec<String> {
    vec!["n64_rumble".to_string(), "gcn".to_string()]
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            max_controllers: default_max_controllers(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            poll_rate_hz: default_poll_rate_hz(),
            analog_mode: default_analog_mode(),
            c_stick_threshold: default_c_stick_threshold(),
            trigger_threshold: default_trigger_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            log_interval_polls: default_log_interval_polls(),
        }
    }
}

impl Default for VirtualBusConfig {
    fn default() -> Self {
        Self {
            devices: default_virtual_devices(),
        }
    }
}

impl InputConfig {
    pub fn remap_thresholds(&self) -> RemapThresholds {
        RemapThresholds {
            c_stick: self.c_stick_threshold,
            trigger: self.trigger_threshold,
        }
    }
}

impl VirtualBusConfig {
    /// Parse one device name
    pub fn parse_device(name: &str) -> Option<VirtualDevice> {
        match name {
            "none" => Some(VirtualDevice::None),
            "n64" => Some(VirtualDevice::n64(VirtualPak::None)),
            "n64_rumble" => Some(VirtualDevice::n64(VirtualPak::Rumble { probe: 0, motor: false })),
            "n64_mempak" => Some(VirtualDevice::n64(VirtualPak::Memory)),
            "gcn" => Some(VirtualDevice::gcn()),
            _ => None,
        }
    }

    /// Devices in channel order; unknown names become empty channels.
    pub fn devices(&self) -> Vec<VirtualDevice> {
        self.devices
            .iter()
            .map(|name| Self::parse_device(name).unwrap_or_default())
            .collect()
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joybus_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !["virtual", "serial"].contains(&self.bus.transport.as_str()) {
            return Err(JoybusError::Config(
                toml::de::Error::custom("transport must be 'virtual' or 'serial'")
            ));
        }

        if self.bus.transport == "serial" && self.bus.serial_port.is_empty() {
            return Err(JoybusError::Config(
                toml::de::Error::custom("serial_port cannot be empty with the serial transport")
            ));
        }

        if ![9600, 57600, 115200, 230400, 460800, 921600, 1000000, 2000000].contains(&self.bus.baud_rate) {
            return Err(JoybusError::Config(
                toml::de::Error::custom("baud_rate must be one of: 9600, 57600, 115200, 230400, 460800, 921600, 1000000, 2000000")
            ));
        }

        if self.bus.max_controllers == 0 || self.bus.max_controllers > MAX_CONTROLLERS {
            return Err(JoybusError::Config(
                toml::de::Error::custom(format!("max_controllers must be between 1 and {}", MAX_CONTROLLERS))
            ));
        }

        if self.input.poll_rate_hz == 0 || self.input.poll_rate_hz > 1000 {
            return Err(JoybusError::Config(
                toml::de::Error::custom("poll_rate_hz must be between 1 and 1000")
            ));
        }

        if self.input.analog_mode > 7 {
            return Err(JoybusError::Config(
                toml::de::Error::custom("analog_mode must be between 0 and 7")
            ));
        }

        if self.input.c_stick_threshold > 127 {
            return Err(JoybusError::Config(
                toml::de::Error::custom("c_stick_threshold must be between 0 and 127")
            ));
        }

        if !["jsonl", "log"].contains(&self.output.format.as_str()) {
            return Err(JoybusError::Config(
                toml::de::Error::custom("output format must be 'jsonl' or 'log'")
            ));
        }

        if self.output.log_interval_polls == 0 {
            return Err(JoybusError::Config(
                toml::de::Error::custom("log_interval_polls must be greater than 0")
            ));
        }

        if self.virtual_bus.devices.len() > MAX_CONTROLLERS {
            return Err(JoybusError::Config(
                toml::de::Error::custom(format!("virtual_bus lists more than {} devices", MAX_CONTROLLERS))
            ));
        }

        for name in &self.virtual_bus.devices {
            if VirtualBusConfig::parse_device(name).is_none() {
                return Err(JoybusError::Config(
                    toml::de::Error::custom(format!("unknown virtual device '{}'", name))
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config {
            bus: BusConfig {
                transport: default_transport(),
                serial_port: default_serial_port(),
                baud_rate: default_baud_rate(),
                max_controllers: default_max_controllers(),
            },
            input: InputConfig {
                poll_rate_hz: default_poll_rate_hz(),
                analog_mode: default_analog_mode(),
                c_stick_threshold: default_c_stick_threshold(),
                trigger_threshold: default_trigger_threshold(),
            },
            output: OutputConfig {
                format: default_output_format(),
                log_interval_polls: default_log_interval_polls(),
            },
            virtual_bus: VirtualBusConfig {
                devices: default_virtual_devices(),
            },
        }
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[bus]
transport = "serial"
serial_port = "/dev/ttyUSB0"
max_controllers = 2

[input]
analog_mode = 0

[output]
format = "log"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.bus.serial_port, "/dev/ttyUSB0");
        assert_eq!(config.bus.max_controllers, 2);
        assert_eq!(config.input.analog_mode, 0);
        assert_eq!(config.input.poll_rate_hz, default_poll_rate_hz());
        assert_eq!(config.virtual_bus.devices, default_virtual_devices());
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.bus.transport, "virtual");
        assert_eq!(config.output.format, "jsonl");
    }

    #[test]
    fn test_load_invalid_toml() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[bus\ntransport = ").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(Config::load(temp_file.path()), Err(JoybusError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(Config::load("/nonexistent/joybus.toml"), Err(JoybusError::Io(_))));
    }

    #[test]
    fn test_invalid_transport() {
        let mut config = create_valid_config();
        config.bus.transport = "usb".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_serial_port_with_serial_transport() {
        let mut config = create_valid_config();
        config.bus.serial_port = String::new();
        assert!(config.validate().is_ok());

        config.bus.transport = "serial".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.bus.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_controllers_range() {
        let mut config = create_valid_config();
        config.bus.max_controllers = 0;
        assert!(config.validate().is_err());
        config.bus.max_controllers = 5;
        assert!(config.validate().is_err());
        config.bus.max_controllers = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_poll_rate_range() {
        let mut config = create_valid_config();
        config.input.poll_rate_hz = 0;
        assert!(config.validate().is_err());
        config.input.poll_rate_hz = 1001;
        assert!(config.validate().is_err());
        config.input.poll_rate_hz = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_analog_mode_range() {
        for mode in 0..=7 {
            let mut config = create_valid_config();
            config.input.analog_mode = mode;
            assert!(config.validate().is_ok(), "Analog mode {} should be valid", mode);
        }

        let mut config = create_valid_config();
        config.input.analog_mode = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_c_stick_threshold_too_high() {
        let mut config = create_valid_config();
        config.input.c_stick_threshold = 128;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_output_format() {
        let mut config = create_valid_config();
        config.output.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_interval_zero() {
        let mut config = create_valid_config();
        config.output.log_interval_polls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_virtual_device() {
        let mut config = create_valid_config();
        config.virtual_bus.devices = vec!["n64".to_string(), "wavebird".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_too_many_virtual_devices() {
        let mut config = create_valid_config();
        config.virtual_bus.devices = vec!["none".to_string(); 5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_virtual_devices_parse() {
        let mut config = create_valid_config();
        config.virtual_bus.devices = vec!["n64".to_string(), "gcn".to_string(), "none".to_string()];
        let devices = config.virtual_bus.devices();
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0], VirtualDevice::n64(VirtualPak::None));
        assert_eq!(devices[1], VirtualDevice::gcn());
        assert_eq!(devices[2], VirtualDevice::None);
    }

    #[test]
    fn test_remap_thresholds() {
        let config = create_valid_config();
        assert_eq!(config.input.remap_thresholds(), RemapThresholds::default());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_transport(), "virtual");
        assert_eq!(default_serial_port(), "/dev/ttyACM0");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_max_controllers(), 4);
        assert_eq!(default_poll_rate_hz(), 60);
        assert_eq!(default_analog_mode(), 3);
        assert_eq!(default_c_stick_threshold(), 38);
        assert_eq!(default_trigger_threshold(), 100);
        assert_eq!(default_output_format(), "jsonl");
        assert_eq!(default_log_interval_polls(), 60);
    }
}
