//! # Error Types
//!
//! Custom error types for Joybus Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Joybus Bridge
#[derive(Debug, Error)]
pub enum JoybusError {
    /// Command buffer framing errors
    #[error("Command buffer error: {0}")]
    CommandBuffer(String),

    /// Transport (DMA engine / bridge link) errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Input poll record carried a command id this core does not decode
    #[error("Unknown input poll command: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Channel number outside the active controller range
    #[error("Channel {0} is not an active controller port")]
    InvalidChannel(usize),

    /// Controller pak / rumble errors
    #[error("Controller pak error: {0}")]
    Pak(#[from] PakError),

    /// Serial bridge errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Controller pak error codes returned by the rumble protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PakError {
    /// No accessory answered on the channel
    #[error("no controller pak present")]
    NoPack,

    /// The accessory was swapped since the last access
    #[error("controller pak was replaced")]
    NewPack,

    /// Acknowledgement byte missing or wrong
    #[error("controller pak communication error")]
    CommunicationFault,

    /// Identity probe read back an unexpected accessory id
    #[error("wrong accessory device")]
    WrongDevice,

    /// Motor operation requested before initialization completed
    #[error("motor not initialized")]
    NotInitialized,
}

/// Result type alias for Joybus Bridge
pub type Result<T> = std::result::Result<T, JoybusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pak_error_converts_into_joybus_error() {
        let err: JoybusError = PakError::WrongDevice.into();
        assert!(matches!(err, JoybusError::Pak(PakError::WrongDevice)));
        assert_eq!(err.to_string(), "Controller pak error: wrong accessory device");
    }

    #[test]
    fn test_unknown_command_message() {
        let err = JoybusError::UnknownCommand(0x7A);
        assert_eq!(err.to_string(), "Unknown input poll command: 0x7A");
    }
}
