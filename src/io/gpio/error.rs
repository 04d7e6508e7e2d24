use thiserror::Error;

use crate::io::gpio::driver::DriverError;

/// Rejections produced while validating a raw pin record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bad arguments - {0}")]
    InvalidArgumentType(String),
    #[error("bad configuration - pin is mandatory and must be a number")]
    MissingOrInvalidPin,
    #[error("bad configuration - direction should be in or out, got {0}")]
    InvalidDirection(String),
    #[error("bad configuration - mode should be none, pullup or pulldown for an input, got {0}")]
    InvalidModeForInput(String),
    #[error("bad configuration - mode should be none, float, pushpull or opendrain for an output, got {0}")]
    InvalidModeForOutput(String),
}

#[derive(Debug, Error)]
pub enum PinError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad arguments - {0}")]
    InvalidArgumentType(String),
    #[error("GPIO pin is not opened")]
    NotOpen,
    #[error("driver failure: {0}")]
    Driver(#[from] DriverError),
}
