use thiserror::Error;

use crate::io::gpio::PinConfiguration;

pub mod dummy;

#[cfg(target_family = "unix")]
pub mod sysfs_gpio;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// The platform driver a [`crate::io::gpio::PinHandle`] delegates to.
///
/// Calls block the calling thread. Handles run them on tokio's blocking pool
/// for their asynchronous operations.
pub trait GpioDriver: Send + Sync + 'static {
    /// The driver's representation of one opened pin.
    type Session: Send + 'static;

    fn open(&self, configuration: &PinConfiguration) -> Result<Self::Session, DriverError>;

    fn write(&self, session: &mut Self::Session, value: bool) -> Result<(), DriverError>;

    fn read(&self, session: &mut Self::Session) -> Result<bool, DriverError>;

    fn close(&self, session: &mut Self::Session) -> Result<(), DriverError>;
}
