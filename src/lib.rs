//! Validated, single-owner access to GPIO pins.
//!
//! Pins are opened through [`Gpio`], which checks the requested direction and
//! mode against the platform's rules before handing the configuration to a
//! [`GpioDriver`]. Every handle is tracked by an [`ExitRegistry`] so that pins
//! still open at controlled termination get closed.

pub mod config;
pub mod io;
pub mod logging;

pub use io::exit::{ExitRegistry, ShutdownReport};
pub use io::gpio::driver::{DriverError, GpioDriver};
pub use io::gpio::{
    Completion, ConfigError, Direction, Gpio, IntoPinValue, Mode, PinConfiguration, PinError, PinHandle,
    PinOptions, PinState, PinValue, Platform,
};
