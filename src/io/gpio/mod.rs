use std::fmt::{Display, Formatter};
use std::sync::Arc;

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use strum_macros::{Display as StrumDisplay, EnumString, FromRepr};
use tokio::runtime::Handle;

use crate::io::exit::ExitRegistry;
use crate::io::gpio::driver::GpioDriver;

pub mod driver;
pub mod error;
pub mod handle;
pub mod validate;


pub use error::{ConfigError, PinError};
pub use handle::{Completion, PinHandle, PinState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, StrumDisplay, FromRepr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum Direction {
    In = 0,
    Out = 1,
}

impl Direction {
    /// The modes a mode-aware platform accepts for this direction.
    pub fn allowed_modes(&self) -> &'static [Mode] {
        match self {
            Direction::In => &[Mode::None, Mode::PullUp, Mode::PullDown],
            Direction::Out => &[Mode::None, Mode::Float, Mode::PushPull, Mode::OpenDrain],
        }
    }

    pub fn allows(&self, mode: Mode) -> bool {
        self.allowed_modes().contains(&mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, StrumDisplay, FromRepr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum Mode {
    None = 0,
    PullUp = 1,
    PullDown = 2,
    Float = 3,
    PushPull = 4,
    OpenDrain = 5,
}

/// How a platform treats the `mode` of a pin configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeProfile {
    /// Register-mapped GPIO with no electrical mode: mode is always `None`.
    Forced,
    /// Pull/drive capable GPIO: mode is checked against the direction.
    DirectionChecked,
    /// No rules known, the requested mode is passed through.
    Unchecked,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum Platform {
    Linux,
    Nuttx,
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        Platform::from(std::env::consts::OS.to_owned())
    }

    pub fn mode_profile(&self) -> ModeProfile {
        match self {
            Platform::Linux => ModeProfile::Forced,
            Platform::Nuttx => ModeProfile::DirectionChecked,
            Platform::Other(_) => ModeProfile::Unchecked,
        }
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "linux" => Platform::Linux,
            "nuttx" => Platform::Nuttx,
            _ => Platform::Other(lower),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Linux => write!(f, "linux"),
            Platform::Nuttx => write!(f, "nuttx"),
            Platform::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A validated pin configuration, with direction and mode resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfiguration {
    pin: i64,
    direction: Direction,
    mode: Mode,
}

impl PinConfiguration {
    pub fn new(pin: i64, direction: Direction, mode: Mode) -> Self {
        Self {
            pin,
            direction,
            mode,
        }
    }

    pub fn pin(&self) -> i64 {
        self.pin
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl Display for PinConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pin {} ({}, mode {})", self.pin, self.direction, self.mode)
    }
}

/// Typed builder for a raw pin record.
///
/// Converts into the same loose record that [`validate::validate`] accepts, so
/// both paths go through identical checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinOptions {
    pin: Option<i64>,
    direction: Option<Direction>,
    mode: Option<Mode>,
}

impl PinOptions {
    pub fn new(pin: i64) -> Self {
        Self {
            pin: Some(pin),
            ..Default::default()
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl From<PinOptions> for Value {
    fn from(options: PinOptions) -> Self {
        let mut record = Map::new();
        if let Some(pin) = options.pin {
            record.insert("pin".to_owned(), Value::from(pin));
        }
        if let Some(direction) = options.direction {
            record.insert("direction".to_owned(), Value::String(direction.to_string()));
        }
        if let Some(mode) = options.mode {
            record.insert("mode".to_owned(), Value::String(mode.to_string()));
        }
        Value::Object(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinValue {
    Bool(bool),
    Number(f64),
}

impl PinValue {
    /// Numbers are high unless they are zero or NaN.
    pub fn is_high(&self) -> bool {
        match self {
            PinValue::Bool(b) => *b,
            PinValue::Number(n) => *n != 0.0 && !n.is_nan(),
        }
    }
}

/// Anything that can be written to a pin.
pub trait IntoPinValue {
    fn into_pin_value(self) -> Result<PinValue, PinError>;
}

impl IntoPinValue for PinValue {
    fn into_pin_value(self) -> Result<PinValue, PinError> {
        Ok(self)
    }
}

impl IntoPinValue for bool {
    fn into_pin_value(self) -> Result<PinValue, PinError> {
        Ok(PinValue::Bool(self))
    }
}

macro_rules! numeric_pin_value {
    ($($t:ty),*) => {
        $(
            impl IntoPinValue for $t {
                fn into_pin_value(self) -> Result<PinValue, PinError> {
                    Ok(PinValue::Number(self as f64))
                }
            }
        )*
    };
}

numeric_pin_value!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl IntoPinValue for &Value {
    fn into_pin_value(self) -> Result<PinValue, PinError> {
        match self {
            Value::Bool(b) => Ok(PinValue::Bool(*b)),
            Value::Number(n) => n
                .as_f64()
                .map(PinValue::Number)
                .ok_or_else(|| PinError::InvalidArgumentType(format!("unrepresentable number {}", n))),
            other => Err(PinError::InvalidArgumentType(format!(
                "value should be a boolean or a number, got {}",
                other
            ))),
        }
    }
}

impl IntoPinValue for Value {
    fn into_pin_value(self) -> Result<PinValue, PinError> {
        (&self).into_pin_value()
    }
}

impl IntoPinValue for &str {
    fn into_pin_value(self) -> Result<PinValue, PinError> {
        Err(PinError::InvalidArgumentType(format!(
            "value should be a boolean or a number, got \"{}\"",
            self
        )))
    }
}

/// Opens pins against one driver on one platform.
pub struct Gpio<D: GpioDriver> {
    driver: Arc<D>,
    platform: Platform,
    runtime: Handle,
    registry: ExitRegistry,
}

impl<D: GpioDriver> Gpio<D> {
    pub fn new(driver: D, platform: Platform, runtime: Handle, registry: ExitRegistry) -> Self {
        Self {
            driver: Arc::new(driver),
            platform,
            runtime,
            registry,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn registry(&self) -> &ExitRegistry {
        &self.registry
    }

    /// Validates `raw` and starts opening the pin on the blocking pool.
    ///
    /// The handle is returned straight away in the `Opening` state. The
    /// completion resolves once the driver has answered, at which point the
    /// handle is either `Open` or, if the driver failed, `Closed`.
    pub fn open(&self, raw: impl Into<Value>) -> Result<(PinHandle<D>, Completion<()>), PinError> {
        let handle = self.prepare(raw.into())?;
        let completion = handle.dispatch_open();
        Ok((handle, completion))
    }

    /// Validates `raw` and opens the pin on the calling thread.
    pub fn open_sync(&self, raw: impl Into<Value>) -> Result<PinHandle<D>, PinError> {
        let handle = self.prepare(raw.into())?;
        handle.open_inline()?;
        Ok(handle)
    }

    fn prepare(&self, raw: Value) -> Result<PinHandle<D>, PinError> {
        let configuration = validate::validate(&raw, &self.platform)?;
        debug!("Opening {} on {}", configuration, self.platform);
        let handle = PinHandle::new(configuration, self.driver.clone(), self.runtime.clone());
        self.registry.register(handle.exit_entry());
        Ok(handle)
    }
}
