use log::{debug, warn};
use sysfs_gpio::{Direction as SysFsDirection, Error, Pin};

use crate::io::gpio::driver::{DriverError, GpioDriver};
use crate::io::gpio::{Direction, Mode, PinConfiguration};

/// Driver for the legacy `/sys/class/gpio` interface.
#[derive(Debug, Default)]
pub struct SysFsDriver;

impl GpioDriver for SysFsDriver {
    type Session = Pin;

    fn open(&self, configuration: &PinConfiguration) -> Result<Pin, DriverError> {
        let pin_id = u64::try_from(configuration.pin())
            .map_err(|_| DriverError::Other(format!("No such pin {}", configuration.pin())))?;
        if configuration.mode() != Mode::None {
            warn!("sysfs cannot apply mode {} to pin {}, ignoring it", configuration.mode(), pin_id);
        }
        debug!("Setting up pin {}", pin_id);
        let pin = Pin::new(pin_id);
        pin.export()?;

        let direction_before = pin.get_direction()?;
        let already_at_direction = match direction_before {
            SysFsDirection::In => configuration.direction() == Direction::In,
            SysFsDirection::Out | SysFsDirection::High | SysFsDirection::Low => {
                configuration.direction() == Direction::Out
            }
        };
        if !already_at_direction {
            debug!("Actually having to set direction of pin {}", pin_id);
            pin.set_direction(match configuration.direction() {
                Direction::In => SysFsDirection::In,
                Direction::Out => SysFsDirection::Out,
            })?;
        }
        Ok(pin)
    }

    fn write(&self, session: &mut Pin, value: bool) -> Result<(), DriverError> {
        session.set_value(u8::from(value))?;
        Ok(())
    }

    fn read(&self, session: &mut Pin) -> Result<bool, DriverError> {
        match session.get_value()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DriverError::Other(format!(
                "Pin {} reported value {}",
                session.get_pin_num(),
                other
            ))),
        }
    }

    fn close(&self, session: &mut Pin) -> Result<(), DriverError> {
        session.unexport()?;
        Ok(())
    }
}

impl From<Error> for DriverError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => DriverError::Io(err),
            Error::Unexpected(s) => DriverError::Other(s),
            Error::InvalidPath(s) => DriverError::Other(s),
            Error::Unsupported(s) => DriverError::Other(s),
        }
    }
}
