use serde::Deserialize;
use serde_json::Value;
use serde_with::serde_as;
use serde_with::DurationSeconds;
use std::time::Duration;

use crate::io::gpio::Platform;

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct Config {
    /// Which platform's mode rules to validate against. Defaults to the host OS.
    #[serde(default)]
    platform: Option<Platform>,
    #[serde(default)]
    driver: DriverKind,
    /// How often (in seconds) input pins are read and logged.
    #[serde_as(as = "DurationSeconds")]
    #[serde(default = "default_poll_interval")]
    poll_interval_secs: Duration,
    /// Raw pin records, validated when they are opened.
    #[serde(default)]
    pins: Vec<Value>,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

impl Config {
    pub fn get_platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }

    pub fn get_driver(&self) -> &DriverKind {
        &self.driver
    }

    pub fn get_poll_interval(&self) -> &Duration {
        &self.poll_interval_secs
    }

    pub fn get_pins(&self) -> &[Value] {
        &self.pins
    }
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// The `/sys/class/gpio` interface, unix only.
    SysFs,
    #[default]
    Dummy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::gpio::validate::validate;
    use crate::io::gpio::{Direction, Mode, PinConfiguration};
    use std::fs;

    #[test]
    fn test_serialize() {
        let config_str = fs::read_to_string("test/testconfig.toml")
            .expect("Unable to read test config file. Is it missing?");
        let config: Config = toml::from_str(&config_str).expect("Error reading test config file");
        assert_eq!(config.get_platform(), Platform::Nuttx);
        assert_eq!(config.driver, DriverKind::SysFs);
        assert_eq!(config.poll_interval_secs, Duration::from_secs(2));
        assert_eq!(config.pins.len(), 3);

        let platform = config.get_platform();
        assert_eq!(
            validate(&config.pins[0], &platform).unwrap(),
            PinConfiguration::new(4, Direction::In, Mode::PullUp)
        );
        assert_eq!(
            validate(&config.pins[1], &platform).unwrap(),
            PinConfiguration::new(17, Direction::Out, Mode::None)
        );
        assert!(validate(&config.pins[2], &platform).is_err(), "An input cannot be push-pull");
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").expect("Empty config should use defaults");
        assert_eq!(config.get_platform(), Platform::current());
        assert_eq!(config.driver, DriverKind::Dummy);
        assert_eq!(config.poll_interval_secs, Duration::from_secs(5));
        assert!(config.get_pins().is_empty());
    }
}
