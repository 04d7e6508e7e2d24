use log::debug;
use serde_json::Value;

use crate::io::gpio::error::ConfigError;
use crate::io::gpio::{Direction, Mode, ModeProfile, PinConfiguration, Platform};

/// Checks a raw pin record against the rules of `platform` and resolves the
/// direction and mode defaults.
///
/// A missing (or null) direction means [`Direction::Out`]. On a
/// [`ModeProfile::Forced`] platform the mode is always [`Mode::None`], even when
/// the caller asked for something else.
///
/// The pin must be a whole number that fits in an `i64`. Fractional numbers
/// such as `4.5` and integers beyond the `i64` range are rejected here with
/// [`ConfigError::MissingOrInvalidPin`] rather than handed to the driver, since
/// no driver can address them. Any pin inside that range, negative ones
/// included, is left for the driver to accept or refuse.
pub fn validate(raw: &Value, platform: &Platform) -> Result<PinConfiguration, ConfigError> {
    let record = raw.as_object().ok_or_else(|| {
        ConfigError::InvalidArgumentType(format!("configuration should be a record, got {}", raw))
    })?;

    let pin = present(record.get("pin"))
        .and_then(as_pin)
        .ok_or(ConfigError::MissingOrInvalidPin)?;

    let direction = match present(record.get("direction")) {
        Some(value) => {
            parse_direction(value).ok_or_else(|| ConfigError::InvalidDirection(value.to_string()))?
        }
        None => Direction::Out,
    };

    let mode = resolve_mode(present(record.get("mode")), direction, platform)?;

    Ok(PinConfiguration::new(pin, direction, mode))
}

fn resolve_mode(requested: Option<&Value>, direction: Direction, platform: &Platform) -> Result<Mode, ConfigError> {
    match platform.mode_profile() {
        ModeProfile::Forced => {
            if let Some(value) = requested {
                debug!("Overriding mode {} with none on {}", value, platform);
            }
            Ok(Mode::None)
        }
        ModeProfile::DirectionChecked => {
            let Some(value) = requested else {
                return Ok(Mode::None);
            };
            match parse_mode(value) {
                Some(mode) if direction.allows(mode) => Ok(mode),
                _ => Err(match direction {
                    Direction::In => ConfigError::InvalidModeForInput(value.to_string()),
                    Direction::Out => ConfigError::InvalidModeForOutput(value.to_string()),
                }),
            }
        }
        ModeProfile::Unchecked => match requested {
            Some(value) => parse_mode(value)
                .ok_or_else(|| ConfigError::InvalidArgumentType(format!("unrecognised mode {}", value))),
            None => Ok(Mode::None),
        },
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn as_pin(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Driver constants are accepted as well as names.
fn constant_index(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

fn parse_direction(value: &Value) -> Option<Direction> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(_) => constant_index(value).and_then(Direction::from_repr),
        _ => None,
    }
}

fn parse_mode(value: &Value) -> Option<Mode> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(_) => constant_index(value).and_then(Mode::from_repr),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::io::gpio::PinOptions;

    const ALL_MODES: [Mode; 6] = [
        Mode::None,
        Mode::PullUp,
        Mode::PullDown,
        Mode::Float,
        Mode::PushPull,
        Mode::OpenDrain,
    ];

    #[test]
    fn test_defaults() {
        let config = validate(&json!({"pin": 4}), &Platform::Nuttx).unwrap();
        assert_eq!(config, PinConfiguration::new(4, Direction::Out, Mode::None));

        let config = validate(&json!({"pin": 4, "direction": "in"}), &Platform::Nuttx).unwrap();
        assert_eq!(config, PinConfiguration::new(4, Direction::In, Mode::None));

        let config = validate(&json!({"pin": 7, "direction": null, "mode": null}), &Platform::Linux).unwrap();
        assert_eq!(config, PinConfiguration::new(7, Direction::Out, Mode::None));
    }

    #[test]
    fn test_not_a_record() {
        for raw in [json!(4), json!("pin 4"), json!([4]), Value::Null, json!(true)] {
            let result = validate(&raw, &Platform::Linux);
            assert!(
                matches!(result, Err(ConfigError::InvalidArgumentType(_))),
                "Expected {} to be rejected as the wrong type, got {:?}",
                raw,
                result
            );
        }
    }

    #[test]
    fn test_missing_or_invalid_pin() {
        let bad = [
            json!({}),
            json!({"direction": "in"}),
            json!({"pin": null}),
            json!({"pin": "4"}),
            json!({"pin": true}),
            json!({"pin": 4.5}),
            json!({"pin": 1e20}),
            json!({"pin": 18446744073709551615u64}),
            json!({"pin": [4]}),
        ];
        for raw in bad {
            assert_eq!(
                validate(&raw, &Platform::Nuttx),
                Err(ConfigError::MissingOrInvalidPin),
                "Expected {} to be missing a pin",
                raw
            );
        }
        assert_eq!(validate(&json!({"pin": 4.0}), &Platform::Nuttx).unwrap().pin(), 4);
        assert_eq!(validate(&json!({"pin": -1}), &Platform::Nuttx).unwrap().pin(), -1);
    }

    #[test]
    fn test_invalid_direction() {
        for direction in [json!("up"), json!(2), json!(-1), json!(true), json!({"in": 1})] {
            let result = validate(&json!({"pin": 1, "direction": direction}), &Platform::Linux);
            assert!(
                matches!(result, Err(ConfigError::InvalidDirection(_))),
                "Expected direction {} to be rejected, got {:?}",
                direction,
                result
            );
        }
    }

    #[test]
    fn test_direction_constants_and_names() {
        let config = validate(&json!({"pin": 1, "direction": 0}), &Platform::Linux).unwrap();
        assert_eq!(config.direction(), Direction::In);
        let config = validate(&json!({"pin": 1, "direction": "OUT"}), &Platform::Linux).unwrap();
        assert_eq!(config.direction(), Direction::Out);
    }

    #[test]
    fn test_forced_profile_overrides_mode() {
        let requested = [json!("pullup"), json!("opendrain"), json!(3), json!("nonsense"), json!(99)];
        for direction in ["in", "out"] {
            for mode in &requested {
                let config = validate(
                    &json!({"pin": 2, "direction": direction, "mode": mode}),
                    &Platform::Linux,
                )
                .unwrap();
                assert_eq!(config.mode(), Mode::None, "Mode {} should have been overridden", mode);
            }
        }
    }

    #[test]
    fn test_input_modes() {
        for mode in ALL_MODES {
            let raw = json!({"pin": 3, "direction": "in", "mode": mode.to_string()});
            let result = validate(&raw, &Platform::Nuttx);
            if matches!(mode, Mode::None | Mode::PullUp | Mode::PullDown) {
                assert_eq!(result.unwrap().mode(), mode);
            } else {
                assert_eq!(result, Err(ConfigError::InvalidModeForInput(json!(mode.to_string()).to_string())));
            }
        }
    }

    #[test]
    fn test_output_modes() {
        for mode in ALL_MODES {
            let raw = json!({"pin": 3, "direction": "out", "mode": mode as u8});
            let result = validate(&raw, &Platform::Nuttx);
            if matches!(mode, Mode::PullUp | Mode::PullDown) {
                assert!(matches!(result, Err(ConfigError::InvalidModeForOutput(_))));
            } else {
                assert_eq!(result.unwrap().mode(), mode);
            }
        }
    }

    #[test]
    fn test_unknown_mode_on_mode_aware_platform() {
        let result = validate(&json!({"pin": 3, "mode": "sideways"}), &Platform::Nuttx);
        assert!(matches!(result, Err(ConfigError::InvalidModeForOutput(_))));
        let result = validate(&json!({"pin": 3, "direction": "in", "mode": 42}), &Platform::Nuttx);
        assert!(matches!(result, Err(ConfigError::InvalidModeForInput(_))));
    }

    #[test]
    fn test_unchecked_platform_passes_mode_through() {
        let platform = Platform::from("darwin".to_owned());
        let config = validate(&json!({"pin": 3, "direction": "in", "mode": "opendrain"}), &platform).unwrap();
        assert_eq!(config.mode(), Mode::OpenDrain);

        let config = validate(&json!({"pin": 3}), &platform).unwrap();
        assert_eq!(config.mode(), Mode::None);

        let result = validate(&json!({"pin": 3, "mode": "sideways"}), &platform);
        assert!(matches!(result, Err(ConfigError::InvalidArgumentType(_))));
    }

    #[test]
    fn test_options_follow_same_rules() {
        let options = PinOptions::new(4).direction(Direction::In).mode(Mode::PushPull);
        assert!(matches!(
            validate(&options.into(), &Platform::Nuttx),
            Err(ConfigError::InvalidModeForInput(_))
        ));

        let options = PinOptions::new(4).direction(Direction::In).mode(Mode::PullDown);
        assert_eq!(
            validate(&options.into(), &Platform::Nuttx).unwrap(),
            PinConfiguration::new(4, Direction::In, Mode::PullDown)
        );

        assert_eq!(
            validate(&PinOptions::default().into(), &Platform::Nuttx),
            Err(ConfigError::MissingOrInvalidPin)
        );
    }
}
