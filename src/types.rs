use std::fmt;

use serde::Serialize;

/// Lowest setpoint offered by the Salus web interface, in Celsius.
pub const MIN_TEMP: f64 = 5.0;
/// Highest setpoint offered by the Salus web interface, in Celsius.
pub const MAX_TEMP: f64 = 34.5;

pub const DEFAULT_NAME: &str = "Salus Thermostat";

/// Last known snapshot of the thermostat.
///
/// `None` fields have never been observed. `tentative` is set when a command
/// updated the snapshot optimistically and cleared by the next refresh, which
/// is the only source of confirmed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub frost_temperature: Option<f64>,
    pub heating_active: Option<bool>,
    pub mode_enabled: Option<bool>,
    pub tentative: bool,
}

impl DeviceState {
    pub fn hvac_mode(&self) -> HvacMode {
        if self.mode_enabled == Some(true) {
            HvacMode::Heat
        } else {
            HvacMode::Off
        }
    }

    /// `"ON"` while the boiler is firing, `"OFF"` otherwise.
    pub fn preset_mode(&self) -> Option<&'static str> {
        self.heating_active.map(|on| if on { "ON" } else { "OFF" })
    }

    pub fn hvac_action(&self) -> HvacAction {
        if self.heating_active == Some(true) {
            HvacAction::Heating
        } else {
            HvacAction::Idle
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let temp = |t: Option<f64>| t.map_or_else(|| "--".to_string(), |t| format!("{t:.1}\u{00b0}C"));
        write!(
            f,
            "room {} | target {} | frost {} | {:?}/{:?}",
            temp(self.current_temperature),
            temp(self.target_temperature),
            temp(self.frost_temperature),
            self.hvac_mode(),
            self.hvac_action(),
        )?;
        if self.tentative {
            write!(f, " (unconfirmed)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Heat,
    Off,
}

pub const HVAC_MODES: &[HvacMode] = &[HvacMode::Heat, HvacMode::Off];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacAction {
    Heating,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    TargetTemperature,
    TurnOn,
    TurnOff,
}

pub const SUPPORTED_FEATURES: &[Feature] =
    &[Feature::TargetTemperature, Feature::TurnOn, Feature::TurnOff];
