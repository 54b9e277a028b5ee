use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::types::DeviceState;
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://salus-it500.com";

pub const LOGIN_PATH: &str = "/public/login.php";
pub const TOKEN_PATH: &str = "/public/control.php";
pub const DATA_PATH: &str = "/public/ajax_device_values.php";
pub const COMMAND_PATH: &str = "/includes/set.php";

static TOKEN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input id="token" type="hidden" value="([^"]*)"\s*/?>"#)
        .expect("token marker pattern is valid")
});

#[derive(Debug, Serialize)]
pub struct LoginForm<'a> {
    #[serde(rename = "IDemail")]
    pub email: &'a str,
    pub password: &'a str,
    pub login: &'static str,
    pub keep_logged_in: &'static str,
}

pub fn login_form<'a>(email: &'a str, password: &'a str) -> LoginForm<'a> {
    LoginForm {
        email,
        password,
        login: "Login",
        keep_logged_in: "1",
    }
}

#[derive(Debug, Serialize)]
pub struct SetTemperatureForm<'a> {
    pub token: &'a str,
    #[serde(rename = "devId")]
    pub device_id: &'a str,
    #[serde(rename = "tempUnit")]
    pub temp_unit: &'static str,
    #[serde(rename = "current_tempZ1_set")]
    pub setpoint_flag: &'static str,
    #[serde(rename = "current_tempZ1")]
    pub setpoint: f64,
}

pub fn set_temperature_form<'a>(token: &'a str, device_id: &'a str, celsius: f64) -> SetTemperatureForm<'a> {
    SetTemperatureForm {
        token,
        device_id,
        temp_unit: "0",
        setpoint_flag: "1",
        setpoint: celsius,
    }
}

#[derive(Debug, Serialize)]
pub struct SetModeForm<'a> {
    pub token: &'a str,
    #[serde(rename = "devId")]
    pub device_id: &'a str,
    pub auto: &'static str,
    #[serde(rename = "auto_setZ1")]
    pub auto_flag: &'static str,
}

/// The portal's `auto` flag is inverted: `1` turns heating control off.
pub fn set_mode_form<'a>(token: &'a str, device_id: &'a str, enabled: bool) -> SetModeForm<'a> {
    SetModeForm {
        token,
        device_id,
        auto: if enabled { "0" } else { "1" },
        auto_flag: "1",
    }
}

/// Pull the session token out of the control page markup.
pub fn extract_token(html: &str) -> Option<&str> {
    TOKEN_MARKER
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn looks_like_json(content_type: &str, body: &str) -> bool {
    content_type.contains("application/json") || body.starts_with('{')
}

/// Parse an `ajax_device_values.php` body into a confirmed snapshot.
pub fn parse_device_values(body: &str) -> Result<DeviceState> {
    let data: Value =
        serde_json::from_str(body).map_err(|e| Error::Parse(format!("invalid JSON: {e}")))?;

    Ok(DeviceState {
        target_temperature: Some(number_field(&data, "CH1currentSetPoint")?),
        current_temperature: Some(number_field(&data, "CH1currentRoomTemp")?),
        frost_temperature: Some(number_field(&data, "frost")?),
        heating_active: Some(flag_field(&data, "CH1heatOnOffStatus")?),
        // "1" here means the mode is switched off.
        mode_enabled: Some(!flag_field(&data, "CH1heatOnOff")?),
        tentative: false,
    })
}

fn number_field(data: &Value, key: &str) -> Result<f64> {
    match data.get(key) {
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| Error::Parse(format!("{key}: not a number: {s:?}"))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::Parse(format!("{key}: not a number: {n}"))),
        Some(other) => Err(Error::Parse(format!("{key}: unexpected value {other}"))),
        None => Err(Error::Parse(format!("missing field {key}"))),
    }
}

fn flag_field(data: &Value, key: &str) -> Result<bool> {
    match data.get(key) {
        Some(Value::String(s)) => Ok(s == "1"),
        Some(Value::Number(n)) => Ok(n.as_u64() == Some(1)),
        Some(other) => Err(Error::Parse(format!("{key}: unexpected value {other}"))),
        None => Err(Error::Parse(format!("missing field {key}"))),
    }
}
