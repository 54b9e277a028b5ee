use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    COMMAND_PATH, DATA_PATH, DEFAULT_BASE_URL, LOGIN_PATH, TOKEN_PATH, extract_token,
    login_form, looks_like_json, parse_device_values, set_mode_form, set_temperature_form,
};
use crate::types::*;
use crate::{Error, Result};

pub struct SalusClientBuilder {
    username: String,
    password: String,
    device_id: String,
    name: String,
    base_url: String,
    timeout: Option<Duration>,
    authenticate_before_commands: bool,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl SalusClientBuilder {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_id: device_id.into(),
            name: DEFAULT_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            authenticate_before_commands: false,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Portal root, e.g. `https://salus-it500.com`. Endpoint paths are appended.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Log in before a command when no token is held yet. Off by default,
    /// in which case commands go out with an empty token.
    pub fn authenticate_before_commands(mut self, enabled: bool) -> Self {
        self.authenticate_before_commands = enabled;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SalusClient> {
        let mut http = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(SalusClient {
            http,
            base_url: self.base_url,
            name: self.name,
            username: self.username,
            password: self.password,
            device_id: self.device_id,
            authenticate_before_commands: self.authenticate_before_commands,
            token: RwLock::new(None),
            state: RwLock::new(DeviceState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            logger,
        })
    }
}

/// Session with the Salus web portal for a single thermostat.
///
/// Refreshes are serialized by an async lock held across the whole
/// expire/re-login/retry sequence. Commands do not take that lock and may
/// overlap a refresh in flight.
pub struct SalusClient {
    http: reqwest::Client,
    base_url: String,
    name: String,
    username: String,
    password: String,
    device_id: String,
    authenticate_before_commands: bool,
    token: RwLock<Option<String>>,
    state: RwLock<DeviceState>,
    refresh_lock: tokio::sync::Mutex<()>,
    logger: Option<Mutex<MessageLogger>>,
}

enum DataResponse {
    Values(DeviceState),
    Expired,
}

impl SalusClient {
    pub fn builder(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> SalusClientBuilder {
        SalusClientBuilder::new(username, password, device_id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> String {
        format!("{}_climate", self.name)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn min_temp(&self) -> f64 {
        MIN_TEMP
    }

    pub fn max_temp(&self) -> f64 {
        MAX_TEMP
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        TemperatureUnit::Celsius
    }

    pub fn supported_features(&self) -> &'static [Feature] {
        SUPPORTED_FEATURES
    }

    pub fn hvac_modes(&self) -> &'static [HvacMode] {
        HVAC_MODES
    }

    /// The portal has no push channel; hosts drive `refresh` on a timer.
    pub fn should_poll(&self) -> bool {
        true
    }

    /// Heating status as the host's preset, `None` until first observed.
    pub fn preset_mode(&self) -> Option<&'static str> {
        self.state.read().preset_mode()
    }

    pub fn preset_modes(&self) -> &'static [&'static str] {
        &[]
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Last known snapshot; may hold tentative values from a command.
    pub fn state(&self) -> DeviceState {
        self.state.read().clone()
    }

    /// Log in and scrape a fresh session token. Always performs the full
    /// round-trip, even when a token is already held.
    pub async fn authenticate(&self) -> Result<()> {
        let url = self.url(LOGIN_PATH);
        debug!(url = %url, user = %self.username, "logging in to Salus portal");

        let resp = self
            .http
            .post(&url)
            .form(&login_form(&self.username, &self.password))
            .send()
            .await
            .map_err(network_error)?;
        let status = resp.status();
        self.log_request("POST", LOGIN_PATH, status);
        if !status.is_success() {
            error!(status = status.as_u16(), "login failed");
            return Err(Error::Authentication {
                status: status.as_u16(),
            });
        }

        let url = self.url(TOKEN_PATH);
        debug!(url = %url, "fetching token page");
        let resp = self
            .http
            .get(&url)
            .query(&[("devId", self.device_id.as_str())])
            .send()
            .await
            .map_err(network_error)?;
        self.log_request("GET", TOKEN_PATH, resp.status());
        let html = resp.text().await.map_err(network_error)?;

        let Some(token) = extract_token(&html) else {
            error!("failed to extract session token");
            return Err(Error::TokenExtraction);
        };
        *self.token.write() = Some(token.to_string());
        info!("authenticated with Salus portal");
        Ok(())
    }

    /// Fetch the device values and replace the snapshot.
    ///
    /// Logs in first when no token is held. A 401 triggers one re-login and
    /// one retried fetch; whatever the retry returns is final.
    pub async fn refresh(&self) -> Result<DeviceState> {
        let _guard = self.refresh_lock.lock().await;

        let has_token = self.token.read().is_some();
        if !has_token {
            self.authenticate().await?;
        }

        let state = match self.fetch_device_values().await? {
            DataResponse::Values(state) => state,
            DataResponse::Expired => {
                warn!("token expired, re-authenticating");
                self.authenticate().await?;
                match self.fetch_device_values().await? {
                    DataResponse::Values(state) => state,
                    DataResponse::Expired => {
                        error!("data endpoint rejected a freshly issued token");
                        return Err(Error::Authentication { status: 401 });
                    }
                }
            }
        };

        *self.state.write() = state.clone();
        info!(%state, "refreshed device state");
        Ok(state)
    }

    /// Send a new setpoint. The vendor does not echo the result, so the
    /// local snapshot is updated tentatively until the next refresh.
    pub async fn set_temperature(&self, celsius: f64) -> Result<()> {
        let token = self.command_token().await?;
        let form = set_temperature_form(&token, &self.device_id, celsius);
        self.post_command("set_temperature", &form).await?;

        let mut state = self.state.write();
        state.target_temperature = Some(celsius);
        state.tentative = true;
        info!(celsius, "set temperature");
        Ok(())
    }

    /// Switch automatic heating control on or off.
    pub async fn set_mode(&self, enabled: bool) -> Result<()> {
        let token = self.command_token().await?;
        let form = set_mode_form(&token, &self.device_id, enabled);
        self.post_command("set_mode", &form).await?;

        let mut state = self.state.write();
        state.mode_enabled = Some(enabled);
        state.tentative = true;
        info!(enabled, "set mode");
        Ok(())
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<()> {
        self.set_mode(mode == HvacMode::Heat).await
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.set_mode(true).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.set_mode(false).await
    }

    /// Tear down the session. Pooled connections and cookies go with it.
    pub fn close(self) {
        debug!(device = %self.device_id, "closing Salus session");
    }

    // -- Helpers --

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_device_values(&self) -> Result<DataResponse> {
        let token = self.token().unwrap_or_default();
        let cache_bust = Utc::now().timestamp_millis().to_string();
        let url = self.url(DATA_PATH);
        debug!(url = %url, "fetching device values");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("devId", self.device_id.as_str()),
                ("token", token.as_str()),
                ("_", cache_bust.as_str()),
            ])
            .send()
            .await
            .map_err(network_error)?;
        let status = resp.status();

        match status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                self.log_data(status, &Value::Null);
                return Ok(DataResponse::Expired);
            }
            s => {
                self.log_data(s, &Value::Null);
                error!(status = s.as_u16(), "failed to get device values");
                return Err(Error::UnexpectedResponse(format!(
                    "data endpoint returned HTTP {}",
                    s.as_u16()
                )));
            }
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text().await.map_err(network_error)?;
        trace!(%body, "device values");

        if !looks_like_json(&content_type, &body) {
            self.log_data(status, &Value::Null);
            error!(content_type = %content_type, %body, "unexpected device values response");
            return Err(Error::UnexpectedResponse(format!(
                "expected JSON, got content type {content_type:?}"
            )));
        }

        self.log_data(status, &serde_json::from_str(&body).unwrap_or(Value::Null));
        let state = parse_device_values(&body)
            .inspect_err(|e| error!(error = %e, "failed to decode device values"))?;
        Ok(DataResponse::Values(state))
    }

    async fn command_token(&self) -> Result<String> {
        let has_token = self.token.read().is_some();
        if self.authenticate_before_commands && !has_token {
            self.authenticate().await?;
        }
        Ok(self.token().unwrap_or_default())
    }

    async fn post_command<F: Serialize>(&self, action: &'static str, form: &F) -> Result<()> {
        let url = self.url(COMMAND_PATH);
        debug!(url = %url, action, "sending command");

        let resp = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(network_error)?;
        let status = resp.status();

        if let Some(logger) = &self.logger {
            let mut body = serde_json::to_value(form).unwrap_or(Value::Null);
            if let Some(obj) = body.as_object_mut() {
                obj.remove("token");
            }
            logger.lock().log_command(action, status.as_u16(), &body);
        }

        if status != StatusCode::OK {
            error!(action, status = status.as_u16(), "command failed");
            return Err(Error::Command {
                action,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn log_request(&self, method: &str, path: &str, status: StatusCode) {
        if let Some(logger) = &self.logger {
            logger.lock().log_request(method, path, Some(status.as_u16()));
        }
    }

    fn log_data(&self, status: StatusCode, body: &Value) {
        if let Some(logger) = &self.logger {
            logger.lock().log_data(status.as_u16(), body);
        }
    }
}

fn network_error(e: reqwest::Error) -> Error {
    error!(error = %e, "network error");
    Error::Network(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SalusClient {
        SalusClient::builder("user@example.com", "secret", "STA00012345")
            .base_url("http://127.0.0.1:9/")
            .build()
            .unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = client();
        assert_eq!(client.url(LOGIN_PATH), "http://127.0.0.1:9/public/login.php");
    }

    #[test]
    fn unique_id_derives_from_name() {
        let hall = SalusClient::builder("u", "p", "d").name("Hall").build().unwrap();
        assert_eq!(hall.name(), "Hall");
        assert_eq!(hall.unique_id(), "Hall_climate");
        assert_eq!(client().unique_id(), "Salus Thermostat_climate");
    }

    #[test]
    fn fresh_session_has_nothing_observed() {
        let client = client();
        assert!(client.token().is_none());
        assert_eq!(client.state(), DeviceState::default());
        assert_eq!(client.min_temp(), 5.0);
        assert_eq!(client.max_temp(), 34.5);
        assert_eq!(client.temperature_unit(), TemperatureUnit::Celsius);
        assert!(client.supported_features().contains(&Feature::TurnOff));
        assert_eq!(client.hvac_modes(), &[HvacMode::Heat, HvacMode::Off]);
        assert!(client.should_poll());
        assert_eq!(client.preset_mode(), None);
        assert!(client.preset_modes().is_empty());
    }
}
