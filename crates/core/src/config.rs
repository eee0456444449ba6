use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveTime};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub services: ServicesConfig,
    pub agents: AgentsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Endpoints and pool limits for the external collaborators.
#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub booking_url: String,
    pub slot_url: String,
    pub carrier_url: String,
    pub analytics_url: String,
    pub ledger_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct AgentsConfig {
    pub carrier_window_days: u32,
    pub traffic_horizon_hours: u32,
    pub anomaly_lookback_days: u32,
    pub anomaly_limit: u32,
    pub default_slot_time: String,
    pub low_availability_ratio: f64,
    /// Offset of the port's local time from UTC. "Today" and "tomorrow"
    /// resolve against this; zero keeps UTC dates.
    pub utc_offset_minutes: i32,
}

impl AgentsConfig {
    pub fn slot_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.default_slot_time.trim(), "%H:%M").ok()
    }

    pub fn utc_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub booking_url: Option<String>,
    pub slot_url: Option<String>,
    pub carrier_url: Option<String>,
    pub analytics_url: Option<String>,
    pub ledger_url: Option<String>,
    pub service_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["portgate.toml", "config/portgate.toml"];
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            services: ServicesConfig {
                booking_url: "http://localhost:3002".to_string(),
                slot_url: "http://localhost:3003".to_string(),
                carrier_url: "http://localhost:3004".to_string(),
                analytics_url: "http://localhost:3005".to_string(),
                ledger_url: "http://localhost:3010".to_string(),
                api_key: None,
                timeout_secs: 15,
                max_connections: 100,
            },
            agents: AgentsConfig {
                carrier_window_days: 90,
                traffic_horizon_hours: 24,
                anomaly_lookback_days: 7,
                anomaly_limit: 50,
                default_slot_time: "09:00".to_string(),
                low_availability_ratio: 0.30,
                utc_offset_minutes: 0,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(services) = patch.services {
            if let Some(booking_url) = services.booking_url {
                self.services.booking_url = booking_url;
            }
            if let Some(slot_url) = services.slot_url {
                self.services.slot_url = slot_url;
            }
            if let Some(carrier_url) = services.carrier_url {
                self.services.carrier_url = carrier_url;
            }
            if let Some(analytics_url) = services.analytics_url {
                self.services.analytics_url = analytics_url;
            }
            if let Some(ledger_url) = services.ledger_url {
                self.services.ledger_url = ledger_url;
            }
            if let Some(api_key_value) = services.api_key {
                self.services.api_key = Some(secret_value(api_key_value));
            }
            if let Some(timeout_secs) = services.timeout_secs {
                self.services.timeout_secs = timeout_secs;
            }
            if let Some(max_connections) = services.max_connections {
                self.services.max_connections = max_connections;
            }
        }

        if let Some(agents) = patch.agents {
            if let Some(days) = agents.carrier_window_days {
                self.agents.carrier_window_days = days;
            }
            if let Some(hours) = agents.traffic_horizon_hours {
                self.agents.traffic_horizon_hours = hours;
            }
            if let Some(days) = agents.anomaly_lookback_days {
                self.agents.anomaly_lookback_days = days;
            }
            if let Some(limit) = agents.anomaly_limit {
                self.agents.anomaly_limit = limit;
            }
            if let Some(slot_time) = agents.default_slot_time {
                self.agents.default_slot_time = slot_time;
            }
            if let Some(ratio) = agents.low_availability_ratio {
                self.agents.low_availability_ratio = ratio;
            }
            if let Some(minutes) = agents.utc_offset_minutes {
                self.agents.utc_offset_minutes = minutes;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PORTGATE_BOOKING_URL") {
            self.services.booking_url = value;
        }
        if let Some(value) = read_env("PORTGATE_SLOT_URL") {
            self.services.slot_url = value;
        }
        if let Some(value) = read_env("PORTGATE_CARRIER_URL") {
            self.services.carrier_url = value;
        }
        if let Some(value) = read_env("PORTGATE_ANALYTICS_URL") {
            self.services.analytics_url = value;
        }
        if let Some(value) = read_env("PORTGATE_LEDGER_URL") {
            self.services.ledger_url = value;
        }
        if let Some(value) = read_env("PORTGATE_SERVICE_API_KEY") {
            self.services.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PORTGATE_SERVICE_TIMEOUT_SECS") {
            self.services.timeout_secs = parse_u64("PORTGATE_SERVICE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PORTGATE_SERVICE_MAX_CONNECTIONS") {
            self.services.max_connections =
                parse_u32("PORTGATE_SERVICE_MAX_CONNECTIONS", &value)?;
        }

        if let Some(value) = read_env("PORTGATE_CARRIER_WINDOW_DAYS") {
            self.agents.carrier_window_days = parse_u32("PORTGATE_CARRIER_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("PORTGATE_TRAFFIC_HORIZON_HOURS") {
            self.agents.traffic_horizon_hours =
                parse_u32("PORTGATE_TRAFFIC_HORIZON_HOURS", &value)?;
        }
        if let Some(value) = read_env("PORTGATE_ANOMALY_LOOKBACK_DAYS") {
            self.agents.anomaly_lookback_days =
                parse_u32("PORTGATE_ANOMALY_LOOKBACK_DAYS", &value)?;
        }
        if let Some(value) = read_env("PORTGATE_ANOMALY_LIMIT") {
            self.agents.anomaly_limit = parse_u32("PORTGATE_ANOMALY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("PORTGATE_DEFAULT_SLOT_TIME") {
            self.agents.default_slot_time = value;
        }
        if let Some(value) = read_env("PORTGATE_LOW_AVAILABILITY_RATIO") {
            self.agents.low_availability_ratio =
                parse_f64("PORTGATE_LOW_AVAILABILITY_RATIO", &value)?;
        }
        if let Some(value) = read_env("PORTGATE_UTC_OFFSET_MINUTES") {
            self.agents.utc_offset_minutes = parse_i32("PORTGATE_UTC_OFFSET_MINUTES", &value)?;
        }

        if let Some(value) = read_env("PORTGATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PORTGATE_SERVER_PORT") {
            self.server.port = parse_u16("PORTGATE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PORTGATE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PORTGATE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("PORTGATE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("PORTGATE_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(booking_url) = overrides.booking_url {
            self.services.booking_url = booking_url;
        }
        if let Some(slot_url) = overrides.slot_url {
            self.services.slot_url = slot_url;
        }
        if let Some(carrier_url) = overrides.carrier_url {
            self.services.carrier_url = carrier_url;
        }
        if let Some(analytics_url) = overrides.analytics_url {
            self.services.analytics_url = analytics_url;
        }
        if let Some(ledger_url) = overrides.ledger_url {
            self.services.ledger_url = ledger_url;
        }
        if let Some(api_key) = overrides.service_api_key {
            self.services.api_key = Some(secret_value(api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_services(&self.services)?;
        validate_agents(&self.agents)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_services(services: &ServicesConfig) -> Result<(), ConfigError> {
    for (name, url) in [
        ("services.booking_url", &services.booking_url),
        ("services.slot_url", &services.slot_url),
        ("services.carrier_url", &services.carrier_url),
        ("services.analytics_url", &services.analytics_url),
        ("services.ledger_url", &services.ledger_url),
    ] {
        let url = url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{name} must start with http:// or https:// (got `{url}`)"
            )));
        }
    }

    if let Some(api_key) = &services.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "services.api_key is set but empty; remove it or provide a key".to_string(),
            ));
        }
    }

    if services.timeout_secs == 0 || services.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "services.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if services.max_connections == 0 {
        return Err(ConfigError::Validation(
            "services.max_connections must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_agents(agents: &AgentsConfig) -> Result<(), ConfigError> {
    if agents.carrier_window_days == 0 {
        return Err(ConfigError::Validation(
            "agents.carrier_window_days must be greater than zero".to_string(),
        ));
    }
    if agents.traffic_horizon_hours == 0 || agents.traffic_horizon_hours > 168 {
        return Err(ConfigError::Validation(
            "agents.traffic_horizon_hours must be in range 1..=168".to_string(),
        ));
    }
    if agents.anomaly_lookback_days == 0 {
        return Err(ConfigError::Validation(
            "agents.anomaly_lookback_days must be greater than zero".to_string(),
        ));
    }
    if agents.anomaly_limit == 0 {
        return Err(ConfigError::Validation(
            "agents.anomaly_limit must be greater than zero".to_string(),
        ));
    }
    if agents.slot_time().is_none() {
        return Err(ConfigError::Validation(format!(
            "agents.default_slot_time must be HH:MM (got `{}`)",
            agents.default_slot_time
        )));
    }
    if !(agents.low_availability_ratio > 0.0 && agents.low_availability_ratio <= 1.0) {
        return Err(ConfigError::Validation(
            "agents.low_availability_ratio must be in range (0, 1]".to_string(),
        ));
    }
    if agents.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES || agents.utc_offset().is_none() {
        return Err(ConfigError::Validation(format!(
            "agents.utc_offset_minutes must be within {MAX_UTC_OFFSET_MINUTES} of zero (got {})",
            agents.utc_offset_minutes
        )));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.trim().parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    services: Option<ServicesPatch>,
    agents: Option<AgentsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesPatch {
    booking_url: Option<String>,
    slot_url: Option<String>,
    carrier_url: Option<String>,
    analytics_url: Option<String>,
    ledger_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentsPatch {
    carrier_window_days: Option<u32>,
    traffic_horizon_hours: Option<u32>,
    anomaly_lookback_days: Option<u32>,
    anomaly_limit: Option<u32>,
    default_slot_time: Option<String>,
    low_availability_ratio: Option<f64>,
    utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_a_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist/portgate.toml".into()),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.services.carrier_url == "http://localhost:3004", "carrier default")?;
        ensure(config.services.timeout_secs == 15, "timeout default")?;
        ensure(config.agents.carrier_window_days == 90, "window default")?;
        ensure(
            config.agents.slot_time().map(|time| time.to_string()).as_deref() == Some("09:00:00"),
            "default slot time should parse",
        )?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact log default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PORTGATE_API_KEY", "key-from-env");
        env::set_var("TEST_PORTGATE_LEDGER", "https://ledger.internal:8443");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("portgate.toml");
            fs::write(
                &path,
                r#"
[services]
api_key = "${TEST_PORTGATE_API_KEY}"
ledger_url = "${TEST_PORTGATE_LEDGER}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.services.api_key.as_ref().map(|key| key.expose_secret().to_owned())
                    == Some("key-from-env".to_owned()),
                "api key should be loaded from environment",
            )?;
            ensure(
                config.services.ledger_url == "https://ledger.internal:8443",
                "ledger url should be interpolated",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PORTGATE_API_KEY", "TEST_PORTGATE_LEDGER"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("portgate.toml");
        fs::write(&path, "[services]\napi_key = \"${PORTGATE_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let outcome =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                outcome,
                Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "PORTGATE_TEST_UNSET_VAR"
            ),
            "unset variable should be named",
        )
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORTGATE_SLOT_URL", "http://slots-from-env:3003");
        env::set_var("PORTGATE_ANOMALY_LIMIT", "20");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("portgate.toml");
            fs::write(
                &path,
                r#"
[services]
slot_url = "http://slots-from-file:3003"
carrier_url = "http://carriers-from-file:3004"

[agents]
anomaly_limit = 10
traffic_horizon_hours = 12

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    carrier_url: Some("http://carriers-from-override:3004".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.services.carrier_url == "http://carriers-from-override:3004",
                "override carrier url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.services.slot_url == "http://slots-from-env:3003",
                "env slot url should win over file and defaults",
            )?;
            ensure(config.agents.anomaly_limit == 20, "env anomaly limit should win over file")?;
            ensure(
                config.agents.traffic_horizon_hours == 12,
                "file horizon should win over default",
            )?;
            Ok(())
        })();

        clear_vars(&["PORTGATE_SLOT_URL", "PORTGATE_ANOMALY_LIMIT"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORTGATE_SERVICE_TIMEOUT_SECS", "soon");

        let outcome = AppConfig::load(LoadOptions::default());
        let result = ensure(
            matches!(
                outcome,
                Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "PORTGATE_SERVICE_TIMEOUT_SECS"
            ),
            "non-numeric timeout should be rejected",
        );

        clear_vars(&["PORTGATE_SERVICE_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORTGATE_BOOKING_URL", "localhost:3002");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("services.booking_url")
            );
            ensure(has_message, "validation failure should mention services.booking_url")
        })();

        clear_vars(&["PORTGATE_BOOKING_URL"]);
        result
    }

    #[test]
    fn malformed_slot_time_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORTGATE_DEFAULT_SLOT_TIME", "nine");
        let outcome = AppConfig::load(LoadOptions::default());
        clear_vars(&["PORTGATE_DEFAULT_SLOT_TIME"]);

        ensure(
            matches!(
                outcome,
                Err(ConfigError::Validation(ref message)) if message.contains("agents.default_slot_time")
            ),
            "slot time validation should name the field",
        )
    }

    #[test]
    fn utc_offset_is_read_and_bounded() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORTGATE_UTC_OFFSET_MINUTES", "-300");
        let western = AppConfig::load(LoadOptions::default());
        env::set_var("PORTGATE_UTC_OFFSET_MINUTES", "1500");
        let out_of_range = AppConfig::load(LoadOptions::default());
        clear_vars(&["PORTGATE_UTC_OFFSET_MINUTES"]);

        let western = western.map_err(|err| format!("config load failed: {err}"))?;
        ensure(
            western.agents.utc_offset().map(|offset| offset.local_minus_utc()) == Some(-18_000),
            "offset should convert to seconds",
        )?;
        ensure(
            matches!(
                out_of_range,
                Err(ConfigError::Validation(ref message)) if message.contains("agents.utc_offset_minutes")
            ),
            "out of range offset should name the field",
        )
    }

    #[test]
    fn required_file_must_exist() {
        let outcome = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist/portgate.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(outcome, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORTGATE_SERVICE_API_KEY", "pg-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("pg-secret-value"), "debug output should not contain api key")
        })();

        clear_vars(&["PORTGATE_SERVICE_API_KEY"]);
        result
    }
}
