use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use portgate_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILES};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

const COMMAND: &str = "config";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key = match &config.services.api_key {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset>".to_string(),
    };

    let fields: Vec<(&str, String, &str)> = vec![
        ("services.booking_url", config.services.booking_url.clone(), "PORTGATE_BOOKING_URL"),
        ("services.slot_url", config.services.slot_url.clone(), "PORTGATE_SLOT_URL"),
        ("services.carrier_url", config.services.carrier_url.clone(), "PORTGATE_CARRIER_URL"),
        ("services.analytics_url", config.services.analytics_url.clone(), "PORTGATE_ANALYTICS_URL"),
        ("services.ledger_url", config.services.ledger_url.clone(), "PORTGATE_LEDGER_URL"),
        ("services.api_key", api_key, "PORTGATE_SERVICE_API_KEY"),
        (
            "services.timeout_secs",
            config.services.timeout_secs.to_string(),
            "PORTGATE_SERVICE_TIMEOUT_SECS",
        ),
        (
            "services.max_connections",
            config.services.max_connections.to_string(),
            "PORTGATE_SERVICE_MAX_CONNECTIONS",
        ),
        (
            "agents.carrier_window_days",
            config.agents.carrier_window_days.to_string(),
            "PORTGATE_CARRIER_WINDOW_DAYS",
        ),
        (
            "agents.traffic_horizon_hours",
            config.agents.traffic_horizon_hours.to_string(),
            "PORTGATE_TRAFFIC_HORIZON_HOURS",
        ),
        (
            "agents.anomaly_lookback_days",
            config.agents.anomaly_lookback_days.to_string(),
            "PORTGATE_ANOMALY_LOOKBACK_DAYS",
        ),
        ("agents.anomaly_limit", config.agents.anomaly_limit.to_string(), "PORTGATE_ANOMALY_LIMIT"),
        (
            "agents.default_slot_time",
            config.agents.default_slot_time.clone(),
            "PORTGATE_DEFAULT_SLOT_TIME",
        ),
        (
            "agents.low_availability_ratio",
            config.agents.low_availability_ratio.to_string(),
            "PORTGATE_LOW_AVAILABILITY_RATIO",
        ),
        (
            "agents.utc_offset_minutes",
            config.agents.utc_offset_minutes.to_string(),
            "PORTGATE_UTC_OFFSET_MINUTES",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "PORTGATE_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "PORTGATE_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "PORTGATE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "PORTGATE_LOG_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "PORTGATE_LOG_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in &fields {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, value, source));
    }

    CommandResult::success(COMMAND, lines.join("\n"))
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps at most a four character prefix of long keys.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() >= 12 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }
    "<redacted>".to_string()
}
