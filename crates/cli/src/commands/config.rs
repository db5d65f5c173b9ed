use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use govflow_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field<'a> {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: &'a str,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let timeout_secs = config.api.timeout_secs.to_string();
    let token = config
        .api
        .token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let idle_timeout_secs = config.session.idle_timeout_secs.to_string();
    let warning_secs = config.session.warning_secs.to_string();
    let store_path = config.session.store_path.display().to_string();
    let log_format = format!("{:?}", config.logging.format);

    let fields = [
        Field {
            key: "api.base_url",
            env_keys: &["GOVFLOW_API_BASE_URL"],
            value: &config.api.base_url,
        },
        Field {
            key: "api.timeout_secs",
            env_keys: &["GOVFLOW_API_TIMEOUT_SECS"],
            value: &timeout_secs,
        },
        Field { key: "api.token", env_keys: &["GOVFLOW_API_TOKEN"], value: &token },
        Field {
            key: "session.idle_timeout_secs",
            env_keys: &["GOVFLOW_SESSION_IDLE_TIMEOUT_SECS"],
            value: &idle_timeout_secs,
        },
        Field {
            key: "session.warning_secs",
            env_keys: &["GOVFLOW_SESSION_WARNING_SECS"],
            value: &warning_secs,
        },
        Field {
            key: "session.store_path",
            env_keys: &["GOVFLOW_SESSION_STORE_PATH"],
            value: &store_path,
        },
        Field {
            key: "logging.level",
            env_keys: &["GOVFLOW_LOGGING_LEVEL", "GOVFLOW_LOG_LEVEL"],
            value: &config.logging.level,
        },
        Field {
            key: "logging.format",
            env_keys: &["GOVFLOW_LOGGING_FORMAT", "GOVFLOW_LOG_FORMAT"],
            value: &log_format,
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|field| {
        render_line(
            field.key,
            field.value,
            field_source(
                field.key,
                field.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        )
    }));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["govflow.toml", "config/govflow.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

/// Keeps at most the first four characters of a bearer token.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() <= 8 {
        return "<redacted>".to_string();
    }

    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***")
}
