use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadflow_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// Effective configuration, one line per key, with where each value came from.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        lines.push(render_line(key, &value, source(key, env_keys)));
    };

    push("database.url", config.database.url.clone(), &["LEADFLOW_DATABASE_URL"]);
    push(
        "database.max_connections",
        config.database.max_connections.to_string(),
        &["LEADFLOW_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        config.database.timeout_secs.to_string(),
        &["LEADFLOW_DATABASE_TIMEOUT_SECS"],
    );
    push(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["LEADFLOW_SERVER_BIND_ADDRESS"],
    );
    push("server.port", config.server.port.to_string(), &["LEADFLOW_SERVER_PORT"]);
    push(
        "server.graceful_shutdown_secs",
        config.server.graceful_shutdown_secs.to_string(),
        &["LEADFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    );
    push(
        "scheduler.enabled",
        config.scheduler.enabled.to_string(),
        &["LEADFLOW_SCHEDULER_ENABLED"],
    );
    push("scheduler.run_at", config.scheduler.run_at.to_string(), &["LEADFLOW_SCHEDULER_RUN_AT"]);
    push(
        "scheduler.utc_offset_minutes",
        config.scheduler.utc_offset_minutes.to_string(),
        &["LEADFLOW_SCHEDULER_UTC_OFFSET_MINUTES"],
    );
    push(
        "scheduler.system_operator_id",
        config.scheduler.system_operator_id.clone(),
        &["LEADFLOW_SCHEDULER_SYSTEM_OPERATOR_ID"],
    );
    push(
        "scheduler.system_operator_name",
        config.scheduler.system_operator_name.clone(),
        &["LEADFLOW_SCHEDULER_SYSTEM_OPERATOR_NAME"],
    );
    push(
        "public_pool.clear_contact_on_entry",
        config.public_pool.clear_contact_on_entry.to_string(),
        &["LEADFLOW_PUBLIC_POOL_CLEAR_CONTACT_ON_ENTRY"],
    );
    for (progress, label) in config.progress_labels.labels() {
        let key = format!("progress_labels.{}", progress.as_str().to_ascii_lowercase());
        push(&key, label.to_string(), &[]);
    }
    push(
        "logging.level",
        config.logging.level.clone(),
        &["LEADFLOW_LOGGING_LEVEL", "LEADFLOW_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format).to_lowercase(),
        &["LEADFLOW_LOGGING_FORMAT", "LEADFLOW_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("leadflow.toml"), PathBuf::from("config/leadflow.toml")]
        .into_iter()
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
