use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::customer::{CustomerProgress, ProgressVocabulary};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub public_pool: PublicPoolConfig,
    pub progress_labels: ProgressVocabulary,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Wall-clock time of the daily auto-transfer run.
    pub run_at: NaiveTime,
    /// Offset the wall clock is read in.
    pub utc_offset_minutes: i32,
    pub system_operator_id: String,
    pub system_operator_name: String,
}

impl SchedulerConfig {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
    }
}

#[derive(Clone, Debug)]
pub struct PublicPoolConfig {
    pub clear_contact_on_entry: bool,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub scheduler_enabled: Option<bool>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                run_at: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default(),
                utc_offset_minutes: 8 * 60,
                system_operator_id: "system".to_string(),
                system_operator_name: "admin".to_string(),
            },
            public_pool: PublicPoolConfig { clear_contact_on_entry: true },
            progress_labels: ProgressVocabulary::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
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
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
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

        if let Some(scheduler) = patch.scheduler {
            if let Some(enabled) = scheduler.enabled {
                self.scheduler.enabled = enabled;
            }
            if let Some(run_at) = scheduler.run_at {
                self.scheduler.run_at = parse_time("scheduler.run_at", &run_at)?;
            }
            if let Some(utc_offset_minutes) = scheduler.utc_offset_minutes {
                self.scheduler.utc_offset_minutes = utc_offset_minutes;
            }
            if let Some(system_operator_id) = scheduler.system_operator_id {
                self.scheduler.system_operator_id = system_operator_id;
            }
            if let Some(system_operator_name) = scheduler.system_operator_name {
                self.scheduler.system_operator_name = system_operator_name;
            }
        }

        if let Some(public_pool) = patch.public_pool {
            if let Some(clear_contact_on_entry) = public_pool.clear_contact_on_entry {
                self.public_pool.clear_contact_on_entry = clear_contact_on_entry;
            }
        }

        if let Some(labels) = patch.progress_labels {
            let vocabulary = &mut self.progress_labels;
            for (slot, value) in [
                (&mut vocabulary.initial_contact, labels.initial_contact),
                (&mut vocabulary.normal, labels.normal),
                (&mut vocabulary.public_pool, labels.public_pool),
                (&mut vocabulary.disabled, labels.disabled),
                (&mut vocabulary.sample_evaluation, labels.sample_evaluation),
            ] {
                if let Some(value) = value {
                    *slot = value;
                }
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

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("LEADFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("LEADFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADFLOW_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADFLOW_SERVER_PORT") {
            self.server.port = parse_env("LEADFLOW_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("LEADFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADFLOW_SCHEDULER_ENABLED") {
            self.scheduler.enabled = parse_env("LEADFLOW_SCHEDULER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_SCHEDULER_RUN_AT") {
            self.scheduler.run_at = parse_time("LEADFLOW_SCHEDULER_RUN_AT", &value).map_err(
                |_| ConfigError::InvalidEnvOverride {
                    key: "LEADFLOW_SCHEDULER_RUN_AT".to_string(),
                    value: value.clone(),
                },
            )?;
        }
        if let Some(value) = read_env("LEADFLOW_SCHEDULER_UTC_OFFSET_MINUTES") {
            self.scheduler.utc_offset_minutes =
                parse_env("LEADFLOW_SCHEDULER_UTC_OFFSET_MINUTES", &value)?;
        }
        if let Some(value) = read_env("LEADFLOW_SCHEDULER_SYSTEM_OPERATOR_ID") {
            self.scheduler.system_operator_id = value;
        }
        if let Some(value) = read_env("LEADFLOW_SCHEDULER_SYSTEM_OPERATOR_NAME") {
            self.scheduler.system_operator_name = value;
        }

        if let Some(value) = read_env("LEADFLOW_PUBLIC_POOL_CLEAR_CONTACT_ON_ENTRY") {
            self.public_pool.clear_contact_on_entry =
                parse_env("LEADFLOW_PUBLIC_POOL_CLEAR_CONTACT_ON_ENTRY", &value)?;
        }

        let log_level =
            read_env("LEADFLOW_LOGGING_LEVEL").or_else(|| read_env("LEADFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADFLOW_LOGGING_FORMAT").or_else(|| read_env("LEADFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.scheduler_enabled {
            self.scheduler.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_scheduler(&self.scheduler)?;
        validate_progress_labels(&self.progress_labels)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadflow.toml"), PathBuf::from("config/leadflow.toml")]
        .into_iter()
        .find(|path| path.exists())
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
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

fn validate_scheduler(scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
    if scheduler.utc_offset_minutes.abs() > 14 * 60 || scheduler.offset().is_none() {
        return Err(ConfigError::Validation(
            "scheduler.utc_offset_minutes must be in range -840..=840".to_string(),
        ));
    }

    if scheduler.system_operator_id.trim().is_empty()
        || scheduler.system_operator_name.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "scheduler.system_operator_id and scheduler.system_operator_name are required"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_progress_labels(vocabulary: &ProgressVocabulary) -> Result<(), ConfigError> {
    let labels = vocabulary.labels();

    for (progress, label) in labels {
        let label = label.trim();
        if label.is_empty() {
            return Err(ConfigError::Validation(format!(
                "progress_labels entry for {progress} must not be empty"
            )));
        }

        if labels.iter().filter(|(_, other)| other.trim() == label).count() > 1 {
            return Err(ConfigError::Validation(format!(
                "progress label `{label}` is used for more than one state"
            )));
        }

        if let Some(code) = CustomerProgress::parse(label) {
            if code != progress {
                return Err(ConfigError::Validation(format!(
                    "progress label `{label}` for {progress} collides with the code of {code}"
                )));
            }
        }
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

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| {
            ConfigError::Validation(format!("{key} must be a wall-clock time like `02:00:00`"))
        })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    scheduler: Option<SchedulerPatch>,
    public_pool: Option<PublicPoolPatch>,
    progress_labels: Option<ProgressLabelsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerPatch {
    enabled: Option<bool>,
    run_at: Option<String>,
    utc_offset_minutes: Option<i32>,
    system_operator_id: Option<String>,
    system_operator_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicPoolPatch {
    clear_contact_on_entry: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ProgressLabelsPatch {
    initial_contact: Option<String>,
    normal: Option<String>,
    public_pool: Option<String>,
    disabled: Option<String>,
    sample_evaluation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
