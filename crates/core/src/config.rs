use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub buffer: BufferConfig,
    pub pending: PendingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    /// Signing secret for verifying inbound webhook deliveries.
    pub signing_secret: SecretString,
    /// Bot token for posting, updating, and deleting messages.
    pub bot_token: SecretString,
    /// Second OAuth token used only for user-directory lookups.
    pub directory_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct BufferConfig {
    /// Maximum buffered on-call records before a flush is forced.
    pub capacity: usize,
    /// Period of the timer that flushes regardless of buffer fullness.
    pub flush_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PendingConfig {
    /// Age after which an abandoned in-flight selection is evicted.
    pub eviction_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
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
    pub signing_secret: Option<String>,
    pub bot_token: Option<String>,
    pub directory_token: Option<String>,
    pub buffer_capacity: Option<usize>,
    pub flush_interval_secs: Option<u64>,
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
                url: "sqlite://oncall.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                signing_secret: String::new().into(),
                bot_token: String::new().into(),
                directory_token: String::new().into(),
            },
            buffer: BufferConfig { capacity: 3, flush_interval_secs: 600 },
            pending: PendingConfig { eviction_secs: 1800 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 3000 },
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
    /// Defaults, then the config file, then `ONCALL_*` environment variables,
    /// then programmatic overrides, then validation. A missing or malformed
    /// secret is startup-fatal here, never a per-request condition.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("oncall.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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

        if let Some(slack) = patch.slack {
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret);
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(directory_token) = slack.directory_token {
                self.slack.directory_token = secret_value(directory_token);
            }
        }

        if let Some(buffer) = patch.buffer {
            if let Some(capacity) = buffer.capacity {
                self.buffer.capacity = capacity;
            }
            if let Some(flush_interval_secs) = buffer.flush_interval_secs {
                self.buffer.flush_interval_secs = flush_interval_secs;
            }
        }

        if let Some(pending) = patch.pending {
            if let Some(eviction_secs) = pending.eviction_secs {
                self.pending.eviction_secs = eviction_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("ONCALL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ONCALL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ONCALL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ONCALL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ONCALL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ONCALL_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("ONCALL_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("ONCALL_SLACK_DIRECTORY_TOKEN") {
            self.slack.directory_token = secret_value(value);
        }

        if let Some(value) = read_env("ONCALL_BUFFER_CAPACITY") {
            self.buffer.capacity = parse_usize("ONCALL_BUFFER_CAPACITY", &value)?;
        }
        if let Some(value) = read_env("ONCALL_BUFFER_FLUSH_INTERVAL_SECS") {
            self.buffer.flush_interval_secs =
                parse_u64("ONCALL_BUFFER_FLUSH_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("ONCALL_PENDING_EVICTION_SECS") {
            self.pending.eviction_secs = parse_u64("ONCALL_PENDING_EVICTION_SECS", &value)?;
        }

        if let Some(value) = read_env("ONCALL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ONCALL_SERVER_PORT") {
            self.server.port = parse_u16("ONCALL_SERVER_PORT", &value)?;
        }

        let log_level = read_env("ONCALL_LOGGING_LEVEL").or_else(|| read_env("ONCALL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ONCALL_LOGGING_FORMAT").or_else(|| read_env("ONCALL_LOG_FORMAT"));
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
        if let Some(signing_secret) = overrides.signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(bot_token) = overrides.bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(directory_token) = overrides.directory_token {
            self.slack.directory_token = secret_value(directory_token);
        }
        if let Some(buffer_capacity) = overrides.buffer_capacity {
            self.buffer.capacity = buffer_capacity;
        }
        if let Some(flush_interval_secs) = overrides.flush_interval_secs {
            self.buffer.flush_interval_secs = flush_interval_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_buffer(&self.buffer)?;
        validate_pending(&self.pending)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("oncall.toml"), PathBuf::from("config/oncall.toml")]
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > Signing Secret".to_string()
        ));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        return Err(ConfigError::Validation(
            "slack.bot_token must start with `xoxb-`. Get it from https://api.slack.com/apps"
                .to_string(),
        ));
    }

    let directory_token = slack.directory_token.expose_secret();
    if directory_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.directory_token is required for user-directory lookups".to_string(),
        ));
    }
    if !directory_token.starts_with("xox") {
        return Err(ConfigError::Validation(
            "slack.directory_token must be a Slack OAuth token (`xox...`)".to_string(),
        ));
    }

    Ok(())
}

fn validate_buffer(buffer: &BufferConfig) -> Result<(), ConfigError> {
    if buffer.capacity == 0 || buffer.capacity > 64 {
        return Err(ConfigError::Validation(
            "buffer.capacity must be in range 1..=64".to_string(),
        ));
    }

    if buffer.flush_interval_secs == 0 || buffer.flush_interval_secs > 86_400 {
        return Err(ConfigError::Validation(
            "buffer.flush_interval_secs must be in range 1..=86400".to_string(),
        ));
    }

    Ok(())
}

fn validate_pending(pending: &PendingConfig) -> Result<(), ConfigError> {
    if pending.eviction_secs == 0 {
        return Err(ConfigError::Validation(
            "pending.eviction_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    buffer: Option<BufferPatch>,
    pending: Option<PendingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    signing_secret: Option<String>,
    bot_token: Option<String>,
    directory_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BufferPatch {
    capacity: Option<usize>,
    flush_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PendingPatch {
    eviction_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
