use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub slack: SlackConfig,
    pub install: InstallConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub url: String,
    pub table: String,
    pub offline: bool,
    pub offline_url: Option<String>,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl StorageConfig {
    /// Connection URL after applying the local endpoint override.
    pub fn effective_url(&self) -> &str {
        match (&self.offline, &self.offline_url) {
            (true, Some(url)) => url,
            _ => &self.url,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub scopes: String,
    pub verification_token: Option<SecretString>,
    pub redirect_uri: Option<String>,
    pub authorize_url: String,
    pub api_base_url: String,
    pub ignore_bots: bool,
}

#[derive(Clone, Debug)]
pub struct InstallConfig {
    pub redirect_url: String,
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
    pub storage_url: Option<String>,
    pub storage_table: Option<String>,
    pub log_level: Option<String>,
    pub slack_client_id: Option<String>,
    pub slack_client_secret: Option<String>,
    pub slack_verification_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub slack_ignore_bots: Option<bool>,
    pub install_redirect_url: Option<String>,
    pub server_port: Option<u16>,
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
            storage: StorageConfig {
                url: "sqlite://switchboard.db?mode=rwc".to_string(),
                table: "authorizations".to_string(),
                offline: false,
                offline_url: None,
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                scopes: "commands,chat:write".to_string(),
                verification_token: None,
                redirect_uri: None,
                authorize_url: "https://slack.com/oauth/v2/authorize".to_string(),
                api_base_url: "https://slack.com/api".to_string(),
                ignore_bots: false,
            },
            install: InstallConfig { redirect_url: String::new() },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
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
                options.config_path.unwrap_or_else(|| PathBuf::from("switchboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(storage) = patch.storage {
            if let Some(url) = storage.url {
                self.storage.url = url;
            }
            if let Some(table) = storage.table {
                self.storage.table = table;
            }
            if let Some(offline) = storage.offline {
                self.storage.offline = offline;
            }
            if let Some(offline_url) = storage.offline_url {
                self.storage.offline_url = Some(offline_url);
            }
            if let Some(max_connections) = storage.max_connections {
                self.storage.max_connections = max_connections;
            }
            if let Some(timeout_secs) = storage.timeout_secs {
                self.storage.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(client_id) = slack.client_id {
                self.slack.client_id = client_id;
            }
            if let Some(client_secret_value) = slack.client_secret {
                self.slack.client_secret = secret_value(client_secret_value);
            }
            if let Some(scopes) = slack.scopes {
                self.slack.scopes = scopes;
            }
            if let Some(verification_token_value) = slack.verification_token {
                self.slack.verification_token = Some(secret_value(verification_token_value));
            }
            if let Some(redirect_uri) = slack.redirect_uri {
                self.slack.redirect_uri = Some(redirect_uri);
            }
            if let Some(authorize_url) = slack.authorize_url {
                self.slack.authorize_url = authorize_url;
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(ignore_bots) = slack.ignore_bots {
                self.slack.ignore_bots = ignore_bots;
            }
        }

        if let Some(install) = patch.install {
            if let Some(redirect_url) = install.redirect_url {
                self.install.redirect_url = redirect_url;
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
        if let Some(value) = read_env("SWITCHBOARD_STORAGE_URL") {
            self.storage.url = value;
        }
        if let Some(value) = read_env_alias("SWITCHBOARD_STORAGE_TABLE", "TABLE_NAME") {
            self.storage.table = value;
        }
        if let Some(value) = read_env_alias("SWITCHBOARD_STORAGE_OFFLINE", "IS_OFFLINE") {
            self.storage.offline = parse_bool("SWITCHBOARD_STORAGE_OFFLINE", &value)?;
        }
        if let Some(value) =
            read_env_alias("SWITCHBOARD_STORAGE_OFFLINE_URL", "CONFIG_DYNAMODB_ENDPOINT")
        {
            self.storage.offline_url = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_STORAGE_MAX_CONNECTIONS") {
            self.storage.max_connections =
                parse_u32("SWITCHBOARD_STORAGE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_STORAGE_TIMEOUT_SECS") {
            self.storage.timeout_secs = parse_u64("SWITCHBOARD_STORAGE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env_alias("SWITCHBOARD_SLACK_CLIENT_ID", "CLIENT_ID") {
            self.slack.client_id = value;
        }
        if let Some(value) = read_env_alias("SWITCHBOARD_SLACK_CLIENT_SECRET", "CLIENT_SECRET") {
            self.slack.client_secret = secret_value(value);
        }
        if let Some(value) = read_env_alias("SWITCHBOARD_SLACK_SCOPES", "CLIENT_SCOPES") {
            self.slack.scopes = value;
        }
        if let Some(value) =
            read_env_alias("SWITCHBOARD_SLACK_VERIFICATION_TOKEN", "VERIFICATION_TOKEN")
        {
            self.slack.verification_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_SLACK_REDIRECT_URI") {
            self.slack.redirect_uri = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_SLACK_AUTHORIZE_URL") {
            self.slack.authorize_url = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_SLACK_IGNORE_BOTS") {
            self.slack.ignore_bots = parse_bool("SWITCHBOARD_SLACK_IGNORE_BOTS", &value)?;
        }

        if let Some(value) = read_env_alias("SWITCHBOARD_INSTALL_REDIRECT", "INSTALL_REDIRECT") {
            self.install.redirect_url = value;
        }

        if let Some(value) = read_env("SWITCHBOARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_SERVER_PORT") {
            self.server.port = parse_u16("SWITCHBOARD_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SWITCHBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SWITCHBOARD_LOGGING_LEVEL").or_else(|| read_env("SWITCHBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SWITCHBOARD_LOGGING_FORMAT").or_else(|| read_env("SWITCHBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(storage_url) = overrides.storage_url {
            self.storage.url = storage_url;
        }
        if let Some(storage_table) = overrides.storage_table {
            self.storage.table = storage_table;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(client_id) = overrides.slack_client_id {
            self.slack.client_id = client_id;
        }
        if let Some(client_secret) = overrides.slack_client_secret {
            self.slack.client_secret = secret_value(client_secret);
        }
        if let Some(verification_token) = overrides.slack_verification_token {
            self.slack.verification_token = Some(secret_value(verification_token));
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(ignore_bots) = overrides.slack_ignore_bots {
            self.slack.ignore_bots = ignore_bots;
        }
        if let Some(redirect_url) = overrides.install_redirect_url {
            self.install.redirect_url = redirect_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_storage(&self.storage)?;
        validate_slack(&self.slack)?;
        validate_install(&self.install)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("switchboard.toml"), PathBuf::from("config/switchboard.toml")]
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

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.offline && storage.offline_url.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(ConfigError::Validation(
            "storage.offline is true but storage.offline_url is not configured".to_string(),
        ));
    }

    let url = storage.effective_url().trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        let key = if storage.offline { "storage.offline_url" } else { "storage.url" };
        return Err(ConfigError::Validation(format!(
            "{key} must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`), got `{url}`"
        )));
    }

    if !is_sql_identifier(&storage.table) {
        return Err(ConfigError::Validation(format!(
            "storage.table `{}` must contain only ASCII letters, digits and underscores",
            storage.table
        )));
    }

    if storage.max_connections == 0 {
        return Err(ConfigError::Validation(
            "storage.max_connections must be greater than zero".to_string(),
        ));
    }

    if storage.timeout_secs == 0 || storage.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "storage.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

/// True when `name` can be spliced into SQL as a bare table name.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_id is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App Credentials".to_string()
        ));
    }

    if slack.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App Credentials".to_string()
        ));
    }

    if slack.scopes.trim().is_empty() {
        return Err(ConfigError::Validation("slack.scopes must not be empty".to_string()));
    }

    let empty_token = slack
        .verification_token
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if empty_token {
        return Err(ConfigError::Validation(
            "slack.verification_token must not be blank when set".to_string(),
        ));
    }

    for (key, value) in [
        ("slack.authorize_url", Some(slack.authorize_url.as_str())),
        ("slack.api_base_url", Some(slack.api_base_url.as_str())),
        ("slack.redirect_uri", slack.redirect_uri.as_deref()),
    ] {
        if let Some(value) = value {
            if !is_http_url(value) {
                return Err(ConfigError::Validation(format!(
                    "{key} must start with http:// or https://"
                )));
            }
        }
    }

    Ok(())
}

fn validate_install(install: &InstallConfig) -> Result<(), ConfigError> {
    if install.redirect_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "install.redirect_url is required (where users land after installing the app)"
                .to_string(),
        ));
    }

    if !is_http_url(&install.redirect_url) {
        return Err(ConfigError::Validation(
            "install.redirect_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
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

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_alias(key: &str, legacy_key: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(legacy_key))
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    slack: Option<SlackPatch>,
    install: Option<InstallPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    url: Option<String>,
    table: Option<String>,
    offline: Option<bool>,
    offline_url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    scopes: Option<String>,
    verification_token: Option<String>,
    redirect_uri: Option<String>,
    authorize_url: Option<String>,
    api_base_url: Option<String>,
    ignore_bots: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct InstallPatch {
    redirect_url: Option<String>,
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

    use super::{is_sql_identifier, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: &[&str] = &[
        "SWITCHBOARD_SLACK_CLIENT_ID",
        "SWITCHBOARD_SLACK_CLIENT_SECRET",
        "SWITCHBOARD_INSTALL_REDIRECT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_required_vars() {
        env::set_var("SWITCHBOARD_SLACK_CLIENT_ID", "1234.5678");
        env::set_var("SWITCHBOARD_SLACK_CLIENT_SECRET", "client-secret-value");
        env::set_var("SWITCHBOARD_INSTALL_REDIRECT", "https://example.com/installed");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SLACK_CLIENT_SECRET", "secret-from-env");
        env::set_var("TEST_VERIFICATION_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchboard.toml");
            fs::write(
                &path,
                r#"
[slack]
client_id = "1234.5678"
client_secret = "${TEST_SLACK_CLIENT_SECRET}"
verification_token = "${TEST_VERIFICATION_TOKEN}"

[install]
redirect_url = "https://example.com/installed"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.slack.client_secret.expose_secret() == "secret-from-env",
                "client secret should be loaded from environment",
            )?;
            ensure(
                config
                    .slack
                    .verification_token
                    .as_ref()
                    .map(|token| token.expose_secret() == "token-from-env")
                    .unwrap_or(false),
                "verification token should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_SLACK_CLIENT_SECRET", "TEST_VERIFICATION_TOKEN"]);
        result
    }

    #[test]
    fn legacy_deployment_variables_are_honored() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLIENT_ID", "legacy-client");
        env::set_var("CLIENT_SECRET", "legacy-secret");
        env::set_var("CLIENT_SCOPES", "bot,commands");
        env::set_var("INSTALL_REDIRECT", "https://example.com/legacy");
        env::set_var("VERIFICATION_TOKEN", "legacy-token");
        env::set_var("TABLE_NAME", "slack_teams");
        env::set_var("IS_OFFLINE", "true");
        env::set_var("CONFIG_DYNAMODB_ENDPOINT", "sqlite::memory:");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.slack.client_id == "legacy-client", "CLIENT_ID should apply")?;
            ensure(config.slack.scopes == "bot,commands", "CLIENT_SCOPES should apply")?;
            ensure(
                config.install.redirect_url == "https://example.com/legacy",
                "INSTALL_REDIRECT should apply",
            )?;
            ensure(config.storage.table == "slack_teams", "TABLE_NAME should apply")?;
            ensure(
                config.storage.effective_url() == "sqlite::memory:",
                "offline endpoint should replace the storage url",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "CLIENT_ID",
            "CLIENT_SECRET",
            "CLIENT_SCOPES",
            "INSTALL_REDIRECT",
            "VERIFICATION_TOKEN",
            "TABLE_NAME",
            "IS_OFFLINE",
            "CONFIG_DYNAMODB_ENDPOINT",
        ]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("SWITCHBOARD_LOG_LEVEL", "warn");
        env::set_var("SWITCHBOARD_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["SWITCHBOARD_LOG_LEVEL", "SWITCHBOARD_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SWITCHBOARD_STORAGE_URL", "sqlite://from-env.db");
        env::set_var("SWITCHBOARD_SLACK_CLIENT_ID", "client-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchboard.toml");
            fs::write(
                &path,
                r#"
[storage]
url = "sqlite://from-file.db"

[slack]
client_id = "client-from-file"
client_secret = "secret-from-file"

[install]
redirect_url = "https://example.com/from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    storage_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.storage.url == "sqlite://from-override.db",
                "override storage url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.slack.client_id == "client-from-env",
                "env client id should win over file and defaults",
            )?;
            ensure(
                config.slack.client_secret.expose_secret() == "secret-from-file",
                "file client secret should win over defaults",
            )?;
            ensure(
                config.install.redirect_url == "https://example.com/from-file",
                "file install redirect should apply",
            )?;
            Ok(())
        })();

        clear_vars(&["SWITCHBOARD_STORAGE_URL", "SWITCHBOARD_SLACK_CLIENT_ID"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SWITCHBOARD_SLACK_CLIENT_SECRET", "client-secret-value");
        env::set_var("SWITCHBOARD_INSTALL_REDIRECT", "https://example.com/installed");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("slack.client_id")
            );
            ensure(has_message, "validation failure should mention slack.client_id")
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn non_sqlite_offline_endpoint_names_the_offline_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("IS_OFFLINE", "true");
        env::set_var("CONFIG_DYNAMODB_ENDPOINT", "http://localhost:8000");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("http offline endpoint should fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message)
                        if message.starts_with("storage.offline_url must be a sqlite URL")
                            && message.contains("http://localhost:8000")
                ),
                "validation failure should name storage.offline_url and the rejected value",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["IS_OFFLINE", "CONFIG_DYNAMODB_ENDPOINT"]);
        result
    }

    #[test]
    fn offline_mode_requires_local_endpoint() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("SWITCHBOARD_STORAGE_OFFLINE", "TRUE");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("offline mode without endpoint should fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("storage.offline_url")
                ),
                "validation failure should mention storage.offline_url",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["SWITCHBOARD_STORAGE_OFFLINE"]);
        result
    }

    #[test]
    fn table_names_must_be_plain_identifiers() {
        assert!(is_sql_identifier("authorizations"));
        assert!(is_sql_identifier("_slack_teams_v2"));
        assert!(!is_sql_identifier(""));
        assert!(!is_sql_identifier("2fast"));
        assert!(!is_sql_identifier("teams; DROP TABLE x"));
        assert!(!is_sql_identifier("my-table"));
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("SWITCHBOARD_SLACK_VERIFICATION_TOKEN", "verification-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("client-secret-value"),
                "debug output should not contain client secret",
            )?;
            ensure(
                !debug.contains("verification-secret-value"),
                "debug output should not contain verification token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["SWITCHBOARD_SLACK_VERIFICATION_TOKEN"]);
        result
    }
}
