use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::costing::{CostingConfig, DiscountTier};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub email: EmailConfig,
    pub server: ServerConfig,
    pub pricing: CostingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub admin_email: String,
    pub sender_name: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub admin_email: Option<String>,
    pub port: Option<u16>,
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
                url: "sqlite://aquaflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            email: EmailConfig {
                admin_email: "sales@aquaflow.example".to_string(),
                sender_name: "Aquaflow Sales".to_string(),
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            pricing: CostingConfig::default(),
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("aquaflow.toml"));
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

        if let Some(email) = patch.email {
            if let Some(admin_email) = email.admin_email {
                self.email.admin_email = admin_email;
            }
            if let Some(sender_name) = email.sender_name {
                self.email.sender_name = sender_name;
            }
            if let Some(smtp_host) = email.smtp_host {
                self.email.smtp_host = Some(smtp_host);
            }
            if let Some(smtp_port) = email.smtp_port {
                self.email.smtp_port = smtp_port;
            }
            if let Some(smtp_username) = email.smtp_username {
                self.email.smtp_username = Some(smtp_username);
            }
            if let Some(smtp_password_value) = email.smtp_password {
                self.email.smtp_password = Some(secret_value(smtp_password_value));
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

        if let Some(pricing) = patch.pricing {
            if let Some(labor_pct) = pricing.labor_pct {
                self.pricing.labor_pct = labor_pct;
            }
            if let Some(overhead_pct) = pricing.overhead_pct {
                self.pricing.overhead_pct = overhead_pct;
            }
            if let Some(profit_margin_pct) = pricing.profit_margin_pct {
                self.pricing.profit_margin_pct = profit_margin_pct;
            }
            if let Some(discount_tiers) = pricing.discount_tiers {
                self.pricing.discount_tiers = discount_tiers;
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
        if let Some(value) = read_env("AQUAFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("AQUAFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("AQUAFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("AQUAFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("AQUAFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AQUAFLOW_EMAIL_ADMIN_EMAIL") {
            self.email.admin_email = value;
        }
        if let Some(value) = read_env("AQUAFLOW_EMAIL_SENDER_NAME") {
            self.email.sender_name = value;
        }
        if let Some(value) = read_env("AQUAFLOW_EMAIL_SMTP_HOST") {
            self.email.smtp_host = Some(value);
        }
        if let Some(value) = read_env("AQUAFLOW_EMAIL_SMTP_PORT") {
            self.email.smtp_port = parse_u16("AQUAFLOW_EMAIL_SMTP_PORT", &value)?;
        }
        if let Some(value) = read_env("AQUAFLOW_EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = Some(value);
        }
        if let Some(value) = read_env("AQUAFLOW_EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = Some(secret_value(value));
        }

        if let Some(value) = read_env("AQUAFLOW_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("AQUAFLOW_SERVER_PORT") {
            self.server.port = parse_u16("AQUAFLOW_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("AQUAFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AQUAFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("AQUAFLOW_LOGGING_LEVEL").or_else(|| read_env("AQUAFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AQUAFLOW_LOGGING_FORMAT").or_else(|| read_env("AQUAFLOW_LOG_FORMAT"));
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
        if let Some(admin_email) = overrides.admin_email {
            self.email.admin_email = admin_email;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_email(&self.email)?;
        validate_server(&self.server)?;
        validate_pricing(&self.pricing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("aquaflow.toml"), PathBuf::from("config/aquaflow.toml")]
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

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if !email.admin_email.contains('@') {
        return Err(ConfigError::Validation(
            "email.admin_email must be a valid email address".to_string(),
        ));
    }

    if email.sender_name.trim().is_empty() {
        return Err(ConfigError::Validation("email.sender_name must not be empty".to_string()));
    }

    if email.smtp_port == 0 {
        return Err(ConfigError::Validation(
            "email.smtp_port must be greater than zero".to_string(),
        ));
    }

    // Credentials only make sense once a relay host is configured.
    if email.smtp_host.is_none() && email.smtp_username.is_some() {
        return Err(ConfigError::Validation(
            "email.smtp_username is set but email.smtp_host is missing".to_string(),
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

fn validate_pricing(pricing: &CostingConfig) -> Result<(), ConfigError> {
    let fraction = |name: &str, value: Decimal| {
        if value < Decimal::ZERO || value >= Decimal::ONE {
            Err(ConfigError::Validation(format!(
                "pricing.{name} must be a fraction in range 0.0..1.0"
            )))
        } else {
            Ok(())
        }
    };

    fraction("labor_pct", pricing.labor_pct)?;
    fraction("overhead_pct", pricing.overhead_pct)?;

    if pricing.profit_margin_pct < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "pricing.profit_margin_pct must not be negative".to_string(),
        ));
    }

    for tier in &pricing.discount_tiers {
        if tier.min_quantity == 0 {
            return Err(ConfigError::Validation(
                "pricing.discount_tiers min_quantity must be greater than zero".to_string(),
            ));
        }
        fraction("discount_tiers.discount_pct", tier.discount_pct)?;
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    email: Option<EmailPatch>,
    server: Option<ServerPatch>,
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    admin_email: Option<String>,
    sender_name: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    labor_pct: Option<Decimal>,
    overhead_pct: Option<Decimal>,
    profit_margin_pct: Option<Decimal>,
    discount_tiers: Option<Vec<DiscountTier>>,
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

    use rust_decimal::Decimal;
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
    fn defaults_validate_and_match_the_shipped_schedule() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.database.url == "sqlite://aquaflow.db", "default database url")?;
        ensure(config.pricing.labor_pct == Decimal::new(30, 2), "default labor percentage")?;
        ensure(config.pricing.discount_tiers.len() == 3, "three shipped discount tiers")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SMTP_PASSWORD", "relay-password-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("aquaflow.toml");
            fs::write(
                &path,
                r#"
[email]
smtp_host = "smtp.example.net"
smtp_username = "mailer"
smtp_password = "${TEST_SMTP_PASSWORD}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let password = config
                .email
                .smtp_password
                .as_ref()
                .ok_or_else(|| "smtp password should be set".to_string())?;
            ensure(
                password.expose_secret() == "relay-password-from-env",
                "smtp password should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_SMTP_PASSWORD"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUAFLOW_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("AQUAFLOW_EMAIL_ADMIN_EMAIL", "env@aquaflow.example");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("aquaflow.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[email]
admin_email = "file@aquaflow.example"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.email.admin_email == "env@aquaflow.example",
                "env admin email should win over file and defaults",
            )
        })();

        clear_vars(&["AQUAFLOW_DATABASE_URL", "AQUAFLOW_EMAIL_ADMIN_EMAIL"]);
        result
    }

    #[test]
    fn pricing_schedule_loads_from_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("aquaflow.toml");
        fs::write(
            &path,
            r#"
[pricing]
labor_pct = "0.35"
profit_margin_pct = "0.40"

[[pricing.discount_tiers]]
min_quantity = 20
discount_pct = "0.25"
"#,
        )
        .map_err(|err| err.to_string())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.pricing.labor_pct == Decimal::new(35, 2), "labor percentage from file")?;
        ensure(
            config.pricing.overhead_pct == Decimal::new(20, 2),
            "unpatched overhead keeps its default",
        )?;
        ensure(config.pricing.discount_tiers.len() == 1, "tier table replaced wholesale")?;
        ensure(config.pricing.discount_tiers[0].min_quantity == 20, "tier quantity from file")
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUAFLOW_EMAIL_ADMIN_EMAIL", "not-an-address");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("email.admin_email")
            );
            ensure(has_message, "validation failure should mention email.admin_email")
        })();

        clear_vars(&["AQUAFLOW_EMAIL_ADMIN_EMAIL"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUAFLOW_EMAIL_SMTP_HOST", "smtp.example.net");
        env::set_var("AQUAFLOW_EMAIL_SMTP_PASSWORD", "smtp-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("smtp-secret-value"),
                "debug output should not contain the smtp password",
            )
        })();

        clear_vars(&["AQUAFLOW_EMAIL_SMTP_HOST", "AQUAFLOW_EMAIL_SMTP_PASSWORD"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("/nonexistent/aquaflow.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("missing required file");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }
}
