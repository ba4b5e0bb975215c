use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use xunimpay_authz::{Password, Role};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "XUNIMPAY_ENV";
const CONFIG_DIR_ENV: &str = "XUNIMPAY_CONFIG_DIR";
const ENV_PREFIX: &str = "XUNIMPAY";

/// Credential the application principal received before it became configurable.
pub const LEGACY_PRINCIPAL_PASSWORD: &str = "xunim123";

/// Deployment environment the bootstrap is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Which variant of the bootstrap procedure runs.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InitProfile {
    /// Indexes and seed record only.
    Basic,
    /// Also creates the application principal and stamps the seed version.
    #[default]
    Application,
}

impl InitProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            InitProfile::Basic => "basic",
            InitProfile::Application => "application",
        }
    }

    pub fn creates_principal(self) -> bool {
        matches!(self, InitProfile::Application)
    }
}

impl FromStr for InitProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(InitProfile::Basic),
            "application" => Ok(InitProfile::Application),
            other => Err(anyhow!(
                "unsupported init profile '{}'; expected basic/application",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
    #[serde(default)]
    pub principal: PrincipalSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// and `XUNIMPAY_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load from an explicit config directory and environment name.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_name() -> String {
        "xunimpay_audit".to_string()
    }

    fn default_app_name() -> String {
        "xunimpay-bootstrap".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        10_000
    }

    pub fn connect_options(&self) -> xunimpay_db::ConnectOptions {
        xunimpay_db::ConnectOptions {
            uri: self.uri.clone(),
            database: self.name.clone(),
            app_name: Some(self.app_name.clone()),
            connect_timeout: std::time::Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            name: Self::default_name(),
            app_name: Self::default_app_name(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapSettings {
    #[serde(default)]
    pub profile: InitProfile,
    #[serde(default = "BootstrapSettings::default_seed_version")]
    pub seed_version: String,
}

impl BootstrapSettings {
    fn default_seed_version() -> String {
        "1.0.0".to_string()
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            profile: InitProfile::default(),
            seed_version: Self::default_seed_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalSettings {
    #[serde(default = "PrincipalSettings::default_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<Password>,
    #[serde(default)]
    pub role: Role,
}

impl PrincipalSettings {
    fn default_user() -> String {
        "xunimpay_user".to_string()
    }

    /// Configured password, or the legacy hard-coded one when unset.
    /// The flag reports whether the legacy fallback was used.
    pub fn resolved_password(&self) -> (Password, bool) {
        match &self.password {
            Some(password) => (password.clone(), false),
            None => (Password::new(LEGACY_PRINCIPAL_PASSWORD), true),
        }
    }
}

impl Default for PrincipalSettings {
    fn default() -> Self {
        Self {
            user: Self::default_user(),
            password: None,
            role: Role::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
