use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::utm::{DEFAULT_ALLOWED_SUFFIXES, DEFAULT_SESSION_KEY};

/// Prefix of environment variables read by the `config` layer,
/// e.g. `UTM_PARAMETER_SERVER__PORT=8000`.
pub const ENV_PREFIX: &str = "UTM_PARAMETER";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Session key the UTM parameters are stored under
    #[arg(long, env = "UTM_SESSION_KEY")]
    pub session_key: Option<String>,

    /// Let later requests overwrite stored UTM parameters
    #[arg(long, env = "OVERRIDE_UTM_PARAMETERS")]
    pub override_utm_parameters: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tracking: TrackingConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    pub session_key: String,
    pub override_utm_parameters: bool,
    pub allowed_utm_parameters: Vec<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            session_key: DEFAULT_SESSION_KEY.to_string(),
            override_utm_parameters: false,
            allowed_utm_parameters: DEFAULT_ALLOWED_SUFFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "utm_session".to_string(),
            idle_timeout_secs: 30 * 60,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let tracking = TrackingConfig::default();
        let session = SessionConfig::default();

        // 1. Defaults
        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("tracking.session_key", tracking.session_key)?
            .set_default(
                "tracking.override_utm_parameters",
                tracking.override_utm_parameters,
            )?
            .set_default(
                "tracking.allowed_utm_parameters",
                tracking.allowed_utm_parameters,
            )?
            .set_default("session.cookie_name", session.cookie_name)?
            .set_default("session.idle_timeout_secs", session.idle_timeout_secs)?;

        // 2. Config file: explicit path must exist, ./config.* is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Environment (UTM_PARAMETER_TRACKING__SESSION_KEY, ...)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("tracking.allowed_utm_parameters")
                .try_parsing(true),
        );

        // 4. CLI flags and their env fallbacks win over everything else
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(key) = cli.session_key {
            builder = builder.set_override("tracking.session_key", key)?;
        }
        if let Some(flag) = cli.override_utm_parameters {
            builder = builder.set_override("tracking.override_utm_parameters", flag)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
