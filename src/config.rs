use std::time::Duration;

use config::Environment;
use serde::Deserialize;
use tracing::Level;

use crate::dispatch::{DispatchSettings, DEFAULT_FALLBACK_NAME};
use crate::error::Error;
use crate::transport::{Sender, SmtpConfig};

/// Server settings, read from the environment (and an optional `.env` file).
/// Keys are the upper-cased field names, e.g. `SMTP_HOST`.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Without a uri campaigns and groups are kept in memory.
    pub mongo_uri: Option<String>,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    pub jwt_secret: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_secure: bool,
    pub smtp_user: String,
    pub smtp_pass: String,
    #[serde(default = "default_smtp_timeout_secs")]
    pub smtp_timeout_secs: u64,
    pub from_email: Option<String>,
    pub from_name: Option<String>,

    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,
    #[serde(default = "default_true")]
    pub verify_transport: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".into()
}

fn default_database_name() -> String {
    "bulkmail".into()
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout_secs() -> u64 {
    10
}

fn default_send_delay_ms() -> u64 {
    100
}

fn default_checkpoint_interval() -> usize {
    5
}

fn default_fallback_name() -> String {
    DEFAULT_FALLBACK_NAME.into()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        dotenvy::dotenv().ok();

        Config::from_source(Environment::default().try_parsing(true))
    }

    pub fn from_source(source: Environment) -> Result<Config, Error> {
        let config: Config = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let required = [
            ("JWT_SECRET", &self.jwt_secret),
            ("SMTP_USER", &self.smtp_user),
            ("SMTP_PASS", &self.smtp_pass),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{} must not be empty", key)));
            }
        }

        if self.checkpoint_interval == 0 {
            return Err(Error::InvalidConfig(
                "CHECKPOINT_INTERVAL must be at least 1".into(),
            ));
        }

        self.sender()
            .mailbox()
            .map_err(|err| Error::InvalidConfig(err.to_string()))?;

        self.log_level()?;

        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, Error> {
        self.log_level
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("unknown LOG_LEVEL {}", self.log_level)))
    }

    pub fn smtp(&self) -> SmtpConfig {
        SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            secure: self.smtp_secure,
            username: self.smtp_user.clone(),
            password: self.smtp_pass.clone(),
            timeout: Duration::from_secs(self.smtp_timeout_secs),
        }
    }

    pub fn sender(&self) -> Sender {
        Sender {
            email: self
                .from_email
                .clone()
                .filter(|email| !email.trim().is_empty())
                .unwrap_or_else(|| self.smtp_user.clone()),
            name: self.from_name.clone(),
        }
    }

    pub fn dispatch(&self) -> DispatchSettings {
        let mut settings = DispatchSettings::new(self.sender());
        settings.checkpoint_interval = self.checkpoint_interval;
        settings.send_delay = Duration::from_millis(self.send_delay_ms);
        settings.fallback_name = self.fallback_name.clone();
        settings.verify_transport = self.verify_transport;
        settings
    }
}
