use std::{net::SocketAddr, num::ParseIntError};
use thiserror::Error;

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_TO_ADDRESS: &str = "allencarrierinst@gmail.com";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Port on which the SMTP server speaks TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Everything the relay needs to know about the outgoing mail server.
///
/// Loaded once at startup. Missing credentials are tolerated here and reported
/// per request, so that the landing page keeps working on a half-configured
/// deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailDispatchConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub to_address: String,
}

/// Connection parameters for one SMTP session. Only exists when both
/// credentials are known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub pass: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_address: SocketAddr,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SMTP_PORT must be a port number, got {value:?}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("BIND_ADDRESS must be a socket address, got {value:?}")]
    InvalidBindAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

impl MailDispatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let port = match get("SMTP_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            None => DEFAULT_SMTP_PORT,
        };
        Ok(Self {
            host: get("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.into()),
            port,
            user: get("SMTP_USER"),
            pass: get("SMTP_PASS"),
            to_address: get("TO_EMAIL").unwrap_or_else(|| DEFAULT_TO_ADDRESS.into()),
        })
    }

    pub fn secure(&self) -> bool {
        self.port == IMPLICIT_TLS_PORT
    }

    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        let (Some(user), Some(pass)) = (self.user.as_ref(), self.pass.as_ref()) else {
            return None;
        };
        Some(SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            secure: self.secure(),
            user: user.clone(),
            pass: pass.clone(),
        })
    }
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = lookup("BIND_ADDRESS")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.into());
        let bind_address = value
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddress { value, source })?;
        Ok(Self { bind_address })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
