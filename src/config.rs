//! Application configuration loaded from the environment. Every knob has
//! a default so a bare environment still boots.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let format = match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "plain" | "pretty" | "text" => LogFormat::Plain,
            other => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    message: format!("expected json or plain, got {other}"),
                })
            }
        };
        Ok(Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub initiate_timeout: Duration,
}

impl ProviderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secs = parse_env("PROVIDER_TIMEOUT_SECS", 30u64)?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                name: "PROVIDER_TIMEOUT_SECS",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            initiate_timeout: Duration::from_secs(secs),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Whether deliveries that fail on our side (unknown transaction,
    /// store error) are still acknowledged to the provider. Defaults to
    /// true: redelivery rarely changes the outcome and retry storms are
    /// worse than a logged loss.
    pub ack_internal_failures: bool,
}

impl CallbackConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ack_internal_failures: parse_env("CALLBACK_ACK_INTERNAL_FAILURES", true)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HousekeepingConfig {
    pub reset_interval: Duration,
}

impl HousekeepingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        // 30 days; production deployments pin this to a calendar schedule.
        let secs = parse_env("MONTHLY_RESET_INTERVAL_SECS", 30 * 24 * 3600u64)?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                name: "MONTHLY_RESET_INTERVAL_SECS",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            reset_interval: Duration::from_secs(secs),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub provider: ProviderConfig,
    pub callback: CallbackConfig,
    pub housekeeping: HousekeepingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            logging: LoggingConfig::from_env()?,
            provider: ProviderConfig::from_env()?,
            callback: CallbackConfig::from_env()?,
            housekeeping: HousekeepingConfig::from_env()?,
        })
    }
}

fn parse_env<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|err| ConfigError::Invalid {
            name,
            message: format!("{err}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let provider = ProviderConfig::from_env().unwrap();
        assert_eq!(provider.initiate_timeout, Duration::from_secs(30));

        let callback = CallbackConfig::from_env().unwrap();
        assert!(callback.ack_internal_failures);
    }
}
