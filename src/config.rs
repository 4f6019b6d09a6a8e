use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Assumed average driver speed used for ETA estimates.
    pub avg_speed_kmph: f64,
    pub container_port_start: u16,
    pub container_port_end: u16,
    pub container_image: String,
    pub container_internal_port: u16,
    pub provision_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 8000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            avg_speed_kmph: parse_or_default("AVG_SPEED_KMPH", 30.0)?,
            container_port_start: parse_or_default("CONTAINER_PORT_START", 9000)?,
            container_port_end: parse_or_default("CONTAINER_PORT_END", 9999)?,
            container_image: env::var("CONTAINER_IMAGE")
                .unwrap_or_else(|_| "ride-sandbox:latest".to_string()),
            container_internal_port: parse_or_default("CONTAINER_INTERNAL_PORT", 8000)?,
            provision_timeout: Duration::from_secs(parse_or_default(
                "PROVISION_TIMEOUT_SECS",
                20,
            )?),
        };

        if config.container_port_start > config.container_port_end {
            return Err(AppError::Internal(format!(
                "invalid container port range {}-{}",
                config.container_port_start, config.container_port_end
            )));
        }

        if config.avg_speed_kmph <= 0.0 {
            return Err(AppError::Internal(
                "AVG_SPEED_KMPH must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
