use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::simulation::StrategyKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub log_level: String,
    pub location_strategy: StrategyKind,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            port: parse_or_default("PORT", 10000)?,
            db_path: env::var("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("db.json")),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            location_strategy: parse_or_default("LOCATION_STRATEGY", StrategyKind::Route)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
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
