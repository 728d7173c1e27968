use std::env;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BODY_LIMIT_MB must be a valid integer, got {0:?}")]
    BodyLimit(String),
    #[error("PORT must be a valid number between 0 and 65535, got {0:?}")]
    Port(String),
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Reads `(body_limit_bytes, port)` from the environment.
pub fn get_env() -> Result<(usize, u16), ConfigError> {
    parse_settings(env::var("BODY_LIMIT_MB").ok(), env::var("PORT").ok())
}

fn parse_settings(
    body_limit_mb: Option<String>,
    port: Option<String>,
) -> Result<(usize, u16), ConfigError> {
    let body_limit_bytes = match body_limit_mb {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .ok_or(ConfigError::BodyLimit(raw))?,
        None => 5 * 1024 * 1024,
    };

    let port = match port {
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Port(raw))?,
        None => 5020,
    };

    Ok((body_limit_bytes, port))
}
