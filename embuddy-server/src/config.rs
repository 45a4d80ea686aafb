//! Server configuration, loaded from `EMBUDDY_*` environment variables.

use embuddy_core::{BuddyError, BuddyResult, PipelineConfig};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8050,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> BuddyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Unset variables
    /// keep their defaults; unparsable ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BuddyResult<Self> {
        let mut config = ServerConfig::default();
        if let Some(host) = lookup("EMBUDDY_HOST") {
            config.host = host;
        }
        override_from(&lookup, "EMBUDDY_PORT", &mut config.port)?;
        override_from(&lookup, "EMBUDDY_MAX_UPLOAD_BYTES", &mut config.pipeline.max_upload_bytes)?;
        override_from(&lookup, "EMBUDDY_FIELD_SAMPLE_SIZE", &mut config.pipeline.field_sample_size)?;
        override_from(&lookup, "EMBUDDY_DEFAULT_FETCH_LIMIT", &mut config.pipeline.default_fetch_limit)?;
        override_from(&lookup, "EMBUDDY_MAX_FETCH_LIMIT", &mut config.pipeline.max_fetch_limit)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> BuddyResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| BuddyError::Configuration(format!("invalid listen address {}:{}: {}", self.host, self.port, e)))
    }
}

fn override_from<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) -> BuddyResult<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| BuddyError::Configuration(format!("{}='{}': {}", key, raw, e)))?;
    }
    Ok(())
}
