//! Environment-driven configuration structures shared by all binaries.

use std::{env, fmt};

use thiserror::Error;

use crate::model::{validate_address, DEFAULT_NATIVE_UNITS_PER_WHOLE, NATIVE_ASSET_SENTINEL};

pub const DEFAULT_SIGNATURE_HEADER: &str = "x-signature";

/// Values the ingest pipeline consumes: the webhook signing secret and the
/// account/asset being watched.
#[derive(Clone, PartialEq, Eq)]
pub struct IngestConfig {
    webhook_secret: String,
    monitored_address: String,
    monitored_asset: String,
    native_units_per_whole: u64,
}

impl IngestConfig {
    pub fn new(
        webhook_secret: impl Into<String>,
        monitored_address: impl Into<String>,
        monitored_asset: impl Into<String>,
        native_units_per_whole: u64,
    ) -> Result<Self, ConfigError> {
        let monitored_address = monitored_address.into();
        let monitored_asset = monitored_asset.into();
        validate_address(&monitored_address).map_err(|err| ConfigError::InvalidValue {
            key: "MONITORED_ADDRESS",
            reason: err.to_string(),
        })?;
        validate_address(&monitored_asset).map_err(|err| ConfigError::InvalidValue {
            key: "MONITORED_ASSET",
            reason: err.to_string(),
        })?;
        if native_units_per_whole == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NATIVE_UNITS_PER_WHOLE",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            webhook_secret: webhook_secret.into(),
            monitored_address,
            monitored_asset,
            native_units_per_whole,
        })
    }

    /// Loads only the environment variables required by the pipeline.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let native_units_per_whole = match get_optional_var("NATIVE_UNITS_PER_WHOLE") {
            Some(raw) => raw.parse().map_err(|source| ConfigError::InvalidNumber {
                key: "NATIVE_UNITS_PER_WHOLE",
                source,
            })?,
            None => DEFAULT_NATIVE_UNITS_PER_WHOLE,
        };

        Self::new(
            get_required_var("WEBHOOK_SECRET")?,
            get_required_var("MONITORED_ADDRESS")?,
            get_optional_var("MONITORED_ASSET")
                .unwrap_or_else(|| NATIVE_ASSET_SENTINEL.to_string()),
            native_units_per_whole,
        )
    }

    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    pub fn monitored_address(&self) -> &str {
        &self.monitored_address
    }

    pub fn monitored_asset(&self) -> &str {
        &self.monitored_asset
    }

    pub fn native_units_per_whole(&self) -> u64 {
        self.native_units_per_whole
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("webhook_secret", &"<redacted>")
            .field("monitored_address", &self.monitored_address)
            .field("monitored_asset", &self.monitored_asset)
            .field("native_units_per_whole", &self.native_units_per_whole)
            .finish()
    }
}

/// API binary configuration: HTTP bind, signature header name, chain RPC
/// endpoint, plus the pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    api_bind_address: String,
    signature_header: String,
    rpc_url: String,
    ingest: IngestConfig,
}

impl ApiConfig {
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            signature_header: get_optional_var("WEBHOOK_SIGNATURE_HEADER")
                .map(|header| header.to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string()),
            rpc_url: get_required_var("SOLANA_RPC_URL")?,
            ingest: IngestConfig::load_from_env()?,
        })
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn signature_header(&self) -> &str {
        &self.signature_header
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn ingest(&self) -> &IngestConfig {
        &self.ingest
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("TRANSFER_WATCH_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid value in `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    const ADDRESS: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn set_env() {
        env::set_var("TRANSFER_WATCH_SKIP_DOTENV", "1");
        env::set_var("API_BIND_ADDRESS", "127.0.0.1:8080");
        env::set_var("SOLANA_RPC_URL", "http://localhost:8899");
        env::set_var("WEBHOOK_SECRET", "topsecret");
        env::set_var("MONITORED_ADDRESS", ADDRESS);
        env::remove_var("MONITORED_ASSET");
        env::remove_var("NATIVE_UNITS_PER_WHOLE");
        env::remove_var("WEBHOOK_SIGNATURE_HEADER");
    }

    #[test]
    fn config_loader_reads_env_with_defaults() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();

        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.api_bind_address(), "127.0.0.1:8080");
        assert_eq!(config.signature_header(), DEFAULT_SIGNATURE_HEADER);
        assert_eq!(config.ingest().monitored_address(), ADDRESS);
        assert_eq!(config.ingest().monitored_asset(), NATIVE_ASSET_SENTINEL);
        assert_eq!(
            config.ingest().native_units_per_whole(),
            DEFAULT_NATIVE_UNITS_PER_WHOLE
        );
    }

    #[test]
    fn overrides_are_honoured() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        env::set_var("NATIVE_UNITS_PER_WHOLE", "1000");
        env::set_var("WEBHOOK_SIGNATURE_HEADER", "X-Helius-Signature");

        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.ingest().native_units_per_whole(), 1000);
        assert_eq!(config.signature_header(), "x-helius-signature");

        set_env();
    }

    #[test]
    fn empty_required_env_var_is_treated_as_missing() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        env::set_var("WEBHOOK_SECRET", "   ");

        let err = IngestConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "WEBHOOK_SECRET"
            }
        ));

        set_env();
    }

    #[test]
    fn rejects_zero_unit_constant_and_bad_address() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        env::set_var("NATIVE_UNITS_PER_WHOLE", "0");
        assert!(matches!(
            IngestConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidValue {
                key: "NATIVE_UNITS_PER_WHOLE",
                ..
            }
        ));

        set_env();
        env::set_var("NATIVE_UNITS_PER_WHOLE", "lots");
        assert!(matches!(
            IngestConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidNumber { .. }
        ));

        set_env();
        env::set_var("MONITORED_ADDRESS", "not-an-address");
        assert!(matches!(
            IngestConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidValue {
                key: "MONITORED_ADDRESS",
                ..
            }
        ));

        set_env();
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = IngestConfig::new("hunter2", ADDRESS, NATIVE_ASSET_SENTINEL, 10).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
