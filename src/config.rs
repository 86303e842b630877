//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default directory for the persisted system file.
const DEFAULT_DATA_DIR: &str = "./data";

/// Bot configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Discord user id of the single authorized owner.
    pub owner_id: String,
    /// Bot token used for both the REST API and the gateway.
    pub bot_token: SecretString,
    /// Application (client) id, needed to register slash commands.
    pub client_id: String,
    /// Directory holding `system.json`.
    pub data_dir: PathBuf,
}

impl BotConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` is the production path.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let owner_id = required("USER_ID")?;
        let bot_token = SecretString::from(required("BOT_TOKEN")?);
        let client_id = required("CLIENT_ID")?;

        if !owner_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidValue {
                key: "USER_ID".into(),
                message: format!("expected a numeric Discord user id, got {owner_id:?}"),
            });
        }

        let data_dir = lookup("PLURAL_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self {
            owner_id,
            bot_token,
            client_id,
            data_dir,
        })
    }
}
