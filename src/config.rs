// config.rs - Client Configuration

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::chat::{DEFAULT_CATCH_UP_THRESHOLD, DEFAULT_MAX_INTRO_FETCHES};
use crate::chatroom::{ChatroomDiscovery, DEFAULT_DISCOVERY_INTERVAL_MS, DEFAULT_REFRESH_MS};
use crate::name::{Name, NameError};
use crate::observability::{MetricsConfig, TracingConfig};
use crate::policy::PolicyError;
use crate::session::SessionSettings;
use crate::validator::{Validator, DEFAULT_STEP_LIMIT};

/// Prefix of environment overrides, e.g. `CHRONOS_STEP_LIMIT=5`
pub const ENV_PREFIX: &str = "CHRONOS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid name in config: {0}")]
    Name(#[from] NameError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
}

/// Client settings
///
/// Sources, later ones winning: built-in defaults, an optional TOML file,
/// `CHRONOS_*` environment variables (`__` separates nested keys).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum certificate fetches per validation chain
    pub step_limit: usize,

    pub invitation_retries: u32,

    pub fetch_retries: u32,

    pub catch_up_threshold: u64,

    /// Introduction certificates fetched per sync update at most
    pub max_intro_fetches: u64,

    /// Freshness of published chat data (ms)
    pub freshness_ms: u64,

    pub broadcast_root: String,

    pub local_prefix: String,

    /// Floor on the refresh period of discovered chatrooms (ms)
    pub discovery_refresh_ms: u64,

    /// Pause between discovery rounds (ms)
    pub discovery_interval_ms: u64,

    /// Contact store location
    pub data_dir: PathBuf,

    pub tracing: TracingConfig,

    pub metrics: MetricsConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            invitation_retries: 7,
            fetch_retries: 2,
            catch_up_threshold: DEFAULT_CATCH_UP_THRESHOLD,
            max_intro_fetches: DEFAULT_MAX_INTRO_FETCHES,
            freshness_ms: 60_000,
            broadcast_root: "/ndn/broadcast".into(),
            local_prefix: "/private/local".into(),
            discovery_refresh_ms: DEFAULT_REFRESH_MS,
            discovery_interval_ms: DEFAULT_DISCOVERY_INTERVAL_MS,
            data_dir: PathBuf::from("./data"),
            tracing: TracingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl ChatConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// HELLO interval: three quarters of the freshness period
    pub fn hello_interval_ms(&self) -> u64 {
        self.freshness_ms * 3 / 4
    }

    /// Roster entries silent for three freshness periods are stale
    pub fn stale_after_ms(&self) -> i64 {
        (self.freshness_ms as i64).saturating_mul(3)
    }

    pub fn broadcast_root(&self) -> Result<Name, ConfigError> {
        Ok(Name::from_uri(&self.broadcast_root)?)
    }

    pub fn local_prefix(&self) -> Result<Name, ConfigError> {
        Ok(Name::from_uri(&self.local_prefix)?)
    }

    pub fn validator(&self) -> Result<Validator, ConfigError> {
        Ok(Validator::new(&self.broadcast_root()?, self.step_limit)?)
    }

    pub fn discovery(&self) -> Result<ChatroomDiscovery, ConfigError> {
        Ok(ChatroomDiscovery::new(&self.broadcast_root()?)
            .with_intervals(self.discovery_refresh_ms, self.discovery_interval_ms))
    }

    pub fn session_settings(
        &self,
        chatroom: impl Into<String>,
        nick: impl Into<String>,
    ) -> Result<SessionSettings, ConfigError> {
        Ok(SessionSettings {
            chatroom: chatroom.into(),
            nick: nick.into(),
            local_prefix: self.local_prefix()?,
            broadcast_root: self.broadcast_root()?,
            fetch_retries: self.fetch_retries,
            invitation_retries: self.invitation_retries,
            catch_up_threshold: self.catch_up_threshold,
            max_intro_fetches: self.max_intro_fetches,
            freshness_ms: self.freshness_ms,
            hello_interval_ms: self.hello_interval_ms(),
            stale_after_ms: self.stale_after_ms(),
        })
    }
}
