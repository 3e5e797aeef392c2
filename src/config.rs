//! Configuration management with validation and defaults
//!
//! Loaded from an optional TOML file, then overridden from `CRASHPOINT_*`
//! environment variables, then validated as a whole.

use crate::errors::{ConfigurationError, CrashResult};
use crate::games::achievements::{Task, TaskMethod};
use crate::games::curve::CrashCurve;
use crate::games::ranking::{default_tiers, RankingTable, RankingTier};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Complete game server configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrashConfig {
    pub game: GameConfig,
    pub ranking: RankingConfig,
    pub ledger: LedgerConfig,
    pub server: ServerConfig,
    pub tasks: Vec<Task>,
}

/// Round engine tuning
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Curve acceleration in multiplier units per second squared
    pub acceleration: f64,
    pub max_win: f64,
    /// House-edge compression applied to real-money crash points
    pub edge_factor: f64,
    pub rng_retry_budget: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            acceleration: 0.05,
            max_win: 100.0,
            edge_factor: 0.95,
            rng_retry_budget: 16,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    pub tiers: Vec<RankingTier>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

/// Opening balances for accounts created by the in-memory ledger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub starting_virtual_balance: f64,
    pub starting_real_balance: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_virtual_balance: 10.0,
            starting_real_balance: 0.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl GameConfig {
    /// Check the engine tuning on its own; shared by the loader and the engine builder
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.acceleration > 0.0 && self.acceleration.is_finite()) {
            return Err(ConfigurationError::invalid(
                "game.acceleration",
                self.acceleration,
                "Acceleration must be a positive number",
            ));
        }

        if !(self.max_win >= 1.0 && self.max_win.is_finite()) {
            return Err(ConfigurationError::invalid(
                "game.max_win",
                self.max_win,
                "Maximum win must be at least 1",
            ));
        }

        // Every crash point up to max_win must map to a representable delay
        if CrashCurve::new(self.acceleration).delay_for(self.max_win).is_err() {
            return Err(ConfigurationError::invalid(
                "game.acceleration",
                self.acceleration,
                "Acceleration too small to schedule a round reaching max_win",
            ));
        }

        if !(self.edge_factor > 0.0 && self.edge_factor < 1.0) {
            return Err(ConfigurationError::invalid(
                "game.edge_factor",
                self.edge_factor,
                "Edge factor must lie strictly between 0 and 1",
            ));
        }

        if self.rng_retry_budget == 0 {
            return Err(ConfigurationError::invalid(
                "game.rng_retry_budget",
                0,
                "Retry budget cannot be zero",
            ));
        }

        Ok(())
    }
}

impl CrashConfig {
    pub fn ranking_table(&self) -> Result<RankingTable, ConfigurationError> {
        RankingTable::new(self.ranking.tiers.clone())
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Listen address overrides that take precedence over file and environment
    pub fn with_server_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        self.host = host;
        self.port = port;
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> CrashResult<CrashConfig> {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => CrashConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Self::validate(&config)?;

        Ok(config)
    }

    /// Parse configuration from TOML text without environment overrides
    pub fn from_toml_str(content: &str) -> CrashResult<CrashConfig> {
        let config: CrashConfig = toml::from_str(content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> CrashResult<CrashConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(config: &mut CrashConfig) -> CrashResult<()> {
        if let Some(value) = env_parse::<f64>("CRASHPOINT_ACCELERATION", "Invalid number")? {
            config.game.acceleration = value;
        }
        if let Some(value) = env_parse::<f64>("CRASHPOINT_MAX_WIN", "Invalid number")? {
            config.game.max_win = value;
        }
        if let Some(value) = env_parse::<f64>("CRASHPOINT_EDGE_FACTOR", "Invalid number")? {
            config.game.edge_factor = value;
        }
        if let Ok(host) = env::var("CRASHPOINT_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("CRASHPOINT_PORT", "Invalid port number")? {
            config.server.port = port;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(config: &CrashConfig) -> CrashResult<()> {
        config.game.validate()?;

        if config.server.port == 0 {
            return Err(ConfigurationError::invalid("server.port", 0, "Port cannot be zero").into());
        }

        config.ranking_table()?;

        for task in &config.tasks {
            if !(task.limit > 0.0) {
                return Err(ConfigurationError::invalid(
                    &format!("tasks[{}].limit", task.index),
                    task.limit,
                    "Task limit must be positive",
                )
                .into());
            }
            if task.method == TaskMethod::Streak && task.limit.fract() != 0.0 {
                return Err(ConfigurationError::invalid(
                    &format!("tasks[{}].limit", task.index),
                    task.limit,
                    "Streak limit must be a whole number",
                )
                .into());
            }
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, reason: &str) -> CrashResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigurationError::invalid(key, raw, reason).into()),
        Err(_) => Ok(None),
    }
}
