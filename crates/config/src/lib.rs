//! Configuration loading, validation, and management for Wayfarer.
//!
//! Loads configuration from `~/.wayfarer/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.wayfarer/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Game server connection (informational, used by bridges)
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Pursuit deadlines and arrival tolerance
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Stall detection by position sampling
    #[serde(default)]
    pub stall: StallConfig,

    /// Candidate search and retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Furnace wait estimation and fuel preference
    #[serde(default)]
    pub smelting: SmeltingConfig,

    /// Per-agent session behavior
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_game_version")]
    pub version: String,
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    25565
}
fn default_username() -> String {
    "Wayfarer".into()
}
fn default_game_version() -> String {
    "1.20.1".into()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            version: default_game_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Deadline for free navigation (`go_to`, `follow_entity`)
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Deadline for short approach goals inside compound tasks
    #[serde(default = "default_approach_deadline_ms")]
    pub approach_deadline_ms: u64,

    /// Deadline for the `can_reach` probe
    #[serde(default = "default_reach_probe_ms")]
    pub reach_probe_ms: u64,

    /// Deadline for the `compute_path_to` probe
    #[serde(default = "default_path_probe_ms")]
    pub path_probe_ms: u64,

    /// Distance under which an unfinished pursuit counts as near enough
    #[serde(default = "default_arrival_epsilon")]
    pub arrival_epsilon: f64,

    /// Radius of proximity goals used to approach world objects
    #[serde(default = "default_approach_radius")]
    pub approach_radius: f64,
}

fn default_deadline_ms() -> u64 {
    120_000
}
fn default_approach_deadline_ms() -> u64 {
    30_000
}
fn default_reach_probe_ms() -> u64 {
    3_000
}
fn default_path_probe_ms() -> u64 {
    5_000
}
fn default_arrival_epsilon() -> f64 {
    2.0
}
fn default_approach_radius() -> f64 {
    3.0
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            approach_deadline_ms: default_approach_deadline_ms(),
            reach_probe_ms: default_reach_probe_ms(),
            path_probe_ms: default_path_probe_ms(),
            arrival_epsilon: default_arrival_epsilon(),
            approach_radius: default_approach_radius(),
        }
    }
}

impl NavigationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn approach_deadline(&self) -> Duration {
        Duration::from_millis(self.approach_deadline_ms)
    }

    pub fn reach_probe(&self) -> Duration {
        Duration::from_millis(self.reach_probe_ms)
    }

    pub fn path_probe(&self) -> Duration {
        Duration::from_millis(self.path_probe_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Displacement per sample below which the sample counts as stalled
    #[serde(default = "default_stall_threshold")]
    pub threshold: f64,

    /// Consecutive stalled samples before the pursuit is declared stuck
    #[serde(default = "default_max_consecutive")]
    pub max_consecutive: u32,
}

fn default_sample_interval_ms() -> u64 {
    2_000
}
fn default_stall_threshold() -> f64 {
    0.5
}
fn default_max_consecutive() -> u32 {
    5
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            threshold: default_stall_threshold(),
            max_consecutive: default_max_consecutive(),
        }
    }
}

impl StallConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_search_radius")]
    pub search_radius: f64,

    /// Upper bound on candidates collected per world query
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Distance from which the agent can interact without moving
    #[serde(default = "default_interaction_range")]
    pub interaction_range: f64,

    #[serde(default = "default_interaction_timeout_ms")]
    pub interaction_timeout_ms: u64,

    /// Vertical offset above which candidates are penalized
    #[serde(default = "default_vertical_penalty_threshold")]
    pub vertical_penalty_threshold: f64,

    /// Multiplier applied to the vertical offset when penalized
    #[serde(default = "default_vertical_penalty_factor")]
    pub vertical_penalty_factor: f64,
}

fn default_max_attempts() -> usize {
    3
}
fn default_search_radius() -> f64 {
    32.0
}
fn default_max_candidates() -> usize {
    16
}
fn default_interaction_range() -> f64 {
    4.5
}
fn default_interaction_timeout_ms() -> u64 {
    15_000
}
fn default_vertical_penalty_threshold() -> f64 {
    3.0
}
fn default_vertical_penalty_factor() -> f64 {
    3.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            search_radius: default_search_radius(),
            max_candidates: default_max_candidates(),
            interaction_range: default_interaction_range(),
            interaction_timeout_ms: default_interaction_timeout_ms(),
            vertical_penalty_threshold: default_vertical_penalty_threshold(),
            vertical_penalty_factor: default_vertical_penalty_factor(),
        }
    }
}

impl RetryConfig {
    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_millis(self.interaction_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmeltingConfig {
    #[serde(default = "default_per_item_ms")]
    pub per_item_ms: u64,

    #[serde(default = "default_margin_ms")]
    pub margin_ms: u64,

    #[serde(default = "default_cap_ms")]
    pub cap_ms: u64,

    /// Fuels in order of preference
    #[serde(default = "default_fuels")]
    pub fuels: Vec<FuelConfig>,
}

/// One furnace fuel and how far a single unit of it goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelConfig {
    pub name: String,

    /// Items one unit smelts
    pub items_per_unit: f64,
}

impl FuelConfig {
    pub fn new(name: impl Into<String>, items_per_unit: f64) -> Self {
        Self {
            name: name.into(),
            items_per_unit,
        }
    }

    /// Units needed to smelt `items` items.
    pub fn units_for(&self, items: u32) -> u32 {
        (f64::from(items) / self.items_per_unit).ceil() as u32
    }
}

fn default_per_item_ms() -> u64 {
    10_000
}
fn default_margin_ms() -> u64 {
    2_000
}
fn default_cap_ms() -> u64 {
    120_000
}
fn default_fuels() -> Vec<FuelConfig> {
    vec![
        FuelConfig::new("coal", 8.0),
        FuelConfig::new("charcoal", 8.0),
        FuelConfig::new("coal_block", 80.0),
        FuelConfig::new("oak_planks", 1.5),
        FuelConfig::new("oak_log", 1.5),
        FuelConfig::new("stick", 0.5),
    ]
}

impl Default for SmeltingConfig {
    fn default() -> Self {
        Self {
            per_item_ms: default_per_item_ms(),
            margin_ms: default_margin_ms(),
            cap_ms: default_cap_ms(),
            fuels: default_fuels(),
        }
    }
}

impl SmeltingConfig {
    /// Estimated furnace completion time for `items` items, capped.
    pub fn wait_for(&self, items: u32) -> Duration {
        let estimate = u64::from(items)
            .saturating_mul(self.per_item_ms)
            .saturating_add(self.margin_ms);
        Duration::from_millis(estimate.min(self.cap_ms))
    }
}

/// What to do when a second command arrives while one is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Wait for the in-flight command to finish (default)
    #[default]
    Queue,
    /// Fail immediately with a busy error
    Reject,
}

impl std::str::FromStr for BusyPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::ValidationError(format!(
                "busy_policy must be \"queue\" or \"reject\", got \"{other}\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub busy_policy: BusyPolicy,
}

impl AppConfig {
    /// Load configuration from the default path (~/.wayfarer/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `WAYFARER_NAV_DEADLINE_MS`
    /// - `WAYFARER_MAX_ATTEMPTS`
    /// - `WAYFARER_BUSY_POLICY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = std::env::var("WAYFARER_NAV_DEADLINE_MS") {
            self.navigation.deadline_ms = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!("WAYFARER_NAV_DEADLINE_MS is not a number: {raw}"))
            })?;
        }

        if let Ok(raw) = std::env::var("WAYFARER_MAX_ATTEMPTS") {
            self.retry.max_attempts = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!("WAYFARER_MAX_ATTEMPTS is not a number: {raw}"))
            })?;
        }

        if let Ok(raw) = std::env::var("WAYFARER_BUSY_POLICY") {
            self.session.busy_policy = raw.parse()?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wayfarer")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nav = &self.navigation;
        if nav.deadline_ms == 0
            || nav.approach_deadline_ms == 0
            || nav.reach_probe_ms == 0
            || nav.path_probe_ms == 0
        {
            return Err(ConfigError::ValidationError(
                "navigation deadlines must be > 0".into(),
            ));
        }

        if nav.arrival_epsilon < 0.0 || nav.approach_radius < 0.0 {
            return Err(ConfigError::ValidationError(
                "arrival_epsilon and approach_radius must be >= 0".into(),
            ));
        }

        if self.stall.sample_interval_ms == 0 || self.stall.max_consecutive == 0 {
            return Err(ConfigError::ValidationError(
                "stall.sample_interval_ms and stall.max_consecutive must be > 0".into(),
            ));
        }

        if self.stall.threshold < 0.0 {
            return Err(ConfigError::ValidationError(
                "stall.threshold must be >= 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 || self.retry.max_candidates == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts and retry.max_candidates must be > 0".into(),
            ));
        }

        if self.retry.search_radius <= 0.0 || self.retry.interaction_range < 0.0 {
            return Err(ConfigError::ValidationError(
                "retry.search_radius must be > 0 and interaction_range >= 0".into(),
            ));
        }

        if self.smelting.cap_ms == 0 {
            return Err(ConfigError::ValidationError(
                "smelting.cap_ms must be > 0".into(),
            ));
        }

        if let Some(fuel) = self
            .smelting
            .fuels
            .iter()
            .find(|fuel| fuel.items_per_unit.is_nan() || fuel.items_per_unit <= 0.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "smelting fuel {} must smelt > 0 items per unit",
                fuel.name
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.navigation.deadline_ms, 120_000);
        assert_eq!(config.navigation.approach_deadline_ms, 30_000);
        assert_eq!(config.stall.sample_interval_ms, 2_000);
        assert_eq!(config.stall.max_consecutive, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.session.busy_policy, BusyPolicy::Queue);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.navigation.deadline_ms, config.navigation.deadline_ms);
        assert_eq!(parsed.smelting.fuels, config.smelting.fuels);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[navigation]
deadline_ms = 60000

[session]
busy_policy = "reject"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.navigation.deadline_ms, 60_000);
        assert_eq!(config.navigation.approach_deadline_ms, 30_000);
        assert_eq!(config.session.busy_policy, BusyPolicy::Reject);
        assert_eq!(config.stall.threshold, 0.5);
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_stall_interval_rejected() {
        let mut config = AppConfig::default();
        config.stall.sample_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn smelt_wait_follows_formula_and_cap() {
        let smelting = SmeltingConfig::default();
        assert_eq!(smelting.wait_for(1), Duration::from_millis(12_000));
        assert_eq!(smelting.wait_for(3), Duration::from_millis(32_000));
        assert_eq!(smelting.wait_for(64), Duration::from_millis(120_000));
    }

    #[test]
    fn fuel_units_follow_burn_value() {
        let smelting = SmeltingConfig::default();
        let units: Vec<u32> = smelting.fuels.iter().map(|fuel| fuel.units_for(3)).collect();
        assert_eq!(units, vec![1, 1, 1, 2, 2, 6]);
        assert_eq!(FuelConfig::new("coal", 8.0).units_for(9), 2);
    }

    #[test]
    fn fuels_parse_from_tables() {
        let toml_str = r#"
[[smelting.fuels]]
name = "dried_kelp_block"
items_per_unit = 20.0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.smelting.fuels, vec![FuelConfig::new("dried_kelp_block", 20.0)]);
        assert_eq!(config.smelting.per_item_ms, 10_000);
    }

    #[test]
    fn non_positive_fuel_value_rejected() {
        let mut config = AppConfig::default();
        config.smelting.fuels.push(FuelConfig::new("dirt", 0.0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dirt"));
    }

    #[test]
    fn busy_policy_parses() {
        assert_eq!("Queue".parse::<BusyPolicy>().unwrap(), BusyPolicy::Queue);
        assert_eq!("reject".parse::<BusyPolicy>().unwrap(), BusyPolicy::Reject);
        assert!("drop".parse::<BusyPolicy>().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().retry.interaction_range, 4.5);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "navigation = 12").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[navigation]"));
        assert!(toml_str.contains("120000"));
    }
}
