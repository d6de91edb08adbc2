//! Configuration loading, validation, and management for Steward.
//!
//! Loads configuration from `~/.steward/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use steward_core::{DEFAULT_ROUTE, Domain, RouteTable, TokenBudget};

/// Longest calendar look-ahead accepted, in days.
pub const MAX_CALENDAR_HORIZON_DAYS: i64 = 366;

/// Oldest location fix a config may ask to trust, in minutes (one week).
pub const MAX_FIX_AGE_MINUTES: i64 = 7 * 24 * 60;

/// Largest total token budget accepted.
pub const MAX_BUDGET_TOKENS: usize = 1_000_000;

/// The root configuration structure.
///
/// Maps directly to `~/.steward/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Timezone used when a request does not carry one
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Cache sizing and per-domain TTLs
    #[serde(default)]
    pub cache: CacheConfig,

    /// Token budget for context assembly
    #[serde(default)]
    pub budget: TokenBudget,

    /// Assembler tuning
    #[serde(default)]
    pub assembler: AssemblerConfig,

    /// Significant-place detection
    #[serde(default)]
    pub proximity: ProximityConfig,

    /// Route overrides, layered on top of the built-in route table
    #[serde(default = "RouteTable::empty", skip_serializing_if = "RouteTable::is_empty")]
    pub routes: RouteTable,
}

fn default_timezone() -> String {
    "UTC".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default)]
    pub ttl: TtlConfig,
}

fn default_max_entries() -> usize {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl: TtlConfig::default(),
        }
    }
}

impl CacheConfig {
    /// TTL for values cached under `domain`.
    pub fn ttl_for(&self, domain: Domain) -> Duration {
        self.ttl.for_domain(domain)
    }
}

/// Per-domain TTLs, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlConfig {
    #[serde(default = "default_ttl_tasks")]
    pub tasks: u64,
    #[serde(default = "default_ttl_calendar")]
    pub calendar: u64,
    #[serde(default = "default_ttl_memory")]
    pub memory: u64,
    #[serde(default = "default_ttl_grocery")]
    pub grocery: u64,
    #[serde(default = "default_ttl_contacts")]
    pub contacts: u64,
    #[serde(default = "default_ttl_locations")]
    pub locations: u64,
    #[serde(default = "default_ttl_profile")]
    pub profile: u64,
    #[serde(default = "default_ttl_conversation")]
    pub conversation: u64,
}

fn default_ttl_tasks() -> u64 {
    60
}
fn default_ttl_calendar() -> u64 {
    120
}
fn default_ttl_memory() -> u64 {
    300
}
fn default_ttl_grocery() -> u64 {
    60
}
fn default_ttl_contacts() -> u64 {
    600
}
fn default_ttl_locations() -> u64 {
    30
}
fn default_ttl_profile() -> u64 {
    600
}
fn default_ttl_conversation() -> u64 {
    10
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            tasks: default_ttl_tasks(),
            calendar: default_ttl_calendar(),
            memory: default_ttl_memory(),
            grocery: default_ttl_grocery(),
            contacts: default_ttl_contacts(),
            locations: default_ttl_locations(),
            profile: default_ttl_profile(),
            conversation: default_ttl_conversation(),
        }
    }
}

impl TtlConfig {
    pub fn for_domain(&self, domain: Domain) -> Duration {
        let secs = match domain {
            Domain::Tasks => self.tasks,
            Domain::Calendar => self.calendar,
            Domain::Memory => self.memory,
            Domain::Grocery => self.grocery,
            Domain::Contacts => self.contacts,
            Domain::Locations => self.locations,
            Domain::Profile => self.profile,
            Domain::Conversation => self.conversation,
            // Anything spanning every domain is only as fresh as the most
            // volatile one.
            Domain::All => self.all_secs().min().unwrap_or(0),
        };
        Duration::from_secs(secs)
    }

    fn all_secs(&self) -> impl Iterator<Item = u64> {
        [
            self.tasks,
            self.calendar,
            self.memory,
            self.grocery,
            self.contacts,
            self.locations,
            self.profile,
            self.conversation,
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Token cap for the on-demand cross-domain bundle
    #[serde(default = "default_cross_domain_max_tokens")]
    pub cross_domain_max_tokens: usize,

    /// Maximum entities summarised in the cross-domain bundle
    #[serde(default = "default_cross_domain_max_entities")]
    pub cross_domain_max_entities: usize,

    /// How many recent messages are scanned for entities / rendered
    #[serde(default = "default_conversation_window")]
    pub conversation_window: usize,

    /// How far ahead the calendar bundle looks
    #[serde(default = "default_calendar_horizon_days")]
    pub calendar_horizon_days: i64,

    /// Maximum list items rendered per bundle
    #[serde(default = "default_max_list_items")]
    pub max_list_items: usize,
}

fn default_cross_domain_max_tokens() -> usize {
    800
}
fn default_cross_domain_max_entities() -> usize {
    10
}
fn default_conversation_window() -> usize {
    10
}
fn default_calendar_horizon_days() -> i64 {
    7
}
fn default_max_list_items() -> usize {
    10
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            cross_domain_max_tokens: default_cross_domain_max_tokens(),
            cross_domain_max_entities: default_cross_domain_max_entities(),
            conversation_window: default_conversation_window(),
            calendar_horizon_days: default_calendar_horizon_days(),
            max_list_items: default_max_list_items(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityConfig {
    /// Distance within which home/work/frequent places count as "here"
    #[serde(default = "default_threshold_meters")]
    pub threshold_meters: f64,

    /// Location fixes older than this are ignored
    #[serde(default = "default_max_fix_age_minutes")]
    pub max_fix_age_minutes: i64,
}

fn default_threshold_meters() -> f64 {
    150.0
}
fn default_max_fix_age_minutes() -> i64 {
    30
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold_meters: default_threshold_meters(),
            max_fix_age_minutes: default_max_fix_age_minutes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, applying env overrides.
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
        if let Ok(tz) = std::env::var("STEWARD_TIMEZONE") {
            self.default_timezone = tz;
        }

        if let Ok(raw) = std::env::var("STEWARD_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "STEWARD_CACHE_MAX_ENTRIES must be a positive integer, got {raw:?}"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".steward")
    }

    /// The built-in route table with any configured overrides applied.
    pub fn route_table(&self) -> RouteTable {
        RouteTable::defaults().merged_with(&self.routes)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be at least 1".into(),
            ));
        }

        let budget = &self.budget;
        if budget.total == 0 || budget.total > MAX_BUDGET_TOKENS {
            return Err(ConfigError::ValidationError(format!(
                "budget.total must be between 1 and {MAX_BUDGET_TOKENS}, got {}",
                budget.total
            )));
        }
        for (name, cap) in [
            ("primary", budget.primary),
            ("secondary", budget.secondary),
            ("tertiary", budget.tertiary),
        ] {
            if cap > budget.total {
                return Err(ConfigError::ValidationError(format!(
                    "budget.{name} ({cap}) exceeds budget.total ({})",
                    budget.total
                )));
            }
        }

        if self.default_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "default_timezone {:?} is not a valid IANA timezone",
                self.default_timezone
            )));
        }

        if !self.route_table().contains(DEFAULT_ROUTE) {
            return Err(ConfigError::ValidationError(format!(
                "route table must define the {DEFAULT_ROUTE:?} fallback route"
            )));
        }

        let horizon = self.assembler.calendar_horizon_days;
        if !(1..=MAX_CALENDAR_HORIZON_DAYS).contains(&horizon) {
            return Err(ConfigError::ValidationError(format!(
                "assembler.calendar_horizon_days must be between 1 and \
                 {MAX_CALENDAR_HORIZON_DAYS}, got {horizon}"
            )));
        }

        if self.proximity.threshold_meters <= 0.0 {
            return Err(ConfigError::ValidationError(
                "proximity.threshold_meters must be > 0".into(),
            ));
        }

        let max_age = self.proximity.max_fix_age_minutes;
        if !(0..=MAX_FIX_AGE_MINUTES).contains(&max_age) {
            return Err(ConfigError::ValidationError(format!(
                "proximity.max_fix_age_minutes must be between 0 and {MAX_FIX_AGE_MINUTES}, \
                 got {max_age}"
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            cache: CacheConfig::default(),
            budget: TokenBudget::default(),
            assembler: AssemblerConfig::default(),
            proximity: ProximityConfig::default(),
            routes: RouteTable::empty(),
        }
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
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.budget.total, 6000);
        assert_eq!(config.assembler.cross_domain_max_tokens, 800);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.cache.max_entries, config.cache.max_entries);
        assert_eq!(parsed.budget, config.budget);
    }

    #[test]
    fn ttl_lookup_per_domain() {
        let cache = CacheConfig::default();
        assert_eq!(cache.ttl_for(Domain::Profile), Duration::from_secs(600));
        assert_eq!(cache.ttl_for(Domain::Conversation), Duration::from_secs(10));
        assert_eq!(cache.ttl_for(Domain::All), Duration::from_secs(10));
    }

    #[test]
    fn tertiary_larger_than_total_rejected() {
        let config = AppConfig {
            budget: TokenBudget {
                tertiary: 10_000,
                ..TokenBudget::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cache_capacity_rejected() {
        let mut config = AppConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_timezone_rejected() {
        let config = AppConfig {
            default_timezone: "Mars/Olympus_Mons".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_timezone, "UTC");
    }

    #[test]
    fn route_overrides_parsed_and_merged() {
        let toml_str = r#"
default_timezone = "America/Chicago"

[budget]
primary = 1500
total = 5000

[routes."/tasks"]
primary = ["tasks", "calendar"]
secondary = []
tertiary = ["memory"]

[routes."/weather"]
primary = ["locations"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.budget.primary, 1500);
        assert_eq!(config.budget.secondary, 800);
        assert_eq!(config.budget.total, 5000);

        let table = config.route_table();
        assert_eq!(table.get("/tasks").unwrap().primary, vec!["tasks", "calendar"]);
        assert_eq!(table.get("/weather").unwrap().primary, vec!["locations"]);
        assert!(table.contains("sms"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache]\nmax_entries = 0").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache\nmax_entries = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_entries = 100"));
        assert!(toml_str.contains("threshold_meters"));
    }

    #[test]
    fn calendar_horizon_out_of_range_rejected() {
        let huge: AppConfig =
            toml::from_str("[assembler]\ncalendar_horizon_days = 1000000000000000").unwrap();
        assert!(matches!(huge.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = AppConfig::default();
        config.assembler.calendar_horizon_days = 0;
        assert!(config.validate().is_err());
        config.assembler.calendar_horizon_days = MAX_CALENDAR_HORIZON_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fix_age_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.proximity.max_fix_age_minutes = -5;
        assert!(config.validate().is_err());
        config.proximity.max_fix_age_minutes = i64::MAX;
        assert!(config.validate().is_err());
        config.proximity.max_fix_age_minutes = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_budget_rejected() {
        let config = AppConfig {
            budget: TokenBudget {
                total: usize::MAX,
                ..TokenBudget::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
