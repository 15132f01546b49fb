//! feedscale.toml configuration parser.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::ScalerDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedScaleConfig {
    pub function: FunctionConfig,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub lease_store: LeaseStoreConfig,
}

/// The monitored function and its change-feed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub id: String,
    pub database: String,
    pub container: String,
    /// Defaults to `database` when unset.
    pub lease_database: Option<String>,
    pub lease_container: String,
    /// Processor name used to select this function's leases.
    #[serde(default)]
    pub lease_prefix: String,
    /// Per-invocation batch size; `0` means unset.
    #[serde(default)]
    pub max_items_per_invocation: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    #[default]
    Vote,
    Target,
}

impl FromStr for ScalingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vote" => Ok(ScalingMode::Vote),
            "target" => Ok(ScalingMode::Target),
            other => Err(ConfigError::Invalid(format!(
                "unknown scaling mode '{other}' (expected 'vote' or 'target')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    #[serde(default)]
    pub mode: ScalingMode,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_metrics_timeout")]
    pub metrics_timeout: String,
    #[serde(default = "default_window_max_samples")]
    pub window_max_samples: usize,
    #[serde(default = "default_window_max_age")]
    pub window_max_age: String,
    #[serde(default = "default_not_found_attempts")]
    pub not_found_attempts: u32,
    /// Target-mode concurrency override.
    pub instance_concurrency: Option<i64>,
    #[serde(default = "default_initial_workers")]
    pub initial_workers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseStoreConfig {
    #[serde(default = "default_lease_store_path")]
    pub path: PathBuf,
}

fn default_interval() -> String {
    "10s".to_string()
}

fn default_metrics_timeout() -> String {
    "30s".to_string()
}

fn default_window_max_samples() -> usize {
    10
}

fn default_window_max_age() -> String {
    "2m".to_string()
}

fn default_not_found_attempts() -> u32 {
    5
}

fn default_initial_workers() -> u32 {
    1
}

fn default_lease_store_path() -> PathBuf {
    PathBuf::from("/var/lib/feedscale/leases.redb")
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            mode: ScalingMode::default(),
            interval: default_interval(),
            metrics_timeout: default_metrics_timeout(),
            window_max_samples: default_window_max_samples(),
            window_max_age: default_window_max_age(),
            not_found_attempts: default_not_found_attempts(),
            instance_concurrency: None,
            initial_workers: default_initial_workers(),
        }
    }
}

impl Default for LeaseStoreConfig {
    fn default() -> Self {
        Self {
            path: default_lease_store_path(),
        }
    }
}

impl ScalingConfig {
    pub fn interval(&self) -> ConfigResult<Duration> {
        parse_duration(&self.interval)
    }

    pub fn metrics_timeout(&self) -> ConfigResult<Duration> {
        parse_duration(&self.metrics_timeout)
    }

    pub fn window_max_age(&self) -> ConfigResult<Duration> {
        parse_duration(&self.window_max_age)
    }
}

impl FunctionConfig {
    pub fn lease_database(&self) -> &str {
        self.lease_database.as_deref().unwrap_or(&self.database)
    }

    /// `{lease_database}/{lease_container}`, as shown in logs.
    pub fn lease_location(&self) -> String {
        format!("{}/{}", self.lease_database(), self.lease_container)
    }
}

impl FeedScaleConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FeedScaleConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the scaling loop cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let f = &self.function;
        for (name, value) in [
            ("function.id", &f.id),
            ("function.database", &f.database),
            ("function.container", &f.container),
            ("function.lease_container", &f.lease_container),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }

        let s = &self.scaling;
        if s.window_max_samples == 0 {
            return Err(ConfigError::Invalid(
                "scaling.window_max_samples must be at least 1".to_string(),
            ));
        }
        if s.interval()?.is_zero() {
            return Err(ConfigError::Invalid(
                "scaling.interval must be greater than zero".to_string(),
            ));
        }
        s.metrics_timeout()?;
        s.window_max_age()?;
        Ok(())
    }

    /// Identity of the scalers built from this config.
    pub fn descriptor(&self) -> ScalerDescriptor {
        ScalerDescriptor::new(
            &self.function.id,
            &self.function.database,
            &self.function.container,
        )
    }

    /// Scaffold a minimal feedscale.toml for a function.
    pub fn scaffold(function_id: &str, database: &str, container: &str) -> Self {
        FeedScaleConfig {
            function: FunctionConfig {
                id: function_id.to_string(),
                database: database.to_string(),
                container: container.to_string(),
                lease_database: None,
                lease_container: "leases".to_string(),
                lease_prefix: String::new(),
                max_items_per_invocation: 0,
            },
            scaling: ScalingConfig::default(),
            lease_store: LeaseStoreConfig::default(),
        }
    }
}

/// Parse a duration string like "30s", "5m", or bare seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::Duration(s.to_string());
    if let Some(mins) = s.strip_suffix('m') {
        let mins = mins.parse::<u64>().map_err(|_| invalid())?;
        let secs = mins.checked_mul(60).ok_or_else(invalid)?;
        Ok(Duration::from_secs(secs))
    } else if let Some(secs) = s.strip_suffix('s') {
        Ok(Duration::from_secs(secs.parse::<u64>().map_err(|_| invalid())?))
    } else {
        Ok(Duration::from_secs(s.parse::<u64>().map_err(|_| invalid())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_roundtrips_through_toml() {
        let config = FeedScaleConfig::scaffold("orders-projection", "shop", "orders");
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("orders-projection"));
        assert!(toml_str.contains("leases"));

        let parsed: FeedScaleConfig = toml::from_str(&toml_str).unwrap();
        parsed.validate().unwrap();
        assert_eq!(parsed.scaling.mode, ScalingMode::Vote);
    }

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let toml_str = r#"
[function]
id = "fn"
database = "db"
container = "items"
lease_container = "leases"
"#;
        let config: FeedScaleConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.function.lease_database(), "db");
        assert_eq!(config.function.lease_location(), "db/leases");
        assert_eq!(config.function.max_items_per_invocation, 0);
        assert_eq!(config.scaling.interval().unwrap(), Duration::from_secs(10));
        assert_eq!(config.scaling.window_max_age().unwrap(), Duration::from_secs(120));
        assert_eq!(config.scaling.not_found_attempts, 5);
        assert_eq!(config.scaling.instance_concurrency, None);
        assert_eq!(config.descriptor().id(), "fn-changefeedtrigger-db-items");
    }

    #[test]
    fn test_parse_target_mode() {
        let toml_str = r#"
[function]
id = "fn"
database = "db"
container = "items"
lease_database = "leasedb"
lease_container = "leases"
max_items_per_invocation = 50

[scaling]
mode = "target"
instance_concurrency = 25
"#;
        let config: FeedScaleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scaling.mode, ScalingMode::Target);
        assert_eq!(config.scaling.instance_concurrency, Some(25));
        assert_eq!(config.function.lease_database(), "leasedb");
        assert_eq!(config.function.lease_location(), "leasedb/leases");
    }

    #[test]
    fn test_validate_rejects_empty_ids_and_zero_window() {
        let mut config = FeedScaleConfig::scaffold("fn", "db", "items");
        config.function.id = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = FeedScaleConfig::scaffold("fn", "db", "items");
        config.scaling.window_max_samples = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = FeedScaleConfig::scaffold("fn", "db", "items");
        config.scaling.interval = "soon".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Duration(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedscale.toml");
        let config = FeedScaleConfig::scaffold("fn", "db", "items");
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = FeedScaleConfig::from_file(&path).unwrap();
        assert_eq!(loaded.function.container, "items");

        let missing = FeedScaleConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read(_))));
    }

    #[test]
    fn test_scaling_mode_from_str() {
        assert_eq!("Target".parse::<ScalingMode>().unwrap(), ScalingMode::Target);
        assert_eq!("vote".parse::<ScalingMode>().unwrap(), ScalingMode::Vote);
        assert!("both".parse::<ScalingMode>().is_err());
    }

    #[test]
    fn test_parse_duration_values() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert!(parse_duration("invalid").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflowing_minutes() {
        assert!(matches!(
            parse_duration("999999999999999999m"),
            Err(ConfigError::Duration(_))
        ));

        let mut config = FeedScaleConfig::scaffold("fn", "db", "items");
        config.scaling.window_max_age = "999999999999999999m".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Duration(_))));
    }
}
