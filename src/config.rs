//! Configuration Module
//!
//! Handles loading and validating cache handle configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::ExpirationMode;
use crate::error::{CacheError, Result};
use crate::serialization::SerializerKind;
use crate::store::{StoreConfig, DEFAULT_HOUSEKEEPING_INTERVAL};

// == Public Constants ==
/// Instance name used when none (or a blank one) is configured
pub const DEFAULT_CACHE_NAME: &str = "defaultFileCache";

/// Cache handle configuration.
///
/// Immutable once the handle is built.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleConfig {
    /// Name of the cache instance; the file store uses it as its directory name
    pub instance_name: String,
    /// Directory the instance directory is created in
    pub base_dir: PathBuf,
    /// Codec to store items with, `None` to store live items
    pub serializer: Option<SerializerKind>,
    /// Whether the store computes its size when opened
    pub calculate_size_on_init: bool,
    /// Override for the store housekeeping interval
    pub housekeeping_interval: Option<Duration>,
    /// Expiration applied to items that do not set their own
    pub default_expiration: Option<(ExpirationMode, Duration)>,
}

impl HandleConfig {
    /// Creates a configuration for the named instance with everything else defaulted.
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            ..Self::default()
        }
    }

    /// Creates a new HandleConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FILE_CACHE_NAME` - Instance name (default: `defaultFileCache`)
    /// - `FILE_CACHE_BASE_DIR` - Parent directory of the instance (default: `.`)
    /// - `FILE_CACHE_SERIALIZER` - `json` or `none` (default: none)
    /// - `FILE_CACHE_CALCULATE_SIZE` - `true`/`false` (default: false)
    /// - `FILE_CACHE_HOUSEKEEPING_SECS` - Housekeeping interval in seconds (default: store default)
    ///
    /// Unparsable numbers and flags fall back to their defaults; an unknown
    /// serializer name is rejected.
    pub fn from_env() -> Result<Self> {
        let serializer = match env::var("FILE_CACHE_SERIALIZER") {
            Ok(name) => SerializerKind::parse(&name).ok_or_else(|| {
                CacheError::Configuration(format!("unknown serializer '{}'", name))
            })?,
            Err(_) => None,
        };

        Ok(Self {
            instance_name: env::var("FILE_CACHE_NAME")
                .unwrap_or_else(|_| DEFAULT_CACHE_NAME.to_string()),
            base_dir: env::var("FILE_CACHE_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            serializer,
            calculate_size_on_init: env::var("FILE_CACHE_CALCULATE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            housekeeping_interval: env::var("FILE_CACHE_HOUSEKEEPING_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            default_expiration: None,
        })
    }

    // == Builder Helpers ==
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_serializer(mut self, kind: SerializerKind) -> Self {
        self.serializer = Some(kind);
        self
    }

    pub fn with_calculate_size(mut self, enabled: bool) -> Self {
        self.calculate_size_on_init = enabled;
        self
    }

    pub fn with_housekeeping_interval(mut self, interval: Duration) -> Self {
        self.housekeeping_interval = Some(interval);
        self
    }

    pub fn with_expiration(mut self, mode: ExpirationMode, timeout: Duration) -> Self {
        self.default_expiration = Some((mode, timeout));
        self
    }

    // == Resolution ==
    /// Instance name with blank names replaced by the default.
    pub fn effective_name(&self) -> &str {
        if self.instance_name.trim().is_empty() {
            DEFAULT_CACHE_NAME
        } else {
            &self.instance_name
        }
    }

    /// Checks everything that would otherwise fail on first use.
    pub fn validate(&self) -> Result<()> {
        let name = self.effective_name();
        let separator = |c: char| c == '/' || c == '\\' || c == '\0';
        if name == "." || name == ".." || name.contains(separator) {
            return Err(CacheError::Configuration(format!(
                "instance name '{}' cannot be used as a directory name",
                name
            )));
        }

        if self.housekeeping_interval == Some(Duration::ZERO) {
            return Err(CacheError::Configuration(
                "housekeeping interval must be greater than zero".to_string(),
            ));
        }

        if let Some((mode, timeout)) = self.default_expiration {
            if mode != ExpirationMode::None && timeout.is_zero() {
                return Err(CacheError::Configuration(format!(
                    "default {:?} expiration needs a timeout greater than zero",
                    mode
                )));
            }
        }

        Ok(())
    }

    /// Settings handed to the store when it is opened.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            instance_name: self.effective_name().to_string(),
            base_dir: self.base_dir.clone(),
            calculate_size_on_init: self.calculate_size_on_init,
            housekeeping_interval: self
                .housekeeping_interval
                .unwrap_or(DEFAULT_HOUSEKEEPING_INTERVAL),
        }
    }
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            instance_name: DEFAULT_CACHE_NAME.to_string(),
            base_dir: PathBuf::from("."),
            serializer: None,
            calculate_size_on_init: false,
            housekeeping_interval: None,
            default_expiration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HandleConfig::default();
        assert_eq!(config.instance_name, DEFAULT_CACHE_NAME);
        assert!(config.serializer.is_none());
        assert!(!config.calculate_size_on_init);
        assert!(config.housekeeping_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the environment to avoid races between tests
        env::remove_var("FILE_CACHE_NAME");
        env::remove_var("FILE_CACHE_BASE_DIR");
        env::remove_var("FILE_CACHE_SERIALIZER");
        env::remove_var("FILE_CACHE_CALCULATE_SIZE");
        env::remove_var("FILE_CACHE_HOUSEKEEPING_SECS");

        let config = HandleConfig::from_env().unwrap();
        assert_eq!(config, HandleConfig::default());

        env::set_var("FILE_CACHE_NAME", "orders");
        env::set_var("FILE_CACHE_BASE_DIR", "/var/cache/app");
        env::set_var("FILE_CACHE_SERIALIZER", "json");
        env::set_var("FILE_CACHE_CALCULATE_SIZE", "true");
        env::set_var("FILE_CACHE_HOUSEKEEPING_SECS", "not-a-number");

        let config = HandleConfig::from_env().unwrap();
        assert_eq!(config.instance_name, "orders");
        assert_eq!(config.base_dir, PathBuf::from("/var/cache/app"));
        assert_eq!(config.serializer, Some(SerializerKind::Json));
        assert!(config.calculate_size_on_init);
        assert!(config.housekeeping_interval.is_none());

        env::set_var("FILE_CACHE_SERIALIZER", "xml");
        assert!(matches!(
            HandleConfig::from_env(),
            Err(CacheError::Configuration(_))
        ));

        env::remove_var("FILE_CACHE_NAME");
        env::remove_var("FILE_CACHE_BASE_DIR");
        env::remove_var("FILE_CACHE_SERIALIZER");
        env::remove_var("FILE_CACHE_CALCULATE_SIZE");
        env::remove_var("FILE_CACHE_HOUSEKEEPING_SECS");
    }

    #[test]
    fn test_blank_name_falls_back_to_default() {
        let config = HandleConfig::new("   ");
        assert_eq!(config.effective_name(), DEFAULT_CACHE_NAME);
        assert_eq!(config.store_config().instance_name, DEFAULT_CACHE_NAME);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(HandleConfig::new("a/b").validate().is_err());
        assert!(HandleConfig::new("..").validate().is_err());
        assert!(HandleConfig::new("ok")
            .with_housekeeping_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(HandleConfig::new("ok")
            .with_expiration(ExpirationMode::Absolute, Duration::ZERO)
            .validate()
            .is_err());
        assert!(HandleConfig::new("ok")
            .with_expiration(ExpirationMode::None, Duration::ZERO)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_store_config_passthrough() {
        let config = HandleConfig::new("sessions")
            .with_base_dir("/tmp/caches")
            .with_calculate_size(true)
            .with_housekeeping_interval(Duration::from_secs(5));
        let store = config.store_config();

        assert_eq!(store.instance_name, "sessions");
        assert_eq!(store.root_dir().unwrap(), PathBuf::from("/tmp/caches/sessions"));
        assert!(store.calculate_size_on_init);
        assert_eq!(store.housekeeping_interval, Duration::from_secs(5));
        assert_eq!(
            HandleConfig::default().store_config().housekeeping_interval,
            DEFAULT_HOUSEKEEPING_INTERVAL
        );
    }
}
