//! Engine limits and physical table naming.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};
use crate::store::memory::MAX_BATCH_GET_KEYS;

/// Limits governing paged reads and batch fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Item limit applied when a caller gives none.
    pub default_limit: usize,
    /// Largest item limit a caller may request.
    pub max_limit: usize,
    /// Largest `limit` sent to the store in one call.
    pub store_max_page_size: usize,
    /// Accumulated bytes after which a paged read stops.
    pub max_response_bytes: usize,
    /// Keys per batch-get sub-batch.
    pub batch_size: usize,
    /// Non-progress retries allowed per sub-batch before giving up.
    pub max_batch_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 1000,
            store_max_page_size: 1000,
            max_response_bytes: 5 * 1024 * 1024,
            batch_size: MAX_BATCH_GET_KEYS,
            max_batch_retries: 8,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TENANTQ_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        override_with(&lookup, "TENANTQ_DEFAULT_LIMIT", &mut config.default_limit)?;
        override_with(&lookup, "TENANTQ_MAX_LIMIT", &mut config.max_limit)?;
        override_with(
            &lookup,
            "TENANTQ_STORE_MAX_PAGE_SIZE",
            &mut config.store_max_page_size,
        )?;
        override_with(
            &lookup,
            "TENANTQ_MAX_RESPONSE_BYTES",
            &mut config.max_response_bytes,
        )?;
        override_with(&lookup, "TENANTQ_BATCH_SIZE", &mut config.batch_size)?;
        override_with(
            &lookup,
            "TENANTQ_MAX_BATCH_RETRIES",
            &mut config.max_batch_retries,
        )?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_limit == 0 {
            return Err(ConfigError::Invalid("max_limit must be at least 1".into()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit must be between 1 and {}",
                self.max_limit
            )));
        }
        if self.store_max_page_size == 0 {
            return Err(ConfigError::Invalid(
                "store_max_page_size must be at least 1".into(),
            ));
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_response_bytes must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_GET_KEYS {
            return Err(ConfigError::Invalid(format!(
                "batch_size must be between 1 and {MAX_BATCH_GET_KEYS}"
            )));
        }
        Ok(())
    }

    /// The effective item limit for a request.
    pub fn resolve_limit(&self, requested: Option<usize>) -> Result<usize, ValidationError> {
        match requested {
            None => Ok(self.default_limit),
            Some(limit) if (1..=self.max_limit).contains(&limit) => Ok(limit),
            Some(limit) => Err(ValidationError::LimitOutOfRange {
                limit,
                min: 1,
                max: self.max_limit,
            }),
        }
    }
}

fn override_with<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(var) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}

/// Maps logical table names onto per-environment physical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNaming {
    pub app_name: String,
    pub environment: String,
}

impl Default for TableNaming {
    fn default() -> Self {
        Self {
            app_name: "prototype-app".to_string(),
            environment: "local".to_string(),
        }
    }
}

impl TableNaming {
    pub fn new(app_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            environment: environment.into(),
        }
    }

    /// Deployment stage; local runs share the `devel` tables.
    pub fn stage(&self) -> &str {
        if self.environment == "local" {
            "devel"
        } else {
            &self.environment
        }
    }

    /// `"{app}-{table}-{stage}"`.
    pub fn full_table_name(&self, table: &str) -> String {
        format!("{}-{}-{}", self.app_name, table, self.stage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_limit, 25);
        assert_eq!(config.max_response_bytes, 5 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("TENANTQ_DEFAULT_LIMIT", "50"),
            ("TENANTQ_MAX_BATCH_RETRIES", " 3 "),
        ]))
        .unwrap();
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.max_batch_retries, 3);
        assert_eq!(config.max_limit, 1000);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let err = EngineConfig::from_lookup(lookup(&[("TENANTQ_MAX_LIMIT", "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "TENANTQ_MAX_LIMIT".into(),
                value: "lots".into()
            }
        );
        assert!(EngineConfig::from_lookup(lookup(&[("TENANTQ_BATCH_SIZE", "101")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("TENANTQ_DEFAULT_LIMIT", "2000")])).is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_limit": 10, "default_limit": 5}"#).unwrap();
        assert_eq!(config.max_limit, 10);
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_resolve_limit() {
        let config = EngineConfig::default();
        assert_eq!(config.resolve_limit(None), Ok(25));
        assert_eq!(config.resolve_limit(Some(1)), Ok(1));
        assert_eq!(config.resolve_limit(Some(1000)), Ok(1000));
        assert!(config.resolve_limit(Some(0)).is_err());
        assert!(config.resolve_limit(Some(1001)).is_err());
    }

    #[test]
    fn test_table_naming() {
        let local = TableNaming::default();
        assert_eq!(local.full_table_name("logs"), "prototype-app-logs-devel");
        let prod = TableNaming::new("shop", "prod");
        assert_eq!(prod.full_table_name("users"), "shop-users-prod");
    }
}
