use crate::error::CoreError;

/// Upper bound accepted for `max_cache_size` (0.9 × `i32::MAX`).
pub const MAX_CACHE_SIZE_LIMIT: usize = 1_932_735_282;

/// Hub graph configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Maximum number of records a source keeps; older records are evicted
    /// and the eviction cascades to every subscriber.
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    /// Rollback strategy used by derived hubs that do not choose their own.
    #[serde(default)]
    pub rollback: RollbackStrategy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_cache_size: default_max_cache_size(),
            rollback: RollbackStrategy::default(),
        }
    }
}

impl HubConfig {
    /// Config with a bounded cache and default rollback strategy.
    #[must_use]
    pub fn with_max_cache_size(max_cache_size: usize) -> Self {
        Self {
            max_cache_size,
            ..Self::default()
        }
    }

    /// Parses and validates a JSON config.
    ///
    /// # Errors
    /// [`CoreError::Json`] on malformed JSON, [`CoreError::Config`] when a
    /// value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let config: HubConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    /// [`CoreError::Config`] when `max_cache_size` is zero or above
    /// [`MAX_CACHE_SIZE_LIMIT`].
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_cache_size == 0 {
            return Err(CoreError::Config(
                "max_cache_size must be greater than 0".to_string(),
            ));
        }
        if self.max_cache_size > MAX_CACHE_SIZE_LIMIT {
            return Err(CoreError::Config(format!(
                "max_cache_size must be at most {MAX_CACHE_SIZE_LIMIT}, got {}",
                self.max_cache_size
            )));
        }
        Ok(())
    }
}

fn default_max_cache_size() -> usize {
    MAX_CACHE_SIZE_LIMIT
}

/// How a derived hub restores its recurrence state before recomputing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStrategy {
    /// Keep only the latest state; replay from the start of the cache.
    FullReplay,
    /// Keep one state snapshot per cached record and restore it directly.
    #[default]
    CachedState,
}
