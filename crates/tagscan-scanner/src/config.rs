//! Scan loop configuration.
//!
//! Durations are stored in milliseconds so that config files read naturally
//! (`"sense_timeout_ms": 500`). Every field has a default, so a partial file
//! only overrides what it names.
//!
//! # Example
//!
//! ```
//! use tagscan_scanner::{RepeatPolicy, ScanConfig};
//!
//! let config: ScanConfig = serde_json::from_str(
//!     r#"{ "families": ["felica", "mifare"], "removal_timeout_ms": 5000 }"#,
//! ).unwrap();
//!
//! assert_eq!(config.removal_timeout().as_secs(), 5);
//! assert_eq!(config.sense_timeout().as_millis(), 500);
//! assert_eq!(config.repeat_policy, RepeatPolicy::Report);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagscan_core::{
    Error, TargetCatalog, TargetProfile,
    constants::{
        DEFAULT_PRESENCE_INTERVAL_MS, DEFAULT_REMOVAL_TIMEOUT_MS, DEFAULT_RETRY_INTERVAL_MS,
        DEFAULT_SENSE_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS,
    },
};

use crate::error::Result;

/// What to do when an already seen identifier is scanned again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Emit the record again, flagged as a repeat.
    #[default]
    Report,
    /// Emit the record, flagged as a repeat, then end the run.
    Stop,
}

/// Configuration for [`ScanLoop`](crate::ScanLoop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Families to sense, in priority order. Empty means every family of
    /// the catalog, in registration order.
    pub families: Vec<String>,

    /// How long one discovery request waits for a responder.
    pub sense_timeout_ms: u64,

    /// Pause between discovery requests that found nothing.
    pub retry_interval_ms: u64,

    /// How long to wait for a tag to leave the field.
    pub removal_timeout_ms: u64,

    /// Interval between presence polls.
    pub presence_interval_ms: u64,

    /// Wait used instead of presence polling for tags without a presence
    /// signature.
    pub settle_delay_ms: u64,

    pub repeat_policy: RepeatPolicy,

    /// End the run after this many records.
    pub max_records: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            families: Vec::new(),
            sense_timeout_ms: DEFAULT_SENSE_TIMEOUT_MS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            removal_timeout_ms: DEFAULT_REMOVAL_TIMEOUT_MS,
            presence_interval_ms: DEFAULT_PRESENCE_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            repeat_policy: RepeatPolicy::Report,
            max_records: None,
        }
    }
}

impl ScanConfig {
    /// Load a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Io` if the file cannot be read and
    /// `ScanError::Json` if it is not a valid config.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn sense_timeout(&self) -> Duration {
        Duration::from_millis(self.sense_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn removal_timeout(&self) -> Duration {
        Duration::from_millis(self.removal_timeout_ms)
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Check the config against `catalog`.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownFamily` if a family is not registered.
    /// - `Error::Config` for a zero retry or presence interval, a zero
    ///   record limit, or a catalog with nothing to sense.
    pub fn validate(&self, catalog: &TargetCatalog) -> tagscan_core::Result<()> {
        if self.retry_interval_ms == 0 {
            return Err(Error::Config("retry_interval_ms must be positive".into()));
        }
        if self.presence_interval_ms == 0 {
            return Err(Error::Config("presence_interval_ms must be positive".into()));
        }
        if self.max_records == Some(0) {
            return Err(Error::Config("max_records must be positive".into()));
        }
        if self.profiles(catalog)?.is_empty() {
            return Err(Error::Config("no polling profiles to sense".into()));
        }
        Ok(())
    }

    /// Polling profiles for the configured families, in priority order.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFamily` if a family is not registered.
    pub fn profiles(&self, catalog: &TargetCatalog) -> tagscan_core::Result<Vec<TargetProfile>> {
        if self.families.is_empty() {
            let all: Vec<&str> = catalog.families().collect();
            catalog.resolve_all(&all)
        } else {
            catalog.resolve_all(&self.families)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();

        assert!(config.families.is_empty());
        assert_eq!(config.sense_timeout(), Duration::from_millis(500));
        assert_eq!(config.retry_interval(), Duration::from_millis(100));
        assert_eq!(config.removal_timeout(), Duration::from_secs(3));
        assert_eq!(config.presence_interval(), Duration::from_millis(100));
        assert_eq!(config.settle_delay(), Duration::from_secs(3));
        assert_eq!(config.repeat_policy, RepeatPolicy::Report);
        assert_eq!(config.max_records, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"repeat_policy":"stop","max_records":1}"#).unwrap();

        assert_eq!(config.repeat_policy, RepeatPolicy::Stop);
        assert_eq!(config.max_records, Some(1));
        assert_eq!(config.sense_timeout_ms, 500);
    }

    #[test]
    fn test_default_profiles_cover_every_family() {
        let catalog = TargetCatalog::standard();
        let profiles = ScanConfig::default().profiles(&catalog).unwrap();

        assert_eq!(profiles.len(), 2 + 2 + 4 + 2 + 5 + 1);
        assert_eq!(profiles[0].to_string(), "212F sensf_req=000003010F");
        assert_eq!(profiles.last().unwrap().to_string(), "15693");
    }

    #[test]
    fn test_validate_rejects_unknown_family() {
        let config = ScanConfig {
            families: vec!["felica".into(), "bogus".into()],
            ..ScanConfig::default()
        };
        let result = config.validate(&TargetCatalog::standard());
        assert_eq!(result, Err(Error::UnknownFamily("bogus".into())));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let catalog = TargetCatalog::standard();

        let zero_presence = ScanConfig {
            presence_interval_ms: 0,
            ..ScanConfig::default()
        };
        assert!(matches!(zero_presence.validate(&catalog), Err(Error::Config(_))));

        let zero_retry = ScanConfig {
            retry_interval_ms: 0,
            ..ScanConfig::default()
        };
        assert!(matches!(zero_retry.validate(&catalog), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_catalog() {
        let result = ScanConfig::default().validate(&TargetCatalog::empty());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let result = ScanConfig::from_file("/nonexistent/tagscan.json").await;
        assert!(matches!(result, Err(crate::ScanError::Io(_))));
    }
}
