use crate::error::{Result, StoreError};
use crate::identifier::IdentifierScheme;
use crate::types::SeedContact;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the contact store and its persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file (JSON)
    pub snapshot_path: PathBuf,

    /// Identifier domains
    pub scheme: IdentifierScheme,

    /// Known phone <-> linked id links applied at startup as `ManualSeed` records
    pub seeds: Vec<SeedContact>,

    /// Upper bound for one snapshot write
    pub save_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data").join("contacts.json"),
            scheme: IdentifierScheme::default(),
            seeds: Vec::new(),
            save_timeout_ms: 10_000,
        }
    }
}

impl StoreConfig {
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    #[must_use]
    pub const fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(StoreError::config("snapshot_path must not be empty"));
        }

        if self.save_timeout_ms == 0 {
            return Err(StoreError::config("save_timeout_ms must be > 0"));
        }

        let scheme = &self.scheme;
        for (name, value) in [
            ("phone_domain", &scheme.phone_domain),
            ("linked_domain", &scheme.linked_domain),
            ("group_domain", &scheme.group_domain),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::config(format!("{name} must not be empty")));
            }
        }
        if scheme.phone_domain == scheme.linked_domain {
            return Err(StoreError::config(format!(
                "phone_domain and linked_domain must differ (both '{}')",
                scheme.phone_domain
            )));
        }

        for seed in &self.seeds {
            if seed.phone.trim().is_empty() || seed.linked_id.trim().is_empty() {
                return Err(StoreError::config(format!(
                    "seed needs both phone and linked_id (phone='{}', linked_id='{}')",
                    seed.phone, seed.linked_id
                )));
            }
        }

        Ok(())
    }
}
