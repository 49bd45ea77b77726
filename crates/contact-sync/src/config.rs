use crate::error::{Result, SyncError};
use contact_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Backfill scan tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Recent messages fetched per chat
    pub message_limit: usize,

    /// Pause between chats
    pub chat_delay_ms: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            message_limit: 50,
            chat_delay_ms: 100,
        }
    }
}

impl ScanOptions {
    #[must_use]
    pub const fn chat_delay(&self) -> Duration {
        Duration::from_millis(self.chat_delay_ms)
    }
}

/// Service configuration, usually loaded from TOML:
///
/// ```toml
/// autosave = true
///
/// [store]
/// snapshot_path = "data/contacts.json"
///
/// [[store.seeds]]
/// phone = "6285712612218"
/// linked_id = "80444922015783"
/// display_name = "Widji"
///
/// [scan]
/// message_limit = 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub store: StoreConfig,

    pub scan: ScanOptions,

    /// Persist in the background after every ingested event
    pub autosave: bool,

    /// Run the duplicate display-name cleanup after each scan
    pub dedupe_after_scan: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            scan: ScanOptions::default(),
            autosave: true,
            dedupe_after_scan: false,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| SyncError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| SyncError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        if self.scan.message_limit == 0 {
            return Err(SyncError::Config("scan.message_limit must be > 0".to_string()));
        }
        Ok(())
    }
}
