use crate::error::{Result, StoreError};
use crate::types::ContactRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

const fn default_schema_version() -> u32 {
    SNAPSHOT_SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Unix milliseconds when the snapshot was produced
    pub last_updated: u64,
    pub total_contacts: usize,
    pub mapped_links: usize,
    #[serde(default)]
    pub chats_scanned: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan_time: Option<u64>,
}

/// Durable form of a contact store: records plus the three index tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    #[serde(default)]
    pub records: Vec<ContactRecord>,
    #[serde(default)]
    pub linked_id_to_phone: BTreeMap<String, String>,
    #[serde(default)]
    pub phone_to_linked_id: BTreeMap<String, String>,
    #[serde(default)]
    pub display_name_by_key: BTreeMap<String, String>,
}

/// Write `snapshot` to `path`, replacing any previous version atomically.
pub async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    log::info!(
        "Snapshot saved to {} ({} contacts, {} links)",
        path.display(),
        snapshot.metadata.total_contacts,
        snapshot.metadata.mapped_links
    );
    Ok(())
}

/// Read a snapshot. A missing file is a fresh start, not an error.
pub async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No snapshot at {}, starting fresh", path.display());
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    if snapshot.metadata.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(StoreError::Other(format!(
            "Unsupported snapshot schemaVersion {} (expected {SNAPSHOT_SCHEMA_VERSION})",
            snapshot.metadata.schema_version
        )));
    }
    Ok(Some(snapshot))
}
