use serde::{Deserialize, Serialize};

/// Counters describing a contact store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of contact records
    pub total_contacts: usize,

    /// Number of phone -> linked id links
    pub mapped_links: usize,

    /// Chats processed by the most recent backfill scan
    pub chats_scanned: usize,

    /// Unix milliseconds when the most recent scan started
    pub last_scan_time: Option<u64>,

    /// Unix milliseconds of the last confirmed snapshot save
    pub last_saved: Option<u64>,

    pub linked_id_to_phone_count: usize,

    pub phone_to_linked_id_count: usize,

    pub display_name_count: usize,

    /// Chats seen through live events (scan fallback enumeration)
    pub known_chats: usize,
}

/// Result of the duplicate display-name cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeReport {
    /// Display names held by more than one record
    pub names_examined: usize,

    /// Ids whose display name was cleared
    pub cleared: Vec<String>,
}
