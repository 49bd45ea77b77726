use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactSource {
    /// Multi-party chat roster fetched during a backfill scan
    RosterScan,
    /// A message the contact actually sent (live or backfilled)
    MessageEvent,
    /// Passive contact-list sync
    ContactEvent,
    /// Operator-supplied seed; never overwritten
    ManualSeed,
}

impl ContactSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RosterScan => "RosterScan",
            Self::MessageEvent => "MessageEvent",
            Self::ContactEvent => "ContactEvent",
            Self::ManualSeed => "ManualSeed",
        }
    }
}

impl fmt::Display for ContactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved identity for one observed id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    /// Raw identifier as first observed; immutable
    pub id: String,

    pub phone_number: Option<String>,

    pub linked_id: Option<String>,

    pub display_name: Option<String>,

    /// Source of the retained display name (or of the latest observation when unnamed)
    pub source: ContactSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_chat: Option<String>,

    /// Unix milliseconds of the most recent observation
    pub last_seen: u64,
}

/// One normalized appearance of an identity.
///
/// `phone` and `linked_id` are optional overrides; when absent the store derives them
/// from `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub id: String,
    pub phone: Option<String>,
    pub linked_id: Option<String>,
    pub display_name: Option<String>,
    pub source: ContactSource,
    pub origin_group: Option<String>,
    pub origin_chat: Option<String>,
    pub seen_at: u64,
}

impl Observation {
    pub fn new(id: impl Into<String>, source: ContactSource) -> Self {
        Self {
            id: id.into(),
            phone: None,
            linked_id: None,
            display_name: None,
            source,
            origin_group: None,
            origin_chat: None,
            seen_at: unix_now_ms(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }

    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        self.with_display_name(Some(name.into()))
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_linked_id(mut self, linked_id: impl Into<String>) -> Self {
        self.linked_id = Some(linked_id.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.origin_group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_chat(mut self, chat: impl Into<String>) -> Self {
        self.origin_chat = Some(chat.into());
        self
    }

    #[must_use]
    pub const fn seen_at(mut self, unix_ms: u64) -> Self {
        self.seen_at = unix_ms;
        self
    }
}

/// Operator-supplied known link between a phone and a linked id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedContact {
    pub phone: String,
    pub linked_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Milliseconds since the Unix epoch.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
