//! # Contact Store
//!
//! Identity resolution for a messaging platform that addresses the same person by a
//! phone-routed id or by an opaque linked id.
//!
//! ## Pipeline
//!
//! ```text
//! raw id + optional name/phone/linked id
//!     │
//!     ├──> IdentifierScheme::classify
//!     │      └─> Phone | Linked | Ambiguous
//!     │
//!     ├──> ContactStore::merge
//!     │      ├─> arbitrate_name (source precedence)
//!     │      └─> link_may_replace (phone <-> linked id indices)
//!     │
//!     └──> SnapshotWriter
//!            └─> JSON snapshot (tmp file + rename)
//! ```
//!
//! ## Example
//!
//! ```
//! use contact_store::{ContactSource, ContactStore, IdentifierScheme, Observation};
//!
//! let mut store = ContactStore::new(IdentifierScheme::default());
//! store.merge(
//!     Observation::new("80444922015783@lid", ContactSource::ContactEvent)
//!         .with_phone("6285712612218")
//!         .named("Widji"),
//! );
//!
//! assert_eq!(
//!     store.resolve_display_name("6285712612218@s.whatsapp.net", "Unknown"),
//!     "Widji"
//! );
//! ```

mod arbiter;
mod config;
mod error;
mod export;
mod identifier;
mod snapshot;
mod stats;
mod store;
mod types;
mod writer;

pub use arbiter::{arbitrate_name, link_may_replace, NameClaim, NameDecision};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use export::{export_path, to_csv, write_export, ExportFormat, CSV_HEADER};
pub use identifier::{extract_linked_id, extract_phone, strip_domain, Identifier, IdentifierScheme};
pub use snapshot::{read_snapshot, write_snapshot, Snapshot, SnapshotMetadata, SNAPSHOT_SCHEMA_VERSION};
pub use stats::{DedupeReport, StoreStats};
pub use store::{ContactStore, MergeOutcome};
pub use types::{unix_now_ms, ContactRecord, ContactSource, Observation, SeedContact};
pub use writer::SnapshotWriter;
